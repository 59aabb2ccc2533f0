use crate::entity::{Entity, Exercise, ExerciseRoutine, SetEntry, WorkoutRoutine, WorkoutSession};
use crate::key::{EntityKind, Key, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw record returned by the storage layer, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    WorkoutRoutine(WorkoutRoutine),
    WorkoutSession(WorkoutSession),
    ExerciseRoutine(ExerciseRoutine),
    Exercise(Exercise),
    SetEntry(SetEntry),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::WorkoutRoutine(_) => EntityKind::WorkoutRoutine,
            Record::WorkoutSession(_) => EntityKind::WorkoutSession,
            Record::ExerciseRoutine(_) => EntityKind::ExerciseRoutine,
            Record::Exercise(_) => EntityKind::Exercise,
            Record::SetEntry(_) => EntityKind::SetEntry,
        }
    }

    pub fn key(&self) -> Key {
        match self {
            Record::WorkoutRoutine(r) => r.key(),
            Record::WorkoutSession(r) => r.key(),
            Record::ExerciseRoutine(r) => r.key(),
            Record::Exercise(r) => r.key(),
            Record::SetEntry(r) => r.key(),
        }
    }

    pub fn owner_link(&self) -> OwnerLink {
        match self {
            Record::WorkoutRoutine(r) => r.owner_link(),
            Record::WorkoutSession(r) => r.owner_link(),
            Record::ExerciseRoutine(r) => r.owner_link(),
            Record::Exercise(r) => r.owner_link(),
            Record::SetEntry(r) => r.owner_link(),
        }
    }

    /// Downcast into a concrete entity type.
    pub fn into_entity<E: Entity>(self) -> Option<E> {
        E::from_record(self)
    }
}

/// One hop of an ownership chain.
///
/// Records either name their owning user directly or point at the parent
/// record that does. The authorization gate follows `Parent` links until it
/// reaches an `Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnerLink {
    Owner(UserId),
    Parent(Key),
}

/// One-to-many relationships resolved through the loader.
///
/// Child lists are keyed by the parent key, so a relation always batches
/// parents of a single kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Workout routine -> its exercise routines.
    RoutineExerciseRoutines,
    /// Workout routine -> sessions that followed it.
    RoutineSessions,
    /// Workout session -> exercises performed.
    SessionExercises,
    /// Exercise -> logged sets.
    ExerciseSets,
}

impl Relation {
    pub const ALL: [Relation; 4] = [
        Relation::RoutineExerciseRoutines,
        Relation::RoutineSessions,
        Relation::SessionExercises,
        Relation::ExerciseSets,
    ];

    pub fn parent_kind(self) -> EntityKind {
        match self {
            Relation::RoutineExerciseRoutines | Relation::RoutineSessions => {
                EntityKind::WorkoutRoutine
            }
            Relation::SessionExercises => EntityKind::WorkoutSession,
            Relation::ExerciseSets => EntityKind::Exercise,
        }
    }

    pub fn child_kind(self) -> EntityKind {
        match self {
            Relation::RoutineExerciseRoutines => EntityKind::ExerciseRoutine,
            Relation::RoutineSessions => EntityKind::WorkoutSession,
            Relation::SessionExercises => EntityKind::Exercise,
            Relation::ExerciseSets => EntityKind::SetEntry,
        }
    }

    /// Column on the child table that references the parent.
    pub fn foreign_key(self) -> &'static str {
        match self {
            Relation::RoutineExerciseRoutines | Relation::RoutineSessions => "workout_routine_id",
            Relation::SessionExercises => "workout_session_id",
            Relation::ExerciseSets => "exercise_id",
        }
    }

    /// Parent key of `record` under this relation, if the record is a
    /// child of the relation at all.
    pub fn parent_of(self, record: &Record) -> Option<Key> {
        match (self, record) {
            (Relation::RoutineExerciseRoutines, Record::ExerciseRoutine(r)) => {
                Some(Key::workout_routine(r.workout_routine_id))
            }
            (Relation::RoutineSessions, Record::WorkoutSession(s)) => {
                s.workout_routine_id.map(Key::workout_routine)
            }
            (Relation::SessionExercises, Record::Exercise(e)) => {
                Some(Key::workout_session(e.workout_session_id))
            }
            (Relation::ExerciseSets, Record::SetEntry(s)) => Some(Key::exercise(s.exercise_id)),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Relation::RoutineExerciseRoutines => "routine_exercise_routines",
            Relation::RoutineSessions => "routine_sessions",
            Relation::SessionExercises => "session_exercises",
            Relation::ExerciseSets => "exercise_sets",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
