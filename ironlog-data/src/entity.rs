use crate::key::{EntityKind, Key, UserId};
use crate::record::{OwnerLink, Record};
use serde::{Deserialize, Serialize};

/// Trait implemented by every record type the loader can fetch.
///
/// Ties a Rust type to its [`EntityKind`] and its table, and converts to
/// and from the kind-erased [`Record`] the storage layer hands back.
///
/// # Example
///
/// ```ignore
/// let exercise: Outcome<Exercise> = ctx.load_entity::<Exercise>(44).await;
/// ```
pub trait Entity: Clone + Send + Sync + Unpin + 'static {
    const KIND: EntityKind;

    fn table_name() -> &'static str;
    fn columns() -> &'static [&'static str];
    fn id(&self) -> i64;

    /// One hop up the ownership chain.
    fn owner_link(&self) -> OwnerLink;

    fn into_record(self) -> Record;
    fn from_record(record: Record) -> Option<Self>;

    fn key(&self) -> Key {
        Key::new(Self::KIND, self.id())
    }
}

/// A user's workout plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRoutine {
    pub id: i64,
    pub user_id: UserId,
    pub name: String,
    pub active: bool,
}

/// One planned exercise inside a workout routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRoutine {
    pub id: i64,
    pub workout_routine_id: i64,
    pub name: String,
    pub sets: i32,
    pub reps: i32,
}

/// A performed workout. Optionally follows a routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: i64,
    pub user_id: UserId,
    pub workout_routine_id: Option<i64>,
    /// Unix seconds.
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub notes: String,
}

/// An exercise performed during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    pub workout_session_id: i64,
    pub exercise_routine_id: Option<i64>,
    pub name: String,
    pub notes: String,
}

/// A single set logged against an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub id: i64,
    pub exercise_id: i64,
    pub weight: f64,
    pub reps: i32,
}

macro_rules! impl_entity {
    ($ty:ident, $kind:ident, $table:literal, [$($col:literal),* $(,)?], |$this:ident| $link:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = EntityKind::$kind;

            fn table_name() -> &'static str {
                $table
            }

            fn columns() -> &'static [&'static str] {
                &[$($col),*]
            }

            fn id(&self) -> i64 {
                self.id
            }

            fn owner_link(&self) -> OwnerLink {
                let $this = self;
                $link
            }

            fn into_record(self) -> Record {
                Record::$ty(self)
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Record {
            fn from(value: $ty) -> Self {
                Record::$ty(value)
            }
        }
    };
}

impl_entity!(
    WorkoutRoutine,
    WorkoutRoutine,
    "workout_routines",
    ["id", "user_id", "name", "active"],
    |this| OwnerLink::Owner(this.user_id)
);

impl_entity!(
    ExerciseRoutine,
    ExerciseRoutine,
    "exercise_routines",
    ["id", "workout_routine_id", "name", "sets", "reps"],
    |this| OwnerLink::Parent(Key::workout_routine(this.workout_routine_id))
);

impl_entity!(
    WorkoutSession,
    WorkoutSession,
    "workout_sessions",
    ["id", "user_id", "workout_routine_id", "started_at", "ended_at", "notes"],
    |this| OwnerLink::Owner(this.user_id)
);

impl_entity!(
    Exercise,
    Exercise,
    "exercises",
    ["id", "workout_session_id", "exercise_routine_id", "name", "notes"],
    |this| OwnerLink::Parent(Key::workout_session(this.workout_session_id))
);

impl_entity!(
    SetEntry,
    SetEntry,
    "set_entries",
    ["id", "exercise_id", "weight", "reps"],
    |this| OwnerLink::Parent(Key::exercise(this.exercise_id))
);

/// Table backing a kind, without needing the concrete type.
pub fn table_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::WorkoutRoutine => WorkoutRoutine::table_name(),
        EntityKind::WorkoutSession => WorkoutSession::table_name(),
        EntityKind::ExerciseRoutine => ExerciseRoutine::table_name(),
        EntityKind::Exercise => Exercise::table_name(),
        EntityKind::SetEntry => SetEntry::table_name(),
    }
}

/// Columns of the table backing a kind.
pub fn columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::WorkoutRoutine => WorkoutRoutine::columns(),
        EntityKind::WorkoutSession => WorkoutSession::columns(),
        EntityKind::ExerciseRoutine => ExerciseRoutine::columns(),
        EntityKind::Exercise => Exercise::columns(),
        EntityKind::SetEntry => SetEntry::columns(),
    }
}
