use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of resource the loader knows how to batch.
///
/// Each kind has a statically known ownership parent (see
/// [`EntityKind::owner_parent`]), which is what the authorization gate
/// walks to find the owning user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    WorkoutRoutine,
    WorkoutSession,
    ExerciseRoutine,
    Exercise,
    SetEntry,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::WorkoutRoutine,
        EntityKind::WorkoutSession,
        EntityKind::ExerciseRoutine,
        EntityKind::Exercise,
        EntityKind::SetEntry,
    ];

    /// Longest ownership chain of any kind, counted in hops from the
    /// requested resource to the record that names its user.
    pub const MAX_OWNER_HOPS: usize = 2;

    /// The kind whose record owns this one, or `None` when records of
    /// this kind carry the owning user id themselves.
    pub fn owner_parent(self) -> Option<EntityKind> {
        match self {
            EntityKind::WorkoutRoutine | EntityKind::WorkoutSession => None,
            EntityKind::ExerciseRoutine => Some(EntityKind::WorkoutRoutine),
            EntityKind::Exercise => Some(EntityKind::WorkoutSession),
            EntityKind::SetEntry => Some(EntityKind::Exercise),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::WorkoutRoutine => "workout_routine",
            EntityKind::WorkoutSession => "workout_session",
            EntityKind::ExerciseRoutine => "exercise_routine",
            EntityKind::Exercise => "exercise",
            EntityKind::SetEntry => "set_entry",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of the user that owns an aggregate root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The unit of batching: an entity kind plus an id.
///
/// Equality is structural, so `Key(Exercise, 7)` and `Key(SetEntry, 7)`
/// are different keys even though the ids collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    kind: EntityKind,
    id: i64,
}

impl Key {
    /// Build a key from an already-validated id.
    ///
    /// Ids are positive. Use [`Key::parse`] for ids that come from callers.
    pub const fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }

    /// Parse a caller-supplied id for the given kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use ironlog_data::{EntityKind, Key};
    ///
    /// let key = Key::parse(EntityKind::Exercise, "44").unwrap();
    /// assert_eq!(key.id(), 44);
    /// assert!(Key::parse(EntityKind::Exercise, "abc").is_err());
    /// assert!(Key::parse(EntityKind::Exercise, "0").is_err());
    /// ```
    pub fn parse(kind: EntityKind, raw: &str) -> Result<Self, KeyParseError> {
        match raw.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self { kind, id }),
            _ => Err(KeyParseError {
                kind,
                raw: raw.to_string(),
            }),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub const fn workout_routine(id: i64) -> Self {
        Self::new(EntityKind::WorkoutRoutine, id)
    }

    pub const fn workout_session(id: i64) -> Self {
        Self::new(EntityKind::WorkoutSession, id)
    }

    pub const fn exercise_routine(id: i64) -> Self {
        Self::new(EntityKind::ExerciseRoutine, id)
    }

    pub const fn exercise(id: i64) -> Self {
        Self::new(EntityKind::Exercise, id)
    }

    pub const fn set_entry(id: i64) -> Self {
        Self::new(EntityKind::SetEntry, id)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A caller supplied an id that the entity kind cannot parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParseError {
    pub kind: EntityKind,
    pub raw: String,
}

impl fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed {} id: {:?}", self.kind, self.raw)
    }
}

impl std::error::Error for KeyParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_of_different_kinds_never_collide() {
        assert_ne!(Key::exercise(7), Key::set_entry(7));
        assert_eq!(Key::exercise(7), Key::new(EntityKind::Exercise, 7));
    }

    #[test]
    fn test_parse_trims_and_rejects_non_positive() {
        assert_eq!(
            Key::parse(EntityKind::SetEntry, " 12 ").unwrap(),
            Key::set_entry(12)
        );
        let err = Key::parse(EntityKind::SetEntry, "-3").unwrap_err();
        assert_eq!(err.kind, EntityKind::SetEntry);
        assert_eq!(err.raw, "-3");
        assert!(Key::parse(EntityKind::SetEntry, "").is_err());
    }

    #[test]
    fn test_owner_chains_are_at_most_two_hops() {
        for kind in EntityKind::ALL {
            let mut hops = 0;
            let mut current = kind;
            while let Some(parent) = current.owner_parent() {
                hops += 1;
                current = parent;
            }
            assert!(hops <= EntityKind::MAX_OWNER_HOPS, "{kind} has {hops} hops");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Key::workout_session(3).to_string(), "workout_session:3");
    }
}
