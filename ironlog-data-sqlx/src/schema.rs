//! Table definitions.
//!
//! Every table carries a nullable `deleted_at` (unix seconds). Soft-deleted
//! rows are invisible to every read in [`SqlxStorage`](crate::SqlxStorage).

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS workout_routines (
    id          INTEGER PRIMARY KEY,
    user_id     INTEGER NOT NULL,
    name        TEXT    NOT NULL,
    active      BOOLEAN NOT NULL DEFAULT 1,
    deleted_at  INTEGER
);

CREATE TABLE IF NOT EXISTS exercise_routines (
    id                  INTEGER PRIMARY KEY,
    workout_routine_id  INTEGER NOT NULL REFERENCES workout_routines(id),
    name                TEXT    NOT NULL,
    sets                INTEGER NOT NULL,
    reps                INTEGER NOT NULL,
    deleted_at          INTEGER
);

CREATE TABLE IF NOT EXISTS workout_sessions (
    id                  INTEGER PRIMARY KEY,
    user_id             INTEGER NOT NULL,
    workout_routine_id  INTEGER REFERENCES workout_routines(id),
    started_at          INTEGER NOT NULL,
    ended_at            INTEGER,
    notes               TEXT    NOT NULL DEFAULT '',
    deleted_at          INTEGER
);

CREATE TABLE IF NOT EXISTS exercises (
    id                   INTEGER PRIMARY KEY,
    workout_session_id   INTEGER NOT NULL REFERENCES workout_sessions(id),
    exercise_routine_id  INTEGER REFERENCES exercise_routines(id),
    name                 TEXT    NOT NULL,
    notes                TEXT    NOT NULL DEFAULT '',
    deleted_at           INTEGER
);

CREATE TABLE IF NOT EXISTS set_entries (
    id           INTEGER PRIMARY KEY,
    exercise_id  INTEGER NOT NULL REFERENCES exercises(id),
    weight       REAL    NOT NULL,
    reps         INTEGER NOT NULL,
    deleted_at   INTEGER
);

CREATE INDEX IF NOT EXISTS idx_exercise_routines_routine ON exercise_routines(workout_routine_id);
CREATE INDEX IF NOT EXISTS idx_workout_sessions_routine ON workout_sessions(workout_routine_id);
CREATE INDEX IF NOT EXISTS idx_exercises_session ON exercises(workout_session_id);
CREATE INDEX IF NOT EXISTS idx_set_entries_exercise ON set_entries(exercise_id);
"#;
