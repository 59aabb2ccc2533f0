#![allow(dead_code)]

use ironlog_data::{
    Exercise, ExerciseRoutine, MockStorage, SetEntry, UserId, WorkoutRoutine, WorkoutSession,
};
use ironlog_loader::{LoaderConfig, LoaderFactory, Principal, RequestContext};

pub const ALICE: UserId = UserId(1);
pub const BOB: UserId = UserId(2);

/// Two users, each with a routine and a session.
///
/// | record | parent | owner |
/// |--------|--------|-------|
/// | workout_routine:1 | - | alice |
/// | workout_routine:2 | - | bob |
/// | exercise_routine:10 | workout_routine:1 | alice |
/// | workout_session:1 | - | bob |
/// | workout_session:3 | - | alice |
/// | exercise:44, exercise:46 | workout_session:3 | alice |
/// | exercise:50 | workout_session:1 | bob |
/// | exercise:70 | workout_session:99 (missing) | - |
/// | set_entry:8, set_entry:9 | exercise:44 | alice |
/// | set_entry:60 | exercise:50 | bob |
/// | set_entry:71 | exercise:999 (missing) | - |
pub fn seeded_storage() -> MockStorage {
    let mock = MockStorage::new();
    mock.insert(WorkoutRoutine {
        id: 1,
        user_id: ALICE,
        name: "Push day".into(),
        active: true,
    });
    mock.insert(WorkoutRoutine {
        id: 2,
        user_id: BOB,
        name: "Leg day".into(),
        active: true,
    });
    mock.insert(ExerciseRoutine {
        id: 10,
        workout_routine_id: 1,
        name: "Bench press".into(),
        sets: 5,
        reps: 5,
    });
    mock.insert(session(1, BOB));
    mock.insert(session(3, ALICE));
    mock.insert(exercise(44, 3, "Squat"));
    mock.insert(exercise(46, 3, "Deadlift"));
    mock.insert(exercise(50, 1, "Lunge"));
    mock.insert(exercise(70, 99, "Orphan"));
    mock.insert(set_entry(8, 44, 110.0));
    mock.insert(set_entry(9, 44, 120.0));
    mock.insert(set_entry(60, 50, 40.0));
    mock.insert(set_entry(71, 999, 10.0));
    mock
}

pub fn session(id: i64, user_id: UserId) -> WorkoutSession {
    WorkoutSession {
        id,
        user_id,
        workout_routine_id: None,
        started_at: 1_700_000_000 + id,
        ended_at: None,
        notes: String::new(),
    }
}

pub fn exercise(id: i64, workout_session_id: i64, name: &str) -> Exercise {
    Exercise {
        id,
        workout_session_id,
        exercise_routine_id: None,
        name: name.into(),
        notes: String::new(),
    }
}

pub fn set_entry(id: i64, exercise_id: i64, weight: f64) -> SetEntry {
    SetEntry {
        id,
        exercise_id,
        weight,
        reps: 5,
    }
}

pub fn factory(mock: &MockStorage) -> LoaderFactory {
    factory_with(mock, LoaderConfig::default())
}

/// Route loader logs to the test harness. Set `RUST_LOG=ironlog_loader=trace`
/// to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn factory_with(mock: &MockStorage, config: LoaderConfig) -> LoaderFactory {
    init_tracing();
    LoaderFactory::new(mock.clone(), config).unwrap()
}

pub fn context_for(mock: &MockStorage, user: UserId) -> RequestContext {
    factory(mock).new_request_context(Some(Principal::new(user)))
}
