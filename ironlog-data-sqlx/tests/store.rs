use ironlog_data::{
    DataError, EntityKind, Exercise, Key, OwnerLink, Record, Relation, Storage, UserId,
    WorkoutSession,
};
use ironlog_data_sqlx::SqlxStorage;
use ironlog_loader::{LoadError, LoaderConfig, LoaderFactory, Outcome, Principal};

const SEED: &str = r#"
INSERT INTO workout_routines (id, user_id, name, active) VALUES (1, 1, 'Push day', 1);
INSERT INTO workout_routines (id, user_id, name, active) VALUES (2, 2, 'Leg day', 0);
INSERT INTO exercise_routines (id, workout_routine_id, name, sets, reps) VALUES (10, 1, 'Bench press', 5, 5);
INSERT INTO exercise_routines (id, workout_routine_id, name, sets, reps) VALUES (11, 1, 'Dips', 3, 12);
INSERT INTO workout_sessions (id, user_id, workout_routine_id, started_at, notes) VALUES (1, 2, NULL, 1700000001, '');
INSERT INTO workout_sessions (id, user_id, workout_routine_id, started_at, notes) VALUES (3, 1, 1, 1700000003, 'morning');
INSERT INTO exercises (id, workout_session_id, exercise_routine_id, name, notes) VALUES (44, 3, 10, 'Bench press', '');
INSERT INTO exercises (id, workout_session_id, exercise_routine_id, name, notes) VALUES (46, 3, NULL, 'Push-up', '');
INSERT INTO exercises (id, workout_session_id, exercise_routine_id, name, notes) VALUES (50, 1, NULL, 'Squat', '');
INSERT INTO set_entries (id, exercise_id, weight, reps) VALUES (8, 44, 80.0, 5);
INSERT INTO set_entries (id, exercise_id, weight, reps) VALUES (9, 44, 82.5, 5);
INSERT INTO set_entries (id, exercise_id, weight, reps) VALUES (60, 50, 100.0, 5);
"#;

async fn storage() -> SqlxStorage {
    let storage = SqlxStorage::connect("sqlite::memory:").await.unwrap();
    storage.migrate().await.unwrap();
    sqlx::raw_sql(SEED).execute(storage.pool()).await.unwrap();
    storage
}

#[tokio::test]
async fn test_fetch_many_returns_present_rows() {
    let storage = storage().await;

    let rows = storage
        .fetch_many(EntityKind::Exercise, &[Key::exercise(44), Key::exercise(45), Key::exercise(46)])
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    let bench = rows[&Key::exercise(44)].clone().into_entity::<Exercise>().unwrap();
    assert_eq!(bench.workout_session_id, 3);
    assert_eq!(bench.exercise_routine_id, Some(10));
    assert!(!rows.contains_key(&Key::exercise(45)));
}

#[tokio::test]
async fn test_fetch_many_decodes_every_kind() {
    let storage = storage().await;

    let sessions = storage
        .fetch_many(EntityKind::WorkoutSession, &[Key::workout_session(3)])
        .await
        .unwrap();
    let session = sessions[&Key::workout_session(3)]
        .clone()
        .into_entity::<WorkoutSession>()
        .unwrap();
    assert_eq!(session.user_id, UserId(1));
    assert_eq!(session.workout_routine_id, Some(1));
    assert_eq!(session.ended_at, None);
    assert_eq!(session.notes, "morning");

    for key in [
        Key::workout_routine(2),
        Key::exercise_routine(11),
        Key::set_entry(9),
    ] {
        let rows = storage.fetch_many(key.kind(), &[key]).await.unwrap();
        assert_eq!(rows.get(&key).map(Record::key), Some(key));
    }
}

#[tokio::test]
async fn test_owner_links() {
    let storage = storage().await;

    let links = storage
        .fetch_owner_links(EntityKind::SetEntry, &[Key::set_entry(8), Key::set_entry(99)])
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[&Key::set_entry(8)], OwnerLink::Parent(Key::exercise(44)));

    let links = storage
        .fetch_owner_links(EntityKind::WorkoutSession, &[Key::workout_session(1)])
        .await
        .unwrap();
    assert_eq!(links[&Key::workout_session(1)], OwnerLink::Owner(UserId(2)));
}

#[tokio::test]
async fn test_children_grouped_by_parent() {
    let storage = storage().await;

    let children = storage
        .fetch_children(
            Relation::SessionExercises,
            &[Key::workout_session(3), Key::workout_session(1)],
        )
        .await
        .unwrap();

    let ids = |parent: Key| -> Vec<i64> {
        children[&parent].iter().map(|r| r.key().id()).collect()
    };
    assert_eq!(ids(Key::workout_session(3)), vec![44, 46]);
    assert_eq!(ids(Key::workout_session(1)), vec![50]);
}

#[tokio::test]
async fn test_owner_chain_single_query() {
    let storage = storage().await;

    assert_eq!(
        storage.fetch_owner_chain(Key::set_entry(9)).await.unwrap(),
        Some(UserId(1))
    );
    assert_eq!(
        storage.fetch_owner_chain(Key::exercise_routine(10)).await.unwrap(),
        Some(UserId(1))
    );
    assert_eq!(
        storage.fetch_owner_chain(Key::set_entry(60)).await.unwrap(),
        Some(UserId(2))
    );
    assert_eq!(storage.fetch_owner_chain(Key::set_entry(1000)).await.unwrap(), None);
}

#[tokio::test]
async fn test_soft_delete_session_cascades_and_reports_stale_keys() {
    let storage = storage().await;

    let mut stale = storage.soft_delete_workout_session(3).await.unwrap();
    stale.sort();
    let mut expected = vec![
        Key::workout_routine(1),
        Key::workout_session(3),
        Key::exercise(44),
        Key::exercise(46),
        Key::set_entry(8),
        Key::set_entry(9),
    ];
    expected.sort();
    assert_eq!(stale, expected);

    let rows = storage
        .fetch_many(EntityKind::Exercise, &[Key::exercise(44), Key::exercise(46)])
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(storage.fetch_owner_chain(Key::set_entry(8)).await.unwrap(), None);

    assert!(matches!(
        storage.soft_delete_workout_session(3).await,
        Err(DataError::NotFound(key)) if key == Key::workout_session(3)
    ));
}

#[tokio::test]
async fn test_soft_delete_exercise() {
    let storage = storage().await;

    let stale = storage.soft_delete_exercise(44).await.unwrap();
    assert_eq!(
        stale,
        vec![
            Key::exercise(44),
            Key::set_entry(8),
            Key::set_entry(9),
            Key::workout_session(3),
        ]
    );
    assert_eq!(storage.fetch_owner_chain(Key::set_entry(9)).await.unwrap(), None);
}

#[tokio::test]
async fn test_soft_delete_routine_cascades_through_sessions() {
    let storage = storage().await;

    let stale = storage.soft_delete_workout_routine(1).await.unwrap();
    assert_eq!(
        stale,
        vec![
            Key::workout_routine(1),
            Key::exercise_routine(10),
            Key::exercise_routine(11),
            Key::workout_session(3),
            Key::exercise(44),
            Key::exercise(46),
            Key::set_entry(8),
            Key::set_entry(9),
        ]
    );

    let sessions = storage
        .fetch_many(
            EntityKind::WorkoutSession,
            &[Key::workout_session(1), Key::workout_session(3)],
        )
        .await
        .unwrap();
    assert_eq!(sessions.keys().copied().collect::<Vec<_>>(), vec![Key::workout_session(1)]);

    let exercises = storage
        .fetch_children(Relation::SessionExercises, &[Key::workout_session(3)])
        .await
        .unwrap();
    assert!(exercises.is_empty());
    let sets = storage
        .fetch_many(EntityKind::SetEntry, &[Key::set_entry(8), Key::set_entry(60)])
        .await
        .unwrap();
    assert_eq!(sets.keys().copied().collect::<Vec<_>>(), vec![Key::set_entry(60)]);

    // Bob's data is untouched.
    assert_eq!(
        storage.fetch_owner_chain(Key::set_entry(60)).await.unwrap(),
        Some(UserId(2))
    );
    assert!(matches!(
        storage.soft_delete_workout_routine(1).await,
        Err(DataError::NotFound(key)) if key == Key::workout_routine(1)
    ));
}

#[tokio::test]
async fn test_routine_cascade_clears_loaded_session_tree() {
    let storage = storage().await;
    let factory = LoaderFactory::new(storage.clone(), LoaderConfig::default()).unwrap();
    let ctx = factory.new_request_context(Some(Principal::new(UserId(1))));

    assert!(ctx.load(Key::workout_session(3)).await.is_value());
    let listed = ctx
        .load_children(Relation::SessionExercises, Key::workout_session(3))
        .await;
    assert_eq!(listed.value().map(Vec::len), Some(2));

    let stale = storage.soft_delete_workout_routine(1).await.unwrap();
    ctx.clear_many(stale);

    assert!(ctx.load(Key::workout_session(3)).await.is_not_found());
    assert!(ctx.load(Key::exercise(44)).await.is_not_found());
    assert!(ctx.load(Key::set_entry(8)).await.is_not_found());
    ctx.teardown().await;
}

#[tokio::test]
async fn test_insert_set_entry() {
    let storage = storage().await;

    let (entry, stale) = storage.insert_set_entry(46, 0.0, 20).await.unwrap();
    assert_eq!(stale, vec![Key::exercise(46), Key::set_entry(entry.id)]);

    let children = storage
        .fetch_children(Relation::ExerciseSets, &[Key::exercise(46)])
        .await
        .unwrap();
    assert_eq!(children[&Key::exercise(46)].len(), 1);

    assert!(matches!(
        storage.insert_set_entry(12345, 10.0, 1).await,
        Err(DataError::NotFound(key)) if key == Key::exercise(12345)
    ));
}

#[tokio::test]
async fn test_loader_over_sqlite_update_then_clear() {
    let storage = storage().await;
    let factory = LoaderFactory::new(storage.clone(), LoaderConfig::default()).unwrap();
    let ctx = factory.new_request_context(Some(Principal::new(UserId(1))));

    let notes = |outcome: Outcome<Exercise>| outcome.into_value().map(|e| e.notes);

    assert_eq!(notes(ctx.load_entity::<Exercise>(44).await), Some(String::new()));

    let stale = storage.update_exercise_notes(44, "felt heavy").await.unwrap();
    assert_eq!(notes(ctx.load_entity::<Exercise>(44).await), Some(String::new()));

    ctx.clear_many(stale);
    assert_eq!(
        notes(ctx.load_entity::<Exercise>(44).await),
        Some("felt heavy".to_string())
    );

    assert!(matches!(
        ctx.load(Key::exercise(50)).await,
        Outcome::Error(LoadError::AccessDenied { .. })
    ));
    ctx.teardown().await;
}

#[tokio::test]
async fn test_listed_exercise_reads_fresh_after_update() {
    let storage = storage().await;
    let factory = LoaderFactory::new(storage.clone(), LoaderConfig::default()).unwrap();
    let ctx = factory.new_request_context(Some(Principal::new(UserId(1))));

    let listed_notes = |outcome: Outcome<Vec<Exercise>>| -> Vec<String> {
        outcome
            .into_value()
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.notes)
            .collect()
    };

    let listed = ctx
        .load_children_of::<Exercise>(Relation::SessionExercises, Key::workout_session(3))
        .await;
    assert_eq!(listed_notes(listed), vec![String::new(), String::new()]);

    let stale = storage.update_exercise_notes(44, "felt heavy").await.unwrap();
    assert_eq!(stale, vec![Key::exercise(44), Key::workout_session(3)]);
    ctx.clear_many(stale);

    let listed = ctx
        .load_children_of::<Exercise>(Relation::SessionExercises, Key::workout_session(3))
        .await;
    assert_eq!(listed_notes(listed), vec!["felt heavy".to_string(), String::new()]);
    assert_eq!(
        ctx.load_entity::<Exercise>(44).await.into_value().map(|e| e.notes),
        Some("felt heavy".to_string())
    );

    assert!(matches!(
        storage.update_exercise_notes(12345, "gone").await,
        Err(DataError::NotFound(key)) if key == Key::exercise(12345)
    ));
    ctx.teardown().await;
}
