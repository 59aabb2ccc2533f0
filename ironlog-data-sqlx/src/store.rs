use crate::error::{SqlxErrorExt, SqlxResult};
use crate::schema::SCHEMA;
use ironlog_data::entity::{columns, table_name};
use ironlog_data::{
    DataError, EntityKind, Exercise, ExerciseRoutine, Key, OwnerLink, Record, Relation, SetEntry,
    Storage, StorageFuture, UserId, WorkoutRoutine, WorkoutSession,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, Transaction};
use std::collections::HashMap;
use tracing::debug;

const NOW: &str = "CAST(strftime('%s', 'now') AS INTEGER)";

/// [`Storage`] over a SQLite pool.
///
/// Each bulk read is a single `SELECT ... WHERE id IN (...)` that skips
/// soft-deleted rows. The write helpers are not part of the contract; each
/// returns the keys it staled so the caller can clear them from the
/// request context.
///
/// # Example
///
/// ```ignore
/// let storage = SqlxStorage::connect("sqlite://ironlog.db").await?;
/// storage.migrate().await?;
/// let factory = LoaderFactory::new(storage.clone(), config)?;
/// ```
#[derive(Clone)]
pub struct SqlxStorage {
    pool: SqlitePool,
}

impl SqlxStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool on `url`.
    ///
    /// In-memory databases are per connection, so `sqlite::memory:` gets a
    /// single connection that is never recycled.
    pub async fn connect(url: &str) -> SqlxResult<Self> {
        let mut options = SqlitePoolOptions::new();
        if url.contains(":memory:") {
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options
            .connect(url)
            .await
            .map_err(SqlxErrorExt::unavailable)?;
        Ok(Self::new(pool))
    }

    /// Create the tables if they do not exist yet.
    pub async fn migrate(&self) -> SqlxResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(SqlxErrorExt::unavailable)?;
        Ok(())
    }

    /// Get the underlying pool reference.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Change an exercise's notes.
    ///
    /// Stales the exercise and the session whose exercise list carries the
    /// old row.
    pub async fn update_exercise_notes(&self, id: i64, notes: &str) -> SqlxResult<Vec<Key>> {
        let session_id: Option<i64> = sqlx::query_scalar(
            "UPDATE exercises SET notes = ? WHERE id = ? AND deleted_at IS NULL \
             RETURNING workout_session_id",
        )
        .bind(notes)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.for_query(EntityKind::Exercise, 1))?;
        let Some(session_id) = session_id else {
            return Err(DataError::NotFound(Key::exercise(id)));
        };
        Ok(vec![Key::exercise(id), Key::workout_session(session_id)])
    }

    /// Log a set against an exercise.
    ///
    /// Stales the exercise (its set list grows) and the new set's own key.
    pub async fn insert_set_entry(
        &self,
        exercise_id: i64,
        weight: f64,
        reps: i32,
    ) -> SqlxResult<(SetEntry, Vec<Key>)> {
        let mut tx = self.pool.begin().await.map_err(SqlxErrorExt::unavailable)?;
        let exists = sqlx::query("SELECT 1 FROM exercises WHERE id = ? AND deleted_at IS NULL")
            .bind(exercise_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| e.for_query(EntityKind::Exercise, 1))?;
        if exists.is_none() {
            return Err(DataError::NotFound(Key::exercise(exercise_id)));
        }
        let id = sqlx::query("INSERT INTO set_entries (exercise_id, weight, reps) VALUES (?, ?, ?)")
            .bind(exercise_id)
            .bind(weight)
            .bind(reps)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.for_query(EntityKind::SetEntry, 1))?
            .last_insert_rowid();
        tx.commit().await.map_err(SqlxErrorExt::unavailable)?;

        let entry = SetEntry {
            id,
            exercise_id,
            weight,
            reps,
        };
        Ok((entry, vec![Key::exercise(exercise_id), Key::set_entry(id)]))
    }

    /// Soft-delete an exercise and its sets.
    ///
    /// Stales the exercise, every set under it, and the session whose
    /// exercise list shrank.
    pub async fn soft_delete_exercise(&self, id: i64) -> SqlxResult<Vec<Key>> {
        let mut tx = self.pool.begin().await.map_err(SqlxErrorExt::unavailable)?;
        let session_id: Option<i64> = sqlx::query_scalar(
            "SELECT workout_session_id FROM exercises WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| e.for_query(EntityKind::Exercise, 1))?;
        let Some(session_id) = session_id else {
            return Err(DataError::NotFound(Key::exercise(id)));
        };

        let set_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM set_entries WHERE exercise_id = ? AND deleted_at IS NULL ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| e.for_query(EntityKind::SetEntry, 1))?;

        sqlx::query(&format!(
            "UPDATE set_entries SET deleted_at = {NOW} WHERE exercise_id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.for_query(EntityKind::SetEntry, set_ids.len()))?;
        sqlx::query(&format!("UPDATE exercises SET deleted_at = {NOW} WHERE id = ?"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.for_query(EntityKind::Exercise, 1))?;
        tx.commit().await.map_err(SqlxErrorExt::unavailable)?;

        let mut stale = vec![Key::exercise(id)];
        stale.extend(set_ids.into_iter().map(Key::set_entry));
        stale.push(Key::workout_session(session_id));
        debug!(exercise = id, stale = stale.len(), "soft-deleted exercise");
        Ok(stale)
    }

    /// Soft-delete a session together with its exercises and their sets.
    ///
    /// Stales every deleted record, plus the routine the session followed
    /// (its session list shrank).
    pub async fn soft_delete_workout_session(&self, id: i64) -> SqlxResult<Vec<Key>> {
        let mut tx = self.pool.begin().await.map_err(SqlxErrorExt::unavailable)?;
        let row = sqlx::query(
            "SELECT workout_routine_id FROM workout_sessions WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| e.for_query(EntityKind::WorkoutSession, 1))?;
        let Some(row) = row else {
            return Err(DataError::NotFound(Key::workout_session(id)));
        };
        let routine_id: Option<i64> = row
            .try_get(0)
            .map_err(|e| e.for_query(EntityKind::WorkoutSession, 1))?;

        let sessions = [id];
        let (exercise_ids, set_ids) = session_descendants(&mut tx, &sessions).await?;
        soft_delete_sessions(&mut tx, &sessions, &exercise_ids, &set_ids).await?;
        tx.commit().await.map_err(SqlxErrorExt::unavailable)?;

        let mut stale = vec![Key::workout_session(id)];
        stale.extend(exercise_ids.into_iter().map(Key::exercise));
        stale.extend(set_ids.into_iter().map(Key::set_entry));
        stale.extend(routine_id.map(Key::workout_routine));
        debug!(session = id, stale = stale.len(), "soft-deleted workout session");
        Ok(stale)
    }

    /// Soft-delete a routine, its planned exercises, and every session that
    /// followed it along with those sessions' exercises and sets.
    ///
    /// Stales every deleted record.
    pub async fn soft_delete_workout_routine(&self, id: i64) -> SqlxResult<Vec<Key>> {
        let mut tx = self.pool.begin().await.map_err(SqlxErrorExt::unavailable)?;
        let result = sqlx::query(&format!(
            "UPDATE workout_routines SET deleted_at = {NOW} WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.for_query(EntityKind::WorkoutRoutine, 1))?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(Key::workout_routine(id)));
        }

        let planned: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM exercise_routines WHERE workout_routine_id = ? AND deleted_at IS NULL ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| e.for_query(EntityKind::ExerciseRoutine, 1))?;
        sqlx::query(&format!(
            "UPDATE exercise_routines SET deleted_at = {NOW} WHERE workout_routine_id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.for_query(EntityKind::ExerciseRoutine, planned.len()))?;

        let session_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM workout_sessions WHERE workout_routine_id = ? AND deleted_at IS NULL ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| e.for_query(EntityKind::WorkoutSession, 1))?;
        let (exercise_ids, set_ids) = session_descendants(&mut tx, &session_ids).await?;
        soft_delete_sessions(&mut tx, &session_ids, &exercise_ids, &set_ids).await?;
        tx.commit().await.map_err(SqlxErrorExt::unavailable)?;

        let mut stale = vec![Key::workout_routine(id)];
        stale.extend(planned.into_iter().map(Key::exercise_routine));
        stale.extend(session_ids.into_iter().map(Key::workout_session));
        stale.extend(exercise_ids.into_iter().map(Key::exercise));
        stale.extend(set_ids.into_iter().map(Key::set_entry));
        debug!(routine = id, stale = stale.len(), "soft-deleted workout routine");
        Ok(stale)
    }

    async fn select_rows(
        &self,
        kind: EntityKind,
        filter_column: &str,
        ids: &[i64],
    ) -> SqlxResult<Vec<Record>> {
        let keys = ids.len();
        let mut query = QueryBuilder::<Sqlite>::new("SELECT ");
        query
            .push(columns(kind).join(", "))
            .push(" FROM ")
            .push(table_name(kind))
            .push(" WHERE deleted_at IS NULL AND ")
            .push(filter_column);
        push_id_list(&mut query, ids.iter().copied());
        query.push(" ORDER BY id");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.for_query(kind, keys))?;
        rows.iter()
            .map(|row| decode(kind, row).map_err(|e| e.for_query(kind, keys)))
            .collect()
    }
}

impl Storage for SqlxStorage {
    fn fetch_many<'a>(
        &'a self,
        kind: EntityKind,
        keys: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, Record>> {
        Box::pin(async move {
            if keys.is_empty() {
                return Ok(HashMap::new());
            }
            let ids: Vec<i64> = ids_of(kind, keys).collect();
            let records = self.select_rows(kind, "id", &ids).await?;
            Ok(records.into_iter().map(|r| (r.key(), r)).collect())
        })
    }

    fn fetch_owner_links<'a>(
        &'a self,
        kind: EntityKind,
        keys: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, OwnerLink>> {
        Box::pin(async move {
            if keys.is_empty() {
                return Ok(HashMap::new());
            }
            let mut query = QueryBuilder::<Sqlite>::new("SELECT id, ");
            query
                .push(link_column(kind))
                .push(" AS link FROM ")
                .push(table_name(kind))
                .push(" WHERE deleted_at IS NULL AND id");
            push_id_list(&mut query, ids_of(kind, keys));

            let rows = query
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.for_query(kind, keys.len()))?;
            let mut links = HashMap::with_capacity(rows.len());
            for row in rows {
                let id: i64 = row.try_get("id").map_err(|e| e.for_query(kind, keys.len()))?;
                let link: i64 = row
                    .try_get("link")
                    .map_err(|e| e.for_query(kind, keys.len()))?;
                let link = match kind.owner_parent() {
                    None => OwnerLink::Owner(UserId(link)),
                    Some(parent) => OwnerLink::Parent(Key::new(parent, link)),
                };
                links.insert(Key::new(kind, id), link);
            }
            Ok(links)
        })
    }

    fn fetch_children<'a>(
        &'a self,
        relation: Relation,
        parents: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, Vec<Record>>> {
        Box::pin(async move {
            if parents.is_empty() {
                return Ok(HashMap::new());
            }
            let ids: Vec<i64> = ids_of(relation.parent_kind(), parents).collect();
            let records = self
                .select_rows(relation.child_kind(), relation.foreign_key(), &ids)
                .await?;
            let mut children: HashMap<Key, Vec<Record>> = HashMap::new();
            for record in records {
                if let Some(parent) = relation.parent_of(&record) {
                    children.entry(parent).or_default().push(record);
                }
            }
            Ok(children)
        })
    }

    fn fetch_owner_chain<'a>(&'a self, key: Key) -> StorageFuture<'a, Option<UserId>> {
        Box::pin(async move {
            let owner: Option<i64> = sqlx::query_scalar(owner_chain_sql(key.kind()))
                .bind(key.id())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| e.for_query(key.kind(), 1))?;
            Ok(owner.map(UserId))
        })
    }
}

/// Live exercises and sets under `sessions`, in id order.
async fn session_descendants(
    tx: &mut Transaction<'_, Sqlite>,
    sessions: &[i64],
) -> SqlxResult<(Vec<i64>, Vec<i64>)> {
    if sessions.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT id FROM exercises WHERE deleted_at IS NULL AND workout_session_id",
    );
    push_id_list(&mut query, sessions.iter().copied());
    query.push(" ORDER BY id");
    let exercises: Vec<i64> = query
        .build_query_scalar::<i64>()
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| e.for_query(EntityKind::Exercise, sessions.len()))?;
    if exercises.is_empty() {
        return Ok((exercises, Vec::new()));
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT id FROM set_entries WHERE deleted_at IS NULL AND exercise_id",
    );
    push_id_list(&mut query, exercises.iter().copied());
    query.push(" ORDER BY id");
    let sets: Vec<i64> = query
        .build_query_scalar::<i64>()
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| e.for_query(EntityKind::SetEntry, exercises.len()))?;
    Ok((exercises, sets))
}

/// Stamp `deleted_at` on the given sessions, exercises and sets.
async fn soft_delete_sessions(
    tx: &mut Transaction<'_, Sqlite>,
    sessions: &[i64],
    exercises: &[i64],
    sets: &[i64],
) -> SqlxResult<()> {
    for (kind, ids) in [
        (EntityKind::SetEntry, sets),
        (EntityKind::Exercise, exercises),
        (EntityKind::WorkoutSession, sessions),
    ] {
        if ids.is_empty() {
            continue;
        }
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE ");
        query
            .push(table_name(kind))
            .push(format!(" SET deleted_at = {NOW} WHERE id"));
        push_id_list(&mut query, ids.iter().copied());
        query
            .build()
            .execute(&mut **tx)
            .await
            .map_err(|e| e.for_query(kind, ids.len()))?;
    }
    Ok(())
}

fn ids_of(kind: EntityKind, keys: &[Key]) -> impl Iterator<Item = i64> + '_ {
    keys.iter().filter(move |k| k.kind() == kind).map(Key::id)
}

fn push_id_list(query: &mut QueryBuilder<'_, Sqlite>, ids: impl Iterator<Item = i64>) {
    query.push(" IN (");
    let mut list = query.separated(", ");
    for id in ids {
        list.push_bind(id);
    }
    list.push_unseparated(")");
}

/// Column holding the one-hop ownership link of `kind`.
fn link_column(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::WorkoutRoutine | EntityKind::WorkoutSession => "user_id",
        EntityKind::ExerciseRoutine => "workout_routine_id",
        EntityKind::Exercise => "workout_session_id",
        EntityKind::SetEntry => "exercise_id",
    }
}

/// Single query resolving the owning user of one record. Any soft-deleted
/// hop makes the row disappear.
fn owner_chain_sql(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::WorkoutRoutine => {
            "SELECT user_id FROM workout_routines WHERE id = ? AND deleted_at IS NULL"
        }
        EntityKind::WorkoutSession => {
            "SELECT user_id FROM workout_sessions WHERE id = ? AND deleted_at IS NULL"
        }
        EntityKind::ExerciseRoutine => {
            "SELECT r.user_id FROM exercise_routines c \
             JOIN workout_routines r ON r.id = c.workout_routine_id AND r.deleted_at IS NULL \
             WHERE c.id = ? AND c.deleted_at IS NULL"
        }
        EntityKind::Exercise => {
            "SELECT w.user_id FROM exercises e \
             JOIN workout_sessions w ON w.id = e.workout_session_id AND w.deleted_at IS NULL \
             WHERE e.id = ? AND e.deleted_at IS NULL"
        }
        EntityKind::SetEntry => {
            "SELECT w.user_id FROM set_entries s \
             JOIN exercises e ON e.id = s.exercise_id AND e.deleted_at IS NULL \
             JOIN workout_sessions w ON w.id = e.workout_session_id AND w.deleted_at IS NULL \
             WHERE s.id = ? AND s.deleted_at IS NULL"
        }
    }
}

fn decode(kind: EntityKind, row: &SqliteRow) -> Result<Record, sqlx::Error> {
    let record = match kind {
        EntityKind::WorkoutRoutine => Record::from(WorkoutRoutine {
            id: row.try_get("id")?,
            user_id: UserId(row.try_get("user_id")?),
            name: row.try_get("name")?,
            active: row.try_get("active")?,
        }),
        EntityKind::ExerciseRoutine => Record::from(ExerciseRoutine {
            id: row.try_get("id")?,
            workout_routine_id: row.try_get("workout_routine_id")?,
            name: row.try_get("name")?,
            sets: row.try_get("sets")?,
            reps: row.try_get("reps")?,
        }),
        EntityKind::WorkoutSession => Record::from(WorkoutSession {
            id: row.try_get("id")?,
            user_id: UserId(row.try_get("user_id")?),
            workout_routine_id: row.try_get("workout_routine_id")?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
            notes: row.try_get("notes")?,
        }),
        EntityKind::Exercise => Record::from(Exercise {
            id: row.try_get("id")?,
            workout_session_id: row.try_get("workout_session_id")?,
            exercise_routine_id: row.try_get("exercise_routine_id")?,
            name: row.try_get("name")?,
            notes: row.try_get("notes")?,
        }),
        EntityKind::SetEntry => Record::from(SetEntry {
            id: row.try_get("id")?,
            exercise_id: row.try_get("exercise_id")?,
            weight: row.try_get("weight")?,
            reps: row.try_get("reps")?,
        }),
    };
    Ok(record)
}
