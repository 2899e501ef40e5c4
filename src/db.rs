use std::collections::BTreeSet;

use futures::future::BoxFuture;

use crate::errors::BackendError;
use crate::recording::{AnimationMetadata, AnimationRecord, Id, RecordPatch};

pub mod memory;

/// The store that owns every persisted record. Each method runs as its
/// own transaction; `begin` hands out a transaction spanning several
/// lookups and updates.
pub trait Db {
    /// Persists a validated record, assigning its ID, external ID and
    /// upload time.
    fn insert(&self, metadata: AnimationMetadata) -> BoxFuture<Result<AnimationRecord, BackendError>>;

    /// Returns every record, ordered by ID.
    fn retrieve_all(&self) -> BoxFuture<Result<Vec<AnimationRecord>, BackendError>>;

    fn retrieve(&self, id: Id) -> BoxFuture<Result<Option<AnimationRecord>, BackendError>>;

    /// Applies a patch to exactly one record. Never creates a record.
    fn update_fields(&self, id: Id, patch: RecordPatch) -> BoxFuture<Result<(), BackendError>>;

    /// Deletes the given records, ignoring IDs that don't exist, and
    /// returns how many were actually removed.
    fn delete_many(&self, ids: &BTreeSet<Id>) -> BoxFuture<Result<u64, BackendError>>;

    fn count_all(&self) -> BoxFuture<Result<i64, BackendError>>;

    fn begin(&self) -> BoxFuture<Result<Box<dyn DbTransaction>, BackendError>>;
}

/// A transaction against the store. Dropping it without calling `commit`
/// rolls back everything done through it.
pub trait DbTransaction: Send {
    fn retrieve(&mut self, id: Id) -> BoxFuture<Result<Option<AnimationRecord>, BackendError>>;

    fn update_fields(&mut self, id: Id, patch: RecordPatch) -> BoxFuture<Result<(), BackendError>>;

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>>;
}

pub use self::postgres::*;

mod postgres {
    use std::collections::BTreeSet;

    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgArguments, PgConnection, PgPool, PgPoolOptions, PgRow},
        query::Query,
        Postgres, Transaction,
    };
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::config::DbSettings;
    use crate::errors::BackendError;
    use crate::recording::{
        ActorGender, AnimationMetadata, AnimationRecord, Id, RecordPatch,
    };

    const ANIMATIONS_EXTERNAL_ID_CONSTRAINT: &str = "animations_external_id";

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }

        /// Opens a pool using the given settings.
        pub async fn connect(settings: &DbSettings) -> Result<Self, BackendError> {
            let pool = PgPoolOptions::new()
                .max_connections(settings.max_connections())
                .connect(settings.connection_string())
                .await
                .map_err(map_sqlx_error)?;

            Ok(PgDb::new(pool))
        }

        /// Closes every connection in the pool.
        pub async fn close(&self) {
            self.pool.close().await;
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn insert(
            &self,
            metadata: AnimationMetadata,
        ) -> BoxFuture<Result<AnimationRecord, BackendError>> {
            async move {
                let query = sqlx::query_as(include_str!("queries/create.sql"));

                let (id, external_id, uploaded_at): (Id, Uuid, OffsetDateTime) = query
                    .bind(&metadata.file_path)
                    .bind(&metadata.original_filename)
                    .bind(metadata.file_size_kb)
                    .bind(metadata.duration_seconds)
                    .bind(metadata.frame_count)
                    .bind(metadata.frame_time)
                    .bind(metadata.fps)
                    .bind(&metadata.skeleton_type)
                    .bind(metadata.bone_count)
                    .bind(metadata.has_fingers)
                    .bind(metadata.rest_pose_height)
                    .bind(&metadata.animation_style)
                    .bind(&metadata.description)
                    .bind(metadata.actor_gender)
                    .bind(metadata.loopable)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(AnimationRecord::new(id, external_id, uploaded_at, metadata))
            }
            .boxed()
        }

        fn retrieve_all(&self) -> BoxFuture<Result<Vec<AnimationRecord>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_all.sql"));

                let records = query
                    .try_map(|row: PgRow| animation_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(records)
            }
            .boxed()
        }

        fn retrieve(&self, id: Id) -> BoxFuture<Result<Option<AnimationRecord>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve.sql"));

                let record = query
                    .bind(id)
                    .try_map(|row: PgRow| animation_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(record)
            }
            .boxed()
        }

        fn update_fields(&self, id: Id, patch: RecordPatch) -> BoxFuture<Result<(), BackendError>> {
            async move {
                let mut connection = self.pool.acquire().await.map_err(map_sqlx_error)?;

                update_fields(&mut connection, id, &patch).await
            }
            .boxed()
        }

        fn delete_many(&self, ids: &BTreeSet<Id>) -> BoxFuture<Result<u64, BackendError>> {
            let ids: Vec<Id> = ids.iter().copied().collect();

            async move {
                if ids.is_empty() {
                    return Ok(0);
                }

                let query = sqlx::query(include_str!("queries/delete_many.sql"));

                let count = query
                    .bind(ids)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                Ok(count)
            }
            .boxed()
        }

        fn count_all(&self) -> BoxFuture<Result<i64, BackendError>> {
            async move {
                let query = sqlx::query_as::<_, (i64,)>(include_str!("queries/count.sql"));

                let (count,) = query.fetch_one(&self.pool).await.map_err(map_sqlx_error)?;

                Ok(count)
            }
            .boxed()
        }

        fn begin(&self) -> BoxFuture<Result<Box<dyn super::DbTransaction>, BackendError>> {
            async move {
                let transaction = self.pool.begin().await.map_err(map_sqlx_error)?;

                Ok(Box::new(PgTransaction { transaction }) as Box<dyn super::DbTransaction>)
            }
            .boxed()
        }
    }

    pub struct PgTransaction {
        transaction: Transaction<'static, Postgres>,
    }

    impl super::DbTransaction for PgTransaction {
        fn retrieve(&mut self, id: Id) -> BoxFuture<Result<Option<AnimationRecord>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_for_update.sql"));

                let record = query
                    .bind(id)
                    .try_map(|row: PgRow| animation_from_row(&row))
                    .fetch_optional(&mut *self.transaction)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(record)
            }
            .boxed()
        }

        fn update_fields(
            &mut self,
            id: Id,
            patch: RecordPatch,
        ) -> BoxFuture<Result<(), BackendError>> {
            async move { update_fields(&mut self.transaction, id, &patch).await }.boxed()
        }

        fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>> {
            async move { self.transaction.commit().await.map_err(map_sqlx_error) }.boxed()
        }
    }

    /// A column value in a partial update.
    enum ColumnValue {
        Text(Option<String>),
        Integer(Option<i32>),
        Decimal(Option<f64>),
        Boolean(bool),
        Gender(Option<ActorGender>),
    }

    fn assignments(patch: &RecordPatch) -> Vec<(&'static str, ColumnValue)> {
        use ColumnValue::*;

        let mut assignments = vec![];

        let mut push = |column: &'static str, value: Option<ColumnValue>| {
            if let Some(value) = value {
                assignments.push((column, value));
            }
        };

        push("file_path", patch.file_path.clone().map(Text));
        push("original_filename", patch.original_filename.clone().map(|v| Text(Some(v))));
        push("file_size_kb", patch.file_size_kb.map(Integer));
        push("duration_seconds", patch.duration_seconds.map(|v| Decimal(Some(v))));
        push("frame_count", patch.frame_count.map(|v| Integer(Some(v))));
        push("frame_time", patch.frame_time.map(|v| Decimal(Some(v))));
        push("fps", patch.fps.map(|v| Decimal(Some(v))));
        push("skeleton_type", patch.skeleton_type.clone().map(Text));
        push("bone_count", patch.bone_count.map(|v| Integer(Some(v))));
        push("has_fingers", patch.has_fingers.map(Boolean));
        push("rest_pose_height", patch.rest_pose_height.map(Decimal));
        push("animation_style", patch.animation_style.clone().map(Text));
        push("description", patch.description.clone().map(Text));
        push("actor_gender", patch.actor_gender.map(Gender));
        push("loopable", patch.loopable.map(Boolean));

        assignments
    }

    fn update_statement(assignments: &[(&'static str, ColumnValue)]) -> String {
        let columns = assignments
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ${}", column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "UPDATE animations SET {} WHERE id = ${}",
            columns,
            assignments.len() + 1
        )
    }

    fn bind_value<'q>(
        query: Query<'q, Postgres, PgArguments>,
        value: ColumnValue,
    ) -> Query<'q, Postgres, PgArguments> {
        match value {
            ColumnValue::Text(v) => query.bind(v),
            ColumnValue::Integer(v) => query.bind(v),
            ColumnValue::Decimal(v) => query.bind(v),
            ColumnValue::Boolean(v) => query.bind(v),
            ColumnValue::Gender(v) => query.bind(v),
        }
    }

    async fn update_fields(
        connection: &mut PgConnection,
        id: Id,
        patch: &RecordPatch,
    ) -> Result<(), BackendError> {
        let assignments = assignments(patch);

        let found = if assignments.is_empty() {
            let query = sqlx::query_as::<_, (bool,)>(include_str!("queries/exists.sql"));

            let (exists,) = query
                .bind(id)
                .fetch_one(&mut *connection)
                .await
                .map_err(map_sqlx_error)?;

            exists
        } else {
            let statement = update_statement(&assignments);
            let mut query = sqlx::query(&statement);

            for (_, value) in assignments {
                query = bind_value(query, value);
            }

            let count = query
                .bind(id)
                .execute(&mut *connection)
                .await
                .map_err(map_sqlx_error)?
                .rows_affected();

            count > 0
        };

        if found {
            Ok(())
        } else {
            Err(BackendError::NonExistentId(id))
        }
    }

    fn animation_from_row(row: &PgRow) -> Result<AnimationRecord, sqlx::Error> {
        use sqlx::Row;

        let metadata = AnimationMetadata {
            file_path: row.try_get("file_path")?,
            original_filename: row.try_get("original_filename")?,
            file_size_kb: row.try_get("file_size_kb")?,
            duration_seconds: row.try_get("duration_seconds")?,
            frame_count: row.try_get("frame_count")?,
            frame_time: row.try_get("frame_time")?,
            fps: row.try_get("fps")?,
            skeleton_type: row.try_get("skeleton_type")?,
            bone_count: row.try_get("bone_count")?,
            has_fingers: row.try_get("has_fingers")?,
            rest_pose_height: row.try_get("rest_pose_height")?,
            animation_style: row.try_get("animation_style")?,
            description: row.try_get("description")?,
            actor_gender: row.try_get("actor_gender")?,
            loopable: row.try_get("loopable")?,
        };

        Ok(AnimationRecord::new(
            row.try_get("id")?,
            row.try_get("external_id")?,
            row.try_get("uploaded_at")?,
            metadata,
        ))
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        use sqlx::Error;

        match error {
            Error::Database(ref e) if e.constraint() == Some(ANIMATIONS_EXTERNAL_ID_CONSTRAINT) => {
                BackendError::DuplicateExternalId
            }
            _ => BackendError::Sqlx { source: error },
        }
    }

}
