use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::{BoxFuture, FutureExt};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::{Db, DbTransaction};
use crate::errors::BackendError;
use crate::recording::{AnimationMetadata, AnimationRecord, Id, RecordPatch};

#[derive(Default)]
struct State {
    records: BTreeMap<Id, AnimationRecord>,
    last_id: Id,
    fail_commits: bool,
}

/// A store that keeps its records in memory.
#[derive(Clone, Default)]
pub struct MemoryDb {
    state: Arc<RwLock<State>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Default::default()
    }

    /// Makes every subsequent write fail as if the database had gone away
    /// at commit time.
    pub fn set_fail_commits(&self, fail: bool) -> Result<(), BackendError> {
        self.state.write().map_err(|_| poisoned())?.fail_commits = fail;

        Ok(())
    }
}

fn read(state: &RwLock<State>) -> Result<RwLockReadGuard<State>, BackendError> {
    state.read().map_err(|_| poisoned())
}

fn write(state: &RwLock<State>) -> Result<RwLockWriteGuard<State>, BackendError> {
    let guard = state.write().map_err(|_| poisoned())?;

    if guard.fail_commits {
        return Err(BackendError::StoreUnavailable {
            reason: "commit refused".to_owned(),
        });
    }

    Ok(guard)
}

fn poisoned() -> BackendError {
    BackendError::StoreUnavailable {
        reason: "memory store lock poisoned".to_owned(),
    }
}

impl Db for MemoryDb {
    fn insert(&self, metadata: AnimationMetadata) -> BoxFuture<Result<AnimationRecord, BackendError>> {
        async move {
            let mut state = write(&self.state)?;

            state.last_id += 1;
            let record = AnimationRecord::new(
                state.last_id,
                Uuid::new_v4(),
                OffsetDateTime::now_utc(),
                metadata,
            );
            state.records.insert(record.id(), record.clone());

            Ok(record)
        }
        .boxed()
    }

    fn retrieve_all(&self) -> BoxFuture<Result<Vec<AnimationRecord>, BackendError>> {
        async move { Ok(read(&self.state)?.records.values().cloned().collect()) }.boxed()
    }

    fn retrieve(&self, id: Id) -> BoxFuture<Result<Option<AnimationRecord>, BackendError>> {
        async move { Ok(read(&self.state)?.records.get(&id).cloned()) }.boxed()
    }

    fn update_fields(&self, id: Id, patch: RecordPatch) -> BoxFuture<Result<(), BackendError>> {
        async move {
            let mut state = write(&self.state)?;

            let record = state
                .records
                .get_mut(&id)
                .ok_or(BackendError::NonExistentId(id))?;
            record.apply(&patch);

            Ok(())
        }
        .boxed()
    }

    fn delete_many(&self, ids: &BTreeSet<Id>) -> BoxFuture<Result<u64, BackendError>> {
        let ids = ids.clone();

        async move {
            let mut state = write(&self.state)?;

            let count = ids
                .iter()
                .filter(|id| state.records.remove(*id).is_some())
                .count();

            Ok(count as u64)
        }
        .boxed()
    }

    fn count_all(&self) -> BoxFuture<Result<i64, BackendError>> {
        async move { Ok(read(&self.state)?.records.len() as i64) }.boxed()
    }

    fn begin(&self) -> BoxFuture<Result<Box<dyn DbTransaction>, BackendError>> {
        let transaction = MemoryTransaction {
            state: self.state.clone(),
            pending: BTreeMap::new(),
        };

        async move { Ok(Box::new(transaction) as Box<dyn DbTransaction>) }.boxed()
    }
}

/// Collects patched copies of records and swaps them in on commit.
struct MemoryTransaction {
    state: Arc<RwLock<State>>,
    pending: BTreeMap<Id, AnimationRecord>,
}

impl MemoryTransaction {
    fn current(&self, id: Id) -> Result<Option<AnimationRecord>, BackendError> {
        match self.pending.get(&id) {
            Some(record) => Ok(Some(record.clone())),
            None => Ok(read(&self.state)?.records.get(&id).cloned()),
        }
    }
}

impl DbTransaction for MemoryTransaction {
    fn retrieve(&mut self, id: Id) -> BoxFuture<Result<Option<AnimationRecord>, BackendError>> {
        async move { self.current(id) }.boxed()
    }

    fn update_fields(&mut self, id: Id, patch: RecordPatch) -> BoxFuture<Result<(), BackendError>> {
        async move {
            let mut record = self.current(id)?.ok_or(BackendError::NonExistentId(id))?;
            record.apply(&patch);
            self.pending.insert(id, record);

            Ok(())
        }
        .boxed()
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>> {
        async move {
            let MemoryTransaction { state, pending } = *self;
            let mut state = write(&state)?;

            for (id, record) in pending {
                // records deleted since the transaction began stay deleted
                if let Some(existing) = state.records.get_mut(&id) {
                    *existing = record;
                }
            }

            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::AnimationMetadata;

    fn metadata(name: &str) -> AnimationMetadata {
        AnimationMetadata {
            file_path: None,
            original_filename: name.to_owned(),
            file_size_kb: None,
            duration_seconds: 12.5,
            frame_count: 300,
            frame_time: 0.0333,
            fps: 30.0,
            skeleton_type: None,
            bone_count: 42,
            has_fingers: false,
            rest_pose_height: None,
            animation_style: None,
            description: None,
            actor_gender: None,
            loopable: false,
        }
    }

    #[tokio::test]
    async fn insert_assigns_identifiers() {
        let db = MemoryDb::new();

        let first = db.insert(metadata("walk01")).await.expect("insert first");
        let second = db.insert(metadata("walk02")).await.expect("insert second");

        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);
        assert_ne!(first.external_id(), second.external_id());
        assert_eq!(first.metadata(), &metadata("walk01"));
    }

    #[tokio::test]
    async fn update_of_missing_record_fails() {
        let db = MemoryDb::new();

        let result = db.update_fields(9, RecordPatch::default()).await;

        assert!(matches!(result, Err(BackendError::NonExistentId(9))));
        assert_eq!(db.count_all().await.expect("count records"), 0);
    }

    #[tokio::test]
    async fn dropped_transaction_changes_nothing() {
        let db = MemoryDb::new();
        let record = db.insert(metadata("idle")).await.expect("insert record");

        {
            let mut transaction = db.begin().await.expect("begin transaction");
            let patch = RecordPatch {
                bone_count: Some(7),
                ..Default::default()
            };
            transaction
                .update_fields(record.id(), patch)
                .await
                .expect("update within transaction");

            let seen = transaction
                .retrieve(record.id())
                .await
                .expect("retrieve within transaction")
                .expect("record exists within transaction");
            assert_eq!(seen.metadata().bone_count, 7);
        }

        let stored = db.retrieve(record.id()).await.expect("retrieve record");
        assert_eq!(stored, Some(record));
    }

    #[tokio::test]
    async fn refused_commit_keeps_previous_state() {
        let db = MemoryDb::new();
        let record = db.insert(metadata("jump")).await.expect("insert record");

        let mut transaction = db.begin().await.expect("begin transaction");
        let patch = RecordPatch {
            loopable: Some(true),
            ..Default::default()
        };
        transaction
            .update_fields(record.id(), patch)
            .await
            .expect("update within transaction");

        db.set_fail_commits(true).expect("make commits fail");
        assert!(transaction.commit().await.is_err());
        db.set_fail_commits(false).expect("make commits succeed");

        let stored = db.retrieve(record.id()).await.expect("retrieve record");
        assert_eq!(stored, Some(record));
    }
}
