use super::{BackendError, Memo, MemoBackend, MemoPatch, NewMemo};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Store {
    next_id: i64,
    memos: BTreeMap<i64, Memo>,
}

/// Process-local memo store, ids start at 1.
#[derive(Default)]
pub struct MemoryBackend {
    store: Mutex<Store>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl MemoBackend for MemoryBackend {
    async fn create(&self, memo: NewMemo) -> Result<Memo, BackendError> {
        let mut store = self.store.lock().await;
        store.next_id += 1;
        let stamp = now();
        let memo = Memo {
            id: store.next_id,
            title: memo.title,
            content: memo.content,
            created_at: Some(stamp.clone()),
            updated_at: Some(stamp),
        };
        store.memos.insert(memo.id, memo.clone());
        Ok(memo)
    }

    async fn list(&self, skip: u64, limit: u64) -> Result<Vec<Memo>, BackendError> {
        let store = self.store.lock().await;
        Ok(store
            .memos
            .values()
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Memo, BackendError> {
        let store = self.store.lock().await;
        store.memos.get(&id).cloned().ok_or(BackendError::NotFound(id))
    }

    async fn update(&self, id: i64, patch: MemoPatch) -> Result<Memo, BackendError> {
        let mut store = self.store.lock().await;
        let memo = store.memos.get_mut(&id).ok_or(BackendError::NotFound(id))?;
        if let Some(title) = patch.title {
            memo.title = title;
        }
        if let Some(content) = patch.content {
            memo.content = Some(content);
        }
        memo.updated_at = Some(now());
        Ok(memo.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), BackendError> {
        let mut store = self.store.lock().await;
        store
            .memos
            .remove(&id)
            .map(|_| ())
            .ok_or(BackendError::NotFound(id))
    }
}
