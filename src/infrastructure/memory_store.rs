use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::DynamicImage;

use crate::application::{AppError, AppResult, SnapshotStore, TargetStore};
use crate::domain::{ChannelConfig, MonitorTarget};

/// In-memory configuration store. Backs the test suite and makes the
/// run-metadata writes observable without a database.
#[derive(Clone, Default)]
pub struct InMemoryTargetStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    targets: HashMap<String, MonitorTarget>,
    channels: Vec<ChannelConfig>,
}

impl InMemoryTargetStore {
    pub fn new(targets: Vec<MonitorTarget>) -> Self {
        let store = Self::default();
        {
            let mut inner = store.inner.lock().expect("store lock");
            for t in targets {
                inner.targets.insert(t.id.clone(), t);
            }
        }
        store
    }

    pub fn set_channels(&self, channels: Vec<ChannelConfig>) {
        self.inner.lock().expect("store lock").channels = channels;
    }

    pub fn insert(&self, target: MonitorTarget) {
        self.inner
            .lock()
            .expect("store lock")
            .targets
            .insert(target.id.clone(), target);
    }

    pub fn delete(&self, target_id: &str) {
        self.inner.lock().expect("store lock").targets.remove(target_id);
    }

    /// Current state of a row, run metadata included.
    pub fn snapshot_of(&self, target_id: &str) -> Option<MonitorTarget> {
        self.inner
            .lock()
            .expect("store lock")
            .targets
            .get(target_id)
            .cloned()
    }
}

#[async_trait]
impl TargetStore for InMemoryTargetStore {
    async fn get_target(&self, id: &str) -> AppResult<Option<MonitorTarget>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))?;
        Ok(inner.targets.get(id).cloned())
    }

    async fn list_active_targets(&self) -> AppResult<Vec<MonitorTarget>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))?;
        let mut targets: Vec<_> = inner
            .targets
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect();
        targets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(targets)
    }

    async fn update_run_metadata(
        &self,
        id: &str,
        last_checked: DateTime<Utc>,
        last_changed: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))?;
        if let Some(target) = inner.targets.get_mut(id) {
            target.last_checked = Some(last_checked);
            if last_changed.is_some() {
                target.last_changed = last_changed;
            }
        }
        Ok(())
    }

    async fn channel_set(&self) -> AppResult<Vec<ChannelConfig>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))?;
        Ok(inner.channels.clone())
    }
}

/// In-memory snapshot store for tests.
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    images: Arc<Mutex<HashMap<String, DynamicImage>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().expect("flag lock") = fail;
    }

    pub fn stored(&self, target_id: &str) -> Option<DynamicImage> {
        self.images
            .lock()
            .expect("images lock")
            .get(target_id)
            .cloned()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get(&self, target_id: &str) -> AppResult<Option<DynamicImage>> {
        let images = self
            .images
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))?;
        Ok(images.get(target_id).cloned())
    }

    async fn put(&self, target_id: &str, image: &DynamicImage) -> AppResult<()> {
        if *self.fail_writes.lock().expect("flag lock") {
            return Err(AppError::Storage("simulated snapshot write failure".into()));
        }
        let mut images = self
            .images
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))?;
        images.insert(target_id.to_string(), image.clone());
        Ok(())
    }

    async fn remove(&self, target_id: &str) -> AppResult<()> {
        let mut images = self
            .images
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))?;
        images.remove(target_id);
        Ok(())
    }
}
