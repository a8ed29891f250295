// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;
use uuid::Uuid;

use crate::errors::{Error, Result};

/// One deployed workload, as the metadata store records it.
///
/// `fingerprint` is a function of the exact artifact bytes, and
/// `(runtime_type, fingerprint)` is the deduplication key: two uploads of
/// the same bytes resolve to the same record. The runtime type is kept as
/// the stored string and parsed at dispatch so a corrupted record surfaces
/// an invalid-kind error instead of panicking.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub id: Uuid,
    pub runtime_type: String,
    pub fingerprint: String,
    pub artifact_key: String,
    pub args: Vec<String>,
    pub preopened_dir: Option<PathBuf>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

/// Read/write interface of the deployment metadata store.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn create(&self, deployment: Deployment) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Deployment>>;
    async fn find_by_fingerprint(
        &self,
        runtime_type: &str,
        fingerprint: &str,
    ) -> Result<Option<Deployment>>;
    async fn list(&self) -> Result<Vec<Deployment>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// In-memory metadata store.
#[derive(Default)]
pub struct MemoryDeploymentStore {
    records: Mutex<HashMap<Uuid, Deployment>>,
}

impl MemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Deployment>>> {
        self.records
            .lock()
            .map_err(|_| Error::InvalidConfig("metadata store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DeploymentStore for MemoryDeploymentStore {
    async fn create(&self, deployment: Deployment) -> Result<()> {
        self.lock()?.insert(deployment.id, deployment);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Deployment>> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn find_by_fingerprint(
        &self,
        runtime_type: &str,
        fingerprint: &str,
    ) -> Result<Option<Deployment>> {
        Ok(self
            .lock()?
            .values()
            .find(|d| {
                d.runtime_type.eq_ignore_ascii_case(runtime_type) && d.fingerprint == fingerprint
            })
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Deployment>> {
        let mut all: Vec<Deployment> = self.lock()?.values().cloned().collect();
        all.sort_by_key(|d| d.created_at);
        Ok(all)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.lock()?.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(runtime_type: &str, fingerprint: &str) -> Deployment {
        let now = SystemTime::now();
        Deployment {
            id: Uuid::new_v4(),
            runtime_type: runtime_type.to_string(),
            fingerprint: fingerprint.to_string(),
            artifact_key: "key.wasm".to_string(),
            args: vec![],
            preopened_dir: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_then_find_by_id() {
        let store = MemoryDeploymentStore::new();
        let deployment = record("wasm", "abc123");
        store.create(deployment.clone()).await.unwrap();

        let found = store.find_by_id(deployment.id).await.unwrap().unwrap();
        assert_eq!(found.fingerprint, "abc123");
    }

    #[tokio::test]
    async fn find_by_fingerprint_matches_kind_and_hash() {
        let store = MemoryDeploymentStore::new();
        let wasm = record("wasm", "samefp");
        let js = record("js", "samefp");
        store.create(wasm.clone()).await.unwrap();
        store.create(js.clone()).await.unwrap();

        let found = store.find_by_fingerprint("js", "samefp").await.unwrap().unwrap();
        assert_eq!(found.id, js.id);
        assert!(store
            .find_by_fingerprint("wasm", "otherfp")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let store = MemoryDeploymentStore::new();
        let deployment = record("wasm", "fp");
        store.create(deployment.clone()).await.unwrap();
        store.delete(deployment.id).await.unwrap();
        assert!(store.find_by_id(deployment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_returns_all_records() {
        let store = MemoryDeploymentStore::new();
        store.create(record("wasm", "a")).await.unwrap();
        store.create(record("js", "b")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
    }
}
