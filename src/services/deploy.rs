// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::runtime::RuntimeKind;
use crate::store::{Deployment, DeploymentStore, ObjectStore};
use crate::utils::fingerprint;

/// An upload: the runtime kind, the artifact bytes, and optional sandbox
/// options carried with the deployment.
pub struct DeployRequest {
    pub runtime_type: String,
    pub file: Bytes,
    pub args: Vec<String>,
    pub preopened_dir: Option<PathBuf>,
}

/// Result of a deployment operation. `is_existing` is true when an identical
/// `(kind, fingerprint)` was already deployed; the existing record is
/// returned unchanged.
#[derive(Debug)]
pub struct DeployOutcome {
    pub deployment: Deployment,
    pub is_existing: bool,
}

/// Deployment management: dedup by content fingerprint, artifact upload,
/// record creation with compensating cleanup.
pub struct DeployService {
    deployments: Arc<dyn DeploymentStore>,
    objects: Arc<dyn ObjectStore>,
}

impl DeployService {
    pub fn new(deployments: Arc<dyn DeploymentStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            deployments,
            objects,
        }
    }

    pub async fn deploy(&self, request: DeployRequest) -> Result<DeployOutcome> {
        let kind: RuntimeKind = request.runtime_type.parse()?;
        if request.file.is_empty() {
            return Err(Error::InvalidConfig("no file provided".to_string()));
        }

        let target_fingerprint = fingerprint(&request.file);

        // Same bytes, same kind: hand back the existing deployment.
        if let Some(existing) = self
            .deployments
            .find_by_fingerprint(kind.as_str(), &target_fingerprint)
            .await?
        {
            tracing::info!(id = %existing.id, fingerprint = %target_fingerprint,
                "deployment with same fingerprint already exists");
            return Ok(DeployOutcome {
                deployment: existing,
                is_existing: true,
            });
        }

        let id = Uuid::new_v4();
        let artifact_key = format!("{id}.{}", kind.extension());

        self.objects.put(&artifact_key, request.file).await?;

        let now = SystemTime::now();
        let deployment = Deployment {
            id,
            runtime_type: kind.as_str().to_string(),
            fingerprint: target_fingerprint,
            artifact_key: artifact_key.clone(),
            args: request.args,
            preopened_dir: request.preopened_dir,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.deployments.create(deployment.clone()).await {
            // Don't leave an orphaned artifact behind a failed record.
            let _ = self.objects.delete(&artifact_key).await;
            return Err(e);
        }

        tracing::info!(id = %id, kind = kind.as_str(), key = %artifact_key, "deployed");
        Ok(DeployOutcome {
            deployment,
            is_existing: false,
        })
    }

    pub async fn list(&self) -> Result<Vec<Deployment>> {
        self.deployments.list().await
    }

    /// Remove a deployment and its stored artifact.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let Some(deployment) = self.deployments.find_by_id(id).await? else {
            return Err(Error::NotFound(id));
        };
        self.objects.delete(&deployment.artifact_key).await?;
        self.deployments.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryDeploymentStore, MemoryObjectStore};

    fn service() -> (DeployService, Arc<MemoryObjectStore>) {
        let objects = Arc::new(MemoryObjectStore::new());
        let service = DeployService::new(
            Arc::new(MemoryDeploymentStore::new()),
            objects.clone(),
        );
        (service, objects)
    }

    fn upload(kind: &str, bytes: &'static [u8]) -> DeployRequest {
        DeployRequest {
            runtime_type: kind.to_string(),
            file: Bytes::from_static(bytes),
            args: vec![],
            preopened_dir: None,
        }
    }

    #[tokio::test]
    async fn deploy_stores_artifact_under_id_key() {
        let (service, objects) = service();
        let outcome = service.deploy(upload("wasm", b"\0asm-bytes")).await.unwrap();

        assert!(!outcome.is_existing);
        assert_eq!(
            outcome.deployment.artifact_key,
            format!("{}.wasm", outcome.deployment.id)
        );
        assert!(objects.exists(&outcome.deployment.artifact_key).await.unwrap());
    }

    #[tokio::test]
    async fn identical_bytes_deduplicate_to_the_same_id() {
        let (service, _) = service();
        let first = service.deploy(upload("wasm", b"same module")).await.unwrap();
        let second = service.deploy(upload("wasm", b"same module")).await.unwrap();

        assert!(!first.is_existing);
        assert!(second.is_existing);
        assert_eq!(first.deployment.id, second.deployment.id);
    }

    #[tokio::test]
    async fn same_bytes_different_kind_is_a_new_deployment() {
        let (service, _) = service();
        let wasm = service.deploy(upload("wasm", b"payload")).await.unwrap();
        let js = service.deploy(upload("js", b"payload")).await.unwrap();

        assert!(!js.is_existing);
        assert_ne!(wasm.deployment.id, js.deployment.id);
    }

    #[tokio::test]
    async fn unknown_kind_is_rejected() {
        let (service, _) = service();
        let err = service.deploy(upload("lua", b"print(1)")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRuntimeKind(_)));
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let (service, _) = service();
        let err = service.deploy(upload("wasm", b"")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn delete_removes_record_and_artifact() {
        let (service, objects) = service();
        let outcome = service.deploy(upload("js", b"respond(200)")).await.unwrap();
        let key = outcome.deployment.artifact_key.clone();

        service.delete(outcome.deployment.id).await.unwrap();
        assert!(!objects.exists(&key).await.unwrap());
        assert!(service.list().await.unwrap().is_empty());
        assert!(matches!(
            service.delete(outcome.deployment.id).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
