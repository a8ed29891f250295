// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution pipeline: resolve a deployment, obtain a compiled module via
//! the cache protocol, build a session, pass an envelope through, decode the
//! response. The runtime is closed on every exit path.

use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::{CacheEntry, ModuleCache};
use crate::config::consts::{
    JS_ENGINE_CACHE_KEY, MAX_ARTIFACT_SIZE, MODULE_CACHE_TTL, SOURCE_CACHE_TTL,
};
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::observability::messages::cache::{CacheDegraded, CacheHit, CacheMiss};
use crate::observability::messages::runtime::ModuleCompiled;
use crate::observability::messages::StructuredLog;
use crate::proto::{self, RequestEnvelope, ResponseEnvelope};
use crate::runtime::js::JsRuntimeConfig;
use crate::runtime::session::create_engine;
use crate::runtime::wasm::WasmRuntimeConfig;
use crate::runtime::{DeploymentRuntime, ModuleSource, RuntimeKind};
use crate::store::{Deployment, DeploymentStore, ObjectStore};
use crate::utils::fingerprint;

/// The run service owns the collaborators one invocation needs: metadata
/// store, object store, and the module cache. It is shared across concurrent
/// requests; every request gets its own session.
pub struct RunService {
    config: Config,
    cache: Arc<dyn ModuleCache>,
    deployments: Arc<dyn DeploymentStore>,
    objects: Arc<dyn ObjectStore>,
    /// Per-key locks so concurrent misses compile once.
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Interpreter artifact bytes and their fingerprint, loaded on first use.
    js_engine: OnceCell<(Bytes, String)>,
}

impl RunService {
    pub fn new(
        config: Config,
        cache: Arc<dyn ModuleCache>,
        deployments: Arc<dyn DeploymentStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            cache,
            deployments,
            objects,
            inflight: Mutex::new(HashMap::new()),
            js_engine: OnceCell::new(),
        }
    }

    /// Execute a deployment against one request envelope.
    ///
    /// The caller's cancellation token is checked before the sandbox starts
    /// and inside every host-function call the guest makes.
    pub async fn execute_deployment(
        &self,
        id: Uuid,
        request: &RequestEnvelope,
        cancel: CancellationToken,
    ) -> Result<ResponseEnvelope> {
        let deployment = self
            .deployments
            .find_by_id(id)
            .await?
            .ok_or(Error::NotFound(id))?;
        let kind: RuntimeKind = deployment.runtime_type.parse()?;

        let request_bytes = proto::encode_request(request);
        let response_bytes = match kind {
            RuntimeKind::Wasm => {
                self.execute_wasm(&deployment, request_bytes, cancel).await?
            }
            RuntimeKind::Js => self.execute_js(&deployment, request_bytes, cancel).await?,
        };

        proto::decode_response(&response_bytes)
    }

    async fn execute_wasm(
        &self,
        deployment: &Deployment,
        request_bytes: Vec<u8>,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>> {
        let cache_key = format!("wasm:{}", deployment.id);
        let artifact_key = deployment.artifact_key.clone();
        let objects = self.objects.clone();

        let serialized = self
            .get_or_compile(&cache_key, &deployment.fingerprint, move || async move {
                objects.get(&artifact_key).await
            })
            .await?;

        let config = WasmRuntimeConfig::new(deployment.id, ModuleSource::Serialized(serialized))?
            .with_args(deployment.args.clone())
            .with_fuel_limit(self.config.fuel_limit)
            .with_http_timeout(self.config.http_timeout);
        let config = match &deployment.preopened_dir {
            Some(dir) => config.with_preopened_dir(dir.clone()),
            None => config,
        };

        run_to_completion(cancel, request_bytes, move || {
            config.instantiate().map(DeploymentRuntime::Wasm)
        })
        .await
    }

    async fn execute_js(
        &self,
        deployment: &Deployment,
        request_bytes: Vec<u8>,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>> {
        // The interpreter engine is compiled once per host and shared by all
        // JS deployments through the cache.
        let (engine_bytes, engine_fingerprint) = self.js_engine_artifact().await?;
        let engine_serialized = self
            .get_or_compile(JS_ENGINE_CACHE_KEY, &engine_fingerprint, move || async move {
                Ok(engine_bytes)
            })
            .await?;

        // The user's source is cached raw, never compiled.
        let source_key = format!("js:{}", deployment.id);
        let artifact_key = deployment.artifact_key.clone();
        let objects = self.objects.clone();
        let source = self
            .get_or_load(&source_key, &deployment.fingerprint, move || async move {
                objects.get(&artifact_key).await
            })
            .await?;

        let config = JsRuntimeConfig::new(
            deployment.id,
            ModuleSource::Serialized(engine_serialized),
            source,
        )?
        .with_modules_dir(self.config.js_modules_dir.clone())
        .with_fuel_limit(self.config.fuel_limit)
        .with_http_timeout(self.config.http_timeout);

        run_to_completion(cancel, request_bytes, move || {
            config.instantiate().map(DeploymentRuntime::Js)
        })
        .await
    }

    /// Check-cache → load → compile → serialize → store-cache, validating the
    /// cached fingerprint against the expected one on the way in.
    async fn get_or_compile<F, Fut>(
        &self,
        key: &str,
        expected_fingerprint: &str,
        load: F,
    ) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>>,
    {
        if let Some(payload) = self.cache_lookup(key, expected_fingerprint).await {
            return Ok(payload);
        }

        let lock = self.key_lock(key).await;
        let _guard = lock.lock().await;

        // Another request may have filled the cache while we waited.
        if let Some(payload) = self.cache_lookup(key, expected_fingerprint).await {
            return Ok(payload);
        }

        let raw = load().await?;
        let raw_len = raw.len();
        if raw_len > MAX_ARTIFACT_SIZE {
            return Err(Error::CompilationFailed(format!(
                "artifact too large: {raw_len} bytes (max {MAX_ARTIFACT_SIZE})"
            )));
        }
        let serialized = tokio::task::spawn_blocking(move || -> Result<Bytes> {
            let engine = create_engine()?;
            let module = wasmtime::Module::new(&engine, &raw)
                .map_err(|e| Error::CompilationFailed(e.to_string()))?;
            let serialized = module
                .serialize()
                .map_err(|e| Error::CompilationFailed(format!("serialize: {e}")))?;
            Ok(Bytes::from(serialized))
        })
        .await
        .map_err(|e| Error::CompilationFailed(format!("compile task failed: {e}")))??;

        ModuleCompiled {
            key,
            raw_bytes: raw_len,
            serialized_bytes: serialized.len(),
        }
        .log();

        self.cache_store(key, expected_fingerprint, serialized.clone(), true)
            .await;
        Ok(serialized)
    }

    /// Same protocol as [`RunService::get_or_compile`] but the payload stays
    /// raw; used for JS source bytes.
    async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        expected_fingerprint: &str,
        load: F,
    ) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>>,
    {
        if let Some(payload) = self.cache_lookup(key, expected_fingerprint).await {
            return Ok(payload);
        }

        let raw = load().await?;
        self.cache_store(key, expected_fingerprint, raw.clone(), false)
            .await;
        Ok(raw)
    }

    /// Cache get with the recovery policy applied: backend failures and
    /// fingerprint mismatches both degrade to a miss.
    async fn cache_lookup(&self, key: &str, expected_fingerprint: &str) -> Option<Bytes> {
        match self.cache.get(key).await {
            Ok(Some(entry)) if entry.fingerprint == expected_fingerprint => {
                CacheHit { key }.log();
                Some(entry.payload)
            }
            Ok(Some(_)) => {
                CacheMiss { key, stale: true }.log();
                None
            }
            Ok(None) => {
                CacheMiss { key, stale: false }.log();
                None
            }
            Err(e) => {
                CacheDegraded {
                    key,
                    operation: "get",
                    error: &e.to_string(),
                }
                .log();
                None
            }
        }
    }

    /// Cache put with the recovery policy applied: failures are logged and
    /// swallowed.
    async fn cache_store(&self, key: &str, fingerprint: &str, payload: Bytes, compiled: bool) {
        let ttl = if compiled {
            MODULE_CACHE_TTL
        } else {
            SOURCE_CACHE_TTL
        };
        if let Err(e) = self
            .cache
            .put(key, CacheEntry::new(fingerprint, payload), ttl)
            .await
        {
            CacheDegraded {
                key,
                operation: "put",
                error: &e.to_string(),
            }
            .log();
        }
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut inflight = self.inflight.lock().await;
        inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn js_engine_artifact(&self) -> Result<(Bytes, String)> {
        let (bytes, fp) = self
            .js_engine
            .get_or_try_init(|| async {
                let path = self.config.js_engine_path.clone();
                let bytes = tokio::fs::read(&path).await.map_err(|e| {
                    Error::artifact(path.display().to_string(), format!("JS engine: {e}"))
                })?;
                let fp = fingerprint(&bytes);
                Ok::<_, Error>((Bytes::from(bytes), fp))
            })
            .await?;
        Ok((bytes.clone(), fp.clone()))
    }
}

/// Instantiate a runtime on a blocking thread, execute the envelope, and
/// close the runtime whatever happened.
async fn run_to_completion<F>(
    cancel: CancellationToken,
    request_bytes: Vec<u8>,
    build: F,
) -> Result<Vec<u8>>
where
    F: FnOnce() -> Result<DeploymentRuntime> + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(Error::GuestExecutionError("invocation cancelled".to_string()));
    }

    tokio::task::spawn_blocking(move || {
        let mut runtime = build()?;
        let result = runtime.execute(&request_bytes, &cancel);
        if let Err(e) = runtime.close() {
            tracing::warn!(error = %e, "session teardown failed");
        }
        result
    })
    .await
    .map_err(|e| Error::GuestExecutionError(format!("execution task failed: {e}")))?
}
