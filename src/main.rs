use std::env;
use std::sync::Arc;
use std::time::{Instant, UNIX_EPOCH};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use emberhost::cache::DiskCache;
use emberhost::config::Config;
use emberhost::observability::init_tracing;
use emberhost::proto::RequestEnvelope;
use emberhost::services::{DeployRequest, DeployService, RunService};
use emberhost::store::{FsObjectStore, MemoryDeploymentStore};

/// Development driver: deploy one artifact into the local stores and push a
/// single request envelope through it, printing the decoded response. The
/// HTTP router in front of the pipeline is an external collaborator; this
/// binary exercises everything behind it.
#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <wasm|js> <artifact-path> [request-body]", args[0]);
        eprintln!("Example: {} wasm handler.wasm '{{\"ping\":true}}'", args[0]);
        std::process::exit(1);
    }

    let runtime_type = args[1].clone();
    let artifact_path = &args[2];
    let body = args.get(3).cloned().unwrap_or_default();

    if let Err(e) = run(runtime_type, artifact_path, body).await {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

async fn run(
    runtime_type: String,
    artifact_path: &str,
    body: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    let deployments = Arc::new(MemoryDeploymentStore::new());
    let objects = Arc::new(FsObjectStore::new(&config.data_dir)?);
    let cache = Arc::new(DiskCache::new(&config.cache_dir)?);

    let deploy_service = DeployService::new(deployments.clone(), objects.clone());
    let run_service = RunService::new(config, cache, deployments, objects);

    let file = Bytes::from(std::fs::read(artifact_path)?);
    println!("🚀 Deploying {artifact_path} ({} bytes, {runtime_type})", file.len());

    let outcome = deploy_service
        .deploy(DeployRequest {
            runtime_type,
            file,
            args: vec![],
            preopened_dir: None,
        })
        .await?;
    let deployment = outcome.deployment;

    let created_secs = deployment
        .created_at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    println!("   id:          {}", deployment.id);
    println!("   fingerprint: {}", deployment.fingerprint);
    println!("   created_at:  {created_secs}");
    if outcome.is_existing {
        println!("   (existing deployment with the same fingerprint)");
    }

    let request = RequestEnvelope {
        method: "GET".to_string(),
        body: body.clone().into_bytes(),
        content_length: body.len() as i64,
        host: "localhost".to_string(),
        remote_addr: "127.0.0.1:0".to_string(),
        request_uri: "/".to_string(),
        ..Default::default()
    };

    let started = Instant::now();
    let response = run_service
        .execute_deployment(deployment.id, &request, CancellationToken::new())
        .await?;
    let elapsed = started.elapsed();

    println!("\n📊 Response ({elapsed:?})");
    println!("   status: {}", response.effective_status());
    for (name, values) in &response.header {
        for value in &values.fields {
            println!("   {name}: {value}");
        }
    }
    println!("   body ({} bytes):", response.body.len());
    println!("{}", String::from_utf8_lossy(&response.body));

    Ok(())
}
