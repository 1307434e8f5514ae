mod config;
mod db;
mod errors;
mod generation_client;
mod ids;
mod metrics;
mod models;
mod notify;
mod persistence;
mod relay;
mod resumes;
mod routes;
mod scoring;
mod state;
mod tasks;

#[cfg(test)]
mod testing;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::generation_client::{AlgorithmClient, GenerationService};
use crate::ids::IdAllocator;
use crate::notify::{NotificationGuard, PgSlotLedger};
use crate::persistence::{
    PersistencePipeline, PgDocumentStore, PgResumeRepository, S3ObjectStore,
};
use crate::relay::StreamRelay;
use crate::routes::build_router;
use crate::scoring::{ScoringEngine, ScoringRules};
use crate::state::AppState;
use crate::tasks::kv::{EphemeralStore, RedisStore};
use crate::tasks::monitor::TaskMonitor;
use crate::tasks::service::TaskService;
use crate::tasks::store::TaskRecordStore;
use crate::tasks::supervisor::Supervisor;

/// How long shutdown waits for background work after cancelling it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Install the meter provider before any instrumented client is built
    let registry = metrics::init()?;

    info!("Starting cvgen API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (pool + migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis
    let kv: Arc<dyn EphemeralStore> = Arc::new(RedisStore::connect(&config.redis_url).await?);
    info!("Redis connection established");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let objects = Arc::new(S3ObjectStore::new(
        s3,
        config.s3_bucket.clone(),
        &config.s3_public_url,
    ));
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize the algorithm services client
    let generation: Arc<dyn GenerationService> = Arc::new(AlgorithmClient::new(
        &config.generation_service_url,
        &config.data_service_url,
        &config.score_service_url,
    )?);
    info!("Algorithm client initialized");

    let rules = match &config.scoring_rules_path {
        Some(path) => ScoringRules::load(path)?,
        None => {
            warn!("SCORING_RULES_PATH not set, every module uses the fallback rubric");
            ScoringRules::default()
        }
    };
    let scoring = Arc::new(ScoringEngine::new(generation.clone(), Arc::new(rules)));

    let ids = Arc::new(IdAllocator::new(config.id_node));
    let supervisor = Supervisor::new();
    let settings = &config.tasks;

    let repo = Arc::new(PgResumeRepository::new(db.clone()));
    let documents = Arc::new(PgDocumentStore::new(db.clone()));
    let pipeline = PersistencePipeline::new(
        repo.clone(),
        documents.clone(),
        objects,
        scoring.clone(),
        generation.clone(),
        ids.clone(),
        supervisor.clone(),
    );

    let records = TaskRecordStore::new(kv.clone(), settings.record_ttl);
    let monitor = TaskMonitor::new(
        generation.clone(),
        records.clone(),
        pipeline.clone(),
        settings.poll_interval,
        settings.deadline,
    );
    let tasks = TaskService::new(
        generation.clone(),
        records,
        monitor,
        pipeline.clone(),
        ids,
        supervisor.clone(),
    );

    let notify = Arc::new(NotificationGuard::new(
        kv,
        Arc::new(PgSlotLedger::new(db)),
        config.pay_notify_secret.clone(),
        settings.notify_claim_ttl,
    ));

    // Build app state
    let state = AppState {
        tasks,
        pipeline,
        scoring,
        relay: StreamRelay::new(generation, settings.stream_upstream_timeout),
        notify,
        repo,
        documents,
        metrics: registry,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if supervisor.shutdown(SHUTDOWN_GRACE).await {
        info!("Background work stopped cleanly");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining requests");
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "cvgen-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
