//! Service metrics.
//!
//! Durations and error counts for SQL, Redis, the algorithm services and
//! object storage, plus generation outcome counters. Instruments are taken
//! from the global OpenTelemetry meter; [`init`] installs a provider whose
//! reader is the Prometheus registry served on `/metrics`. Until then every
//! instrument is a no-op, which is what unit tests run against.

use std::future::Future;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use prometheus::{Registry, TextEncoder};

static INSTRUMENTS: OnceLock<Instruments> = OnceLock::new();

struct Instruments {
    sql_duration: Histogram<f64>,
    sql_errors: Counter<u64>,
    redis_duration: Histogram<f64>,
    redis_errors: Counter<u64>,
    external_duration: Histogram<f64>,
    external_errors: Counter<u64>,
    object_duration: Histogram<f64>,
    object_errors: Counter<u64>,
    generation_total: Counter<u64>,
    generation_duration: Histogram<f64>,
}

impl Instruments {
    fn new(meter: &Meter) -> Self {
        let duration = |name: &'static str, description: &'static str| {
            meter
                .f64_histogram(name)
                .with_description(description)
                .with_unit("s")
                .build()
        };
        let counter = |name: &'static str, description: &'static str| {
            meter.u64_counter(name).with_description(description).build()
        };

        Self {
            sql_duration: duration("cvgen.sql.duration", "SQL execution duration"),
            sql_errors: counter("cvgen.sql.errors", "SQL errors"),
            redis_duration: duration("cvgen.redis.duration", "Redis command duration"),
            redis_errors: counter("cvgen.redis.errors", "Redis errors"),
            external_duration: duration(
                "cvgen.external_api.duration",
                "Algorithm service call duration",
            ),
            external_errors: counter("cvgen.external_api.errors", "Algorithm service errors"),
            object_duration: duration(
                "cvgen.object_storage.duration",
                "Object storage operation duration",
            ),
            object_errors: counter("cvgen.object_storage.errors", "Object storage errors"),
            generation_total: counter(
                "cvgen.resume_generation",
                "Resume generation tasks by outcome",
            ),
            generation_duration: duration(
                "cvgen.resume_generation.duration",
                "Time from task start to a terminal outcome",
            ),
        }
    }
}

fn instruments() -> &'static Instruments {
    INSTRUMENTS.get_or_init(|| Instruments::new(&global::meter("cvgen")))
}

/// Installs the global meter provider. Must run before any instrumented
/// component is used.
pub fn init() -> anyhow::Result<Registry> {
    let registry = Registry::new();
    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;
    let provider = SdkMeterProvider::builder()
        .with_reader(exporter)
        .with_resource(Resource::new([KeyValue::new("service.name", "cvgen")]))
        .build();
    global::set_meter_provider(provider);
    Ok(registry)
}

/// Prometheus text exposition of everything recorded so far.
pub fn render(registry: &Registry) -> Result<String, prometheus::Error> {
    TextEncoder::new().encode_to_string(&registry.gather())
}

async fn observe<T, E, F>(
    fut: F,
    duration: &Histogram<f64>,
    errors: &Counter<u64>,
    labels: &[KeyValue],
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let result = fut.await;
    duration.record(started.elapsed().as_secs_f64(), labels);
    if result.is_err() {
        errors.add(1, labels);
    }
    result
}

pub async fn sql<T, E, F>(operation: &'static str, table: &'static str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let m = instruments();
    let labels = [
        KeyValue::new("operation", operation),
        KeyValue::new("table", table),
    ];
    observe(fut, &m.sql_duration, &m.sql_errors, &labels).await
}

pub async fn redis<T, E, F>(command: &'static str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let m = instruments();
    let labels = [KeyValue::new("command", command)];
    observe(fut, &m.redis_duration, &m.redis_errors, &labels).await
}

pub async fn external<T, E, F>(service: &'static str, endpoint: &'static str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let m = instruments();
    let labels = [
        KeyValue::new("service", service),
        KeyValue::new("endpoint", endpoint),
    ];
    observe(fut, &m.external_duration, &m.external_errors, &labels).await
}

pub async fn object_storage<T, E, F>(operation: &'static str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let m = instruments();
    let labels = [KeyValue::new("operation", operation)];
    observe(fut, &m.object_duration, &m.object_errors, &labels).await
}

/// Counts one finished generation task and how long it ran.
pub fn record_generation(outcome: &'static str, elapsed: Duration) {
    let m = instruments();
    m.generation_total.add(1, &[KeyValue::new("status", outcome)]);
    m.generation_duration.record(elapsed.as_secs_f64(), &[]);
}
