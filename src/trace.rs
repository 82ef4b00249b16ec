//! Tracing subscriber setup. See [`init_tracing`].

use crate::config::LogConfig;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::SpanExporter;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn resource() -> Resource {
    Resource::builder()
        .with_service_name(env!("CARGO_PKG_NAME"))
        .with_attribute(KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")))
        .build()
}

/// Install the global tracing subscriber.
///
/// Events are filtered by `RUST_LOG` if set, falling back to
/// `config.level`, and written to stdout as text or JSON lines. With
/// `config.otlp` set, spans are also exported over OTLP/HTTP (honouring the
/// standard `OTEL_EXPORTER_OTLP_*` variables) and the provider is returned.
/// Call [`SdkTracerProvider::shutdown`] on it before exiting so buffered spans
/// are flushed.
pub fn init_tracing(config: &LogConfig) -> eyre::Result<Option<SdkTracerProvider>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let provider = if config.otlp {
        let exporter = SpanExporter::builder().with_http().build()?;
        let provider = SdkTracerProvider::builder()
            .with_resource(resource())
            .with_batch_exporter(exporter)
            .build();
        global::set_tracer_provider(provider.clone());
        Some(provider)
    } else {
        None
    };

    let otel = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(env!("CARGO_PKG_NAME")))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(config.json.then(|| fmt::layer().json()))
        .with((!config.json).then(fmt::layer))
        .with(otel)
        .try_init()?;

    Ok(provider)
}
