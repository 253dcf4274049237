//! OpenTelemetry export (optional `telemetry` feature)

use tracing_subscriber::{registry::Registry, Layer};

/// Boxed layer stacked directly on the registry
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the OTLP tracing layer if an endpoint is configured
///
/// # Environment Variables
///
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
/// - `OTEL_SERVICE_NAME`: Service name (default: taskboardd)
///
/// Runs before the subscriber exists, so problems are returned as messages
/// for the caller to log once logging is up.
pub fn otel_layer() -> (Option<BoxedLayer>, Option<String>) {
    let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
        return (None, None);
    };

    #[cfg(feature = "telemetry")]
    {
        match build_layer(&endpoint) {
            Ok(layer) => (Some(layer), None),
            Err(e) => (
                None,
                Some(format!("Failed to initialize OpenTelemetry: {}", e)),
            ),
        }
    }

    #[cfg(not(feature = "telemetry"))]
    {
        (
            None,
            Some(format!(
                "OTLP endpoint {} set but feature 'telemetry' not enabled",
                endpoint
            )),
        )
    }
}

#[cfg(feature = "telemetry")]
fn build_layer(endpoint: &str) -> anyhow::Result<BoxedLayer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::TracerProvider;

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "taskboardd".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(Box::new(tracing_opentelemetry::layer().with_tracer(tracer)))
}
