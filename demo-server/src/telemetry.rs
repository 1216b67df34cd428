use async_trait::async_trait;
use finish::{BoxError, Server, ShutdownError, ShutdownScope};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tokio::sync::Mutex;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Owns the OpenTelemetry tracer provider, if trace export is enabled.
///
/// Register it as the last server of the finisher so pending spans are flushed within a
/// bounded time. Dropping the guard flushes them too, without a bound.
pub struct TelemetryGuard {
    provider: Mutex<Option<SdkTracerProvider>>,
}

impl TelemetryGuard {
    pub fn exports_traces(&self) -> bool {
        self.provider.try_lock().is_ok_and(|provider| provider.is_some())
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.get_mut().take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shutdown tracer provider: {e}");
        }
    }
}

#[async_trait]
impl Server for TelemetryGuard {
    async fn shutdown(&self, scope: &ShutdownScope) -> Result<(), ShutdownError> {
        let Some(provider) = self.provider.lock().await.take() else {
            return Ok(());
        };

        // the exporter flushes with a blocking HTTP client
        match scope
            .run(tokio::task::spawn_blocking(move || provider.shutdown()))
            .await?
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ShutdownError::other(e)),
            Err(join_err) => Err(ShutdownError::other(join_err)),
        }
    }
}

/// Initializes tracing with optional JSON formatting and optional OTLP export.
///
/// Configuration is driven by environment variables:
/// - `RUST_LOG` / `LOG_FORMAT` for log filtering and formatting
/// - `OTEL_EXPORTER_OTLP_ENDPOINT` to enable trace export
///
/// An exporter that fails to build is reported on stderr and export stays disabled.
pub fn init_telemetry(service_name: &str) -> TelemetryGuard {
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    let provider = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .and_then(|endpoint| match build_provider(service_name, &endpoint) {
            Ok(provider) => Some(provider),
            Err(e) => {
                eprintln!("Trace export disabled, failed to build OTLP exporter: {e}");
                None
            }
        });

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_owned()))
    });

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    TelemetryGuard {
        provider: Mutex::new(provider),
    }
}

fn build_provider(service_name: &str, endpoint: &str) -> Result<SdkTracerProvider, BoxError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_service_name(service_name.to_owned())
                .build(),
        )
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());
    Ok(provider)
}
