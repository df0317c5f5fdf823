mod metrics;

pub use metrics::{HistogramSummary, MetricsRecorder};

use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Knobs for process-wide logging.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Baseline level when `RUST_LOG` is unset.
    pub default_level: Level,
    /// Extra per-target directives, e.g. `("crosstalk_bus", Level::DEBUG)`.
    pub module_overrides: Vec<(String, Level)>,
    /// Emit newline-delimited JSON instead of the human-readable format.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            module_overrides: Vec::new(),
            json_logs: false,
        }
    }
}

/// Returned once per process by [`init_telemetry`]; owns the shared
/// metrics recorder and hands out clones for injection.
pub struct TelemetryGuard {
    metrics_recorder: Arc<MetricsRecorder>,
}

impl TelemetryGuard {
    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics_recorder.clone()
    }
}

/// Directive string fed to `EnvFilter` when `RUST_LOG` is absent.
fn filter_directives(config: &TelemetryConfig) -> String {
    let mut directives = vec![config.default_level.to_string().to_lowercase()];
    directives.extend(
        config
            .module_overrides
            .iter()
            .map(|(module, level)| format!("{module}={}", level.to_string().to_lowercase())),
    );
    directives.join(",")
}

/// Install the global tracing subscriber and create the metrics recorder.
/// Call once at startup; `RUST_LOG` wins over the configured levels.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config)));

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .init();

    TelemetryGuard {
        metrics_recorder: Arc::new(MetricsRecorder::new()),
    }
}
