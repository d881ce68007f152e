use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_level` when set. Logs go to stderr so CLI
/// output on stdout stays clean. JSON output carries the current span and span
/// list so instance ids show up on every line.
pub fn init_telemetry(default_level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    if json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .with(filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()?;
    }

    tracing::debug!("NaviCue telemetry initialized");
    Ok(())
}

/// Identifier linking every log line of one interaction instance
pub fn generate_instance_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping the work done on behalf of one interaction instance.
pub fn create_instance_span(kind: &str, instance_id: &str) -> tracing::Span {
    tracing::info_span!("interaction", kind = kind, instance.id = instance_id)
}
