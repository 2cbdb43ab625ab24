use super::GlobalConfiguration;
use crate::ResponseError;
use tracing::{subscriber::set_global_default, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// Creates a subscriber which writes to `console::Term::stdout` and, if a log directory is
/// configured, as JSON to `elph-response.log` in that directory.
///
/// The returned guard flushes the file writer when dropped and must be held for as long as the
/// subscriber is in use.
pub fn get_subscriber(
    configuration: &GlobalConfiguration,
) -> (impl Subscriber + Send + Sync, Option<WorkerGuard>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&configuration.log_level));

    let fmt_layer = tracing_subscriber::fmt::Layer::new()
        .with_writer(console::Term::stdout)
        .without_time();

    let (file_layer, guard) = match &configuration.log_directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::never(directory, "elph-response.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .with_writer(non_blocking)
                        .json(),
                ),
                Some(guard),
            )
        }
        None => (None, None),
    };

    (
        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .with(file_layer),
        guard,
    )
}

/// Installs `subscriber` as the global default and routes `log` records into it
pub fn init_subscriber(
    subscriber: impl Subscriber + Send + Sync + 'static,
) -> Result<(), ResponseError> {
    LogTracer::init().map_err(|e| ResponseError::Telemetry(e.to_string()))?;
    set_global_default(subscriber).map_err(|e| ResponseError::Telemetry(e.to_string()))
}
