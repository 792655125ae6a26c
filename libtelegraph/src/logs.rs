use eyre::Result;

#[macro_export]
macro_rules! try_log_error {
    ($expr:expr, $what:expr $(,)?) => {
        if let Err(e) = $expr {
            tracing::error!("{}: {}", $what, e)
        }
    };
}

/// Starts the logging. Can be used by unittests to get more insights.
pub fn start_logging() -> Result<()> {
    use std::io::stdout;

    use tracing_subscriber::{Layer, Registry, fmt, layer::SubscriberExt};

    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let subscriber = Registry::default().with(
        fmt::layer()
            .without_time()
            .with_writer(stdout)
            .with_filter(filter),
    );

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
