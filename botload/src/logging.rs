use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `configured`, otherwise `fallback`.
pub(crate) fn init(configured: Option<&str>, fallback: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| match configured {
            Some(directives) => EnvFilter::try_new(directives),
            None => EnvFilter::try_new(fallback),
        })
        .map_err(|err| anyhow::anyhow!("invalid log filter: {err}"))?;

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        tracing::debug!("global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
