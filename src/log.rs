use color_eyre::eyre::Report;
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global tracing subscriber and the color-eyre report hooks.
/// `RUST_LOG` controls the filter, defaulting to `info`.
pub fn init() -> Result<(), Report> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(ErrorLayer::default())
        .try_init()?;
    color_eyre::install()?;
    Ok(())
}
