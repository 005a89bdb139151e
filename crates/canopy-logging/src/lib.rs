//! Tracing setup shared by the Canopy binaries.
//!
//! `RUST_LOG` wins when set; otherwise the caller's default directives apply.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directives when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "canopy_node=info,canopy_engine=info";

/// Install the global subscriber (env filter + fmt layer).
///
/// Returns false if a subscriber was already installed.
pub fn init(default_directives: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("tracing initialised ({})", default_directives);
    }
    installed
}
