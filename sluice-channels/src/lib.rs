//! # sluice-channels
//!
//! Isolatable channels for sluice components. Each channel is
//! feature-gated:
//!
//! - `dom` (default) - tree-shaped UI events and rendered trees (`DOM`)
//! - `http` (default) - requests and their responses (`HTTP`)
//!
//! ## Usage
//!
//! ```ignore
//! use sluice_channels::register_defaults;
//! use sluice_core::{IsolationConfig, IsolationRegistry, Isolator};
//!
//! let config = IsolationConfig::from_file("sluice.yml")?;
//! let registry = IsolationRegistry::new();
//! register_defaults(&registry, &config);
//! let isolator = Isolator::new(registry, Arc::new(config.scope_generator()?));
//! ```

use sluice_core::{IsolationConfig, IsolationRegistry};
use sluice_types::ChannelName;

#[cfg(feature = "dom")]
pub mod dom;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "dom")]
pub use dom::{DomChannel, DomEvent, DomSource, VNode};

#[cfg(feature = "http")]
pub use http::{HttpChannel, HttpSource, Request, Response};

/// Channel name of the UI event channel
pub const DOM: &str = "DOM";

/// Channel name of the request/response channel
pub const HTTP: &str = "HTTP";

/// List names of all available channels (based on enabled features)
pub fn available_channels() -> Vec<&'static str> {
    let mut channels = Vec::new();

    #[cfg(feature = "dom")]
    channels.push(DOM);

    #[cfg(feature = "http")]
    channels.push(HTTP);

    channels
}

/// Register every available, enabled channel with its configured separator
///
/// Returns the names that were registered. Disabled channels are left
/// out of the registry and therefore pass through unisolated.
pub fn register_defaults(
    registry: &IsolationRegistry,
    config: &IsolationConfig,
) -> Vec<ChannelName> {
    let mut registered = Vec::new();
    for name in available_channels() {
        if !config.is_enabled(name) {
            tracing::debug!(channel = name, "channel disabled by config");
            continue;
        }
        let separator = config.separator_for(name);
        match name {
            #[cfg(feature = "dom")]
            DOM => {
                registry.register(DOM, DomChannel::with_separator(separator));
            }
            #[cfg(feature = "http")]
            HTTP => {
                registry.register(HTTP, HttpChannel::with_separator(separator));
            }
            _ => continue,
        }
        registered.push(ChannelName::from(name));
    }
    registered
}
