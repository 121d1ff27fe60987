//! Error types for the isolation layer

use crate::config::ConfigError;
use sluice_types::ChannelName;
use thiserror::Error;

/// Wiring errors raised while composing isolated components
///
/// These are deterministic consequences of how channels were registered
/// and supplied. They surface synchronously from `Component::run`, never
/// through a stream's error channel.
#[derive(Debug, Error)]
pub enum IsolateError {
    /// A registered channel received a source of the wrong shape
    #[error("source for channel {channel} cannot be isolated: expected {expected}")]
    MalformedSource {
        channel: ChannelName,
        expected: &'static str,
    },

    /// A registered channel received a sink of the wrong shape
    #[error("sink for channel {channel} cannot be isolated: expected {expected}")]
    MalformedSink {
        channel: ChannelName,
        expected: &'static str,
    },

    /// A component asked for a channel its parent did not supply
    #[error("channel {channel} not found (wanted {expected})")]
    MissingChannel {
        channel: ChannelName,
        expected: &'static str,
    },

    /// A component asked for a channel with the wrong type
    #[error("channel {channel} does not hold a {expected}")]
    ChannelType {
        channel: ChannelName,
        expected: &'static str,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type using IsolateError
pub type Result<T> = std::result::Result<T, IsolateError>;
