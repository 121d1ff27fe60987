//! Per-channel isolation registry
//!
//! Maps channel names to the isolation pair for that channel's data
//! shape. Drivers register their channels once at setup; the isolation
//! combinator looks every channel up again each time an isolated
//! component runs. Channels nobody registered pass through untouched.

use crate::channel::{ChannelIsolation, ErasedIsolation};
use parking_lot::RwLock;
use sluice_types::ChannelName;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// How a channel is treated at an isolation boundary
#[derive(Clone)]
pub enum ChannelPolicy {
    /// Sources are narrowed and sink values tagged
    Isolatable(Arc<dyn ErasedIsolation>),
    /// Sources and sinks are forwarded unchanged
    PassThrough,
}

impl ChannelPolicy {
    pub fn is_isolatable(&self) -> bool {
        matches!(self, ChannelPolicy::Isolatable(_))
    }
}

impl fmt::Debug for ChannelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelPolicy::Isolatable(isolation) => f
                .debug_struct("Isolatable")
                .field("source", &isolation.source_type())
                .field("sink", &isolation.sink_type())
                .finish(),
            ChannelPolicy::PassThrough => write!(f, "PassThrough"),
        }
    }
}

/// Shared table of channel isolation policies
///
/// Cloning the registry clones the handle, not the table: every clone
/// sees later registrations.
#[derive(Clone, Default)]
pub struct IsolationRegistry {
    channels: Arc<RwLock<HashMap<ChannelName, Arc<dyn ErasedIsolation>>>>,
}

impl IsolationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the isolation pair for a channel
    ///
    /// Returns true if an earlier registration was replaced.
    pub fn register<I>(&self, channel: impl Into<ChannelName>, isolation: I) -> bool
    where
        I: ChannelIsolation,
    {
        self.register_erased(channel, Arc::new(isolation))
    }

    /// Register an already type-erased isolation pair
    pub fn register_erased(
        &self,
        channel: impl Into<ChannelName>,
        isolation: Arc<dyn ErasedIsolation>,
    ) -> bool {
        let channel = channel.into();
        tracing::debug!(
            channel = %channel,
            source = isolation.source_type(),
            "registering channel isolation"
        );
        let replaced = self.channels.write().insert(channel.clone(), isolation);
        if replaced.is_some() {
            tracing::warn!(channel = %channel, "replaced existing channel isolation");
        }
        replaced.is_some()
    }

    /// Remove a channel's isolation; it becomes pass-through
    pub fn unregister(&self, channel: &str) -> bool {
        self.channels.write().remove(channel).is_some()
    }

    /// Look up the policy for a channel
    pub fn policy_for(&self, channel: &str) -> ChannelPolicy {
        match self.channels.read().get(channel) {
            Some(isolation) => ChannelPolicy::Isolatable(isolation.clone()),
            None => ChannelPolicy::PassThrough,
        }
    }

    pub fn is_isolatable(&self, channel: &str) -> bool {
        self.channels.read().contains_key(channel)
    }

    /// Names of all registered channels, sorted
    pub fn channels(&self) -> Vec<ChannelName> {
        let mut names: Vec<_> = self.channels.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }
}

impl fmt::Debug for IsolationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolationRegistry")
            .field("channels", &self.channels())
            .finish()
    }
}
