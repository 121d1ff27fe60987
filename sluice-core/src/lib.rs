//! # sluice-core
//!
//! Scope isolation for composable dataflow components.
//!
//! This crate provides the push-based streams components are wired with,
//! the scope token generator, the per-channel isolation registry, and the
//! `isolate` combinator that narrows a component's sources and tags its
//! sinks so sibling instances of one component never see each other.

pub mod channel;
pub mod component;
pub mod config;
pub mod error;
pub mod isolate;
pub mod registry;
pub mod scope;
pub mod stream;

#[cfg(test)]
mod fixtures;

pub use channel::{
    AnyChannel, ChannelIsolation, ErasedIsolation, NarrowableSource, Scoped, ScopedChannel,
    DEFAULT_SEPARATOR,
};
pub use component::{component_fn, ChannelMap, Component, FnComponent, Sinks, Sources};
pub use config::{ChannelConfig, ConfigError, IsolationConfig};
pub use error::{IsolateError, Result};
pub use isolate::{ChannelScopes, Isolated, Isolator, ResolvedScope, Scope};
pub use registry::{ChannelPolicy, IsolationRegistry};
pub use scope::{check_prefix, ScopeGenerator, DEFAULT_SCOPE_PREFIX};
pub use stream::{
    CallbackListener, Event, Listener, Recorder, Stream, StreamError, Subject, Subscription,
};

pub use sluice_types::{ChannelName, ScopePath, ScopeToken};
