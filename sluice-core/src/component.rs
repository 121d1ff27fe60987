//! Dataflow components and their channel maps
//!
//! A component is a function from a sources map to a sinks map. Both
//! maps hold type-erased channel values keyed by channel name; typed
//! access goes through `get`/`require`, which downcast on the way out.

use crate::channel::AnyChannel;
use crate::error::{IsolateError, Result};
use crate::stream::Stream;
use sluice_types::ChannelName;
use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Named channel values handed into or out of a component
#[derive(Clone, Default)]
pub struct ChannelMap {
    channels: BTreeMap<ChannelName, AnyChannel>,
}

/// Input channels supplied by a parent
pub type Sources = ChannelMap;

/// Output channels returned to a parent
pub type Sinks = ChannelMap;

impl ChannelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with<T>(mut self, channel: impl Into<ChannelName>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.insert(channel, value);
        self
    }

    pub fn insert<T>(&mut self, channel: impl Into<ChannelName>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.channels.insert(channel.into(), Arc::new(value));
    }

    pub fn insert_erased(&mut self, channel: impl Into<ChannelName>, value: AnyChannel) {
        self.channels.insert(channel.into(), value);
    }

    pub fn erased(&self, channel: &str) -> Option<&AnyChannel> {
        self.channels.get(channel)
    }

    /// Typed access; None if absent or of another type
    pub fn get<T: Any>(&self, channel: &str) -> Option<&T> {
        self.channels.get(channel)?.downcast_ref::<T>()
    }

    /// Typed access that explains what went wrong
    pub fn require<T: Any>(&self, channel: &str) -> Result<&T> {
        let value = self
            .channels
            .get(channel)
            .ok_or_else(|| IsolateError::MissingChannel {
                channel: ChannelName::from(channel),
                expected: type_name::<T>(),
            })?;
        value
            .downcast_ref::<T>()
            .ok_or_else(|| IsolateError::ChannelType {
                channel: ChannelName::from(channel),
                expected: type_name::<T>(),
            })
    }

    /// Clone out a stream-valued channel
    pub fn stream<T: Send + 'static>(&self, channel: &str) -> Option<Stream<T>> {
        self.get::<Stream<T>>(channel).cloned()
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    pub fn remove(&mut self, channel: &str) -> Option<AnyChannel> {
        self.channels.remove(channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelName, &AnyChannel)> {
        self.channels.iter()
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &ChannelName> {
        self.channels.keys()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl fmt::Debug for ChannelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.channels.keys()).finish()
    }
}

/// A reusable unit of dataflow
///
/// `run` wires streams and returns immediately. It is invoked once per
/// activation and never mutates the component.
pub trait Component: Send + Sync {
    fn run(&self, sources: &Sources) -> Result<Sinks>;

    /// Name used in logs
    fn name(&self) -> &str {
        "component"
    }
}

impl<C: Component + ?Sized> Component for Arc<C> {
    fn run(&self, sources: &Sources) -> Result<Sinks> {
        (**self).run(sources)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<C: Component + ?Sized> Component for Box<C> {
    fn run(&self, sources: &Sources) -> Result<Sinks> {
        (**self).run(sources)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A component backed by a closure
pub struct FnComponent<F> {
    name: String,
    f: F,
}

impl<F> FnComponent<F>
where
    F: Fn(&Sources) -> Result<Sinks> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Component for FnComponent<F>
where
    F: Fn(&Sources) -> Result<Sinks> + Send + Sync,
{
    fn run(&self, sources: &Sources) -> Result<Sinks> {
        (self.f)(sources)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnComponent<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComponent")
            .field("name", &self.name)
            .finish()
    }
}

/// Wrap a closure as a named component
pub fn component_fn<F>(name: impl Into<String>, f: F) -> FnComponent<F>
where
    F: Fn(&Sources) -> Result<Sinks> + Send + Sync,
{
    FnComponent::new(name, f)
}
