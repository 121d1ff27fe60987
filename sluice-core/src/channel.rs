//! Channel isolation traits
//!
//! A channel is isolatable when its sources can be narrowed to a scope
//! and its sink values can carry a scope tag. Concrete channels only
//! implement `NarrowableSource` and `Scoped`; `ScopedChannel` turns that
//! pair into the source/sink isolation functions the registry stores.
//!
//! The registry itself works on type-erased channel values, so every
//! `ChannelIsolation` also gets an `ErasedIsolation` implementation that
//! downcasts, isolates, and re-erases. A failed downcast is a wiring bug
//! and is reported instead of silently skipping isolation.

use crate::error::{IsolateError, Result};
use crate::stream::Stream;
use sluice_types::{ChannelName, ScopePath, ScopeToken};
use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type-erased source or sink as stored in `Sources`/`Sinks`
pub type AnyChannel = Arc<dyn Any + Send + Sync>;

/// Separator used to split scope tokens into path segments
pub const DEFAULT_SEPARATOR: char = '.';

/// A source whose data space can be restricted to a sub-scope
///
/// Narrowing yields the same type, so the restricted view keeps every
/// query the original offers and can be narrowed again.
pub trait NarrowableSource: Clone + Send + Sync + 'static {
    /// Restrict this source to `path` below its current scope
    fn narrow(&self, path: &ScopePath) -> Self;

    /// The scope this source is restricted to
    fn scope(&self) -> &ScopePath;
}

/// A sink value that records which scope produced it
pub trait Scoped: Send + 'static {
    /// Prepend `path` to the value's provenance
    fn tag(self, path: &ScopePath) -> Self;

    /// Drop all provenance, yielding the value as originally emitted
    fn untag(self) -> Self;

    /// The provenance recorded so far
    fn scope(&self) -> &ScopePath;
}

/// Paired source/sink isolation for one channel kind
pub trait ChannelIsolation: Send + Sync + 'static {
    type Source: Send + Sync + 'static;
    type Sink: Clone + Send + Sync + 'static;

    fn isolate_source(&self, source: &Self::Source, scope: &ScopeToken) -> Self::Source;

    fn isolate_sink(&self, sink: Self::Sink, scope: &ScopeToken) -> Self::Sink;
}

/// Isolation for any narrowable source whose sink is a stream of scoped values
///
/// Each channel parses scope tokens with its own separator; token
/// formats are never shared between channels.
pub struct ScopedChannel<S, V> {
    separator: char,
    _marker: PhantomData<fn() -> (S, V)>,
}

impl<S, V> ScopedChannel<S, V> {
    pub fn new() -> Self {
        Self::with_separator(DEFAULT_SEPARATOR)
    }

    pub fn with_separator(separator: char) -> Self {
        Self {
            separator,
            _marker: PhantomData,
        }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// The path a token narrows to on this channel
    pub fn path_for(&self, scope: &ScopeToken) -> ScopePath {
        ScopePath::parse(scope, self.separator)
    }
}

impl<S, V> Default for ScopedChannel<S, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, V> Clone for ScopedChannel<S, V> {
    fn clone(&self) -> Self {
        Self::with_separator(self.separator)
    }
}

impl<S, V> fmt::Debug for ScopedChannel<S, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedChannel")
            .field("source", &type_name::<S>())
            .field("value", &type_name::<V>())
            .field("separator", &self.separator)
            .finish()
    }
}

impl<S, V> ChannelIsolation for ScopedChannel<S, V>
where
    S: NarrowableSource,
    V: Scoped,
{
    type Source = S;
    type Sink = Stream<V>;

    fn isolate_source(&self, source: &S, scope: &ScopeToken) -> S {
        let path = self.path_for(scope);
        let narrowed = source.narrow(&path);
        tracing::trace!(
            scope = %scope,
            from = %source.scope(),
            to = %narrowed.scope(),
            "narrowed source"
        );
        narrowed
    }

    fn isolate_sink(&self, sink: Stream<V>, scope: &ScopeToken) -> Stream<V> {
        let path = self.path_for(scope);
        sink.map(move |value| value.tag(&path))
    }
}

/// Object-safe form of `ChannelIsolation` over erased channel values
pub trait ErasedIsolation: Send + Sync {
    fn isolate_any_source(
        &self,
        channel: &ChannelName,
        source: &AnyChannel,
        scope: &ScopeToken,
    ) -> Result<AnyChannel>;

    fn isolate_any_sink(
        &self,
        channel: &ChannelName,
        sink: &AnyChannel,
        scope: &ScopeToken,
    ) -> Result<AnyChannel>;

    /// Name of the source type this isolation expects
    fn source_type(&self) -> &'static str;

    /// Name of the sink type this isolation expects
    fn sink_type(&self) -> &'static str;
}

impl<I: ChannelIsolation> ErasedIsolation for I {
    fn isolate_any_source(
        &self,
        channel: &ChannelName,
        source: &AnyChannel,
        scope: &ScopeToken,
    ) -> Result<AnyChannel> {
        let typed = source
            .downcast_ref::<I::Source>()
            .ok_or_else(|| IsolateError::MalformedSource {
                channel: channel.clone(),
                expected: type_name::<I::Source>(),
            })?;
        Ok(Arc::new(<I as ChannelIsolation>::isolate_source(
            self, typed, scope,
        )))
    }

    fn isolate_any_sink(
        &self,
        channel: &ChannelName,
        sink: &AnyChannel,
        scope: &ScopeToken,
    ) -> Result<AnyChannel> {
        let typed = sink
            .downcast_ref::<I::Sink>()
            .ok_or_else(|| IsolateError::MalformedSink {
                channel: channel.clone(),
                expected: type_name::<I::Sink>(),
            })?;
        Ok(Arc::new(<I as ChannelIsolation>::isolate_sink(
            self,
            typed.clone(),
            scope,
        )))
    }

    fn source_type(&self) -> &'static str {
        type_name::<I::Source>()
    }

    fn sink_type(&self) -> &'static str {
        type_name::<I::Sink>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Note, NoteChannel, NoteSource};
    use crate::stream::{Recorder, Subject};

    #[test]
    fn test_isolate_source_appends_path() {
        let channel = NoteChannel::new();
        let source = NoteSource::new(Stream::never());

        let narrowed = channel.isolate_source(&source, &ScopeToken::new("y"));
        let nested = channel.isolate_source(&narrowed, &ScopeToken::new("x"));

        assert_eq!(nested.scope(), &ScopePath::from_segments(["y", "x"]));
        assert_eq!(
            channel.isolate_source(&source, &ScopeToken::new("y.x")).scope(),
            nested.scope()
        );
    }

    #[test]
    fn test_isolate_sink_prepends_tag() {
        let channel = NoteChannel::new();
        let subject = Subject::new();
        let recorder = Recorder::new();

        let inner = channel.isolate_sink(subject.stream(), &ScopeToken::new("x"));
        let outer = channel.isolate_sink(inner, &ScopeToken::new("y"));
        let _sub = outer.subscribe(recorder.clone());

        subject.next(Note::new("hi"));
        subject.complete();

        let values = recorder.values();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].scope, ScopePath::from_segments(["y", "x"]));
        assert_eq!(values[0].clone().untag(), Note::new("hi"));
        assert!(recorder.is_completed());
    }

    #[test]
    fn test_custom_separator() {
        let channel = NoteChannel::with_separator('/');
        let path = channel.path_for(&ScopeToken::new("a.b/c"));
        assert_eq!(path, ScopePath::from_segments(["a.b", "c"]));
    }

    #[test]
    fn test_erased_isolation_downcasts() {
        let channel = NoteChannel::new();
        let name = ChannelName::from("NOTES");
        let source: AnyChannel = Arc::new(NoteSource::new(Stream::never()));

        let narrowed = channel
            .isolate_any_source(&name, &source, &ScopeToken::new("a"))
            .unwrap();
        let narrowed = narrowed.downcast_ref::<NoteSource>().unwrap();
        assert_eq!(narrowed.scope(), &ScopePath::from_segments(["a"]));
    }

    #[test]
    fn test_erased_isolation_rejects_wrong_type() {
        let channel = NoteChannel::new();
        let name = ChannelName::from("NOTES");
        let bogus: AnyChannel = Arc::new(42u32);

        let err = channel
            .isolate_any_source(&name, &bogus, &ScopeToken::new("a"))
            .err()
            .unwrap();
        assert!(matches!(err, IsolateError::MalformedSource { .. }));

        let err = channel
            .isolate_any_sink(&name, &bogus, &ScopeToken::new("a"))
            .err()
            .unwrap();
        assert!(matches!(err, IsolateError::MalformedSink { .. }));
        assert!(err.to_string().contains("NOTES"));
    }
}
