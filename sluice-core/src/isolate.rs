//! The isolation combinator
//!
//! `Isolator::isolate` wraps a component so that every registered
//! channel is narrowed on the way in and tagged on the way out. The
//! scope is fixed when `isolate` is called: an implicit scope draws one
//! fresh token per call, an explicit one is used verbatim, so isolating
//! the same component twice with the same explicit token yields two
//! interchangeable components sharing one boundary.

use crate::channel::{AnyChannel, ErasedIsolation};
use crate::component::{Component, Sinks, Sources};
use crate::error::Result;
use crate::registry::{ChannelPolicy, IsolationRegistry};
use crate::scope::ScopeGenerator;
use sluice_types::{ChannelName, ScopeToken};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Scope argument accepted by `Isolator::isolate`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Scope {
    /// Draw a fresh token from the generator
    #[default]
    Implicit,
    /// Use one token for every channel
    Token(ScopeToken),
    /// Choose per channel
    PerChannel(ChannelScopes),
}

impl From<ScopeToken> for Scope {
    fn from(token: ScopeToken) -> Self {
        Scope::Token(token)
    }
}

impl From<&str> for Scope {
    fn from(token: &str) -> Self {
        Scope::Token(ScopeToken::new(token))
    }
}

impl From<String> for Scope {
    fn from(token: String) -> Self {
        Scope::Token(ScopeToken::new(token))
    }
}

impl From<Option<ScopeToken>> for Scope {
    fn from(token: Option<ScopeToken>) -> Self {
        token.map_or(Scope::Implicit, Scope::Token)
    }
}

impl From<ChannelScopes> for Scope {
    fn from(scopes: ChannelScopes) -> Self {
        Scope::PerChannel(scopes)
    }
}

/// Per-channel scope selection
///
/// Channels named here use their own token, or are skipped entirely
/// (left unisolated). Every other channel uses the wildcard token, or
/// a single implicit token drawn when `isolate` is called.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelScopes {
    wildcard: Option<ScopeToken>,
    channels: BTreeMap<ChannelName, Option<ScopeToken>>,
}

impl ChannelScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for every channel not listed explicitly
    pub fn wildcard(mut self, token: impl Into<ScopeToken>) -> Self {
        self.wildcard = Some(token.into());
        self
    }

    pub fn channel(
        mut self,
        channel: impl Into<ChannelName>,
        token: impl Into<ScopeToken>,
    ) -> Self {
        self.channels.insert(channel.into(), Some(token.into()));
        self
    }

    /// Leave a channel unisolated
    pub fn skip(mut self, channel: impl Into<ChannelName>) -> Self {
        self.channels.insert(channel.into(), None);
        self
    }
}

/// The scope an isolated component was built with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    fallback: ScopeToken,
    channels: BTreeMap<ChannelName, Option<ScopeToken>>,
}

impl ResolvedScope {
    /// Token applied to `channel`, or None if the channel is skipped
    pub fn token_for(&self, channel: &str) -> Option<&ScopeToken> {
        match self.channels.get(channel) {
            Some(token) => token.as_ref(),
            None => Some(&self.fallback),
        }
    }

    /// Token applied to channels without an explicit choice
    pub fn fallback(&self) -> &ScopeToken {
        &self.fallback
    }
}

impl fmt::Display for ResolvedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fallback)?;
        for (channel, token) in &self.channels {
            match token {
                Some(token) => write!(f, ",{}={}", channel, token)?,
                None => write!(f, ",{}=-", channel)?,
            }
        }
        Ok(())
    }
}

/// Builds isolated components against one registry and token generator
#[derive(Debug, Clone)]
pub struct Isolator {
    registry: IsolationRegistry,
    generator: Arc<ScopeGenerator>,
}

impl Isolator {
    pub fn new(registry: IsolationRegistry, generator: Arc<ScopeGenerator>) -> Self {
        Self {
            registry,
            generator,
        }
    }

    /// Isolator with a private default generator
    ///
    /// Implicit tokens are only unique per generator, so two isolators built
    /// this way both start at `sluice1`. Isolators whose components may end
    /// up side by side should share one generator, either by cloning an
    /// `Isolator` or through `Isolator::new` with a shared `Arc<ScopeGenerator>`.
    pub fn with_registry(registry: IsolationRegistry) -> Self {
        Self::new(registry, Arc::new(ScopeGenerator::new()))
    }

    pub fn registry(&self) -> &IsolationRegistry {
        &self.registry
    }

    pub fn generator(&self) -> &Arc<ScopeGenerator> {
        &self.generator
    }

    /// Wrap `component` in an isolation boundary
    pub fn isolate<C: Component>(&self, component: C, scope: impl Into<Scope>) -> Isolated<C> {
        let scope = self.resolve(scope.into());
        let name = format!("isolate({}, {})", component.name(), scope);
        tracing::debug!(component = component.name(), scope = %scope, "isolating component");
        Isolated {
            inner: component,
            scope,
            registry: self.registry.clone(),
            name,
        }
    }

    fn resolve(&self, scope: Scope) -> ResolvedScope {
        let resolved = match scope {
            Scope::Implicit => ResolvedScope {
                fallback: self.generator.next_scope(),
                channels: BTreeMap::new(),
            },
            Scope::Token(token) => ResolvedScope {
                fallback: token,
                channels: BTreeMap::new(),
            },
            Scope::PerChannel(scopes) => ResolvedScope {
                fallback: scopes
                    .wildcard
                    .unwrap_or_else(|| self.generator.next_scope()),
                channels: scopes.channels,
            },
        };

        let empty = resolved.fallback.is_empty()
            || resolved
                .channels
                .values()
                .any(|token| token.as_ref().is_some_and(ScopeToken::is_empty));
        if empty {
            tracing::warn!(scope = %resolved, "empty scope token narrows nothing");
        }
        resolved
    }
}

/// A component running behind an isolation boundary
pub struct Isolated<C> {
    inner: C,
    scope: ResolvedScope,
    registry: IsolationRegistry,
    name: String,
}

impl<C> Isolated<C> {
    pub fn scope(&self) -> &ResolvedScope {
        &self.scope
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn isolation_for(
        &self,
        channel: &ChannelName,
    ) -> Option<(Arc<dyn ErasedIsolation>, &ScopeToken)> {
        let Some(token) = self.scope.token_for(channel.as_str()) else {
            tracing::trace!(channel = %channel, "channel skipped by scope");
            return None;
        };
        match self.registry.policy_for(channel.as_str()) {
            ChannelPolicy::Isolatable(isolation) => Some((isolation, token)),
            ChannelPolicy::PassThrough => {
                tracing::trace!(channel = %channel, "pass-through channel");
                None
            }
        }
    }
}

impl<C: Component> Component for Isolated<C> {
    fn run(&self, sources: &Sources) -> Result<Sinks> {
        let mut scoped = Sources::new();
        for (channel, source) in sources.iter() {
            let value: AnyChannel = match self.isolation_for(channel) {
                Some((isolation, token)) => isolation.isolate_any_source(channel, source, token)?,
                None => source.clone(),
            };
            scoped.insert_erased(channel.clone(), value);
        }

        let sinks = self.inner.run(&scoped)?;

        let mut tagged = Sinks::new();
        for (channel, sink) in sinks.iter() {
            let value: AnyChannel = match self.isolation_for(channel) {
                Some((isolation, token)) => {
                    tracing::trace!(channel = %channel, scope = %token, "tagging sink");
                    isolation.isolate_any_sink(channel, sink, token)?
                }
                None => sink.clone(),
            };
            tagged.insert_erased(channel.clone(), value);
        }
        Ok(tagged)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<C> fmt::Debug for Isolated<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Isolated")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{NarrowableSource, Scoped};
    use crate::component::component_fn;
    use crate::error::IsolateError;
    use crate::fixtures::{Note, NoteChannel, NoteSource};
    use crate::stream::{Recorder, Stream, StreamError, Subject};
    use sluice_types::ScopePath;

    const NOTES: &str = "NOTES";

    fn isolator() -> Isolator {
        let registry = IsolationRegistry::new();
        registry.register(NOTES, NoteChannel::new());
        Isolator::with_registry(registry)
    }

    fn counter() -> impl Component {
        component_fn("counter", |sources: &Sources| {
            let notes = sources.require::<NoteSource>(NOTES)?;
            let count = notes.notes().scan(0u32, |n, _| n + 1);
            let view = count.map(|n| Note::new(format!("count {}", n)));
            Ok(Sinks::new().with("count", count).with(NOTES, view))
        })
    }

    /// Reports the scope its notes source was narrowed to
    fn inspector() -> impl Component {
        component_fn("inspector", |sources: &Sources| {
            let notes = sources.require::<NoteSource>(NOTES)?;
            Ok(Sinks::new().with("scope", notes.scope().clone()))
        })
    }

    fn run_counter(
        component: &dyn Component,
        subject: &Subject<Note>,
    ) -> (Recorder<u32>, Recorder<Note>) {
        let sources = Sources::new().with(NOTES, NoteSource::new(subject.stream()));
        let sinks = component.run(&sources).unwrap();

        let counts = Recorder::new();
        let views = Recorder::new();
        sinks.stream::<u32>("count").unwrap().subscribe(counts.clone());
        sinks.stream::<Note>(NOTES).unwrap().subscribe(views.clone());
        (counts, views)
    }

    #[test]
    fn test_siblings_do_not_interfere() {
        let isolator = isolator();
        let a = isolator.isolate(counter(), "a");
        let b = isolator.isolate(counter(), "b");
        let subject = Subject::new();

        let (a_counts, a_views) = run_counter(&a, &subject);
        let (b_counts, _) = run_counter(&b, &subject);

        for _ in 0..3 {
            subject.next(Note::at(["a"], "click"));
        }
        for _ in 0..2 {
            subject.next(Note::at(["b"], "click"));
        }

        assert_eq!(a_counts.values(), vec![1, 2, 3]);
        assert_eq!(b_counts.values(), vec![1, 2]);

        let views = a_views.values();
        assert_eq!(views.len(), 3);
        assert!(views.iter().all(|note| note.scope == ScopePath::from_segments(["a"])));
        assert_eq!(views[2].clone().untag(), Note::new("count 3"));
    }

    #[test]
    fn test_implicit_scopes_are_fresh_per_call() {
        let isolator = isolator();
        let first = isolator.isolate(counter(), Scope::Implicit);
        let second = isolator.isolate(counter(), Scope::Implicit);

        assert_ne!(first.scope(), second.scope());
        assert_eq!(first.scope().fallback().as_str(), "sluice1");
        assert_eq!(second.scope().fallback().as_str(), "sluice2");

        // Running the isolated component does not draw new tokens
        let subject = Subject::new();
        run_counter(&first, &subject);
        run_counter(&first, &subject);
        assert_eq!(isolator.generator().issued(), 2);
    }

    #[test]
    fn test_isolators_sharing_a_generator_never_collide() {
        let registry = IsolationRegistry::new();
        registry.register(NOTES, NoteChannel::new());

        // Private generators restart the sequence
        let first = Isolator::with_registry(registry.clone()).isolate(counter(), Scope::Implicit);
        let second = Isolator::with_registry(registry.clone()).isolate(counter(), Scope::Implicit);
        assert_eq!(first.scope(), second.scope());

        let generator = Arc::new(ScopeGenerator::new());
        let left = Isolator::new(registry.clone(), generator.clone());
        let right = Isolator::new(registry, generator.clone());
        let a = left.isolate(counter(), Scope::Implicit);
        let b = right.isolate(counter(), Scope::Implicit);
        let c = left.clone().isolate(counter(), Scope::Implicit);

        assert_ne!(a.scope(), b.scope());
        assert_ne!(b.scope(), c.scope());
        assert_ne!(a.scope(), c.scope());
        assert_eq!(generator.issued(), 3);

        let subject = Subject::new();
        let (a_counts, _) = run_counter(&a, &subject);
        let (b_counts, _) = run_counter(&b, &subject);
        subject.next(Note::at(["sluice2"], "x"));
        assert!(a_counts.is_empty());
        assert_eq!(b_counts.values(), vec![1]);
    }

    #[test]
    fn test_explicit_scope_is_referentially_transparent() {
        let isolator = isolator();
        let one = isolator.isolate(counter(), "s");
        let two = isolator.isolate(counter(), "s");
        assert_eq!(one.scope(), two.scope());
        assert_eq!(isolator.generator().issued(), 0);

        let subject = Subject::new();
        let (one_counts, one_views) = run_counter(&one, &subject);
        let (two_counts, two_views) = run_counter(&two, &subject);
        subject.next(Note::at(["s"], "x"));
        subject.next(Note::at(["s"], "y"));

        assert_eq!(one_counts.values(), two_counts.values());
        assert_eq!(one_views.values(), two_views.values());
    }

    #[test]
    fn test_nested_isolation_composes_paths() {
        let isolator = isolator();
        let nested = isolator.isolate(isolator.isolate(inspector(), "x"), "y");
        let dotted = isolator.isolate(inspector(), "y.x");

        let sources = Sources::new().with(NOTES, NoteSource::new(Stream::never()));
        let nested_scope = nested.run(&sources).unwrap();
        let dotted_scope = dotted.run(&sources).unwrap();

        let expected = ScopePath::from_segments(["y", "x"]);
        assert_eq!(nested_scope.get::<ScopePath>("scope"), Some(&expected));
        assert_eq!(dotted_scope.get::<ScopePath>("scope"), Some(&expected));
    }

    #[test]
    fn test_pass_through_channels_are_identical() {
        let isolator = isolator();
        let echo = component_fn("echo", |sources: &Sources| {
            let mut sinks = Sinks::new();
            if let Some(props) = sources.erased("props") {
                sinks.insert_erased("props", props.clone());
            }
            Ok(sinks)
        });
        let isolated = isolator.isolate(echo, "a");

        let sources = Sources::new().with("props", String::from("title"));
        let sinks = isolated.run(&sources).unwrap();

        let before = sources.erased("props").unwrap();
        let after = sinks.erased("props").unwrap();
        assert!(Arc::ptr_eq(before, after));
    }

    #[test]
    fn test_absent_sink_is_not_synthesized() {
        let isolator = isolator();
        let quiet = component_fn("quiet", |sources: &Sources| {
            let notes = sources.require::<NoteSource>(NOTES)?;
            Ok(Sinks::new().with("count", notes.notes().scan(0u32, |n, _| n + 1)))
        });
        let isolated = isolator.isolate(quiet, "a");

        let sources = Sources::new().with(NOTES, NoteSource::new(Stream::never()));
        let sinks = isolated.run(&sources).unwrap();
        assert!(sinks.contains("count"));
        assert!(!sinks.contains(NOTES));
        assert_eq!(sinks.len(), 1);
    }

    #[test]
    fn test_malformed_source_fails_loudly() {
        let isolator = isolator();
        let isolated = isolator.isolate(counter(), "a");

        let sources = Sources::new().with(NOTES, 5u32);
        let err = isolated.run(&sources).err().unwrap();
        assert!(matches!(
            err,
            IsolateError::MalformedSource { ref channel, .. } if channel.as_str() == NOTES
        ));
    }

    #[test]
    fn test_malformed_sink_fails_loudly() {
        let isolator = isolator();
        let liar = component_fn("liar", |_: &Sources| Ok(Sinks::new().with(NOTES, "not a stream")));
        let isolated = isolator.isolate(liar, "a");

        let err = isolated.run(&Sources::new()).err().unwrap();
        assert!(matches!(err, IsolateError::MalformedSink { .. }));
    }

    #[test]
    fn test_skipped_channel_is_not_narrowed() {
        let isolator = isolator();
        let skipped = isolator.isolate(inspector(), ChannelScopes::new().wildcard("a").skip(NOTES));
        let chosen = isolator.isolate(inspector(), ChannelScopes::new().channel(NOTES, "b"));

        let sources = Sources::new().with(NOTES, NoteSource::new(Stream::never()));
        let skipped_scope = skipped.run(&sources).unwrap();
        let chosen_scope = chosen.run(&sources).unwrap();

        assert_eq!(skipped_scope.get::<ScopePath>("scope"), Some(&ScopePath::root()));
        assert_eq!(
            chosen_scope.get::<ScopePath>("scope"),
            Some(&ScopePath::from_segments(["b"]))
        );

        // No wildcard: the remaining channels got one generated token
        assert_eq!(chosen.scope().fallback().as_str(), "sluice1");
        assert_eq!(isolator.generator().issued(), 1);
        assert_eq!(skipped.scope().token_for(NOTES), None);
    }

    #[test]
    fn test_stream_errors_pass_through_sink_isolation() {
        let isolator = isolator();
        let broken = component_fn("broken", |_: &Sources| {
            Ok(Sinks::new().with(NOTES, Stream::<Note>::fail(StreamError::msg("bad state"))))
        });
        let isolated = isolator.isolate(broken, "a");

        let sinks = isolated.run(&Sources::new()).unwrap();
        let recorder = Recorder::new();
        sinks.stream::<Note>(NOTES).unwrap().subscribe(recorder.clone());

        assert!(recorder.values().is_empty());
        assert_eq!(recorder.error().unwrap().to_string(), "bad state");
    }

    #[test]
    fn test_unregistered_channel_after_isolate_call() {
        let isolator = isolator();
        let isolated = isolator.isolate(inspector(), "a");
        isolator.registry().unregister(NOTES);

        // The registry is consulted on every run
        let sources = Sources::new().with(NOTES, NoteSource::new(Stream::never()));
        let sinks = isolated.run(&sources).unwrap();
        assert_eq!(sinks.get::<ScopePath>("scope"), Some(&ScopePath::root()));
    }

    #[test]
    fn test_scope_conversions() {
        assert_eq!(Scope::from(None::<ScopeToken>), Scope::Implicit);
        assert_eq!(
            Scope::from(Some(ScopeToken::new("a"))),
            Scope::Token(ScopeToken::new("a"))
        );
        assert_eq!(Scope::from("a"), Scope::from(String::from("a")));
        assert_eq!(Scope::default(), Scope::Implicit);
    }
}
