//! Push-based streams
//!
//! Components wire their sources to their sinks with these streams.
//! A `Stream` is a lazy producer: nothing runs until someone subscribes,
//! and every subscription gets its own run of the operator chain. A
//! `Subject` is the hot end a driver pushes values into.
//!
//! All delivery is synchronous. Values, errors and completion flow
//! through the chain on the calling thread, and unsubscribing a derived
//! stream unsubscribes everything upstream of it.

use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};

/// Failure travelling through a stream's error channel
///
/// Wraps the component's own error so it can be handed to every
/// listener of a multicast stream.
#[derive(Clone)]
pub struct StreamError(Arc<anyhow::Error>);

impl StreamError {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(error.into()))
    }

    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::msg(message)))
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Debug for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamError({:?})", self.0)
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StreamError {}

/// Signal delivered to a listener
#[derive(Debug, Clone)]
pub enum Event<T> {
    Next(T),
    Error(StreamError),
    Complete,
}

impl<T> Event<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Event::Next(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Next(_))
    }
}

/// Receives the signals of one subscription
pub trait Listener<T>: Send {
    /// Called for every value
    fn on_next(&mut self, value: T);

    /// Called once if the stream fails
    fn on_error(&mut self, error: StreamError) {
        let _ = error;
    }

    /// Called once when the stream ends
    fn on_complete(&mut self) {}

    /// Convenience method to dispatch an event
    fn handle(&mut self, event: Event<T>) {
        match event {
            Event::Next(value) => self.on_next(value),
            Event::Error(error) => self.on_error(error),
            Event::Complete => self.on_complete(),
        }
    }
}

/// A listener that calls a closure for every event
pub struct CallbackListener<F> {
    callback: F,
}

impl<F> CallbackListener<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<T, F> Listener<T> for CallbackListener<F>
where
    F: FnMut(Event<T>) + Send,
{
    fn on_next(&mut self, value: T) {
        (self.callback)(Event::Next(value));
    }

    fn on_error(&mut self, error: StreamError) {
        (self.callback)(Event::Error(error));
    }

    fn on_complete(&mut self) {
        (self.callback)(Event::Complete);
    }
}

/// A listener that records every event it receives
///
/// Clones share the same log, so keep one clone and subscribe the other.
pub struct Recorder<T> {
    events: Arc<Mutex<Vec<Event<T>>>>,
}

impl<T> Recorder<T> {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn is_completed(&self) -> bool {
        self.events
            .lock()
            .iter()
            .any(|event| matches!(event, Event::Complete))
    }

    pub fn error(&self) -> Option<StreamError> {
        self.events.lock().iter().find_map(|event| match event {
            Event::Error(error) => Some(error.clone()),
            _ => None,
        })
    }
}

impl<T: Clone> Recorder<T> {
    pub fn events(&self) -> Vec<Event<T>> {
        self.events.lock().clone()
    }

    pub fn values(&self) -> Vec<T> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| event.value().cloned())
            .collect()
    }
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Recorder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("events", &*self.events.lock())
            .finish()
    }
}

impl<T: Send> Listener<T> for Recorder<T> {
    fn on_next(&mut self, value: T) {
        self.events.lock().push(Event::Next(value));
    }

    fn on_error(&mut self, error: StreamError) {
        self.events.lock().push(Event::Error(error));
    }

    fn on_complete(&mut self) {
        self.events.lock().push(Event::Complete);
    }
}

/// Handle for cancelling a subscription
///
/// Dropping a subscription does not cancel it; call `unsubscribe`.
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription with nothing to tear down
    pub fn empty() -> Self {
        Self { teardown: None }
    }

    /// Combine several subscriptions into one
    pub fn all(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || {
            for mut subscription in subscriptions {
                subscription.unsubscribe();
            }
        })
    }

    /// Stop receiving events; later calls do nothing
    pub fn unsubscribe(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

type Producer<T> = dyn Fn(Box<dyn Listener<T>>) -> Subscription + Send + Sync;

/// A lazy, cloneable sequence of values
pub struct Stream<T> {
    producer: Arc<Producer<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
        }
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("item", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Send + 'static> Stream<T> {
    /// Create a stream from a producer run once per subscription
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn(Box<dyn Listener<T>>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            producer: Arc::new(producer),
        }
    }

    /// A stream that completes immediately
    pub fn empty() -> Self {
        Self::new(|mut listener| {
            listener.on_complete();
            Subscription::empty()
        })
    }

    /// A stream that never emits anything
    pub fn never() -> Self {
        Self::new(|_listener| Subscription::empty())
    }

    /// A stream that fails immediately
    pub fn fail(error: StreamError) -> Self {
        Self::new(move |mut listener| {
            listener.on_error(error.clone());
            Subscription::empty()
        })
    }

    pub fn subscribe<L>(&self, listener: L) -> Subscription
    where
        L: Listener<T> + 'static,
    {
        (self.producer)(Box::new(listener))
    }

    pub fn subscribe_fn<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(Event<T>) + Send + 'static,
    {
        self.subscribe(CallbackListener::new(callback))
    }

    /// Transform every value; errors and completion pass through untouched
    pub fn map<U, F>(&self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Stream::new(move |inner| {
            upstream.subscribe(MapListener {
                inner,
                f: f.clone(),
            })
        })
    }

    /// Keep only the values matching `predicate`
    pub fn filter<P>(&self, predicate: P) -> Stream<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let predicate = Arc::new(predicate);
        Stream::new(move |inner| {
            upstream.subscribe(FilterListener {
                inner,
                predicate: predicate.clone(),
            })
        })
    }

    /// Fold values into an accumulator, emitting it after every value
    ///
    /// The seed itself is never emitted.
    pub fn scan<A, F>(&self, seed: A, f: F) -> Stream<A>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(&A, T) -> A + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Stream::new(move |inner| {
            upstream.subscribe(ScanListener {
                inner,
                acc: seed.clone(),
                f: f.clone(),
            })
        })
    }

    /// Interleave several streams
    ///
    /// Completes once every input completed; the first error ends it.
    pub fn merge(streams: Vec<Stream<T>>) -> Stream<T> {
        Stream::new(move |mut listener| {
            if streams.is_empty() {
                listener.on_complete();
                return Subscription::empty();
            }
            let state = Arc::new(Mutex::new(MergeState {
                listener: Some(listener),
                pending: VecDeque::new(),
                remaining: streams.len(),
                done: false,
            }));
            let subscriptions = streams
                .iter()
                .map(|stream| {
                    stream.subscribe(MergeListener {
                        state: state.clone(),
                    })
                })
                .collect();
            Subscription::all(subscriptions)
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// A stream emitting `values` synchronously, then completing
    pub fn of(values: Vec<T>) -> Self {
        Self::new(move |mut listener| {
            for value in &values {
                listener.on_next(value.clone());
            }
            listener.on_complete();
            Subscription::empty()
        })
    }
}

struct MapListener<U, F> {
    inner: Box<dyn Listener<U>>,
    f: Arc<F>,
}

impl<T, U, F> Listener<T> for MapListener<U, F>
where
    F: Fn(T) -> U + Send + Sync,
{
    fn on_next(&mut self, value: T) {
        self.inner.on_next((self.f)(value));
    }

    fn on_error(&mut self, error: StreamError) {
        self.inner.on_error(error);
    }

    fn on_complete(&mut self) {
        self.inner.on_complete();
    }
}

struct FilterListener<T, P> {
    inner: Box<dyn Listener<T>>,
    predicate: Arc<P>,
}

impl<T, P> Listener<T> for FilterListener<T, P>
where
    P: Fn(&T) -> bool + Send + Sync,
{
    fn on_next(&mut self, value: T) {
        if (self.predicate)(&value) {
            self.inner.on_next(value);
        }
    }

    fn on_error(&mut self, error: StreamError) {
        self.inner.on_error(error);
    }

    fn on_complete(&mut self) {
        self.inner.on_complete();
    }
}

struct ScanListener<A, F> {
    inner: Box<dyn Listener<A>>,
    acc: A,
    f: Arc<F>,
}

impl<T, A, F> Listener<T> for ScanListener<A, F>
where
    A: Clone + Send,
    F: Fn(&A, T) -> A + Send + Sync,
{
    fn on_next(&mut self, value: T) {
        self.acc = (self.f)(&self.acc, value);
        self.inner.on_next(self.acc.clone());
    }

    fn on_error(&mut self, error: StreamError) {
        self.inner.on_error(error);
    }

    fn on_complete(&mut self) {
        self.inner.on_complete();
    }
}

struct MergeState<T> {
    /// None while some call further up the stack is delivering
    listener: Option<Box<dyn Listener<T>>>,
    pending: VecDeque<Event<T>>,
    remaining: usize,
    done: bool,
}

/// One input of a merge
///
/// Signals are queued and delivered with the state lock released, so a
/// downstream listener may push into another merged input. Such re-entrant
/// signals are delivered after the current one, in arrival order.
struct MergeListener<T> {
    state: Arc<Mutex<MergeState<T>>>,
}

impl<T> MergeListener<T> {
    fn deliver(&self, mut state: MutexGuard<'_, MergeState<T>>) {
        let Some(mut listener) = state.listener.take() else {
            return;
        };
        drop(state);
        loop {
            let event = {
                let mut state = self.state.lock();
                match state.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        state.listener = Some(listener);
                        return;
                    }
                }
            };
            listener.handle(event);
        }
    }
}

impl<T: Send> Listener<T> for MergeListener<T> {
    fn on_next(&mut self, value: T) {
        let mut state = self.state.lock();
        if !state.done {
            state.pending.push_back(Event::Next(value));
            self.deliver(state);
        }
    }

    fn on_error(&mut self, error: StreamError) {
        let mut state = self.state.lock();
        if !state.done {
            state.done = true;
            state.pending.push_back(Event::Error(error));
            self.deliver(state);
        }
    }

    fn on_complete(&mut self) {
        let mut state = self.state.lock();
        state.remaining = state.remaining.saturating_sub(1);
        if state.remaining == 0 && !state.done {
            state.done = true;
            state.pending.push_back(Event::Complete);
            self.deliver(state);
        }
    }
}

type SharedListener<T> = Arc<Mutex<Box<dyn Listener<T>>>>;

#[derive(Clone)]
enum Terminal {
    Error(StreamError),
    Complete,
}

struct SubjectState<T> {
    listeners: BTreeMap<u64, SharedListener<T>>,
    next_id: u64,
    terminal: Option<Terminal>,
}

/// Hot multicast source that drivers push values into
///
/// Listeners are invoked outside the subject's own lock, but each
/// listener must not push back into the subject that is calling it.
pub struct Subject<T> {
    state: Arc<Mutex<SubjectState<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Subject")
            .field("listeners", &state.listeners.len())
            .field("terminated", &state.terminal.is_some())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Subject<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                listeners: BTreeMap::new(),
                next_id: 1,
                terminal: None,
            })),
        }
    }

    /// A stream view of this subject
    ///
    /// Subscribing after the subject terminated delivers the terminal
    /// signal straight away.
    pub fn stream(&self) -> Stream<T> {
        let state = self.state.clone();
        Stream::new(move |mut listener| {
            let mut guard = state.lock();
            let terminal = guard.terminal.clone();
            if let Some(terminal) = terminal {
                drop(guard);
                match terminal {
                    Terminal::Error(error) => listener.on_error(error),
                    Terminal::Complete => listener.on_complete(),
                }
                return Subscription::empty();
            }

            let id = guard.next_id;
            guard.next_id += 1;
            guard.listeners.insert(id, Arc::new(Mutex::new(listener)));
            drop(guard);

            let weak: Weak<Mutex<SubjectState<T>>> = Arc::downgrade(&state);
            Subscription::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.lock().listeners.remove(&id);
                }
            })
        })
    }

    /// Push a value to every current listener
    pub fn next(&self, value: T) {
        let listeners: Vec<SharedListener<T>> = {
            let state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            state.listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener.lock().on_next(value.clone());
        }
    }

    /// Fail the subject; later values are ignored
    pub fn error(&self, error: StreamError) {
        let listeners = match self.terminate(Terminal::Error(error.clone())) {
            Some(listeners) => listeners,
            None => return,
        };
        for listener in listeners {
            listener.lock().on_error(error.clone());
        }
    }

    /// Complete the subject; later values are ignored
    pub fn complete(&self) {
        let listeners = match self.terminate(Terminal::Complete) {
            Some(listeners) => listeners,
            None => return,
        };
        for listener in listeners {
            listener.lock().on_complete();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminal.is_some()
    }

    fn terminate(&self, terminal: Terminal) -> Option<Vec<SharedListener<T>>> {
        let mut state = self.state.lock();
        if state.terminal.is_some() {
            return None;
        }
        state.terminal = Some(terminal);
        let listeners = std::mem::take(&mut state.listeners);
        Some(listeners.into_values().collect())
    }
}
