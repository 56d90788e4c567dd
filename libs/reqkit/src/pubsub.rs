//! Process-wide topic broker for events outside the request/response cycle.
//!
//! Design notes:
//! - The registry is only mutated by `subscribe` / `unsubscribe` / `shutdown`; each takes
//!   the lock once and never awaits while holding it.
//! - `publish` snapshots the topic's handlers and spawns each one as its own task, so a
//!   failing or panicking handler cannot affect its siblings or the publisher.
//! - Handler identity is `Arc` pointer identity: clone a [`Handler`] to unsubscribe it.
//! - Messages published to a topic with no subscribers are dropped.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type HandlerFn<M> = dyn Fn(M) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Async message handler.
pub struct Handler<M> {
    f: Arc<HandlerFn<M>>,
}

impl<M: 'static> Handler<M> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |m| f(m).boxed()),
        }
    }

    fn call(&self, message: M) -> BoxFuture<'static, anyhow::Result<()>> {
        (self.f)(message)
    }
}

impl<M> Clone for Handler<M> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}

impl<M> PartialEq for Handler<M> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.f) as *const (),
            Arc::as_ptr(&other.f) as *const (),
        )
    }
}

impl<M> Eq for Handler<M> {}

impl<M> fmt::Debug for Handler<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Arc::as_ptr(&self.f) as *const ())
    }
}

struct Inner<M> {
    topics: Mutex<HashMap<String, Vec<Handler<M>>>>,
    shutdown: CancellationToken,
}

impl<M> Inner<M> {
    fn remove(&self, topic: &str, handler: &Handler<M>) -> bool {
        let mut topics = self.topics.lock();
        let Some(handlers) = topics.get_mut(topic) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|h| h != handler);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            topics.remove(topic);
        }
        removed
    }
}

impl<M> Drop for Inner<M> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Topic-keyed registry of async handlers.
///
/// Create one per application session and call [`Broker::shutdown`] (or drop every
/// clone) when the session ends.
pub struct Broker<M> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for Broker<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: Clone + Send + 'static> Default for Broker<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Clone + Send + 'static> Broker<M> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Add `handler` to `topic`. Returns `false` if it was already subscribed
    /// (or the broker is shut down).
    pub fn subscribe(&self, topic: impl Into<String>, handler: Handler<M>) -> bool {
        if self.is_shut_down() {
            tracing::warn!("subscribe after broker shutdown ignored");
            return false;
        }
        let mut topics = self.inner.topics.lock();
        let handlers = topics.entry(topic.into()).or_default();
        if handlers.contains(&handler) {
            return false;
        }
        handlers.push(handler);
        true
    }

    /// Subscribe for as long as the returned guard lives.
    ///
    /// If `handler` was already subscribed to `topic` the guard is inert: dropping it
    /// leaves the existing subscription in place.
    pub fn subscribe_scoped(&self, topic: impl Into<String>, handler: Handler<M>) -> Subscription<M> {
        let topic = topic.into();
        let armed = self.subscribe(topic.clone(), handler.clone());
        Subscription {
            broker: Arc::downgrade(&self.inner),
            topic,
            handler,
            armed,
        }
    }

    /// Remove `handler` from `topic`; the topic entry goes away with its last handler.
    pub fn unsubscribe(&self, topic: &str, handler: &Handler<M>) -> bool {
        self.inner.remove(topic, handler)
    }

    /// Dispatch `message` to every handler currently subscribed to `topic`.
    pub fn publish(&self, topic: &str, message: M) -> Delivery {
        let snapshot = self
            .inner
            .topics
            .lock()
            .get(topic)
            .cloned()
            .unwrap_or_default();

        if snapshot.is_empty() {
            tracing::debug!(topic, "no subscribers; message dropped");
            return Delivery::default();
        }

        let handles = snapshot
            .into_iter()
            .map(|handler| {
                let message = message.clone();
                let topic = topic.to_string();
                let shutdown = self.inner.shutdown.clone();
                tokio::spawn(async move {
                    let run = AssertUnwindSafe(async move { handler.call(message).await })
                        .catch_unwind();
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            tracing::debug!(topic = %topic, "handler abandoned on shutdown");
                        }
                        res = run => match res {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => tracing::warn!(topic = %topic, error = %e, "subscriber failed"),
                            Err(_) => tracing::warn!(topic = %topic, "subscriber panicked"),
                        },
                    }
                })
            })
            .collect();

        Delivery { handles }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.topics.lock().get(topic).map_or(0, Vec::len)
    }

    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.topics.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every subscription and abandon in-flight handlers.
    pub fn shutdown(&self) {
        self.inner.topics.lock().clear();
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

/// Handles for the tasks spawned by one `publish` call.
#[derive(Debug, Default)]
pub struct Delivery {
    handles: Vec<JoinHandle<()>>,
}

impl Delivery {
    /// Number of handlers the message was dispatched to.
    pub fn dispatched(&self) -> usize {
        self.handles.len()
    }

    /// Wait until every dispatched handler has finished. Dropping the delivery instead
    /// leaves the handlers running.
    pub async fn settled(self) {
        for h in self.handles {
            let _ = h.await;
        }
    }
}

/// Unsubscribes its handler when dropped.
pub struct Subscription<M> {
    broker: Weak<Inner<M>>,
    topic: String,
    handler: Handler<M>,
    armed: bool,
}

impl<M> Subscription<M> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether dropping this guard removes a subscription.
    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl<M> Drop for Subscription<M> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(inner) = self.broker.upgrade() {
            inner.remove(&self.topic, &self.handler);
        }
    }
}
