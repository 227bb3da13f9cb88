//! # Event Streamer
//!
//! Process-local publish/subscribe keyed by topic.
//!
//! Each topic is a tokio broadcast channel created on first subscription.
//! The topic map is only read-locked to look a channel up; sends then go
//! through that topic's own channel, so publishers on different topics
//! never wait on each other. The write lock is taken only to add or forget
//! a topic.
//! Every subscription keeps its own cursor into a ring of `buffer` events,
//! so a slow subscriber never blocks a publisher: once it falls `buffer`
//! events behind, the oldest ones are dropped for that subscriber only.
//!
//! Delivery rules:
//! - a subscription sees events published after `subscribe` returned
//! - events from one publisher arrive in publication order
//! - every subscription on a topic sees every event (fan-out)

use futures::Stream;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

/// Topic-keyed broadcast bus.
pub struct Streamer<T, E> {
    topics: RwLock<HashMap<T, broadcast::Sender<E>>>,
    buffer: usize,
}

impl<T, E> Debug for Streamer<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streamer")
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

impl<T, E> Streamer<T, E>
where
    T: Eq + Hash + Clone + Debug,
    E: Clone,
{
    /// A bus whose subscriptions each buffer up to `buffer` events.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Start listening on `topic`, creating its channel on first use.
    pub fn subscribe(&self, topic: T) -> Subscription<E> {
        if let Some(tx) = self.sender(&topic) {
            return Subscription { rx: tx.subscribe() };
        }
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let rx = topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .subscribe();
        Subscription { rx }
    }

    /// Channel of `topic`, cloned out from under the read lock.
    fn sender(&self, topic: &T) -> Option<broadcast::Sender<E>> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics.get(topic).cloned()
    }

    /// Deliver `event` to every current subscription of `topic`.
    ///
    /// Returns how many subscriptions received it. A topic whose last
    /// subscription is gone is forgotten.
    pub fn publish(&self, topic: &T, event: E) -> usize {
        let Some(tx) = self.sender(topic) else {
            return 0;
        };
        match tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
                // Someone may have subscribed since the send.
                if topics.get(topic).is_some_and(|tx| tx.receiver_count() == 0) {
                    debug!(?topic, "dropping topic without subscribers");
                    topics.remove(topic);
                }
                0
            }
        }
    }

    /// Live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &T) -> usize {
        self.sender(topic)
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

/// One consumer's view of a topic.
#[derive(Debug)]
pub struct Subscription<E> {
    rx: broadcast::Receiver<E>,
}

impl<E: Clone> Subscription<E> {
    /// Wait for the next event. `None` once the topic is gone.
    pub async fn next(&mut self) -> Option<E> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, oldest events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// The next event if one is already buffered.
    pub fn try_next(&mut self) -> Option<E> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, oldest events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving. Nothing is delivered to this subscription afterwards.
    pub fn close(self) {}

    /// Adapt into a `Stream` that ends when the topic goes away.
    pub fn into_stream(mut self) -> impl Stream<Item = E> {
        async_stream::stream! {
            while let Some(event) = self.next().await {
                yield event;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_publication_order() {
        let streamer: Streamer<&str, u32> = Streamer::new(16);
        let mut a = streamer.subscribe("t");
        let mut b = streamer.subscribe("t");

        for e in 1..=3 {
            streamer.publish(&"t", e);
        }
        for sub in [&mut a, &mut b] {
            assert_eq!(sub.next().await, Some(1));
            assert_eq!(sub.next().await, Some(2));
            assert_eq!(sub.next().await, Some(3));
        }
    }

    #[test]
    fn earlier_events_are_not_replayed() {
        let streamer: Streamer<&str, u32> = Streamer::new(16);
        let _keep = streamer.subscribe("t");
        streamer.publish(&"t", 1);

        let mut late = streamer.subscribe("t");
        assert_eq!(late.try_next(), None);
        streamer.publish(&"t", 2);
        assert_eq!(late.try_next(), Some(2));
    }

    #[test]
    fn topics_are_isolated() {
        let streamer: Streamer<&str, u32> = Streamer::new(16);
        let mut a = streamer.subscribe("a");
        let _b = streamer.subscribe("b");
        streamer.publish(&"b", 7);
        assert_eq!(a.try_next(), None);
    }

    #[test]
    fn slow_subscriber_loses_oldest_events() {
        let streamer: Streamer<&str, u32> = Streamer::new(2);
        let mut slow = streamer.subscribe("t");
        for e in 1..=5 {
            assert_eq!(streamer.publish(&"t", e), 1);
        }
        assert_eq!(slow.try_next(), Some(4));
        assert_eq!(slow.try_next(), Some(5));
        assert_eq!(slow.try_next(), None);
    }

    #[test]
    fn publishers_on_separate_topics_run_side_by_side() {
        let streamer: Streamer<usize, usize> = Streamer::new(256);
        let mut subs: Vec<Subscription<usize>> = (0..4).map(|t| streamer.subscribe(t)).collect();

        std::thread::scope(|scope| {
            for topic in 0..4 {
                let streamer = &streamer;
                scope.spawn(move || {
                    for e in 0..100 {
                        assert_eq!(streamer.publish(&topic, e), 1);
                    }
                });
            }
        });

        for sub in &mut subs {
            let received: Vec<usize> = std::iter::from_fn(|| sub.try_next()).collect();
            assert_eq!(received, (0..100).collect::<Vec<_>>());
        }
    }

    #[test]
    fn forgotten_topic_comes_back_on_subscribe() {
        let streamer: Streamer<&str, u32> = Streamer::new(4);
        streamer.subscribe("t").close();
        assert_eq!(streamer.publish(&"t", 1), 0);

        let mut again = streamer.subscribe("t");
        assert_eq!(streamer.publish(&"t", 2), 1);
        assert_eq!(again.try_next(), Some(2));
    }

    #[test]
    fn closed_subscriptions_release_the_topic() {
        let streamer: Streamer<&str, u32> = Streamer::new(4);
        let sub = streamer.subscribe("t");
        assert_eq!(streamer.subscriber_count(&"t"), 1);
        sub.close();
        assert_eq!(streamer.publish(&"t", 1), 0);
        assert_eq!(streamer.subscriber_count(&"t"), 0);
    }
}
