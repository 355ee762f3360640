//! Request coalescing for concurrent identical misses.
//!
//! The first caller for a key becomes the leader: it owns the in-flight record,
//! runs the work, publishes the outcome and removes the record. Callers that
//! arrive while the record exists become followers and wait for the leader's
//! outcome without running the work themselves.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tokio::sync::watch;
use tracing::trace;

/// Whether a caller ran the work or joined an existing computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leader => f.write_str("leader"),
            Self::Follower => f.write_str("follower"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoalesceError {
    /// The leader was dropped (cancelled or panicked) before publishing.
    #[error("leader for `{key}` was dropped before publishing an outcome")]
    Abandoned { key: String },
}

type InFlight<T> = Arc<DashMap<String, watch::Receiver<Option<T>>>>;

/// Single-owner in-flight table keyed by cache key.
pub struct RequestCoalescer<T> {
    in_flight: InFlight<T>,
}

impl<T> RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Run `work` for `key`, or wait for the computation already in flight.
    ///
    /// `work` is only invoked when the caller becomes the leader. Every caller
    /// attached to the same record receives a clone of the leader's outcome.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<(T, Role), CoalesceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // The shard lock must be released before awaiting anything.
        let slot = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(occupied) => Slot::Follower(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let (sender, receiver) = watch::channel(None);
                vacant.insert(receiver);
                Slot::Leader(LeaderGuard {
                    key: key.to_string(),
                    in_flight: Arc::clone(&self.in_flight),
                    sender,
                })
            }
        };

        match slot {
            Slot::Leader(guard) => {
                trace!(key, role = %Role::Leader, "Coalescing record created");
                let outcome = work().await;
                guard.publish(outcome.clone());
                Ok((outcome, Role::Leader))
            }
            Slot::Follower(mut receiver) => {
                trace!(key, role = %Role::Follower, "Joined in-flight computation");
                let published = receiver
                    .wait_for(Option::is_some)
                    .await
                    .map(|value| value.clone())
                    .ok()
                    .flatten();
                match published {
                    Some(outcome) => Ok((outcome, Role::Follower)),
                    None => Err(CoalesceError::Abandoned {
                        key: key.to_string(),
                    }),
                }
            }
        }
    }

    /// Number of keys with a computation currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }
}

impl<T> Default for RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

enum Slot<T> {
    Leader(LeaderGuard<T>),
    Follower(watch::Receiver<Option<T>>),
}

/// Owned by the leader; removes the in-flight record when dropped, whether the
/// outcome was published or the leader was cancelled.
struct LeaderGuard<T> {
    key: String,
    in_flight: InFlight<T>,
    sender: watch::Sender<Option<T>>,
}

impl<T> LeaderGuard<T> {
    fn publish(self, outcome: T) {
        self.sender.send_replace(Some(outcome));
    }
}

impl<T> Drop for LeaderGuard<T> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future::join_all;
    use tokio::sync::Notify;

    use super::*;

    #[tokio::test]
    async fn single_caller_is_leader() {
        let coalescer = RequestCoalescer::<u32>::new();
        let (value, role) = coalescer.run("k", || async { 7 }).await.expect("outcome");
        assert_eq!(value, 7);
        assert_eq!(role, Role::Leader);
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_execution() {
        let coalescer = Arc::new(RequestCoalescer::<String>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks = (0..16).map(|_| {
            let coalescer = Arc::clone(&coalescer);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                coalescer
                    .run("user:2:3", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        "payload".to_string()
                    })
                    .await
            })
        });

        let results = join_all(tasks).await;
        let mut leaders = 0;
        for result in results {
            let (value, role) = result.expect("task").expect("outcome");
            assert_eq!(value, "payload");
            if role == Role::Leader {
                leaders += 1;
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(leaders, 1);
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn distinct_keys_run_independently() {
        let coalescer = Arc::new(RequestCoalescer::<usize>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks = ["a", "a", "b", "b", "c"].into_iter().map(|key| {
            let coalescer = Arc::clone(&coalescer);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                coalescer
                    .run(key, || async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        calls.fetch_add(1, Ordering::SeqCst)
                    })
                    .await
            })
        });

        for result in join_all(tasks).await {
            result.expect("task").expect("outcome");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn record_does_not_outlive_episode() {
        let coalescer = RequestCoalescer::<usize>::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let (_, role) = coalescer
                .run("k", || async { calls.fetch_add(1, Ordering::SeqCst) })
                .await
                .expect("outcome");
            assert_eq!(role, Role::Leader);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn followers_learn_when_leader_is_dropped() {
        let coalescer = Arc::new(RequestCoalescer::<u32>::new());
        let started = Arc::new(Notify::new());

        let leader = {
            let coalescer = Arc::clone(&coalescer);
            let started = Arc::clone(&started);
            tokio::spawn(async move {
                coalescer
                    .run("k", || async move {
                        started.notify_one();
                        std::future::pending::<u32>().await
                    })
                    .await
            })
        };

        started.notified().await;
        assert!(coalescer.is_in_flight("k"));

        let follower = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move { coalescer.run("k", || async { 1 }).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        let outcome = follower.await.expect("follower task");
        assert_eq!(
            outcome,
            Err(CoalesceError::Abandoned {
                key: "k".to_string()
            })
        );
        assert!(!coalescer.is_in_flight("k"));

        let (value, role) = coalescer.run("k", || async { 2 }).await.expect("fresh episode");
        assert_eq!((value, role), (2, Role::Leader));
    }
}
