//! Event correlation for the WebSocket transport
//!
//! The correlator matches asynchronous response frames to the request
//! that caused them. One correlator exists per connection; it owns the
//! request-id sequence and three registries:
//!
//! - **pending**: unary exchanges, id → oneshot sender. Registered
//!   before the request is sent, resolved and removed when the matching
//!   frame arrives, removed by the caller on deadline (tolerating a race
//!   with late delivery: a late frame simply finds no registration and
//!   is discarded).
//! - **replays**: bounded cache replays, id → sink. Every replayed
//!   reading carries the request id; a `response/end` frame with that id
//!   completes the replay by dropping the sink.
//! - **subscriptions**: open-ended streams. Not keyed by response id:
//!   unsolicited `response/reading` frames are routed to every
//!   subscription whose device filter matches.
//!
//! # Delivery discipline
//!
//! The shared read loop calls [`Correlator::dispatch`] and must never
//! stall on one slow consumer, so stream delivery only ever uses
//! `try_send`. A full sink drops the subscription; the terminal
//! `StreamOverflow` error is handed off to a detached task so even that
//! delivery cannot block dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use vane_core::{envelope::response, ApiError, ClientError, Envelope, Reading};

use crate::api::StreamSink;

/// One in-flight unary exchange
struct PendingRequest {
    tx: oneshot::Sender<Result<Envelope, ClientError>>,
}

/// One open-ended stream subscription
struct Subscription {
    /// Device ids to deliver; empty matches every reading
    ids: Vec<String>,
    sink: StreamSink,
}

/// Matches response frames to requests over one connection
///
/// Cheaply cloneable; all clones share the same registries. The id
/// counter is atomic so concurrently issued requests can never collide.
#[derive(Clone)]
pub struct Correlator {
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    replays: Arc<Mutex<HashMap<u64, StreamSink>>>,
    subscriptions: Arc<Mutex<HashMap<u64, Subscription>>>,
    counter: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            replays: Arc::new(Mutex::new(HashMap::new())),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            counter: Arc::new(AtomicU64::new(1)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Allocate the next request id
    ///
    /// Monotonic for the life of the connection; never reused while a
    /// prior request with that id is outstanding.
    pub fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Whether the connection this correlator serves has closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Register a pending unary request
    pub async fn register(&self, id: u64) -> oneshot::Receiver<Result<Envelope, ClientError>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, PendingRequest { tx });
        rx
    }

    /// Remove a pending registration without delivering anything
    ///
    /// Used by callers whose deadline fired; a response arriving after
    /// this is discarded by `dispatch`.
    pub async fn abandon(&self, id: u64) {
        self.pending.lock().await.remove(&id);
    }

    /// Register an id-keyed bounded replay
    pub async fn register_replay(&self, id: u64, sink: StreamSink) {
        self.replays.lock().await.insert(id, sink);
    }

    /// Drop a replay registration
    pub async fn remove_replay(&self, id: u64) {
        self.replays.lock().await.remove(&id);
    }

    /// Register an open-ended subscription with a device-id filter
    pub async fn register_subscription(&self, id: u64, ids: Vec<String>, sink: StreamSink) {
        self.subscriptions
            .lock()
            .await
            .insert(id, Subscription { ids, sink });
    }

    /// Release a subscription; no further items are delivered
    pub async fn remove_subscription(&self, id: u64) {
        self.subscriptions.lock().await.remove(&id);
    }

    /// Number of pending unary registrations
    #[allow(dead_code)]
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Route one received frame
    ///
    /// Correlation is purely by id: a pending registration wins, then an
    /// id-keyed replay, then unsolicited reading frames go to matching
    /// subscriptions. Anything else is discarded with a debug log.
    pub async fn dispatch(&self, env: Envelope) {
        if let Some(pending) = self.pending.lock().await.remove(&env.id) {
            // Exclusive, single delivery per id; a dropped receiver
            // (timed-out caller racing us) is fine to ignore.
            let _ = pending.tx.send(Ok(env));
            return;
        }

        if self.replays.lock().await.contains_key(&env.id) {
            self.dispatch_replay(env).await;
            return;
        }

        if env.event == response::READING {
            self.dispatch_reading(env).await;
            return;
        }

        tracing::debug!(id = env.id, event = %env.event, "discarding unmatched frame");
    }

    /// Advance an id-keyed replay with one frame
    async fn dispatch_replay(&self, env: Envelope) {
        let id = env.id;
        match env.event.as_str() {
            response::READING => {
                let reading: Reading = match serde_json::from_value(env.data) {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(id, error = %e, "unparseable replay reading, skipped");
                        return;
                    }
                };
                let mut replays = self.replays.lock().await;
                let Some(sink) = replays.get(&id) else {
                    return;
                };
                match sink.try_send(Ok(reading)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        if let Some(sink) = replays.remove(&id) {
                            drop(replays);
                            overflow(id, sink);
                        }
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        replays.remove(&id);
                    }
                }
            }
            response::END => {
                // Dropping the sink completes the caller's receiver
                self.replays.lock().await.remove(&id);
                tracing::debug!(id, "cache replay complete");
            }
            response::ERROR => {
                if let Some(sink) = self.replays.lock().await.remove(&id) {
                    let err = classify_error(env.data);
                    tokio::spawn(async move {
                        let _ = sink.send(Err(err)).await;
                    });
                }
            }
            other => {
                tracing::debug!(id, event = %other, "unexpected event on replay id");
            }
        }
    }

    /// Route an unsolicited reading to every matching subscription
    async fn dispatch_reading(&self, env: Envelope) {
        let reading: Reading = match serde_json::from_value(env.data) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable stream reading, skipped");
                return;
            }
        };

        let mut dropped = Vec::new();
        let mut subscriptions = self.subscriptions.lock().await;
        for (&id, sub) in subscriptions.iter() {
            if !sub.ids.is_empty() && !sub.ids.contains(&reading.device) {
                continue;
            }
            match sub.sink.try_send(Ok(reading.clone())) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => dropped.push((id, true)),
                Err(mpsc::error::TrySendError::Closed(_)) => dropped.push((id, false)),
            }
        }
        for (id, overflowed) in dropped {
            if let Some(sub) = subscriptions.remove(&id) {
                if overflowed {
                    tracing::warn!(id, "stream consumer full, dropping subscription");
                    overflow(id, sub.sink);
                }
            }
        }
    }

    /// Tear down every registration on connection close
    ///
    /// Pending unary requests always fail with a connection error. Stream
    /// sinks receive `failure` when the close was failure-initiated, or
    /// are simply dropped (completing cleanly) on a caller-initiated
    /// close. Idempotent: only the first call does anything.
    pub async fn shutdown(&self, failure: Option<ClientError>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let connection_err = failure
            .clone()
            .unwrap_or_else(|| ClientError::Connection("connection closed".to_string()));

        let mut pending = self.pending.lock().await;
        for (_, req) in pending.drain() {
            let _ = req.tx.send(Err(connection_err.clone()));
        }
        drop(pending);

        let replays: Vec<_> = self.replays.lock().await.drain().collect();
        let subscriptions: Vec<_> = self.subscriptions.lock().await.drain().collect();

        if let Some(err) = failure {
            for (_, sink) in replays {
                let err = err.clone();
                tokio::spawn(async move {
                    let _ = sink.send(Err(err)).await;
                });
            }
            for (_, sub) in subscriptions {
                let err = err.clone();
                tokio::spawn(async move {
                    let _ = sub.sink.send(Err(err)).await;
                });
            }
        }
        // Caller-initiated: sinks drop here and the receivers complete
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver the terminal overflow error off the dispatch path
fn overflow(id: u64, sink: StreamSink) {
    tokio::spawn(async move {
        tracing::warn!(id, "subscription dropped after overflow");
        let _ = sink.send(Err(ClientError::StreamOverflow)).await;
    });
}

/// Turn a `response/error` payload into a classified failure
pub(crate) fn classify_error(data: serde_json::Value) -> ClientError {
    match serde_json::from_value::<ApiError>(data) {
        Ok(api) if !api.is_empty() => ClientError::Server(api),
        Ok(_) => ClientError::Protocol("error frame with empty payload".to_string()),
        Err(e) => ClientError::Protocol(format!("unparseable error payload: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vane_core::envelope::response;

    #[test]
    fn test_ids_are_unique() {
        let correlator = Correlator::new();
        let a = correlator.next_id();
        let b = correlator.next_id();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_register_and_dispatch() {
        let correlator = Correlator::new();
        let id = correlator.next_id();
        let rx = correlator.register(id).await;
        assert_eq!(correlator.pending_count().await, 1);

        correlator
            .dispatch(Envelope::new(id, response::STATUS, json!({"status": "ok"})))
            .await;

        assert_eq!(correlator.pending_count().await, 0);
        let env = rx.await.unwrap().unwrap();
        assert_eq!(env.data["status"], "ok");
    }

    #[tokio::test]
    async fn test_dispatch_unmatched_is_discarded() {
        let correlator = Correlator::new();
        // No registration for id 99; must not panic or leak
        correlator
            .dispatch(Envelope::new(99, response::STATUS, json!({})))
            .await;
        assert_eq!(correlator.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_abandon_discards_late_delivery() {
        let correlator = Correlator::new();
        let id = correlator.next_id();
        let rx = correlator.register(id).await;
        correlator.abandon(id).await;

        // Late response finds no registration
        correlator
            .dispatch(Envelope::new(id, response::STATUS, json!({})))
            .await;
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_fails_all_pending() {
        let correlator = Correlator::new();
        let rx1 = correlator.register(1).await;
        let rx2 = correlator.register(2).await;

        correlator
            .shutdown(Some(ClientError::Connection("socket error".to_string())))
            .await;

        assert!(matches!(
            rx1.await.unwrap(),
            Err(ClientError::Connection(_))
        ));
        assert!(matches!(
            rx2.await.unwrap(),
            Err(ClientError::Connection(_))
        ));
        assert!(correlator.is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let correlator = Correlator::new();
        correlator.shutdown(None).await;
        correlator.shutdown(None).await;
        assert!(correlator.is_closed());
    }

    #[tokio::test]
    async fn test_subscription_filtering() {
        let correlator = Correlator::new();
        let (tx, mut rx) = mpsc::channel(8);
        correlator
            .register_subscription(1, vec!["dev-1".to_string()], tx)
            .await;

        let matching = json!({"device": "dev-1", "value": 1});
        let other = json!({"device": "dev-2", "value": 2});
        correlator
            .dispatch(Envelope::new(50, response::READING, other))
            .await;
        correlator
            .dispatch(Envelope::new(51, response::READING, matching))
            .await;

        let delivered = rx.recv().await.unwrap().unwrap();
        assert_eq!(delivered.device, "dev-1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscription_overflow_drops_with_error() {
        let correlator = Correlator::new();
        let (tx, mut rx) = mpsc::channel(1);
        correlator.register_subscription(1, Vec::new(), tx).await;

        // First fills the sink, second overflows it
        for _ in 0..2 {
            correlator
                .dispatch(Envelope::new(
                    60,
                    response::READING,
                    json!({"device": "dev-1"}),
                ))
                .await;
        }

        let first = rx.recv().await.unwrap();
        assert!(first.is_ok());
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, Err(ClientError::StreamOverflow)));
        // Subscription is gone; further readings are not delivered
        correlator
            .dispatch(Envelope::new(
                61,
                response::READING,
                json!({"device": "dev-1"}),
            ))
            .await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_replay_completes_on_end() {
        let correlator = Correlator::new();
        let (tx, mut rx) = mpsc::channel(8);
        correlator.register_replay(7, tx).await;

        correlator
            .dispatch(Envelope::new(7, response::READING, json!({"device": "d"})))
            .await;
        correlator
            .dispatch(Envelope::new(7, response::END, serde_json::Value::Null))
            .await;

        assert!(rx.recv().await.unwrap().is_ok());
        // Sink dropped on END: the stream completes with no error
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_replay_error_frame() {
        let correlator = Correlator::new();
        let (tx, mut rx) = mpsc::channel(8);
        correlator.register_replay(9, tx).await;

        correlator
            .dispatch(Envelope::new(
                9,
                response::ERROR,
                json!({"http_code": 500, "description": "unknown error"}),
            ))
            .await;

        let item = rx.recv().await.unwrap();
        match item {
            Err(ClientError::Server(api)) => assert_eq!(api.http_code, 500),
            other => panic!("expected Server error, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_error_payloads() {
        let err = classify_error(json!({"http_code": 500, "description": "boom"}));
        assert!(matches!(err, ClientError::Server(_)));

        let err = classify_error(json!({}));
        assert!(matches!(err, ClientError::Protocol(_)));

        let err = classify_error(json!("not an object"));
        assert!(matches!(err, ClientError::Protocol(_)));
    }
}
