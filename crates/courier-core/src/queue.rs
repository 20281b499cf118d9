// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-recipient outbound delivery lanes.
//!
//! Every recipient key owns a FIFO lane: an unbounded channel drained by a
//! single worker task. The worker sleeps for the item's delay after dequeuing
//! it, then transmits it, so an item's delay starts only once the previous
//! item has been sent. Lanes for different keys run in parallel.
//!
//! A lane that stays idle for the configured timeout removes itself from the
//! lane table. Removal happens under the table's shard lock and only while the
//! channel is empty, so a concurrent [`DeliveryQueue::submit`] either lands in
//! the old lane before removal or creates a fresh one after it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::CourierError;
use crate::telemetry;

/// Sends one dequeued item to the platform.
#[async_trait]
pub trait Transmitter<T>: Send + Sync + 'static {
    async fn transmit(&self, key: &str, item: T) -> Result<(), CourierError>;
}

struct Delivery<T> {
    item: T,
    delay: Duration,
}

struct Lane<T> {
    id: u64,
    sender: mpsc::UnboundedSender<Delivery<T>>,
}

/// Ordered, delayed delivery keyed by recipient.
pub struct DeliveryQueue<T> {
    lanes: Arc<DashMap<String, Lane<T>>>,
    transmitter: Arc<dyn Transmitter<T>>,
    idle_timeout: Duration,
    next_lane: AtomicU64,
}

impl<T: Send + 'static> DeliveryQueue<T> {
    pub fn new(transmitter: Arc<dyn Transmitter<T>>, idle_timeout: Duration) -> Self {
        Self {
            lanes: Arc::new(DashMap::new()),
            transmitter,
            idle_timeout,
            next_lane: AtomicU64::new(0),
        }
    }

    /// Queues `item` for `key`, to be transmitted `delay` after the previous
    /// item of the same key has been sent.
    ///
    /// Never blocks. Must be called from within a Tokio runtime, since the
    /// first submission for a key spawns the lane's worker.
    pub fn submit(&self, key: &str, item: T, delay: Duration) {
        let delivery = Delivery { item, delay };
        let mut lane = self
            .lanes
            .entry(key.to_string())
            .or_insert_with(|| self.spawn_lane(key));

        // A worker only stops after unlinking its lane, unless it panicked.
        if let Err(mpsc::error::SendError(delivery)) = lane.sender.send(delivery) {
            warn!(key, "delivery lane worker died, restarting lane");
            let fresh = self.spawn_lane(key);
            if fresh.sender.send(delivery).is_err() {
                warn!(key, "unable to queue item on restarted lane");
            }
            *lane = fresh;
        }
        drop(lane);
        telemetry::set_delivery_lanes(self.lanes.len());
    }

    /// Number of live lanes.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    fn spawn_lane(&self, key: &str) -> Lane<T> {
        let id = self.next_lane.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_lane(
            key.to_string(),
            id,
            receiver,
            Arc::clone(&self.lanes),
            Arc::clone(&self.transmitter),
            self.idle_timeout,
        ));
        debug!(key, lane = id, "delivery lane started");
        Lane { id, sender }
    }
}

impl<T> std::fmt::Debug for DeliveryQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("lanes", &self.lanes.len())
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

async fn run_lane<T: Send + 'static>(
    key: String,
    id: u64,
    mut receiver: mpsc::UnboundedReceiver<Delivery<T>>,
    lanes: Arc<DashMap<String, Lane<T>>>,
    transmitter: Arc<dyn Transmitter<T>>,
    idle_timeout: Duration,
) {
    loop {
        match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(delivery)) => {
                if !delivery.delay.is_zero() {
                    tokio::time::sleep(delivery.delay).await;
                }
                if let Err(e) = transmitter.transmit(&key, delivery.item).await {
                    warn!(key = %key, error = %e, "delivery failed");
                }
            }
            Ok(None) => break,
            Err(_) => {
                let removed = lanes
                    .remove_if(&key, |_, lane| lane.id == id && receiver.is_empty())
                    .is_some();
                if removed {
                    debug!(key = %key, lane = id, "idle delivery lane removed");
                    telemetry::set_delivery_lanes(lanes.len());
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;
    use tokio::time::Instant;

    struct Recording {
        sent: mpsc::UnboundedSender<(String, String, Instant)>,
        gate: Option<(String, Arc<Notify>)>,
    }

    #[async_trait]
    impl Transmitter<String> for Recording {
        async fn transmit(&self, key: &str, item: String) -> Result<(), CourierError> {
            if let Some((gated, notify)) = &self.gate
                && gated == key
            {
                notify.notified().await;
            }
            if item == "bad" {
                return Err(CourierError::connector("rejected"));
            }
            let _ = self.sent.send((key.to_string(), item, Instant::now()));
            Ok(())
        }
    }

    fn queue(
        gate: Option<(String, Arc<Notify>)>,
    ) -> (
        DeliveryQueue<String>,
        mpsc::UnboundedReceiver<(String, String, Instant)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transmitter = Arc::new(Recording { sent: tx, gate });
        (
            DeliveryQueue::new(transmitter, Duration::from_secs(60)),
            rx,
        )
    }

    // ---- Test 1: same key keeps submission order ----
    #[tokio::test(start_paused = true)]
    async fn same_key_is_fifo() {
        let (queue, mut rx) = queue(None);
        for i in 0..5 {
            queue.submit("u1", format!("m{i}"), Duration::ZERO);
        }
        let mut got = Vec::new();
        for _ in 0..5 {
            got.push(rx.recv().await.unwrap().1);
        }
        assert_eq!(got, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    // ---- Test 2: delays accumulate within a lane ----
    #[tokio::test(start_paused = true)]
    async fn delay_starts_after_previous_transmit() {
        let (queue, mut rx) = queue(None);
        let start = Instant::now();
        queue.submit("u1", "a".into(), Duration::from_secs(1));
        queue.submit("u1", "b".into(), Duration::from_secs(1));

        let (_, a, at_a) = rx.recv().await.unwrap();
        let (_, b, at_b) = rx.recv().await.unwrap();
        assert_eq!((a.as_str(), b.as_str()), ("a", "b"));
        assert!(at_a - start >= Duration::from_secs(1));
        assert!(at_b - start >= Duration::from_secs(2));
    }

    // ---- Test 3: a blocked recipient does not hold up others ----
    #[tokio::test(start_paused = true)]
    async fn lanes_are_independent() {
        let gate = Arc::new(Notify::new());
        let (queue, mut rx) = queue(Some(("u2".into(), Arc::clone(&gate))));

        queue.submit("u2", "slow".into(), Duration::ZERO);
        queue.submit("u1", "first".into(), Duration::ZERO);
        queue.submit("u1", "second".into(), Duration::ZERO);

        let one = rx.recv().await.unwrap();
        let two = rx.recv().await.unwrap();
        assert_eq!((one.0.as_str(), one.1.as_str()), ("u1", "first"));
        assert_eq!((two.0.as_str(), two.1.as_str()), ("u1", "second"));

        gate.notify_one();
        let three = rx.recv().await.unwrap();
        assert_eq!((three.0.as_str(), three.1.as_str()), ("u2", "slow"));
    }

    // ---- Test 4: failures are isolated per item ----
    #[tokio::test(start_paused = true)]
    async fn failed_item_does_not_stop_lane() {
        let (queue, mut rx) = queue(None);
        queue.submit("u1", "bad".into(), Duration::ZERO);
        queue.submit("u1", "good".into(), Duration::ZERO);
        assert_eq!(rx.recv().await.unwrap().1, "good");
    }

    // ---- Test 5: idle lanes are collected and recreated on demand ----
    #[tokio::test(start_paused = true)]
    async fn idle_lane_is_removed_then_recreated() {
        let (queue, mut rx) = queue(None);
        queue.submit("u1", "a".into(), Duration::ZERO);
        rx.recv().await.unwrap();
        assert_eq!(queue.lane_count(), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(queue.lane_count(), 0);

        queue.submit("u1", "b".into(), Duration::ZERO);
        assert_eq!(rx.recv().await.unwrap().1, "b");
        assert_eq!(queue.lane_count(), 1);
    }

    // ---- Test 6: interleaved submissions keep per-key order ----
    #[tokio::test(start_paused = true)]
    async fn interleaved_keys_keep_their_order() {
        let (queue, mut rx) = queue(None);
        for i in 0..10 {
            let key = if i % 2 == 0 { "even" } else { "odd" };
            queue.submit(key, i.to_string(), Duration::from_millis(10));
        }
        let mut seen: Vec<(String, u32)> = Vec::new();
        for _ in 0..10 {
            let (key, item, _) = rx.recv().await.unwrap();
            seen.push((key, item.parse().unwrap()));
        }
        for key in ["even", "odd"] {
            let items: Vec<u32> = seen.iter().filter(|(k, _)| k == key).map(|(_, i)| *i).collect();
            let mut sorted = items.clone();
            sorted.sort();
            assert_eq!(items, sorted, "lane {key} out of order");
            assert_eq!(items.len(), 5);
        }
    }
}
