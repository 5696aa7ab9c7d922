//! Rate-limited travel-time enrichment.
//!
//! Directions backends throttle aggressively, so every (place, origin, mode)
//! lookup goes through one FIFO drained at one request per tick. Place lists
//! are published before any travel time is known; durations trickle in as the
//! queue drains. With `O` origins and `P` places a full pass costs
//! `O × P × 2` ticks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::backends::{DirectionsBackend, with_timeout};
use crate::error::HalfwayError;
use crate::models::{CandidatePlace, Coordinate, TravelMode};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRequest {
    pub generation: u64,
    pub place_id: String,
    pub origin_index: usize,
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub mode: TravelMode,
}

/// A resolved duration, addressed independently of every other update.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelTimeUpdate {
    pub generation: u64,
    pub place_id: String,
    pub origin_index: usize,
    pub mode: TravelMode,
    pub minutes: f64,
}

/// Receiver of travel times, typically the session's result set.
pub trait TravelTimeSink: Send + Sync {
    /// Returns `false` when the update no longer matches anything and was dropped.
    fn deliver(&self, update: TravelTimeUpdate) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    Idle,
    Processing,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing pending.
    Empty,
    /// A request from an earlier tick is still in flight.
    Busy,
    Delivered,
    /// The sink no longer had the place.
    Discarded,
    /// The queue moved to a newer generation while the request was in flight.
    Stale,
    Failed,
}

struct QueueState {
    pending: VecDeque<EnrichmentRequest>,
    generation: u64,
    status: QueueStatus,
}

#[derive(Clone)]
pub struct EnrichmentQueue {
    state: Arc<Mutex<QueueState>>,
    directions: Arc<dyn DirectionsBackend>,
    interval: Duration,
    timeout: Duration,
}

/// Puts the queue back to `Idle` even if the tick future is dropped mid-request.
struct ProcessingGuard<'a> {
    state: &'a Mutex<QueueState>,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).status = QueueStatus::Idle;
    }
}

fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl EnrichmentQueue {
    pub fn new(directions: Arc<dyn DirectionsBackend>, interval: Duration, timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                pending: VecDeque::new(),
                generation: 0,
                status: QueueStatus::Idle,
            })),
            directions,
            interval,
            timeout,
        }
    }

    pub fn pending(&self) -> usize {
        lock(&self.state).pending.len()
    }

    pub fn status(&self) -> QueueStatus {
        lock(&self.state).status
    }

    pub fn generation(&self) -> u64 {
        lock(&self.state).generation
    }

    /// Drop everything pending and only accept work for `generation` from now on.
    pub fn reset(&self, generation: u64) {
        let mut state = lock(&self.state);
        let dropped = state.pending.len();
        state.pending.clear();
        state.generation = generation;
        if dropped > 0 {
            tracing::debug!("enrichment queue reset to generation {generation}, dropped {dropped}");
        }
    }

    /// Queue a driving and a walking lookup for every (place, origin) pair.
    ///
    /// `origins` pairs each coordinate with its origin index. Returns how many
    /// requests were queued; nothing is queued for a superseded generation.
    pub fn enqueue_for(
        &self,
        generation: u64,
        places: &[CandidatePlace],
        origins: &[(usize, Coordinate)],
    ) -> usize {
        let mut state = lock(&self.state);
        if state.generation != generation {
            tracing::debug!(
                "not enqueueing for generation {generation}, queue is at {}",
                state.generation
            );
            return 0;
        }
        let before = state.pending.len();
        for place in places {
            for &(origin_index, origin) in origins {
                for mode in TravelMode::ALL {
                    state.pending.push_back(EnrichmentRequest {
                        generation,
                        place_id: place.id.clone(),
                        origin_index,
                        origin,
                        destination: place.coordinate,
                        mode,
                    });
                }
            }
        }
        state.pending.len() - before
    }

    pub fn push(&self, request: EnrichmentRequest) -> bool {
        let mut state = lock(&self.state);
        if request.generation != state.generation {
            return false;
        }
        state.pending.push_back(request);
        true
    }

    /// Process at most one request: the oldest pending one.
    ///
    /// Success and failure both leave the queue `Idle`; failed lookups are
    /// dropped, never retried.
    pub async fn tick(&self, sink: &dyn TravelTimeSink) -> TickOutcome {
        let request = {
            let mut state = lock(&self.state);
            if state.status == QueueStatus::Processing {
                return TickOutcome::Busy;
            }
            let Some(request) = state.pending.pop_front() else {
                return TickOutcome::Empty;
            };
            state.status = QueueStatus::Processing;
            request
        };
        let guard = ProcessingGuard { state: &self.state };

        let result = with_timeout(
            self.timeout,
            self.directions
                .route(request.origin, request.destination, request.mode),
        )
        .await;
        drop(guard);

        let estimate = match result {
            Ok(estimate) => estimate,
            Err(source) => {
                let err = HalfwayError::DirectionsUnavailable { source };
                tracing::debug!(
                    "dropping {:?} lookup for {} from origin {}: {err}",
                    request.mode,
                    request.place_id,
                    request.origin_index
                );
                return TickOutcome::Failed;
            }
        };

        if request.generation != self.generation() {
            let err = HalfwayError::StaleResult {
                generation: request.generation,
            };
            tracing::debug!("{err}");
            return TickOutcome::Stale;
        }

        let update = TravelTimeUpdate {
            generation: request.generation,
            place_id: request.place_id,
            origin_index: request.origin_index,
            mode: request.mode,
            minutes: estimate.minutes(),
        };
        if sink.deliver(update) {
            TickOutcome::Delivered
        } else {
            TickOutcome::Discarded
        }
    }

    /// Drive the queue from a fixed-rate ticker until shut down or the sink is gone.
    pub fn spawn(&self, sink: Weak<dyn TravelTimeSink>) -> EnrichmentWorker {
        let (stop_tx, stop_rx) = oneshot::channel();
        let queue = self.clone();
        let handle = tokio::spawn(worker_loop(queue, sink, stop_rx));
        EnrichmentWorker {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }
}

async fn worker_loop(
    queue: EnrichmentQueue,
    sink: Weak<dyn TravelTimeSink>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(queue.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::debug!("enrichment worker started, interval {:?}", queue.interval);

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                let Some(sink) = sink.upgrade() else {
                    break;
                };
                queue.tick(sink.as_ref()).await;
            }
        }
    }
    tracing::debug!("enrichment worker stopped");
}

/// Handle to a running worker; dropping it stops the worker.
pub struct EnrichmentWorker {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl EnrichmentWorker {
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the worker, waiting for an in-flight request to settle.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                tracing::warn!("enrichment worker ended abnormally: {err}");
            }
        }
    }
}

impl Drop for EnrichmentWorker {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
