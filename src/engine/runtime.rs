//! User-affinity execution runtime for KyroDrift.
//!
//! The `ResolutionEngine` is a synchronous executor. This module provides a
//! small, bounded, thread-based runtime that pins every user to one lane, so
//! batches for the same user are resolved one at a time and in submission
//! order, while different users proceed in parallel. The compare-and-set
//! guards still protect writers in other processes.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::action::BatchResponse;
use crate::candidate::BatchRequest;
use crate::config::RuntimeConfig;
use crate::engine::ResolutionEngine;
use crate::error::{DriftError, DriftResult, RuntimeError};

/// Picks the lane for a user. Stable across processes and restarts.
#[must_use]
pub fn lane_for(user_id: &str, lanes: usize) -> usize {
    let lanes = lanes.max(1);
    let digest = blake3::hash(user_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    let bucket = u64::from_le_bytes(prefix) % lanes as u64;
    usize::try_from(bucket).unwrap_or(0)
}

enum Job {
    Process {
        request: BatchRequest,
        reply: Sender<BatchResponse>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

struct Lane {
    tx: Sender<Job>,
    worker: JoinHandle<()>,
    queue_capacity: usize,
}

impl Lane {
    fn start(
        idx: usize,
        queue_capacity: usize,
        engine: Arc<ResolutionEngine>,
    ) -> Result<Self, RuntimeError> {
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let worker = thread::Builder::new()
            .name(format!("kyrodrift-lane-{idx}"))
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    match job {
                        Job::Process { request, reply } => {
                            let response = engine.process_batch(&request);
                            let _ = reply.send(response);
                        }

                        #[cfg(test)]
                        Job::Sleep { duration, reply } => {
                            thread::sleep(duration);
                            let _ = reply.send(());
                        }
                    }
                }
                tracing::debug!(lane = idx, "lane stopped");
            })
            .map_err(|e| RuntimeError::Spawn {
                message: e.to_string(),
            })?;

        Ok(Self {
            tx,
            worker,
            queue_capacity,
        })
    }

    fn try_submit(&self, job: Job, lane: usize) -> Result<(), RuntimeError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RuntimeError::QueueFull {
                lane,
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(RuntimeError::Disconnected { lane }),
        }
    }

    fn shutdown(self) {
        // Close the channel: the worker drains queued jobs then exits.
        drop(self.tx);
        let _ = self.worker.join();
    }
}

/// Handle returned by [`DriftRuntime::submit`].
#[derive(Debug)]
pub struct BatchHandle {
    lane: usize,
    rx: Receiver<BatchResponse>,
}

impl BatchHandle {
    /// The lane the batch was routed to.
    #[must_use]
    pub const fn lane(&self) -> usize {
        self.lane
    }

    /// Waits for the batch to complete.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Disconnected` if the lane stopped first.
    pub fn join(self) -> DriftResult<BatchResponse> {
        self.rx
            .recv()
            .map_err(|_| DriftError::Runtime(RuntimeError::Disconnected { lane: self.lane }))
    }

    /// Waits for the batch to complete with a timeout.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Timeout` or `RuntimeError::Disconnected`.
    pub fn join_timeout(self, timeout: Duration) -> DriftResult<BatchResponse> {
        self.rx.recv_timeout(timeout).map_err(|err| {
            DriftError::Runtime(match err {
                RecvTimeoutError::Timeout => RuntimeError::Timeout {
                    duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                },
                RecvTimeoutError::Disconnected => RuntimeError::Disconnected { lane: self.lane },
            })
        })
    }
}

/// A lane-per-user-bucket runtime over one shared engine.
pub struct DriftRuntime {
    engine: Arc<ResolutionEngine>,
    lanes: Vec<Lane>,
}

impl DriftRuntime {
    /// Starts `config.lanes` worker threads.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Spawn` if a worker thread cannot be created.
    pub fn new(engine: ResolutionEngine, config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let engine = Arc::new(engine);
        let count = config.lanes.max(1);
        let mut lanes = Vec::with_capacity(count);
        for idx in 0..count {
            lanes.push(Lane::start(idx, config.queue_capacity, Arc::clone(&engine))?);
        }
        tracing::info!(lanes = count, queue_capacity = config.queue_capacity, "runtime started");
        Ok(Self { engine, lanes })
    }

    /// Number of lanes.
    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Queues a batch on its user's lane without blocking.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::QueueFull` when the lane is saturated.
    pub fn submit(&self, request: BatchRequest) -> Result<BatchHandle, RuntimeError> {
        let lane = lane_for(&request.user_id, self.lanes.len());
        let (reply, rx) = bounded::<BatchResponse>(1);
        self.lanes[lane].try_submit(Job::Process { request, reply }, lane)?;
        Ok(BatchHandle { lane, rx })
    }

    /// Queues a batch and waits for its response.
    ///
    /// # Errors
    ///
    /// Any `RuntimeError` from submitting or joining.
    pub fn process(&self, request: BatchRequest) -> DriftResult<BatchResponse> {
        self.submit(request)?.join()
    }

    /// Returns a shared reference to the underlying engine.
    #[must_use]
    pub fn engine(&self) -> &ResolutionEngine {
        &self.engine
    }

    #[cfg(test)]
    fn submit_sleep(&self, lane: usize, duration: Duration) -> Result<Receiver<()>, RuntimeError> {
        let (reply, rx) = bounded::<()>(1);
        self.lanes[lane].try_submit(Job::Sleep { duration, reply }, lane)?;
        Ok(rx)
    }
}

impl Drop for DriftRuntime {
    fn drop(&mut self) {
        // Deterministic shutdown: stop workers and join threads.
        for lane in self.lanes.drain(..) {
            lane.shutdown();
        }
    }
}
