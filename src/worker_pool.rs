//! # Worker Pool Module
//!
//! A bounded pool of worker threads draining a shared request queue into
//! [`crate::server::AppService::handle`]. The listener layer submits raw
//! requests and receives the finished response over a per-request reply
//! channel; the chain itself runs synchronously on the worker that picked
//! the request up.
//!
//! Backpressure when the queue is full is configurable:
//! - **Block**: the submitting listener waits for a queue slot
//! - **Shed**: the request is answered immediately with 429

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::context::Response;
use crate::runtime_config::RuntimeConfig;
use crate::server::response::write_json_error;
use crate::server::{AppService, RawRequest};

/// What to do with a request that arrives while the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressureMode {
    /// Block the submitter until a queue slot frees up
    Block,
    /// Shed the request immediately and answer 429 (Too Many Requests)
    Shed,
}

impl BackpressureMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "block" => Some(Self::Block),
            "shed" => Some(Self::Shed),
            _ => None,
        }
    }
}

impl Default for BackpressureMode {
    fn default() -> Self {
        Self::Block
    }
}

struct Job {
    raw: RawRequest,
    reply_tx: mpsc::Sender<Response>,
}

/// Bounded worker pool over a shared [`AppService`].
pub struct WorkerPool {
    sender: SyncSender<Job>,
    workers: Vec<JoinHandle<()>>,
    mode: BackpressureMode,
    dispatched: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    shed: AtomicUsize,
}

impl WorkerPool {
    /// Spawn the worker threads and return the pool handle.
    pub fn start(service: Arc<AppService>, config: RuntimeConfig) -> Self {
        let (sender, receiver) = mpsc::sync_channel::<Job>(config.queue_bound);
        let receiver = Arc::new(Mutex::new(receiver));
        let dispatched = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let workers = (0..config.workers)
            .map(|worker_id| {
                let service = Arc::clone(&service);
                let receiver = Arc::clone(&receiver);
                let completed = Arc::clone(&completed);
                std::thread::spawn(move || {
                    worker_loop(worker_id, &service, &receiver, &completed);
                })
            })
            .collect();

        info!(
            workers = config.workers,
            queue_bound = config.queue_bound,
            mode = ?config.backpressure_mode,
            "Worker pool started"
        );

        Self {
            sender,
            workers,
            mode: config.backpressure_mode,
            dispatched,
            completed,
            shed: AtomicUsize::new(0),
        }
    }

    /// Queue a request for processing.
    ///
    /// The finished response arrives on the returned channel. In `Shed`
    /// mode a full queue answers 429 without queueing.
    pub fn submit(&self, raw: RawRequest) -> Receiver<Response> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let job = Job { raw, reply_tx };

        match self.mode {
            BackpressureMode::Block => {
                if let Err(mpsc::SendError(job)) = self.sender.send(job) {
                    reply_unavailable(&job);
                    return reply_rx;
                }
            }
            BackpressureMode::Shed => match self.sender.try_send(job) {
                Ok(()) => {}
                Err(TrySendError::Full(job)) => {
                    self.shed.fetch_add(1, Ordering::Relaxed);
                    warn!("Request shed: worker queue full");
                    let mut response = Response::new();
                    write_json_error(&mut response, 429, json!({ "error": "Too Many Requests" }));
                    let _ = job.reply_tx.send(response);
                    return reply_rx;
                }
                Err(TrySendError::Disconnected(job)) => {
                    reply_unavailable(&job);
                    return reply_rx;
                }
            },
        }

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        reply_rx
    }

    pub fn dispatched_count(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn shed_count(&self) -> usize {
        self.shed.load(Ordering::Relaxed)
    }

    /// Stop accepting work and wait for in-flight requests to finish.
    pub fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.join();
        }
        info!("Worker pool stopped");
    }
}

fn worker_loop(
    worker_id: usize,
    service: &AppService,
    receiver: &Mutex<Receiver<Job>>,
    completed: &AtomicUsize,
) {
    loop {
        let job = {
            let Ok(guard) = receiver.lock() else {
                break;
            };
            guard.recv()
        };
        let Ok(job) = job else {
            break;
        };
        debug!(worker_id, "Worker picked up request");
        let response = service.handle(job.raw);
        let _ = job.reply_tx.send(response);
        completed.fetch_add(1, Ordering::Relaxed);
    }
}

fn reply_unavailable(job: &Job) {
    let mut response = Response::new();
    write_json_error(&mut response, 503, json!({ "error": "Service Unavailable" }));
    let _ = job.reply_tx.send(response);
}
