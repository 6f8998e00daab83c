//! Dedicated OS threads for native calls.
//!
//! A managed task that calls into C parks until its call completes; the
//! call itself runs on one of a small set of worker threads so native code
//! never blocks the managed scheduler. There is no cancellation: once a
//! call is queued it runs to completion.

use std::any::Any;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{self as cc, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use super::frame::Frame;
use super::RuntimeError;

/// Signature of every generated native wrapper.
pub type NativeFn = unsafe extern "C" fn(*mut c_void);

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where a worker leaves the outcome of one call.
struct Completion<T> {
    result: Mutex<Option<Result<T, RuntimeError>>>,
    condvar: Condvar,
}

impl<T> Completion<T> {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            condvar: Condvar::new(),
        }
    }

    fn complete(&self, outcome: Result<T, RuntimeError>) {
        *self.result.lock() = Some(outcome);
        self.condvar.notify_all();
    }

    fn wait(&self) -> Result<T, RuntimeError> {
        let mut guard = self.result.lock();
        loop {
            if let Some(outcome) = guard.take() {
                return outcome;
            }
            self.condvar.wait(&mut guard);
        }
    }
}

/// Counters for completed work.
#[derive(Debug, Default)]
pub struct PoolStats {
    completed: AtomicU64,
    panicked: AtomicU64,
}

impl PoolStats {
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct NativeCallPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<PoolStats>,
}

impl NativeCallPool {
    /// Start `workers` threads sharing a queue of at most `queue` pending
    /// calls. Callers block when the queue is full.
    pub fn new(workers: usize, queue: usize) -> Result<Self, RuntimeError> {
        let (sender, receiver) = cc::bounded::<Job>(queue.max(1));
        let stats = Arc::new(PoolStats::default());

        let mut handles = Vec::with_capacity(workers.max(1));
        for id in 0..workers.max(1) {
            let receiver: Receiver<Job> = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("cbridge-native-{id}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                })
                .map_err(|e| RuntimeError::Spawn(e.to_string()))?;
            handles.push(handle);
        }
        tracing::debug!("started {} native call worker(s)", handles.len());

        Ok(Self {
            sender: Some(sender),
            workers: handles,
            stats,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Run `f` on a worker thread and block until it returns.
    pub fn call<F, T>(&self, f: F) -> Result<T, RuntimeError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(RuntimeError::PoolClosed)?;
        let completion = Arc::new(Completion::new());

        let done = Arc::clone(&completion);
        let stats = Arc::clone(&self.stats);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
                stats.panicked.fetch_add(1, Ordering::Relaxed);
                RuntimeError::CallPanicked(panic_message(payload))
            });
            stats.completed.fetch_add(1, Ordering::Relaxed);
            done.complete(outcome);
        });

        sender.send(job).map_err(|_| RuntimeError::PoolClosed)?;
        completion.wait()
    }

    /// Invoke a generated wrapper with `frame` and return the frame with
    /// its result slots filled.
    ///
    /// # Safety
    ///
    /// `wrapper` must expect exactly the layout `frame` was built from.
    pub unsafe fn call_native(&self, wrapper: NativeFn, frame: Frame) -> Result<Frame, RuntimeError> {
        self.call(move || {
            let mut frame = frame;
            unsafe { wrapper(frame.as_mut_ptr() as *mut c_void) };
            frame
        })
    }

    /// Stop accepting calls and wait for queued ones to finish.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("native call worker exited abnormally");
            }
        }
    }
}

impl Drop for NativeCallPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
