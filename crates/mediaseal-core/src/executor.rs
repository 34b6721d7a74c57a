//! Serial task executor backed by a dedicated worker thread.
//!
//! A [`SerialExecutor`] runs posted jobs one at a time, in FIFO order, on
//! its own named OS thread. The frame cryptor owns one per instance for
//! cipher work (preserving per-stream frame order) and is handed a
//! second, shared one for observer notifications so callbacks never run
//! under the cryptor's locks.
//!
//! Handles are cheap to clone; the worker stops when the last handle
//! drops. Jobs still queued at shutdown are discarded, the job in flight
//! runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a serial worker thread.
#[derive(Clone)]
pub struct SerialExecutor {
    shared: Arc<Shared>,
}

struct Shared {
    sender: Mutex<Option<Sender<Job>>>,
    cancelled: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SerialExecutor {
    /// Spawn a worker thread with the given name.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn a thread; the cryptor cannot
    /// operate without its worker.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn new(name: &str) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let cancelled = Arc::new(AtomicBool::new(false));

        let worker_cancelled = Arc::clone(&cancelled);
        let worker = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    if worker_cancelled.load(Ordering::Acquire) {
                        // Shutdown: release the job without running it.
                        continue;
                    }
                    job();
                }
            })
            .expect("invariant: spawning the executor thread must succeed");

        Self {
            shared: Arc::new(Shared {
                sender: Mutex::new(Some(sender)),
                cancelled,
                worker: Mutex::new(Some(worker)),
            }),
        }
    }

    /// Queue a job to run after all previously posted jobs.
    ///
    /// Jobs posted after shutdown began are silently discarded.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        let sender = self.shared.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = sender.as_ref() {
            // A send error means the worker already exited; the job is
            // dropped, matching shutdown semantics.
            let _ = sender.send(Box::new(job));
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);

        // Closing the channel wakes the worker out of recv().
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = None;

        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            if worker.thread().id() != std::thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    #[test]
    fn runs_posted_jobs() {
        let executor = SerialExecutor::new("test-executor");
        let (sender, receiver) = mpsc::channel();

        executor.post(move || {
            sender.send(42).unwrap();
        });

        assert_eq!(receiver.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }

    #[test]
    fn preserves_fifo_order() {
        let executor = SerialExecutor::new("test-executor");
        let (sender, receiver) = mpsc::channel();

        for i in 0..100 {
            let sender = sender.clone();
            executor.post(move || {
                sender.send(i).unwrap();
            });
        }

        for expected in 0..100 {
            assert_eq!(receiver.recv_timeout(Duration::from_secs(5)).unwrap(), expected);
        }
    }

    #[test]
    fn drop_joins_worker_and_discards_queued_jobs() {
        let ran = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Mutex::new(()));

        let executor = SerialExecutor::new("test-executor");

        // Hold the worker inside the first job so later jobs stay queued.
        let guard = gate.lock().unwrap();
        {
            let gate = Arc::clone(&gate);
            executor.post(move || {
                let _unused = gate.lock().unwrap();
            });
        }
        for _ in 0..10 {
            let ran = Arc::clone(&ran);
            executor.post(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }

        let dropper = std::thread::spawn(move || drop(executor));
        std::thread::sleep(Duration::from_millis(50));
        drop(guard);
        dropper.join().unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0, "queued jobs must not run after shutdown");
    }

    #[test]
    fn clones_share_one_queue() {
        let executor = SerialExecutor::new("test-executor");
        let clone = executor.clone();
        let (sender, receiver) = mpsc::channel();

        let sender_a = sender.clone();
        executor.post(move || sender_a.send('a').unwrap());
        clone.post(move || sender.send('b').unwrap());

        assert_eq!(receiver.recv_timeout(Duration::from_secs(5)).unwrap(), 'a');
        assert_eq!(receiver.recv_timeout(Duration::from_secs(5)).unwrap(), 'b');
    }
}
