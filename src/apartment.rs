//! Single-threaded apartment worker.
//!
//! OLE clipboard calls must run on a thread initialized into a
//! single-threaded apartment, and objects created there stay there.
//! [`Apartment`] owns one such thread and runs submitted jobs on it in
//! order:
//!
//! ```text
//! caller thread                     clipsharp-sta
//! -------------                     -------------
//! run(job) ──── Job ──────────────> enter_apartment()
//!    │                              loop { job() }
//!    │ <──────── result ─────────────┘
//! recv_timeout(timeout)
//! ```
//!
//! A job that submits to the same apartment runs inline, so nested calls
//! never deadlock on the queue. Other threads always go through the queue,
//! even if they entered an apartment themselves.
//!
//! Once a job has timed out the worker may never come back. Dropping the
//! apartment then detaches the thread instead of joining it.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender};
use tracing::{debug, error, info, trace, warn};

use crate::{ClipError, ClipResult};

/// Default bound on how long a caller waits for the worker
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

type Job = Box<dyn FnOnce() + Send>;

thread_local! {
    static IN_APARTMENT: Cell<bool> = const { Cell::new(false) };
}

/// Dedicated apartment thread with a job queue
pub struct Apartment {
    job_tx: Option<Sender<Job>>,
    thread_handle: Option<JoinHandle<()>>,
    worker: ThreadId,
    timeout: Duration,
    timed_out: AtomicBool,
}

impl Apartment {
    /// Start the worker thread
    ///
    /// Fails if the thread cannot be spawned or the apartment cannot be
    /// initialized on it.
    pub fn new(timeout: Duration) -> ClipResult<Self> {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (ready_tx, ready_rx) = bounded::<ClipResult<()>>(1);

        let thread_handle = thread::Builder::new()
            .name("clipsharp-sta".to_string())
            .spawn(move || {
                let init = enter_current_thread();
                let ok = init.is_ok();
                let _ = ready_tx.send(init);
                if !ok {
                    return;
                }

                debug!("Apartment worker started");
                while let Ok(job) = job_rx.recv() {
                    job();
                }
                debug!("Apartment worker stopped");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Failed to initialize apartment: {}", e);
                let _ = thread_handle.join();
                return Err(e);
            }
            Err(_) => return Err(ClipError::ApartmentClosed),
        }

        info!("Apartment thread started (timeout {}ms)", timeout.as_millis());

        Ok(Self {
            job_tx: Some(job_tx),
            worker: thread_handle.thread().id(),
            thread_handle: Some(thread_handle),
            timeout,
            timed_out: AtomicBool::new(false),
        })
    }

    /// How long [`Apartment::run`] waits for a result
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `job` on the apartment thread and wait for its result
    ///
    /// Runs inline when called from this apartment's own worker. Otherwise
    /// waits at most the configured timeout and fails with
    /// [`ClipError::ApartmentTimeout`]; a job that times out still runs to
    /// completion on the worker, its result is discarded.
    pub fn run<R, F>(&self, job: F) -> ClipResult<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.run_within(self.timeout, job)
    }

    /// [`Apartment::run`] with an explicit wait bound for this call
    pub fn run_within<R, F>(&self, timeout: Duration, job: F) -> ClipResult<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_worker() {
            trace!("Running apartment job inline");
            return Ok(job());
        }

        let job_tx = self.job_tx.as_ref().ok_or(ClipError::ApartmentClosed)?;
        let (result_tx, result_rx) = bounded::<R>(1);
        job_tx
            .send(Box::new(move || {
                let _ = result_tx.send(job());
            }))
            .map_err(|_| ClipError::ApartmentClosed)?;

        match result_rx.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => {
                self.timed_out.store(true, Ordering::Release);
                Err(ClipError::ApartmentTimeout(timeout.as_millis() as u64))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ClipError::ApartmentClosed),
        }
    }

    /// True once any call gave up waiting on the worker
    pub fn has_timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Acquire)
    }

    fn is_worker(&self) -> bool {
        thread::current().id() == self.worker
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        // Closing the queue ends the worker loop
        self.job_tx.take();
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        if self.has_timed_out() || self.is_worker() {
            // The worker exits once the stuck job returns, if it ever does
            warn!("Detaching apartment thread");
            drop(handle);
        } else if handle.join().is_err() {
            error!("Apartment thread panicked");
        }
    }
}

/// Initialize the calling thread as an apartment thread
///
/// For programs whose main thread drives the clipboard directly.
pub fn enter_current_thread() -> ClipResult<()> {
    if is_apartment_thread() {
        return Ok(());
    }
    crate::sys::enter_apartment()?;
    IN_APARTMENT.with(|flag| flag.set(true));
    Ok(())
}

/// True on a thread initialized by [`enter_current_thread`]
pub fn is_apartment_thread() -> bool {
    IN_APARTMENT.with(Cell::get)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_jobs_run_on_worker() {
        let apartment = Apartment::new(DEFAULT_TIMEOUT).unwrap();
        let name = apartment
            .run(|| thread::current().name().map(str::to_string))
            .unwrap();
        assert_eq!(name.as_deref(), Some("clipsharp-sta"));
        assert!(apartment.run(is_apartment_thread).unwrap());
        assert!(!is_apartment_thread());
    }

    #[test]
    fn test_slow_job_times_out() {
        let apartment = Apartment::new(Duration::from_millis(20)).unwrap();
        let err = apartment
            .run(|| thread::sleep(Duration::from_millis(200)))
            .unwrap_err();
        assert!(matches!(err, ClipError::ApartmentTimeout(20)));
        assert!(apartment.has_timed_out());

        // Same queue, served once the slow job finishes
        assert_eq!(apartment.run_within(Duration::from_secs(5), || 2 + 2).unwrap(), 4);
    }

    #[test]
    fn test_drop_after_timeout_does_not_wait_for_worker() {
        let (release_tx, release_rx) = bounded::<()>(0);
        let apartment = Apartment::new(Duration::from_millis(20)).unwrap();
        let err = apartment
            .run(move || {
                let _ = release_rx.recv();
            })
            .unwrap_err();
        assert!(matches!(err, ClipError::ApartmentTimeout(20)));

        let started = Instant::now();
        drop(apartment);
        assert!(started.elapsed() < Duration::from_secs(1));

        // Let the detached worker finish
        drop(release_tx);
    }

    #[test]
    fn test_nested_run_is_inline() {
        let apartment = Arc::new(Apartment::new(Duration::from_secs(5)).unwrap());
        let inner = Arc::clone(&apartment);
        let (outer_id, inner_id) = apartment
            .run(move || {
                let outer_id = thread::current().id();
                (outer_id, inner.run(|| thread::current().id()).unwrap())
            })
            .unwrap();
        assert_eq!(outer_id, inner_id);
    }

    #[test]
    fn test_jobs_run_in_order() {
        let apartment = Apartment::new(DEFAULT_TIMEOUT).unwrap();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..5 {
            let log = Arc::clone(&log);
            apartment.run(move || log.lock().push(i)).unwrap();
        }
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_other_apartment_thread_uses_queue() {
        thread::spawn(|| {
            enter_current_thread().unwrap();
            let apartment = Apartment::new(Duration::from_secs(5)).unwrap();
            let caller = thread::current().id();
            let ran_on = apartment.run(move || thread::current().id()).unwrap();
            assert_ne!(ran_on, caller);
            assert!(!apartment.has_timed_out());
        })
        .join()
        .unwrap();
    }
}
