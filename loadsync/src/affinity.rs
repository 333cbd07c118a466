//! Affinity loop - the single designated thread completion handlers run on
//!
//! Jobs are queued through an [`AffinitySender`] and executed one at a time,
//! in the order they were dispatched, on the loop's thread. Dispatching never
//! runs a job inline, even when called from the affinity thread itself.

use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Unit of work executed on the affinity thread
pub type AffinityJob = Box<dyn FnOnce() + Send + 'static>;

/// Queues callbacks for later execution on one designated context
///
/// Implementations run jobs in FIFO order on that context and never inline.
/// A job that can no longer run must be dropped, not leaked: dropping is what
/// releases anyone waiting on it.
pub trait AffinityDispatcher: Send + Sync {
    fn dispatch(&self, job: AffinityJob);
}

enum Envelope {
    Job(AffinityJob),
    Shutdown,
}

/// Cloneable handle that queues jobs onto an [`AffinityLoop`]
#[derive(Clone)]
pub struct AffinitySender {
    tx: mpsc::UnboundedSender<Envelope>,
    thread_id: ThreadId,
}

impl AffinitySender {
    /// Queue a job, reporting a closed loop instead of logging it
    pub fn try_dispatch(&self, job: AffinityJob) -> Result<()> {
        self.tx.send(Envelope::Job(job)).map_err(|_| Error::AffinityClosed)
    }

    /// True if the calling thread is the affinity thread
    pub fn is_affinity_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// True once the loop stopped accepting jobs
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl AffinityDispatcher for AffinitySender {
    fn dispatch(&self, job: AffinityJob) {
        if let Err(e) = self.try_dispatch(job) {
            // The rejected job was dropped with the send error
            warn!(error = %e, "AffinitySender::dispatch: job dropped");
        }
    }
}

impl std::fmt::Debug for AffinitySender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinitySender")
            .field("thread_id", &self.thread_id)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Owns the affinity thread
pub struct AffinityLoop {
    sender: AffinitySender,
    join: Option<JoinHandle<usize>>,
}

impl AffinityLoop {
    /// Spawn the affinity thread with the given name
    pub fn spawn(name: &str) -> Result<Self> {
        debug!(%name, "AffinityLoop::spawn: called");
        let (tx, rx) = mpsc::unbounded_channel();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || job_loop(rx))
            .map_err(|source| Error::Spawn {
                name: name.to_string(),
                source,
            })?;

        let sender = AffinitySender {
            tx,
            thread_id: join.thread().id(),
        };
        info!(%name, "AffinityLoop started");
        Ok(Self {
            sender,
            join: Some(join),
        })
    }

    /// Get a dispatcher for this loop
    pub fn dispatcher(&self) -> AffinitySender {
        self.sender.clone()
    }

    /// True if the calling thread is the affinity thread
    pub fn is_affinity_thread(&self) -> bool {
        self.sender.is_affinity_thread()
    }

    /// Stop accepting jobs, run the ones already queued, and join the thread
    ///
    /// Returns the number of jobs the loop executed over its lifetime.
    /// Must not be called from the affinity thread.
    pub fn shutdown(mut self) -> Result<usize> {
        debug!("AffinityLoop::shutdown: called");
        let _ = self.sender.tx.send(Envelope::Shutdown);
        let Some(join) = self.join.take() else {
            return Ok(0);
        };
        let executed = join.join().map_err(|_| Error::AffinityPanicked)?;
        info!(executed, "AffinityLoop stopped");
        Ok(executed)
    }
}

impl Drop for AffinityLoop {
    fn drop(&mut self) {
        if self.join.is_some() {
            // Detach: queued jobs still drain, but nobody waits for them here.
            let _ = self.sender.tx.send(Envelope::Shutdown);
        }
    }
}

fn job_loop(mut rx: mpsc::UnboundedReceiver<Envelope>) -> usize {
    let mut executed = 0;
    while let Some(envelope) = rx.blocking_recv() {
        match envelope {
            Envelope::Job(job) => {
                job();
                executed += 1;
            }
            Envelope::Shutdown => {
                debug!("job_loop: shutdown requested, draining queue");
                rx.close();
            }
        }
    }
    executed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_jobs_run_in_fifo_order() {
        let affinity = AffinityLoop::spawn("test-affinity").unwrap();
        let dispatcher = affinity.dispatcher();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let seen = seen.clone();
            dispatcher.dispatch(Box::new(move || seen.lock().unwrap().push(i)));
        }

        assert_eq!(affinity.shutdown().unwrap(), 50);
        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_jobs_run_on_affinity_thread() {
        let affinity = AffinityLoop::spawn("test-affinity").unwrap();
        let dispatcher = affinity.dispatcher();
        assert!(!dispatcher.is_affinity_thread());

        let on_thread = Arc::new(AtomicBool::new(false));
        let (flag, probe) = (on_thread.clone(), dispatcher.clone());
        dispatcher.dispatch(Box::new(move || {
            let name_matches = thread::current().name() == Some("test-affinity");
            flag.store(probe.is_affinity_thread() && name_matches, Ordering::SeqCst);
        }));

        affinity.shutdown().unwrap();
        assert!(on_thread.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dispatch_from_affinity_thread_is_queued() {
        let affinity = AffinityLoop::spawn("test-affinity").unwrap();
        let dispatcher = affinity.dispatcher();
        let order = Arc::new(Mutex::new(Vec::new()));

        let (inner_order, inner_dispatcher) = (order.clone(), dispatcher.clone());
        dispatcher.dispatch(Box::new(move || {
            let nested_order = inner_order.clone();
            inner_dispatcher.dispatch(Box::new(move || nested_order.lock().unwrap().push("nested")));
            inner_order.lock().unwrap().push("outer");
        }));

        // Give the nested job time to be queued before shutdown closes the queue.
        thread::sleep(Duration::from_millis(50));
        affinity.shutdown().unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["outer", "nested"]);
    }

    #[test]
    fn test_dispatch_after_shutdown_drops_job() {
        let affinity = AffinityLoop::spawn("test-affinity").unwrap();
        let dispatcher = affinity.dispatcher();
        affinity.shutdown().unwrap();

        assert!(dispatcher.is_closed());
        let err = dispatcher.try_dispatch(Box::new(|| {})).unwrap_err();
        assert!(matches!(err, Error::AffinityClosed));

        struct DropProbe(Arc<AtomicBool>);
        impl Drop for DropProbe {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }
        let dropped = Arc::new(AtomicBool::new(false));
        let probe = DropProbe(dropped.clone());
        dispatcher.dispatch(Box::new(move || drop(probe)));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_panicking_job_reported_on_shutdown() {
        let affinity = AffinityLoop::spawn("test-affinity").unwrap();
        affinity.dispatcher().dispatch(Box::new(|| panic!("handler failed")));
        assert!(matches!(affinity.shutdown(), Err(Error::AffinityPanicked)));
    }
}
