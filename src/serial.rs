//! Ordered, single-consumer execution of a call's outbound work.
//!
//! [`SerialExecutor`] accepts tasks from any thread and runs them one at a
//! time, in submission order, on a dedicated tokio task. Submitting never
//! blocks: the queue is unbounded so business logic can emit responses from
//! inside its own handler. A task that panics is contained; the executor
//! reports it through the panic hook and carries on with the next task.

use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
};
use tracing::{debug, error, warn};

use crate::panic::{PanicMessage, guard};

type Task = Box<dyn FnOnce() + Send + 'static>;
type PanicHook = Box<dyn Fn(PanicMessage) + Send + Sync + 'static>;

/// Cloneable submission handle for a serialized task queue.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Mutex};
///
/// use tricall::serial::SerialExecutor;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let executor = SerialExecutor::spawn(&tokio::runtime::Handle::current());
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// for i in 0..3 {
///     let seen = Arc::clone(&seen);
///     executor.execute(move || seen.lock().expect("poisoned").push(i));
/// }
/// executor.flush().await;
/// assert_eq!(*seen.lock().expect("poisoned"), vec![0, 1, 2]);
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct SerialExecutor {
    tx: mpsc::UnboundedSender<Task>,
}

impl SerialExecutor {
    /// Start a worker on `handle` whose panicking tasks are only logged.
    #[must_use]
    pub fn spawn(handle: &Handle) -> Self { Self::with_panic_hook(handle, |_| {}) }

    /// Start a worker on `handle`, calling `hook` on the worker after a task
    /// panics and before the next task runs.
    #[must_use]
    pub fn with_panic_hook<H>(handle: &Handle, hook: H) -> Self
    where
        H: Fn(PanicMessage) + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(drain(rx, Box::new(hook)));
        Self { tx }
    }

    /// Queue `task` behind every task submitted before it.
    ///
    /// Returns immediately. If the worker has stopped, for example because
    /// its runtime shut down, the task is dropped with a warning.
    pub fn execute<T>(&self, task: T)
    where
        T: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(task)).is_err() {
            warn!("serial executor stopped; dropping task");
        }
    }

    /// Wait until every task submitted before this call has run.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.execute(move || {
            let _ = done_tx.send(());
        });
        let _ = done_rx.await;
    }

    /// Returns `true` once the worker has stopped accepting tasks.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.tx.is_closed() }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<Task>, hook: PanicHook) {
    while let Some(task) = rx.recv().await {
        if let Err(panic) = guard(task) {
            crate::metrics::inc_task_panics();
            error!(panic = %panic, "serialized task panicked");
            if let Err(nested) = guard(|| hook(panic)) {
                error!(panic = %nested, "panic hook panicked");
            }
        }
    }
    debug!("serial executor drained");
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        thread,
    };

    use super::*;

    #[tokio::test]
    async fn runs_tasks_in_submission_order() {
        let executor = SerialExecutor::spawn(&Handle::current());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..100 {
            let seen = Arc::clone(&seen);
            executor.execute(move || seen.lock().expect("poisoned").push(i));
        }
        executor.flush().await;
        let seen = seen.lock().expect("poisoned");
        assert_eq!(*seen, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_never_overlap() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 200;

        let executor = SerialExecutor::spawn(&Handle::current());
        let running = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let producers: Vec<_> = (0..THREADS)
            .map(|t| {
                let executor = executor.clone();
                let running = Arc::clone(&running);
                let overlaps = Arc::clone(&overlaps);
                let seen = Arc::clone(&seen);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let running = Arc::clone(&running);
                        let overlaps = Arc::clone(&overlaps);
                        let seen = Arc::clone(&seen);
                        executor.execute(move || {
                            if running.swap(true, Ordering::SeqCst) {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            seen.lock().expect("poisoned").push((t, i));
                            running.store(false, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().expect("producer thread panicked");
        }
        executor.flush().await;

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        let seen = seen.lock().expect("poisoned");
        assert_eq!(seen.len(), THREADS * PER_THREAD);
        for t in 0..THREADS {
            let order: Vec<usize> = seen
                .iter()
                .filter(|(thread, _)| *thread == t)
                .map(|(_, i)| *i)
                .collect();
            assert_eq!(order, (0..PER_THREAD).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn panicking_task_does_not_stop_worker() {
        let hooked = Arc::new(Mutex::new(Vec::new()));
        let hook_log = Arc::clone(&hooked);
        let executor = SerialExecutor::with_panic_hook(&Handle::current(), move |panic| {
            hook_log.lock().expect("poisoned").push(panic.to_string());
        });
        let ran = Arc::new(AtomicBool::new(false));
        executor.execute(|| panic!("write failed"));
        let ran_after = Arc::clone(&ran);
        executor.execute(move || ran_after.store(true, Ordering::SeqCst));
        executor.flush().await;

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(*hooked.lock().expect("poisoned"), vec!["write failed"]);
        assert!(!executor.is_closed());
    }
}
