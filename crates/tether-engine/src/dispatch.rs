//! Task queue and worker dispatch
//!
//! Runtime connections are not reentrant and often not `Send` (a JNI env is
//! bound to its thread). A [`Dispatcher`] therefore builds the state on its
//! own worker thread and runs every job there, one at a time. Callers get a
//! [`Pending`] per job instead of sharing a single result slot, so any number
//! of submissions can be in flight.

use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tether_sdk::RuntimeError;
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Job<S>),
    Shutdown,
}

/// Result of a submitted job, delivered once
pub struct Pending<T> {
    rx: Receiver<T>,
}

impl<T> Pending<T> {
    /// Block until the job has run.
    ///
    /// Fails with `Disconnected` if the job was dropped without running.
    pub fn wait(self) -> BridgeResult<T> {
        self.rx.recv().map_err(|_| BridgeError::Disconnected)
    }

    /// Block for at most `timeout`; `Ok(None)` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> BridgeResult<Option<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Ok(Some(value)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BridgeError::Disconnected),
        }
    }

    /// Take the result if the job has already run
    pub fn try_take(&self) -> BridgeResult<Option<T>> {
        match self.rx.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BridgeError::Disconnected),
        }
    }
}

/// Cloneable sending side of a [`TaskQueue`]
pub struct Submitter<S> {
    tx: Sender<Message<S>>,
}

impl<S> Clone for Submitter<S> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<S> Submitter<S> {
    /// Queue `job` to run against the state; returns its pending result
    pub fn submit<T, F>(&self, job: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> T + Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        let job: Job<S> = Box::new(move |state: &mut S| {
            // The caller may have given up waiting
            let _ = tx.send(job(state));
        });
        if self.tx.send(Message::Run(job)).is_err() {
            debug!("job submitted after queue shutdown");
        }
        Pending { rx }
    }

    fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
    }
}

/// FIFO of jobs executed against a state `S` by whichever thread drains it
pub struct TaskQueue<S> {
    tx: Sender<Message<S>>,
    rx: Receiver<Message<S>>,
}

impl<S> TaskQueue<S> {
    /// Create an empty queue
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// Handle for submitting jobs from other threads
    pub fn submitter(&self) -> Submitter<S> {
        Submitter {
            tx: self.tx.clone(),
        }
    }

    /// Queue `job`; see [`Submitter::submit`]
    pub fn submit<T, F>(&self, job: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> T + Send + 'static,
    {
        self.submitter().submit(job)
    }

    /// Run every job queued so far without blocking; returns how many ran.
    ///
    /// A shutdown request found while draining is put back for [`run`](Self::run).
    pub fn drain(&self, state: &mut S) -> usize {
        let mut ran = 0;
        while let Ok(message) = self.rx.try_recv() {
            match message {
                Message::Run(job) => {
                    job(state);
                    ran += 1;
                }
                Message::Shutdown => {
                    let _ = self.tx.send(Message::Shutdown);
                    break;
                }
            }
        }
        ran
    }

    /// Run jobs until a shutdown request arrives
    pub fn run(&self, state: &mut S) {
        while let Ok(message) = self.rx.recv() {
            match message {
                Message::Run(job) => job(state),
                Message::Shutdown => break,
            }
        }
    }
}

impl<S> Default for TaskQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns a worker thread that builds and serves a state `S`
pub struct Dispatcher<S> {
    submitter: Submitter<S>,
    handle: Option<JoinHandle<()>>,
}

impl<S: 'static> Dispatcher<S> {
    /// Spawn the worker and build its state with `factory`.
    ///
    /// Returns once the factory has run; a factory error is returned here and
    /// the worker exits.
    pub fn spawn<F, E>(name: &str, factory: F) -> BridgeResult<Self>
    where
        F: FnOnce() -> Result<S, E> + Send + 'static,
        E: fmt::Display,
    {
        let queue = TaskQueue::<S>::new();
        let submitter = queue.submitter();
        let (ready_tx, ready_rx) = channel::bounded::<Result<(), String>>(1);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut state = match factory() {
                    Ok(state) => {
                        let _ = ready_tx.send(Ok(()));
                        state
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err.to_string()));
                        return;
                    }
                };
                queue.run(&mut state);
                // Jobs that raced the shutdown request still get an answer
                queue.drain(&mut state);
            })
            .map_err(|e| BridgeError::Runtime(RuntimeError::Unavailable(e.to_string())))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!(worker = name, "dispatcher started");
                Ok(Self {
                    submitter,
                    handle: Some(handle),
                })
            }
            Ok(Err(message)) => {
                let _ = handle.join();
                Err(BridgeError::Runtime(RuntimeError::Unavailable(message)))
            }
            Err(_) => {
                let _ = handle.join();
                Err(BridgeError::Disconnected)
            }
        }
    }
}

impl<S> Dispatcher<S> {
    /// Queue a job on the worker
    pub fn submit<T, F>(&self, job: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> T + Send + 'static,
    {
        self.submitter.submit(job)
    }

    /// Cloneable handle for other threads
    pub fn submitter(&self) -> Submitter<S> {
        self.submitter.clone()
    }

    /// Stop the worker after the jobs already queued, then join it
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.submitter.shutdown();
        if handle.join().is_err() {
            warn!("dispatcher worker panicked");
        }
    }
}

impl<S> Drop for Dispatcher<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_queue_drain_runs_in_order() {
        let queue = TaskQueue::<Vec<u32>>::new();
        let first = queue.submit(|log: &mut Vec<u32>| {
            log.push(1);
            log.len()
        });
        let second = queue.submit(|log: &mut Vec<u32>| {
            log.push(2);
            log.len()
        });

        let mut log = Vec::new();
        assert_eq!(queue.drain(&mut log), 2);
        assert_eq!(log, vec![1, 2]);
        assert_eq!(first.wait().unwrap(), 1);
        assert_eq!(second.wait().unwrap(), 2);
    }

    #[test]
    fn test_pending_not_ready_until_drained() {
        let queue = TaskQueue::<u32>::new();
        let pending = queue.submit(|n: &mut u32| *n * 2);
        assert!(pending.try_take().unwrap().is_none());
        queue.drain(&mut 21);
        assert_eq!(pending.try_take().unwrap(), Some(42));
    }

    #[test]
    fn test_dispatcher_runs_non_send_state() {
        // Rc is not Send: the state must be built on the worker thread
        let dispatcher = Dispatcher::spawn("test-worker", || {
            Ok::<_, String>(Rc::new(RefCell::new(0u32)))
        })
        .unwrap();

        for _ in 0..3 {
            dispatcher
                .submit(|state: &mut Rc<RefCell<u32>>| *state.borrow_mut() += 1)
                .wait()
                .unwrap();
        }
        let value = dispatcher
            .submit(|state: &mut Rc<RefCell<u32>>| *state.borrow())
            .wait()
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn test_dispatcher_factory_error() {
        let result = Dispatcher::<u32>::spawn("failing-worker", || Err("no runtime"));
        match result {
            Err(BridgeError::Runtime(RuntimeError::Unavailable(msg))) => {
                assert_eq!(msg, "no runtime")
            }
            _ => panic!("expected factory error"),
        }
    }

    #[test]
    fn test_submit_after_shutdown_disconnects() {
        let mut dispatcher = Dispatcher::spawn("stopping-worker", || Ok::<_, String>(0u32)).unwrap();
        let submitter = dispatcher.submitter();
        dispatcher.shutdown();
        let pending = submitter.submit(|n: &mut u32| *n);
        assert!(matches!(pending.wait(), Err(BridgeError::Disconnected)));
    }

    #[test]
    fn test_concurrent_submitters() {
        let dispatcher = Dispatcher::spawn("shared-worker", || Ok::<_, String>(0u64)).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let submitter = dispatcher.submitter();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        submitter.submit(|n: &mut u64| *n += 1).wait().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let total = dispatcher.submit(|n: &mut u64| *n).wait().unwrap();
        assert_eq!(total, 100);
    }
}
