//! Single-consumer task queue standing in for the UI thread.
//!
//! Worker threads [`post`](DispatchHandle::post) closures; whichever thread
//! drives the [`Dispatcher`] runs them one at a time, in posting order.
//! Listener notifications are only ever delivered from that thread.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use tracing::trace;

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Task),
    Quit,
}

/// Longest single wait in [`Dispatcher::run_until`] before re-checking the condition.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Owner of the task queue. Not `Clone`: there is exactly one consumer.
pub struct Dispatcher {
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

/// Cloneable, thread-safe handle for posting work to a [`Dispatcher`].
#[derive(Clone)]
pub struct DispatchHandle {
    tx: Sender<Message>,
}

impl DispatchHandle {
    /// Queue `task` without waiting for it to run.
    ///
    /// Returns `false` if the dispatcher has been dropped.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Message::Run(Box::new(task))).is_ok()
    }

    /// Ask [`Dispatcher::run`] to return once the tasks queued before it are done.
    pub fn quit(&self) {
        let _ = self.tx.send(Message::Quit);
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle {
            tx: self.tx.clone(),
        }
    }

    /// Number of queued messages.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Run tasks until [`DispatchHandle::quit`] is received.
    pub fn run(&self) {
        while let Ok(message) = self.rx.recv() {
            match message {
                Message::Run(task) => task(),
                Message::Quit => {
                    trace!("Dispatcher quit");
                    break;
                }
            }
        }
    }

    /// Run everything currently queued without blocking. Returns the number
    /// of tasks run. A queued quit is consumed and stops the drain.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(message) = self.rx.try_recv() {
            match message {
                Message::Run(task) => {
                    task();
                    ran += 1;
                }
                Message::Quit => break,
            }
        }
        ran
    }

    /// Run tasks until `done` returns true or `timeout` elapses.
    ///
    /// `done` is checked before waiting and after every task. Returns its
    /// final value.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.rx.recv_timeout((deadline - now).min(POLL_INTERVAL)) {
                Ok(Message::Run(task)) => task(),
                Ok(Message::Quit) => return done(),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return done(),
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
