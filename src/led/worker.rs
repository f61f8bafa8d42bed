//! Off-loop LED command execution
//!
//! Hardware writes can block for milliseconds. [`LedWorker`] queues actions to
//! a dedicated thread so the event loop never waits on the device. Queue
//! order is preserved, and dropping the worker flushes what is queued.

use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;

use super::LedSink;
use crate::Result;
use crate::action::LedAction;

/// Runs another sink's operations on a background thread
pub struct LedWorker {
    tx: Mutex<Option<Sender<LedAction>>>,
    thread: Option<JoinHandle<()>>,
}

impl LedWorker {
    /// Move `sink` onto a new worker thread
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned
    pub fn spawn<S: LedSink + 'static>(sink: S) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<LedAction>();
        let thread = std::thread::Builder::new()
            .name("led-worker".to_string())
            .spawn(move || {
                for action in rx {
                    action.apply(&sink);
                }
                tracing::debug!("led worker stopped");
            })?;

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            thread: Some(thread),
        })
    }

    fn enqueue(&self, action: LedAction) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let sent = tx.as_ref().is_some_and(|tx| tx.send(action).is_ok());
        if !sent {
            tracing::warn!(%action, "led worker is gone, dropping command");
        }
    }
}

impl LedSink for LedWorker {
    fn off(&self) {
        self.enqueue(LedAction::Off);
    }

    fn think(&self) {
        self.enqueue(LedAction::Think);
    }

    fn speak(&self) {
        self.enqueue(LedAction::Speak);
    }

    fn spin(&self) {
        self.enqueue(LedAction::Spin);
    }

    fn wakeup(&self) {
        self.enqueue(LedAction::Wakeup);
    }
}

impl Drop for LedWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the queue is drained
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("led worker panicked");
        }
    }
}
