//! Execution queues continuations are posted to.
//!
//! A [`Queue`] never runs a job inline: every job is handed to the tokio runtime
//! it was built on. Concurrent queues spawn each job as its own task, serial
//! queues run jobs one at a time in submission order.
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::warn;

use crate::error::Error;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone)]
enum Lane {
    Concurrent,
    Serial(mpsc::UnboundedSender<Job>),
}

/// Cheap-to-clone handle to a place where callbacks run.
#[derive(Clone)]
pub struct Queue {
    label: Arc<str>,
    handle: Handle,
    lane: Lane,
}

impl Queue {
    pub fn concurrent(label: impl Into<String>, handle: Handle) -> Self {
        Self {
            label: Arc::from(label.into()),
            handle,
            lane: Lane::Concurrent,
        }
    }

    /// Queue whose jobs run strictly one after another.
    ///
    /// The drain task lives as long as any clone of the queue.
    pub fn serial(label: impl Into<String>, handle: Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
        });
        Self {
            label: Arc::from(label.into()),
            handle,
            lane: Lane::Serial(tx),
        }
    }

    /// Concurrent queue on the runtime of the calling context.
    pub fn current(label: impl Into<String>) -> Result<Self, Error> {
        let handle = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        Ok(Self::concurrent(label, handle))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn is_serial(&self) -> bool {
        matches!(self.lane, Lane::Serial(_))
    }

    /// Post a job. Never runs it on the caller's stack.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.lane {
            Lane::Concurrent => {
                self.handle.spawn(async move { job() });
            }
            Lane::Serial(tx) => {
                if tx.send(Box::new(job)).is_err() {
                    warn!(queue = %self.label, "serial queue closed; job dropped");
                }
            }
        }
    }

    /// Post a job after `delay`. Aborting the handle cancels the job if it has not run yet.
    pub fn execute_after<F>(&self, delay: Duration, job: F) -> AbortHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let queue = self.clone();
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            queue.execute(job);
        })
    }

    /// Drive a future on this queue's runtime.
    pub fn spawn<F>(&self, future: F) -> AbortHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future).abort_handle()
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("label", &self.label)
            .field("serial", &self.is_serial())
            .finish()
    }
}
