//! Cancellable units of in-flight work.
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Handle to an in-flight operation that can be told to stop.
///
/// `cancel` must be safe to call more than once and from any thread.
pub trait AsyncTask: Send + Sync {
    fn cancel(&self);
}

/// Shared reference to a task.
pub type TaskRef = Arc<dyn AsyncTask>;

impl AsyncTask for CancellationToken {
    fn cancel(&self) {
        CancellationToken::cancel(self);
    }
}

impl AsyncTask for AbortHandle {
    fn cancel(&self) {
        self.abort();
    }
}

/// Aggregate task that fans `cancel` out to every child.
///
/// Children added after the container was cancelled are cancelled on the spot.
#[derive(Default)]
pub struct TaskContainer {
    state: Mutex<ContainerState>,
}

#[derive(Default)]
struct ContainerState {
    tasks: Vec<TaskRef>,
    cancelled: bool,
}

impl TaskContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, task: TaskRef) {
        let mut state = self.state.lock();
        if state.cancelled {
            drop(state);
            trace!("task added to cancelled container");
            task.cancel();
            return;
        }
        state.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}

impl AsyncTask for TaskContainer {
    fn cancel(&self) {
        let tasks = {
            let mut state = self.state.lock();
            state.cancelled = true;
            std::mem::take(&mut state.tasks)
        };
        for task in tasks {
            task.cancel();
        }
    }
}
