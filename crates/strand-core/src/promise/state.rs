use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use super::completion::Completion;
use crate::error::Error;
use crate::queue::Queue;
use crate::task::TaskRef;

pub(crate) type SuccessFn<T> = Box<dyn FnOnce(T) + Send + 'static>;
pub(crate) type ErrorFn = Box<dyn FnOnce(Error) + Send + 'static>;
pub(crate) type DeferFn = Box<dyn FnOnce() + Send + 'static>;
pub(crate) type Work<T> = Box<dyn FnOnce(Completion<T>) -> Option<TaskRef> + Send + 'static>;

/// How long `cancel` waits for the state lock before giving up.
const CANCEL_LOCK_TIMEOUT: Duration = Duration::from_millis(50);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A promise that another promise can conclude and cancel through.
pub(crate) trait Upstream: Send + Sync {
    fn conclude(self: Arc<Self>);
    fn cancel(&self);
}

pub(crate) enum Status<T> {
    Pending,
    /// `None` once the value has been handed to a continuation.
    Resolved(Option<T>),
    Rejected(Option<Error>),
}

impl<T> Status<T> {
    fn is_pending(&self) -> bool {
        matches!(self, Status::Pending)
    }
}

pub(crate) struct State<T> {
    status: Status<T>,
    on_success: Option<SuccessFn<T>>,
    on_error: Option<ErrorFn>,
    on_defer: Option<DeferFn>,
    error_attached: bool,
    work: Option<Work<T>>,
    task: Option<TaskRef>,
    upstream: Option<Arc<dyn Upstream>>,
    concluded: bool,
    cancelled: bool,
}

impl<T> State<T> {
    /// Pair a held outcome with its continuation, once the chain is concluded.
    fn take_delivery(&mut self) -> Delivery<T> {
        if !self.concluded {
            return Delivery::Held;
        }
        match &mut self.status {
            Status::Resolved(value) if value.is_some() && self.on_success.is_some() => {
                match (self.on_success.take(), value.take()) {
                    (Some(cb), Some(value)) => Delivery::Success(cb, value),
                    _ => Delivery::Held,
                }
            }
            Status::Rejected(err) if err.is_some() && self.on_error.is_some() => {
                match (self.on_error.take(), err.take()) {
                    (Some(cb), Some(err)) => Delivery::Failure(cb, err),
                    _ => Delivery::Held,
                }
            }
            _ => Delivery::Held,
        }
    }
}

enum Delivery<T> {
    Success(SuccessFn<T>, T),
    Failure(ErrorFn, Error),
    Held,
}

pub(crate) struct Inner<T> {
    id: u64,
    queue: Queue,
    state: Mutex<State<T>>,
}

impl<T: Send + 'static> Inner<T> {
    pub(crate) fn new(queue: Queue, work: Option<Work<T>>, upstream: Option<Arc<dyn Upstream>>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            queue,
            state: Mutex::new(State {
                status: Status::Pending,
                on_success: None,
                on_error: None,
                on_defer: None,
                error_attached: false,
                work,
                task: None,
                upstream,
                concluded: false,
                cancelled: false,
            }),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn queue(&self) -> &Queue {
        &self.queue
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state.lock().status.is_pending()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Record the single outcome and post the matching continuation.
    ///
    /// The first settlement wins. Later ones are logged and dropped; settlements
    /// that arrive after cancellation are ignored silently. Continuations only
    /// fire once the chain is concluded; until then the outcome is held.
    pub(crate) fn settle(&self, outcome: Result<T, Error>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.cancelled {
            trace!(promise = self.id, "settlement after cancel ignored");
            return;
        }
        if !state.status.is_pending() {
            error!(promise = self.id, "promise settled more than once; ignoring");
            return;
        }

        let defer = state.on_defer.take();
        let upstream = state.upstream.take();
        let task = state.task.take();
        state.work = None;
        state.status = match outcome {
            Ok(value) => {
                state.on_error = None;
                Status::Resolved(Some(value))
            }
            Err(err) => {
                state.on_success = None;
                Status::Rejected(Some(err))
            }
        };
        self.report_unhandled(state);
        let delivery = state.take_delivery();
        drop(guard);
        drop(upstream);
        drop(task);

        if let Some(defer) = defer {
            defer();
        }
        self.deliver(delivery);
    }

    /// Install the success continuation, replaying a held value.
    pub(crate) fn set_success(&self, cb: SuccessFn<T>) {
        let delivery = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if matches!(state.status, Status::Rejected(_) | Status::Resolved(None)) {
                return;
            }
            if state.on_success.replace(cb).is_some() {
                debug!(promise = self.id, "success continuation replaced");
            }
            state.take_delivery()
        };
        self.deliver(delivery);
    }

    /// Install the error continuation, replaying a held error.
    ///
    /// With `if_absent` an existing handler is kept and `cb` is dropped.
    pub(crate) fn set_error(&self, cb: ErrorFn, if_absent: bool) {
        let delivery = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if if_absent && state.error_attached {
                return;
            }
            state.error_attached = true;
            if matches!(state.status, Status::Resolved(_) | Status::Rejected(None)) {
                return;
            }
            if state.on_error.replace(cb).is_some() {
                debug!(promise = self.id, "error continuation replaced");
            }
            state.take_delivery()
        };
        self.deliver(delivery);
    }

    fn deliver(&self, delivery: Delivery<T>) {
        match delivery {
            Delivery::Success(cb, value) => self.queue.execute(move || cb(value)),
            Delivery::Failure(cb, err) => self.queue.execute(move || cb(err)),
            Delivery::Held => trace!(promise = self.id, "outcome held for a later continuation"),
        }
    }

    fn report_unhandled(&self, state: &State<T>) {
        if !state.concluded || state.error_attached {
            return;
        }
        if let Status::Rejected(Some(err)) = &state.status {
            error!(promise = self.id, error = %err, "promise rejected with no error handler");
        }
    }

    pub(crate) fn has_error_handler(&self) -> bool {
        self.state.lock().error_attached
    }

    /// Install the defer block; runs it on the spot if already settled.
    pub(crate) fn set_defer(&self, block: DeferFn) {
        let run_now = {
            let mut state = self.state.lock();
            if state.status.is_pending() && !state.cancelled {
                if state.on_defer.replace(block).is_some() {
                    warn!(promise = self.id, "defer block replaced; only the last one runs");
                }
                None
            } else {
                Some(block)
            }
        };
        if let Some(block) = run_now {
            block();
        }
    }

    /// Swap the upstream this promise waits on. Returns `false` if the promise
    /// can no longer accept one.
    pub(crate) fn replace_upstream(&self, upstream: Arc<dyn Upstream>) -> bool {
        let previous = {
            let mut state = self.state.lock();
            if state.cancelled || !state.status.is_pending() {
                return false;
            }
            state.upstream.replace(upstream)
        };
        drop(previous);
        true
    }

    /// Attach the task returned by this promise's work.
    fn hold_task(&self, task: TaskRef) {
        let mut state = self.state.lock();
        if state.cancelled {
            drop(state);
            task.cancel();
        } else if state.status.is_pending() {
            state.task = Some(task);
        }
    }

    /// Start the chain: conclude upstream first, then post own work.
    ///
    /// An outcome settled before conclusion is delivered now.
    pub(crate) fn conclude_chain(self: Arc<Self>) {
        let (upstream, work) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.concluded || state.cancelled {
                return;
            }
            state.concluded = true;
            if !state.status.is_pending() {
                self.report_unhandled(state);
                let delivery = state.take_delivery();
                drop(guard);
                self.deliver(delivery);
                return;
            }
            (state.upstream.clone(), state.work.take())
        };

        if let Some(upstream) = upstream {
            upstream.conclude();
        }

        if let Some(work) = work {
            trace!(promise = self.id, queue = self.queue.label(), "posting work");
            let weak: Weak<Self> = Arc::downgrade(&self);
            self.queue.execute(move || {
                let Some(inner) = weak.upgrade() else {
                    debug!("promise released before its work started");
                    return;
                };
                if inner.is_cancelled() {
                    return;
                }
                if let Some(task) = work(Completion::new(&inner)) {
                    inner.hold_task(task);
                }
            });
        }
    }

    /// Stop the operation and everything it waits on.
    ///
    /// Never blocks for long: if the state lock is contended past a short timeout
    /// the cancel is skipped.
    pub(crate) fn cancel_chain(&self) {
        let Some(mut guard) = self.state.try_lock_for(CANCEL_LOCK_TIMEOUT) else {
            warn!(promise = self.id, "cancel skipped: promise state is busy");
            return;
        };
        let state = &mut *guard;
        if state.cancelled || !state.status.is_pending() {
            return;
        }
        state.cancelled = true;
        state.work = None;
        state.on_success = None;
        state.on_error = None;
        state.on_defer = None;
        let task = state.task.take();
        let upstream = state.upstream.take();
        drop(guard);

        debug!(promise = self.id, "promise cancelled");
        if let Some(task) = task {
            task.cancel();
        }
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }
}

impl<T: Send + 'static> Upstream for Inner<T> {
    fn conclude(self: Arc<Self>) {
        self.conclude_chain();
    }

    fn cancel(&self) {
        self.cancel_chain();
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.status.is_pending() || state.cancelled {
            return;
        }
        if state.concluded {
            warn!(promise = self.id, "pending promise released; cancelling its work");
        } else {
            trace!(promise = self.id, "unstarted promise released");
        }
        if let Some(task) = state.task.take() {
            task.cancel();
        }
    }
}
