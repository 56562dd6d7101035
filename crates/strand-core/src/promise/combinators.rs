use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{Completion, Promise};
use crate::error::Error;
use crate::queue::Queue;
use crate::task::{AsyncTask, TaskContainer, TaskRef};

struct FanIn<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
    failed: bool,
}

impl<T: Send + 'static> Promise<T> {
    /// Run all promises concurrently; resolve with their values in input order.
    ///
    /// The first failure rejects the aggregate and cancels every other input.
    /// An empty input resolves with an empty vector.
    pub fn all(queue: &Queue, promises: Vec<Promise<T>>) -> Promise<Vec<T>> {
        Promise::new(queue, move |completion: Completion<Vec<T>>| {
            let total = promises.len();
            if total == 0 {
                completion.resolve(Vec::new());
                return None;
            }

            let container = Arc::new(TaskContainer::new());
            let fan_in = Arc::new(Mutex::new(FanIn {
                slots: (0..total).map(|_| None).collect(),
                remaining: total,
                failed: false,
            }));

            for (index, promise) in promises.into_iter().enumerate() {
                let on_error = {
                    let completion = completion.clone();
                    let fan_in = fan_in.clone();
                    let container = Arc::downgrade(&container);
                    move |err: Error| {
                        {
                            let mut state = fan_in.lock();
                            if state.failed {
                                return;
                            }
                            state.failed = true;
                        }
                        debug!(index, error = %err, "all: input failed; cancelling the rest");
                        if let Some(container) = container.upgrade() {
                            container.cancel();
                        }
                        completion.reject(err);
                    }
                };
                let on_value = {
                    let completion = completion.clone();
                    let fan_in = fan_in.clone();
                    move |value: T| {
                        let values = {
                            let mut state = fan_in.lock();
                            if state.failed {
                                return;
                            }
                            state.slots[index] = Some(value);
                            state.remaining -= 1;
                            if state.remaining > 0 {
                                return;
                            }
                            state.slots.drain(..).flatten().collect::<Vec<_>>()
                        };
                        completion.resolve(values);
                    }
                };
                let handle = promise.error(on_error).finally(on_value);
                container.add(Arc::new(handle));
            }
            Some(container as TaskRef)
        })
    }

    /// Run promises one at a time in input order, collecting their values.
    ///
    /// The next promise is concluded only after the previous one resolved. The
    /// first failure rejects the aggregate and the remainder never starts.
    pub fn queue(queue: &Queue, promises: Vec<Promise<T>>) -> Promise<Vec<T>> {
        Promise::new(queue, move |completion: Completion<Vec<T>>| {
            let container = Arc::new(TaskContainer::new());
            let sequence = Arc::new(Sequence {
                pending: Mutex::new(promises.into_iter().collect()),
                results: Mutex::new(Vec::new()),
                completion,
                container: Arc::downgrade(&container),
            });
            sequence.advance();
            Some(container as TaskRef)
        })
    }
}

struct Sequence<T: Send + 'static> {
    pending: Mutex<VecDeque<Promise<T>>>,
    results: Mutex<Vec<T>>,
    completion: Completion<Vec<T>>,
    container: Weak<TaskContainer>,
}

impl<T: Send + 'static> Sequence<T> {
    fn advance(self: Arc<Self>) {
        let next = self.pending.lock().pop_front();
        let Some(promise) = next else {
            let results = std::mem::take(&mut *self.results.lock());
            self.completion.resolve(results);
            return;
        };
        let Some(container) = self.container.upgrade() else {
            trace!("queue: aggregate released; stopping");
            return;
        };

        let on_error = self.clone();
        let on_value = self;
        let handle = promise
            .error(move |err| {
                let skipped = std::mem::take(&mut *on_error.pending.lock()).len();
                debug!(skipped, error = %err, "queue: step failed; remainder skipped");
                on_error.completion.reject(err);
            })
            .finally(move |value| {
                on_value.results.lock().push(value);
                on_value.advance();
            });
        container.add(Arc::new(handle));
    }
}
