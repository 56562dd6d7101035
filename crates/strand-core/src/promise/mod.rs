//! Single-resolution, lazily started, cancellable promises.
//!
//! A [`Promise`] holds an operation that produces one value or one [`Error`].
//! Nothing runs until the chain is concluded with [`Promise::finally`] (or
//! [`Promise::conclude`], or by awaiting it). Concluding the tail of a chain
//! walks up to the root and starts its work; every continuation is posted to a
//! [`Queue`], never run on the settling caller's stack.
//!
//! ```text
//! firstly ──then──▶ child ──then──▶ child ──finally(cb)
//!    ▲                                        │
//!    └──────────── conclude walks up ─────────┘
//! ```
//!
//! Dropping a pending, concluded promise cancels the work it is waiting on.
mod combinators;
mod completion;
mod state;

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::warn;

pub use completion::Completion;
use state::{Inner, Upstream, Work};

use crate::error::Error;
use crate::queue::Queue;
use crate::task::{AsyncTask, TaskRef};

/// Conversion of a transform's return value into a settlement.
///
/// `Option::None` rejects with [`Error::Unknown`].
pub trait IntoResolution<T> {
    fn into_resolution(self) -> Result<T, Error>;
}

impl<T> IntoResolution<T> for Result<T, Error> {
    fn into_resolution(self) -> Result<T, Error> {
        self
    }
}

impl<T> IntoResolution<T> for Option<T> {
    fn into_resolution(self) -> Result<T, Error> {
        self.ok_or(Error::Unknown)
    }
}

#[must_use = "promises are lazy and a released pending promise is cancelled"]
pub struct Promise<T: Send + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> Promise<T> {
    /// Promise whose `work` runs on `queue` once the chain is concluded.
    ///
    /// `work` receives the [`Completion`] to settle and may return a task that
    /// cancelling the promise will cancel.
    pub fn new<W>(queue: &Queue, work: W) -> Self
    where
        W: FnOnce(Completion<T>) -> Option<TaskRef> + Send + 'static,
    {
        let work: Work<T> = Box::new(work);
        Self {
            inner: Inner::new(queue.clone(), Some(work), None),
        }
    }

    /// Promise settled from outside through the returned completion.
    pub fn pending(queue: &Queue) -> (Self, Completion<T>) {
        let inner = Inner::new(queue.clone(), None, None);
        let completion = Completion::new(&inner);
        (Self { inner }, completion)
    }

    /// Root of a chain whose first step is a plain synchronous body.
    pub fn firstly<R, F>(queue: &Queue, body: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
        R: IntoResolution<T>,
    {
        Self::new(queue, move |completion| {
            completion.settle(body().into_resolution());
            None
        })
    }

    /// Promise driven by a future spawned on the queue's runtime.
    ///
    /// Cancelling the promise aborts the future.
    pub fn spawn<F>(queue: &Queue, future: F) -> Self
    where
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let runtime = queue.clone();
        Self::new(queue, move |completion| {
            let handle = runtime.spawn(async move { completion.settle(future.await) });
            Some(Arc::new(handle) as TaskRef)
        })
    }

    /// Promise that resolves with `value` once the chain is concluded.
    pub fn resolved(queue: &Queue, value: T) -> Self {
        Self::firstly(queue, move || Ok::<T, Error>(value))
    }

    /// Promise that rejects with `error` once the chain is concluded.
    pub fn rejected(queue: &Queue, error: Error) -> Self {
        Self::firstly(queue, move || Err::<T, Error>(error))
    }

    pub fn id(&self) -> u64 {
        self.inner.id()
    }

    /// Queue this promise's continuations are posted to.
    pub fn dispatch_queue(&self) -> &Queue {
        self.inner.queue()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.is_pending()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Chain a transform of the value.
    ///
    /// Errors of this promise flow to the child unless an error handler was
    /// already attached here.
    pub fn then<U, R, F>(self, transform: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: IntoResolution<U>,
    {
        let queue = self.inner.queue().clone();
        self.then_on(queue, transform)
    }

    /// Chain an asynchronous step; the child settles with the returned promise.
    pub fn then_promise<U, R, F>(self, transform: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: IntoResolution<Promise<U>>,
    {
        let child = Inner::<U>::new(self.inner.queue().clone(), None, Some(self.upstream()));
        let weak = Arc::downgrade(&child);
        self.inner.set_success(Box::new(move |value| {
            let Some(child) = weak.upgrade() else {
                return;
            };
            match transform(value).into_resolution() {
                Ok(next) => adopt(&child, next),
                Err(err) => child.settle(Err(err)),
            }
        }));
        forward_errors(&self.inner, &child);
        Promise { inner: child }
    }

    /// Re-emit the value on another queue.
    pub fn dispatch(self, queue: &Queue) -> Promise<T> {
        self.then_on(queue.clone(), Ok::<T, Error>)
    }

    /// Attach the error continuation. The last attached handler wins.
    pub fn error<F>(self, handler: F) -> Self
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.inner.set_error(Box::new(handler), false);
        self
    }

    /// Block that runs exactly once at settlement, before the outcome continuation.
    ///
    /// Runs immediately if the promise is already settled.
    pub fn defer<F>(self, block: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.set_defer(Box::new(block));
        self
    }

    /// Attach the success continuation and start the chain.
    ///
    /// Keep the returned promise alive until it settles: releasing it cancels the chain.
    pub fn finally<F>(self, callback: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        if !self.inner.has_error_handler() {
            warn!(promise = self.id(), "finally without an error handler; failures will be lost");
        }
        self.inner.set_success(Box::new(callback));
        self.conclude();
        self
    }

    /// Start the chain without attaching a continuation. Idempotent.
    pub fn conclude(&self) {
        self.inner.clone().conclude_chain();
    }

    /// Cancel the underlying task and everything upstream. Continuations won't fire.
    pub fn cancel(&self) {
        self.inner.cancel_chain();
    }

    /// Success continuation without concluding.
    pub(crate) fn subscribe<F>(self, callback: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.inner.set_success(Box::new(callback));
        self
    }

    fn upstream(&self) -> Arc<dyn Upstream> {
        self.inner.clone()
    }

    fn then_on<U, R, F>(self, queue: Queue, transform: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: IntoResolution<U>,
    {
        let child = Inner::<U>::new(queue, None, Some(self.upstream()));
        let weak = Arc::downgrade(&child);
        self.inner.set_success(Box::new(move |value| {
            if let Some(child) = weak.upgrade() {
                child.settle(transform(value).into_resolution());
            }
        }));
        forward_errors(&self.inner, &child);
        Promise { inner: child }
    }
}

fn forward_errors<T, U>(parent: &Inner<T>, child: &Arc<Inner<U>>)
where
    T: Send + 'static,
    U: Send + 'static,
{
    let weak = Arc::downgrade(child);
    parent.set_error(
        Box::new(move |err| {
            if let Some(child) = weak.upgrade() {
                child.settle(Err(err));
            }
        }),
        true,
    );
}

/// Make `child` wait on `next` instead of its original parent.
fn adopt<U: Send + 'static>(child: &Arc<Inner<U>>, next: Promise<U>) {
    let next = next.inner;
    if !child.replace_upstream(next.clone()) {
        next.cancel_chain();
        return;
    }
    let on_error = Arc::downgrade(child);
    let on_value = Arc::downgrade(child);
    next.set_error(
        Box::new(move |err| {
            if let Some(child) = on_error.upgrade() {
                child.settle(Err(err));
            }
        }),
        false,
    );
    next.set_success(Box::new(move |value| {
        if let Some(child) = on_value.upgrade() {
            child.settle(Ok(value));
        }
    }));
    next.conclude_chain();
}

impl<T: Send + 'static> AsyncTask for Promise<T> {
    fn cancel(&self) {
        Promise::cancel(self);
    }
}

impl<T: Send + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.id())
            .field("queue", &self.dispatch_queue().label())
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Future view of a promise. Dropping it cancels the promise.
pub struct PromiseFuture<T: Send + 'static> {
    _promise: Promise<T>,
    rx: oneshot::Receiver<Result<T, Error>>,
}

impl<T: Send + 'static> Future for PromiseFuture<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T: Send + 'static> IntoFuture for Promise<T> {
    type Output = Result<T, Error>;
    type IntoFuture = PromiseFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let on_error = tx.clone();
        let promise = self
            .error(move |err| {
                if let Some(tx) = on_error.lock().take() {
                    let _ = tx.send(Err(err));
                }
            })
            .finally(move |value| {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(Ok(value));
                }
            });
        PromiseFuture { _promise: promise, rx }
    }
}
