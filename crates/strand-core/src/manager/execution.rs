//! Per-request state machine: adapt, send, follow redirects, validate, retry.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use strand_model::{CONTENT_TYPE, Method, Request, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use super::ManagerInner;
use crate::error::Error;
use crate::pipeline::{
    Adapter, RetryContext, RetryDecision, Retrier, Validator, execute_adapter_chain, execute_retrier_chain,
    run_validations,
};
use crate::promise::{Completion, Promise};
use crate::task::{AsyncTask, TaskRef};

/// Where one pass through the pipeline starts from.
#[derive(Clone, Debug)]
struct Attempt {
    /// Request before adapters ran; adapters see it afresh on every pass.
    request: Request,
    retries: u32,
    redirects: u32,
    previous_delay: Option<Duration>,
}

impl Attempt {
    fn first(request: Request) -> Self {
        Self {
            request,
            retries: 0,
            redirects: 0,
            previous_delay: None,
        }
    }

    fn retry(mut self, delay: Duration) -> Self {
        self.retries += 1;
        self.previous_delay = Some(delay);
        self
    }

    /// Next hop of a redirect. 303, and 301/302 for anything but GET/HEAD, become a bodiless GET.
    fn redirect(mut self, status: u16, location: Url) -> Self {
        let downgrade = status == 303
            || (matches!(status, 301 | 302) && !matches!(self.request.method, Method::Get | Method::Head));
        if downgrade {
            self.request.method = Method::Get;
            self.request.body = None;
            self.request.headers.remove(CONTENT_TYPE);
        }
        self.request.url = location;
        self.redirects += 1;
        self
    }
}

pub(crate) struct Execution {
    manager: Arc<ManagerInner>,
    completion: Completion<Response>,
    adapters: Arc<[Arc<dyn Adapter>]>,
    retriers: Arc<[Arc<dyn Retrier>]>,
    validators: Arc<[Arc<dyn Validator>]>,
    current: Mutex<Option<TaskRef>>,
    cancelled: AtomicBool,
    finished: AtomicBool,
}

impl Execution {
    pub(crate) fn start(manager: Arc<ManagerInner>, request: Request) -> Promise<Response> {
        let queue = manager.queue.clone();
        Promise::new(&queue, move |completion| {
            let execution = Arc::new(Execution {
                adapters: manager.adapter_snapshot(),
                retriers: manager.retrier_snapshot(),
                validators: manager.validator_snapshot(),
                manager,
                completion,
                current: Mutex::new(None),
                cancelled: AtomicBool::new(false),
                finished: AtomicBool::new(false),
            });
            execution.clone().attempt(Attempt::first(request));
            Some(execution as TaskRef)
        })
    }

    fn attempt(self: Arc<Self>, attempt: Attempt) {
        trace!(
            url = %attempt.request.url,
            retries = attempt.retries,
            redirects = attempt.redirects,
            "starting attempt"
        );
        let chain = execute_adapter_chain(&self.manager.queue, self.adapters.clone(), attempt.request.clone());
        self.run(
            chain,
            move |this, adapted| this.send(adapted, attempt),
            |this, err| this.finish(Err(err)),
        );
    }

    fn send(self: Arc<Self>, adapted: Request, attempt: Attempt) {
        let transport = self.manager.transport.clone();
        let outgoing = adapted.clone();
        let exchange = Promise::spawn(&self.manager.queue, async move { transport.send(outgoing).await });

        let (failed_request, failed_attempt) = (adapted.clone(), attempt.clone());
        self.run(
            exchange,
            move |this, response| this.receive(adapted, response, attempt),
            move |this, err| this.recover(failed_request, err, failed_attempt),
        );
    }

    fn receive(self: Arc<Self>, request: Request, response: Response, attempt: Attempt) {
        if response.is_redirect() {
            if let Some(location) = response.location() {
                let limit = self.manager.config.max_redirects;
                if attempt.redirects >= limit {
                    return self.finish(Err(Error::TooManyRedirects { limit }));
                }
                debug!(status = response.status, from = %response.url, to = %location, "following redirect");
                return self.attempt(attempt.redirect(response.status, location));
            }
        }

        match run_validations(&self.validators, &request, &response) {
            Ok(()) => self.finish(Ok(response)),
            Err(err) => self.recover(request, err, attempt),
        }
    }

    fn recover(self: Arc<Self>, request: Request, error: Error, attempt: Attempt) {
        let context = RetryContext {
            request,
            error: error.clone(),
            attempt: attempt.retries,
            previous_delay: attempt.previous_delay,
        };
        let decision = execute_retrier_chain(
            &self.manager.queue,
            self.retriers.clone(),
            self.manager.policy.clone(),
            context,
        );
        self.run(
            decision,
            move |this, decision| match decision {
                RetryDecision::Retry(delay) => this.schedule(delay, attempt.retry(delay)),
                RetryDecision::DoNotRetry(err) => this.finish(Err(err)),
            },
            move |this, chain_err| {
                warn!(error = %chain_err, "retrier chain failed; keeping original error");
                this.finish(Err(error));
            },
        );
    }

    fn schedule(self: Arc<Self>, delay: Duration, next: Attempt) {
        debug!(retry = next.retries, ?delay, url = %next.request.url, "retrying request");
        if delay.is_zero() {
            return self.attempt(next);
        }

        let token = CancellationToken::new();
        if !self.track(Arc::new(token.clone())) {
            return;
        }
        let this = self.clone();
        self.manager.queue.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => this.attempt(next),
            }
        });
    }

    /// Track `step` as the current task, wire its outcome, then start it.
    fn run<X, S, E>(self: &Arc<Self>, step: Promise<X>, on_value: S, on_error: E)
    where
        X: Send + 'static,
        S: FnOnce(Arc<Self>, X) + Send + 'static,
        E: FnOnce(Arc<Self>, Error) + Send + 'static,
    {
        let (ok, err) = (self.clone(), self.clone());
        let step = Arc::new(step.error(move |e| on_error(err, e)).subscribe(move |v| on_value(ok, v)));
        if self.track(step.clone()) {
            step.conclude();
        }
    }

    fn track(&self, task: TaskRef) -> bool {
        let mut current = self.current.lock();
        if self.cancelled.load(Ordering::SeqCst) {
            drop(current);
            task.cancel();
            return false;
        }
        let previous = current.replace(task);
        drop(current);
        drop(previous);
        true
    }

    fn finish(&self, outcome: Result<Response, Error>) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        let previous = self.current.lock().take();
        drop(previous);
        match outcome {
            Ok(response) => {
                debug!(status = response.status, url = %response.url, "request completed");
                self.completion.resolve(response);
            }
            Err(err) => {
                debug!(error = %err, "request failed");
                self.completion.reject(err);
            }
        }
    }
}

impl AsyncTask for Execution {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let current = self.current.lock().take();
        if let Some(task) = current {
            task.cancel();
        }
    }
}
