use std::sync::Arc;
use std::time::Duration;

use strand_model::{Request, RetryStrategy};
use tracing::{debug, trace};

use crate::backoff::next_delay;
use crate::error::Error;
use crate::promise::Promise;
use crate::queue::Queue;

/// What a retrier wants done with a failed attempt.
#[derive(Debug, Clone)]
pub enum RetryDirective {
    /// No opinion; ask the next retrier.
    EvaluateNext,
    /// Retry after the given delay.
    Retry(Duration),
    /// Give up. `None` surfaces the original error.
    Fail(Option<Error>),
}

/// Final verdict of the retrier chain.
#[derive(Debug, Clone)]
pub enum RetryDecision {
    Retry(Duration),
    DoNotRetry(Error),
}

/// A failed attempt as seen by retriers.
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub request: Request,
    pub error: Error,
    /// Retries already performed for this request.
    pub attempt: u32,
    pub previous_delay: Option<Duration>,
}

pub trait Retrier: Send + Sync {
    fn name(&self) -> &str;

    fn retry(&self, context: &RetryContext, queue: &Queue) -> Promise<RetryDirective>;
}

/// Bounded fallback consulted when every retrier passes.
///
/// Retries transient errors up to `max_attempts` times with backoff. The
/// `ceiling` caps retries overall, including ones requested by retriers.
#[derive(Debug, Clone)]
pub struct DefaultRetryPolicy {
    strategy: RetryStrategy,
    ceiling: u32,
}

impl DefaultRetryPolicy {
    pub fn new(strategy: RetryStrategy, ceiling: u32) -> Self {
        let ceiling = ceiling.max(strategy.max_attempts);
        Self { strategy, ceiling }
    }

    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn decide(&self, context: &RetryContext) -> RetryDecision {
        if !context.error.is_retryable() {
            return RetryDecision::DoNotRetry(context.error.clone());
        }
        if context.attempt < self.strategy.max_attempts {
            let delay = next_delay(&self.strategy.backoff, context.attempt + 1, context.previous_delay);
            return RetryDecision::Retry(delay);
        }
        self.exhausted(context)
    }

    fn exhausted(&self, context: &RetryContext) -> RetryDecision {
        if context.attempt == 0 {
            return RetryDecision::DoNotRetry(context.error.clone());
        }
        RetryDecision::DoNotRetry(Error::RetryExhausted {
            attempts: context.attempt,
            source: Box::new(context.error.clone()),
        })
    }
}

impl Default for DefaultRetryPolicy {
    fn default() -> Self {
        Self::new(RetryStrategy::default(), 16)
    }
}

/// Consult `retriers` in order about a failed attempt, falling back to `policy`.
///
/// Cancellation is never retried, and nothing is retried past the policy ceiling.
pub fn execute_retrier_chain(
    queue: &Queue,
    retriers: Arc<[Arc<dyn Retrier>]>,
    policy: Arc<DefaultRetryPolicy>,
    context: RetryContext,
) -> Promise<RetryDecision> {
    if context.error.is_cancelled() {
        return Promise::resolved(queue, RetryDecision::DoNotRetry(context.error));
    }
    if context.attempt >= policy.ceiling() {
        debug!(attempt = context.attempt, "retry ceiling reached");
        let decision = policy.exhausted(&context);
        return Promise::resolved(queue, decision);
    }
    evaluate(queue.clone(), retriers, policy, 0, Arc::new(context))
}

fn evaluate(
    queue: Queue,
    chain: Arc<[Arc<dyn Retrier>]>,
    policy: Arc<DefaultRetryPolicy>,
    index: usize,
    context: Arc<RetryContext>,
) -> Promise<RetryDecision> {
    let Some(retrier) = chain.get(index).cloned() else {
        let decision = policy.decide(&context);
        trace!(attempt = context.attempt, ?decision, "default retry policy applied");
        return Promise::resolved(&queue, decision);
    };
    trace!(retrier = retrier.name(), index, "evaluating retrier");

    let step = retrier.retry(&context, &queue);
    step.then_promise(move |directive| {
        let next = match directive {
            RetryDirective::EvaluateNext => return Ok(evaluate(queue, chain, policy, index + 1, context)),
            RetryDirective::Retry(delay) => {
                debug!(retrier = retrier.name(), ?delay, "retrier requested retry");
                RetryDecision::Retry(delay)
            }
            RetryDirective::Fail(err) => {
                debug!(retrier = retrier.name(), "retrier gave up");
                RetryDecision::DoNotRetry(err.unwrap_or_else(|| context.error.clone()))
            }
        };
        Ok::<_, Error>(Promise::resolved(&queue, next))
    })
}

/// Synchronous retrier backed by a closure.
pub struct RetrierFn<F> {
    name: String,
    f: F,
}

impl<F> RetrierFn<F>
where
    F: Fn(&RetryContext) -> RetryDirective + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> Retrier for RetrierFn<F>
where
    F: Fn(&RetryContext) -> RetryDirective + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn retry(&self, context: &RetryContext, queue: &Queue) -> Promise<RetryDirective> {
        Promise::resolved(queue, (self.f)(context))
    }
}

/// Retries listed HTTP statuses after a fixed delay.
pub struct StatusRetrier {
    statuses: Vec<u16>,
    delay: Duration,
}

impl StatusRetrier {
    pub fn new(statuses: impl Into<Vec<u16>>, delay: Duration) -> Self {
        Self {
            statuses: statuses.into(),
            delay,
        }
    }
}

impl Default for StatusRetrier {
    /// Request timeout, rate limiting and common gateway failures.
    fn default() -> Self {
        Self::new(vec![408, 429, 500, 502, 503, 504], Duration::from_secs(1))
    }
}

impl Retrier for StatusRetrier {
    fn name(&self) -> &str {
        "status"
    }

    fn retry(&self, context: &RetryContext, queue: &Queue) -> Promise<RetryDirective> {
        let directive = match context.error.status_code() {
            Some(status) if self.statuses.contains(&status) => RetryDirective::Retry(self.delay),
            _ => RetryDirective::EvaluateNext,
        };
        Promise::resolved(queue, directive)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use strand_model::{BackoffStrategy, JitterStrategy, Method};
    use url::Url;

    use super::*;

    fn context(error: Error, attempt: u32) -> RetryContext {
        RetryContext {
            request: Request::new(Method::Get, Url::parse("https://example.test/").unwrap()),
            error,
            attempt,
            previous_delay: None,
        }
    }

    fn policy(max_attempts: u32) -> Arc<DefaultRetryPolicy> {
        Arc::new(DefaultRetryPolicy::new(
            RetryStrategy {
                max_attempts,
                backoff: BackoffStrategy {
                    jitter: JitterStrategy::None,
                    first_ms: 10,
                    max_ms: 100,
                    factor: 2.0,
                },
            },
            8,
        ))
    }

    fn none() -> Arc<[Arc<dyn Retrier>]> {
        Vec::<Arc<dyn Retrier>>::new().into()
    }

    #[test]
    fn default_policy_backs_off_then_gives_up() {
        let p = policy(2);
        assert!(matches!(p.decide(&context(Error::Timeout, 0)), RetryDecision::Retry(d) if d == Duration::from_millis(10)));
        assert!(matches!(p.decide(&context(Error::Timeout, 1)), RetryDecision::Retry(d) if d == Duration::from_millis(20)));
        assert!(matches!(
            p.decide(&context(Error::Timeout, 2)),
            RetryDecision::DoNotRetry(Error::RetryExhausted { attempts: 2, .. })
        ));
    }

    #[test]
    fn default_policy_skips_permanent_errors() {
        let p = policy(5);
        let not_found = Error::HttpStatus {
            status: 404,
            url: "https://example.test/".into(),
        };
        assert!(matches!(p.decide(&context(not_found, 0)), RetryDecision::DoNotRetry(Error::HttpStatus { status: 404, .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_chain_defers_to_policy() {
        let q = Queue::current("retriers").unwrap();
        let decision = execute_retrier_chain(&q, none(), policy(1), context(Error::Transport("reset".into()), 0))
            .await
            .unwrap();
        assert!(matches!(decision, RetryDecision::Retry(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancellation_is_never_retried() {
        let q = Queue::current("retriers").unwrap();
        let asked = Arc::new(AtomicUsize::new(0));
        let counter = asked.clone();
        let chain: Arc<[Arc<dyn Retrier>]> = vec![Arc::new(RetrierFn::new("always", move |_: &RetryContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            RetryDirective::Retry(Duration::ZERO)
        })) as Arc<dyn Retrier>]
        .into();

        let decision = execute_retrier_chain(&q, chain, policy(3), context(Error::Cancelled, 0)).await.unwrap();
        assert!(matches!(decision, RetryDecision::DoNotRetry(Error::Cancelled)));
        assert_eq!(asked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_opinion_wins() {
        let q = Queue::current("retriers").unwrap();
        let later = Arc::new(AtomicUsize::new(0));
        let counter = later.clone();
        let chain: Arc<[Arc<dyn Retrier>]> = vec![
            Arc::new(RetrierFn::new("pass", |_: &RetryContext| RetryDirective::EvaluateNext)) as Arc<dyn Retrier>,
            Arc::new(RetrierFn::new("fail", |_: &RetryContext| RetryDirective::Fail(None))) as Arc<dyn Retrier>,
            Arc::new(RetrierFn::new("unreached", move |_: &RetryContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                RetryDirective::Retry(Duration::ZERO)
            })) as Arc<dyn Retrier>,
        ]
        .into();

        let decision = execute_retrier_chain(&q, chain, policy(3), context(Error::Timeout, 0)).await.unwrap();
        assert!(matches!(decision, RetryDecision::DoNotRetry(Error::Timeout)));
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ceiling_overrides_eager_retriers() {
        let q = Queue::current("retriers").unwrap();
        let chain: Arc<[Arc<dyn Retrier>]> =
            vec![Arc::new(RetrierFn::new("eager", |_: &RetryContext| RetryDirective::Retry(Duration::ZERO))) as Arc<dyn Retrier>]
                .into();

        let decision = execute_retrier_chain(&q, chain, policy(1), context(Error::Timeout, 8)).await.unwrap();
        assert!(matches!(decision, RetryDecision::DoNotRetry(Error::RetryExhausted { attempts: 8, .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn status_retrier_matches_listed_codes() {
        let q = Queue::current("retriers").unwrap();
        let retrier = StatusRetrier::new(vec![503], Duration::from_millis(5));

        let busy = Error::HttpStatus {
            status: 503,
            url: String::new(),
        };
        let directive = retrier.retry(&context(busy, 0), &q).await.unwrap();
        assert!(matches!(directive, RetryDirective::Retry(d) if d == Duration::from_millis(5)));

        let directive = retrier.retry(&context(Error::Timeout, 0), &q).await.unwrap();
        assert!(matches!(directive, RetryDirective::EvaluateNext));
    }
}
