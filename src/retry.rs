//! Retry stop conditions and error-classification predicates.
//!
//! Two pieces cooperate here. A [`RetryPredicate`] classifies whether a
//! failure is worth retrying at all. A [`Breaker`] then decides *when to
//! stop*: each retry loop opens a fresh [`BreakerSession`] and drives it
//! once per cycle: [`BreakerSession::notify_attempt`] after a failed
//! attempt, then [`BreakerSession::should_stop`] with the delay the backoff
//! scheduler proposes. How that delay is computed is the scheduler's
//! business; the session only judges it.
//!
//! Breakers compose with the `|` operator:
//!
//! ```
//! use tether::retry::{after_attempt, after_delay};
//! use std::time::Duration;
//!
//! let breaker = after_attempt(3) | after_delay(Duration::from_secs(10));
//! let mut session = breaker.session();
//!
//! session.notify_attempt();
//! assert!(!session.should_stop(Duration::from_secs(1)));
//! session.notify_attempt();
//! assert!(!session.should_stop(Duration::from_secs(2)));
//! session.notify_attempt();
//! assert!(session.should_stop(Duration::from_secs(4)));
//! ```

use crate::Error;
use std::ops::BitOr;
use std::sync::Arc;
use std::time::Duration;

/// A factory for retry stop sessions.
///
/// Implementations hold the configuration of a stop policy (a threshold,
/// a composition of other conditions) and mint one fresh session per retry
/// loop. Sessions, not conditions, carry the per-loop state.
pub trait StopCondition: Send + Sync {
    /// Creates a fresh session for one retry loop.
    fn session(&self) -> Box<dyn StopSession>;
}

/// A resumable stop predicate driven once per retry cycle.
///
/// Implementations can rely on the two operations arriving in strict
/// alternation: `notify_attempt` first, then `should_stop`. The public
/// [`BreakerSession`] wrapper enforces that ordering before delegating.
pub trait StopSession: Send {
    /// Records that another attempt has completed.
    fn notify_attempt(&mut self);

    /// Answers whether the retry loop should stop, given the delay the
    /// backoff scheduler proposes to wait before the next attempt.
    fn should_stop(&mut self, elapsed_delay: Duration) -> bool;
}

/// A cloneable handle to a stop-condition, used to mint retry sessions.
///
/// Obtain one from [`after_attempt`], [`after_delay`], or [`never`], or by
/// composing two breakers with `|`. The composed breaker stops as soon as
/// either side wants to stop, and always drives both sides so their
/// internal bookkeeping stays in step.
#[derive(Clone)]
pub struct Breaker {
    condition: Arc<dyn StopCondition>,
}

impl Breaker {
    /// Wraps a custom stop-condition in a breaker handle.
    pub fn new(condition: impl StopCondition + 'static) -> Self {
        Self {
            condition: Arc::new(condition),
        }
    }

    /// Opens a fresh session for one retry loop.
    ///
    /// Sessions are never reused across loops; open a new one per request.
    pub fn session(&self) -> BreakerSession {
        BreakerSession {
            inner: self.condition.session(),
            phase: Phase::AwaitingAttempt,
        }
    }
}

impl BitOr for Breaker {
    type Output = Breaker;

    fn bitor(self, rhs: Breaker) -> Breaker {
        Breaker::new(Or {
            left: self.condition,
            right: rhs.condition,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingAttempt,
    AwaitingDelay,
}

/// A two-phase stop-condition session for a single retry loop.
///
/// The two operations must alternate, starting with
/// [`BreakerSession::notify_attempt`]. Calling them out of order is a
/// protocol violation and panics immediately; the phase flag exists so that
/// misuse faults instead of silently corrupting attempt bookkeeping.
pub struct BreakerSession {
    inner: Box<dyn StopSession>,
    phase: Phase,
}

impl BreakerSession {
    /// Records that another attempt has completed.
    ///
    /// # Panics
    ///
    /// Panics if the previous `notify_attempt` has not been answered by a
    /// `should_stop` call yet.
    pub fn notify_attempt(&mut self) {
        if self.phase != Phase::AwaitingAttempt {
            panic!("breaker session protocol violation: notify_attempt called twice without an intervening should_stop");
        }
        self.phase = Phase::AwaitingDelay;
        self.inner.notify_attempt();
    }

    /// Answers whether the retry loop should stop.
    ///
    /// `elapsed_delay` is the delay the external backoff scheduler proposes
    /// to wait before the next attempt.
    ///
    /// # Panics
    ///
    /// Panics if called before `notify_attempt` in the current cycle.
    pub fn should_stop(&mut self, elapsed_delay: Duration) -> bool {
        if self.phase != Phase::AwaitingDelay {
            panic!("breaker session protocol violation: should_stop called before notify_attempt");
        }
        self.phase = Phase::AwaitingAttempt;
        self.inner.should_stop(elapsed_delay)
    }
}

/// Stops retrying once the given number of attempts has completed.
///
/// The session reports `false` for the first `max_attempts - 1` completed
/// attempts and `true` from attempt `max_attempts` on.
///
/// # Examples
///
/// ```
/// use tether::retry::after_attempt;
/// use std::time::Duration;
///
/// let mut session = after_attempt(2).session();
/// session.notify_attempt();
/// assert!(!session.should_stop(Duration::ZERO));
/// session.notify_attempt();
/// assert!(session.should_stop(Duration::ZERO));
/// ```
pub fn after_attempt(max_attempts: usize) -> Breaker {
    Breaker::new(AfterAttempt { max_attempts })
}

/// Stops retrying once the proposed delay strictly exceeds `max_delay`.
///
/// # Examples
///
/// ```
/// use tether::retry::after_delay;
/// use std::time::Duration;
///
/// let mut session = after_delay(Duration::from_secs(10)).session();
/// session.notify_attempt();
/// assert!(!session.should_stop(Duration::from_secs(5)));
/// session.notify_attempt();
/// assert!(session.should_stop(Duration::from_secs(15)));
/// ```
pub fn after_delay(max_delay: Duration) -> Breaker {
    Breaker::new(AfterDelay { max_delay })
}

/// Never stops retrying; the default/disabled policy.
pub fn never() -> Breaker {
    Breaker::new(NeverStop)
}

struct AfterAttempt {
    max_attempts: usize,
}

impl StopCondition for AfterAttempt {
    fn session(&self) -> Box<dyn StopSession> {
        Box::new(AfterAttemptSession {
            max_attempts: self.max_attempts,
            attempts: 0,
        })
    }
}

struct AfterAttemptSession {
    max_attempts: usize,
    attempts: usize,
}

impl StopSession for AfterAttemptSession {
    fn notify_attempt(&mut self) {
        self.attempts += 1;
    }

    fn should_stop(&mut self, _elapsed_delay: Duration) -> bool {
        self.attempts >= self.max_attempts
    }
}

struct AfterDelay {
    max_delay: Duration,
}

impl StopCondition for AfterDelay {
    fn session(&self) -> Box<dyn StopSession> {
        Box::new(AfterDelaySession {
            max_delay: self.max_delay,
        })
    }
}

struct AfterDelaySession {
    max_delay: Duration,
}

impl StopSession for AfterDelaySession {
    fn notify_attempt(&mut self) {}

    fn should_stop(&mut self, elapsed_delay: Duration) -> bool {
        elapsed_delay > self.max_delay
    }
}

struct NeverStop;

impl StopCondition for NeverStop {
    fn session(&self) -> Box<dyn StopSession> {
        Box::new(NeverStopSession)
    }
}

struct NeverStopSession;

impl StopSession for NeverStopSession {
    fn notify_attempt(&mut self) {}

    fn should_stop(&mut self, _elapsed_delay: Duration) -> bool {
        false
    }
}

struct Or {
    left: Arc<dyn StopCondition>,
    right: Arc<dyn StopCondition>,
}

impl StopCondition for Or {
    fn session(&self) -> Box<dyn StopSession> {
        Box::new(OrSession {
            left: self.left.session(),
            right: self.right.session(),
        })
    }
}

struct OrSession {
    left: Box<dyn StopSession>,
    right: Box<dyn StopSession>,
}

impl StopSession for OrSession {
    fn notify_attempt(&mut self) {
        self.left.notify_attempt();
        self.right.notify_attempt();
    }

    fn should_stop(&mut self, elapsed_delay: Duration) -> bool {
        // Both children answer every cycle, even after one has signaled
        // stop, so their attempt counters stay in step.
        let left = self.left.should_stop(elapsed_delay);
        let right = self.right.should_stop(elapsed_delay);
        left || right
    }
}

/// Trait for determining whether a failed request should be retried.
///
/// Implement this trait to create custom retry classification based on the
/// error type, response status, or any other criteria. The breaker algebra
/// decides when retrying stops; predicates decide whether a particular
/// failure is worth retrying in the first place.
///
/// # Examples
///
/// ```
/// use tether::{Error, retry::RetryPredicate};
///
/// struct RetryOnRateLimit;
///
/// impl RetryPredicate for RetryOnRateLimit {
///     fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
///         matches!(
///             error,
///             Error::HttpError { status, .. } if status.as_u16() == 429
///         )
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Determines whether the request should be retried based on the error.
    ///
    /// `attempt` is the attempt number (1-indexed).
    fn should_retry(&self, error: &Error, attempt: usize) -> bool;
}

/// Retry all errors that are marked as retryable.
///
/// This uses [`Error::is_retryable`], which returns `true` for transport
/// errors, timeouts, 5xx HTTP errors, and HTTP 429.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnRetryable;

impl RetryPredicate for RetryOnRetryable {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.is_retryable()
    }
}

/// Retry only on 5xx server errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOn5xx;

impl RetryPredicate for RetryOn5xx {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::HttpError { status, .. } if status.is_server_error())
    }
}

/// Retry only on timeout errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnTimeout;

impl RetryPredicate for RetryOnTimeout {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Timeout)
    }
}
