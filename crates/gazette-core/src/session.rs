//! HTTP session settings with scoped overrides.
//!
//! A process-wide default applies unless an override is active. Overrides
//! come in two flavours:
//!
//! - [`enter`] pushes onto a thread-local stack and returns a guard that pops
//!   on drop. The guard is `!Send`, so it cannot leak onto another thread.
//! - [`scoped`] attaches an override to one future (task-local). It is the
//!   one to use around `.await` points on a multi-threaded runtime.
//!
//! [`current`] returns the innermost active configuration for the calling
//! thread or task; when both kinds are active the most recently entered wins.

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("gazette/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings a fetcher applies to each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Partial settings layered over the active configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOverride {
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl SessionOverride {
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn apply(&self, base: &SessionConfig) -> SessionConfig {
        SessionConfig {
            timeout: self.timeout.unwrap_or(base.timeout),
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| base.user_agent.clone()),
        }
    }
}

static DEFAULT: LazyLock<RwLock<SessionConfig>> =
    LazyLock::new(|| RwLock::new(SessionConfig::default()));

/// Entry order across threads and tasks.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
struct Layer {
    seq: u64,
    config: SessionConfig,
}

impl Layer {
    fn over_current(session: &SessionOverride) -> Self {
        Self {
            seq: SEQUENCE.fetch_add(1, Ordering::Relaxed),
            config: session.apply(&current()),
        }
    }
}

thread_local! {
    static THREAD_STACK: RefCell<Vec<Layer>> = const { RefCell::new(Vec::new()) };
}

tokio::task_local! {
    static TASK_SESSION: Layer;
}

/// Replaces the process-wide default.
pub fn set_default(config: SessionConfig) {
    match DEFAULT.write() {
        Ok(mut guard) => *guard = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

pub fn default_config() -> SessionConfig {
    match DEFAULT.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// The configuration visible to the calling thread or task.
pub fn current() -> SessionConfig {
    let task = TASK_SESSION.try_with(Layer::clone).ok();
    let thread = THREAD_STACK.with(|stack| stack.borrow().last().cloned());
    match (task, thread) {
        (Some(task), Some(thread)) if thread.seq > task.seq => thread.config,
        (Some(task), _) => task.config,
        (None, Some(thread)) => thread.config,
        (None, None) => default_config(),
    }
}

/// Applies `session` on the current thread until the guard is dropped.
pub fn enter(session: &SessionOverride) -> SessionGuard {
    let layer = Layer::over_current(session);
    let seq = layer.seq;
    THREAD_STACK.with(|stack| stack.borrow_mut().push(layer));
    SessionGuard {
        seq,
        _not_send: PhantomData,
    }
}

/// Runs `fut` with `session` applied to everything it polls.
pub async fn scoped<F: Future>(session: SessionOverride, fut: F) -> F::Output {
    TASK_SESSION.scope(Layer::over_current(&session), fut).await
}

/// Restores the previous configuration when dropped.
#[must_use = "the override ends as soon as the guard is dropped"]
pub struct SessionGuard {
    seq: u64,
    _not_send: PhantomData<*const ()>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let seq = self.seq;
        // try_with: the thread-local may already be gone during thread teardown.
        let _ = THREAD_STACK.try_with(|stack| stack.borrow_mut().retain(|layer| layer.seq != seq));
    }
}
