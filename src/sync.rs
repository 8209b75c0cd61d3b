use std::convert::Infallible;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::trace;

use crate::err::ForceError;
use crate::policy::FailurePolicy;
use crate::state::Status;

type OnceThunk<T, E> = Box<dyn FnOnce() -> Result<T, E> + Send>;
type RetryThunk<T, E> = Box<dyn FnMut() -> Result<T, E> + Send>;

enum Thunk<T, E> {
    Once(OnceThunk<T, E>),
    Retry(RetryThunk<T, E>),
}

enum State<T, E> {
    Pending(Thunk<T, E>),
    InProgress(ThreadId),
    Done,
    Failed(Arc<E>),
    Poisoned,
}

impl<T, E> State<T, E> {
    fn status(&self) -> Status {
        match self {
            State::Pending(_) => Status::Pending,
            State::InProgress(_) => Status::InProgress,
            State::Done => Status::Done,
            State::Failed(_) => Status::Failed,
            State::Poisoned => Status::Poisoned,
        }
    }
}

struct UnwindGuard<'a, T, E>(&'a SyncDeferred<T, E>);

impl<T, E> Drop for UnwindGuard<'_, T, E> {
    fn drop(&mut self) {
        *self.0.state.lock() = State::Poisoned;
        self.0.published.notify_all();
    }
}

/// A thread-safe [`Deferred`](crate::deferred::Deferred). The first thread to
/// force it runs the thunk; the others block until the outcome is published.
///
/// Blocking is on the cell's own condition variable, so a thunk that waits
/// on another thread which forces the same cell will deadlock. Forcing the
/// cell again from the thread running its thunk is detected and reported as
/// [`ForceError::Recursive`].
pub struct SyncDeferred<T, E = Infallible> {
    value: OnceCell<T>,
    state: Mutex<State<T, E>>,
    published: Condvar,
    policy: FailurePolicy,
}

impl<T, E> SyncDeferred<T, E> {
    pub fn from_value(value: T) -> Self {
        Self {
            value: OnceCell::with_value(value),
            state: Mutex::new(State::Done),
            published: Condvar::new(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn from_thunk<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        Self::pending(Thunk::Once(Box::new(f)), FailurePolicy::Memoize)
    }

    pub fn with_policy<F>(policy: FailurePolicy, f: F) -> Self
    where
        F: FnMut() -> Result<T, E> + Send + 'static,
    {
        let thunk = match policy {
            FailurePolicy::Memoize => Thunk::Once(Box::new(f)),
            FailurePolicy::Retry => Thunk::Retry(Box::new(f)),
        };
        Self::pending(thunk, policy)
    }

    pub fn retrying<F>(f: F) -> Self
    where
        F: FnMut() -> Result<T, E> + Send + 'static,
    {
        Self::with_policy(FailurePolicy::Retry, f)
    }

    fn pending(thunk: Thunk<T, E>, policy: FailurePolicy) -> Self {
        Self {
            value: OnceCell::new(),
            state: Mutex::new(State::Pending(thunk)),
            published: Condvar::new(),
            policy,
        }
    }

    /// Under [`FailurePolicy::Retry`] a failure puts the thunk back and wakes
    /// the waiters, and the first of them to reacquire the lock makes the
    /// next attempt.
    pub fn force(&self) -> Result<&T, ForceError<Arc<E>>> {
        if let Some(v) = self.value.get() {
            return Ok(v);
        }
        let me = thread::current().id();
        let mut state = self.state.lock();
        let thunk = loop {
            match mem::replace(&mut *state, State::InProgress(me)) {
                State::Pending(thunk) => break thunk,
                State::InProgress(owner) => {
                    *state = State::InProgress(owner);
                    if owner == me {
                        return Err(ForceError::Recursive);
                    }
                    trace!(?owner, "waiting for deferred value");
                    self.published.wait(&mut state);
                }
                settled => {
                    let out = match &settled {
                        State::Failed(e) => Err(ForceError::Computation(Arc::clone(e))),
                        _ => self.value.get().ok_or(ForceError::Poisoned),
                    };
                    *state = settled;
                    return out;
                }
            }
        };

        trace!(policy = %self.policy, "forcing deferred value");
        let (res, retry) = MutexGuard::unlocked(&mut state, || {
            let guard = UnwindGuard(self);
            let out = match thunk {
                Thunk::Once(f) => (f(), None),
                Thunk::Retry(mut f) => {
                    let res = f();
                    (res, Some(f))
                }
            };
            mem::forget(guard);
            out
        });

        let out = match (res, retry) {
            (Ok(v), _) => {
                let v = self.value.get_or_init(|| v);
                *state = State::Done;
                trace!("deferred value published");
                Ok(v)
            }
            (Err(e), Some(f)) => {
                *state = State::Pending(Thunk::Retry(f));
                trace!("deferred computation failed, thunk kept for retry");
                Err(ForceError::Computation(Arc::new(e)))
            }
            (Err(e), None) => {
                let e = Arc::new(e);
                *state = State::Failed(Arc::clone(&e));
                trace!("deferred computation failed, failure memoized");
                Err(ForceError::Computation(e))
            }
        };
        drop(state);
        self.published.notify_all();
        out
    }

    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    pub fn is_done(&self) -> bool {
        self.value.get().is_some()
    }

    pub fn status(&self) -> Status {
        self.state.lock().status()
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn into_inner(self) -> Option<T> {
        self.value.into_inner()
    }
}

impl<T> SyncDeferred<T, Infallible> {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::from_thunk(move || Ok(f()))
    }
}

impl<T, E> From<T> for SyncDeferred<T, E> {
    fn from(value: T) -> Self {
        Self::from_value(value)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for SyncDeferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("SyncDeferred");
        d.field("status", &self.status());
        if let Some(v) = self.value.get() {
            d.field("value", v);
        }
        d.field("policy", &self.policy).finish()
    }
}
