use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use tracing::trace;

use crate::err::ForceError;
use crate::policy::FailurePolicy;
use crate::state::Status;

type OnceThunk<T, E> = Box<dyn FnOnce() -> Result<T, E>>;
type RetryThunk<T, E> = Box<dyn FnMut() -> Result<T, E>>;

enum Thunk<T, E> {
    Once(OnceThunk<T, E>),
    Retry(RetryThunk<T, E>),
}

enum State<T, E> {
    Pending(Thunk<T, E>),
    InProgress,
    Done,
    Failed(Rc<E>),
    Poisoned,
}

impl<T, E> State<T, E> {
    fn status(&self) -> Status {
        match self {
            State::Pending(_) => Status::Pending,
            State::InProgress => Status::InProgress,
            State::Done => Status::Done,
            State::Failed(_) => Status::Failed,
            State::Poisoned => Status::Poisoned,
        }
    }
}

/// Marks the cell poisoned if the thunk unwinds.
struct UnwindGuard<'a, T, E>(&'a RefCell<State<T, E>>);

impl<T, E> Drop for UnwindGuard<'_, T, E> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.try_borrow_mut() {
            *state = State::Poisoned;
        }
    }
}

/// A computation that runs at most once, on first [`force`](Deferred::force).
///
/// The cell is single-threaded. Use [`SyncDeferred`](crate::sync::SyncDeferred)
/// to share one across threads.
pub struct Deferred<T, E = Infallible> {
    value: OnceCell<T>,
    state: RefCell<State<T, E>>,
    policy: FailurePolicy,
}

impl<T, E> Deferred<T, E> {
    pub fn from_value(value: T) -> Self {
        Self {
            value: OnceCell::with_value(value),
            state: RefCell::new(State::Done),
            policy: FailurePolicy::default(),
        }
    }

    /// Defers `f` until the first force. A failure is memoized.
    pub fn from_thunk<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + 'static,
    {
        Self::pending(Thunk::Once(Box::new(f)), FailurePolicy::Memoize)
    }

    pub fn with_policy<F>(policy: FailurePolicy, f: F) -> Self
    where
        F: FnMut() -> Result<T, E> + 'static,
    {
        let thunk = match policy {
            FailurePolicy::Memoize => Thunk::Once(Box::new(f)),
            FailurePolicy::Retry => Thunk::Retry(Box::new(f)),
        };
        Self::pending(thunk, policy)
    }

    pub fn retrying<F>(f: F) -> Self
    where
        F: FnMut() -> Result<T, E> + 'static,
    {
        Self::with_policy(FailurePolicy::Retry, f)
    }

    fn pending(thunk: Thunk<T, E>, policy: FailurePolicy) -> Self {
        Self {
            value: OnceCell::new(),
            state: RefCell::new(State::Pending(thunk)),
            policy,
        }
    }

    /// Forcing a cell from inside its own thunk returns
    /// [`ForceError::Recursive`].
    pub fn force(&self) -> Result<&T, ForceError<Rc<E>>> {
        if let Some(v) = self.value.get() {
            return Ok(v);
        }
        let thunk = match self.state.replace(State::InProgress) {
            State::Pending(thunk) => thunk,
            State::InProgress => return Err(ForceError::Recursive),
            settled => {
                // Only a done cell holds a value.
                let out = match &settled {
                    State::Failed(e) => Err(ForceError::Computation(Rc::clone(e))),
                    _ => self.value.get().ok_or(ForceError::Poisoned),
                };
                self.state.replace(settled);
                return out;
            }
        };

        trace!(policy = %self.policy, "forcing deferred value");
        let guard = UnwindGuard(&self.state);
        let (res, retry) = match thunk {
            Thunk::Once(f) => (f(), None),
            Thunk::Retry(mut f) => {
                let res = f();
                (res, Some(f))
            }
        };
        std::mem::forget(guard);

        match (res, retry) {
            (Ok(v), _) => {
                self.state.replace(State::Done);
                trace!("deferred value computed");
                Ok(self.value.get_or_init(|| v))
            }
            (Err(e), Some(f)) => {
                self.state.replace(State::Pending(Thunk::Retry(f)));
                trace!("deferred computation failed, thunk kept for retry");
                Err(ForceError::Computation(Rc::new(e)))
            }
            (Err(e), None) => {
                let e = Rc::new(e);
                self.state.replace(State::Failed(Rc::clone(&e)));
                trace!("deferred computation failed, failure memoized");
                Err(ForceError::Computation(e))
            }
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    pub fn is_done(&self) -> bool {
        self.value.get().is_some()
    }

    pub fn status(&self) -> Status {
        self.state.borrow().status()
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn into_inner(self) -> Option<T> {
        self.value.into_inner()
    }
}

impl<T> Deferred<T, Infallible> {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() -> T + 'static,
    {
        Self::from_thunk(move || Ok(f()))
    }
}

impl<T, E> From<T> for Deferred<T, E> {
    fn from(value: T) -> Self {
        Self::from_value(value)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Deferred");
        d.field("status", &self.status());
        if let Some(v) = self.value.get() {
            d.field("value", v);
        }
        d.field("policy", &self.policy).finish()
    }
}
