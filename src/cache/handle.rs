use core::convert::Infallible;
use core::fmt;
use core::future::Future;
use core::mem;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::sync::{Arc, Mutex};

use futures_lite::future::{Boxed, FutureExt};
use log::trace;

use crate::utils::Notifier;

type Factory<V, E> = Box<dyn FnOnce() -> Boxed<Result<V, E>> + Send>;

/// The lifecycle of a shared computation.
enum State<V, E> {
    /// The factory has not been invoked yet.
    Idle(Factory<V, E>),
    /// The computation has started and is parked between polls.
    Running(Boxed<Result<V, E>>),
    /// Some handle has taken the computation out to poll it.
    Polling,
    /// The computation finished; the outcome is replayed to every awaiter.
    Ready(Result<V, E>),
    /// The computation panicked while it was being polled.
    Poisoned,
}

impl<V, E> State<V, E> {
    fn name(&self) -> &'static str {
        match self {
            State::Idle(_) => "Idle",
            State::Running(_) | State::Polling => "Pending",
            State::Ready(Ok(_)) => "Ready(Ok)",
            State::Ready(Err(_)) => "Ready(Err)",
            State::Poisoned => "Poisoned",
        }
    }
}

/// State co-owned by every [`Handle`] of one computation, and by the cache
/// map for as long as the entry is discoverable.
pub(crate) struct Shared<V, E> {
    state: Mutex<State<V, E>>,
    notifier: Arc<Notifier>,
}

impl<V, E> Shared<V, E> {
    pub(crate) fn new<F, Fut>(factory: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        V: Send + 'static,
        E: Send + 'static,
    {
        Self {
            state: Mutex::new(State::Idle(Box::new(move || factory().boxed()))),
            notifier: Notifier::new(),
        }
    }

    /// Whether the computation can still produce an outcome.
    pub(crate) fn is_pending(&self) -> bool {
        matches!(
            *self.state.lock().unwrap(),
            State::Idle(_) | State::Running(_) | State::Polling
        )
    }

    fn is_ready(&self) -> bool {
        matches!(*self.state.lock().unwrap(), State::Ready(_))
    }
}

/// Marks the computation as poisoned if polling it unwinds.
struct PoisonGuard<'a, V, E> {
    shared: &'a Shared<V, E>,
    armed: bool,
}

impl<V, E> Drop for PoisonGuard<'_, V, E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.shared.state.lock() {
            *state = State::Poisoned;
        }
        self.shared.notifier.wake_all();
    }
}

/// A shareable reference to a single-flight computation.
///
/// Awaiting a handle drives the underlying computation. Every handle of the
/// same computation, including ones created after it finished, resolves to
/// the same outcome; the factory runs at most once.
///
/// The computation starts lazily, on the first poll of any of its handles.
/// From then on it is driven by whichever handle is being polled, so
/// dropping the handle that started it hands progress over to the remaining
/// waiters rather than cancelling it. The computation itself is only dropped
/// once every handle is gone and no cache can discover it anymore.
///
/// A handle may be polled again after it completed; it keeps returning a
/// clone of the stored outcome.
///
/// # Examples
///
/// ```
/// use futures_functools::cache::Handle;
/// use futures_lite::future::block_on;
///
/// block_on(async {
///     let handle: Handle<u32> = Handle::new(|| async { Ok(12) });
///     let other = handle.clone();
///
///     assert_eq!(handle.await, Ok(12));
///     assert!(other.is_ready());
///     assert_eq!(other.await, Ok(12));
/// });
/// ```
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Handle<V, E = Infallible> {
    shared: Arc<Shared<V, E>>,
    waker_key: Option<usize>,
}

impl<V, E> Handle<V, E> {
    /// Create a free-standing handle around `factory`.
    ///
    /// The factory is not invoked until the handle, or one of its clones, is
    /// first polled.
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        V: Send + 'static,
        E: Send + 'static,
    {
        Self::from_shared(Arc::new(Shared::new(factory)))
    }

    pub(crate) fn from_shared(shared: Arc<Shared<V, E>>) -> Self {
        Self {
            shared,
            waker_key: None,
        }
    }

    /// Returns `true` once the computation has produced its outcome.
    ///
    /// This never drives the computation.
    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    /// Returns a clone of the outcome if the computation has finished,
    /// without driving it.
    pub fn peek(&self) -> Option<Result<V, E>>
    where
        V: Clone,
        E: Clone,
    {
        match &*self.shared.state.lock().unwrap() {
            State::Ready(output) => Some(output.clone()),
            _ => None,
        }
    }

    /// Returns `true` if both handles refer to the same computation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn release(&mut self) {
        if let Some(key) = self.waker_key.take() {
            self.shared.notifier.unregister(key);
        }
    }
}

impl<V, E> Clone for Handle<V, E> {
    fn clone(&self) -> Self {
        Self::from_shared(self.shared.clone())
    }
}

impl<V, E> PartialEq for Handle<V, E> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<V, E> Eq for Handle<V, E> {}

impl<V, E> fmt::Debug for Handle<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock().unwrap().name();
        f.debug_struct("Handle")
            .field("state", &state)
            .field("refs", &Arc::strong_count(&self.shared))
            .finish()
    }
}

impl<V, E> Future for Handle<V, E>
where
    V: Clone,
    E: Clone,
{
    type Output = Result<V, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let shared = Arc::clone(&this.shared);

        let mut state = shared.state.lock().unwrap();
        let mut future = match mem::replace(&mut *state, State::Polling) {
            State::Ready(output) => {
                let out = output.clone();
                *state = State::Ready(output);
                drop(state);
                this.release();
                return Poll::Ready(out);
            }
            State::Polling => {
                // Another handle is driving the computation right now; it
                // wakes us once it is done or parks it again.
                shared.notifier.register(&mut this.waker_key, cx.waker());
                return Poll::Pending;
            }
            State::Poisoned => {
                *state = State::Poisoned;
                drop(state);
                panic!("single-flight computation panicked while being polled");
            }
            State::Running(future) => {
                shared.notifier.register(&mut this.waker_key, cx.waker());
                drop(state);
                future
            }
            State::Idle(factory) => {
                shared.notifier.register(&mut this.waker_key, cx.waker());
                drop(state);
                trace!("starting single-flight computation");
                let mut guard = PoisonGuard {
                    shared: &shared,
                    armed: true,
                };
                let future = factory();
                guard.armed = false;
                future
            }
        };

        // Poll with the fan-out waker so progress reaches every waiter, not
        // only the one which happens to be driving.
        let waker = Waker::from(Arc::clone(&shared.notifier));
        let mut guard = PoisonGuard {
            shared: &shared,
            armed: true,
        };
        let poll = future.as_mut().poll(&mut Context::from_waker(&waker));
        guard.armed = false;

        let mut state = shared.state.lock().unwrap();
        match poll {
            Poll::Ready(output) => {
                *state = State::Ready(output.clone());
                drop(state);
                trace!(
                    "single-flight computation completed, waking {} waiters",
                    shared.notifier.waiters()
                );
                shared.notifier.wake_all();
                this.release();
                Poll::Ready(output)
            }
            Poll::Pending => {
                *state = State::Running(future);
                Poll::Pending
            }
        }
    }
}

impl<V, E> Drop for Handle<V, E> {
    fn drop(&mut self) {
        self.release();
        // A parked computation may have woken this handle right before it
        // was dropped. Pass the turn on so the remaining waiters keep
        // driving it.
        let parked = matches!(*self.shared.state.lock().unwrap(), State::Running(_));
        if parked {
            self.shared.notifier.wake_all();
        }
    }
}
