//! Completion token for outbound pipeline operations.
//!
//! A token is a producer/consumer pair: the [`Promise`] half is handed down
//! the chain with the operation and is fulfilled by whichever handler
//! actually performs it; the [`Completion`] half is returned to the caller
//! immediately and can be observed any number of times.

use crate::error::{BoxError, CompletionError};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

enum State {
    Pending { wakers: Vec<Waker> },
    Done(Result<(), CompletionError>),
}

/// The producer half of a completion token.
///
/// `fulfill` and `fail` take `self` by value, so a token can only ever be
/// completed once; the type system enforces the exactly-once contract.
/// Dropping an uncompleted promise leaves every observer pending forever —
/// the outbound contract requires whichever handler performs the operation
/// to complete the token it was given.
pub struct Promise {
    state: Rc<RefCell<State>>,
}

impl Promise {
    /// Create a new, uncompleted token.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Pending { wakers: Vec::new() })),
        }
    }

    /// The consumer half of this token.
    ///
    /// May be called any number of times before the promise is consumed;
    /// every handle observes the same eventual result.
    pub fn completion(&self) -> Completion {
        Completion {
            state: Rc::clone(&self.state),
        }
    }

    /// Complete the token successfully.
    pub fn fulfill(self) {
        self.finish(Ok(()));
    }

    /// Complete the token with a failure.
    pub fn fail(self, err: BoxError) {
        self.finish(Err(CompletionError::new(err)));
    }

    fn finish(self, result: Result<(), CompletionError>) {
        let wakers = {
            let mut state = self.state.borrow_mut();
            let State::Pending { wakers } = &mut *state else {
                // Unreachable: only `finish` writes `Done`, and it consumes
                // the sole producer.
                return;
            };
            let wakers = std::mem::take(wakers);
            *state = State::Done(result);
            wakers
        };
        for waker in wakers {
            waker.wake();
        }
    }
}

impl Default for Promise {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Promise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

/// The consumer half of a completion token.
///
/// Cloning is O(1); every clone observes the same result. `Completion`
/// implements [`Future`], and [`result`](Completion::result) offers a
/// non-blocking peek for callers that do not want to suspend.
#[derive(Clone)]
pub struct Completion {
    state: Rc<RefCell<State>>,
}

impl Completion {
    /// The result, if the token has been completed yet.
    pub fn result(&self) -> Option<Result<(), CompletionError>> {
        match &*self.state.borrow() {
            State::Pending { .. } => None,
            State::Done(result) => Some(result.clone()),
        }
    }

    /// Returns `true` once the token has been completed, either way.
    pub fn is_done(&self) -> bool {
        matches!(&*self.state.borrow(), State::Done(_))
    }
}

impl Future for Completion {
    type Output = Result<(), CompletionError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            State::Done(result) => Poll::Ready(result.clone()),
            State::Pending { wakers } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("done", &self.is_done())
            .finish()
    }
}
