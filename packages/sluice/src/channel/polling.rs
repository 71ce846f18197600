// internal future polling system for channel.
//
// design based on pollster crate. the waker is an Arc around a mutex + condvar signal, so that a
// waker cloned into a channel's node queue may safely outlive the blocking call.

use std::{
    future::Future,
    sync::{Arc, Condvar, Mutex, PoisonError},
    task::{Context, Poll, Wake, Waker},
    time::Instant,
    pin::Pin,
};


// timeout for blocking on a future.
pub(crate) enum Timeout {
    // never time out.
    Never,
    // time out at the given deadline.
    At(Instant),
    // time out if the future cannot be resolved without blocking.
    NonBlocking,
}

// poll the future until it resolves or the timeout is reached, in which case return none.
//
// the future is left unresolved (but still valid) if this returns none.
pub(crate) fn poll<F>(fut: &mut F, timeout: Timeout) -> Option<F::Output>
where
    F: Future + Unpin,
{
    let signal = Arc::new(Signal {
        state: Mutex::new(State::Empty),
        cond: Condvar::new(),
    });
    let waker = Waker::from(Arc::clone(&signal));
    let mut cx = Context::from_waker(&waker);

    loop {
        // return if ready
        if let Poll::Ready(output) = Pin::new(&mut *fut).poll(&mut cx) {
            return Some(output);
        }

        // otherwise, block until notification or timeout
        let mut lock = signal.state.lock().unwrap_or_else(PoisonError::into_inner);

        // if a notification is already present, skip to the next loop iteration so as to release
        // the lock and try polling again without blocking.
        if let State::Notified = *lock {
            *lock = State::Empty;
            continue;
        }

        // otherwise, actually block until notification or timeout
        debug_assert!(matches!(*lock, State::Empty));
        *lock = State::Waiting;
        match timeout {
            // block on mutex + condvar indefinitely
            Timeout::Never =>
                while let State::Waiting = *lock {
                    lock = signal.cond.wait(lock).unwrap_or_else(PoisonError::into_inner);
                },

            // block on mutex + condvar until deadline, at which point return none
            Timeout::At(deadline) =>
                while let State::Waiting = *lock {
                    let Some(duration) = deadline.checked_duration_since(Instant::now())
                        else { return None };
                    let (lock2, wait_result) = signal.cond.wait_timeout(lock, duration)
                        .unwrap_or_else(PoisonError::into_inner);
                    lock = lock2;
                    if wait_result.timed_out() && matches!(*lock, State::Waiting) {
                        return None;
                    }
                },

            // dont block on mutex + condvar, return none instead
            Timeout::NonBlocking => return None,
        }
        *lock = State::Empty;
    }
}

// synchronization signal state
enum State {
    Empty,
    Waiting,
    Notified,
}

// synchronization signal
struct Signal {
    state: Mutex<State>,
    cond: Condvar,
}

impl Wake for Signal {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let mut lock = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *lock {
            State::Notified => (),
            State::Empty => {
                *lock = State::Notified;
            }
            State::Waiting => {
                *lock = State::Empty;
                self.cond.notify_one();
            }
        }
    }
}
