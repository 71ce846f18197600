//! Channels and the combinators that wire them together.
//!
//! A [`Chan`] is a shared FIFO queue, bounded or unbounded, whose puts and takes are futures that
//! can also be blocked on from a plain thread. Combinators build a graph of channels by spawning
//! background tasks onto a shared [runtime] that move values between them:
//!
//! ```
//! use sluice::{map, returned, filter, Chan};
//!
//! let doubled = map(|x: i32| x * 2, &returned(21));
//! assert_eq!(doubled.take().block(), 42);
//!
//! let numbers = Chan::unbounded();
//! let odd = filter(|x: &i32| x % 2 == 1, &numbers);
//! for i in 0..4 {
//!     numbers.try_put(i).unwrap();
//! }
//! assert_eq!(odd.take().block(), 1);
//! assert_eq!(odd.take().block(), 3);
//! ```
//!
//! Channels are never closed. Background tasks loop until the process exits, and a task whose
//! supplied function panics just stops. See [`task`] for how to observe both.

#[macro_use]
extern crate tracing;

mod channel;
mod combinator;
pub mod runtime;
pub mod task;

pub use crate::{
    channel::api::Chan,
    combinator::{
        Signal,
        returned,
        go,
        go_run,
        go_async,
        go_loop,
        map,
        filter,
        chunk,
        bind,
        timeout,
        select,
        select_async,
    },
};

/// Error types
pub mod error {
    pub use crate::{
        channel::error::*,
        runtime::InitError,
        task::TaskFailure,
    };
}

/// Future types
pub mod future {
    pub use crate::{
        channel::api::future::*,
        combinator::race::Deferred,
    };
}
