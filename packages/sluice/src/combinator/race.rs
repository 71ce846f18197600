// combinators for racing channels against each other and against the clock.

use super::Signal;
use crate::{
    Chan,
    error::WouldBlockError,
    future::TakeFut,
    task::{self, TaskKind},
};
use futures::future::select_all;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};


/// Create a channel that receives [`Signal::Done`] once, after `duration`
///
/// The signal is put into a capacity-1 channel and the timer task ends. This is only a producer of
/// data: to impose a deadline on some other operation, race the two with [`select`].
pub fn timeout(duration: Duration) -> Chan<Signal> {
    let out = Chan::bounded(1);
    let send = out.clone();
    task::spawn(TaskKind::Timeout, async move {
        tokio::time::sleep(duration).await;
        send.put(Signal::Done).await;
    });
    out
}

/// Race channels, delivering the first value taken from any of them
///
/// Returns a capacity-1 channel which receives exactly one value. A take is started on every input
/// channel immediately. Once one of them completes, the others are aborted, which leaves their
/// channels untouched: no value is taken from a channel that lost the race.
///
/// With no input channels, the returned channel never receives a value.
pub fn select<T>(channels: &[Chan<T>]) -> Chan<T>
where
    T: Send + 'static,
{
    let out = Chan::bounded(1);
    if channels.is_empty() {
        warn!("select called with no channels, result will never receive a value");
        return out;
    }
    // takes are linked now rather than when the task first runs
    let takes: Vec<TakeFut<T>> = channels.iter().map(Chan::take).collect();
    let send = out.clone();
    task::spawn(TaskKind::Select, async move {
        let (value, winner, losers) = select_all(takes).await;
        trace!(winner, aborted = losers.len(), "select decided");
        drop(losers);
        send.put(value).await;
    });
    out
}

/// Race channels like [`select`], delivering the winning value as a [`Deferred`]
pub fn select_async<T>(channels: &[Chan<T>]) -> Deferred<T>
where
    T: Send + 'static,
{
    Deferred(select(channels).take())
}

/// A value that will be available later
///
/// Created by [`select_async`]. It is a future, and can also be blocked on from a plain thread.
pub struct Deferred<T>(TakeFut<T>);

impl<T> Future for Deferred<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<T> {
        Pin::new(&mut self.get_mut().0).poll(cx)
    }
}

impl<T> Deferred<T> {
    /// Block until the value is available
    ///
    /// Panics if the value was already delivered.
    pub fn block(&mut self) -> T {
        self.0.block()
    }

    /// Block until the value is available or a timeout elapses
    ///
    /// Panics if the value was already delivered.
    pub fn block_timeout(&mut self, timeout: Duration) -> Result<T, WouldBlockError> {
        self.0.block_timeout(timeout)
    }

    /// Whether the value was already delivered
    pub fn is_terminated(&self) -> bool {
        self.0.is_terminated()
    }
}

impl<T> futures::future::FusedFuture for Deferred<T> {
    fn is_terminated(&self) -> bool {
        Self::is_terminated(self)
    }
}
