// combinators that originate values rather than transforming a channel.

use super::Signal;
use crate::{
    Chan,
    task::{self, TaskKind},
};
use std::{
    future::Future,
    thread,
};


/// Create a channel pre-loaded with exactly one value
///
/// No task is spawned. The first take succeeds immediately, and any further take blocks forever.
pub fn returned<T>(value: T) -> Chan<T> {
    Chan::holding(value)
}

/// Run a computation once in the background and deliver its result
///
/// The supplier runs on a blocking thread, so it may block. The result is put into a capacity-1
/// channel, after which the task ends. If the supplier panics, the channel never receives a value.
pub fn go<T, F>(f: F) -> Chan<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let out = Chan::bounded(1);
    let send = out.clone();
    task::spawn_blocking(TaskKind::Go, move || {
        let value = f();
        send.put(value).block();
    });
    out
}

/// Run an effect once in the background and signal when it is done
///
/// Like [`go`], but delivers [`Signal::Done`] into an unbounded channel.
pub fn go_run<F>(f: F) -> Chan<Signal>
where
    F: FnOnce() + Send + 'static,
{
    let out = Chan::unbounded();
    let send = out.clone();
    task::spawn_blocking(TaskKind::GoRun, move || {
        f();
        send.put(Signal::Done).block();
    });
    out
}

/// Drive a future once in the background and deliver its output
///
/// The async counterpart of [`go`]: the future runs on the async workers, so it must not block.
pub fn go_async<Fut>(fut: Fut) -> Chan<Fut::Output>
where
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let out = Chan::bounded(1);
    let send = out.clone();
    task::spawn(TaskKind::GoAsync, async move {
        let value = fut.await;
        send.put(value).await;
    });
    out
}

/// Run an effect repeatedly in the background, forever
///
/// Yields the thread between iterations. There is no channel and no way to stop it. The effect runs
/// on a dedicated thread which it occupies for the rest of the process, so it may block. These
/// threads are separate from the runtime's blocking threads, so any number of loops can run without
/// holding up [`go`] or [`go_run`].
pub fn go_loop<F>(mut f: F)
where
    F: FnMut() + Send + 'static,
{
    task::spawn_thread(TaskKind::GoLoop, move || loop {
        f();
        thread::yield_now();
    });
}
