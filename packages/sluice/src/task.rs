//! Background tasks spawned by combinators.
//!
//! Combinator calls spawn tasks onto the shared [runtime](crate::runtime), or for `go_loop` onto a
//! dedicated thread. Most of them loop forever. Nothing ever stops a looping task, so the number of
//! live tasks grows with each combinator call and with each value `bind` receives. The live tasks
//! are tracked here so that growth can be observed.
//!
//! A task whose user-supplied function panics dies silently as far as channels are concerned: it
//! stops forwarding, and anything waiting on its output channel waits forever. The failure is
//! however logged with `tracing`, and handed to the hook installed with [`set_failure_hook`].

use crate::runtime;
use dashmap::DashMap;
use futures::FutureExt;
use std::{
    any::Any,
    fmt::{self, Display, Formatter},
    future::Future,
    io,
    panic::{catch_unwind, AssertUnwindSafe},
    thread,
    sync::{
        atomic::{AtomicU64, Ordering::Relaxed},
        mpsc,
        Arc,
        LazyLock,
        PoisonError,
        RwLock,
    },
};
use thiserror::Error;
use tracing::Instrument;


static NEXT_ID: AtomicU64 = AtomicU64::new(0);

static LIVE: LazyLock<DashMap<TaskId, TaskKind>> = LazyLock::new(DashMap::new);

static FAILURE_HOOK: RwLock<Option<FailureHook>> = RwLock::new(None);

type FailureHook = Arc<dyn Fn(&TaskFailure) + Send + Sync>;


/// Process-unique identifier of a background task
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// The raw id
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The operation that spawned a background task
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TaskKind {
    /// Runs a supplier once for [`go`](crate::go)
    Go,
    /// Runs an effect once for [`go_run`](crate::go_run)
    GoRun,
    /// Drives a future once for [`go_async`](crate::go_async)
    GoAsync,
    /// Repeats an effect forever for [`go_loop`](crate::go_loop)
    GoLoop,
    /// Loop of [`map`](crate::map)
    Map,
    /// Loop of [`filter`](crate::filter)
    Filter,
    /// Loop of [`chunk`](crate::chunk)
    Chunk,
    /// Outer loop of [`bind`](crate::bind)
    Bind,
    /// Forwarder of one inner channel of [`bind`](crate::bind)
    BindForward,
    /// Timer of [`timeout`](crate::timeout)
    Timeout,
    /// Race of [`select`](crate::select)
    Select,
}

impl TaskKind {
    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::Go => "go",
            TaskKind::GoRun => "go_run",
            TaskKind::GoAsync => "go_async",
            TaskKind::GoLoop => "go_loop",
            TaskKind::Map => "map",
            TaskKind::Filter => "filter",
            TaskKind::Chunk => "chunk",
            TaskKind::Bind => "bind",
            TaskKind::BindForward => "bind_forward",
            TaskKind::Timeout => "timeout",
            TaskKind::Select => "select",
        }
    }

    /// Whether tasks of this kind loop forever rather than finishing after one result
    pub fn loops_forever(self) -> bool {
        match self {
            TaskKind::Go
            | TaskKind::GoRun
            | TaskKind::GoAsync
            | TaskKind::Timeout
            | TaskKind::Select => false,
            TaskKind::GoLoop
            | TaskKind::Map
            | TaskKind::Filter
            | TaskKind::Chunk
            | TaskKind::Bind
            | TaskKind::BindForward => true,
        }
    }
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}


/// Record of a background task dying
///
/// Failures never surface on any channel. See the [module docs](self).
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum TaskFailure {
    /// A function supplied to the combinator panicked
    #[error("{kind} task {id} failed: {message}")]
    Transform {
        /// The task that died
        id: TaskId,
        /// What spawned it
        kind: TaskKind,
        /// The panic message, if it was a string
        message: String,
    },
    /// The task's dedicated thread could not be started, so it never ran
    #[error("{kind} task {id} could not be started: {message}")]
    Spawn {
        /// The task that died
        id: TaskId,
        /// What spawned it
        kind: TaskKind,
        /// The error given by the operating system
        message: String,
    },
    /// The task was dropped while waiting on a channel, before it could finish
    #[error("{kind} task {id} was dropped while waiting")]
    InterruptedWait {
        /// The task that died
        id: TaskId,
        /// What spawned it
        kind: TaskKind,
    },
}

impl TaskFailure {
    /// The task that died
    pub fn id(&self) -> TaskId {
        match *self {
            TaskFailure::Transform { id, .. }
            | TaskFailure::Spawn { id, .. }
            | TaskFailure::InterruptedWait { id, .. } => id,
        }
    }

    /// What spawned the task that died
    pub fn kind(&self) -> TaskKind {
        match *self {
            TaskFailure::Transform { kind, .. }
            | TaskFailure::Spawn { kind, .. }
            | TaskFailure::InterruptedWait { kind, .. } => kind,
        }
    }
}


/// Install a process-wide hook called whenever a background task fails
///
/// Replaces any previously installed hook. The hook runs on the thread of the failed task.
pub fn set_failure_hook<F>(hook: F)
where
    F: Fn(&TaskFailure) + Send + Sync + 'static,
{
    *FAILURE_HOOK.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
}

/// Remove the failure hook, if any
pub fn clear_failure_hook() {
    *FAILURE_HOOK.write().unwrap_or_else(PoisonError::into_inner) = None;
}

/// The number of background tasks currently alive
pub fn live_tasks() -> usize {
    LIVE.len()
}

/// The number of background tasks of the given kind currently alive
pub fn live_tasks_of(kind: TaskKind) -> usize {
    LIVE.iter().filter(|entry| *entry.value() == kind).count()
}

/// Whether the given task is still alive
pub fn is_live(id: TaskId) -> bool {
    LIVE.contains_key(&id)
}

// log the failure and hand it to the hook.
fn report(failure: TaskFailure) {
    match failure {
        TaskFailure::Transform { .. } | TaskFailure::Spawn { .. } => error!(
            task.id = failure.id().as_u64(),
            task.kind = %failure.kind(),
            "{}", failure
        ),
        // expected for every looping task when its runtime is torn down
        TaskFailure::InterruptedWait { .. } => debug!(
            task.id = failure.id().as_u64(),
            task.kind = %failure.kind(),
            "{}", failure
        ),
    }
    let hook = FAILURE_HOOK.read().unwrap_or_else(PoisonError::into_inner).clone();
    if let Some(hook) = hook {
        hook(&failure);
    }
}

// best-effort extraction of a panic payload's message.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(&s) = payload.downcast_ref::<&'static str>() {
        s.to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

// registry entry for a live task.
//
// removes the task from the registry when dropped, and reports an interrupted wait if that happens
// before the task finished.
struct TaskGuard {
    id: TaskId,
    kind: TaskKind,
    finished: bool,
}

impl TaskGuard {
    fn register(kind: TaskKind) -> Self {
        let id = TaskId(NEXT_ID.fetch_add(1, Relaxed));
        LIVE.insert(id, kind);
        trace!(task.id = id.as_u64(), task.kind = %kind, "spawning task");
        TaskGuard { id, kind, finished: false }
    }

    fn finish(mut self, result: Result<(), Box<dyn Any + Send>>) {
        self.finished = true;
        match result {
            Ok(()) => trace!(task.id = self.id.as_u64(), task.kind = %self.kind, "task finished"),
            Err(payload) => report(TaskFailure::Transform {
                id: self.id,
                kind: self.kind,
                message: panic_message(&*payload),
            }),
        }
    }

    fn fail_to_start(mut self, error: io::Error) {
        self.finished = true;
        report(TaskFailure::Spawn { id: self.id, kind: self.kind, message: error.to_string() });
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        LIVE.remove(&self.id);
        if !self.finished {
            report(TaskFailure::InterruptedWait { id: self.id, kind: self.kind });
        }
    }
}

// spawn a future onto the async workers of the shared runtime.
pub(crate) fn spawn<F>(kind: TaskKind, fut: F) -> TaskId
where
    F: Future<Output = ()> + Send + 'static,
{
    let guard = TaskGuard::register(kind);
    let id = guard.id;
    let span = trace_span!("sluice_task", task.id = id.as_u64(), task.kind = %kind);
    runtime::handle().spawn(
        async move {
            let result = AssertUnwindSafe(fut).catch_unwind().await;
            guard.finish(result);
        }
        .instrument(span),
    );
    id
}

// spawn a closure onto the blocking threads of the shared runtime.
pub(crate) fn spawn_blocking<F>(kind: TaskKind, f: F) -> TaskId
where
    F: FnOnce() + Send + 'static,
{
    let guard = TaskGuard::register(kind);
    let id = guard.id;
    let span = trace_span!("sluice_task", task.id = id.as_u64(), task.kind = %kind);
    runtime::handle().spawn_blocking(move || {
        let _enter = span.enter();
        let result = catch_unwind(AssertUnwindSafe(f));
        guard.finish(result);
    });
    id
}

// spawn a closure onto a dedicated thread of its own, outside the shared runtime.
//
// for closures that never return, which would otherwise hold a runtime blocking thread forever.
pub(crate) fn spawn_thread<F>(kind: TaskKind, f: F) -> TaskId
where
    F: FnOnce() + Send + 'static,
{
    let guard = TaskGuard::register(kind);
    let id = guard.id;
    let span = trace_span!("sluice_task", task.id = id.as_u64(), task.kind = %kind);
    // the guard is handed over only once the thread exists, so a failed spawn can be reported as
    // such rather than as an interrupted wait
    let (guard_send, guard_recv) = mpsc::sync_channel::<TaskGuard>(1);
    let spawned = thread::Builder::new()
        .name(format!("sluice-{}-{}", kind, id.as_u64()))
        .spawn(move || {
            let Ok(guard) = guard_recv.recv() else { return };
            let _enter = span.enter();
            let result = catch_unwind(AssertUnwindSafe(f));
            guard.finish(result);
        });
    match spawned {
        // the thread is detached. it only stops waiting for the guard if the sender is gone
        Ok(_) => { let _ = guard_send.send(guard); }
        Err(e) => guard.fail_to_start(e),
    }
    id
}
