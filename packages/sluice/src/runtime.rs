//! The shared scheduler that every combinator task runs on.
//!
//! This is a multi-threaded tokio runtime owned by the crate. It is built on first use, or
//! explicitly by [`init`], and is never shut down: tasks spawned onto it live until the process
//! exits.
//!
//! Channel futures do not depend on this runtime. They may be awaited on any executor, and blocked
//! on from any thread that is not itself an async worker.

use std::{
    io,
    sync::OnceLock,
};
use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime};


static RUNTIME: OnceLock<Runtime> = OnceLock::new();

const DEFAULT_THREAD_NAME: &str = "sluice-worker";


/// Configuration of the shared runtime
///
/// Takes effect only if passed to [`init`] before any combinator is used.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    worker_threads: Option<usize>,
    max_blocking_threads: Option<usize>,
    thread_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            worker_threads: None,
            max_blocking_threads: None,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}

impl Config {
    /// Set the number of async worker threads
    ///
    /// Defaults to the number of CPU cores. Combinator loops (`map`, `filter`, `chunk`, `bind`,
    /// `select`, `timeout`) run on these. Panics if `n` is zero.
    pub fn with_worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be non-zero");
        self.worker_threads = Some(n);
        self
    }

    /// Set the maximum number of blocking threads
    ///
    /// Closures passed to `go` and `go_run` run on these. `go_loop` does not, each loop gets a
    /// dedicated thread of its own instead. Defaults to tokio's default of 512. Panics if `n` is
    /// zero.
    pub fn with_max_blocking_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "max_blocking_threads must be non-zero");
        self.max_blocking_threads = Some(n);
        self
    }

    /// Set the name given to the runtime's threads
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// The configured number of async worker threads, if set
    pub fn worker_threads(&self) -> Option<usize> {
        self.worker_threads
    }

    /// The configured maximum number of blocking threads, if set
    pub fn max_blocking_threads(&self) -> Option<usize> {
        self.max_blocking_threads
    }

    /// The name given to the runtime's threads
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    fn build(&self) -> io::Result<Runtime> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_time().thread_name(self.thread_name.clone());
        if let Some(n) = self.worker_threads {
            builder.worker_threads(n);
        }
        if let Some(n) = self.max_blocking_threads {
            builder.max_blocking_threads(n);
        }
        builder.build()
    }
}


/// Error for trying to initialize the shared runtime
#[derive(Debug, Error)]
pub enum InitError {
    /// The runtime was already initialized, either explicitly or by a combinator being used
    #[error("the sluice runtime is already initialized")]
    AlreadyInitialized,
    /// The runtime failed to build
    #[error("failed to build the sluice runtime")]
    Build(#[from] io::Error),
}

/// Initialize the shared runtime with the given configuration
///
/// Fails if the runtime is already running, which is the case once any combinator has been used.
pub fn init(config: Config) -> Result<(), InitError> {
    if is_initialized() {
        return Err(InitError::AlreadyInitialized);
    }
    let runtime = config.build()?;
    if let Err(runtime) = RUNTIME.set(runtime) {
        // lost a race with another initializer. shutting down in the background is allowed even
        // from within an async context, unlike dropping.
        runtime.shutdown_background();
        return Err(InitError::AlreadyInitialized);
    }
    debug!(?config, "initialized sluice runtime");
    Ok(())
}

/// Whether the shared runtime is running
pub fn is_initialized() -> bool {
    RUNTIME.get().is_some()
}

// get the shared runtime's handle, building it with the default config if necessary.
pub(crate) fn handle() -> &'static Handle {
    RUNTIME
        .get_or_init(|| {
            let config = Config::default();
            debug!(?config, "initializing sluice runtime with default config");
            config.build().expect("failed to build default sluice runtime")
        })
        .handle()
}
