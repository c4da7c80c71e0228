//! Runs named long-lived processes side by side and shuts them down together.
//!
//! Every process receives a child of the runner's cancellation token. The
//! runner cancels that token when a process fails, when SIGINT or SIGTERM
//! arrives, or when the caller cancels it. Closers run afterwards within a
//! bounded timeout, whatever the outcome.
//!
//! ```no_run
//! use dispatch_runner::Runner;
//! use std::time::Duration;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! Runner::new()
//!     .with_app_process("ticker", |ctx| async move {
//!         ctx.cancelled().await;
//!         Ok(())
//!     })
//!     .with_closer("pool", || async move { Ok(()) })
//!     .with_closer_timeout(Duration::from_secs(5))
//!     .run()
//!     .await
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type BoxedResult = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A process started with a cancellation token
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxedResult + Send>;

/// Cleanup run once all processes have stopped
pub type Closer = Box<dyn FnOnce() -> BoxedResult + Send>;

pub struct Runner {
    app_processes: Vec<(String, AppProcess)>,
    closers: Vec<(String, Closer)>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
    handle_signals: bool,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
            handle_signals: true,
        }
    }

    pub fn with_app_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.app_processes
            .push((name.into(), Box::new(|token| Box::pin(process(token)))));
        self
    }

    pub fn with_closer<F, Fut>(mut self, name: impl Into<String>, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers
            .push((name.into(), Box::new(|| Box::pin(closer()))));
        self
    }

    /// Upper bound for all closers together. Default 10s.
    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Skip installing SIGINT/SIGTERM handlers
    pub fn without_signal_handlers(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    fn spawn_signal_handlers(token: &CancellationToken) {
        let ctrl_c_token = token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received SIGINT");
                    ctrl_c_token.cancel();
                }
                Err(err) => error!(error = %err, "Failed to listen for SIGINT"),
            }
        });

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let sigterm_token = token.clone();
            tokio::spawn(async move {
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                        info!("Received SIGTERM");
                        sigterm_token.cancel();
                    }
                    Err(err) => error!(error = %err, "Failed to listen for SIGTERM"),
                }
            });
        }
    }

    /// Run until a process fails or shutdown is requested.
    ///
    /// Returns the first process error, after closers have run.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = self.cancellation_token;
        if self.handle_signals {
            Self::spawn_signal_handlers(&token);
        }

        let mut join_set = JoinSet::new();
        for (name, process) in self.app_processes {
            let process_token = token.child_token();
            info!(process = %name, "Starting process");
            join_set.spawn(async move { (name, process(process_token).await) });
        }

        let mut first_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "Process finished");
                    // a process returning early takes the others down with it
                    token.cancel();
                }
                Ok((name, Err(err))) => {
                    if token.is_cancelled() {
                        warn!(process = %name, error = %err, "Process failed during shutdown");
                    } else {
                        error!(process = %name, error = %err, "Process failed");
                        first_error = Some(err.context(format!("process {} failed", name)));
                        token.cancel();
                    }
                }
                Err(err) => {
                    error!(error = %err, "Process task panicked");
                    if first_error.is_none() {
                        first_error = Some(anyhow::anyhow!("process task panicked: {}", err));
                    }
                    token.cancel();
                }
            }
        }

        Self::run_closers(self.closers, self.closer_timeout).await;

        match first_error {
            Some(err) => Err(err),
            None => {
                info!("All processes stopped");
                Ok(())
            }
        }
    }

    async fn run_closers(closers: Vec<(String, Closer)>, timeout: Duration) {
        if closers.is_empty() {
            return;
        }

        let mut closer_set = JoinSet::new();
        for (name, closer) in closers {
            closer_set.spawn(async move { (name, closer().await) });
        }

        let drain = async {
            while let Some(joined) = closer_set.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => debug!(closer = %name, "Closer finished"),
                    Ok((name, Err(err))) => error!(closer = %name, error = %err, "Closer failed"),
                    Err(err) => error!(error = %err, "Closer panicked"),
                }
            }
        };

        if tokio::time::timeout(timeout, drain).await.is_err() {
            error!(timeout = ?timeout, "Closers timed out");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cancel_stops_processes_and_runs_closers() {
        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = closed.clone();
        let token = CancellationToken::new();

        let runner = Runner::new()
            .without_signal_handlers()
            .with_cancellation_token(token.clone())
            .with_app_process("waiter", |ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .with_closer("flag", move || async move {
                closed_flag.store(true, Ordering::SeqCst);
                Ok(())
            });

        let handle = tokio::spawn(runner.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failing_process_cancels_siblings() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let stopped_count = stopped.clone();

        let result = Runner::new()
            .without_signal_handlers()
            .with_app_process("sibling", move |ctx| async move {
                ctx.cancelled().await;
                stopped_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .with_app_process("broken", |_ctx| async move {
                Err(anyhow::anyhow!("bind failed"))
            })
            .run()
            .await;

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("bind failed"));
        assert!(format!("{:#}", err).contains("broken"));
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_closer_is_bounded() {
        let started = std::time::Instant::now();
        let token = CancellationToken::new();
        token.cancel();

        Runner::new()
            .without_signal_handlers()
            .with_cancellation_token(token)
            .with_closer("slow", || async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .with_closer_timeout(Duration::from_millis(100))
            .run()
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
