use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};

use ferry_core::{sweeper, Config, FsProbe, StatusProbe, SweepResult, Threshold, WatchedPair};

use crate::error::DaemonError;
use crate::lifecycle::{install_termination_handler, ServiceState};

/// Outcome of one sweep pass inside a poll cycle.
#[derive(Debug)]
pub struct PassReport {
    pub pair: WatchedPair,
    pub outcome: Result<SweepResult, DaemonError>,
}

/// Both passes of one poll cycle, in execution order.
#[derive(Debug)]
pub struct CycleReport {
    pub passes: Vec<PassReport>,
}

impl CycleReport {
    pub fn moved(&self) -> usize {
        self.completed().map(|r| r.moved).sum()
    }

    pub fn failed(&self) -> usize {
        self.completed().map(|r| r.failed).sum()
    }

    /// Number of passes that aborted before finishing.
    pub fn aborted(&self) -> usize {
        self.passes.iter().filter(|p| p.outcome.is_err()).count()
    }

    fn completed(&self) -> impl Iterator<Item = &SweepResult> {
        self.passes.iter().filter_map(|p| p.outcome.as_ref().ok())
    }
}

/// Repeats the two complementary sweeps, sleeping between cycles, until a
/// shutdown is broadcast.
#[derive(Clone)]
pub struct PollLoop {
    pairs: [WatchedPair; 2],
    threshold: Threshold,
    interval: Duration,
    probe: Arc<dyn StatusProbe + Send + Sync>,
}

impl PollLoop {
    pub fn new(pairs: [WatchedPair; 2], threshold: Threshold, interval: Duration) -> Self {
        Self {
            pairs,
            threshold,
            interval,
            probe: Arc::new(FsProbe),
        }
    }

    /// Replace the status-change source used by every pass.
    pub fn with_probe(mut self, probe: Arc<dyn StatusProbe + Send + Sync>) -> Self {
        self.probe = probe;
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.watched_pairs(), config.threshold, config.poll_interval)
    }

    /// Run both passes once. A pass failure never skips the other pass.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut passes = Vec::with_capacity(self.pairs.len());
        for pair in &self.pairs {
            let outcome = run_pass(pair.clone(), self.threshold, self.probe.clone()).await;
            match &outcome {
                Ok(result) => tracing::info!(
                    pair = %pair.label(),
                    scanned = result.scanned,
                    moved = result.moved,
                    failed = result.failed,
                    "sweep pass complete",
                ),
                Err(err) => tracing::error!(
                    pair = %pair.label(),
                    errno = err.os_code().unwrap_or_default(),
                    error = %err,
                    "sweep pass aborted",
                ),
            }
            passes.push(PassReport {
                pair: pair.clone(),
                outcome,
            });
        }
        CycleReport { passes }
    }

    /// Run cycles until `shutdown` fires; returns the number of completed
    /// cycles. Shutdown is observed before each cycle and during the sleep.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> u64 {
        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            threshold = %self.threshold,
            "poll loop started",
        );

        let mut cycles = 0u64;
        loop {
            if shutdown_requested(&mut shutdown) {
                break;
            }

            let report = self.run_cycle().await;
            cycles += 1;
            tracing::debug!(
                cycle = cycles,
                moved = report.moved(),
                failed = report.failed(),
                aborted = report.aborted(),
                "poll cycle finished",
            );

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        cycles
    }
}

async fn run_pass(
    pair: WatchedPair,
    threshold: Threshold,
    probe: Arc<dyn StatusProbe + Send + Sync>,
) -> Result<SweepResult, DaemonError> {
    tokio::task::spawn_blocking(move || sweeper::sweep_with(&pair, threshold, probe.as_ref()))
        .await
        .map_err(|err| DaemonError::Runtime(format!("sweep task join error: {err}")))?
        .map_err(DaemonError::from)
}

fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
}

/// Build the runtime for a daemonized instance and block until shutdown.
///
/// Must be called after [`crate::daemonize`]; the runtime's threads must not
/// exist at fork time.
pub fn start_blocking(state: ServiceState, config: Config) -> Result<(), DaemonError> {
    let state = Arc::new(state);
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            let _ = state.pid_file().remove();
            return Err(DaemonError::Runtime(format!("tokio runtime: {err}")));
        }
    };
    runtime.block_on(run(state, config))
}

/// Install the termination handler and drive the poll loop until SIGTERM.
///
/// Resolves to the PID file removal outcome.
pub async fn run(state: Arc<ServiceState>, config: Config) -> Result<(), DaemonError> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(4);
    let handler = match install_termination_handler(state.clone(), shutdown_tx) {
        Ok(handler) => handler,
        Err(err) => {
            tracing::error!(
                errno = err.os_code().unwrap_or_default(),
                error = %err,
                "cannot install termination handler",
            );
            let _ = state.pid_file().remove();
            return Err(err);
        }
    };

    tracing::info!(
        pid = std::process::id(),
        base_dir = %state.base_dir().display(),
        source = %config.source.display(),
        destination = %config.destination.display(),
        "ferry daemon running",
    );
    let cycles = PollLoop::from_config(&config).run(shutdown_rx).await;
    tracing::info!(cycles, "poll loop stopped");

    handler.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use ferry_core::Direction;
    use tempfile::TempDir;

    fn config_for(source: &Path, destination: &Path, interval: Duration) -> Config {
        Config {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            poll_interval: interval,
            threshold: Threshold(2),
        }
    }

    async fn wait_for(path: &Path) {
        for _ in 0..500 {
            if path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} never appeared", path.display());
    }

    #[tokio::test]
    async fn cycle_moves_young_files_forward_and_keeps_them_there() {
        let a = TempDir::new().expect("a");
        let b = TempDir::new().expect("b");
        fs::write(a.path().join("fresh.txt"), b"x").expect("write a");
        fs::write(b.path().join("settled.txt"), b"x").expect("write b");

        let poll = PollLoop::from_config(&config_for(a.path(), b.path(), Duration::from_secs(1)));
        let report = poll.run_cycle().await;

        assert_eq!(report.passes.len(), 2);
        assert_eq!(report.passes[0].pair.direction, Direction::NewerThan);
        assert_eq!(report.passes[1].pair.direction, Direction::OlderThan);
        assert_eq!(report.moved(), 1);
        assert_eq!(report.aborted(), 0);
        assert!(b.path().join("fresh.txt").exists());
        // Age 0 is not older than 2 minutes, so nothing flows back.
        assert!(b.path().join("settled.txt").exists());
    }

    /// Reports every entry as last changed ten minutes ago.
    struct Backdated;

    impl StatusProbe for Backdated {
        fn status_changed_unix(&self, path: &Path) -> std::io::Result<i64> {
            FsProbe.status_changed_unix(path).map(|ctime| ctime - 600)
        }
    }

    #[tokio::test]
    async fn cycle_returns_old_files_from_destination_to_source() {
        let a = TempDir::new().expect("a");
        let b = TempDir::new().expect("b");
        fs::write(a.path().join("waiting.txt"), b"x").expect("write a");
        fs::write(b.path().join("stale.txt"), b"x").expect("write b");

        let poll = PollLoop::from_config(&config_for(a.path(), b.path(), Duration::from_secs(1)))
            .with_probe(Arc::new(Backdated));
        let report = poll.run_cycle().await;

        assert_eq!(report.aborted(), 0);
        assert_eq!(report.moved(), 1);
        assert_eq!(report.passes[0].outcome.as_ref().map(|r| r.moved).ok(), Some(0));
        assert_eq!(report.passes[1].outcome.as_ref().map(|r| r.moved).ok(), Some(1));
        assert!(a.path().join("stale.txt").exists());
        assert!(!b.path().join("stale.txt").exists());
        // Ten minutes is not newer than two, so nothing goes forward.
        assert!(a.path().join("waiting.txt").exists());
    }

    #[tokio::test]
    async fn aborted_pass_does_not_skip_the_other() {
        let root = TempDir::new().expect("root");
        let a = TempDir::new().expect("a");
        let b = TempDir::new().expect("b");
        fs::write(a.path().join("fresh.txt"), b"x").expect("write");

        let poll = PollLoop::new(
            [
                WatchedPair::new(root.path().join("gone"), b.path(), Direction::NewerThan),
                WatchedPair::new(a.path(), b.path(), Direction::NewerThan),
            ],
            Threshold(2),
            Duration::from_secs(1),
        );
        let report = poll.run_cycle().await;

        assert_eq!(report.aborted(), 1);
        assert!(matches!(
            report.passes[0].outcome,
            Err(DaemonError::Sweep(ferry_core::SweepError::OpenDir { .. }))
        ));
        assert_eq!(report.passes[0].outcome.as_ref().err().and_then(|e| e.os_code()), Some(2));
        assert_eq!(report.moved(), 1);
        assert!(b.path().join("fresh.txt").exists());
    }

    #[tokio::test]
    async fn shutdown_before_start_runs_no_cycle() {
        let a = TempDir::new().expect("a");
        let b = TempDir::new().expect("b");
        fs::write(a.path().join("fresh.txt"), b"x").expect("write");
        let (tx, rx) = broadcast::channel::<()>(4);
        tx.send(()).expect("send");

        let poll = PollLoop::from_config(&config_for(a.path(), b.path(), Duration::from_secs(1)));
        assert_eq!(poll.run(rx).await, 0);
        assert!(a.path().join("fresh.txt").exists(), "no directory touched");
    }

    #[tokio::test]
    async fn shutdown_interrupts_the_sleep() {
        let a = TempDir::new().expect("a");
        let b = TempDir::new().expect("b");
        fs::write(a.path().join("fresh.txt"), b"x").expect("write");
        let (tx, rx) = broadcast::channel::<()>(4);

        let poll =
            PollLoop::from_config(&config_for(a.path(), b.path(), Duration::from_secs(3600)));
        let handle = tokio::spawn(async move { poll.run(rx).await });

        wait_for(&b.path().join("fresh.txt")).await;
        tx.send(()).expect("send");

        let cycles = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop stopped within the sleep")
            .expect("join");
        assert_eq!(cycles, 1);
    }

    #[tokio::test]
    async fn loop_keeps_cycling_while_a_pass_keeps_failing() {
        let root = TempDir::new().expect("root");
        let a = TempDir::new().expect("a");
        let (tx, rx) = broadcast::channel::<()>(4);

        let poll = PollLoop::new(
            [
                WatchedPair::new(root.path().join("gone"), a.path(), Direction::NewerThan),
                WatchedPair::new(a.path(), root.path().join("gone"), Direction::OlderThan),
            ],
            Threshold(2),
            Duration::from_millis(10),
        );
        let handle = tokio::spawn(async move { poll.run(rx).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(()).expect("send");
        let cycles = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop stopped")
            .expect("join");
        assert!(cycles >= 2, "only {cycles} cycle(s) ran");
    }
}
