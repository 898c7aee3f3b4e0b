//! Service lifecycle: detachment, PID file, termination handling, stop.
//!
//! [`daemonize`] must run before any async runtime or thread exists; the
//! termination handler is installed afterwards from inside the runtime.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nix::errno::Errno;
use nix::libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::sys::signal::{kill, Signal};
use nix::sys::stat::{umask, Mode};
use nix::unistd::{chdir, dup2, fork, setsid, ForkResult, Pid};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::{io_err, os_err, DaemonError, LifecycleStage};
use crate::paths::pid_file_path;

const NULL_DEVICE: &str = "/dev/null";

// ---------------------------------------------------------------------------
// PID file
// ---------------------------------------------------------------------------

/// Liveness marker holding the running instance's decimal PID.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create the PID file for the current process.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, DaemonError> {
        Self::create_with_pid(path, std::process::id())
    }

    /// Create the PID file with an explicit PID.
    ///
    /// Creation is exclusive: an existing file yields
    /// [`DaemonError::AlreadyRunning`] and is left untouched. A failed write
    /// removes the partially written file.
    pub fn create_with_pid(path: impl Into<PathBuf>, pid: u32) -> Result<Self, DaemonError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(DaemonError::AlreadyRunning { path });
            }
            Err(err) => return Err(io_err(&path, err)),
        };

        if let Err(err) = writeln!(file, "{pid}").and_then(|()| file.sync_all()) {
            tracing::error!(
                path = %path.display(),
                errno = err.raw_os_error().unwrap_or_default(),
                error = %err,
                "failed to write PID file, removing it",
            );
            if let Err(remove_err) = fs::remove_file(&path) {
                tracing::error!(
                    path = %path.display(),
                    errno = remove_err.raw_os_error().unwrap_or_default(),
                    error = %remove_err,
                    "failed to remove PID file",
                );
            }
            return Err(io_err(&path, err));
        }

        tracing::info!(pid, path = %path.display(), "PID file written");
        Ok(Self { path })
    }

    /// Read the PID recorded at `path`; `None` when no PID file exists.
    pub fn read(path: &Path) -> Result<Option<i32>, DaemonError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_err(path, err)),
        };
        match contents.trim().parse::<i32>() {
            // Zero and negative ids would address process groups in kill(2).
            Ok(pid) if pid > 0 => Ok(Some(pid)),
            _ => Err(DaemonError::InvalidPid {
                path: path.to_path_buf(),
                contents,
            }),
        }
    }

    /// Whether a PID file exists at `path`, valid or not.
    pub fn is_present(path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remove(&self) -> Result<(), DaemonError> {
        remove_pid_file(&self.path)
    }
}

/// Remove the PID file at `path`. An already-missing file counts as removed.
pub fn remove_pid_file(path: &Path) -> Result<(), DaemonError> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "PID file removed");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "PID file already gone");
            Ok(())
        }
        Err(err) => {
            tracing::error!(
                path = %path.display(),
                errno = err.raw_os_error().unwrap_or_default(),
                error = %err,
                "failed to remove PID file",
            );
            Err(io_err(path, err))
        }
    }
}

// ---------------------------------------------------------------------------
// Service state
// ---------------------------------------------------------------------------

/// Lifecycle context of a detached instance, shared with the termination
/// handler.
#[derive(Debug)]
pub struct ServiceState {
    base_dir: PathBuf,
    pid_file: PidFile,
    handler_installed: AtomicBool,
}

impl ServiceState {
    pub fn new(base_dir: impl Into<PathBuf>, pid_file: PidFile) -> Self {
        Self {
            base_dir: base_dir.into(),
            pid_file,
            handler_installed: AtomicBool::new(false),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    pub fn handler_installed(&self) -> bool {
        self.handler_installed.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Detachment
// ---------------------------------------------------------------------------

/// Detach from the controlling terminal and write the PID file.
///
/// Returns only in the final grandchild. Both intermediate parents exit with
/// status 0 from inside this call. Working directory becomes `home`.
pub fn daemonize(home: &Path) -> Result<ServiceState, DaemonError> {
    tracing::info!(home = %home.display(), "starting daemonization");

    fork_and_exit_parent(LifecycleStage::FirstFork)?;
    setsid().map_err(|e| os_err(LifecycleStage::CreateSession, e))?;
    tracing::debug!("new session created");
    // A session leader could reacquire a terminal; the grandchild cannot.
    fork_and_exit_parent(LifecycleStage::SecondFork)?;

    umask(Mode::empty());
    enter_home(home)?;
    redirect_standard_streams()?;

    let pid_file = PidFile::create(pid_file_path(home))?;
    Ok(ServiceState::new(home, pid_file))
}

fn fork_and_exit_parent(stage: LifecycleStage) -> Result<(), DaemonError> {
    // SAFETY: called before the tokio runtime is built, so the process is
    // single-threaded and the child may keep running arbitrary code.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            tracing::debug!(%stage, child = child.as_raw(), "parent leg exiting");
            std::process::exit(0);
        }
        Ok(ForkResult::Child) => Ok(()),
        Err(errno) => Err(os_err(stage, errno)),
    }
}

fn enter_home(home: &Path) -> Result<(), DaemonError> {
    chdir(home).map_err(|errno| DaemonError::OsPath {
        stage: LifecycleStage::ChangeDirectory,
        path: home.to_path_buf(),
        source: errno.into(),
    })
}

/// Reopen stdin, stdout and stderr on the null device.
pub fn redirect_standard_streams() -> Result<(), DaemonError> {
    redirect(
        STDIN_FILENO,
        OpenOptions::new().read(true),
        LifecycleStage::RedirectStdin,
    )?;
    redirect(
        STDOUT_FILENO,
        OpenOptions::new().write(true),
        LifecycleStage::RedirectStdout,
    )?;
    redirect(
        STDERR_FILENO,
        OpenOptions::new().read(true).write(true),
        LifecycleStage::RedirectStderr,
    )
}

fn redirect(
    target: RawFd,
    options: &OpenOptions,
    stage: LifecycleStage,
) -> Result<(), DaemonError> {
    let null = options
        .open(NULL_DEVICE)
        .map_err(|source| DaemonError::OsPath {
            stage,
            path: PathBuf::from(NULL_DEVICE),
            source,
        })?;
    if null.as_raw_fd() == target {
        // A closed target is the lowest free slot, so open() already filled it.
        let _ = null.into_raw_fd();
        return Ok(());
    }
    dup2(null.as_raw_fd(), target).map_err(|e| os_err(stage, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Termination handling
// ---------------------------------------------------------------------------

/// Handle to the installed SIGTERM listener.
#[derive(Debug)]
pub struct TerminationHandler {
    task: JoinHandle<Result<(), DaemonError>>,
}

impl TerminationHandler {
    /// Wait for the handler to finish. Resolves to the PID file removal
    /// outcome once SIGTERM has been handled.
    pub async fn wait(self) -> Result<(), DaemonError> {
        self.task
            .await
            .map_err(|err| DaemonError::Runtime(format!("termination handler join error: {err}")))?
    }
}

/// Register the SIGTERM listener. Must be called inside a tokio runtime.
///
/// On SIGTERM the listener removes the PID file, then broadcasts on
/// `shutdown`. Later SIGTERMs are absorbed by the still-registered handler.
pub fn install_termination_handler(
    state: Arc<ServiceState>,
    shutdown: broadcast::Sender<()>,
) -> Result<TerminationHandler, DaemonError> {
    if state.handler_installed.swap(true, Ordering::SeqCst) {
        return Err(DaemonError::Runtime(
            "termination handler already installed".to_string(),
        ));
    }

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(source) => {
            state.handler_installed.store(false, Ordering::SeqCst);
            return Err(DaemonError::Os {
                stage: LifecycleStage::InstallSignalHandler,
                source,
            });
        }
    };
    let mut shutdown_rx = shutdown.subscribe();

    let task = tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            _ = sigterm.recv() => {}
        }
        tracing::info!("SIGTERM received, shutting down");
        let removal = state.pid_file().remove();
        let _ = shutdown.send(());
        removal
    });

    Ok(TerminationHandler { task })
}

// ---------------------------------------------------------------------------
// Stop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No PID file; nothing was signaled.
    NotRunning,
    /// SIGTERM delivered to the recorded PID.
    Signalled { pid: i32 },
    /// The recorded process no longer exists; its PID file was removed.
    StaleRemoved { pid: i32 },
}

/// Send SIGTERM to the instance recorded in the PID file at `pid_path`.
pub fn stop(pid_path: &Path) -> Result<StopOutcome, DaemonError> {
    let Some(pid) = PidFile::read(pid_path)? else {
        return Ok(StopOutcome::NotRunning);
    };

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => {
            tracing::info!(pid, "daemon stop requested");
            Ok(StopOutcome::Signalled { pid })
        }
        Err(Errno::ESRCH) => {
            tracing::warn!(pid, path = %pid_path.display(), "removing stale PID file");
            remove_pid_file(pid_path)?;
            Ok(StopOutcome::StaleRemoved { pid })
        }
        Err(errno) => Err(os_err(LifecycleStage::SignalDaemon, errno)),
    }
}
