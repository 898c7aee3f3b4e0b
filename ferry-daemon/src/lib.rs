//! ferry daemon: detachment, PID file, termination handling, poll loop.

mod error;
pub mod lifecycle;
pub mod logging;
pub mod paths;
mod runtime;

pub use error::{DaemonError, LifecycleStage};
pub use lifecycle::{
    daemonize, install_termination_handler, stop, PidFile, ServiceState, StopOutcome,
    TerminationHandler,
};
pub use logging::init_tracing;
pub use runtime::{run, start_blocking, CycleReport, PassReport, PollLoop};
