use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.txt";
pub const PID_FILE: &str = "ferry.pid";
pub const LOG_FILE: &str = "ferry.log";

pub fn ferry_root(home: &Path) -> PathBuf {
    home.join(".ferry")
}

pub fn run_dir(home: &Path) -> PathBuf {
    ferry_root(home).join("run")
}

pub fn pid_file_path(home: &Path) -> PathBuf {
    run_dir(home).join(PID_FILE)
}

pub fn logs_dir(home: &Path) -> PathBuf {
    ferry_root(home).join("logs")
}

pub fn log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(LOG_FILE)
}
