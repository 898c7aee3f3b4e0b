//! Runs alone in its own binary: it closes and reassigns the process's
//! standard descriptors.

use nix::fcntl::{fcntl, FcntlArg};
use nix::libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::sys::stat::{fstat, stat};
use nix::unistd::{close, dup, dup2};

use ferry_daemon::lifecycle::redirect_standard_streams;

#[test]
fn closed_stdin_is_reopened_on_the_null_device() {
    let saved_stdout = dup(STDOUT_FILENO).expect("save stdout");
    let saved_stderr = dup(STDERR_FILENO).expect("save stderr");
    close(STDIN_FILENO).expect("close stdin");

    let result = redirect_standard_streams();
    let stdin_flags = fcntl(STDIN_FILENO, FcntlArg::F_GETFD);
    let stdin_status = fstat(STDIN_FILENO);

    dup2(saved_stdout, STDOUT_FILENO).expect("restore stdout");
    dup2(saved_stderr, STDERR_FILENO).expect("restore stderr");
    close(saved_stdout).expect("close saved stdout");
    close(saved_stderr).expect("close saved stderr");

    result.expect("redirect");
    assert!(stdin_flags.is_ok(), "stdin closed after redirect: {stdin_flags:?}");
    let null = stat("/dev/null").expect("stat null device");
    let stdin_status = stdin_status.expect("fstat stdin");
    assert_eq!(stdin_status.st_rdev, null.st_rdev);
    assert_eq!(stdin_status.st_ino, null.st_ino);
}
