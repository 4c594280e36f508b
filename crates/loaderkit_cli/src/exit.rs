//! Process exit codes.

use std::process::ExitCode;

pub const N_EXIT_SUCCESS: u8 = 0;
/// A `test` predicate evaluated to false.
pub const N_EXIT_FALSE: u8 = 1;
/// The operation itself failed.
pub const N_EXIT_FAILURE: u8 = 2;

/// Map a raw status to a process exit code; out-of-range values become
/// [`N_EXIT_FAILURE`].
///
/// Does not exit by itself: `main` returns the value and the runtime ends the
/// process with it.
pub fn to_exit_code(code: i32) -> ExitCode {
    ExitCode::from(to_exit_status(code))
}

pub(crate) fn to_exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(N_EXIT_FAILURE)
}

pub fn status_for_predicate(b_holds: bool) -> u8 {
    if b_holds { N_EXIT_SUCCESS } else { N_EXIT_FALSE }
}
