use std::io;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::drain::{self, DrainTarget};
use crate::stream::{StandardStream, StreamState};

/// Process-wide "exit already requested" flag.
///
/// Set by the first caller and never cleared; the process is gone before
/// a reset could matter.
pub(crate) struct ExitGuard {
    claimed: AtomicBool,
}

impl ExitGuard {
    pub const fn new() -> ExitGuard {
        ExitGuard {
            claimed: AtomicBool::new(false),
        }
    }

    /// Returns true for exactly one caller over the guard's lifetime.
    pub fn claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

static EXIT_GUARD: ExitGuard = ExitGuard::new();

#[derive(Debug, Copy, Clone)]
struct ExitRequest {
    code: i32,
}

impl ExitRequest {
    fn terminate(self) -> ! {
        process::exit(self.code)
    }
}

/// Terminate the current process with `code` once everything written to
/// standard output and standard error has reached its destination.
///
/// When both streams flush at once, which is the case for terminals,
/// regular files, and blocking pipes, the process exits immediately.
/// Otherwise the calling thread waits until each stream has either drained
/// or become unable to ever drain (for example because the reading end of
/// a pipe was closed), and exits then. Write errors during this wait are
/// not reported; they only end the wait for the affected stream.
///
/// From the moment of the call until the process is gone, the standard
/// stream handles stay locked. Output that other threads attempt through
/// `std::io::stdout()` or `std::io::stderr()` after this point is never
/// written.
///
/// Only the first call has an effect. A thread that calls `exit` while
/// another call is already in progress blocks until the process ends, and
/// the exit code of the first call is used.
///
/// # Example
///
/// ```no_run
/// println!("all done");
/// flush_exit::exit(0);
/// ```
pub fn exit(code: i32) -> ! {
    let request = ExitRequest { code };
    if !EXIT_GUARD.claim() {
        log::debug!("exit({}) ignored: exit already in progress", request.code);
        loop {
            thread::park();
        }
    }

    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    let out_state = StreamState::probe(StandardStream::Output);
    let err_state = StreamState::probe(StandardStream::Error);
    log::trace!(
        "exit({}): drain wait possible on stdout {}, stderr {}",
        request.code,
        out_state.needs_drain_wait(),
        err_state.needs_drain_wait()
    );
    let mut targets = [
        DrainTarget {
            name: StandardStream::Output.name(),
            state: out_state,
            writer: &mut stdout,
        },
        DrainTarget {
            name: StandardStream::Error.name(),
            state: err_state,
            writer: &mut stderr,
        },
    ];
    let wait_state = drain::drain(&mut targets);
    log::debug!(
        "exit({}): stdout {:?}, stderr {:?} after {} wait round(s)",
        request.code,
        wait_state.resolution(0),
        wait_state.resolution(1),
        wait_state.rounds()
    );

    request.terminate()
}
