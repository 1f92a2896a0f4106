//! Exit the process without losing output.
//!
//! [`exit`] terminates the current process with the requested exit code,
//! but only after everything already written to standard output and
//! standard error has been handed to its destination.
//!
//! `std::process::exit` makes a single best-effort attempt to flush the
//! buffered `Stdout`. When that attempt fails, for example because the
//! descriptor was left in non-blocking mode by the parent process and the
//! pipe it writes to is momentarily full, the tail of the output is lost.
//! [`exit`] instead waits for the destination to accept the remaining
//! data, and gives up on a stream only once it can no longer accept
//! anything, such as when the reader of a pipe has gone away.
//!
//! ```no_run
//! for i in 0..1000 {
//!     println!("line {}", i);
//! }
//! flush_exit::exit(3);
//! ```

mod drain;
mod exit;
mod stream;

#[cfg(unix)]
mod posix;
#[cfg(windows)]
mod win32;

pub use exit::exit;

#[cfg(test)]
mod tests;
