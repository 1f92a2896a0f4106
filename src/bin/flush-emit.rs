//! Emit numbered lines to stdout and/or stderr, then exit through
//! `flush_exit::exit`.
//!
//! Usage: `flush-emit <exit-code> <line-count> [stdout] [stderr] [late]`
//!
//! With `late`, once the exit sequence is under way a second thread writes
//! `late stdout` and `late stderr`, and a third calls `exit(99)`. Neither
//! must be observable.

use std::env;
use std::io::{self, ErrorKind, Write};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn usage() -> ! {
    eprintln!("usage: flush-emit <exit-code> <line-count> [stdout] [stderr] [late]");
    process::exit(2);
}

/// Write all of `line`, waiting out a full non-blocking destination.
fn emit_line(out: &mut impl Write, line: &str) -> io::Result<()> {
    let mut buf = line.as_bytes();
    while !buf.is_empty() {
        match out.write(buf) {
            Ok(0) => return Err(ErrorKind::WriteZero.into()),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(Duration::from_millis(1)),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Logger that never prints. The first record from `flush_exit` is issued
/// with both standard streams locked, so it releases the late threads and
/// then holds the exit sequence long enough for them to act.
struct ExitInProgress {
    fired: AtomicBool,
    release: Arc<Barrier>,
}

impl log::Log for ExitInProgress {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.target().starts_with("flush_exit")
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) || self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        self.release.wait();
        thread::sleep(Duration::from_millis(100));
    }

    fn flush(&self) {}
}

fn spawn_late_threads() {
    let release = Arc::new(Barrier::new(3));
    let logger = Box::leak(Box::new(ExitInProgress {
        fired: AtomicBool::new(false),
        release: Arc::clone(&release),
    }));
    if log::set_logger(logger).is_err() {
        return;
    }
    log::set_max_level(log::LevelFilter::Trace);

    let writer_release = Arc::clone(&release);
    thread::spawn(move || {
        writer_release.wait();
        let _ = emit_line(&mut io::stdout(), "late stdout\n");
        let _ = emit_line(&mut io::stderr(), "late stderr\n");
    });
    thread::spawn(move || {
        release.wait();
        flush_exit::exit(99);
    });
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 2 {
        usage();
    }
    let (Ok(code), Ok(count)) = (args[0].parse::<i32>(), args[1].parse::<u64>()) else {
        usage();
    };
    let mut to_stdout = false;
    let mut to_stderr = false;
    let mut late = false;
    for mode in &args[2..] {
        match mode.as_str() {
            "stdout" => to_stdout = true,
            "stderr" => to_stderr = true,
            "late" => late = true,
            _ => usage(),
        }
    }

    // A hard write error (the reader is gone) stops output to that stream
    // instead of panicking the way println! would.
    for i in 0..count {
        if to_stdout && emit_line(&mut io::stdout(), &format!("stdout {}\n", i)).is_err() {
            to_stdout = false;
        }
        if to_stderr && emit_line(&mut io::stderr(), &format!("stderr {}\n", i)).is_err() {
            to_stderr = false;
        }
    }

    if late {
        spawn_late_threads();
    }
    flush_exit::exit(code);
}
