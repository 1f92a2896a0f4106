use std::io;

pub(crate) use os::RawStream;

/// One of the two standard output streams of the current process.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StandardStream {
    Output,
    Error,
}

impl StandardStream {
    pub fn name(self) -> &'static str {
        match self {
            StandardStream::Output => "stdout",
            StandardStream::Error => "stderr",
        }
    }
}

/// Classification of the destination a stream writes to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StreamKind {
    Terminal,
    File,
    Pipe,
    Socket,
    /// Character device other than a terminal, such as `/dev/null`.
    Device,
    /// The descriptor is not open, or the process has no such stream.
    Closed,
}

/// What is known about a stream's destination at the time of the probe.
#[derive(Debug, Copy, Clone)]
pub struct StreamState {
    pub kind: StreamKind,
    /// Writes may be refused with `WouldBlock` instead of waiting for room.
    pub nonblocking: bool,
    /// The destination still accepts writes; false once the reading end of
    /// a pipe or socket is gone.
    pub writable: bool,
    pub(crate) raw: Option<RawStream>,
}

impl StreamState {
    /// Probe the destination of a standard stream.
    pub fn probe(which: StandardStream) -> StreamState {
        match os::standard_raw(which) {
            Ok(raw) => StreamState::probe_raw(raw),
            Err(_) => StreamState::closed(),
        }
    }

    pub(crate) fn probe_raw(raw: RawStream) -> StreamState {
        let state = os::probe(raw);
        log::trace!("probed {:?}", state);
        state
    }

    fn closed() -> StreamState {
        StreamState {
            kind: StreamKind::Closed,
            nonblocking: false,
            writable: false,
            raw: None,
        }
    }

    /// True if a flush of this stream can stop short of delivering
    /// everything and a later retry can still succeed.
    ///
    /// Any open, writable descriptor in non-blocking mode qualifies,
    /// terminals and devices included. Blocking destinations finish a flush
    /// before returning, so they never need to be waited on.
    pub fn needs_drain_wait(&self) -> bool {
        self.writable && self.nonblocking && self.kind != StreamKind::Closed
    }
}

/// Outcome of waiting for a pending stream to accept more data.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Readiness {
    Writable,
    /// No drain signal can arrive anymore: reader gone, or descriptor invalid.
    Closed,
    Waiting,
}

/// Block until at least one of `streams` accepts writes or can never accept
/// them again. Returns the readiness of each stream, in order.
pub(crate) fn wait_writable(streams: &[RawStream]) -> io::Result<Vec<Readiness>> {
    os::wait_writable(streams)
}

#[cfg(unix)]
mod os {
    use std::io;
    use std::os::unix::io::RawFd;
    use std::time::Duration;

    use super::{Readiness, StandardStream, StreamKind, StreamState};
    use crate::posix;

    pub type RawStream = RawFd;

    pub fn standard_raw(which: StandardStream) -> io::Result<RawFd> {
        Ok(match which {
            StandardStream::Output => posix::STDOUT_FILENO,
            StandardStream::Error => posix::STDERR_FILENO,
        })
    }

    pub fn probe(fd: RawFd) -> StreamState {
        let kind = match posix::file_type(fd) {
            Ok(posix::S_IFIFO) => StreamKind::Pipe,
            Ok(posix::S_IFSOCK) => StreamKind::Socket,
            Ok(posix::S_IFREG) => StreamKind::File,
            Ok(_) if posix::isatty(fd) => StreamKind::Terminal,
            Ok(_) => StreamKind::Device,
            Err(_) => StreamKind::Closed,
        };
        if kind == StreamKind::Closed {
            return StreamState {
                kind,
                nonblocking: false,
                writable: false,
                raw: Some(fd),
            };
        }
        let nonblocking = posix::status_flags(fd)
            .map(|flags| flags & posix::O_NONBLOCK != 0)
            .unwrap_or(false);
        let writable = match kind {
            StreamKind::Pipe | StreamKind::Socket => !peer_gone(fd),
            _ => true,
        };
        StreamState {
            kind,
            nonblocking,
            writable,
            raw: Some(fd),
        }
    }

    fn peer_gone(fd: RawFd) -> bool {
        let mut fds = [posix::PollFd::new(fd, posix::POLLOUT)];
        match posix::poll(&mut fds, Some(Duration::ZERO)) {
            Ok(_) => fds[0].test(posix::POLLERR | posix::POLLHUP | posix::POLLNVAL),
            Err(_) => false,
        }
    }

    pub fn wait_writable(fds: &[RawFd]) -> io::Result<Vec<Readiness>> {
        let mut pollfds: Vec<_> = fds
            .iter()
            .map(|&fd| posix::PollFd::new(fd, posix::POLLOUT))
            .collect();
        posix::poll(&mut pollfds, None)?;
        Ok(pollfds
            .iter()
            .map(|p| {
                if p.test(posix::POLLERR | posix::POLLHUP | posix::POLLNVAL) {
                    Readiness::Closed
                } else if p.test(posix::POLLOUT) {
                    Readiness::Writable
                } else {
                    Readiness::Waiting
                }
            })
            .collect())
    }
}

#[cfg(windows)]
mod os {
    use std::io;
    use std::os::windows::io::RawHandle;

    use super::{Readiness, StandardStream, StreamKind, StreamState};
    use crate::win32;

    pub type RawStream = RawHandle;

    pub fn standard_raw(which: StandardStream) -> io::Result<RawHandle> {
        win32::GetStdHandle(which)
    }

    // Standard handles are opened for synchronous I/O, so a flush that
    // returns has delivered its data and nothing is ever left to wait for.
    pub fn probe(handle: RawHandle) -> StreamState {
        let kind = match win32::GetFileType(handle) {
            win32::FILE_TYPE_CHAR => StreamKind::Terminal,
            win32::FILE_TYPE_DISK => StreamKind::File,
            win32::FILE_TYPE_PIPE => StreamKind::Pipe,
            _ => StreamKind::Closed,
        };
        StreamState {
            kind,
            nonblocking: false,
            writable: kind != StreamKind::Closed,
            raw: Some(handle),
        }
    }

    // Not reached: flushes of synchronous handles never report WouldBlock,
    // so the drain loop has nothing pending to wait on. Should that change,
    // reporting Closed ends the drain instead of spinning on a handle we
    // have no way to watch.
    pub fn wait_writable(handles: &[RawHandle]) -> io::Result<Vec<Readiness>> {
        Ok(vec![Readiness::Closed; handles.len()])
    }
}
