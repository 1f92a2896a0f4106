use std::io::{Error, Result};
use std::mem;
use std::os::unix::io::RawFd;
use std::time::Duration;

#[cfg(test)]
use std::fs::File;
#[cfg(test)]
use std::os::unix::io::{AsRawFd, FromRawFd};

pub use libc::{O_NONBLOCK, STDERR_FILENO, STDOUT_FILENO};

fn check_err<T: Ord + Default>(num: T) -> Result<T> {
    if num < T::default() {
        return Err(Error::last_os_error());
    }
    Ok(num)
}

#[cfg(test)]
pub fn pipe() -> Result<(File, File)> {
    let mut fds = [0 as libc::c_int; 2];
    check_err(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
    Ok(unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) })
}

/// Open a pseudo-terminal in raw mode, returning `(master, slave)`.
#[cfg(all(test, target_os = "linux"))]
pub fn openpty_raw() -> Result<(File, File)> {
    let master = check_err(unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) })?;
    let master = unsafe { File::from_raw_fd(master) };
    check_err(unsafe { libc::grantpt(master.as_raw_fd()) })?;
    check_err(unsafe { libc::unlockpt(master.as_raw_fd()) })?;
    let mut name = [0 as libc::c_char; 128];
    let ret = unsafe { libc::ptsname_r(master.as_raw_fd(), name.as_mut_ptr(), name.len()) };
    if ret != 0 {
        return Err(Error::from_raw_os_error(ret));
    }
    let slave = check_err(unsafe { libc::open(name.as_ptr(), libc::O_RDWR | libc::O_NOCTTY) })?;
    let slave = unsafe { File::from_raw_fd(slave) };

    // No output processing, so bytes arrive at the master unchanged.
    let mut tio: libc::termios = unsafe { mem::zeroed() };
    check_err(unsafe { libc::tcgetattr(slave.as_raw_fd(), &mut tio) })?;
    unsafe { libc::cfmakeraw(&mut tio) };
    check_err(unsafe { libc::tcsetattr(slave.as_raw_fd(), libc::TCSANOW, &tio) })?;
    Ok((master, slave))
}

/// File type bits (`st_mode & S_IFMT`) of an open descriptor.
pub fn file_type(fd: RawFd) -> Result<libc::mode_t> {
    let mut st: libc::stat = unsafe { mem::zeroed() };
    check_err(unsafe { libc::fstat(fd, &mut st) })?;
    Ok(st.st_mode & libc::S_IFMT)
}

pub use libc::{S_IFIFO, S_IFREG, S_IFSOCK};

pub fn isatty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) == 1 }
}

pub fn status_flags(fd: RawFd) -> Result<i32> {
    check_err(unsafe { libc::fcntl(fd, libc::F_GETFL) })
}

#[cfg(test)]
pub fn set_nonblocking(fd: RawFd) -> Result<()> {
    let flags = status_flags(fd)?;
    check_err(unsafe { libc::fcntl(fd, libc::F_SETFL, flags | O_NONBLOCK) })?;
    Ok(())
}

#[repr(C)]
pub struct PollFd(libc::pollfd);

impl PollFd {
    pub fn new(fd: RawFd, events: i16) -> PollFd {
        PollFd(libc::pollfd {
            fd,
            events,
            revents: 0,
        })
    }

    pub fn test(&self, mask: i16) -> bool {
        self.0.revents & mask != 0
    }
}

pub use libc::{POLLERR, POLLHUP, POLLNVAL, POLLOUT};

pub fn poll(fds: &mut [PollFd], timeout: Option<Duration>) -> Result<usize> {
    let timeout = timeout
        .map(|t| t.as_millis().min(i32::MAX as u128) as i32)
        .unwrap_or(-1);
    let fds_ptr = fds.as_mut_ptr() as *mut libc::pollfd;
    let cnt = check_err(unsafe { libc::poll(fds_ptr, fds.len() as libc::nfds_t, timeout) })?;
    Ok(cnt as usize)
}
