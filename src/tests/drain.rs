use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::os::unix::io::AsRawFd;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use crate::drain::{DrainTarget, Resolution, drain};
use crate::posix;
use crate::stream::StreamState;

// Several times the default pipe capacity, so a non-blocking flush is
// guaranteed to stop short.
const LARGE: usize = 512 * 1024;

fn numbered_lines(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut i = 0;
    while data.len() < size {
        data.extend_from_slice(format!("line {}\n", i).as_bytes());
        i += 1;
    }
    data.truncate(size);
    data
}

fn slow_reader(mut read: File, delay: Duration) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        thread::sleep(delay);
        let mut received = Vec::new();
        read.read_to_end(&mut received).unwrap();
        received
    })
}

fn buffered(write: File, data: &[u8]) -> BufWriter<File> {
    let mut w = BufWriter::with_capacity(data.len() * 2, write);
    w.write_all(data).unwrap();
    w
}

#[test]
fn regular_file_flushes_without_waiting() {
    let tmpdir = TempDir::new().unwrap();
    let tmpname = tmpdir.path().join("output");
    let data = numbered_lines(1000);
    let file = File::create(&tmpname).unwrap();
    let state = StreamState::probe_raw(file.as_raw_fd());
    let mut w = buffered(file, &data);

    let wait_state = drain(&mut [DrainTarget {
        name: "file",
        state,
        writer: &mut w,
    }]);
    assert_eq!(wait_state.resolution(0), Some(Resolution::Flushed));
    assert_eq!(wait_state.rounds(), 0);
    drop(w);
    assert_eq!(fs::read(&tmpname).unwrap(), data);
}

#[test]
fn blocking_pipe_flushes_without_waiting() {
    let (read, write) = posix::pipe().unwrap();
    let data = numbered_lines(LARGE);
    let state = StreamState::probe_raw(write.as_raw_fd());
    let mut w = buffered(write, &data);
    let reader = slow_reader(read, Duration::from_millis(50));

    let wait_state = drain(&mut [DrainTarget {
        name: "pipe",
        state,
        writer: &mut w,
    }]);
    assert_eq!(wait_state.resolution(0), Some(Resolution::Flushed));
    assert_eq!(wait_state.rounds(), 0);
    drop(w);
    assert_eq!(reader.join().unwrap(), data);
}

#[test]
fn nonblocking_pipe_waits_for_slow_reader() {
    let (read, write) = posix::pipe().unwrap();
    posix::set_nonblocking(write.as_raw_fd()).unwrap();
    let data = numbered_lines(LARGE);
    let state = StreamState::probe_raw(write.as_raw_fd());
    let mut w = buffered(write, &data);
    let reader = slow_reader(read, Duration::from_millis(50));

    let wait_state = drain(&mut [DrainTarget {
        name: "pipe",
        state,
        writer: &mut w,
    }]);
    assert_eq!(wait_state.resolution(0), Some(Resolution::Drained));
    assert!(wait_state.rounds() >= 1);
    drop(w);
    assert_eq!(reader.join().unwrap(), data);
}

#[test]
fn reader_closed_before_drain() {
    let (read, write) = posix::pipe().unwrap();
    posix::set_nonblocking(write.as_raw_fd()).unwrap();
    let data = numbered_lines(1000);
    let mut w = buffered(write, &data);
    drop(read);
    let state = StreamState::probe_raw(w.get_ref().as_raw_fd());

    let wait_state = drain(&mut [DrainTarget {
        name: "pipe",
        state,
        writer: &mut w,
    }]);
    assert_eq!(wait_state.resolution(0), Some(Resolution::Unwritable));
    assert_eq!(wait_state.rounds(), 0);
}

#[test]
fn reader_closed_while_draining() {
    let (mut read, write) = posix::pipe().unwrap();
    posix::set_nonblocking(write.as_raw_fd()).unwrap();
    let data = numbered_lines(LARGE);
    let state = StreamState::probe_raw(write.as_raw_fd());
    let mut w = buffered(write, &data);
    let reader = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        let mut buf = [0u8; 4096];
        read.read_exact(&mut buf).unwrap();
    });

    let wait_state = drain(&mut [DrainTarget {
        name: "pipe",
        state,
        writer: &mut w,
    }]);
    assert_eq!(wait_state.resolution(0), Some(Resolution::Unwritable));
    assert!(wait_state.rounds() >= 1);
    reader.join().unwrap();
}

#[test]
fn pending_stream_does_not_delay_ready_one() {
    let tmpdir = TempDir::new().unwrap();
    let tmpname = tmpdir.path().join("output");
    let file_data = numbered_lines(1000);
    let file = File::create(&tmpname).unwrap();
    let file_state = StreamState::probe_raw(file.as_raw_fd());
    let mut file_w = buffered(file, &file_data);

    let (read, write) = posix::pipe().unwrap();
    posix::set_nonblocking(write.as_raw_fd()).unwrap();
    let pipe_data = numbered_lines(LARGE);
    let pipe_state = StreamState::probe_raw(write.as_raw_fd());
    let mut pipe_w = buffered(write, &pipe_data);
    let reader = slow_reader(read, Duration::from_millis(50));

    let wait_state = drain(&mut [
        DrainTarget {
            name: "file",
            state: file_state,
            writer: &mut file_w,
        },
        DrainTarget {
            name: "pipe",
            state: pipe_state,
            writer: &mut pipe_w,
        },
    ]);
    assert!(wait_state.is_complete());
    assert_eq!(wait_state.resolution(0), Some(Resolution::Flushed));
    assert_eq!(wait_state.resolution(1), Some(Resolution::Drained));
    drop(file_w);
    drop(pipe_w);
    assert_eq!(fs::read(&tmpname).unwrap(), file_data);
    assert_eq!(reader.join().unwrap(), pipe_data);
}

#[test]
fn nothing_to_drain() {
    let wait_state = drain(&mut []);
    assert!(wait_state.is_complete());
    assert_eq!(wait_state.rounds(), 0);
}

#[cfg(target_os = "linux")]
#[test]
fn nonblocking_terminal_waits_for_reader() {
    let (mut master, slave) = posix::openpty_raw().unwrap();
    posix::set_nonblocking(slave.as_raw_fd()).unwrap();
    let data = numbered_lines(LARGE);
    let state = StreamState::probe_raw(slave.as_raw_fd());
    let mut w = buffered(slave, &data);
    let expected_len = data.len();
    let reader = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        // Reading a pty master past the slave's close fails with EIO rather
        // than reporting EOF, so read exactly what was sent.
        let mut received = vec![0u8; expected_len];
        master.read_exact(&mut received).unwrap();
        received
    });

    let wait_state = drain(&mut [DrainTarget {
        name: "tty",
        state,
        writer: &mut w,
    }]);
    assert_eq!(wait_state.resolution(0), Some(Resolution::Drained));
    assert!(wait_state.rounds() >= 1);
    assert!(w.buffer().is_empty());
    assert_eq!(reader.join().unwrap(), data);
}
