//! The wait-for-delivery loop behind [`exit`](fn@crate::exit).
//!
//! Every target gets one flush attempt up front. A target whose flush is
//! refused with `WouldBlock` stays pending; all pending targets are then
//! waited on together, and each one that becomes writable is flushed again.
//! A target resolves when its flush completes, or when its destination can
//! no longer accept data (reader closed, invalid descriptor, any write
//! error). The loop ends once every target has resolved.

use std::io::{ErrorKind, Write};

use crate::stream::{self, Readiness, StreamState};

/// How a drain target was resolved.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Resolution {
    /// The first flush attempt delivered everything.
    Flushed,
    /// Everything was delivered after waiting for the destination.
    Drained,
    /// The destination can no longer accept data; whatever was still
    /// buffered is abandoned.
    Unwritable,
}

/// A writer to drain, together with the probed state of its destination.
pub(crate) struct DrainTarget<'a> {
    pub name: &'static str,
    pub state: StreamState,
    pub writer: &'a mut dyn Write,
}

/// Per-target resolution for one drain pass.
#[derive(Debug)]
pub(crate) struct DrainWaitState {
    resolutions: Vec<Option<Resolution>>,
    rounds: usize,
}

impl DrainWaitState {
    fn new(count: usize) -> DrainWaitState {
        DrainWaitState {
            resolutions: vec![None; count],
            rounds: 0,
        }
    }

    pub fn resolution(&self, idx: usize) -> Option<Resolution> {
        self.resolutions[idx]
    }

    /// Number of times the loop had to wait for a destination.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn is_complete(&self) -> bool {
        self.resolutions.iter().all(Option::is_some)
    }

    fn pending(&self) -> Vec<usize> {
        (0..self.resolutions.len())
            .filter(|&idx| self.resolutions[idx].is_none())
            .collect()
    }
}

fn try_flush(target: &mut DrainTarget<'_>, on_success: Resolution) -> Option<Resolution> {
    loop {
        match target.writer.flush() {
            Ok(()) => return Some(on_success),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            // Whether the descriptor can still take data is for the wait to
            // find out; a WouldBlock alone never abandons the buffer.
            Err(e) if e.kind() == ErrorKind::WouldBlock && target.state.raw.is_some() => {
                return None;
            }
            Err(e) => {
                log::debug!("{}: giving up on flush: {}", target.name, e);
                return Some(Resolution::Unwritable);
            }
        }
    }
}

/// Flush all targets, waiting on those whose destination is not ready,
/// until each is either delivered or known to be undeliverable.
pub(crate) fn drain(targets: &mut [DrainTarget<'_>]) -> DrainWaitState {
    let mut wait_state = DrainWaitState::new(targets.len());
    for (idx, target) in targets.iter_mut().enumerate() {
        wait_state.resolutions[idx] = try_flush(target, Resolution::Flushed);
    }

    while !wait_state.is_complete() {
        let pending = wait_state.pending();
        wait_state.rounds += 1;

        let mut waiting_on = Vec::with_capacity(pending.len());
        let mut raw_streams = Vec::with_capacity(pending.len());
        for &idx in &pending {
            match targets[idx].state.raw {
                Some(raw) => {
                    waiting_on.push(idx);
                    raw_streams.push(raw);
                }
                None => wait_state.resolutions[idx] = Some(Resolution::Unwritable),
            }
        }
        if waiting_on.is_empty() {
            break;
        }
        log::trace!(
            "drain round {}: waiting on {:?}",
            wait_state.rounds,
            waiting_on.iter().map(|&idx| targets[idx].name).collect::<Vec<_>>()
        );

        let readiness = match stream::wait_writable(&raw_streams) {
            Ok(readiness) => readiness,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("cannot wait for output streams: {}", e);
                give_up(&mut wait_state, &waiting_on);
                break;
            }
        };
        for (&idx, ready) in waiting_on.iter().zip(readiness) {
            match ready {
                Readiness::Writable => {
                    wait_state.resolutions[idx] = try_flush(&mut targets[idx], Resolution::Drained);
                }
                Readiness::Closed => {
                    log::debug!("{}: destination closed while draining", targets[idx].name);
                    wait_state.resolutions[idx] = Some(Resolution::Unwritable);
                }
                Readiness::Waiting => {}
            }
        }
    }

    wait_state
}

fn give_up(wait_state: &mut DrainWaitState, indices: &[usize]) {
    for &idx in indices {
        wait_state.resolutions[idx] = Some(Resolution::Unwritable);
    }
}
