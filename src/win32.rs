#![allow(non_snake_case)]

use std::io::{Error, Result};
use std::os::windows::io::RawHandle;

use winapi::um::fileapi;
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use winapi::um::processenv;
use winapi::um::winbase;

pub use winapi::um::winbase::{FILE_TYPE_CHAR, FILE_TYPE_DISK, FILE_TYPE_PIPE};

use crate::stream::StandardStream;

fn check_handle(raw_handle: RawHandle) -> Result<RawHandle> {
    if raw_handle.is_null() || raw_handle == INVALID_HANDLE_VALUE as RawHandle {
        // A process started without a console has null standard handles;
        // GetLastError() is not meaningful then.
        return Err(Error::from_raw_os_error(
            winapi::shared::winerror::ERROR_INVALID_HANDLE as i32,
        ));
    }
    Ok(raw_handle)
}

/// Borrowed raw handle of a standard output stream.
///
/// The handle is owned by the process and must not be closed.
pub fn GetStdHandle(which: StandardStream) -> Result<RawHandle> {
    let id = match which {
        StandardStream::Output => winbase::STD_OUTPUT_HANDLE,
        StandardStream::Error => winbase::STD_ERROR_HANDLE,
    };
    check_handle(unsafe { processenv::GetStdHandle(id) } as RawHandle)
}

pub fn GetFileType(handle: RawHandle) -> u32 {
    unsafe { fileapi::GetFileType(handle as _) }
}
