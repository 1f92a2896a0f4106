#[cfg(unix)]
mod drain;
