// src/error.rs

use std::fmt;
use std::io;

/// Custom `Error` type for the ring buffer and the capture front end.
#[derive(Debug)]
pub enum Error {
    /// The buffer was asked to hold zero (or fewer) bytes.
    InvalidCapacity(i64),
    /// A write did not fit. The first `written` bytes were committed anyway.
    Overflow { written: usize, requested: usize },
    /// Captures OS-specific error codes.
    OsError(u32),
    /// Represents any unexpected error.
    Unexpected,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCapacity(n) => write!(f, "invalid capacity: {}", n),
            Error::Overflow { written, requested } => write!(
                f,
                "buffer overflow: accepted {} of {} bytes",
                written, requested
            ),
            Error::OsError(code) => write!(f, "OS error with code: {}", code),
            Error::Unexpected => write!(f, "Unexpected error occurred"),
        }
    }
}

impl std::error::Error for Error {}

impl From<u32> for Error {
    fn from(code: u32) -> Self {
        Error::OsError(code)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        (e.raw_os_error().unwrap_or(0) as u32).into()
    }
}

impl Error {
    /// Bytes that were accepted by the operation that failed.
    pub fn written(&self) -> usize {
        match self {
            Error::Overflow { written, .. } => *written,
            _ => 0,
        }
    }

    /// Maps the error to the process exit status used by the `circbuf` binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidCapacity(_) => 2,
            Error::Overflow { .. } => 3,
            Error::OsError(_) => 1,
            Error::Unexpected => 70,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Error::InvalidCapacity(0).to_string(), "invalid capacity: 0");
        assert_eq!(
            Error::Overflow { written: 6, requested: 11 }.to_string(),
            "buffer overflow: accepted 6 of 11 bytes"
        );
    }

    #[test]
    fn test_written() {
        assert_eq!(Error::Overflow { written: 3, requested: 11 }.written(), 3);
        assert_eq!(Error::InvalidCapacity(-1).written(), 0);
    }

    #[test]
    fn test_from_os_code() {
        let err = Error::from(13u32);
        assert!(matches!(err, Error::OsError(13)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_from_io_error() {
        let err: Error = io::Error::from_raw_os_error(2).into();
        assert!(matches!(err, Error::OsError(2)));

        let err: Error = io::Error::new(io::ErrorKind::Other, "no code").into();
        assert!(matches!(err, Error::OsError(0)));
    }
}
