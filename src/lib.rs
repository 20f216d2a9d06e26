//! # circbuf
//!
//! A fixed-capacity byte ring buffer for holding an unbounded stream, such as
//! a subprocess's output, to a fixed byte budget.
//!
//! Writes that don't fit keep the prefix that does and report an overflow.
//! Reads never fail: `0` means nothing is buffered right now.
//!
//! ```
//! use circbuf::{Error, RingBuffer};
//!
//! let mut buf = RingBuffer::new(6).unwrap();
//! let err = buf.write(b"hello world").unwrap_err();
//! assert!(matches!(err, Error::Overflow { written: 6, .. }));
//! assert_eq!(buf.bytes(), b"hello ");
//!
//! let mut out = [0u8; 16];
//! assert_eq!(buf.read(&mut out), 6);
//! assert_eq!(buf.read(&mut out), 0);
//! ```

pub mod capture;
pub mod circular_buffer;
pub mod config;
pub mod error;

pub use circular_buffer::RingBuffer;
pub use error::Error;
