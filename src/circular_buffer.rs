use crate::error::Error;
use log::debug;
use std::fmt;
use std::io;
use std::ops::Range;

/// Fixed-capacity byte ring buffer.
///
/// Storage is allocated once. Two logical cursors only ever grow: the write
/// cursor counts every byte accepted, the read cursor every byte consumed.
/// Their difference is the unread content, which never exceeds the capacity.
/// A write that does not fit keeps the prefix that does and reports an
/// overflow; a read never fails and returns 0 when nothing is buffered.
pub struct RingBuffer {
    buffer: Box<[u8]>,
    write_cursor: u64,
    read_cursor: u64,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity(0));
        }
        Ok(Self {
            buffer: vec![0; capacity].into_boxed_slice(),
            write_cursor: 0,
            read_cursor: 0,
        })
    }

    /// Builds a buffer with the cursors already advanced.
    #[cfg(test)]
    pub(crate) fn with_cursors(capacity: usize, write_cursor: u64, read_cursor: u64) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        assert!(read_cursor <= write_cursor, "read cursor ahead of write cursor");
        assert!(
            write_cursor - read_cursor <= capacity as u64,
            "unread region larger than capacity"
        );
        Self {
            buffer: vec![0; capacity].into_boxed_slice(),
            write_cursor,
            read_cursor,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        (self.write_cursor - self.read_cursor) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.write_cursor == self.read_cursor
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Bytes the next write can take before it gets truncated.
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Physical index of a logical cursor, always in `0..capacity`.
    fn index(&self, cursor: u64) -> usize {
        cursor.rem_euclid(self.capacity() as u64) as usize
    }

    /// Physical ranges covering `count` bytes from `cursor`: the part up to
    /// the end of storage, then the part that wrapped to the front.
    fn segments(&self, cursor: u64, count: usize) -> (Range<usize>, Range<usize>) {
        let start = self.index(cursor);
        let first = count.min(self.capacity() - start);
        (start..start + first, 0..count - first)
    }

    /// Append as much of `data` as fits.
    ///
    /// Returns the number of bytes accepted. If `data` did not fit, the
    /// accepted prefix is still committed and the count is carried by
    /// `Error::Overflow`.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, Error> {
        let to_add = data.len().min(self.free());

        if to_add > 0 {
            let (head, tail) = self.segments(self.write_cursor, to_add);
            let split = head.len();
            self.buffer[head].copy_from_slice(&data[..split]);
            self.buffer[tail].copy_from_slice(&data[split..to_add]);
            self.write_cursor += to_add as u64;
        }

        if to_add < data.len() {
            debug!(
                "ring buffer overflow: accepted {} of {} bytes (capacity {})",
                to_add,
                data.len(),
                self.capacity()
            );
            return Err(Error::Overflow {
                written: to_add,
                requested: data.len(),
            });
        }

        Ok(to_add)
    }

    /// Move up to `out.len()` unread bytes into `out`.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let to_take = out.len().min(self.len());

        if to_take == 0 {
            return 0;
        }

        let (head, tail) = self.segments(self.read_cursor, to_take);
        let split = head.len();
        out[..split].copy_from_slice(&self.buffer[head]);
        out[split..to_take].copy_from_slice(&self.buffer[tail]);
        self.read_cursor += to_take as u64;

        to_take
    }

    /// The unread content as two slices, in order. The second is empty
    /// unless the content wraps around the end of storage.
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        let (head, tail) = self.segments(self.read_cursor, self.len());
        (&self.buffer[head], &self.buffer[tail])
    }

    /// Copy of the unread content. Does not consume it.
    pub fn bytes(&self) -> Vec<u8> {
        let (head, tail) = self.as_slices();
        let mut result = Vec::with_capacity(head.len() + tail.len());
        result.extend_from_slice(head);
        result.extend_from_slice(tail);
        result
    }

    /// Drop everything buffered. Storage is kept.
    pub fn reset(&mut self) {
        self.write_cursor = 0;
        self.read_cursor = 0;
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("write_cursor", &self.write_cursor)
            .field("read_cursor", &self.read_cursor)
            .finish()
    }
}

impl io::Write for RingBuffer {
    /// Short writes are reported as `Ok(n)`. Only a write that could not
    /// place a single byte fails, with `WriteZero`.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match RingBuffer::write(self, buf) {
            Ok(n) => Ok(n),
            Err(Error::Overflow { written, .. }) if written > 0 => Ok(written),
            Err(e) => Err(io::Error::new(io::ErrorKind::WriteZero, e)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for RingBuffer {
    /// `Ok(0)` means nothing is buffered right now, not end of stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(RingBuffer::read(self, buf))
    }
}
