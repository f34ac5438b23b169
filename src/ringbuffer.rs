//! Fixed-capacity single-producer/single-consumer byte FIFO.
//!
//! Grounded on `ringbuffer.c`/`ringbuffer.h`: a backing array one byte larger
//! than the usable capacity, with `r == w` meaning empty and `w + 1 == r`
//! (mod size) meaning full.

/// Returned by [`RingBuffer::append`] when the buffer has no free slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full;

/// Returned by [`RingBuffer::read`] when the buffer holds no bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Empty;

/// A fixed-capacity byte FIFO. Usable capacity is `capacity`; the backing
/// store is `capacity + 1` bytes so the full/empty cases stay distinguishable.
pub struct RingBuffer {
    data: Vec<u8>,
    r: usize,
    w: usize,
}

impl RingBuffer {
    /// Creates a ring buffer that can hold up to `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            data: vec![0u8; capacity + 1],
            r: 0,
            w: 0,
        }
    }

    /// Number of bytes currently readable.
    pub fn available(&self) -> usize {
        if self.w >= self.r {
            self.w - self.r
        } else {
            self.data.len() - (self.r - self.w)
        }
    }

    /// Appends one byte. Fails with [`Full`] if the buffer has no room.
    pub fn append(&mut self, byte: u8) -> Result<(), Full> {
        let next_w = (self.w + 1) % self.data.len();
        if next_w == self.r {
            return Err(Full);
        }
        self.data[self.w] = byte;
        self.w = next_w;
        Ok(())
    }

    /// Reads and removes one byte. Fails with [`Empty`] if none are available.
    pub fn read(&mut self) -> Result<u8, Empty> {
        if self.r == self.w {
            return Err(Empty);
        }
        let byte = self.data[self.r];
        self.r = (self.r + 1) % self.data.len();
        Ok(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_size_minus_one() {
        let mut rb = RingBuffer::new(4);
        for _ in 0..4 {
            rb.append(0xAA).unwrap();
        }
        assert_eq!(rb.append(0xBB), Err(Full));
    }

    #[test]
    fn available_after_append_and_read() {
        let mut rb = RingBuffer::new(8);
        for i in 0..5u8 {
            rb.append(i).unwrap();
        }
        for _ in 0..5 {
            rb.read().unwrap();
        }
        assert_eq!(rb.available(), 0);
    }

    #[test]
    fn fifo_order_preserved() {
        let mut rb = RingBuffer::new(4);
        rb.append(1).unwrap();
        rb.append(2).unwrap();
        assert_eq!(rb.read(), Ok(1));
        assert_eq!(rb.read(), Ok(2));
        assert_eq!(rb.read(), Err(Empty));
    }

    #[test]
    fn wraps_around_backing_store() {
        let mut rb = RingBuffer::new(3);
        rb.append(1).unwrap();
        rb.append(2).unwrap();
        rb.append(3).unwrap();
        assert_eq!(rb.read(), Ok(1));
        rb.append(4).unwrap();
        assert_eq!(rb.read(), Ok(2));
        assert_eq!(rb.read(), Ok(3));
        assert_eq!(rb.read(), Ok(4));
        assert_eq!(rb.available(), 0);
    }
}
