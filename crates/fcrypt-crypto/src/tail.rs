//! Reader adapter that withholds the last N bytes of a stream
//!
//! [`TailReader`] surfaces every byte of the wrapped reader except the
//! final `n`; once the source is exhausted those `n` bytes are available
//! through [`TailReader::tail`]. This is what lets the authenticated
//! decryption path feed ciphertext to the MAC while the trailing tag is
//! peeled off on the fly, without buffering the whole payload.

use std::io::{self, Read};

/// Buffer floor: three pages keeps refills coarse even for small tails.
const MIN_BUF_SIZE: usize = 3 * 4096;

pub struct TailReader<R> {
    inner: R,
    buf: Vec<u8>,
    /// Start of unread bytes in `buf`
    read_head: usize,
    /// End of filled bytes in `buf`
    fill_head: usize,
    tail_size: usize,
    seen_eof: bool,
}

impl<R: Read> TailReader<R> {
    /// Wrap `inner` so that its final `tail_size` bytes never reach `read`.
    pub fn new(inner: R, tail_size: usize) -> Self {
        Self {
            inner,
            buf: vec![0u8; MIN_BUF_SIZE.max(tail_size + 4096)],
            read_head: 0,
            fill_head: 0,
            tail_size,
            seen_eof: false,
        }
    }

    /// Bytes currently safe to hand out: everything buffered except the
    /// candidate tail.
    fn available(&self) -> usize {
        (self.fill_head - self.read_head).saturating_sub(self.tail_size)
    }

    /// Slide unread bytes to the front so the fill region regains room.
    fn compact(&mut self) {
        if self.read_head > 0 {
            self.buf.copy_within(self.read_head..self.fill_head, 0);
            self.fill_head -= self.read_head;
            self.read_head = 0;
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        if self.fill_head == self.buf.len() {
            self.compact();
        }
        loop {
            match self.inner.read(&mut self.buf[self.fill_head..]) {
                Ok(0) => {
                    self.seen_eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.fill_head += n;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// The withheld bytes, available once the source is exhausted.
    ///
    /// Drains any bytes the consumer has not read yet. A source shorter
    /// than the configured tail size yields `UnexpectedEof`.
    pub fn tail(&mut self) -> io::Result<Vec<u8>> {
        if !self.seen_eof || self.available() > 0 {
            io::copy(self, &mut io::sink())?;
        }
        let buffered = self.fill_head - self.read_head;
        if buffered < self.tail_size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended before the withheld tail was complete",
            ));
        }
        Ok(self.buf[self.fill_head - self.tail_size..self.fill_head].to_vec())
    }
}

impl<R: Read> Read for TailReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut copied = 0;
        while copied < out.len() {
            let available = self.available();
            if available > 0 {
                let n = available.min(out.len() - copied);
                out[copied..copied + n]
                    .copy_from_slice(&self.buf[self.read_head..self.read_head + n]);
                self.read_head += n;
                copied += n;
                continue;
            }
            if self.seen_eof || copied > 0 {
                break;
            }
            self.fill()?;
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that hands out its data in fixed-size dribbles.
    struct Dribble<'a> {
        data: &'a [u8],
        pos: usize,
        step: usize,
    }

    impl Read for Dribble<'_> {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            let n = self
                .step
                .min(out.len())
                .min(self.data.len() - self.pos);
            out[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn drain(reader: &mut impl Read) -> Vec<u8> {
        let mut all = Vec::new();
        reader.read_to_end(&mut all).unwrap();
        all
    }

    #[test]
    fn body_plus_tail_equals_source() {
        let data: Vec<u8> = (0..60 * 4096u32).map(|i| (i % 251) as u8).collect();
        let mut tr = TailReader::new(&data[..], 64);

        let body = drain(&mut tr);
        let tail = tr.tail().unwrap();
        assert_eq!(body.len(), data.len() - 64);
        assert_eq!(body, data[..data.len() - 64]);
        assert_eq!(tail, data[data.len() - 64..]);
    }

    #[test]
    fn source_exactly_tail_sized() {
        let data = [0xEEu8; 32];
        let mut tr = TailReader::new(&data[..], 32);
        assert!(drain(&mut tr).is_empty());
        assert_eq!(tr.tail().unwrap(), data);
    }

    #[test]
    fn short_source_is_unexpected_eof() {
        let data = [0u8; 10];
        let mut tr = TailReader::new(&data[..], 32);
        assert!(drain(&mut tr).is_empty());
        let err = tr.tail().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn tail_drains_unread_body() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 241) as u8).collect();
        let mut tr = TailReader::new(&data[..], 16);
        // consumer never reads: tail() must still find the last 16 bytes
        assert_eq!(tr.tail().unwrap(), data[data.len() - 16..]);
    }

    #[test]
    fn zero_tail_is_passthrough() {
        let data = b"plain passthrough".to_vec();
        let mut tr = TailReader::new(&data[..], 0);
        assert_eq!(drain(&mut tr), data);
        assert!(tr.tail().unwrap().is_empty());
    }

    #[test]
    fn dribbling_source_survives_buffer_wraps() {
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 239) as u8).collect();
        let mut tr = TailReader::new(
            Dribble {
                data: &data,
                pos: 0,
                step: 7,
            },
            64,
        );
        let mut body = Vec::new();
        let mut chunk = [0u8; 113];
        loop {
            let n = tr.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(body, data[..data.len() - 64]);
        assert_eq!(tr.tail().unwrap(), data[data.len() - 64..]);
    }

    #[test]
    fn source_error_propagates() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "boom"))
            }
        }
        let mut tr = TailReader::new(Failing, 8);
        let err = tr.read(&mut [0u8; 16]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn split_is_exact_for_any_source(
                data in proptest::collection::vec(any::<u8>(), 0..=16384),
                tail in 0usize..=128,
                step in 1usize..=512,
            ) {
                let mut tr = TailReader::new(
                    Dribble { data: &data, pos: 0, step },
                    tail,
                );
                let body = drain(&mut tr);
                if data.len() >= tail {
                    let t = tr.tail().unwrap();
                    prop_assert_eq!(body.len(), data.len() - tail);
                    let mut joined = body;
                    joined.extend_from_slice(&t);
                    prop_assert_eq!(joined, data);
                } else {
                    prop_assert!(body.is_empty());
                    prop_assert!(tr.tail().is_err());
                }
            }
        }
    }
}
