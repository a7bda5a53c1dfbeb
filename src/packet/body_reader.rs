use std::io::{self, BufRead, Read};

use log::debug;

use crate::errors::{Error, Result};
use crate::packet::PacketHeader;
use crate::types::{PacketLength, Tag};

/// Streams the body of a single packet, resolving its length encoding.
///
/// Partial body chunks are joined transparently. The reader stops at the end of the
/// packet, leaving the source positioned at the next header.
#[derive(Debug)]
pub struct PacketBodyReader<R: BufRead> {
    tag: Tag,
    source: R,
    state: BodyState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyState {
    Fixed { remaining: u32 },
    Partial { remaining: u32 },
    Indeterminate,
    Done,
}

impl<R: BufRead> PacketBodyReader<R> {
    pub fn new(header: PacketHeader, source: R) -> Self {
        let state = match header.packet_length() {
            PacketLength::Fixed(0) => BodyState::Done,
            PacketLength::Fixed(remaining) => BodyState::Fixed { remaining },
            PacketLength::Partial(remaining) => BodyState::Partial { remaining },
            PacketLength::Indeterminate => BodyState::Indeterminate,
        };
        PacketBodyReader {
            tag: header.tag(),
            source,
            state,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn is_done(&self) -> bool {
        self.state == BodyState::Done
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// Reads the whole remaining body into memory.
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_to_end(&mut out).map_err(Error::from_read)?;
        Ok(out)
    }

    /// Skips the rest of the body.
    pub fn drain(&mut self) -> Result<u64> {
        io::copy(self, &mut io::sink()).map_err(Error::from_read)
    }

    /// Moves on to the next chunk if the current one is exhausted.
    fn advance_chunk(&mut self) -> io::Result<()> {
        loop {
            match self.state {
                BodyState::Fixed { remaining: 0 } => self.state = BodyState::Done,
                BodyState::Partial { remaining: 0 } => {
                    let next = PacketLength::try_from_reader(&mut self.source)?;
                    debug!("{:?}: next chunk {:?}", self.tag, next);
                    self.state = match next {
                        PacketLength::Fixed(0) => BodyState::Done,
                        PacketLength::Fixed(remaining) => BodyState::Fixed { remaining },
                        PacketLength::Partial(remaining) => BodyState::Partial { remaining },
                        PacketLength::Indeterminate => {
                            return Err(invalid("indeterminate length inside a partial body"))
                        }
                    };
                }
                _ => return Ok(()),
            }
        }
    }
}

fn invalid(message: &str) -> io::Error {
    Error::UnexpectedFormat {
        message: message.to_string(),
    }
    .into_io()
}

impl<R: BufRead> BufRead for PacketBodyReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.advance_chunk()?;
        let limit = match self.state {
            BodyState::Done => return Ok(&[]),
            BodyState::Fixed { remaining } | BodyState::Partial { remaining } => {
                Some(remaining as usize)
            }
            BodyState::Indeterminate => None,
        };

        let buf = self.source.fill_buf()?;
        match limit {
            Some(_) if buf.is_empty() => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "packet body is truncated",
            )),
            Some(limit) => Ok(&buf[..buf.len().min(limit)]),
            None => Ok(buf),
        }
    }

    fn consume(&mut self, amt: usize) {
        match &mut self.state {
            BodyState::Fixed { remaining } | BodyState::Partial { remaining } => {
                let amt = amt.min(*remaining as usize);
                *remaining -= amt as u32;
                self.source.consume(amt);
            }
            BodyState::Indeterminate => self.source.consume(amt),
            BodyState::Done => {}
        }
    }
}

impl<R: BufRead> Read for PacketBodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut read = 0;
        // keep going across chunk boundaries, short reads confuse decompressors
        while read < buf.len() {
            let available = self.fill_buf()?;
            if available.is_empty() {
                break;
            }
            let n = available.len().min(buf.len() - read);
            buf[read..read + n].copy_from_slice(&available[..n]);
            self.consume(n);
            read += n;
        }
        Ok(read)
    }
}
