use std::io::BufRead;

use log::{debug, warn};

use crate::errors::{Error, Result};
use crate::packet::{Packet, PacketBodyReader, PacketHeader};

/// Parses complete packets, in a streaming fashion, from the given reader.
///
/// A packet whose body fails to parse is reported as an error, after which parsing continues
/// with the next packet. Framing errors end the iteration, since the packet boundaries are
/// lost.
pub struct PacketParser<R: BufRead> {
    reader: R,
    done: bool,
}

impl<R: BufRead> PacketParser<R> {
    pub fn new(reader: R) -> Self {
        PacketParser {
            reader,
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// True once the input is exhausted or framing failed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn next_packet(&mut self) -> Result<Option<Result<Packet>>> {
        let Some(header) = PacketHeader::try_from_reader(&mut self.reader)? else {
            return Ok(None);
        };
        let tag = header.tag();
        let mut body = PacketBodyReader::new(header, &mut self.reader);
        let body = body.read_to_vec()?;
        debug!("parsing {:?} body of {} bytes", tag, body.len());

        Ok(Some(Packet::from_parts(tag, body.into())))
    }
}

impl<R: BufRead> Iterator for PacketParser<R> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_packet() {
            Ok(Some(Ok(packet))) => Some(Ok(packet)),
            Ok(Some(Err(err))) => {
                warn!("invalid packet: {err}");
                Some(Err(err))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(Error::UnexpectedFormat {
                    message: format!("packet framing: {err}"),
                }))
            }
        }
    }
}
