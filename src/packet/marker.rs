use std::io;

use bytes::Bytes;

use crate::errors::{ensure_eq, Result};
use crate::ser::Serialize;

/// PGP as UTF-8 octets.
const PGP: [u8; 3] = [0x50, 0x47, 0x50];

/// Marker Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.8>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Marker;

impl Marker {
    pub fn from_buf(input: Bytes) -> Result<Self> {
        ensure_eq!(&input[..], &PGP[..], "invalid marker packet");

        Ok(Marker)
    }
}

impl Serialize for Marker {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&PGP)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        PGP.len()
    }
}
