use std::io;

use bytes::Bytes;

use crate::errors::Result;
use crate::ser::Serialize;

/// User ID Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.11>
///
/// The content is conventionally UTF-8, but kept as raw octets so that key rings with
/// legacy encodings still load.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
#[debug("UserId({:?})", String::from_utf8_lossy(_0))]
pub struct UserId(Bytes);

impl UserId {
    pub fn from_buf(input: Bytes) -> Self {
        UserId(input)
    }

    pub fn id(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for UserId {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.0.len()
    }
}
