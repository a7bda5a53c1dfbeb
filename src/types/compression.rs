use num_enum::{FromPrimitive, IntoPrimitive};

/// Available compression algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-9.3>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
#[non_exhaustive]
pub enum CompressionAlgorithm {
    Uncompressed = 0,
    /// Raw deflate, RFC 1951.
    ZIP = 1,
    /// Deflate with zlib framing, RFC 1950.
    ZLIB = 2,
    BZip2 = 3,

    #[num_enum(catch_all)]
    #[cfg_attr(test, proptest(skip))]
    Other(u8),
}

impl Default for CompressionAlgorithm {
    fn default() -> Self {
        Self::ZIP
    }
}
