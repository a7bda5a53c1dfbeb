use std::io::{self, BufRead, Read, Write};

use byteorder::WriteBytesExt;
#[cfg(feature = "bzip2")]
use bzip2::{bufread::BzDecoder, write::BzEncoder};
use flate2::{
    bufread::{DeflateDecoder, ZlibDecoder},
    write::{DeflateEncoder, ZlibEncoder},
    Compression,
};
use log::debug;

use crate::errors::{unsupported_err, Error, Result};
use crate::parsing_reader::BufReadParsing;
use crate::types::CompressionAlgorithm;

/// Compresses the body of a compressed data packet.
///
/// The algorithm octet is written to `inner` on construction, everything written after that
/// is compressed.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.6>
pub enum Compressor<W: Write> {
    Uncompressed(W),
    Zip(DeflateEncoder<W>),
    Zlib(ZlibEncoder<W>),
    #[cfg(feature = "bzip2")]
    Bzip2(BzEncoder<W>),
}

impl<W: Write> Compressor<W> {
    pub fn new(alg: CompressionAlgorithm, mut inner: W) -> Result<Self> {
        let compressor = match alg {
            CompressionAlgorithm::Uncompressed => {
                write_algorithm(&mut inner, alg)?;
                Compressor::Uncompressed(inner)
            }
            CompressionAlgorithm::ZIP => {
                write_algorithm(&mut inner, alg)?;
                Compressor::Zip(DeflateEncoder::new(inner, Compression::default()))
            }
            CompressionAlgorithm::ZLIB => {
                write_algorithm(&mut inner, alg)?;
                Compressor::Zlib(ZlibEncoder::new(inner, Compression::default()))
            }
            #[cfg(feature = "bzip2")]
            CompressionAlgorithm::BZip2 => {
                write_algorithm(&mut inner, alg)?;
                Compressor::Bzip2(BzEncoder::new(inner, bzip2::Compression::default()))
            }
            _ => unsupported_err!("compression algorithm {:?}", alg),
        };
        debug!("compressing with {:?}", alg);
        Ok(compressor)
    }

    /// Flushes the compressed stream and returns the inner writer.
    pub fn finish(self) -> Result<W> {
        let inner = match self {
            Compressor::Uncompressed(w) => w,
            Compressor::Zip(e) => e.finish()?,
            Compressor::Zlib(e) => e.finish()?,
            #[cfg(feature = "bzip2")]
            Compressor::Bzip2(e) => e.finish()?,
        };
        Ok(inner)
    }
}

fn write_algorithm<W: Write>(inner: &mut W, alg: CompressionAlgorithm) -> Result<()> {
    inner.write_u8(alg.into())?;
    Ok(())
}

impl<W: Write> Write for Compressor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Compressor::Uncompressed(w) => w.write(buf),
            Compressor::Zip(e) => e.write(buf),
            Compressor::Zlib(e) => e.write(buf),
            #[cfg(feature = "bzip2")]
            Compressor::Bzip2(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Compressor::Uncompressed(w) => w.flush(),
            Compressor::Zip(e) => e.flush(),
            Compressor::Zlib(e) => e.flush(),
            #[cfg(feature = "bzip2")]
            Compressor::Bzip2(e) => e.flush(),
        }
    }
}

/// Decompresses the body of a compressed data packet.
#[derive(derive_more::Debug)]
pub enum Decompressor<R: BufRead> {
    Uncompressed(R),
    Zip(DeflateDecoder<R>),
    Zlib(ZlibDecoder<R>),
    #[cfg(feature = "bzip2")]
    Bzip2(#[debug(skip)] BzDecoder<R>),
}

impl<R: BufRead> Decompressor<R> {
    /// Reads the algorithm octet and sets up the matching decoder.
    pub fn from_reader(mut r: R) -> Result<Self> {
        let alg: CompressionAlgorithm = r.read_u8().map_err(Error::from_read)?.into();
        debug!("decompressing {:?}", alg);
        let decompressor = match alg {
            CompressionAlgorithm::Uncompressed => Decompressor::Uncompressed(r),
            CompressionAlgorithm::ZIP => Decompressor::Zip(DeflateDecoder::new(r)),
            CompressionAlgorithm::ZLIB => Decompressor::Zlib(ZlibDecoder::new(r)),
            #[cfg(feature = "bzip2")]
            CompressionAlgorithm::BZip2 => Decompressor::Bzip2(BzDecoder::new(r)),
            _ => {
                return Err(Error::UnexpectedFormat {
                    message: format!("unsupported compression algorithm {alg:?}"),
                })
            }
        };
        Ok(decompressor)
    }

    pub fn into_inner(self) -> R {
        match self {
            Decompressor::Uncompressed(r) => r,
            Decompressor::Zip(d) => d.into_inner(),
            Decompressor::Zlib(d) => d.into_inner(),
            #[cfg(feature = "bzip2")]
            Decompressor::Bzip2(d) => d.into_inner(),
        }
    }
}

impl<R: BufRead> Read for Decompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decompressor::Uncompressed(r) => r.read(buf),
            Decompressor::Zip(d) => d.read(buf),
            Decompressor::Zlib(d) => d.read(buf),
            #[cfg(feature = "bzip2")]
            Decompressor::Bzip2(d) => d.read(buf),
        }
    }
}
