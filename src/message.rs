//! # Message module
//!
//! The layered transform between a plaintext and an encrypted, compressed and signed
//! OpenPGP message.
//!
//! ```text
//! PKESK, SEIPD ( Compressed ( OnePassSignature, Literal ( payload ), Signature ) )
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;

use crate::errors::{Error, Result};
use crate::packet::clamp_timestamp;

mod decode;
mod encode;

pub use self::decode::{DecodePipeline, DecodeReport};
pub use self::encode::EncodePipeline;

/// Metadata stored in the literal data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub file_name: String,
    pub modified: DateTime<Utc>,
}

impl FileMeta {
    /// The modification time is truncated to whole seconds and clamped to the range of
    /// a packet timestamp, 1970 to 2106.
    pub fn new(file_name: impl Into<String>, modified: DateTime<Utc>) -> Self {
        FileMeta {
            file_name: file_name.into(),
            modified: clamp_timestamp(modified),
        }
    }

    /// Metadata for data that is not backed by a file.
    pub fn now(file_name: impl Into<String>) -> Self {
        Self::new(file_name, Utc::now())
    }

    /// Name and modification time of the file at `path`.
    pub fn from_file(path: &Path, file: &File) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let modified = file
            .metadata()
            .and_then(|meta| meta.modified())
            .map_err(|source| Error::SourceUnreadable { source })?;
        Ok(Self::new(file_name, modified.into()))
    }
}

/// Name of the decoded file for a message at `input`: the last extension is dropped.
pub fn output_file_name(input: impl AsRef<Path>) -> PathBuf {
    input.as_ref().with_extension("")
}

pub(crate) fn open_source(path: &Path) -> Result<File> {
    debug!("reading from file: {}", path.display());
    File::open(path).map_err(|source| Error::SourceUnreadable { source })
}

pub(crate) fn create_sink(path: &Path) -> Result<BufWriter<File>> {
    debug!("writing to file: {}", path.display());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| Error::SinkUnwritable { source })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|source| Error::SinkUnwritable { source })?;
    Ok(BufWriter::new(file))
}

pub(crate) fn finish_sink<W: Write>(mut sink: W) -> Result<()> {
    sink.flush().map_err(write_error)
}

/// Classifies a failed write into one of the layers.
///
/// The layers only surface crate errors they produced themselves, anything else comes
/// from the sink.
pub(crate) fn write_error(err: io::Error) -> Error {
    if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
        Error::from_read(err)
    } else {
        Error::SinkUnwritable { source: err }
    }
}

/// Maps plain I/O failures of a layer's `finish` to the sink.
pub(crate) fn sink_error(err: Error) -> Error {
    match err {
        Error::IO { source, .. } => write_error(source),
        err => err,
    }
}
