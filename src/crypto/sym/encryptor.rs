use std::io::{self, Write};

use log::debug;
use rand::{CryptoRng, Rng};
use sha1::{Digest, Sha1};

use super::{CfbEncryptor, SymmetricKeyAlgorithm};
use crate::errors::Result;
use crate::util::BUFFER_SIZE;

/// MDC packet header, as hashed and encrypted at the end of the data.
const MDC_HEADER: [u8; 2] = [0xD3, 0x14];

/// Encrypts everything written to it in OpenPGP CFB mode.
///
/// The random prefix is emitted on construction. With integrity protection the
/// plaintext is hashed as it passes, and [`SymEncryptWriter::finish`] appends the
/// encrypted modification detection code. Without it, the legacy resynchronization
/// after the prefix is applied.
pub struct SymEncryptWriter<W: Write> {
    mode: CfbEncryptor,
    mdc: Option<Sha1>,
    buffer: Vec<u8>,
    inner: W,
}

impl<W: Write> SymEncryptWriter<W> {
    pub fn new<R: CryptoRng + Rng>(
        mut rng: R,
        alg: SymmetricKeyAlgorithm,
        key: &[u8],
        protected: bool,
        mut inner: W,
    ) -> Result<Self> {
        let bs = alg.block_size();
        // IV is all zeroes
        let iv = vec![0u8; bs];
        let mut mode = CfbEncryptor::new(alg, key, &iv)?;

        let mut prefix = vec![0u8; bs + 2];
        rng.fill_bytes(&mut prefix[..bs]);
        // quick check
        prefix[bs] = prefix[bs - 2];
        prefix[bs + 1] = prefix[bs - 1];

        let mdc = if protected {
            debug!("protected encrypt stream ({alg})");
            let mut hasher = Sha1::new();
            hasher.update(&prefix);
            mode.encrypt(&mut prefix);
            Some(hasher)
        } else {
            debug!("legacy encrypt stream ({alg})");
            mode.encrypt(&mut prefix);
            // resync
            mode = CfbEncryptor::new(alg, key, &prefix[2..])?;
            None
        };
        inner.write_all(&prefix)?;

        Ok(SymEncryptWriter {
            mode,
            mdc,
            buffer: Vec::with_capacity(BUFFER_SIZE),
            inner,
        })
    }

    /// Writes the modification detection code, if any, and returns the inner writer.
    pub fn finish(mut self) -> Result<W> {
        if let Some(mut hasher) = self.mdc.take() {
            let mut trailer = [0u8; 22];
            trailer[..2].copy_from_slice(&MDC_HEADER);
            hasher.update(MDC_HEADER);
            trailer[2..].copy_from_slice(&hasher.finalize());
            self.mode.encrypt(&mut trailer);
            self.inner.write_all(&trailer)?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for SymEncryptWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len().min(BUFFER_SIZE);
        let buf = &buf[..len];
        if let Some(hasher) = self.mdc.as_mut() {
            hasher.update(buf);
        }
        self.buffer.clear();
        self.buffer.extend_from_slice(buf);
        self.mode.encrypt(&mut self.buffer);
        self.inner.write_all(&self.buffer)?;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
