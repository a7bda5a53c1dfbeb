use std::io::{self, BufRead, Read};

use bytes::{Buf, BytesMut};
use log::debug;
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use super::{CfbDecryptor, SymmetricKeyAlgorithm};
use crate::errors::{Error, Result};
use crate::util::{fill_buffer, BUFFER_SIZE};

const MDC_LEN: usize = 22;

#[derive(derive_more::Debug)]
enum Integrity {
    Protected {
        #[debug(skip)]
        hasher: Sha1,
    },
    Unprotected,
}

impl Integrity {
    fn is_protected(&self) -> bool {
        matches!(self, Self::Protected { .. })
    }
}

/// Decrypts OpenPGP CFB encrypted data read from `R`.
///
/// With integrity protection the last 22 octets are held back until the end of the
/// stream and checked as the modification detection code. The trailer is never
/// returned to the caller; a mismatch surfaces as [`Error::MdcError`] on the final read.
#[derive(derive_more::Debug)]
pub struct SymDecryptReader<R: BufRead> {
    state: State<R>,
}

#[derive(derive_more::Debug)]
enum State<R: BufRead> {
    Prefix {
        alg: SymmetricKeyAlgorithm,
        #[debug(skip)]
        key: Zeroizing<Vec<u8>>,
        #[debug(skip)]
        decryptor: CfbDecryptor,
        #[debug(skip)]
        source: R,
        integrity: Integrity,
    },
    Data {
        /// How much data has been decrypted and hashed and is available
        /// in the `buffer`, without MDC.
        data_available: usize,
        #[debug(skip)]
        decryptor: CfbDecryptor,
        buffer: BytesMut,
        #[debug(skip)]
        source: R,
        integrity: Integrity,
    },
    Done {
        buffer: BytesMut,
        #[debug(skip)]
        source: R,
    },
    Error,
}

impl<R: BufRead> SymDecryptReader<R> {
    /// Decryption of integrity protected data (SEIPDv1).
    pub fn new_protected(alg: SymmetricKeyAlgorithm, key: &[u8], source: R) -> Result<Self> {
        Self::new(alg, key, source, true)
    }

    /// Decryption of legacy symmetrically encrypted data.
    pub fn new_unprotected(alg: SymmetricKeyAlgorithm, key: &[u8], source: R) -> Result<Self> {
        Self::new(alg, key, source, false)
    }

    fn new(alg: SymmetricKeyAlgorithm, key: &[u8], source: R, protected: bool) -> Result<Self> {
        debug!("decrypt stream ({alg}, protected: {protected})");

        // IV is all zeroes
        let iv = vec![0u8; alg.block_size()];
        let decryptor = CfbDecryptor::new(alg, key, &iv)?;

        let integrity = if protected {
            Integrity::Protected {
                hasher: Sha1::new(),
            }
        } else {
            Integrity::Unprotected
        };

        Ok(SymDecryptReader {
            state: State::Prefix {
                alg,
                key: Zeroizing::new(key.to_vec()),
                decryptor,
                source,
                integrity,
            },
        })
    }

    /// Returns the underlying reader, unless a previous read failed fatally.
    pub fn into_inner(self) -> Option<R> {
        match self.state {
            State::Prefix { source, .. } | State::Data { source, .. } | State::Done { source, .. } => {
                Some(source)
            }
            State::Error => None,
        }
    }

    /// Whether the whole input was decrypted, checked and handed out.
    pub fn is_done(&self) -> bool {
        matches!(&self.state, State::Done { buffer, .. } if !buffer.has_remaining())
    }
}

impl<R: BufRead> State<R> {
    fn fill_inner(&mut self) -> io::Result<()> {
        loop {
            let needs_replacing = match self {
                Self::Prefix { .. } => true,
                Self::Data {
                    data_available,
                    decryptor,
                    buffer,
                    source,
                    integrity,
                } => {
                    // keep at least a full MDC in the buffer, so it is processed at the end
                    let protected = integrity.is_protected();
                    if protected && buffer.remaining() > MDC_LEN
                        || !protected && buffer.has_remaining()
                    {
                        return Ok(());
                    }

                    let current_len = buffer.len();
                    let to_read = BUFFER_SIZE - current_len;
                    buffer.resize(BUFFER_SIZE, 0);
                    let read = fill_buffer(&mut *source, &mut buffer[current_len..])?;
                    buffer.truncate(current_len + read);
                    decryptor.decrypt(&mut buffer[current_len..]);

                    if read < to_read {
                        true
                    } else {
                        let end = match integrity {
                            Integrity::Protected { hasher } => {
                                let end = buffer.len() - MDC_LEN;
                                hasher.update(&buffer[*data_available..end]);
                                end
                            }
                            Integrity::Unprotected => buffer.len(),
                        };
                        *data_available = end;
                        return Ok(());
                    }
                }
                Self::Done { .. } => return Ok(()),
                Self::Error => {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        "decryptor failed previously",
                    ))
                }
            };

            if needs_replacing {
                match std::mem::replace(self, Self::Error) {
                    Self::Prefix {
                        alg,
                        key,
                        mut decryptor,
                        mut source,
                        mut integrity,
                    } => {
                        let bs = alg.block_size();
                        let mut prefix = vec![0u8; bs + 2];
                        let read = fill_buffer(&mut source, &mut prefix)?;
                        if read < bs + 2 {
                            return Err(Error::UnexpectedFormat {
                                message: "encrypted data shorter than its prefix".into(),
                            }
                            .into_io());
                        }

                        match integrity {
                            Integrity::Unprotected => {
                                // legacy resyncing
                                let encrypted_prefix = prefix[2..].to_vec();
                                decryptor.decrypt(&mut prefix);
                                decryptor = CfbDecryptor::new(alg, &key, &encrypted_prefix)
                                    .map_err(Error::into_io)?;
                            }
                            Integrity::Protected { ref mut hasher } => {
                                decryptor.decrypt(&mut prefix);
                                hasher.update(&prefix);
                            }
                        }

                        // The quick check octets are not used, it acts as an oracle.
                        // <https://eprint.iacr.org/2005/033>

                        *self = Self::Data {
                            data_available: 0,
                            decryptor,
                            buffer: BytesMut::with_capacity(BUFFER_SIZE),
                            source,
                            integrity,
                        };
                    }
                    Self::Data {
                        mut buffer,
                        source,
                        integrity,
                        ..
                    } => {
                        if let Integrity::Protected { mut hasher } = integrity {
                            if buffer.remaining() < MDC_LEN {
                                return Err(Error::UnexpectedFormat {
                                    message: "missing modification detection code".into(),
                                }
                                .into_io());
                            }

                            // 1 byte packet tag, 1 byte length and the 20 byte SHA1 hash
                            let mdc = buffer.split_off(buffer.len() - MDC_LEN);
                            hasher.update(&buffer);
                            hasher.update(&mdc[..2]);
                            let sha1 = hasher.finalize();

                            if mdc[0] != 0xD3 || mdc[1] != 0x14 || mdc[2..] != sha1[..] {
                                return Err(Error::MdcError.into_io());
                            }
                        }

                        *self = Self::Done { buffer, source };
                    }
                    Self::Done { .. } | Self::Error => {
                        unreachable!("only prefix and data states are replaced")
                    }
                }
            }
        }
    }
}

impl<R: BufRead> BufRead for SymDecryptReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.state.fill_inner()?;
        match &mut self.state {
            State::Data {
                buffer,
                data_available,
                ..
            } => Ok(&buffer[..*data_available]),
            State::Done { buffer, .. } => Ok(&buffer[..]),
            State::Prefix { .. } | State::Error => Ok(&[]),
        }
    }

    fn consume(&mut self, amt: usize) {
        match &mut self.state {
            State::Data {
                buffer,
                data_available,
                ..
            } => {
                let amt = amt.min(*data_available);
                buffer.advance(amt);
                *data_available -= amt;
            }
            State::Done { buffer, .. } => {
                let amt = amt.min(buffer.len());
                buffer.advance(amt);
            }
            State::Prefix { .. } | State::Error => {}
        }
    }
}

impl<R: BufRead> Read for SymDecryptReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let to_write = available.len().min(buf.len());
        buf[..to_write].copy_from_slice(&available[..to_write]);
        self.consume(to_write);
        Ok(to_write)
    }
}
