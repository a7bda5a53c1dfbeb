use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use log::{debug, info, warn};

use crate::armor::{is_armored, BlockType, Dearmor};
use crate::crypto::sym::SymDecryptReader;
use crate::errors::{Error, Result};
use crate::keyring::{KeyLookup, PrivateKey};
use crate::message::{create_sink, finish_sink, open_source, write_error};
use crate::packet::{
    Decompressor, LiteralDataHeader, OnePassSignature, PacketBodyReader, PacketHeader,
    PublicKeyEncryptedSessionKey, Signature,
};
use crate::parsing_reader::BufReadParsing;
use crate::signing::{self, VerificationContext, VerificationResult};
use crate::types::Tag;
use crate::util::{fill_buffer, validate_chunk_size, BUFFER_SIZE};

/// Outcome of a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeReport {
    pub verification: VerificationResult,
    /// Name, modification time and mode of the literal data.
    pub header: LiteralDataHeader,
    /// Plaintext bytes written to the sink.
    pub bytes_written: u64,
}

/// Decrypts, decompresses and verifies a message.
///
/// The input may be binary or armored. Plaintext is streamed to the sink as it is
/// decrypted, so a message that fails its integrity check at the end has already been
/// written out when the error is returned.
#[derive(Debug, Clone)]
pub struct DecodePipeline {
    chunk_size: u32,
}

impl Default for DecodePipeline {
    fn default() -> Self {
        DecodePipeline {
            chunk_size: BUFFER_SIZE as u32,
        }
    }
}

impl DecodePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the plaintext copy buffer.
    pub fn chunk_size(mut self, size: u32) -> Result<Self> {
        validate_chunk_size(size)?;
        self.chunk_size = size;
        Ok(self)
    }

    /// Decodes the message in `source`, writing the plaintext to `sink`.
    ///
    /// `keys` resolves the signer of the message.
    pub fn decode<K, R, W>(
        &self,
        private_key: &PrivateKey,
        keys: &K,
        mut source: R,
        sink: W,
    ) -> Result<DecodeReport>
    where
        K: KeyLookup,
        R: BufRead,
        W: Write,
    {
        info!("decoding with key {}", private_key.key_id());
        let report = if is_armored(&mut source).map_err(Error::from_read)? {
            let mut dearmor = Dearmor::new(source);
            let typ = dearmor.read_header()?;
            if typ != BlockType::Message {
                return Err(Error::UnexpectedFormat {
                    message: format!("expected a message, found armor block {typ}"),
                });
            }
            let source = BufReader::with_capacity(self.chunk_size as usize, dearmor);
            self.decode_packets(private_key, keys, source, sink)?
        } else {
            self.decode_packets(private_key, keys, source, sink)?
        };
        info!(
            "decoded {} bytes of {:?}, signature {}",
            report.bytes_written,
            String::from_utf8_lossy(report.header.file_name()),
            report.verification
        );
        Ok(report)
    }

    /// Decodes the message at `input` into `output`, creating parent directories as needed.
    pub fn decode_file<K: KeyLookup>(
        &self,
        private_key: &PrivateKey,
        keys: &K,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<DecodeReport> {
        let source = BufReader::new(open_source(input.as_ref())?);
        let mut sink = create_sink(output.as_ref())?;
        let report = self.decode(private_key, keys, source, &mut sink)?;
        finish_sink(sink)?;
        Ok(report)
    }

    fn decode_packets<K, R, W>(
        &self,
        private_key: &PrivateKey,
        keys: &K,
        mut source: R,
        sink: W,
    ) -> Result<DecodeReport>
    where
        K: KeyLookup,
        R: BufRead,
        W: Write,
    {
        let (pkesks, header) = read_session_keys(&mut source)?;

        let Some(pkesk) = pkesks.first() else {
            return Err(Error::UnexpectedFormat {
                message: "no public key encrypted session key".into(),
            });
        };
        if pkesks.len() > 1 {
            debug!("{} session keys, using the first", pkesks.len());
        }
        if pkesk.id() != &private_key.key_id() && !pkesk.id().is_wildcard() {
            return Err(Error::KeyUnusable {
                message: format!(
                    "message is encrypted to {}, not {}",
                    pkesk.id(),
                    private_key.key_id()
                ),
            });
        }
        let (alg, session_key) = pkesk
            .decrypt(private_key.rsa())
            .map_err(|err| Error::KeyUnusable {
                message: format!("cannot decrypt session key: {err}"),
            })?;
        if !alg.is_supported() {
            return Err(Error::KeyUnusable {
                message: format!("message uses unsupported cipher {alg}"),
            });
        }

        let mut body = PacketBodyReader::new(header, &mut source);
        let mut decryptor = match header.tag() {
            Tag::SymEncryptedProtectedData => {
                let version = body.read_u8().map_err(Error::from_read)?;
                if version != 1 {
                    return Err(Error::UnexpectedFormat {
                        message: format!("unsupported encrypted data version {version}"),
                    });
                }
                SymDecryptReader::new_protected(alg, &session_key, &mut body)?
            }
            _ => {
                warn!("message is not integrity protected");
                SymDecryptReader::new_unprotected(alg, &session_key, &mut body)?
            }
        };

        let inner = next_header(&mut decryptor, "compressed or literal data")?;
        let report = if inner.tag() == Tag::CompressedData {
            let mut compressed = PacketBodyReader::new(inner, &mut decryptor);
            let decompressor = Decompressor::from_reader(&mut compressed)?;
            let mut plain = BufReader::with_capacity(self.chunk_size as usize, decompressor);
            let first = next_header(&mut plain, "literal data")?;
            let report = self.read_signed(keys, &mut plain, first, sink)?;
            drain(&mut plain, "compressed data")?;
            drop(plain);
            compressed.drain()?;
            report
        } else {
            self.read_signed(keys, &mut decryptor, inner, sink)?
        };

        // the modification detection code is checked at the end of the encrypted data
        drain(&mut decryptor, "encrypted data")?;
        drop(decryptor);
        body.drain()?;
        if source.has_remaining().map_err(Error::from_read)? {
            warn!("ignoring data after the encrypted data packet");
        }

        Ok(report)
    }

    /// Reads `[OnePassSignature] Literal [Signature]` and verifies the signature.
    fn read_signed<K, R, W>(
        &self,
        keys: &K,
        mut reader: R,
        first: PacketHeader,
        mut sink: W,
    ) -> Result<DecodeReport>
    where
        K: KeyLookup,
        R: BufRead,
        W: Write,
    {
        let mut header = first;
        let mut observed = None;
        if header.tag() == Tag::OnePassSignature {
            let body = PacketBodyReader::new(header, &mut reader).read_to_vec()?;
            let marker = OnePassSignature::from_buf(body.into())?;
            debug!("one-pass signature by {}", marker.key_id);
            observed = Some(VerificationContext::new(marker));
            header = next_header(&mut reader, "literal data")?;
        }
        if header.tag() != Tag::LiteralData {
            return Err(Error::UnexpectedFormat {
                message: format!("expected literal data, found {:?}", header.tag()),
            });
        }

        let mut literal = PacketBodyReader::new(header, &mut reader);
        let literal_header = LiteralDataHeader::try_from_reader(&mut literal)?;
        debug!("literal data {literal_header:?}");

        let mut buffer = vec![0u8; self.chunk_size as usize];
        let mut written = 0u64;
        loop {
            let read = fill_buffer(&mut literal, &mut buffer).map_err(Error::from_read)?;
            if read == 0 {
                break;
            }
            if let Some(ctx) = observed.as_mut() {
                ctx.update(&buffer[..read]);
            }
            sink.write_all(&buffer[..read]).map_err(write_error)?;
            written += read as u64;
        }
        sink.flush().map_err(write_error)?;
        drop(literal);

        let signature = match PacketHeader::try_from_reader(&mut reader)? {
            None => Ok(None),
            Some(header) if header.tag() == Tag::Signature => {
                let body = PacketBodyReader::new(header, &mut reader).read_to_vec()?;
                Signature::from_buf(body.into()).map(Some)
            }
            Some(header) => {
                return Err(Error::UnexpectedFormat {
                    message: format!("unexpected {:?} packet after literal data", header.tag()),
                })
            }
        };
        let verification = match signature {
            Ok(signature) => signing::verify(keys, observed, signature.as_ref()),
            Err(err) => {
                warn!("unreadable signature packet: {err}");
                VerificationResult::Invalid
            }
        };

        Ok(DecodeReport {
            verification,
            header: literal_header,
            bytes_written: written,
        })
    }
}

/// Reads the session key packets up to the encrypted data header.
///
/// One packet of another kind, such as a marker packet, is skipped.
fn read_session_keys<R: BufRead>(
    mut source: R,
) -> Result<(Vec<PublicKeyEncryptedSessionKey>, PacketHeader)> {
    let mut pkesks = Vec::new();
    let mut skipped = 0;
    loop {
        let header = next_header(&mut source, "encrypted data")?;
        let mut body = PacketBodyReader::new(header, &mut source);
        match header.tag() {
            Tag::SymEncryptedData | Tag::SymEncryptedProtectedData => {
                return Ok((pkesks, header));
            }
            Tag::PublicKeyEncryptedSessionKey => {
                let body = body.read_to_vec()?;
                match PublicKeyEncryptedSessionKey::from_buf(body.into()) {
                    Ok(pkesk) => pkesks.push(pkesk),
                    Err(err) => warn!("skipping unreadable session key packet: {err}"),
                }
            }
            Tag::SymKeyEncryptedSessionKey => {
                debug!("skipping password encrypted session key");
                body.drain()?;
            }
            tag if skipped == 0 => {
                debug!("skipping leading {tag:?} packet");
                body.drain()?;
                skipped += 1;
            }
            tag => {
                return Err(Error::UnexpectedFormat {
                    message: format!("unexpected {tag:?} packet before encrypted data"),
                });
            }
        }
    }
}

fn next_header<R: BufRead>(source: R, expected: &str) -> Result<PacketHeader> {
    PacketHeader::try_from_reader(source)?.ok_or_else(|| Error::UnexpectedFormat {
        message: format!("missing {expected}"),
    })
}

/// Consumes the rest of a layer, which should be empty.
fn drain<R: BufRead>(reader: &mut R, layer: &str) -> Result<()> {
    let rest = io::copy(reader, &mut io::sink()).map_err(Error::from_read)?;
    if rest > 0 {
        warn!("ignoring {rest} trailing bytes of {layer}");
    }
    Ok(())
}
