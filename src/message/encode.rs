use std::io::{BufReader, Read, Write};
use std::path::Path;

use log::{debug, info};
use rand::{CryptoRng, Rng};

use crate::armor::{ArmorWriter, BlockType};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::{SymEncryptWriter, SymmetricKeyAlgorithm};
use crate::errors::{Error, Result};
use crate::keyring::{PrivateKey, PublicKey};
use crate::message::{
    create_sink, finish_sink, open_source, sink_error, write_error, FileMeta,
};
use crate::packet::{
    write_packet, Compressor, LiteralDataHeader, PartialBodyWriter, PublicKeyEncryptedSessionKey,
};
use crate::ser::Serialize;
use crate::signing::SignatureContext;
use crate::types::{CompressionAlgorithm, Tag};
use crate::util::{fill_buffer, validate_chunk_size, BUFFER_SIZE};

/// Version of the integrity protected data packet.
const SEIPD_VERSION: u8 = 1;

/// Signs, compresses and encrypts a plaintext for one recipient.
///
/// ```text
/// PKESK, SEIPD ( Compressed ( OnePassSignature, Literal ( payload ), Signature ) )
/// ```
///
/// Every streamed packet is written with partial body lengths of `chunk_size`, so the
/// plaintext never has to be held in memory.
#[derive(Debug, Clone)]
pub struct EncodePipeline {
    chunk_size: u32,
    symmetric_algorithm: SymmetricKeyAlgorithm,
    compression: CompressionAlgorithm,
    hash_algorithm: HashAlgorithm,
    integrity_protected: bool,
    armor: bool,
}

impl Default for EncodePipeline {
    fn default() -> Self {
        EncodePipeline {
            chunk_size: BUFFER_SIZE as u32,
            symmetric_algorithm: SymmetricKeyAlgorithm::default(),
            compression: CompressionAlgorithm::default(),
            hash_algorithm: HashAlgorithm::default(),
            integrity_protected: true,
            armor: false,
        }
    }
}

impl EncodePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the copy buffer and of every partial body chunk.
    pub fn chunk_size(mut self, size: u32) -> Result<Self> {
        validate_chunk_size(size)?;
        self.chunk_size = size;
        Ok(self)
    }

    pub fn symmetric_algorithm(mut self, alg: SymmetricKeyAlgorithm) -> Result<Self> {
        if !alg.is_supported() {
            return Err(Error::InvalidConfiguration {
                message: format!("symmetric algorithm {alg} is not supported"),
            });
        }
        self.symmetric_algorithm = alg;
        Ok(self)
    }

    pub fn compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.compression = compression;
        self
    }

    pub fn hash_algorithm(mut self, hash: HashAlgorithm) -> Self {
        self.hash_algorithm = hash;
        self
    }

    /// With `false`, the data is written as a legacy symmetrically encrypted packet,
    /// without modification detection code.
    pub fn integrity_protected(mut self, protected: bool) -> Self {
        self.integrity_protected = protected;
        self
    }

    /// Wraps the message in a `PGP MESSAGE` armor block.
    pub fn armor(mut self, armor: bool) -> Self {
        self.armor = armor;
        self
    }

    /// Encodes everything `source` yields into `sink`.
    ///
    /// `public_key` is the recipient, `private_key` the signer. Returns the number of
    /// plaintext bytes consumed.
    pub fn encode<RAND, R, W>(
        &self,
        rng: RAND,
        public_key: &PublicKey,
        private_key: &PrivateKey,
        source: R,
        sink: W,
        meta: &FileMeta,
    ) -> Result<u64>
    where
        RAND: Rng + CryptoRng,
        R: Read,
        W: Write,
    {
        info!(
            "encoding {:?} for {} signed by {}",
            meta.file_name,
            public_key.key_id(),
            private_key.key_id()
        );
        let written = if self.armor {
            let armor = ArmorWriter::new(BlockType::Message, sink).map_err(sink_error)?;
            let (armor, written) =
                self.encode_packets(rng, public_key, private_key, source, armor, meta)?;
            armor.finish().map_err(sink_error)?;
            written
        } else {
            self.encode_packets(rng, public_key, private_key, source, sink, meta)?
                .1
        };
        info!("encoded {written} bytes of {:?}", meta.file_name);
        Ok(written)
    }

    /// Encodes the file at `input` into a message at `output`.
    ///
    /// The literal data packet carries the input's file name and modification time.
    /// Parent directories of `output` are created as needed.
    pub fn encode_file<RAND>(
        &self,
        rng: RAND,
        public_key: &PublicKey,
        private_key: &PrivateKey,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<u64>
    where
        RAND: Rng + CryptoRng,
    {
        let input = input.as_ref();
        let source = open_source(input)?;
        let meta = FileMeta::from_file(input, &source)?;
        let mut sink = create_sink(output.as_ref())?;

        let written = self.encode(
            rng,
            public_key,
            private_key,
            BufReader::new(source),
            &mut sink,
            &meta,
        )?;
        finish_sink(sink)?;
        Ok(written)
    }

    fn encode_packets<RAND, R, W>(
        &self,
        mut rng: RAND,
        public_key: &PublicKey,
        private_key: &PrivateKey,
        mut source: R,
        mut sink: W,
        meta: &FileMeta,
    ) -> Result<(W, u64)>
    where
        RAND: Rng + CryptoRng,
        R: Read,
        W: Write,
    {
        if !public_key.is_encryption_key() || !public_key.algorithm().is_rsa() {
            return Err(Error::KeyUnusable {
                message: format!(
                    "key {} ({}) cannot encrypt",
                    public_key.key_id(),
                    public_key.algorithm()
                ),
            });
        }
        let recipient = public_key.rsa_public_key().map_err(|err| Error::KeyUnusable {
            message: format!("key {}: {err}", public_key.key_id()),
        })?;
        let mut signer = SignatureContext::begin(private_key, self.hash_algorithm)?;

        let alg = self.symmetric_algorithm;
        let session_key = alg.new_session_key(&mut rng);
        let pkesk = PublicKeyEncryptedSessionKey::encrypt_rsa(
            &mut rng,
            public_key.key_id(),
            &recipient,
            alg,
            &session_key,
        )?;
        write_packet(&mut sink, Tag::PublicKeyEncryptedSessionKey, &pkesk).map_err(sink_error)?;

        // encryption layer
        let tag = if self.integrity_protected {
            Tag::SymEncryptedProtectedData
        } else {
            Tag::SymEncryptedData
        };
        let mut encrypted = PartialBodyWriter::new(tag, self.chunk_size, sink)?;
        if self.integrity_protected {
            encrypted.write_all(&[SEIPD_VERSION]).map_err(write_error)?;
        }
        let encryptor = SymEncryptWriter::new(
            &mut rng,
            alg,
            &session_key,
            self.integrity_protected,
            encrypted,
        )
        .map_err(sink_error)?;

        // compression layer
        let compressed = PartialBodyWriter::new(Tag::CompressedData, self.chunk_size, encryptor)?;
        let mut compressor = Compressor::new(self.compression, compressed).map_err(sink_error)?;

        let marker = signer.one_pass_marker()?;
        write_packet(&mut compressor, Tag::OnePassSignature, &marker).map_err(sink_error)?;

        // literal layer
        let header = LiteralDataHeader::new_binary(&meta.file_name, meta.modified);
        let mut literal = PartialBodyWriter::new(Tag::LiteralData, self.chunk_size, compressor)?;
        header.to_writer(&mut literal).map_err(sink_error)?;

        let mut buffer = vec![0u8; self.chunk_size as usize];
        let mut total = 0u64;
        loop {
            let read = fill_buffer(&mut source, &mut buffer)
                .map_err(|source| Error::SourceUnreadable { source })?;
            if read == 0 {
                break;
            }
            signer.update(&buffer[..read])?;
            literal.write_all(&buffer[..read]).map_err(write_error)?;
            total += read as u64;
        }
        debug!("literal data done, {total} bytes");

        // close inner to outer, the signature goes after the literal packet
        let mut compressor = literal.finish().map_err(sink_error)?;
        let signature = signer.finalize()?;
        write_packet(&mut compressor, Tag::Signature, &signature).map_err(sink_error)?;
        let compressed = compressor.finish().map_err(sink_error)?;
        let encryptor = compressed.finish().map_err(sink_error)?;
        let encrypted = encryptor.finish().map_err(sink_error)?;
        let sink = encrypted.finish().map_err(sink_error)?;

        Ok((sink, total))
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::errors::ErrorKind;
    use crate::keyring::KeyMaterial;
    use crate::packet::{PacketHeader, PacketParser};
    use crate::types::PacketLength;

    fn alice() -> KeyMaterial {
        let _ = pretty_env_logger::try_init();
        KeyMaterial::from_readers(
            File::open("./tests/fixtures/alice.pub.gpg").unwrap(),
            File::open("./tests/fixtures/alice.sec.gpg").unwrap(),
            b"test",
        )
        .unwrap()
    }

    fn encode(pipeline: &EncodePipeline, keys: &KeyMaterial, data: &[u8]) -> Vec<u8> {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut out = Vec::new();
        let written = pipeline
            .encode(
                &mut rng,
                keys.public_key(),
                keys.private_key(),
                data,
                &mut out,
                &FileMeta::now("test.txt"),
            )
            .unwrap();
        assert_eq!(written, data.len() as u64);
        out
    }

    #[test]
    fn test_outer_packets() {
        let keys = alice();
        let out = encode(&EncodePipeline::new(), &keys, b"hello world");

        let mut parser = PacketParser::new(&out[..]);
        let pkesk = parser.next().unwrap().unwrap();
        assert_eq!(pkesk.tag(), Tag::PublicKeyEncryptedSessionKey);

        let mut rest = parser.into_inner();
        let header = PacketHeader::try_from_reader(&mut rest).unwrap().unwrap();
        assert_eq!(header.tag(), Tag::SymEncryptedProtectedData);
        assert!(matches!(header.packet_length(), PacketLength::Fixed(_)));
    }

    #[test]
    fn test_legacy_packet() {
        let keys = alice();
        let pipeline = EncodePipeline::new()
            .integrity_protected(false)
            .symmetric_algorithm(SymmetricKeyAlgorithm::TripleDES)
            .unwrap();
        let out = encode(&pipeline, &keys, b"hello world");

        let mut parser = PacketParser::new(&out[..]);
        parser.next().unwrap().unwrap();
        let mut rest = parser.into_inner();
        let header = PacketHeader::try_from_reader(&mut rest).unwrap().unwrap();
        assert_eq!(header.tag(), Tag::SymEncryptedData);
    }

    #[test]
    fn test_large_input_is_chunked() {
        let keys = alice();
        let pipeline = EncodePipeline::new()
            .chunk_size(512)
            .unwrap()
            .compression(CompressionAlgorithm::Uncompressed);
        let out = encode(&pipeline, &keys, &[7u8; 4096]);

        let mut parser = PacketParser::new(&out[..]);
        parser.next().unwrap().unwrap();
        let mut rest = parser.into_inner();
        let header = PacketHeader::try_from_reader(&mut rest).unwrap().unwrap();
        assert_eq!(header.packet_length(), PacketLength::Partial(512));
    }

    #[test]
    fn test_armored() {
        let keys = alice();
        let out = encode(&EncodePipeline::new().armor(true), &keys, b"hello world");
        let text = std::str::from_utf8(&out).unwrap();
        assert!(text.starts_with("-----BEGIN PGP MESSAGE-----\n"));
        assert!(text.ends_with("-----END PGP MESSAGE-----\n"));
    }

    #[test]
    fn test_invalid_settings() {
        for size in [1000, 256, 1 << 31] {
            let err = EncodePipeline::new().chunk_size(size).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfiguration, "size {size}");
        }
        assert!(EncodePipeline::new().chunk_size(1 << 30).is_ok());

        let err = EncodePipeline::new()
            .symmetric_algorithm(SymmetricKeyAlgorithm::Plaintext)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn test_signing_only_recipient() {
        let keys = alice();
        let primary = keys.public_keys().rings()[0].primary().clone();
        let err = EncodePipeline::new()
            .encode(
                ChaCha8Rng::seed_from_u64(1),
                &primary,
                keys.private_key(),
                &b"data"[..],
                Vec::new(),
                &FileMeta::now("data"),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyUnusable);
    }
}
