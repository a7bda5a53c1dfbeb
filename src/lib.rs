//! # pgp-transform
//!
//! Streaming OpenPGP message transform for a single recipient.
//!
//! Encoding signs a plaintext with the sender's RSA key, compresses it and encrypts it to
//! the recipient's RSA key:
//!
//! ```text
//! PKESK, SEIPD ( Compressed ( OnePassSignature, Literal ( payload ), Signature ) )
//! ```
//!
//! Decoding reverses the layers and verifies the signature. Key material comes from GnuPG
//! compatible key rings, binary or ASCII armored.
//!
//! ```no_run
//! use pgp_transform::{DecodePipeline, EncodePipeline, KeyMaterial, KeyRingConfig};
//!
//! # fn main() -> pgp_transform::errors::Result<()> {
//! let config = KeyRingConfig::new("pubring.gpg", "secring.gpg", "passphrase");
//! let keys = KeyMaterial::load(&config)?;
//!
//! EncodePipeline::new().encode_file(
//!     rand::thread_rng(),
//!     keys.public_key(),
//!     keys.private_key(),
//!     "plain.txt",
//!     "plain.txt.gpg",
//! )?;
//! let report = DecodePipeline::new().decode_file(
//!     keys.private_key(),
//!     &keys,
//!     "plain.txt.gpg",
//!     "out/plain.txt",
//! )?;
//! println!("signature: {}", report.verification);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod armor;
pub mod crypto;
pub mod errors;
pub mod keyring;
pub mod message;
pub mod packet;
pub mod signing;
pub mod types;

mod normalize_lines;
mod parsing;
mod parsing_reader;
mod ser;
mod util;

pub use self::errors::{Error, ErrorKind, Result};
pub use self::keyring::{
    KeyLookup, KeyMaterial, KeyRingConfig, KeyRingStore, PrivateKey, PublicKey, SecretKey,
};
pub use self::message::{output_file_name, DecodePipeline, DecodeReport, EncodePipeline, FileMeta};
pub use self::ser::Serialize;
pub use self::signing::{SignatureContext, VerificationContext, VerificationResult};
pub use self::util::BUFFER_SIZE;
