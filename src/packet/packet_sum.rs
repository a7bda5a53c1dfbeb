use bytes::Bytes;

use crate::errors::Result;
use crate::packet::{
    Marker, OnePassSignature, PublicKeyEncryptedSessionKey, PublicKeyPacket,
    SecretKeyPacket, Signature, UserId,
};
use crate::types::Tag;

/// A fully buffered packet, as found in key rings and around the message layers.
///
/// Streamed packets (literal, compressed and encrypted data) are never buffered and show up
/// here only as [`Packet::Other`].
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum Packet {
    PublicKey(PublicKeyPacket),
    PublicSubkey(PublicKeyPacket),
    SecretKey(SecretKeyPacket),
    SecretSubkey(SecretKeyPacket),
    UserId(UserId),
    Signature(Signature),
    OnePassSignature(OnePassSignature),
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    Marker(Marker),
    /// Trust, user attributes and anything else this crate has no use for.
    Other {
        tag: Tag,
        #[debug("{}", hex::encode(body))]
        body: Bytes,
    },
}

impl Packet {
    /// Parses a packet body according to its tag.
    pub fn from_parts(tag: Tag, body: Bytes) -> Result<Self> {
        let packet = match tag {
            Tag::PublicKey => Packet::PublicKey(PublicKeyPacket::from_buf(body)?),
            Tag::PublicSubkey => Packet::PublicSubkey(PublicKeyPacket::from_buf(body)?),
            Tag::SecretKey => Packet::SecretKey(SecretKeyPacket::from_buf(body)?),
            Tag::SecretSubkey => Packet::SecretSubkey(SecretKeyPacket::from_buf(body)?),
            Tag::UserId => Packet::UserId(UserId::from_buf(body)),
            Tag::Signature => Packet::Signature(Signature::from_buf(body)?),
            Tag::OnePassSignature => Packet::OnePassSignature(OnePassSignature::from_buf(body)?),
            Tag::PublicKeyEncryptedSessionKey => Packet::PublicKeyEncryptedSessionKey(
                PublicKeyEncryptedSessionKey::from_buf(body)?,
            ),
            Tag::Marker => Packet::Marker(Marker::from_buf(body)?),
            _ => Packet::Other { tag, body },
        };
        Ok(packet)
    }

    pub fn tag(&self) -> Tag {
        match self {
            Packet::PublicKey(_) => Tag::PublicKey,
            Packet::PublicSubkey(_) => Tag::PublicSubkey,
            Packet::SecretKey(_) => Tag::SecretKey,
            Packet::SecretSubkey(_) => Tag::SecretSubkey,
            Packet::UserId(_) => Tag::UserId,
            Packet::Signature(_) => Tag::Signature,
            Packet::OnePassSignature(_) => Tag::OnePassSignature,
            Packet::PublicKeyEncryptedSessionKey(_) => Tag::PublicKeyEncryptedSessionKey,
            Packet::Marker(_) => Tag::Marker,
            Packet::Other { tag, .. } => *tag,
        }
    }
}
