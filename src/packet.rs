//! # Packet module
//!
//! Packet framing and the packets used by the message layers and key rings.

mod body_reader;
mod header;
mod many;
mod packet_sum;
mod partial_writer;

mod compressed_data;
mod key;
mod literal_data;
mod marker;
mod one_pass_signature;
mod public_key_encrypted_session_key;
mod signature;
mod user_id;

pub use self::{
    body_reader::PacketBodyReader,
    compressed_data::{Compressor, Decompressor},
    header::{write_packet, PacketHeader},
    key::{PublicKeyPacket, SecretKeyPacket},
    literal_data::{DataMode, LiteralDataHeader},
    many::PacketParser,
    marker::Marker,
    one_pass_signature::OnePassSignature,
    packet_sum::Packet,
    partial_writer::PartialBodyWriter,
    public_key_encrypted_session_key::{PkeskValues, PublicKeyEncryptedSessionKey},
    signature::{
        Signature, SignatureConfig, SignatureType, SignatureVersionSpecific, Subpacket,
        SubpacketData, SubpacketLength,
    },
    user_id::UserId,
};

pub(crate) use self::{header::MAX_PARTIAL_LEN, literal_data::clamp_timestamp};
