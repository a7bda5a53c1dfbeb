use std::io::{BufRead, BufReader, Read};

use log::{debug, warn};

use crate::armor::{is_armored, BlockType, Dearmor};
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{Packet, PacketParser, PublicKeyPacket, Signature, SignatureType, UserId};
use crate::types::{Fingerprint, KeyFlags, KeyId, Tag};

/// A primary key or subkey packet, as stored in one kind of key ring.
pub trait KeyPacket: Clone + Sized {
    /// Splits a parsed packet into primary keys, subkeys and everything else.
    fn classify(packet: Packet) -> Classified<Self>;

    fn public_packet(&self) -> &PublicKeyPacket;
}

/// Role of a packet inside a key ring.
#[derive(Debug)]
pub enum Classified<K> {
    Primary(K),
    Subkey(K),
    /// A key packet of the other ring kind, which means the input is the wrong file.
    Foreign(Tag),
    Other(Packet),
}

/// A key from a ring, with the capabilities its self signatures grant and the ring's user ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingKey<K> {
    packet: K,
    key_flags: Option<KeyFlags>,
    user_ids: Vec<UserId>,
    primary_id: KeyId,
}

impl<K: KeyPacket> RingKey<K> {
    pub fn packet(&self) -> &K {
        &self.packet
    }

    pub fn public_packet(&self) -> &PublicKeyPacket {
        self.packet.public_packet()
    }

    pub fn key_id(&self) -> KeyId {
        self.public_packet().key_id()
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.public_packet().fingerprint()
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.public_packet().algorithm()
    }

    /// Flags from the newest self or binding signature that carries any.
    pub fn key_flags(&self) -> Option<KeyFlags> {
        self.key_flags
    }

    /// The user ids of the ring this key belongs to.
    pub fn user_ids(&self) -> &[UserId] {
        &self.user_ids
    }

    /// Only the first user id of a ring is ever embedded in signatures.
    pub fn primary_user_id(&self) -> Option<&UserId> {
        self.user_ids.first()
    }

    /// Key id of the ring's primary key.
    pub fn primary_key_id(&self) -> KeyId {
        self.primary_id
    }

    pub fn is_primary(&self) -> bool {
        self.primary_id == self.key_id()
    }

    pub fn can_encrypt(&self) -> bool {
        self.algorithm().can_encrypt() && self.key_flags.map_or(true, KeyFlags::encrypt)
    }

    pub fn can_sign(&self) -> bool {
        self.algorithm().can_sign() && self.key_flags.map_or(true, KeyFlags::sign)
    }

    pub fn is_encryption_key(&self) -> bool {
        self.can_encrypt()
    }

    /// A pure signing key: it can sign but cannot encrypt.
    pub fn is_signing_key(&self) -> bool {
        self.can_sign() && !self.can_encrypt()
    }

    pub(crate) fn map_packet<T>(&self, f: impl FnOnce(&K) -> T) -> RingKey<T> {
        RingKey {
            packet: f(&self.packet),
            key_flags: self.key_flags,
            user_ids: self.user_ids.clone(),
            primary_id: self.primary_id,
        }
    }
}

/// One primary key with its subkeys, in storage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRing<K> {
    keys: Vec<RingKey<K>>,
}

impl<K: KeyPacket> KeyRing<K> {
    pub fn primary(&self) -> &RingKey<K> {
        // rings are only built around a primary key
        &self.keys[0]
    }

    /// Primary key first, then the subkeys.
    pub fn keys(&self) -> impl Iterator<Item = &RingKey<K>> {
        self.keys.iter()
    }

    pub fn user_ids(&self) -> &[UserId] {
        self.primary().user_ids()
    }
}

/// An ordered collection of key rings, read from one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRingBundle<K> {
    rings: Vec<KeyRing<K>>,
}

impl<K: KeyPacket> KeyRingBundle<K> {
    /// Reads a bundle from binary or armored data.
    ///
    /// Several armor blocks, or several concatenated binary rings, form one bundle. Packets
    /// that fail to parse are skipped. Any failure to delimit packets, or key packets of the
    /// wrong ring kind, make the whole source [`Error::KeyRingCorrupt`].
    pub fn from_reader<R: Read>(input: R) -> Result<Self> {
        let packets = read_packets(BufReader::new(input)).map_err(corrupt)?;
        let bundle = Self::from_packets(packets).map_err(corrupt)?;
        debug!(
            "loaded {} key rings with {} keys",
            bundle.rings.len(),
            bundle.keys().count()
        );
        Ok(bundle)
    }

    /// Groups already parsed packets into rings.
    pub fn from_packets(packets: impl IntoIterator<Item = Packet>) -> Result<Self> {
        let mut rings = Vec::new();
        let mut current: Option<RingBuilder<K>> = None;

        for packet in packets {
            match K::classify(packet) {
                Classified::Primary(key) => {
                    if let Some(ring) = current.take() {
                        rings.push(ring.build());
                    }
                    current = Some(RingBuilder::new(key));
                }
                Classified::Subkey(key) => match current.as_mut() {
                    Some(ring) => ring.subkeys.push((key, Vec::new())),
                    None => warn!(
                        "ignoring subkey {} without primary key",
                        key.public_packet().key_id()
                    ),
                },
                Classified::Foreign(tag) => {
                    return Err(Error::UnexpectedFormat {
                        message: format!("unexpected {tag:?} packet in key ring"),
                    });
                }
                Classified::Other(Packet::UserId(id)) => match current.as_mut() {
                    Some(ring) => ring.user_ids.push(id),
                    None => warn!("ignoring user id {id} without primary key"),
                },
                Classified::Other(Packet::Signature(sig)) => match current.as_mut() {
                    Some(ring) => ring.push_signature(sig),
                    None => warn!("ignoring signature without primary key"),
                },
                Classified::Other(other) => debug!("skipping {:?} packet", other.tag()),
            }
        }
        if let Some(ring) = current.take() {
            rings.push(ring.build());
        }

        Ok(KeyRingBundle { rings })
    }

    pub fn rings(&self) -> &[KeyRing<K>] {
        &self.rings
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// All keys, rings in source order and keys in storage order.
    pub fn keys(&self) -> impl Iterator<Item = &RingKey<K>> {
        self.rings.iter().flat_map(KeyRing::keys)
    }

    /// Any primary key or subkey with the given id.
    pub fn find(&self, key_id: &KeyId) -> Option<&RingKey<K>> {
        self.keys().find(|key| &key.key_id() == key_id)
    }
}

fn corrupt(err: Error) -> Error {
    match err {
        Error::SourceUnreadable { .. } | Error::KeyRingCorrupt { .. } => err,
        err => Error::KeyRingCorrupt {
            source: Box::new(err),
        },
    }
}

struct RingBuilder<K> {
    primary: K,
    signatures: Vec<Signature>,
    user_ids: Vec<UserId>,
    subkeys: Vec<(K, Vec<Signature>)>,
}

impl<K: KeyPacket> RingBuilder<K> {
    fn new(primary: K) -> Self {
        RingBuilder {
            primary,
            signatures: Vec::new(),
            user_ids: Vec::new(),
            subkeys: Vec::new(),
        }
    }

    /// Signatures after a subkey belong to that subkey, all others to the primary key.
    fn push_signature(&mut self, sig: Signature) {
        match self.subkeys.last_mut() {
            Some((_, sigs)) => sigs.push(sig),
            None => self.signatures.push(sig),
        }
    }

    fn build(self) -> KeyRing<K> {
        let primary_id = self.primary.public_packet().key_id();
        debug!("key ring {primary_id}: {} subkeys", self.subkeys.len());

        let primary_flags = newest_flags(&self.signatures, primary_id, |sig| {
            sig.typ().is_certification() || sig.typ() == SignatureType::Key
        });
        let mut keys = vec![RingKey {
            packet: self.primary,
            key_flags: primary_flags,
            user_ids: self.user_ids.clone(),
            primary_id,
        }];
        for (subkey, sigs) in self.subkeys {
            let key_flags = newest_flags(&sigs, primary_id, |sig| {
                sig.typ() == SignatureType::SubkeyBinding
            });
            keys.push(RingKey {
                packet: subkey,
                key_flags,
                user_ids: self.user_ids.clone(),
                primary_id,
            });
        }

        KeyRing { keys }
    }
}

/// Key flags of the newest matching signature made by the primary key.
///
/// The signatures are not verified, a key ring is trusted as a whole.
fn newest_flags(
    sigs: &[Signature],
    primary_id: KeyId,
    relevant: impl Fn(&Signature) -> bool,
) -> Option<KeyFlags> {
    sigs.iter()
        .filter(|sig| relevant(sig))
        .filter(|sig| sig.issuer().map_or(true, |issuer| issuer == primary_id))
        .filter_map(|sig| sig.key_flags().map(|flags| (sig.created().copied(), flags)))
        .max_by_key(|(created, _)| *created)
        .map(|(_, flags)| flags)
}

/// Reads all packets of all armor blocks, or of the binary input.
fn read_packets<R: BufRead>(mut input: R) -> Result<Vec<Packet>> {
    let mut packets = Vec::new();
    let mut blocks = 0;
    loop {
        if !is_armored(&mut input).map_err(Error::from_read)? {
            if !input.fill_buf().map_err(Error::from_read)?.is_empty() {
                if blocks > 0 {
                    warn!("ignoring trailing data after {blocks} armor blocks");
                } else {
                    collect_packets(&mut input, &mut packets)?;
                }
            }
            return Ok(packets);
        }

        let mut dearmor = Dearmor::new(&mut input);
        match dearmor.read_header()? {
            BlockType::PublicKey | BlockType::PrivateKey | BlockType::File => {}
            typ => {
                return Err(Error::UnexpectedFormat {
                    message: format!("unexpected armor block {typ} in key ring"),
                });
            }
        }
        let mut body = Vec::new();
        dearmor
            .read_to_end(&mut body)
            .map_err(Error::from_read)?;
        collect_packets(&body[..], &mut packets)?;
        blocks += 1;
    }
}

fn collect_packets<R: BufRead>(input: R, packets: &mut Vec<Packet>) -> Result<()> {
    let mut parser = PacketParser::new(input);
    while let Some(res) = parser.next() {
        match res {
            Ok(packet) => packets.push(packet),
            Err(err) if parser.is_done() => return Err(err),
            // already logged by the parser
            Err(_) => {}
        }
    }
    Ok(())
}
