use bytes::Bytes;

/// Key usage flags from the key flags signature subpacket.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.21>
#[derive(Clone, Copy, PartialEq, Eq, Default, derive_more::Debug)]
#[debug("KeyFlags({:#04x})", _0)]
pub struct KeyFlags(u8);

impl KeyFlags {
    const CERTIFY: u8 = 0x01;
    const SIGN: u8 = 0x02;
    const ENCRYPT_COMMS: u8 = 0x04;
    const ENCRYPT_STORAGE: u8 = 0x08;

    /// Only the first octet carries flags this crate cares about.
    pub fn from_bytes(bytes: &Bytes) -> Self {
        KeyFlags(bytes.first().copied().unwrap_or_default())
    }

    pub fn certify(self) -> bool {
        self.0 & Self::CERTIFY != 0
    }

    pub fn sign(self) -> bool {
        self.0 & Self::SIGN != 0
    }

    /// True if either of the two encryption flags is set.
    pub fn encrypt(self) -> bool {
        self.0 & (Self::ENCRYPT_COMMS | Self::ENCRYPT_STORAGE) != 0
    }
}

impl From<u8> for KeyFlags {
    fn from(value: u8) -> Self {
        KeyFlags(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let sc = KeyFlags::from_bytes(&Bytes::from_static(&[0x03]));
        assert!(sc.certify());
        assert!(sc.sign());
        assert!(!sc.encrypt());

        let e = KeyFlags::from(0x0C);
        assert!(e.encrypt());
        assert!(!e.sign());

        assert_eq!(KeyFlags::from_bytes(&Bytes::new()), KeyFlags::default());
    }
}
