use sha1::{Digest, Sha1};

use crate::errors::{Error, Result};

/// Two octet checksum: sum of all octets mod 65536.
#[inline]
pub fn simple(expected: &[u8], data: &[u8]) -> Result<()> {
    if expected.len() != 2 || expected[..] != calculate_simple(data).to_be_bytes() {
        return Err(Error::InvalidChecksum);
    }

    Ok(())
}

#[inline]
pub fn calculate_simple(data: &[u8]) -> u16 {
    let sum = data.iter().map(|v| u32::from(*v)).sum::<u32>();
    (sum & 0xffff) as u16
}

/// SHA1 checksum, first 20 octets.
#[inline]
pub fn sha1(expected: &[u8], data: &[u8]) -> Result<()> {
    if expected != &Sha1::digest(data)[..] {
        return Err(Error::InvalidChecksum);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_wraps() {
        let data = vec![0xFFu8; 300];
        let sum = calculate_simple(&data);
        assert_eq!(sum, ((300u32 * 255) & 0xffff) as u16);
        simple(&sum.to_be_bytes(), &data).unwrap();
        assert!(simple(&[0, 0], &data).is_err());
        assert!(simple(&[0], &data).is_err());
    }

    #[test]
    fn test_sha1() {
        let hash = Sha1::digest(b"abc");
        sha1(&hash, b"abc").unwrap();
        assert!(sha1(&hash, b"abd").is_err());
    }
}
