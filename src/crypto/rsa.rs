use log::debug;
use rand::{CryptoRng, Rng};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{unsupported_err, Result};
use crate::types::{Mpi, PlainSecretParams};

/// Builds the public key from its parameters.
pub fn public_key(n: &Mpi, e: &Mpi) -> Result<RsaPublicKey> {
    let key = RsaPublicKey::new(n.into(), e.into())?;
    Ok(key)
}

/// Builds the private key from the public parameters and the unlocked secret ones.
pub fn private_key(n: &Mpi, e: &Mpi, secret: &PlainSecretParams) -> Result<RsaPrivateKey> {
    let PlainSecretParams::RSA { d, p, q, .. } = secret else {
        unsupported_err!("secret parameters are not RSA parameters");
    };
    let key = RsaPrivateKey::from_components(
        BigUint::from(n),
        BigUint::from(e),
        d.clone(),
        vec![p.clone(), q.clone()],
    )?;
    key.validate()?;
    Ok(key)
}

/// RSA encryption using PKCS1v15 padding.
pub fn encrypt<R: CryptoRng + Rng>(
    mut rng: R,
    key: &RsaPublicKey,
    plaintext: &[u8],
) -> Result<Mpi> {
    debug!("RSA encrypt to a {} bit key", key.size() * 8);
    let data = key.encrypt(&mut rng, Pkcs1v15Encrypt, plaintext)?;
    Ok(Mpi::from_slice(&data))
}

/// RSA decryption using PKCS1v15 padding.
pub fn decrypt(key: &RsaPrivateKey, ciphertext: &Mpi) -> Result<Zeroizing<Vec<u8>>> {
    // leading zeros were stripped when stored as an MPI
    let ciphertext = ciphertext.to_padded(key.size());
    let m = key.decrypt(Pkcs1v15Encrypt, &ciphertext)?;
    Ok(Zeroizing::new(m))
}

/// Sign a digest using RSA, with PKCS1v15 padding.
pub fn sign(key: &RsaPrivateKey, hash: HashAlgorithm, digest: &[u8]) -> Result<Mpi> {
    let sig = key.sign(padding(hash)?, digest)?;
    Ok(Mpi::from_slice(&sig))
}

/// Verify a RSA, PKCS1v15 padded signature over a digest.
pub fn verify(key: &RsaPublicKey, hash: HashAlgorithm, digest: &[u8], sig: &Mpi) -> Result<()> {
    let sig = sig.to_padded(key.size());
    key.verify(padding(hash)?, digest, &sig)?;
    Ok(())
}

fn padding(hash: HashAlgorithm) -> Result<Pkcs1v15Sign> {
    let scheme = match hash {
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<sha2::Sha224>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        _ => unsupported_err!("RSA signatures with {}", hash),
    };
    Ok(scheme)
}
