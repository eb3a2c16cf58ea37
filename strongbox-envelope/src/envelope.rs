//! Seal/open for encrypted packages.
//!
//! The encoded header doubles as the AEAD associated data, so any change
//! to the stored algorithm, version, or DEK id fails authentication even
//! before the id checks run.

use zeroize::Zeroizing;

use crate::aead::{self, KEY_BYTES};
use crate::error::EnvelopeError;
use crate::wire::{
    decode_package, encode_header, encode_package, PackageHeader, ALG_AES256_GCM, ENVELOPE_VERSION,
};

/// Result of opening a package: the plaintext plus the header that was
/// authenticated with it, so callers can observe which DEK sealed it.
#[derive(Debug)]
pub struct OpenedSecret {
    pub plaintext: Zeroizing<Vec<u8>>,
    pub header: PackageHeader,
}

/// Seal `plaintext` under the DEK `key`, recording `dek_id` in the header.
pub fn seal(key: &[u8; KEY_BYTES], dek_id: u32, plaintext: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    let header = PackageHeader::current(dek_id);
    let header_bytes = encode_header(&header)?;
    let payload = aead::encrypt(key, plaintext, &header_bytes)?;
    Ok(encode_package(&header, &payload)?)
}

/// Decode only the header of a stored package.
///
/// This is how callers learn which DEK to resolve before calling [`open`].
/// The header is not yet authenticated at this point; `open` verifies it.
pub fn peek_header(package: &[u8]) -> Result<PackageHeader, EnvelopeError> {
    Ok(decode_package(package)?.header)
}

/// Open a stored package with the DEK `key`.
///
/// `expected_dek_id`, when given, is the DEK id recorded next to the
/// package at rest; disagreement with the embedded header id is a
/// data-integrity fault and fails before any decryption.
pub fn open(
    key: &[u8; KEY_BYTES],
    package: &[u8],
    expected_dek_id: Option<u32>,
) -> Result<OpenedSecret, EnvelopeError> {
    let pkg = decode_package(package)?;

    if pkg.header.alg != ALG_AES256_GCM {
        return Err(EnvelopeError::UnsupportedAlgorithm(pkg.header.alg));
    }
    if pkg.header.version > ENVELOPE_VERSION {
        return Err(EnvelopeError::UnsupportedVersion(pkg.header.version));
    }
    if let Some(expected) = expected_dek_id {
        if expected != pkg.header.dek_id {
            return Err(EnvelopeError::DekIdMismatch {
                expected,
                found: pkg.header.dek_id,
            });
        }
    }

    let header_bytes = encode_header(&pkg.header)?;
    let plaintext = aead::decrypt(key, &pkg.payload, &header_bytes)?;

    Ok(OpenedSecret {
        plaintext,
        header: pkg.header,
    })
}
