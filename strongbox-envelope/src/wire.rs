//! Encrypted-package wire format (v1)
//!
//! Layout:
//!   package = header_len[4 BE] || header || payload_len[4 BE] || payload
//!   header  = alg_len[2 BE] || alg (utf8) || version[4 BE] || dek_id[4 BE]
//!
//! The header encoding is canonical by construction: identical logical
//! header values always serialize to identical bytes, which lets the
//! envelope re-produce the exact AAD on open. Decode rejects truncated
//! input and trailing bytes.

use crate::error::WireError;

/// The single live AEAD suite identifier.
pub const ALG_AES256_GCM: &str = "AES-256-GCM";

/// Current envelope version. Decoders reject anything newer.
pub const ENVELOPE_VERSION: u32 = 1;

/// Fixed header bytes after the algorithm string: version[4] + dek_id[4].
pub const HEADER_FIXED_BYTES: usize = 4 + 4;

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Envelope header, bound into the ciphertext as associated data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageHeader {
    /// AEAD suite identifier.
    pub alg: String,
    /// Envelope layout version.
    pub version: u32,
    /// Id of the DEK that sealed the payload.
    pub dek_id: u32,
}

impl PackageHeader {
    /// Header for a package sealed right now, under the current version.
    pub fn current(dek_id: u32) -> Self {
        Self {
            alg: ALG_AES256_GCM.to_string(),
            version: ENVELOPE_VERSION,
            dek_id,
        }
    }
}

/// Canonically encode a header.
pub fn encode_header(header: &PackageHeader) -> Result<Vec<u8>, WireError> {
    let alg = header.alg.as_bytes();
    if alg.len() > u16::MAX as usize {
        return Err(WireError::LengthOverflow);
    }

    let mut out = Vec::with_capacity(2 + alg.len() + HEADER_FIXED_BYTES);
    out.extend_from_slice(&(alg.len() as u16).to_be_bytes());
    out.extend_from_slice(alg);
    out.extend_from_slice(&header.version.to_be_bytes());
    out.extend_from_slice(&header.dek_id.to_be_bytes());
    Ok(out)
}

/// Decode a header from an exact-length buffer.
pub fn decode_header(bytes: &[u8]) -> Result<PackageHeader, WireError> {
    let mut cur = Cursor::new(bytes);
    let alg_len = cur.read_u16()? as usize;
    let alg = cur.read_bytes(alg_len)?;
    let version = cur.read_u32()?;
    let dek_id = cur.read_u32()?;
    cur.finish()?;

    let alg = String::from_utf8(alg.to_vec()).map_err(|_| WireError::InvalidUtf8)?;
    Ok(PackageHeader { alg, version, dek_id })
}

// ---------------------------------------------------------------------------
// Package
// ---------------------------------------------------------------------------

/// A decoded encrypted package: header + sealed payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedPackage {
    pub header: PackageHeader,
    /// AEAD output: `nonce || ciphertext || tag`.
    pub payload: Vec<u8>,
}

/// Encode a package for storage.
pub fn encode_package(header: &PackageHeader, payload: &[u8]) -> Result<Vec<u8>, WireError> {
    let header_bytes = encode_header(header)?;
    if header_bytes.len() > u32::MAX as usize || payload.len() > u32::MAX as usize {
        return Err(WireError::LengthOverflow);
    }

    let mut out = Vec::with_capacity(4 + header_bytes.len() + 4 + payload.len());
    out.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Decode a stored package. Rejects truncation and trailing bytes.
pub fn decode_package(bytes: &[u8]) -> Result<EncryptedPackage, WireError> {
    let mut cur = Cursor::new(bytes);
    let header_len = cur.read_u32()? as usize;
    let header_bytes = cur.read_bytes(header_len)?;
    let header = decode_header(header_bytes)?;
    let payload_len = cur.read_u32()? as usize;
    let payload = cur.read_bytes(payload_len)?.to_vec();
    cur.finish()?;

    Ok(EncryptedPackage { header, payload })
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(len).ok_or(WireError::Truncated)?;
        if end > self.bytes.len() {
            return Err(WireError::Truncated);
        }
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read_u16(&mut self) -> Result<u16, WireError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, WireError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn finish(self) -> Result<(), WireError> {
        if self.pos != self.bytes.len() {
            return Err(WireError::TrailingBytes);
        }
        Ok(())
    }
}
