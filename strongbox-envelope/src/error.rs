//! Error types.
//!
//! Decrypt failures are deliberately coarse: a tag mismatch, a wrong key,
//! and tampered AAD all surface as the same `AuthenticationFailure`.

use core::fmt;

// ---------------------------------------------------------------------------
// AEAD errors
// ---------------------------------------------------------------------------

/// Failure while sealing (nonce generation or cipher setup).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SealError;

impl fmt::Display for SealError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seal failed")
    }
}

impl std::error::Error for SealError {}

/// Failure while opening sealed bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AeadError {
    /// Tag verification failed: wrong key, flipped bit, or AAD mismatch.
    AuthenticationFailure,
    /// Input shorter than `nonce + tag`; not a valid sealed buffer.
    MalformedCiphertext,
}

impl fmt::Display for AeadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticationFailure => write!(f, "authentication failure"),
            Self::MalformedCiphertext => write!(f, "malformed ciphertext"),
        }
    }
}

impl std::error::Error for AeadError {}

// ---------------------------------------------------------------------------
// Wire errors
// ---------------------------------------------------------------------------

/// Failure while encoding or decoding the package layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireError {
    /// Input ended before a declared length was satisfied.
    Truncated,
    /// Bytes remained after the last declared field.
    TrailingBytes,
    /// A field exceeds its length prefix.
    LengthOverflow,
    /// The algorithm string is not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated package"),
            Self::TrailingBytes => write!(f, "trailing bytes after package"),
            Self::LengthOverflow => write!(f, "field exceeds length prefix"),
            Self::InvalidUtf8 => write!(f, "algorithm string is not valid utf-8"),
        }
    }
}

impl std::error::Error for WireError {}

// ---------------------------------------------------------------------------
// Envelope errors
// ---------------------------------------------------------------------------

/// Failure while sealing or opening an encrypted package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvelopeError {
    Wire(WireError),
    /// Header names an algorithm this build does not support.
    UnsupportedAlgorithm(String),
    /// Header version is newer than this build understands.
    UnsupportedVersion(u32),
    /// Caller-expected DEK id disagrees with the header's embedded id.
    DekIdMismatch { expected: u32, found: u32 },
    Seal(SealError),
    Aead(AeadError),
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wire(e) => write!(f, "wire: {}", e),
            Self::UnsupportedAlgorithm(alg) => write!(f, "unsupported algorithm: {}", alg),
            Self::UnsupportedVersion(v) => write!(f, "unsupported envelope version: {}", v),
            Self::DekIdMismatch { expected, found } => {
                write!(f, "dek id mismatch: row says {}, header says {}", expected, found)
            }
            Self::Seal(e) => write!(f, "{}", e),
            Self::Aead(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EnvelopeError {}

impl From<WireError> for EnvelopeError {
    fn from(e: WireError) -> Self {
        Self::Wire(e)
    }
}

impl From<SealError> for EnvelopeError {
    fn from(e: SealError) -> Self {
        Self::Seal(e)
    }
}

impl From<AeadError> for EnvelopeError {
    fn from(e: AeadError) -> Self {
        Self::Aead(e)
    }
}
