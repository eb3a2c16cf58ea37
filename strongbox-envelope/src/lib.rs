//! # Strongbox Envelope
//!
//! Envelope-encryption primitives for data at rest: an AES-256-GCM AEAD
//! layer and the versioned encrypted-package wire format that binds its
//! own header as associated data.
//!
//! ## Quick Start
//!
//! ```rust
//! use strongbox_envelope::{aead, envelope};
//!
//! let dek = aead::generate_key().unwrap();
//! let package = envelope::seal(&dek, 1, b"hunter2!").unwrap();
//!
//! let opened = envelope::open(&dek, &package, Some(1)).unwrap();
//! assert_eq!(&*opened.plaintext, b"hunter2!");
//! assert_eq!(opened.header.dek_id, 1);
//! ```
//!
//! ## Security Properties
//!
//! - **Fresh nonces**: every seal draws a 96-bit nonce from the OS CSPRNG
//! - **Header binding**: alg/version/DEK-id tampering fails authentication
//! - **Uniform failure**: wrong key, flipped bit, and AAD mismatch are
//!   indistinguishable to callers
//! - **Canonical encoding**: identical headers always encode identically,
//!   so AAD re-computation on open is exact
//!
//! ## What's NOT Provided
//!
//! - Key management (see `strongbox-keystore`)
//! - Streaming encryption
//! - Suites other than AES-256-GCM (the layout admits more)

#![deny(unsafe_code)]

pub mod aead;
pub mod envelope;
pub mod error;
pub mod wire;

pub use aead::{Key, KEY_BYTES, MIN_SEALED_BYTES, NONCE_BYTES, TAG_BYTES};
pub use envelope::{open, peek_header, seal, OpenedSecret};
pub use error::{AeadError, EnvelopeError, SealError, WireError};
pub use wire::{EncryptedPackage, PackageHeader, ALG_AES256_GCM, ENVELOPE_VERSION};
