//! `coffre-crypto-core` — Pure cryptographic primitives for COFFRE.
//!
//! This crate is the audit target: zero I/O, zero storage dependencies.
//! It covers authenticated field encryption (AES-256-GCM), wrapping-key
//! derivation (PBKDF2-HMAC-SHA256), threshold secret sharing, and the
//! word-phrase encoding used for recovery shares.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;

pub mod codec;

pub mod sharing;

pub mod wordshare;

pub use codec::{decrypt_field, encrypt_field, open, seal, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use error::CryptoError;
pub use kdf::{
    derive_wrapping_key, salt_from_timestamp, DEFAULT_SALT_LEN, PBKDF2_ITERATIONS,
    WRAPPING_KEY_LEN,
};
pub use memory::{SecretBuffer, SecretBytes};
pub use sharing::{combine, split, Share, MAX_SHARES};
pub use wordshare::{
    decode_share, encode_share, validate_word, word_index, WORDLIST_SIZE, WORD_BITS,
};
