//! Word-phrase encoding of recovery shares.
//!
//! This module provides:
//! - [`encode_share`] — pack a [`Share`] into a human-copyable phrase
//! - [`decode_share`] — parse a phrase back into a [`Share`]
//! - [`validate_word`] / [`word_index`] — dictionary membership checks
//!
//! # Encoding
//!
//! The share is serialized as `index byte || payload bytes`, then packed
//! 11 bits at a time (big-endian bit order) into indices into the
//! 2048-word English dictionary. A 32-byte payload therefore serializes
//! to 33 bytes = 264 bits = exactly 24 words, with no padding.
//!
//! For lengths that do not land on a word boundary, the final word is
//! zero-padded; [`decode_share`] rejects non-zero padding bits.

use crate::error::CryptoError;
use crate::sharing::Share;

/// Bits carried by each word (2^11 = 2048 dictionary entries).
pub const WORD_BITS: usize = 11;

/// Number of words in the dictionary.
pub const WORDLIST_SIZE: usize = 2048;

/// Returns the fixed 2048-word English dictionary.
///
/// The list is alphabetically sorted, which allows binary search for
/// membership and index lookups.
#[must_use]
pub fn wordlist() -> &'static [&'static str] {
    bip39::Language::English.word_list()
}

/// Check whether `word` exists in the dictionary.
#[must_use]
pub fn validate_word(word: &str) -> bool {
    wordlist().binary_search(&word).is_ok()
}

/// Returns the 0-based index of `word` in the dictionary, or `None` if
/// the word is unknown.
#[must_use]
pub fn word_index(word: &str) -> Option<u16> {
    wordlist()
        .binary_search(&word)
        .ok()
        .and_then(|i| u16::try_from(i).ok())
}

/// Encode a share as a space-separated word phrase.
///
/// # Errors
///
/// Returns `CryptoError::WordEncoding` if the share payload is empty, or
/// if its serialized length cannot be decoded unambiguously (padding of
/// a full byte or more).
#[allow(clippy::arithmetic_side_effects)] // bounded bit bookkeeping
pub fn encode_share(share: &Share) -> Result<String, CryptoError> {
    if share.data.is_empty() {
        return Err(CryptoError::WordEncoding(
            "share payload must not be empty".into(),
        ));
    }

    let mut serialized = Vec::with_capacity(share.data.len().saturating_add(1));
    serialized.push(share.index);
    serialized.extend_from_slice(&share.data);

    let total_bits = serialized.len() * 8;
    let word_count = total_bits.div_ceil(WORD_BITS);
    let padding_bits = word_count * WORD_BITS - total_bits;
    if padding_bits >= 8 {
        return Err(CryptoError::WordEncoding(format!(
            "unsupported share length: {} bytes",
            serialized.len()
        )));
    }

    let indices = bytes_to_indices(&serialized, word_count);
    let list = wordlist();
    let words: Vec<&str> = indices.iter().map(|&i| list[usize::from(i)]).collect();
    Ok(words.join(" "))
}

/// Decode a space-separated word phrase back into a [`Share`].
///
/// # Errors
///
/// Returns `CryptoError::WordEncoding` if:
/// - the phrase is empty or any word is not in the dictionary
/// - the decoded byte count is too short to hold an index and a payload
/// - the share index is zero (reserved)
/// - any padding bit is non-zero
pub fn decode_share(phrase: &str) -> Result<Share, CryptoError> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.is_empty() {
        return Err(CryptoError::WordEncoding("empty phrase".into()));
    }

    let mut indices = Vec::with_capacity(words.len());
    for (i, word) in words.iter().enumerate() {
        match word_index(word) {
            Some(idx) => indices.push(idx),
            None => {
                // The word itself is share material — never echo it.
                return Err(CryptoError::WordEncoding(format!(
                    "word not found in dictionary at position {i}"
                )));
            }
        }
    }

    #[allow(clippy::arithmetic_side_effects)]
    let byte_len = indices.len() * WORD_BITS / 8;
    if byte_len < 2 {
        return Err(CryptoError::WordEncoding("phrase too short".into()));
    }

    let bytes = indices_to_bytes(&indices, byte_len)?;

    let index = bytes[0];
    if index == 0 {
        return Err(CryptoError::WordEncoding("invalid share index".into()));
    }

    Ok(Share {
        index,
        data: bytes[1..].to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Bitstream helpers
// ---------------------------------------------------------------------------

/// Pack bytes (big-endian bit order) into 11-bit word indices.
///
/// Bit positions past the end of `bytes` read as zero padding.
#[allow(clippy::arithmetic_side_effects)] // bounded bit arithmetic
fn bytes_to_indices(bytes: &[u8], word_count: usize) -> Vec<u16> {
    let mut indices = Vec::with_capacity(word_count);
    for word in 0..word_count {
        let mut idx: u16 = 0;
        for bit in 0..WORD_BITS {
            let bit_pos = word * WORD_BITS + bit;
            let byte_pos = bit_pos / 8;
            let bit_value = bytes
                .get(byte_pos)
                .map_or(0, |b| (b >> (7 - bit_pos % 8)) & 1);
            idx = (idx << 1) | u16::from(bit_value);
        }
        indices.push(idx);
    }
    indices
}

/// Unpack 11-bit word indices into `byte_len` bytes.
///
/// Padding bits past `byte_len` must all be zero.
#[allow(clippy::arithmetic_side_effects)] // bounded bit arithmetic
fn indices_to_bytes(indices: &[u16], byte_len: usize) -> Result<Vec<u8>, CryptoError> {
    let mut bytes = vec![0u8; byte_len];
    for (word, &idx) in indices.iter().enumerate() {
        for bit in 0..WORD_BITS {
            let bit_value = ((idx >> (WORD_BITS - 1 - bit)) & 1) as u8;
            let bit_pos = word * WORD_BITS + bit;
            let byte_pos = bit_pos / 8;
            if byte_pos < byte_len {
                bytes[byte_pos] |= bit_value << (7 - bit_pos % 8);
            } else if bit_value != 0 {
                return Err(CryptoError::WordEncoding(
                    "non-zero padding bits".into(),
                ));
            }
        }
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_share() -> Share {
        Share {
            index: 1,
            data: vec![0x5A; 32],
        }
    }

    #[test]
    fn wordlist_has_2048_sorted_words() {
        let list = wordlist();
        assert_eq!(list.len(), WORDLIST_SIZE);
        assert!(list.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn encode_produces_24_words_for_32_byte_payload() {
        let phrase = encode_share(&test_share()).expect("encode should succeed");
        assert_eq!(phrase.split_whitespace().count(), 24);
    }

    #[test]
    fn every_phrase_word_is_in_the_dictionary() {
        let phrase = encode_share(&test_share()).expect("encode should succeed");
        for word in phrase.split_whitespace() {
            assert!(validate_word(word), "word {word:?} missing from dictionary");
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let share = test_share();
        let phrase = encode_share(&share).expect("encode should succeed");
        let decoded = decode_share(&phrase).expect("decode should succeed");
        assert_eq!(decoded, share);
    }

    #[test]
    fn roundtrip_preserves_index() {
        let share = Share {
            index: 2,
            data: vec![0x01; 32],
        };
        let phrase = encode_share(&share).expect("encode should succeed");
        let decoded = decode_share(&phrase).expect("decode should succeed");
        assert_eq!(decoded.index, 2);
    }

    #[test]
    fn decode_rejects_unknown_word() {
        let phrase = encode_share(&test_share()).expect("encode should succeed");
        let mut words: Vec<&str> = phrase.split_whitespace().collect();
        words[3] = "zzzzzz";
        let result = decode_share(&words.join(" "));
        assert!(matches!(result, Err(CryptoError::WordEncoding(_))));
    }

    #[test]
    fn decode_error_does_not_echo_the_word() {
        let result = decode_share("abandon notaword abandon");
        let message = format!("{}", result.expect_err("should fail"));
        assert!(!message.contains("notaword"));
    }

    #[test]
    fn decode_rejects_empty_phrase() {
        assert!(matches!(
            decode_share("   "),
            Err(CryptoError::WordEncoding(_))
        ));
    }

    #[test]
    fn decode_rejects_single_word() {
        assert!(matches!(
            decode_share("abandon"),
            Err(CryptoError::WordEncoding(_))
        ));
    }

    #[test]
    fn decode_tolerates_extra_whitespace() {
        let share = test_share();
        let phrase = encode_share(&share).expect("encode should succeed");
        let spaced = phrase.replace(' ', "   ");
        let decoded = decode_share(&format!("  {spaced}  ")).expect("decode should succeed");
        assert_eq!(decoded, share);
    }

    #[test]
    fn encode_rejects_empty_payload() {
        let share = Share {
            index: 1,
            data: vec![],
        };
        assert!(matches!(
            encode_share(&share),
            Err(CryptoError::WordEncoding(_))
        ));
    }

    #[test]
    fn distinct_payloads_yield_distinct_phrases() {
        let a = encode_share(&Share {
            index: 1,
            data: vec![0x00; 32],
        })
        .expect("encode should succeed");
        let b = encode_share(&Share {
            index: 1,
            data: vec![0xFF; 32],
        })
        .expect("encode should succeed");
        assert_ne!(a, b);
    }
}
