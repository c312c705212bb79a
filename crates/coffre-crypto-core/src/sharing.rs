//! Threshold secret sharing for key recovery.
//!
//! This module provides:
//! - [`split`] — split a secret into `n` index-tagged shares, all of
//!   which are required to reconstruct it
//! - [`combine`] — recombine a complete set of shares into the secret
//!
//! # Scheme
//!
//! (n,n)-threshold XOR sharing: `n - 1` shares are uniform random pads
//! from the CSPRNG and the last share is the secret XORed with all pads.
//! Any subset smaller than the full set is statistically independent of
//! the secret — fewer than `n` shares reveal nothing.
//!
//! [`combine`] cannot detect a *missing* share (XOR of an incomplete set
//! is simply a wrong value); callers enforce the expected share count
//! and verify the reconstructed material against its use site (e.g. an
//! AEAD unwrap).

use crate::error::CryptoError;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum number of shares (index fits in one byte, 0 is reserved).
pub const MAX_SHARES: usize = 255;

/// One share of a split secret.
///
/// The index is 1-based and only identifies the share for bookkeeping
/// (duplicate detection); reconstruction is order-independent.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    /// 1-based share index.
    pub index: u8,
    /// Share payload — same length as the secret.
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Share(#{}, ***)", self.index)
    }
}

/// Split `secret` into `share_count` shares, all required to recombine.
///
/// # Errors
///
/// Returns `CryptoError::Sharing` if the secret is empty or
/// `share_count` is outside `2..=255`.
pub fn split(secret: &[u8], share_count: usize) -> Result<Vec<Share>, CryptoError> {
    if secret.is_empty() {
        return Err(CryptoError::Sharing("secret must not be empty".into()));
    }
    if share_count < 2 || share_count > MAX_SHARES {
        return Err(CryptoError::Sharing(format!(
            "share count {share_count} outside supported range 2..=255"
        )));
    }

    let mut shares = Vec::with_capacity(share_count);
    let mut accumulator = secret.to_vec();

    // share_count <= 255, so indices fit in u8.
    for i in 1..share_count {
        let mut pad = vec![0u8; secret.len()];
        OsRng.fill_bytes(&mut pad);
        for (acc, p) in accumulator.iter_mut().zip(&pad) {
            *acc ^= p;
        }
        shares.push(Share {
            index: i as u8,
            data: pad,
        });
    }

    shares.push(Share {
        index: share_count as u8,
        data: accumulator,
    });

    Ok(shares)
}

/// Recombine a complete set of shares into the original secret.
///
/// Order-independent. The caller is responsible for supplying *all*
/// shares produced by [`split`]; an incomplete set yields unrelated
/// bytes, which downstream verification must reject.
///
/// # Errors
///
/// Returns `CryptoError::Sharing` if fewer than two shares are given,
/// share lengths disagree, or two shares carry the same index.
pub fn combine(shares: &[Share]) -> Result<Vec<u8>, CryptoError> {
    let Some(first) = shares.first() else {
        return Err(CryptoError::Sharing("no shares given".into()));
    };
    if shares.len() < 2 {
        return Err(CryptoError::Sharing(
            "at least two shares are required".into(),
        ));
    }

    let mut seen = [false; 256];
    let mut secret = vec![0u8; first.data.len()];
    for share in shares {
        if share.data.len() != first.data.len() {
            return Err(CryptoError::Sharing("share length mismatch".into()));
        }
        let idx = usize::from(share.index);
        if seen[idx] {
            return Err(CryptoError::Sharing(format!(
                "duplicate share index {}",
                share.index
            )));
        }
        seen[idx] = true;
        for (out, byte) in secret.iter_mut().zip(&share.data) {
            *out ^= byte;
        }
    }

    Ok(secret)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
