//! Chain Key Engine (Component C): symmetric ratchet advance, message-key
//! derivation, and the root KDF. Grounded on this codebase's own
//! `evolve_chain_key`/`derive_message_key`/`derive_root_key`, but with the
//! byte-tag convention flipped to match this protocol's wire format:
//! `0x02` advances the chain, `0x01 || messageNumber` derives a message
//! key — the inverse of this codebase's historical tagging.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("chain key must be exactly 32 bytes")]
    InvalidLength,
    #[error("chain key must not be all-zero")]
    AllZero,
    #[error("root KDF failed")]
    RootKdfFailed,
}

pub type Result<T> = std::result::Result<T, ChainError>;

pub fn validate_chain_key(chain_key: &[u8; 32]) -> Result<()> {
    if chain_key.iter().all(|&b| b == 0) {
        return Err(ChainError::AllZero);
    }
    Ok(())
}

/// `next(chainKey) = HMAC-SHA-256(chainKey, 0x02)`.
pub fn next(chain_key: &[u8; 32]) -> Result<[u8; 32]> {
    validate_chain_key(chain_key)?;
    let mut mac = HmacSha256::new_from_slice(chain_key).map_err(|_| ChainError::InvalidLength)?;
    mac.update(&[0x02]);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    Ok(out)
}

/// `msgKey(chainKey, n) = HMAC-SHA-256(chainKey, concat(0x01, bigEndianU32(n)))`.
pub fn message_key(chain_key: &[u8; 32], n: u32) -> Result<[u8; 32]> {
    validate_chain_key(chain_key)?;
    let mut mac = HmacSha256::new_from_slice(chain_key).map_err(|_| ChainError::InvalidLength)?;
    let mut input = [0u8; 5];
    input[0] = 0x01;
    input[1..].copy_from_slice(&n.to_be_bytes());
    mac.update(&input);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    Ok(out)
}

/// Root KDF: `(rootKey', chainKey') = HKDF-SHA-256(salt = rootKey, ikm = dhOutput, info = "RatchetRoot")`.
pub fn derive_root(root_key: &[u8; 32], dh_output: &[u8; 32]) -> Result<([u8; 32], [u8; 32])> {
    let hk = Hkdf::<Sha256>::new(Some(root_key), dh_output);
    let mut okm = [0u8; 64];
    hk.expand(b"RatchetRoot", &mut okm)
        .map_err(|_| ChainError::RootKdfFailed)?;
    let mut new_root = [0u8; 32];
    let mut new_chain = [0u8; 32];
    new_root.copy_from_slice(&okm[..32]);
    new_chain.copy_from_slice(&okm[32..]);
    okm.zeroize();
    Ok((new_root, new_chain))
}
