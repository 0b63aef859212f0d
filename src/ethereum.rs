//! Ethereum wallet helpers for deriving identity secrets.
//!
//! A member's identity secret is their wallet's signature over
//! [`IDENTITY_MESSAGE`]. Signing is deterministic (RFC 6979), so the same key
//! always yields the same identity.

use crate::identity::Identity;
use crate::utils::validate_and_strip_hex;
use anyhow::{Context, Result};
use ethers::signers::{LocalWallet, Signer};

/// Message every member signs to obtain their identity secret.
pub const IDENTITY_MESSAGE: &str = "Sign this message to create your identity!";

/// Expected length of an Ethereum private key in hex characters (excluding 0x prefix)
pub const PRIVATE_KEY_HEX_LENGTH: usize = 64;

/// Validates an Ethereum private key.
///
/// # Errors
///
/// Returns an error if:
/// - The private key is not exactly 64 hex characters (excluding 0x prefix)
/// - The private key contains non-hex characters
/// - The private key is all zeros
///
/// # Examples
///
/// ```
/// use zkp_anon_signal::ethereum::validate_private_key;
///
/// assert!(validate_private_key("0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318").is_ok());
/// assert!(validate_private_key("0x0000000000000000000000000000000000000000000000000000000000000000").is_err());
/// ```
pub fn validate_private_key(private_key: &str) -> Result<()> {
    let stripped = validate_and_strip_hex(private_key, PRIVATE_KEY_HEX_LENGTH)?;

    if stripped.chars().all(|c| c == '0') {
        return Err(anyhow::anyhow!(
            "Private key cannot be all zeros. Please provide a valid private key."
        ));
    }

    Ok(())
}

/// Parses a validated private key into a wallet.
///
/// # Errors
/// Fails if the key is malformed or not a valid secp256k1 scalar.
pub fn wallet_from_private_key(private_key: &str) -> Result<LocalWallet> {
    validate_private_key(private_key)?;
    let stripped = validate_and_strip_hex(private_key, PRIVATE_KEY_HEX_LENGTH)?;
    stripped
        .parse::<LocalWallet>()
        .context("Failed to parse private key")
}

/// Signs [`IDENTITY_MESSAGE`] and returns the 65-byte signature as hex.
///
/// # Errors
/// Fails if signing fails.
pub async fn sign_identity_message(wallet: &LocalWallet) -> Result<String> {
    let signature = wallet
        .sign_message(IDENTITY_MESSAGE)
        .await
        .context("Failed to sign identity message")?;
    Ok(format!("0x{signature}"))
}

/// Derives the wallet holder's identity.
///
/// # Errors
/// Fails if signing fails.
pub async fn identity_from_wallet(wallet: &LocalWallet) -> Result<Identity> {
    let secret = sign_identity_message(wallet).await?;
    Identity::from_secret(&secret).context("Failed to derive identity from signature")
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_validate_private_key() {
        assert!(validate_private_key(KEY).is_ok());
        assert!(validate_private_key(
            "0x0000000000000000000000000000000000000000000000000000000000000000"
        )
        .is_err());
        assert!(validate_private_key(
            "0xzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_signature_identity_is_deterministic() {
        let wallet = wallet_from_private_key(KEY).unwrap();
        let a = identity_from_wallet(&wallet).await.unwrap();
        let b = identity_from_wallet(&wallet).await.unwrap();
        assert_eq!(a.commitment(), b.commitment());

        let other = LocalWallet::new(&mut rand::thread_rng());
        let c = identity_from_wallet(&other).await.unwrap();
        assert_ne!(a.commitment(), c.commitment());
    }

    #[tokio::test]
    async fn test_signature_format() {
        let wallet = wallet_from_private_key(KEY).unwrap();
        let signature = sign_identity_message(&wallet).await.unwrap();
        assert!(signature.starts_with("0x"));
        assert_eq!(signature.len(), 2 + 130);
    }
}
