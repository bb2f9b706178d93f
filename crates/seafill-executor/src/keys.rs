//! Account credentials.
//!
//! Security notes:
//! - Secret bytes are held in `Zeroizing` buffers until handed to
//!   `PrivateKeySigner`.
//! - Keys are loaded once at startup; no runtime rotation.
//! - Never log private key material.

use std::path::PathBuf;

use alloy::primitives::{Address, Bytes, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use thiserror::Error;
use zeroize::Zeroizing;

/// Source of a private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Load from environment variable (development).
    EnvVar { var_name: String },
    /// Load from file (production, recommend 0600 permissions).
    File { path: PathBuf },
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnvVar { var_name } => write!(f, "env:{var_name}"),
            Self::File { path } => write!(f, "file:{}", path.display()),
        }
    }
}

/// Key management errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("Signing failed: {0}")]
    SigningFailed(#[from] alloy::signers::Error),

    #[error("No local signer for node-managed account {0}")]
    NoLocalSigner(Address),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// Supports 0x prefix and surrounding whitespace.
fn parse_hex_key(hex_str: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    let trimmed = hex_str.trim().trim_start_matches("0x");
    Ok(Zeroizing::new(hex::decode(trimmed)?))
}

/// Signing identity of one account.
///
/// A node-managed key has an address but no local signer: the node signs its
/// transactions, and off-chain signatures are refused.
#[derive(Clone)]
pub struct AccountKey {
    address: Address,
    signer: Option<PrivateKeySigner>,
}

impl std::fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKey")
            .field("address", &self.address)
            .field("local_signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl AccountKey {
    /// Load a key from `source`, optionally checking the derived address.
    ///
    /// # Errors
    /// Returns `KeyError` if the variable or file is missing, the content is
    /// not hex, the key is not a valid secp256k1 scalar, or the address does
    /// not match `expected`.
    pub fn load(source: &KeySource, expected: Option<Address>) -> Result<Self, KeyError> {
        let secret_bytes = match source {
            KeySource::EnvVar { var_name } => {
                let hex = std::env::var(var_name)
                    .map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?;
                parse_hex_key(&hex)?
            }
            KeySource::File { path } => {
                let content = Zeroizing::new(std::fs::read_to_string(path)?);
                parse_hex_key(&content)?
            }
        };
        Self::from_bytes(&secret_bytes, expected)
    }

    /// Parse a hex-encoded key.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let secret_bytes = parse_hex_key(hex_str)?;
        Self::from_bytes(&secret_bytes, None)
    }

    pub fn from_bytes(secret_bytes: &[u8], expected: Option<Address>) -> Result<Self, KeyError> {
        let signer = PrivateKeySigner::from_slice(secret_bytes)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        if let Some(expected) = expected {
            if signer.address() != expected {
                return Err(KeyError::AddressMismatch {
                    expected,
                    actual: signer.address(),
                });
            }
        }

        Ok(Self::local(signer))
    }

    /// Fresh random key (simulation and tests).
    pub fn random() -> Self {
        Self::local(PrivateKeySigner::random())
    }

    /// Account whose key lives in the node.
    pub fn node_managed(address: Address) -> Self {
        Self {
            address,
            signer: None,
        }
    }

    fn local(signer: PrivateKeySigner) -> Self {
        Self {
            address: signer.address(),
            signer: Some(signer),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    /// Sign a 32-byte digest, returning `r || s || v` with v in {27, 28}.
    pub async fn sign_digest(&self, digest: B256) -> Result<Bytes, KeyError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or(KeyError::NoLocalSigner(self.address))?;
        // NOTE: Do not log the signature.
        let signature = signer.sign_hash(&digest).await?;
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
        out[32..64].copy_from_slice(&signature.s().to_be_bytes::<32>());
        out[64] = 27 + u8::from(signature.v());
        Ok(Bytes::copy_from_slice(&out))
    }
}
