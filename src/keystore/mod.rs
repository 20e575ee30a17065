//! Encrypted signing key storage
//!
//! The key lives in a standard Ethereum v3 keystore file. Plaintext only
//! leaves this module inside a [`Zeroizing`] buffer, which is wiped on drop.

pub mod prompt;

use crate::error::KeyError;

use ethers::core::rand::thread_rng;
use ethers::signers::LocalWallet;
use std::path::PathBuf;
use tracing::info;
use zeroize::Zeroizing;

/// Source of the operator's signing key
#[cfg_attr(test, mockall::automock)]
pub trait KeyStore: Send + Sync {
    /// Whether a key has been stored
    fn key_exists(&self) -> bool;

    /// Decrypt the key as 64 lowercase hex characters
    fn decrypt_key(&self) -> Result<Zeroizing<String>, KeyError>;
}

/// Keystore file on disk, unlocked with a password held for the process lifetime
pub struct FileKeyStore {
    path: PathBuf,
    password: Zeroizing<String>,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>, password: Zeroizing<String>) -> Self {
        Self {
            path: path.into(),
            password,
        }
    }

    /// Encrypt `private_key` into a new keystore file at `path`
    pub fn create(
        path: impl Into<PathBuf>,
        private_key: &str,
        password: Zeroizing<String>,
    ) -> Result<Self, KeyError> {
        let path = path.into();
        let key = validate_private_key(private_key)?;
        let key_bytes = Zeroizing::new(
            hex::decode(key.as_str()).map_err(|e| KeyError::InvalidKey(e.to_string()))?,
        );

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| KeyError::NotFound(format!("{:?}", path)))?
            .to_string();

        std::fs::create_dir_all(&dir).map_err(|e| {
            KeyError::NotFound(format!("cannot create keystore directory {:?}: {}", dir, e))
        })?;

        let (wallet, _) = LocalWallet::encrypt_keystore(
            &dir,
            &mut thread_rng(),
            key_bytes.as_slice(),
            password.as_bytes(),
            Some(&file_name),
        )
        .map_err(|e| KeyError::DecryptionFailed(format!("failed to encrypt key: {}", e)))?;

        info!(
            "Stored key for {:?} in {:?}",
            ethers::signers::Signer::address(&wallet),
            path
        );

        Ok(Self { path, password })
    }
}

impl KeyStore for FileKeyStore {
    fn key_exists(&self) -> bool {
        self.path.is_file()
    }

    fn decrypt_key(&self) -> Result<Zeroizing<String>, KeyError> {
        if !self.key_exists() {
            return Err(KeyError::NotFound(format!("{:?}", self.path)));
        }

        let wallet = LocalWallet::decrypt_keystore(&self.path, self.password.as_bytes())
            .map_err(|e| KeyError::DecryptionFailed(e.to_string()))?;

        let bytes = Zeroizing::new(wallet.signer().to_bytes().to_vec());
        Ok(Zeroizing::new(hex::encode(bytes.as_slice())))
    }
}

/// Check a private key is 64 hex characters, optionally `0x`-prefixed,
/// and return it normalized to lowercase without prefix
pub fn validate_private_key(input: &str) -> Result<Zeroizing<String>, KeyError> {
    let trimmed = input.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if stripped.len() != 64 {
        return Err(KeyError::InvalidKey(format!(
            "expected 64 hex characters, got {}",
            stripped.len()
        )));
    }
    if !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(KeyError::InvalidKey(
            "key contains non-hex characters".to_string(),
        ));
    }

    Ok(Zeroizing::new(stripped.to_ascii_lowercase()))
}
