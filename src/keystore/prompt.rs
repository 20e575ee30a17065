//! First-run interactive key capture with masked input

use super::{validate_private_key, FileKeyStore};

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::warn;
use zeroize::Zeroizing;

const MAX_PROMPT_ATTEMPTS: u32 = 3;

/// Read a masked line from the terminal
pub fn read_secret(label: &str) -> Result<Zeroizing<String>> {
    let value = rpassword::prompt_password(label)
        .with_context(|| format!("Failed to read {}", label.trim_end_matches(": ")))?;
    Ok(Zeroizing::new(value))
}

/// Ask for the private key until it has a valid format
pub fn capture_private_key() -> Result<Zeroizing<String>> {
    for attempt in 1..=MAX_PROMPT_ATTEMPTS {
        let input = read_secret("Private key (64 hex characters, optional 0x): ")?;
        match validate_private_key(&input) {
            Ok(key) => return Ok(key),
            Err(e) => warn!("{} (attempt {}/{})", e, attempt, MAX_PROMPT_ATTEMPTS),
        }
    }

    bail!("No valid private key entered after {} attempts", MAX_PROMPT_ATTEMPTS)
}

/// Ask for a new keystore password twice
pub fn capture_new_password() -> Result<Zeroizing<String>> {
    for attempt in 1..=MAX_PROMPT_ATTEMPTS {
        let first = read_secret("New keystore password: ")?;
        if first.is_empty() {
            warn!("Password must not be empty (attempt {}/{})", attempt, MAX_PROMPT_ATTEMPTS);
            continue;
        }

        let confirm = read_secret("Confirm keystore password: ")?;
        if *first == *confirm {
            return Ok(first);
        }
        warn!("Passwords do not match (attempt {}/{})", attempt, MAX_PROMPT_ATTEMPTS);
    }

    bail!("No keystore password set after {} attempts", MAX_PROMPT_ATTEMPTS)
}

/// Capture a key and password interactively and write the keystore file
pub fn run_first_time_setup(path: &Path) -> Result<FileKeyStore> {
    warn!("No keystore found at {:?}; starting first-run setup", path);

    let key = capture_private_key()?;
    let password = capture_new_password()?;

    FileKeyStore::create(path, &key, password).context("Failed to create keystore")
}
