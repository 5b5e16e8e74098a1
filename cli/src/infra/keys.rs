//! Key provisioner: generates or reuses the SSH key pair of a remote app.

use std::path::Path;

use ssh_key::{Algorithm, LineEnding, PrivateKey};
use tracing::{debug, info};

use crate::domain::{DispatchError, KeyPair, Locator};

/// Comment appended to generated public keys.
const KEY_COMMENT: &str = "tether";

/// Generates a fresh Ed25519 pair. The result is always `is_new`.
///
/// # Errors
///
/// Returns an authentication error if the system RNG or the encoder fails.
pub fn generate() -> Result<KeyPair, DispatchError> {
    let mut key = PrivateKey::random(&mut ssh_key::rand_core::OsRng, Algorithm::Ed25519)
        .map_err(|e| DispatchError::Authentication(format!("cannot generate key: {e}")))?;
    key.set_comment(KEY_COMMENT);
    let private_key = key
        .to_openssh(LineEnding::LF)
        .map_err(|e| DispatchError::Authentication(format!("cannot encode private key: {e}")))?;
    let public_key = key
        .public_key()
        .to_openssh()
        .map_err(|e| DispatchError::Authentication(format!("cannot encode public key: {e}")))?;
    info!("generated new Ed25519 key pair");
    Ok(KeyPair {
        public_key,
        private_key: private_key.to_string(),
        is_new: true,
    })
}

/// Reuses the first valid pair referenced by `candidates` (the locator being
/// written first, then any prior locator), unless `reset` is set. Missing,
/// unreadable or malformed files fall through to [`generate`].
///
/// # Errors
///
/// Returns an error only when generation itself fails.
pub fn load_or_generate(candidates: &[&Locator], reset: bool) -> Result<KeyPair, DispatchError> {
    if reset {
        debug!("key reset requested");
        return generate();
    }
    for locator in candidates {
        match read_pair(locator) {
            Ok(pair) => {
                debug!(path = %locator.private_key, "reusing existing key pair");
                return Ok(pair);
            }
            Err(err) => debug!(path = %locator.private_key, error = %err, "no usable key pair"),
        }
    }
    generate()
}

/// Strict load used when opening a session.
///
/// # Errors
///
/// Returns an authentication error when either file is missing, unreadable
/// or not valid key material.
pub fn load(locator: &Locator) -> Result<KeyPair, DispatchError> {
    read_pair(locator)
}

fn read_pair(locator: &Locator) -> Result<KeyPair, DispatchError> {
    if locator.private_key.is_empty() || locator.public_key.is_empty() {
        return Err(DispatchError::Authentication(
            "locator does not reference a key pair".to_string(),
        ));
    }
    let public_key = read_key_file(Path::new(&locator.public_key))?;
    let private_key = read_key_file(Path::new(&locator.private_key))?;
    KeyPair::from_existing(&public_key, &private_key)
}

fn read_key_file(path: &Path) -> Result<String, DispatchError> {
    std::fs::read_to_string(path).map_err(|e| {
        DispatchError::Authentication(format!("cannot read key {}: {e}", path.display()))
    })
}
