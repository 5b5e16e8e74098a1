//! SSH key material: the key pair used to authenticate to remote hosts.

use ssh_key::{PrivateKey, PublicKey};

use crate::domain::error::DispatchError;

/// A public/private key pair in OpenSSH text form.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Single authorized-keys line, trimmed.
    pub public_key: String,
    /// `OPENSSH PRIVATE KEY` PEM block.
    pub private_key: String,
    /// `true` when generated during this run, `false` when loaded from disk.
    pub is_new: bool,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("is_new", &self.is_new)
            .finish()
    }
}

impl KeyPair {
    /// Builds a pair from file contents, validating both halves.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if either half is not well-formed
    /// SSH key material.
    pub fn from_existing(public_key: &str, private_key: &str) -> Result<Self, DispatchError> {
        validate_public_key(public_key)?;
        validate_private_key(private_key)?;
        Ok(Self {
            public_key: public_key.trim().to_string(),
            private_key: private_key.to_string(),
            is_new: false,
        })
    }
}

/// Validates an authorized-keys line (`<algorithm> <base64> [comment]`).
///
/// # Errors
///
/// Returns an authentication error if the line does not parse.
pub fn validate_public_key(text: &str) -> Result<(), DispatchError> {
    PublicKey::from_openssh(text.trim())
        .map(|_| ())
        .map_err(|e| DispatchError::Authentication(format!("invalid public key: {e}")))
}

/// Validates an OpenSSH private key. Encrypted keys are accepted; they are
/// decrypted only when a session is opened.
///
/// # Errors
///
/// Returns an authentication error if the PEM block does not parse.
pub fn validate_private_key(text: &str) -> Result<(), DispatchError> {
    PrivateKey::from_openssh(text)
        .map(|_| ())
        .map_err(|e| DispatchError::Authentication(format!("invalid private key: {e}")))
}

/// Returns `true` when the private key is passphrase-protected.
#[must_use]
pub fn is_encrypted(private_key: &str) -> bool {
    PrivateKey::from_openssh(private_key).is_ok_and(|key| key.is_encrypted())
}

/// Decrypts a passphrase-protected private key and re-encodes it unencrypted.
///
/// # Errors
///
/// Returns an authentication error if the key does not parse or the
/// passphrase is wrong.
pub fn decrypt_private_key(private_key: &str, passphrase: &str) -> Result<String, DispatchError> {
    let key = PrivateKey::from_openssh(private_key)
        .map_err(|e| DispatchError::Authentication(format!("invalid private key: {e}")))?;
    let decrypted = key
        .decrypt(passphrase)
        .map_err(|_| DispatchError::Authentication("failed to decrypt private key".to_string()))?;
    let pem = decrypted
        .to_openssh(ssh_key::LineEnding::LF)
        .map_err(|e| DispatchError::Authentication(format!("cannot encode private key: {e}")))?;
    Ok(pem.to_string())
}
