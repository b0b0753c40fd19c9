use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::Engine;

const ENCRYPTED_PREFIX: &str = "enc:v1:";
const NONCE_LEN: usize = 12;

/// Storage for the agent bearer token.
pub trait TokenStore: Send + Sync {
    /// Current token, or an empty string when none is usable.
    fn get_token(&self) -> String;

    /// Replace the token. An empty value clears it.
    fn set_token(&self, token: &str) -> Result<(), TokenStoreError>;
}

/// AES-256-GCM wrapper for the token at rest.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Create from a base64-encoded 32-byte key.
    pub fn new(key_base64: &str) -> Result<Self, TokenStoreError> {
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(key_base64.trim())
            .map_err(|_| TokenStoreError::InvalidKey)?;

        if key_bytes.len() != 32 {
            return Err(TokenStoreError::InvalidKey);
        }

        let cipher =
            Aes256Gcm::new_from_slice(&key_bytes).map_err(|_| TokenStoreError::InvalidKey)?;
        Ok(Self { cipher })
    }

    /// base64(nonce || ciphertext)
    pub fn seal(&self, token: &str) -> Result<String, TokenStoreError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, token.as_bytes())
            .map_err(|_| TokenStoreError::EncryptFailed)?;

        let mut output = nonce.to_vec();
        output.extend(ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(output))
    }

    pub fn open(&self, sealed: &str) -> Option<String> {
        let data = base64::engine::general_purpose::STANDARD.decode(sealed.trim()).ok()?;
        if data.len() < NONCE_LEN {
            return None;
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}

/// Token kept in a single file, encrypted when a key is configured.
///
/// A plaintext token found while a key is configured is rewritten in
/// encrypted form on first read.
pub struct FileTokenStore {
    path: PathBuf,
    cipher: Option<TokenCipher>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>, cipher: Option<TokenCipher>) -> Self {
        Self {
            path: path.into(),
            cipher,
        }
    }

    fn read_raw(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Some(raw.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Could not read agent token"
                );
                None
            }
        }
    }

    fn write_raw(&self, contents: &str) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, contents)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get_token(&self) -> String {
        let Some(raw) = self.read_raw() else {
            return String::new();
        };

        if let Some(sealed) = raw.strip_prefix(ENCRYPTED_PREFIX) {
            return match &self.cipher {
                Some(cipher) => cipher.open(sealed).unwrap_or_default(),
                None => String::new(),
            };
        }

        if !raw.is_empty() && self.cipher.is_some() {
            match self.set_token(&raw) {
                Ok(()) => tracing::info!("Migrated plaintext agent token to encrypted storage"),
                Err(e) => tracing::warn!(error = %e, "Could not encrypt stored agent token"),
            }
        }
        raw
    }

    fn set_token(&self, token: &str) -> Result<(), TokenStoreError> {
        let token = token.trim();
        if token.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }

        match &self.cipher {
            Some(cipher) => self.write_raw(&format!("{}{}", ENCRYPTED_PREFIX, cipher.seal(token)?)),
            None => self.write_raw(token),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("Invalid token key (must be 32 bytes, base64-encoded)")]
    InvalidKey,

    #[error("Token encryption failed")]
    EncryptFailed,

    #[error("Token storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}
