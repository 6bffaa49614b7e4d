//! Durable storage for the session credential.
//!
//! Exactly one credential is persisted per installation, under a single
//! well-known key. Absence of the key is the normal logged-out state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use keyring::Entry;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Keyring service the credential is filed under
const SERVICE_NAME: &str = "mailroom";

/// The single well-known key the credential is stored under
pub const CREDENTIAL_KEY: &str = "session-token";

/// Session file name in cache directory
pub const SESSION_FILE: &str = "session.json";

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// Opaque bearer token identifying a session to the backend.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header and for persistence only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// A process-external key-value store holding at most one credential.
pub trait CredentialStore: Send + Sync {
    /// Read the persisted credential, `None` when nothing is stored.
    fn load(&self) -> Result<Option<Credential>>;

    /// Persist the credential, replacing any previous one.
    fn save(&self, credential: &Credential) -> Result<()>;

    /// Remove the persisted credential. Erasing an absent credential succeeds.
    fn erase(&self) -> Result<()>;
}

// ============================================================================
// OS keychain
// ============================================================================

/// Credential store backed by the OS keychain.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, CREDENTIAL_KEY).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn load(&self) -> Result<Option<Credential>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(Credential::new(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        self.entry()?
            .set_password(credential.expose())
            .context("Failed to store credential in keychain")
    }

    fn erase(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

// ============================================================================
// Encrypted file
// ============================================================================

#[derive(Serialize, Deserialize)]
struct SealedCredential {
    key: String,
    salt: Vec<u8>,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

/// Credential store for hosts without a usable keychain.
///
/// The token is sealed with ChaCha20-Poly1305 under a key derived with Argon2
/// from a machine-bound secret. Every write uses a fresh salt and nonce.
pub struct EncryptedFileStore {
    path: PathBuf,
    secret: Vec<u8>,
}

impl EncryptedFileStore {
    pub fn new(path: impl Into<PathBuf>, secret: impl AsRef<[u8]>) -> Self {
        Self {
            path: path.into(),
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Store the credential as `session.json` in `cache_dir`, keyed to this machine.
    pub fn in_cache_dir(cache_dir: &Path) -> Self {
        Self::new(cache_dir.join(SESSION_FILE), machine_secret())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn derive_key(&self, salt: &[u8]) -> Result<[u8; 32]> {
        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(&self.secret, salt, &mut key)
            .map_err(|e| anyhow::anyhow!("Failed to derive encryption key: {}", e))?;
        Ok(key)
    }

    fn seal(&self, credential: &Credential) -> Result<SealedCredential> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let key = self.derive_key(&salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), credential.expose().as_bytes())
            .map_err(|_| anyhow::anyhow!("Failed to encrypt credential"))?;

        Ok(SealedCredential {
            key: CREDENTIAL_KEY.to_string(),
            salt: salt.to_vec(),
            nonce: nonce.to_vec(),
            ciphertext,
        })
    }

    fn open(&self, sealed: &SealedCredential) -> Option<Credential> {
        if sealed.key != CREDENTIAL_KEY || sealed.nonce.len() != NONCE_LEN {
            return None;
        }
        let key = self.derive_key(&sealed.salt).ok()?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_ref())
            .ok()?;
        String::from_utf8(plaintext).ok().map(Credential::new)
    }
}

impl CredentialStore for EncryptedFileStore {
    fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;

        let sealed: SealedCredential = match serde_json::from_str(&contents) {
            Ok(sealed) => sealed,
            Err(e) => {
                warn!(error = %e, path = ?self.path, "Session file is malformed, ignoring it");
                return Ok(None);
            }
        };

        let credential = self.open(&sealed);
        if credential.is_none() {
            // Sealed on another machine or tampered with.
            warn!(path = ?self.path, "Session file could not be decrypted, ignoring it");
        }
        Ok(credential)
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        let sealed = self.seal(credential)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string(&sealed)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")?;
        debug!(path = ?self.path, "Credential written");
        Ok(())
    }

    fn erase(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session file"),
        }
    }
}

/// A stable per-machine secret for `EncryptedFileStore`.
///
/// Uses `/etc/machine-id` where available, falling back to the host and user
/// names so the key stays stable across runs.
pub fn machine_secret() -> String {
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        if let Ok(id) = std::fs::read_to_string(path) {
            let id = id.trim();
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }

    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_default();
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    format!("{}:{}:{}", SERVICE_NAME, host, user)
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `credential`, as if left by a previous run.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<Credential>> {
        Ok(self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(credential.clone());
        Ok(())
    }

    fn erase(&self) -> Result<()> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }
}
