//! # Sentry Keystore
//!
//! Rotation-aware storage for the Ed25519 key pairs that sign and verify
//! tokens.
//!
//! ## Key repository layout
//!
//! Keys are provisioned out-of-band as PEM files on disk, grouped by
//! rotation epoch ("session"):
//!
//! ```text
//! keys/
//!   sessions01/
//!     1569901546-private.pem     PKCS#8 Ed25519 private key
//!     1569901546-public.pem      SPKI Ed25519 public key
//!   sessions02/
//!     1572580321-private.pem
//!     1572580321-public.pem
//! ```
//!
//! The file stem is a provisioning timestamp; together with the epoch name
//! it forms the key id (`sessions02/1572580321`) that tokens carry so
//! verifiers can resolve the right public key.
//!
//! The newest epoch signs. Older epochs are retained (public half only is
//! required) so tokens signed before a rotation keep validating until they
//! expire. The loaded key set is an immutable snapshot behind an `Arc`;
//! rotation swaps the whole snapshot atomically, so in-flight validations
//! never observe a half-updated key table.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;

pub use error::KeyStoreError;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use jsonwebtoken::{DecodingKey, EncodingKey};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const PRIVATE_SUFFIX: &str = "-private.pem";
const PUBLIC_SUFFIX: &str = "-public.pem";

/// The currently-active signing key.
struct SigningEntry {
    key_id: String,
    key: EncodingKey,
}

/// One immutable snapshot of the key repository.
struct KeySet {
    /// Epoch names, sorted ascending; the last entry is the signing epoch.
    epochs: Vec<String>,
    signing: Option<SigningEntry>,
    /// Public keys by key id, across all retained epochs.
    verifying: HashMap<String, DecodingKey>,
}

/// Holds the set of active key pairs, grouped by rotation epoch.
///
/// Cheap to share behind an `Arc`; all accessors take `&self`.
pub struct KeyStore {
    keys_dir: PathBuf,
    inner: RwLock<Arc<KeySet>>,
}

impl KeyStore {
    /// Loads every epoch present under `keys_dir`.
    ///
    /// Key material is validated as it is read, so a misprovisioned file
    /// fails startup instead of the first signature.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::Repository`] if the directory cannot be
    /// read, or [`KeyStoreError::InvalidKey`] for unusable key files.
    pub fn load(keys_dir: impl AsRef<Path>) -> Result<Self, KeyStoreError> {
        let keys_dir = keys_dir.as_ref().to_path_buf();
        let set = load_key_set(&keys_dir)?;

        info!(
            path = %keys_dir.display(),
            epochs = set.epochs.len(),
            keys = set.verifying.len(),
            signing = set.signing.as_ref().map(|s| s.key_id.as_str()),
            "key repository loaded"
        );

        Ok(Self {
            keys_dir,
            inner: RwLock::new(Arc::new(set)),
        })
    }

    /// Returns the key id and private key for new issuance.
    ///
    /// Always the newest epoch's newest pair that has a private half.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::NoSigningKey`] if the newest epoch holds no
    /// private key. This is fatal for an issuing node and must halt
    /// issuance; it is the expected state on validation-only deployments.
    pub fn signing_key(&self) -> Result<(String, EncodingKey), KeyStoreError> {
        let set = self.snapshot();
        match &set.signing {
            Some(entry) => Ok((entry.key_id.clone(), entry.key.clone())),
            None => Err(KeyStoreError::NoSigningKey),
        }
    }

    /// Key id of the current signing key, if any.
    pub fn signing_key_id(&self) -> Option<String> {
        self.snapshot().signing.as_ref().map(|s| s.key_id.clone())
    }

    /// Resolves a public key by key id.
    ///
    /// A miss is a definite answer: the key id is not recognized and the
    /// token carrying it must be rejected. There is no fetch-on-miss.
    pub fn public_key_for(&self, key_id: &str) -> Option<DecodingKey> {
        self.snapshot().verifying.get(key_id).cloned()
    }

    /// Epoch names currently retained, oldest first.
    pub fn epochs(&self) -> Vec<String> {
        self.snapshot().epochs.clone()
    }

    /// All key ids currently resolvable, sorted.
    pub fn key_ids(&self) -> Vec<String> {
        let set = self.snapshot();
        let mut ids: Vec<String> = set.verifying.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Reloads the repository from disk and swaps in the new snapshot.
    ///
    /// In-flight validations keep the snapshot they already hold; new calls
    /// see the rotated set.
    ///
    /// # Errors
    ///
    /// Returns the load error without touching the current snapshot, so a
    /// botched rotation never takes down a working key set.
    pub fn rotate(&self) -> Result<(), KeyStoreError> {
        let set = load_key_set(&self.keys_dir)?;

        info!(
            epochs = set.epochs.len(),
            signing = set.signing.as_ref().map(|s| s.key_id.as_str()),
            "key repository rotated"
        );

        let mut guard = self.inner.write().expect("key set lock poisoned");
        *guard = Arc::new(set);
        Ok(())
    }

    /// Drops epochs beyond the newest `keep` from the snapshot.
    ///
    /// The signing epoch is never pruned; `keep` is clamped to at least 1.
    /// Files on disk are untouched — pruning only narrows what this process
    /// will resolve.
    pub fn prune(&self, keep: usize) {
        let keep = keep.max(1);

        let mut guard = self.inner.write().expect("key set lock poisoned");
        let set = guard.as_ref();
        if set.epochs.len() <= keep {
            return;
        }

        let cut = set.epochs.len() - keep;
        let (dropped, kept) = set.epochs.split_at(cut);

        let verifying = set
            .verifying
            .iter()
            .filter(|(key_id, _)| {
                kept.iter()
                    .any(|epoch| key_id.starts_with(&format!("{epoch}/")))
            })
            .map(|(key_id, key)| (key_id.clone(), key.clone()))
            .collect();

        warn!(dropped = ?dropped, "pruned key epochs from snapshot");

        *guard = Arc::new(KeySet {
            epochs: kept.to_vec(),
            signing: set.signing.as_ref().map(|s| SigningEntry {
                key_id: s.key_id.clone(),
                key: s.key.clone(),
            }),
            verifying,
        });
    }

    fn snapshot(&self) -> Arc<KeySet> {
        Arc::clone(&self.inner.read().expect("key set lock poisoned"))
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = self.snapshot();
        f.debug_struct("KeyStore")
            .field("keys_dir", &self.keys_dir)
            .field("epochs", &set.epochs)
            .field("keys", &set.verifying.len())
            .finish()
    }
}

/// Minimum number of epochs the repository must retain so that every token
/// issued under the previous rotation still finds its public key before it
/// expires: `ceil(max_token_lifetime / rotation_interval) + 1`.
pub fn retained_epoch_floor(max_token_lifetime: Duration, rotation_interval: Duration) -> usize {
    let lifetime = max_token_lifetime.as_secs().max(1);
    let interval = rotation_interval.as_secs().max(1);
    (lifetime.div_ceil(interval) + 1) as usize
}

fn load_key_set(keys_dir: &Path) -> Result<KeySet, KeyStoreError> {
    let repository = |e: std::io::Error| KeyStoreError::Repository {
        path: keys_dir.to_path_buf(),
        message: e.to_string(),
    };

    let mut epochs = Vec::new();
    for entry in fs::read_dir(keys_dir).map_err(repository)? {
        let entry = entry.map_err(repository)?;
        if entry.file_type().map_err(repository)?.is_dir() {
            epochs.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    epochs.sort();

    let mut verifying = HashMap::new();
    let mut signing = None;

    for (index, epoch) in epochs.iter().enumerate() {
        let epoch_dir = keys_dir.join(epoch);
        let is_signing_epoch = index == epochs.len() - 1;

        // Newest private stem wins within the signing epoch.
        let mut best_private: Option<(String, EncodingKey)> = None;

        for entry in fs::read_dir(&epoch_dir).map_err(repository)? {
            let entry = entry.map_err(repository)?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            if let Some(stem) = file_name.strip_suffix(PUBLIC_SUFFIX) {
                let pem = fs::read(&path).map_err(repository)?;
                let key = DecodingKey::from_ed_pem(&pem).map_err(|e| {
                    KeyStoreError::InvalidKey {
                        path: path.clone(),
                        message: e.to_string(),
                    }
                })?;
                let key_id = format!("{epoch}/{stem}");
                debug!(key_id = %key_id, "loaded public key");
                verifying.insert(key_id, key);
            } else if let Some(stem) = file_name.strip_suffix(PRIVATE_SUFFIX) {
                if !is_signing_epoch {
                    // Historical epochs only need their public halves; a
                    // leftover private key is ignored for signing.
                    debug!(epoch = %epoch, stem = %stem, "skipping private key of retired epoch");
                    continue;
                }

                let pem = Zeroizing::new(fs::read(&path).map_err(repository)?);
                let key = EncodingKey::from_ed_pem(&pem).map_err(|e| {
                    KeyStoreError::InvalidKey {
                        path: path.clone(),
                        message: e.to_string(),
                    }
                })?;

                let replace = best_private
                    .as_ref()
                    .map_or(true, |(current, _)| stem > current.as_str());
                if replace {
                    best_private = Some((stem.to_string(), key));
                }
            }
        }

        if is_signing_epoch {
            signing = best_private.map(|(stem, key)| {
                let key_id = format!("{epoch}/{stem}");
                if !verifying.contains_key(&key_id) {
                    warn!(
                        key_id = %key_id,
                        "signing key has no public counterpart on disk; \
                         verifiers elsewhere cannot resolve it"
                    );
                }
                SigningEntry { key_id, key }
            });
        }
    }

    Ok(KeySet {
        epochs,
        signing,
        verifying,
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use std::fs;

    use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
    use ed25519_dalek::pkcs8::{EncodePrivateKey, EncodePublicKey};
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use tempfile::TempDir;

    use super::*;

    /// Writes a fresh key pair into `keys_dir/<epoch>/<stem>-{private,public}.pem`.
    fn provision(keys_dir: &Path, epoch: &str, stem: &str, private: bool) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let epoch_dir = keys_dir.join(epoch);
        fs::create_dir_all(&epoch_dir).unwrap();

        let public_pem = signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        fs::write(epoch_dir.join(format!("{stem}{PUBLIC_SUFFIX}")), public_pem).unwrap();

        if private {
            let private_pem = signing_key.to_pkcs8_pem(LineEnding::LF).unwrap();
            fs::write(
                epoch_dir.join(format!("{stem}{PRIVATE_SUFFIX}")),
                private_pem.as_bytes(),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_load_empty_repository() {
        let tmp = TempDir::new().unwrap();
        let store = KeyStore::load(tmp.path()).unwrap();

        assert!(store.epochs().is_empty());
        assert!(matches!(
            store.signing_key(),
            Err(KeyStoreError::NoSigningKey)
        ));
    }

    #[test]
    fn test_missing_repository_fails() {
        let tmp = TempDir::new().unwrap();
        let result = KeyStore::load(tmp.path().join("nonexistent"));
        assert!(matches!(result, Err(KeyStoreError::Repository { .. })));
    }

    #[test]
    fn test_newest_epoch_signs() {
        let tmp = TempDir::new().unwrap();
        provision(tmp.path(), "sessions01", "1569901546", true);
        provision(tmp.path(), "sessions02", "1572580321", true);

        let store = KeyStore::load(tmp.path()).unwrap();

        let (key_id, _) = store.signing_key().unwrap();
        assert_eq!(key_id, "sessions02/1572580321");
        assert_eq!(store.epochs(), vec!["sessions01", "sessions02"]);
    }

    #[test]
    fn test_newest_stem_wins_within_epoch() {
        let tmp = TempDir::new().unwrap();
        provision(tmp.path(), "sessions01", "1569901546", true);
        provision(tmp.path(), "sessions01", "1569999999", true);

        let store = KeyStore::load(tmp.path()).unwrap();
        assert_eq!(store.signing_key_id().unwrap(), "sessions01/1569999999");
    }

    #[test]
    fn test_historical_public_keys_resolvable() {
        let tmp = TempDir::new().unwrap();
        provision(tmp.path(), "sessions01", "1569901546", true);
        provision(tmp.path(), "sessions02", "1572580321", true);

        let store = KeyStore::load(tmp.path()).unwrap();

        assert!(store.public_key_for("sessions01/1569901546").is_some());
        assert!(store.public_key_for("sessions02/1572580321").is_some());
    }

    #[test]
    fn test_unknown_key_id_is_definite_miss() {
        let tmp = TempDir::new().unwrap();
        provision(tmp.path(), "sessions01", "1569901546", true);

        let store = KeyStore::load(tmp.path()).unwrap();
        assert!(store.public_key_for("sessions09/1600000000").is_none());
    }

    #[test]
    fn test_public_only_repository_validates_but_cannot_sign() {
        let tmp = TempDir::new().unwrap();
        provision(tmp.path(), "sessions01", "1569901546", false);

        let store = KeyStore::load(tmp.path()).unwrap();

        assert!(store.public_key_for("sessions01/1569901546").is_some());
        assert!(matches!(
            store.signing_key(),
            Err(KeyStoreError::NoSigningKey)
        ));
    }

    #[test]
    fn test_invalid_key_material_fails_load() {
        let tmp = TempDir::new().unwrap();
        let epoch_dir = tmp.path().join("sessions01");
        fs::create_dir_all(&epoch_dir).unwrap();
        fs::write(epoch_dir.join("1569901546-public.pem"), b"not a pem").unwrap();

        let result = KeyStore::load(tmp.path());
        assert!(matches!(result, Err(KeyStoreError::InvalidKey { .. })));
    }

    #[test]
    fn test_rotation_swaps_signing_epoch() {
        let tmp = TempDir::new().unwrap();
        provision(tmp.path(), "sessions01", "1569901546", true);

        let store = KeyStore::load(tmp.path()).unwrap();
        assert_eq!(store.signing_key_id().unwrap(), "sessions01/1569901546");

        provision(tmp.path(), "sessions02", "1572580321", true);
        store.rotate().unwrap();

        assert_eq!(store.signing_key_id().unwrap(), "sessions02/1572580321");
        // Tokens signed under the previous epoch must keep validating.
        assert!(store.public_key_for("sessions01/1569901546").is_some());
    }

    #[test]
    fn test_prune_respects_retention() {
        let tmp = TempDir::new().unwrap();
        provision(tmp.path(), "sessions01", "100", true);
        provision(tmp.path(), "sessions02", "200", true);
        provision(tmp.path(), "sessions03", "300", true);

        let store = KeyStore::load(tmp.path()).unwrap();
        store.prune(2);

        assert_eq!(store.epochs(), vec!["sessions02", "sessions03"]);
        assert!(store.public_key_for("sessions01/100").is_none());
        assert!(store.public_key_for("sessions02/200").is_some());
        assert_eq!(store.signing_key_id().unwrap(), "sessions03/300");
    }

    #[test]
    fn test_prune_never_drops_signing_epoch() {
        let tmp = TempDir::new().unwrap();
        provision(tmp.path(), "sessions01", "100", true);
        provision(tmp.path(), "sessions02", "200", true);

        let store = KeyStore::load(tmp.path()).unwrap();
        store.prune(0);

        assert_eq!(store.epochs(), vec!["sessions02"]);
        assert!(store.signing_key().is_ok());
    }

    #[test]
    fn test_retained_epoch_floor() {
        let hour = Duration::from_secs(3600);
        let day = Duration::from_secs(86400);

        // One-hour tokens, daily rotation: the previous epoch plus current.
        assert_eq!(retained_epoch_floor(hour, day), 2);
        // Day-long tokens, hourly rotation: 24 back-epochs plus current.
        assert_eq!(retained_epoch_floor(day, hour), 25);
        // Lifetime equal to the interval still needs the previous epoch.
        assert_eq!(retained_epoch_floor(hour, hour), 2);
    }
}
