use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::crypto::{self, KdfParams};
use crate::models::AppData;

const VAULT_FILE: &str = "data.lunaria";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("data directory not found")]
    NoDataDir,
}

/// Platform data directory for the vault, e.g. `~/.local/share/lunaria`.
pub fn default_data_dir() -> Result<PathBuf, StorageError> {
    Ok(dirs::data_local_dir()
        .ok_or(StorageError::NoDataDir)?
        .join("lunaria"))
}

fn vault_path(dir: &Path) -> PathBuf {
    dir.join(VAULT_FILE)
}

/// Check if a vault exists (i.e., the tracker has been set up before).
pub fn data_exists(dir: &Path) -> bool {
    vault_path(dir).exists()
}

/// Seal and write the snapshot. The previous vault is only replaced once the
/// new one is fully on disk.
pub fn save(
    dir: &Path,
    passphrase: &str,
    data: &AppData,
    kdf: &KdfParams,
) -> Result<(), StorageError> {
    fs::create_dir_all(dir)?;
    let json = zeroize::Zeroizing::new(serde_json::to_vec(data)?);
    let sealed = crypto::seal(passphrase, &json, kdf)?;

    let path = vault_path(dir);
    let staging = path.with_extension("tmp");
    fs::write(&staging, sealed)?;
    fs::rename(&staging, &path)?;

    info!(
        "event=vault_save module=storage status=ok cycles={} logs={}",
        data.cycles.len(),
        data.logs.len()
    );
    Ok(())
}

/// Load and decrypt the snapshot with the given passphrase.
pub fn load(dir: &Path, passphrase: &str) -> Result<AppData, StorageError> {
    let sealed = fs::read(vault_path(dir))?;
    let json = zeroize::Zeroizing::new(crypto::open(passphrase, &sealed)?);
    let data: AppData = serde_json::from_slice(&json)?;
    Ok(data)
}

/// Delete all data permanently.
pub fn wipe(dir: &Path) -> Result<(), StorageError> {
    let path = vault_path(dir);
    if path.exists() {
        fs::remove_file(path)?;
        info!("event=vault_wipe module=storage status=ok");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_kdf;
    use crate::models::{Cycle, UserSettings};
    use chrono::NaiveDate;

    #[test]
    fn save_load_wipe() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!data_exists(dir.path()));

        let data = AppData {
            cycles: vec![Cycle::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())],
            logs: Vec::new(),
            settings: UserSettings {
                onboarding_completed: true,
                ..UserSettings::default()
            },
        };
        save(dir.path(), "pass", &data, &test_kdf()).unwrap();
        assert!(data_exists(dir.path()));
        assert_eq!(load(dir.path(), "pass").unwrap(), data);

        assert!(matches!(
            load(dir.path(), "nope"),
            Err(StorageError::Crypto(crypto::CryptoError::Decryption))
        ));

        wipe(dir.path()).unwrap();
        assert!(!data_exists(dir.path()));
        assert!(matches!(load(dir.path(), "pass"), Err(StorageError::Io(_))));
    }
}
