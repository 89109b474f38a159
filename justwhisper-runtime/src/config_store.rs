use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use justwhisper_core::AppConfig;
use tokio::sync::watch;

/// §4.1 durable, typed settings store: atomic write, one change broadcast per `save`.
pub struct ConfigStore {
    path: PathBuf,
    change_tx: watch::Sender<AppConfig>,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    /// Loads `path` if it exists, otherwise seeds it with `AppConfig::new_default()`.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let initial = if path.exists() {
            load_from_disk(&path)?
        } else {
            let cfg = AppConfig::new_default();
            write_to_disk(&path, &cfg)?;
            cfg
        };
        let (change_tx, _) = watch::channel(initial);
        Ok(Self { path, change_tx, write_lock: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> AppConfig {
        self.change_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppConfig> {
        self.change_tx.subscribe()
    }

    /// Durable before returning: the file is fsync'd and renamed into place before the change
    /// broadcast fires. `write_lock` keeps two concurrent `save` calls from racing on the same
    /// temp file.
    pub fn save(&self, cfg: &AppConfig) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        write_to_disk(&self.path, cfg)?;
        let _ = self.change_tx.send(cfg.clone());
        Ok(())
    }
}

fn load_from_disk(path: &Path) -> anyhow::Result<AppConfig> {
    let bytes = std::fs::read(path).with_context(|| format!("read config: {}", path.display()))?;
    let mut cfg: AppConfig = serde_json::from_slice(&bytes).context("decode config JSON")?;

    // The file never carries credentials in cleartext; fill them back in from the keyring.
    // Best-effort: a missing/unavailable keyring backend should not block loading the rest of
    // the config (the provider simply reports itself unusable until the user re-enters a key).
    if let Err(e) = crate::secrets::rehydrate_keys(&mut cfg.speech_provider, &mut cfg.chat_provider) {
        log::warn!("failed to rehydrate provider credentials from keyring: {e}");
    }
    Ok(cfg)
}

fn write_to_disk(path: &Path, cfg: &AppConfig) -> anyhow::Result<()> {
    // §9 AMBIENT: API keys are moved to the OS keyring before the config ever touches disk.
    let mut on_disk = cfg.clone();
    if let Err(e) =
        crate::secrets::extract_and_store_keys(&mut on_disk.speech_provider, &mut on_disk.chat_provider)
    {
        log::warn!("failed to store provider credentials in keyring, leaving them in config: {e}");
    }

    let json = serde_json::to_vec_pretty(&on_disk).context("encode config JSON")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create config directory: {}", parent.display()))?;
    }

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("write temp: {}", tmp.display()))?;
    crate::models::replace_file(&tmp, path).with_context(|| format!("replace file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigStore::open(&path).unwrap();

        let mut cfg = store.current();
        cfg.use_llm_enhancement = true;
        store.save(&cfg).unwrap();

        let reopened = ConfigStore::open(&path).unwrap();
        assert!(reopened.current().use_llm_enhancement);
    }

    #[test]
    fn seeds_default_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.current().enabled);
    }

    #[test]
    fn save_fires_one_change_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("config.json")).unwrap();
        let mut rx = store.subscribe();

        let mut cfg = store.current();
        cfg.use_llm_enhancement = true;
        store.save(&cfg).unwrap();

        rx.mark_changed();
        assert!(rx.borrow_and_update().use_llm_enhancement);
    }
}
