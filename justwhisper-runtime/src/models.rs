use std::fs;
use std::path::Path;

use anyhow::Context;

/// Atomically replaces `dst` with `tmp`, keeping a `.bak` around in case the final rename fails.
///
/// Used by [`crate::config_store::ConfigStore`] to make config writes crash-safe.
pub fn replace_file(tmp: &Path, dst: &Path) -> anyhow::Result<()> {
    let backup = dst.with_extension("bak");

    if dst.exists() {
        let _ = fs::remove_file(&backup);
        fs::rename(dst, &backup)
            .with_context(|| format!("failed rename {} -> {}", dst.display(), backup.display()))?;
    }

    if let Err(e) = fs::rename(tmp, dst) {
        // Try to restore previous file if we had one.
        if backup.exists() {
            let _ = fs::rename(&backup, dst);
        }
        let _ = fs::remove_file(tmp);
        return Err(anyhow::Error::new(e).context(format!(
            "failed rename {} -> {}",
            tmp.display(),
            dst.display()
        )));
    }

    let _ = fs::remove_file(&backup);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("config.json");
        let tmp = dir.path().join("config.json.tmp");

        fs::write(&dst, b"old").unwrap();
        fs::write(&tmp, b"new").unwrap();

        replace_file(&tmp, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"new");
        assert!(!tmp.exists());
    }

    #[test]
    fn creates_new_file_when_dst_absent() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("config.json");
        let tmp = dir.path().join("config.json.tmp");

        fs::write(&tmp, b"fresh").unwrap();
        replace_file(&tmp, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"fresh");
    }
}
