use crate::{IngestError, Result};
use dtm_matrix_store::build_lock_path;
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::Path;
use std::time::Instant;

/// Exclusive advisory lock held for the whole build so two processes never load the same store.
pub(crate) struct BuildLock {
    file: std::fs::File,
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Blocks until the lock next to `store` is ours.
pub(crate) fn acquire_build_lock(store: &Path) -> Result<BuildLock> {
    let path = build_lock_path(store);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|err| IngestError::Other(format!("open build lock {}: {err}", path.display())))?;

    let start = Instant::now();
    file.lock_exclusive().map_err(|err| {
        IngestError::Other(format!("acquire build lock {}: {err}", path.display()))
    })?;
    log::debug!(
        "Acquired build lock {} after {} ms",
        path.display(),
        start.elapsed().as_millis()
    );

    Ok(BuildLock { file })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_is_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let store = temp.path().join("matrix.sqlite");

        let first = acquire_build_lock(&store).unwrap();
        let probe = OpenOptions::new()
            .read(true)
            .write(true)
            .open(build_lock_path(&store))
            .unwrap();
        assert!(probe.try_lock_exclusive().is_err());

        drop(first);
        probe.try_lock_exclusive().unwrap();
        probe.unlock().unwrap();
    }
}
