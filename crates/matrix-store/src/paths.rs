use std::path::{Path, PathBuf};

pub const RAW_FILE_NAME: &str = "dtm_pc4.csv";
pub const STORE_FILE_NAME: &str = "matrix.sqlite";

const PARTIAL_SUFFIX: &str = "partial";
const LOCK_SUFFIX: &str = "lock";

#[must_use]
pub fn raw_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(RAW_FILE_NAME)
}

#[must_use]
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_FILE_NAME)
}

/// Scratch file a build writes into before it is renamed over the store.
#[must_use]
pub fn partial_store_path(store: &Path) -> PathBuf {
    with_extra_extension(store, PARTIAL_SUFFIX)
}

#[must_use]
pub fn build_lock_path(store: &Path) -> PathBuf {
    with_extra_extension(store, LOCK_SUFFIX)
}

/// A store counts as built once the file exists with non-zero size.
#[must_use]
pub fn store_is_built(store: &Path) -> bool {
    std::fs::metadata(store)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

fn with_extra_extension(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(".");
    raw.push(suffix);
    PathBuf::from(raw)
}
