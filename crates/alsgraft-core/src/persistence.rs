use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::set::LiveSet;

#[instrument(skip(set), fields(path = %path.display()))]
pub fn save_set(path: &Path, set: &LiveSet) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }

    let bytes = set.to_bytes().context("failed to serialize set")?;
    let mut temp_file = tempfile::NamedTempFile::new_in(
        path.parent()
            .map_or_else(|| Path::new(".").to_path_buf(), Path::to_path_buf),
    )
    .context("failed to create temp set file")?;

    use std::io::Write;
    temp_file
        .write_all(&bytes)
        .context("failed to write temp set file")?;
    temp_file
        .persist(path)
        .map_err(|error| anyhow::anyhow!(error.error))
        .with_context(|| format!("failed to persist set: {}", path.display()))?;

    info!("set saved");
    Ok(())
}

#[instrument(fields(path = %path.display()))]
pub fn load_set(path: &Path) -> Result<LiveSet> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read set: {}", path.display()))?;
    let set = LiveSet::from_bytes(&bytes)
        .with_context(|| format!("invalid set document: {}", path.display()))?;
    info!("set loaded");
    Ok(set)
}

#[instrument(skip(set), fields(autosave_dir = %autosave_dir.display()))]
pub fn autosave_set(set: &LiveSet, autosave_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(autosave_dir).with_context(|| {
        format!(
            "failed to create autosave directory: {}",
            autosave_dir.display()
        )
    })?;

    let file_name = format!("{}.autosave.als", Uuid::new_v4());
    let autosave_path = autosave_dir.join(file_name);
    save_set(&autosave_path, set)?;

    debug!(path = %autosave_path.display(), "autosave complete");
    Ok(autosave_path)
}
