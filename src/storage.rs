use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use color_eyre::Result;

use crate::normalize::JobTable;

const SNAPSHOT_PATH: &str = "latest-snapshot.json";
const SNAPSHOT_TMP_PATH: &str = "latest-snapshot.json.tmp";

/// Load the snapshot left behind by the previous run, if any.
pub fn load_latest_snapshot(storage_path: &Path) -> Result<Option<JobTable>> {
    match fs::read_to_string(storage_path.join(SNAPSHOT_PATH)) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Replace the on-disk snapshot wholesale. Written to a temp file first and
/// renamed into place so readers never see a half-written table.
pub fn write_new_snapshot(storage_path: &Path, rows: &JobTable) -> Result<()> {
    fs::create_dir_all(storage_path)?;
    let tmp = storage_path.join(SNAPSHOT_TMP_PATH);
    fs::write(&tmp, serde_json::to_string_pretty(rows)?)?;
    fs::rename(tmp, storage_path.join(SNAPSHOT_PATH))?;
    Ok(())
}
