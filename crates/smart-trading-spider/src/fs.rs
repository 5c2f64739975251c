use crate::Error;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, trace};

/// Create `dir` (and its parents) unless it exists; returns whether it was created.
pub async fn ensure_dir(dir: &Path) -> anyhow::Result<bool> {
    trace!("checking directory path: {:?}", dir);
    if tokio::fs::try_exists(dir).await? {
        return Ok(false);
    }
    tokio::fs::create_dir_all(dir).await?;
    info!("Created directory to save csvs: {}", dir.display());
    Ok(true)
}

/// `<dir>/<name>_<kind>_<YYYY_MM_DD>.csv`, e.g. `IBM_daily_2024_01_05.csv`
pub fn csv_path(dir: &Path, name: &str, kind: &str, today: NaiveDate) -> PathBuf {
    dir.join(format!(
        "{name}_{kind}_{}.csv",
        today.format("%Y_%m_%d")
    ))
}

/// Write `rows` to a CSV file at `path`, headers taken from the row's field names.
pub fn write_csv<S, I>(path: &Path, rows: I) -> Result<usize, Error>
where
    S: Serialize,
    I: IntoIterator<Item = S>,
{
    let to_err = |err: csv::Error| Error::Csv(path.to_path_buf(), err);

    let mut writer = csv::Writer::from_path(path).map_err(to_err)?;
    let mut written = 0;
    for row in rows {
        writer.serialize(row).map_err(to_err)?;
        written += 1;
    }
    writer
        .flush()
        .map_err(|err| Error::Csv(path.to_path_buf(), err.into()))?;

    trace!("{written} rows written to {}", path.display());
    Ok(written)
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
