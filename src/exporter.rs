use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::domain::unix_millis;
use crate::store::{ColumnDef, Row};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No data to export!")]
    NoRows,
    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to build CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Where finished exports end up. The indirection keeps the CSV assembly
/// testable without a real target directory.
pub trait FileSink {
    fn persist(&self, file_name: &str, content: &[u8]) -> std::io::Result<PathBuf>;
}

/// Writes exports into a fixed directory, creating it on demand.
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirSink { dir: dir.into() }
    }
}

impl FileSink for DirSink {
    fn persist(&self, file_name: &str, content: &[u8]) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

/// Writes all given rows as CSV, one column per visible column definition
/// with the column label as header. A row without a value for some column
/// exports an empty field. Refused when there are no rows at all.
pub fn export_csv(
    rows: &[Row],
    columns: &[ColumnDef],
    sink: &dyn FileSink,
) -> Result<PathBuf, ExportError> {
    if rows.is_empty() {
        return Err(ExportError::NoRows);
    }
    let visible: Vec<&ColumnDef> = columns.iter().filter(|c| c.visible).collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(visible.iter().map(|c| c.label.as_str()))?;
    for row in rows {
        writer.write_record(
            visible
                .iter()
                .map(|c| row.field(&c.id).map(|f| f.render()).unwrap_or_default()),
        )?;
    }
    let content = writer.into_inner().map_err(|e| e.into_error())?;

    let file_name = format!("table-export-{}.csv", unix_millis());
    let path = sink.persist(&file_name, &content)?;
    info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(path)
}
