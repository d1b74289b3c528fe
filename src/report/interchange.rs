//! CSV export and legacy import of the record table.
//!
//! The interchange schema is
//! `id,name,size,mimeType,scope,type,discoveredAt,tested,testedAt,isDownloadable,downloadError,errorType`.
//! Import looks columns up by header name, so older files that lack the
//! verification columns still load.

use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::ReportError;
use crate::persist;
use crate::record::{FileRecord, RecordStore, StoreError, now_timestamp};
use crate::verify::classify;

/// Column names in export order.
pub const CSV_HEADERS: [&str; 12] = [
    "id",
    "name",
    "size",
    "mimeType",
    "scope",
    "type",
    "discoveredAt",
    "tested",
    "testedAt",
    "isDownloadable",
    "downloadError",
    "errorType",
];

/// Counters from one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Rows inserted.
    pub imported: usize,
    /// Rows whose identifier already existed.
    pub duplicates: usize,
    /// Rows skipped as unparseable or inconsistent.
    pub malformed: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CsvRow<'a> {
    id: &'a str,
    name: &'a str,
    size: i64,
    mime_type: Option<&'a str>,
    scope: &'a str,
    #[serde(rename = "type")]
    object_type: &'a str,
    discovered_at: &'a str,
    tested: bool,
    tested_at: Option<&'a str>,
    is_downloadable: Option<bool>,
    download_error: Option<&'a str>,
    error_type: Option<&'a str>,
}

impl<'a> From<&'a FileRecord> for CsvRow<'a> {
    fn from(record: &'a FileRecord) -> Self {
        Self {
            id: &record.cid,
            name: &record.name,
            size: record.size,
            mime_type: record.mime_type.as_deref(),
            scope: &record.scope,
            object_type: &record.object_type,
            discovered_at: &record.discovered_at,
            tested: record.tested,
            tested_at: record.tested_at.as_deref(),
            is_downloadable: record.is_downloadable,
            download_error: record.download_error.as_deref(),
            error_type: record.error_type_str.as_deref(),
        }
    }
}

/// Writes every record to `path` (atomically), returning the row count.
///
/// # Errors
///
/// Returns [`ReportError`] if the store query, encoding or write fails.
#[instrument(skip(store), fields(path = %path.display()))]
pub async fn export_csv(store: &RecordStore, path: &Path) -> Result<usize, ReportError> {
    let records = store.list_all().await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in &records {
        writer.serialize(CsvRow::from(record))?;
    }
    if records.is_empty() {
        writer.write_record(CSV_HEADERS)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Io {
            path: path.display().to_string(),
            source: e.into_error(),
        })?;

    persist::write_atomic(path, &bytes).map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })?;

    info!(rows = records.len(), "exported records");
    Ok(records.len())
}

/// Imports records from a CSV file. A missing file imports nothing.
///
/// Rows whose column count differs from the header, or whose values do not
/// parse, are skipped and counted. Existing identifiers are left untouched.
///
/// # Errors
///
/// Returns [`ReportError`] if the file cannot be read, has no `id` column,
/// or an insert fails for a reason other than invalid values.
#[instrument(skip(store), fields(path = %path.display()))]
pub async fn import_csv(store: &RecordStore, path: &Path) -> Result<ImportStats, ReportError> {
    let mut stats = ImportStats::default();
    if !path.exists() {
        info!("no CSV to import");
        return Ok(stats);
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let columns = Columns::locate(&headers).ok_or(ReportError::MissingColumn("id"))?;

    let discovered_default = now_timestamp();

    for (index, row) in reader.records().enumerate() {
        let line = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(error) => {
                warn!(line, %error, "skipping unreadable row");
                stats.malformed += 1;
                continue;
            }
        };
        if row.len() != headers.len() {
            warn!(
                line,
                expected = headers.len(),
                found = row.len(),
                "skipping row with wrong column count"
            );
            stats.malformed += 1;
            continue;
        }

        let Some(record) = columns.parse(&row, &discovered_default) else {
            warn!(line, "skipping row with invalid values");
            stats.malformed += 1;
            continue;
        };

        match store.import_record(&record).await {
            Ok(true) => stats.imported += 1,
            Ok(false) => stats.duplicates += 1,
            Err(StoreError::InvalidValue { field, value }) => {
                warn!(line, field, value, "skipping inconsistent row");
                stats.malformed += 1;
            }
            Err(error) => return Err(error.into()),
        }
    }

    info!(
        imported = stats.imported,
        duplicates = stats.duplicates,
        malformed = stats.malformed,
        "imported records"
    );
    Ok(stats)
}

/// Header positions for the interchange columns.
struct Columns {
    id: usize,
    name: Option<usize>,
    size: Option<usize>,
    mime_type: Option<usize>,
    scope: Option<usize>,
    object_type: Option<usize>,
    discovered_at: Option<usize>,
    tested: Option<usize>,
    tested_at: Option<usize>,
    is_downloadable: Option<usize>,
    download_error: Option<usize>,
    error_type: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Option<Self> {
        let find = |name: &str| headers.iter().position(|header| header.trim() == name);
        Some(Self {
            id: find("id")?,
            name: find("name"),
            size: find("size"),
            mime_type: find("mimeType"),
            scope: find("scope"),
            object_type: find("type"),
            discovered_at: find("discoveredAt"),
            tested: find("tested"),
            tested_at: find("testedAt"),
            is_downloadable: find("isDownloadable"),
            download_error: find("downloadError"),
            error_type: find("errorType"),
        })
    }

    fn parse(&self, row: &csv::StringRecord, discovered_default: &str) -> Option<FileRecord> {
        let field = |index: Option<usize>| {
            index
                .and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let cid = row.get(self.id)?.trim();
        if cid.is_empty() {
            return None;
        }

        let size = match field(self.size) {
            Some(value) => value.parse::<i64>().ok()?,
            None => 0,
        };
        let tested = match field(self.tested) {
            Some(value) => parse_bool(value)?,
            None => false,
        };
        let is_downloadable = match field(self.is_downloadable) {
            Some(value) => Some(parse_bool(value)?),
            None => None,
        };
        let download_error = field(self.download_error).map(str::to_string);

        let error_type = match field(self.error_type) {
            Some(value) => Some(value.parse::<crate::record::ErrorCategory>().ok()?),
            // Older files recorded the message but not its category.
            None if tested && is_downloadable == Some(false) => Some(classify(
                download_error.as_deref().unwrap_or("<none>"),
            )),
            None => None,
        };

        Some(FileRecord {
            cid: cid.to_string(),
            name: field(self.name).unwrap_or_default().to_string(),
            size,
            mime_type: field(self.mime_type).map(str::to_string),
            scope: field(self.scope)
                .map_or_else(|| "public".to_string(), str::to_ascii_lowercase),
            object_type: field(self.object_type).unwrap_or("file").to_string(),
            discovered_at: field(self.discovered_at)
                .unwrap_or(discovered_default)
                .to_string(),
            tested,
            tested_at: field(self.tested_at).map(str::to_string),
            is_downloadable: if tested { is_downloadable } else { None },
            download_error: if tested { download_error } else { None },
            error_type_str: if tested {
                error_type.map(|category| category.as_str().to_string())
            } else {
                None
            },
            content_kind_str: None,
            attempts: None,
            bytes_read: None,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
