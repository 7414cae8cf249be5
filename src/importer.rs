use std::collections::HashMap;
use std::path::Path;

use csv::ReaderBuilder;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::unix_millis;
use crate::store::{Row, Value};

pub const MAX_IMPORT_SIZE: u64 = 5 * 1024 * 1024;

/// Header names an import must provide, matched verbatim.
pub const REQUIRED_COLUMNS: [&str; 4] = ["name", "email", "age", "role"];

const MAX_AGE: i64 = 150;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid file format! Only .csv files can be imported.")]
    NotCsv,
    #[error("File is too large! Maximum size is 5MB.")]
    TooLarge,
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV parsing errors: {}", .0.join(", "))]
    Parse(Vec<String>),
    #[error("Row {row}: Missing required fields (name or email)")]
    MissingRequired { row: usize },
    #[error("Row {row}: Invalid email format - {email}")]
    InvalidEmail { row: usize, email: String },
    #[error("Row {row}: Invalid age - {age}")]
    InvalidAge { row: usize, age: String },
    #[error("CSV file is empty or contains no valid data.")]
    Empty,
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

impl ImportError {
    /// An empty file aborts the import but is reported as a warning, not
    /// an error.
    pub fn is_warning(&self) -> bool {
        matches!(self, ImportError::Empty)
    }
}

/// Reads and validates a CSV file into normalized rows. Checks run in a
/// fixed order: file name, file size, record syntax (all syntax errors
/// reported together), field validation (first failure aborts), empty
/// result, required header columns.
pub fn import_csv_file(path: &Path) -> Result<Vec<Row>, ImportError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_uppercase())
        .as_deref()
        == Some("CSV");
    if !is_csv {
        return Err(ImportError::NotCsv);
    }

    let size = std::fs::metadata(path)?.len();
    if size > MAX_IMPORT_SIZE {
        debug!("Refusing {}: {size} bytes", path.display());
        return Err(ImportError::TooLarge);
    }

    let content = std::fs::read_to_string(path)?;
    let rows = parse_csv(&content)?;
    info!("Imported {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Parses CSV text into normalized rows. Exposed separately so the
/// pipeline can be exercised without touching the filesystem.
pub fn parse_csv(content: &str) -> Result<Vec<Row>, ImportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| ImportError::Parse(vec![format!("Row 1: {e}")]))?
        .clone();

    // Collect every syntactically broken record before giving up, so one
    // report covers the whole file.
    let mut records = Vec::new();
    let mut parse_errors = Vec::new();
    for (index, result) in reader.records().enumerate() {
        match result {
            Ok(record) => records.push((index, record)),
            Err(e) => parse_errors.push(format!("Row {}: {}", index + 2, describe_parse_error(&e))),
        }
    }
    if !parse_errors.is_empty() {
        return Err(ImportError::Parse(parse_errors));
    }

    let batch = unix_millis();
    let mut rows = Vec::with_capacity(records.len());
    for (index, record) in &records {
        rows.push(normalize_record(&headers, record, *index, batch)?);
    }

    if rows.is_empty() {
        return Err(ImportError::Empty);
    }

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h == **required))
        .map(|s| s.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    Ok(rows)
}

/// Validates one record and shapes it into a row. `index` is the zero
/// based record index; the header line is row 1, so the record shows up
/// as row `index + 2` in messages.
fn normalize_record(
    headers: &csv::StringRecord,
    record: &csv::StringRecord,
    index: usize,
    batch: u128,
) -> Result<Row, ImportError> {
    let row = index + 2;
    let get = |column: &str| {
        headers
            .iter()
            .position(|h| h == column)
            .and_then(|i| record.get(i))
            .unwrap_or("")
    };

    let name = get("name");
    let email = get("email");
    if name.is_empty() || email.is_empty() {
        return Err(ImportError::MissingRequired { row });
    }
    if !is_valid_email(email) {
        return Err(ImportError::InvalidEmail {
            row,
            email: email.to_string(),
        });
    }

    let age_raw = get("age");
    let age_text = age_raw.trim();
    let age: i64 = if age_text.is_empty() {
        0
    } else {
        age_text.parse().map_err(|_| ImportError::InvalidAge {
            row,
            age: age_raw.to_string(),
        })?
    };
    if !(0..=MAX_AGE).contains(&age) {
        return Err(ImportError::InvalidAge {
            row,
            age: age_raw.to_string(),
        });
    }

    let role = get("role").trim();
    let mut extra = HashMap::new();
    extra.insert(
        "department".to_string(),
        Value::Text(get("department").trim().to_string()),
    );
    extra.insert(
        "location".to_string(),
        Value::Text(get("location").trim().to_string()),
    );

    Ok(Row {
        id: format!("row-{batch}-{index}"),
        name: name.trim().to_string(),
        email: email.trim().to_lowercase(),
        age: age as u32,
        role: if role.is_empty() { "N/A".to_string() } else { role.to_string() },
        extra,
    })
}

/// Shape check for `user@host.tld`: no whitespace, exactly one separating
/// `@`, at least one dot in the host part with text on both sides.
fn is_valid_email(email: &str) -> bool {
    let ok_chunk =
        |s: &str| !s.is_empty() && s.chars().all(|c| !c.is_whitespace() && c != '@');
    if let Some((local, domain)) = email.split_once('@')
        && let Some((host, tld)) = domain.rsplit_once('.')
    {
        ok_chunk(local) && ok_chunk(host) && ok_chunk(tld)
    } else {
        false
    }
}

fn describe_parse_error(error: &csv::Error) -> String {
    match error.kind() {
        csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
            format!("expected {expected_len} fields, found {len}")
        }
        _ => error.to_string(),
    }
}
