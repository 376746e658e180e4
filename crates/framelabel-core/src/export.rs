//! Export formatting for labeled results.
//!
//! Records are handled as JSON objects so callers can hand over result
//! records carrying extra fields (event metadata, camera names) unchanged.
//! JSON output is the verbatim array, pretty-printed. CSV output uses a fixed
//! column schema per source API type; every cell is quoted.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Which source API the records came from; selects the CSV schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiType {
    /// Camera events with id, camera and timestamp metadata
    Events,
    /// A plain list of image references
    Images,
    /// Anything else
    #[default]
    Generic,
}

impl ApiType {
    /// Unrecognized names select the generic schema.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "events" | "event" => Self::Events,
            "images" | "image" => Self::Images,
            _ => Self::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Images => "images",
            Self::Generic => "generic",
        }
    }

    fn columns(&self) -> &'static [Column] {
        match self {
            Self::Events => EVENT_COLUMNS,
            Self::Images => IMAGE_COLUMNS,
            Self::Generic => GENERIC_COLUMNS,
        }
    }
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CSV column: header plus candidate dotted paths, first present wins.
struct Column {
    header: &'static str,
    paths: &'static [&'static str],
}

const fn col(header: &'static str, paths: &'static [&'static str]) -> Column {
    Column { header, paths }
}

const EVENT_COLUMNS: &[Column] = &[
    col("Serial Number", &["serialNumber", "serial_number"]),
    col("Event ID", &["id", "eventId"]),
    col("Camera", &["camera", "cameraName"]),
    col("Timestamp", &["timestamp", "createdAt"]),
    col("Image URL", &["imageRef", "image"]),
    col("Label", &["label"]),
    col("Model", &["model", "modelUsed"]),
    col("Prompt Tokens", &["tokens.prompt"]),
    col("Completion Tokens", &["tokens.completion"]),
    col("Total Tokens", &["tokens.total"]),
    col("Processed", &["processed"]),
    col("Error", &["error"]),
    col("Error Details", &["detailedError"]),
];

const IMAGE_COLUMNS: &[Column] = &[
    col("Serial Number", &["serialNumber", "serial_number"]),
    col("Image", &["imageRef", "image"]),
    col("Label", &["label"]),
    col("Model", &["model", "modelUsed"]),
    col("Total Tokens", &["tokens.total"]),
    col("Processed", &["processed"]),
    col("Error", &["error"]),
];

const GENERIC_COLUMNS: &[Column] = &[
    col("Index", &["originalIndex"]),
    col("Image", &["imageRef", "image"]),
    col("Label", &["label"]),
    col("Processed", &["processed"]),
    col("Error", &["error"]),
    col("Error Details", &["detailedError"]),
];

/// Convert typed records (e.g. `ProcessingResult`s) into JSON objects.
pub fn records_from<T: Serialize>(items: &[T]) -> Result<Vec<Value>, serde_json::Error> {
    items.iter().map(serde_json::to_value).collect()
}

/// Render `records` in `format`. `api_type` only affects CSV.
pub fn format(
    records: &[Value],
    format: ExportFormat,
    api_type: ApiType,
) -> Result<Vec<u8>, serde_json::Error> {
    match format {
        ExportFormat::Json => {
            let mut out = serde_json::to_vec_pretty(records)?;
            out.push(b'\n');
            Ok(out)
        }
        ExportFormat::Csv => Ok(to_csv(records, api_type).into_bytes()),
    }
}

/// Render records as CSV with the schema for `api_type`.
pub fn to_csv(records: &[Value], api_type: ApiType) -> String {
    let columns = api_type.columns();
    let mut out = String::new();

    let header: Vec<String> = columns.iter().map(|c| quote(c.header)).collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|c| quote(&cell(lookup(record, c.paths))))
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Suggested attachment filename.
pub fn filename(format: ExportFormat, api_type: ApiType) -> String {
    format!(
        "labels-{}-{}.{}",
        api_type,
        chrono::Utc::now().format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

fn lookup<'a>(record: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|p| {
        p.split('.')
            .try_fold(record, |v, key| v.get(key))
            .filter(|v| !v.is_null())
    })
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Bool(true)) => "Yes".to_string(),
        Some(Value::Bool(false)) => "No".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}
