use crate::models::DEFAULT_TOLERANCE;
use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, StringRecord};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use thiserror::Error;

/// Tunables for output validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationOptions {
    /// Maximum absolute difference before two numeric fields are considered different
    pub tolerance: f64,

    /// Also report reference JSON files that have no output counterpart
    pub symmetric_json: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            symmetric_json: false,
        }
    }
}

/// One mismatch found while validating extraction outputs
#[derive(Debug, Clone, PartialEq)]
pub enum Discrepancy {
    /// Row identifiers (column 0) differ
    FileNameMismatch { output: String, reference: String },

    /// Both fields parsed as numbers but differ by more than the tolerance
    NumericMismatch {
        row: String,
        column: usize,
        output: f64,
        reference: f64,
    },

    /// At least one field is not numeric and the text differs
    TextMismatch {
        row: String,
        column: usize,
        output: String,
        reference: String,
    },

    /// Output or reference JSON directory does not exist
    JsonDirectoryMissing,

    /// JSON directory exists but could not be listed
    JsonDirectoryUnreadable { dir: Utf8PathBuf, error: String },

    /// Output JSON file has no counterpart in the reference directory
    JsonReferenceMissing { file: String },

    /// Reference JSON file has no counterpart in the output directory
    JsonOutputMissing { file: String },

    /// Output and reference documents parse but are not structurally equal
    JsonMismatch { file: String },

    /// Either side failed to load as JSON
    JsonDecode { file: String, error: String },
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::FileNameMismatch { output, reference } => {
                write!(f, "CSV file name mismatch: '{}' vs '{}'", output, reference)
            }
            Discrepancy::NumericMismatch {
                row,
                column,
                output,
                reference,
            } => write!(
                f,
                "CSV numeric mismatch at '{}' col {}: {:?} vs {:?}",
                row, column, output, reference
            ),
            Discrepancy::TextMismatch {
                row,
                column,
                output,
                reference,
            } => write!(
                f,
                "CSV text mismatch at '{}' col {}: '{}' vs '{}'",
                row, column, output, reference
            ),
            Discrepancy::JsonDirectoryMissing => {
                f.write_str("JSON output or reference directory missing")
            }
            Discrepancy::JsonDirectoryUnreadable { dir, error } => {
                write!(f, "JSON directory '{}' could not be read: {}", dir, error)
            }
            Discrepancy::JsonReferenceMissing { file } => {
                write!(f, "JSON reference missing for '{}'", file)
            }
            Discrepancy::JsonOutputMissing { file } => {
                write!(f, "JSON output missing for '{}'", file)
            }
            Discrepancy::JsonMismatch { file } => write!(f, "JSON mismatch in '{}'", file),
            Discrepancy::JsonDecode { file, error } => {
                write!(f, "JSON decode error for '{}': {}", file, error)
            }
        }
    }
}

/// Errors that abort a comparison entirely
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{path}: {source}")]
    CsvNotFound {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open {path}: {source}")]
    CsvOpen {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read CSV {path}: {source}")]
    CsvRead {
        path: Utf8PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl ValidationError {
    /// True when one of the CSV files does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ValidationError::CsvNotFound { .. })
    }
}

/// Ordered list of discrepancies from one comparison
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<Discrepancy>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    /// All issues joined with `"; "` in discovery order
    pub fn message(&self) -> String {
        self.issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Compares extraction outputs against reference fixtures.
///
/// CSV rows and columns are paired positionally and silently truncated to the
/// shorter side. JSON files are enumerated from the output directory only
/// unless [`ValidationOptions::symmetric_json`] is set.
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    options: ValidationOptions,
}

impl Comparator {
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Compare a CSV pair and a JSON directory pair.
    ///
    /// CSV issues come first, then JSON issues. A missing or unreadable CSV
    /// file fails the whole comparison; everything else is reported as an issue.
    pub fn compare(
        &self,
        output_csv: &Utf8Path,
        reference_csv: &Utf8Path,
        output_json_dir: &Utf8Path,
        reference_json_dir: &Utf8Path,
    ) -> Result<ValidationReport, ValidationError> {
        let mut issues = self.compare_csv(output_csv, reference_csv)?;
        issues.extend(self.compare_json_dirs(output_json_dir, reference_json_dir));

        tracing::info!(
            "Validation finished with {} issue(s): csv={}, json={}",
            issues.len(),
            output_csv,
            output_json_dir
        );

        Ok(ValidationReport { issues })
    }

    /// Compare two CSV files row by row
    pub fn compare_csv(
        &self,
        output: &Utf8Path,
        reference: &Utf8Path,
    ) -> Result<Vec<Discrepancy>, ValidationError> {
        let mut output_reader = open_csv(output)?;
        let mut reference_reader = open_csv(reference)?;

        let mut issues = Vec::new();
        let mut output_records = output_reader.records();
        let mut reference_records = reference_reader.records();

        // zip semantics: stop as soon as either side runs out
        while let Some(output_row) = output_records.next() {
            let Some(reference_row) = reference_records.next() else {
                break;
            };
            let output_row = output_row.map_err(|source| ValidationError::CsvRead {
                path: output.to_path_buf(),
                source,
            })?;
            let reference_row = reference_row.map_err(|source| ValidationError::CsvRead {
                path: reference.to_path_buf(),
                source,
            })?;

            self.compare_rows(&output_row, &reference_row, &mut issues);
        }

        tracing::debug!("CSV comparison found {} issue(s)", issues.len());
        Ok(issues)
    }

    /// Compare already-parsed rows; same pairing rules as [`compare_csv`](Self::compare_csv)
    pub fn compare_csv_rows<S: AsRef<str>>(
        &self,
        output: &[Vec<S>],
        reference: &[Vec<S>],
    ) -> Vec<Discrepancy> {
        let mut issues = Vec::new();
        for (output_row, reference_row) in output.iter().zip(reference) {
            let output_row: StringRecord = output_row.iter().map(AsRef::as_ref).collect();
            let reference_row: StringRecord = reference_row.iter().map(AsRef::as_ref).collect();
            self.compare_rows(&output_row, &reference_row, &mut issues);
        }
        issues
    }

    fn compare_rows(
        &self,
        output_row: &StringRecord,
        reference_row: &StringRecord,
        issues: &mut Vec<Discrepancy>,
    ) {
        let output_id = output_row.get(0).unwrap_or_default();
        let reference_id = reference_row.get(0).unwrap_or_default();

        if output_id != reference_id {
            issues.push(Discrepancy::FileNameMismatch {
                output: output_id.to_string(),
                reference: reference_id.to_string(),
            });
        }

        let columns = output_row.iter().zip(reference_row.iter()).enumerate().skip(1);
        for (column, (output_value, reference_value)) in columns {
            if let Some(issue) =
                self.compare_fields(output_id, column, output_value, reference_value)
            {
                issues.push(issue);
            }
        }
    }

    /// Compare one field pair.
    ///
    /// Numeric when both sides parse as floats, exact text comparison otherwise.
    pub fn compare_fields(
        &self,
        row: &str,
        column: usize,
        output: &str,
        reference: &str,
    ) -> Option<Discrepancy> {
        match (parse_number(output), parse_number(reference)) {
            (Some(output_num), Some(reference_num)) => {
                // NaN never exceeds the tolerance
                ((output_num - reference_num).abs() > self.options.tolerance).then(|| {
                    Discrepancy::NumericMismatch {
                        row: row.to_string(),
                        column,
                        output: output_num,
                        reference: reference_num,
                    }
                })
            }
            _ => (output != reference).then(|| Discrepancy::TextMismatch {
                row: row.to_string(),
                column,
                output: output.to_string(),
                reference: reference.to_string(),
            }),
        }
    }

    /// Compare every `*.json` file in `output_dir` against its namesake in `reference_dir`
    pub fn compare_json_dirs(
        &self,
        output_dir: &Utf8Path,
        reference_dir: &Utf8Path,
    ) -> Vec<Discrepancy> {
        if !output_dir.is_dir() || !reference_dir.is_dir() {
            tracing::warn!(
                "JSON directory missing: output={} ({}), reference={} ({})",
                output_dir,
                output_dir.is_dir(),
                reference_dir,
                reference_dir.is_dir()
            );
            return vec![Discrepancy::JsonDirectoryMissing];
        }

        let output_files = match list_json_files(output_dir) {
            Ok(files) => files,
            Err(e) => {
                return vec![Discrepancy::JsonDirectoryUnreadable {
                    dir: output_dir.to_path_buf(),
                    error: e.to_string(),
                }];
            }
        };

        let mut issues = Vec::new();

        for file in &output_files {
            if let Some(issue) = compare_json_file(output_dir, reference_dir, file) {
                tracing::debug!("{}", issue);
                issues.push(issue);
            }
        }

        if self.options.symmetric_json {
            match list_json_files(reference_dir) {
                Ok(reference_files) => {
                    issues.extend(
                        reference_files
                            .difference(&output_files)
                            .map(|file| Discrepancy::JsonOutputMissing { file: file.clone() }),
                    );
                }
                Err(e) => issues.push(Discrepancy::JsonDirectoryUnreadable {
                    dir: reference_dir.to_path_buf(),
                    error: e.to_string(),
                }),
            }
        }

        issues
    }
}

fn open_csv(path: &Utf8Path) -> Result<csv::Reader<fs::File>, ValidationError> {
    let file = fs::File::open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ValidationError::CsvNotFound {
                path: path.to_path_buf(),
                source,
            }
        } else {
            ValidationError::CsvOpen {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    Ok(ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file))
}

/// Parse a CSV field as a float the way a lenient numeric cell reader would:
/// surrounding whitespace is ignored.
fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

/// Names of regular files ending in `.json` (any case), sorted
fn list_json_files(dir: &Utf8Path) -> io::Result<BTreeSet<String>> {
    let mut files = BTreeSet::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!("Skipping non UTF-8 file name in {}", dir);
            continue;
        };
        if !name.to_lowercase().ends_with(".json") {
            continue;
        }
        if !entry.file_type()?.is_file() {
            continue;
        }
        files.insert(name);
    }

    Ok(files)
}

fn compare_json_file(
    output_dir: &Utf8Path,
    reference_dir: &Utf8Path,
    file: &str,
) -> Option<Discrepancy> {
    let reference_path = reference_dir.join(file);
    if !reference_path.is_file() {
        return Some(Discrepancy::JsonReferenceMissing {
            file: file.to_string(),
        });
    }

    let decode_error = |error: String| Discrepancy::JsonDecode {
        file: file.to_string(),
        error,
    };

    let output = match load_json(&output_dir.join(file)) {
        Ok(value) => value,
        Err(e) => return Some(decode_error(e)),
    };
    let reference = match load_json(&reference_path) {
        Ok(value) => value,
        Err(e) => return Some(decode_error(e)),
    };

    (!json_equivalent(&output, &reference)).then(|| Discrepancy::JsonMismatch {
        file: file.to_string(),
    })
}

fn load_json(path: &Utf8Path) -> Result<Value, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}

/// Structural equality over JSON documents.
///
/// Object key order is irrelevant, `1` equals `1.0`, and `true`/`false`
/// equal `1`/`0`; everything else must match exactly.
pub fn json_equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(flag), Value::Number(n)) | (Value::Number(n), Value::Bool(flag)) => {
            n.as_f64() == Some(if *flag { 1.0 } else { 0.0 })
        }
        (Value::Number(x), Value::Number(y)) => {
            if x == y {
                return true;
            }
            if x.is_f64() || y.is_f64() {
                matches!((x.as_f64(), y.as_f64()), (Some(p), Some(q)) if p == q)
            } else {
                false
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| json_equivalent(p, q))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, p)| y.get(key).is_some_and(|q| json_equivalent(p, q)))
        }
        _ => a == b,
    }
}
