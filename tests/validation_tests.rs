//! Integration tests for output validation against on-disk fixtures
//!
//! These tests verify:
//! - CSV comparison with tolerance, text fallback and truncation
//! - JSON directory comparison, including one-sided enumeration
//! - Hard failures for missing CSV files
//! - Tolerance properties over generated values

use autotest::services::validation::json_equivalent;
use autotest::services::{Comparator, Discrepancy, ValidationError, ValidationOptions};
use camino::Utf8PathBuf;
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Output and reference trees laid out side by side
struct Fixture {
    _temp_dir: TempDir,
    root: Utf8PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("out/JSONs")).unwrap();
        fs::create_dir_all(root.join("ref/JSONs")).unwrap();
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    fn write(&self, relative: &str, content: &str) {
        fs::write(self.root.join(relative), content).unwrap();
    }

    fn path(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }

    fn compare(&self, comparator: &Comparator) -> Vec<Discrepancy> {
        comparator
            .compare(
                &self.path("out/data.csv"),
                &self.path("ref/data.csv"),
                &self.path("out/JSONs"),
                &self.path("ref/JSONs"),
            )
            .unwrap()
            .issues
    }
}

#[test]
fn test_identical_outputs_pass() {
    let fixture = Fixture::new();
    fixture.write("out/data.csv", "part.stp,1.0,steel\npart2.stp,2.5,alu\n");
    fixture.write("ref/data.csv", "part.stp,1.0,steel\npart2.stp,2.5,alu\n");
    fixture.write("out/JSONs/part.json", r#"{"a": 1, "b": [1, 2]}"#);
    fixture.write("ref/JSONs/part.json", r#"{"b": [1, 2], "a": 1}"#);

    let comparator = Comparator::default();
    let report = comparator
        .compare(
            &fixture.path("out/data.csv"),
            &fixture.path("ref/data.csv"),
            &fixture.path("out/JSONs"),
            &fixture.path("ref/JSONs"),
        )
        .unwrap();

    assert!(report.is_ok(), "unexpected issues: {}", report.message());
    assert_eq!(report.message(), "");
}

#[test]
fn test_numeric_tolerance_on_disk() {
    let fixture = Fixture::new();
    fixture.write("out/data.csv", "a.stp,1.0000001\nb.stp,1.01\n");
    fixture.write("ref/data.csv", "a.stp,1.0\nb.stp,1.0\n");

    let issues = fixture.compare(&Comparator::default());
    assert_eq!(
        issues,
        vec![Discrepancy::NumericMismatch {
            row: "b.stp".to_string(),
            column: 1,
            output: 1.01,
            reference: 1.0,
        }]
    );
    assert_eq!(
        issues[0].to_string(),
        "CSV numeric mismatch at 'b.stp' col 1: 1.01 vs 1.0"
    );
}

#[test]
fn test_csv_issues_precede_json_issues() {
    let fixture = Fixture::new();
    fixture.write("out/data.csv", "a.stp,red\n");
    fixture.write("ref/data.csv", "b.stp,blue\n");
    fixture.write("out/JSONs/x.json", r#"{"v": 1}"#);
    fixture.write("ref/JSONs/x.json", r#"{"v": 2}"#);

    let issues = fixture.compare(&Comparator::default());
    let messages: Vec<_> = issues.iter().map(ToString::to_string).collect();
    assert_eq!(
        messages,
        vec![
            "CSV file name mismatch: 'a.stp' vs 'b.stp'",
            "CSV text mismatch at 'a.stp' col 1: 'red' vs 'blue'",
            "JSON mismatch in 'x.json'",
        ]
    );
}

#[test]
fn test_extra_rows_and_columns_are_ignored() {
    let fixture = Fixture::new();
    fixture.write("out/data.csv", "a.stp,1,2,3\nb.stp,1\nc.stp,9\n");
    fixture.write("ref/data.csv", "a.stp,1,2\nb.stp,1,5\n");

    assert!(fixture.compare(&Comparator::default()).is_empty());
}

#[test]
fn test_missing_csv_is_hard_failure() {
    let fixture = Fixture::new();
    fixture.write("ref/data.csv", "a.stp,1\n");

    let err = Comparator::default()
        .compare(
            &fixture.path("out/data.csv"),
            &fixture.path("ref/data.csv"),
            &fixture.path("out/JSONs"),
            &fixture.path("ref/JSONs"),
        )
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(err.to_string().contains("data.csv"));
}

#[test]
fn test_missing_reference_csv_is_hard_failure() {
    let fixture = Fixture::new();
    fixture.write("out/data.csv", "a.stp,1\n");

    let err = Comparator::default()
        .compare(
            &fixture.path("out/data.csv"),
            &fixture.path("ref/data.csv"),
            &fixture.path("out/JSONs"),
            &fixture.path("ref/JSONs"),
        )
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(err.to_string().contains("ref/data.csv"));
}

#[cfg(unix)]
#[test]
fn test_unreadable_csv_is_read_error() {
    let fixture = Fixture::new();
    fixture.write("ref/data.csv", "a.stp,1\n");
    // Opening a directory succeeds on Unix, reading from it does not
    fs::create_dir_all(fixture.path("out/data.csv")).unwrap();

    let err = Comparator::default()
        .compare_csv(&fixture.path("out/data.csv"), &fixture.path("ref/data.csv"))
        .unwrap_err();

    assert!(!err.is_not_found());
    assert!(
        matches!(&err, ValidationError::CsvRead { path, .. } if path.ends_with("out/data.csv")),
        "unexpected error: {}",
        err
    );
}

#[test]
fn test_missing_json_directory() {
    let fixture = Fixture::new();
    fixture.write("out/data.csv", "a.stp,1\n");
    fixture.write("ref/data.csv", "a.stp,1\n");

    let issues = Comparator::default()
        .compare(
            &fixture.path("out/data.csv"),
            &fixture.path("ref/data.csv"),
            &fixture.path("out/JSONs"),
            &fixture.path("ref/missing"),
        )
        .unwrap()
        .issues;

    assert_eq!(issues, vec![Discrepancy::JsonDirectoryMissing]);
    assert_eq!(
        issues[0].to_string(),
        "JSON output or reference directory missing"
    );
}

#[test]
fn test_json_enumeration_is_one_sided_by_default() {
    let fixture = Fixture::new();
    fixture.write("out/data.csv", "");
    fixture.write("ref/data.csv", "");
    fixture.write("ref/JSONs/only_in_reference.json", "{}");
    fixture.write("out/JSONs/only_in_output.json", "{}");

    let issues = fixture.compare(&Comparator::default());
    assert_eq!(
        issues,
        vec![Discrepancy::JsonReferenceMissing {
            file: "only_in_output.json".to_string()
        }]
    );

    let symmetric = Comparator::new(ValidationOptions {
        symmetric_json: true,
        ..Default::default()
    });
    let issues = fixture.compare(&symmetric);
    assert_eq!(
        issues,
        vec![
            Discrepancy::JsonReferenceMissing {
                file: "only_in_output.json".to_string()
            },
            Discrepancy::JsonOutputMissing {
                file: "only_in_reference.json".to_string()
            },
        ]
    );
}

#[test]
fn test_json_decode_error_is_reported() {
    let fixture = Fixture::new();
    fixture.write("out/data.csv", "");
    fixture.write("ref/data.csv", "");
    fixture.write("out/JSONs/bad.json", "{not json");
    fixture.write("ref/JSONs/bad.json", "{}");

    let issues = fixture.compare(&Comparator::default());
    assert_eq!(issues.len(), 1);
    assert!(matches!(&issues[0], Discrepancy::JsonDecode { file, .. } if file == "bad.json"));
}

#[test]
fn test_reference_json_decode_error_is_reported() {
    let fixture = Fixture::new();
    fixture.write("out/data.csv", "");
    fixture.write("ref/data.csv", "");
    fixture.write("out/JSONs/bad.json", "{}");
    fixture.write("ref/JSONs/bad.json", "{not json");

    let issues = fixture.compare(&Comparator::default());
    assert_eq!(issues.len(), 1);
    assert!(matches!(&issues[0], Discrepancy::JsonDecode { file, .. } if file == "bad.json"));
}

#[cfg(unix)]
#[test]
fn test_unreadable_json_directory_is_reported() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = Fixture::new();
    fixture.write("out/data.csv", "");
    fixture.write("ref/data.csv", "");
    fixture.write("out/JSONs/a.json", "{}");
    let dir = fixture.path("out/JSONs");
    fs::set_permissions(&dir, fs::Permissions::from_mode(0o000)).unwrap();

    // Permission bits do not stop a privileged user
    let readable = fs::read_dir(&dir).is_ok();
    let issues = if readable {
        Vec::new()
    } else {
        fixture.compare(&Comparator::default())
    };
    fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
    if readable {
        return;
    }

    assert_eq!(issues.len(), 1);
    assert!(
        matches!(&issues[0], Discrepancy::JsonDirectoryUnreadable { dir: reported, .. } if *reported == dir),
        "unexpected issues: {:?}",
        issues
    );
}

#[test]
fn test_non_json_files_are_ignored() {
    let fixture = Fixture::new();
    fixture.write("out/data.csv", "");
    fixture.write("ref/data.csv", "");
    fixture.write("out/JSONs/notes.txt", "anything");
    fs::create_dir_all(fixture.path("out/JSONs/nested.json")).unwrap();

    assert!(fixture.compare(&Comparator::default()).is_empty());
}

#[test]
fn test_json_files_are_checked_in_sorted_order() {
    let fixture = Fixture::new();
    fixture.write("out/data.csv", "");
    fixture.write("ref/data.csv", "");
    for name in ["c.json", "a.json", "b.json"] {
        fixture.write(&format!("out/JSONs/{}", name), "[1]");
    }

    let files: Vec<_> = fixture
        .compare(&Comparator::default())
        .into_iter()
        .map(|issue| match issue {
            Discrepancy::JsonReferenceMissing { file } => file,
            other => panic!("Unexpected issue: {:?}", other),
        })
        .collect();
    assert_eq!(files, vec!["a.json", "b.json", "c.json"]);
}

fn fields(output: &str, reference: &str) -> Option<Discrepancy> {
    Comparator::default().compare_fields("row.stp", 1, output, reference)
}

proptest! {
    #[test]
    fn prop_numbers_within_tolerance_match(base in -1.0e6f64..1.0e6, delta in -9.0e-7f64..9.0e-7) {
        let shifted = base + delta;
        prop_assume!(((shifted - base).abs()) <= 1e-6);
        prop_assert!(fields(&base.to_string(), &shifted.to_string()).is_none());
    }

    #[test]
    fn prop_numbers_beyond_tolerance_mismatch(base in -1.0e3f64..1.0e3, delta in 1.0e-3f64..10.0) {
        let issue = fields(&base.to_string(), &(base + delta).to_string());
        let is_numeric_mismatch = matches!(issue, Some(Discrepancy::NumericMismatch { .. }));
        prop_assert!(is_numeric_mismatch);
    }

    #[test]
    fn prop_identical_text_never_mismatches(text in "[a-zA-Z _.-]{0,16}") {
        prop_assert!(fields(&text, &text).is_none());
    }

    #[test]
    fn prop_different_text_always_mismatches(a in "x[a-z]{0,7}", b in "Y[A-Z]{0,7}") {
        let issue = fields(&a, &b);
        let is_text_mismatch = matches!(issue, Some(Discrepancy::TextMismatch { .. }));
        prop_assert!(is_text_mismatch);
    }

    #[test]
    fn prop_integer_and_float_json_are_equivalent(n in -100_000i64..100_000) {
        let int = serde_json::json!({ "v": n });
        let float = serde_json::json!({ "v": n as f64 });
        prop_assert!(json_equivalent(&int, &float));
    }
}
