use serde::{Deserialize, Serialize};

/// Absolute-difference tolerance used when comparing numeric CSV fields.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Executable launched by the Data Extraction module.
pub const DEFAULT_EXTRACTION_EXE: &str = "DataExtraction.exe";

/// User configuration from `AutoTest Config.yaml`
///
/// Holds the folders for a run, the module selection and the tunables of the
/// validation step. Every field has a default so partial files load cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub cad_folder: String,

    #[serde(default)]
    pub input_folder: String,

    #[serde(default)]
    pub output_folder: String,

    #[serde(default)]
    pub selected_modules: Vec<String>,

    #[serde(default = "default_extraction_exe")]
    pub extraction_exe: String,

    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    #[serde(default)]
    pub symmetric_json: bool,

    #[serde(default = "default_placeholder_delay_ms")]
    pub placeholder_delay_ms: u64,

    /// Path the run log is exported to after a run; empty disables export
    #[serde(default)]
    pub export_log: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            cad_folder: String::new(),
            input_folder: String::new(),
            output_folder: String::new(),
            selected_modules: Vec::new(),
            extraction_exe: default_extraction_exe(),
            tolerance: default_tolerance(),
            symmetric_json: false,
            placeholder_delay_ms: default_placeholder_delay_ms(),
            export_log: String::new(),
            log_dir: default_log_dir(),
            debug_mode: false,
        }
    }
}

fn default_extraction_exe() -> String {
    DEFAULT_EXTRACTION_EXE.to_string()
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_placeholder_delay_ms() -> u64 {
    500
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl UserConfig {
    /// Export target for the run log, if configured
    pub fn export_log_path(&self) -> Option<&str> {
        let path = self.export_log.trim();
        (!path.is_empty()).then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_config_defaults() {
        let config = UserConfig::default();
        assert_eq!(config.extraction_exe, "DataExtraction.exe");
        assert_eq!(config.tolerance, 1e-6);
        assert_eq!(config.placeholder_delay_ms, 500);
        assert_eq!(config.log_dir, "logs");
        assert!(!config.symmetric_json);
        assert!(config.selected_modules.is_empty());
        assert!(config.export_log_path().is_none());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "output_folder: /tmp/out\nselected_modules:\n  - Data Extraction\n";
        let config: UserConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.output_folder, "/tmp/out");
        assert_eq!(config.selected_modules, vec!["Data Extraction".to_string()]);
        assert_eq!(config.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(config.extraction_exe, DEFAULT_EXTRACTION_EXE);
    }

    #[test]
    fn test_export_log_path_ignores_whitespace() {
        let config = UserConfig {
            export_log: "   ".to_string(),
            ..Default::default()
        };
        assert!(config.export_log_path().is_none());

        let config = UserConfig {
            export_log: "run.txt".to_string(),
            ..Default::default()
        };
        assert_eq!(config.export_log_path(), Some("run.txt"));
    }
}
