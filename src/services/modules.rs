use crate::models::{ModuleOutcome, UserConfig};
use crate::services::extraction::ExtractionInvoker;
use crate::services::validation::{Comparator, ValidationError, ValidationOptions};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DATA_EXTRACTION: &str = "Data Extraction";
pub const IO_JSON: &str = "Input & Output JSON";
pub const OUTPUT_JSON_WINDOWS: &str = "Output JSON (Windows)";
pub const OUTPUT_JSON_LINUX: &str = "Output JSON (Linux)";
pub const AUTO_DRAWING: &str = "Auto Drawing Creation";

/// Built-in modules in declaration order
pub const DEFAULT_MODULES: [&str; 5] = [
    DATA_EXTRACTION,
    IO_JSON,
    OUTPUT_JSON_WINDOWS,
    OUTPUT_JSON_LINUX,
    AUTO_DRAWING,
];

/// The three folders every module receives.
///
/// A run needs the output folder and at least one of the CAD or input folders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunPaths {
    pub cad_folder: Option<Utf8PathBuf>,
    pub input_folder: Option<Utf8PathBuf>,
    pub output_folder: Option<Utf8PathBuf>,
}

impl RunPaths {
    /// Build from config strings; blank entries count as unset
    pub fn from_config(config: &UserConfig) -> Self {
        fn folder(value: &str) -> Option<Utf8PathBuf> {
            let value = value.trim();
            (!value.is_empty()).then(|| Utf8PathBuf::from(value))
        }

        Self {
            cad_folder: folder(&config.cad_folder),
            input_folder: folder(&config.input_folder),
            output_folder: folder(&config.output_folder),
        }
    }

    /// Path handed to the extraction executable: CAD folder, else input folder
    pub fn cad_input(&self) -> Option<&Utf8Path> {
        self.cad_folder
            .as_deref()
            .or(self.input_folder.as_deref())
    }

    /// Root of the reference fixtures: input folder, else CAD folder
    pub fn reference_root(&self) -> Option<&Utf8Path> {
        self.input_folder
            .as_deref()
            .or(self.cad_folder.as_deref())
    }
}

/// Faults raised by a module instead of a regular outcome
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("{0}")]
    Fault(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("module panicked: {0}")]
    Panicked(String),
}

/// A named unit of work run by the orchestrator.
///
/// Implementations must not block beyond their own work. An `Err` is treated
/// as a fault: the module counts as failed and the run moves on.
#[cfg_attr(test, mockall::automock)]
pub trait TestModule: Send + Sync {
    fn run(&self, paths: &RunPaths) -> Result<ModuleOutcome, ModuleError>;
}

/// A registered module and its unique name
#[derive(Clone)]
pub struct ModuleDescriptor {
    pub name: String,
    pub module: Arc<dyn TestModule>,
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Module '{0}' is already registered")]
    Duplicate(String),

    #[error("Unknown module: {0}")]
    Unknown(String),
}

/// Ordered set of modules available to a run.
///
/// Declaration order is preserved and is the execution order regardless of
/// the order a selection lists names in.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: IndexMap<String, Arc<dyn TestModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the five built-in modules configured from `config`
    pub fn with_defaults(config: &UserConfig) -> Self {
        let delay = Duration::from_millis(config.placeholder_delay_ms);
        let mut registry = Self::new();

        let extraction = DataExtractionModule::new(
            ExtractionInvoker::new(config.extraction_exe.clone()),
            Comparator::new(ValidationOptions {
                tolerance: config.tolerance,
                symmetric_json: config.symmetric_json,
            }),
        );

        // Names are distinct constants, registration cannot collide
        let _ = registry.register(DATA_EXTRACTION, Arc::new(extraction));
        for name in &DEFAULT_MODULES[1..] {
            let _ = registry.register(*name, Arc::new(PlaceholderModule::new(*name, delay)));
        }

        registry
    }

    /// Add a module under a unique name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        module: Arc<dyn TestModule>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.modules.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.modules.insert(name, module);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<ModuleDescriptor> {
        self.modules.get(name).map(|module| ModuleDescriptor {
            name: name.to_string(),
            module: Arc::clone(module),
        })
    }

    /// Resolve a selection to descriptors in declaration order
    pub fn select<S: AsRef<str>>(
        &self,
        selection: &[S],
    ) -> Result<Vec<ModuleDescriptor>, RegistryError> {
        if let Some(unknown) = selection
            .iter()
            .map(AsRef::as_ref)
            .find(|name| !self.modules.contains_key(*name))
        {
            return Err(RegistryError::Unknown(unknown.to_string()));
        }

        Ok(self
            .modules
            .iter()
            .filter(|(name, _)| selection.iter().any(|s| s.as_ref() == name.as_str()))
            .map(|(name, module)| ModuleDescriptor {
                name: name.clone(),
                module: Arc::clone(module),
            })
            .collect())
    }
}

/// Fixed sub-paths produced by the extraction executable under a base folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionLayout {
    pub csv: Utf8PathBuf,
    pub json_dir: Utf8PathBuf,
}

impl ExtractionLayout {
    pub fn under(root: &Utf8Path) -> Self {
        let base = root.join("DataExtraction");
        Self {
            csv: base.join("csv").join("data.csv"),
            json_dir: base.join("JSONs"),
        }
    }
}

/// Runs the extraction executable, then validates its outputs against the
/// reference fixtures.
pub struct DataExtractionModule {
    invoker: ExtractionInvoker,
    comparator: Comparator,
}

impl DataExtractionModule {
    pub fn new(invoker: ExtractionInvoker, comparator: Comparator) -> Self {
        Self {
            invoker,
            comparator,
        }
    }
}

impl TestModule for DataExtractionModule {
    fn run(&self, paths: &RunPaths) -> Result<ModuleOutcome, ModuleError> {
        let (Some(cad_input), Some(reference_root), Some(output_folder)) = (
            paths.cad_input(),
            paths.reference_root(),
            paths.output_folder.as_deref(),
        ) else {
            return Ok(ModuleOutcome::failure(
                "Data extraction needs a CAD or input folder and an output folder",
            ));
        };

        if let Err(e) = self.invoker.invoke(cad_input) {
            return Ok(ModuleOutcome::failure(format!(
                "Data extraction executable failed: {}",
                e
            )));
        }

        let output = ExtractionLayout::under(output_folder);
        let reference = ExtractionLayout::under(reference_root);

        let report = match self.comparator.compare(
            &output.csv,
            &reference.csv,
            &output.json_dir,
            &reference.json_dir,
        ) {
            Ok(report) => report,
            Err(e) if e.is_not_found() => {
                return Ok(ModuleOutcome::failure(format!(
                    "CSV comparison failed, file not found: {}",
                    e
                )));
            }
            // Unreadable files are faults, not validation failures
            Err(e) => return Err(ModuleError::Validation(e)),
        };

        if report.is_ok() {
            Ok(ModuleOutcome::success("Data extraction and validation passed."))
        } else {
            Ok(ModuleOutcome::failure(report.message()))
        }
    }
}

/// Stand-in for modules that are not implemented yet: waits, then succeeds
pub struct PlaceholderModule {
    name: String,
    delay: Duration,
}

impl PlaceholderModule {
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

impl TestModule for PlaceholderModule {
    fn run(&self, _paths: &RunPaths) -> Result<ModuleOutcome, ModuleError> {
        std::thread::sleep(self.delay);
        Ok(ModuleOutcome::success(format!("{} completed.", self.name)))
    }
}
