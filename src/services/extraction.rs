use camino::Utf8Path;
use std::io;
use std::process::{Command, ExitStatus};
use std::time::Instant;
use thiserror::Error;

/// Errors from launching the external extraction executable
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("failed to launch '{executable}': {source}")]
    Launch {
        executable: String,
        #[source]
        source: io::Error,
    },

    #[error("'{executable}' exited with code {code}")]
    NonZeroExit { executable: String, code: i32 },

    #[error("'{executable}' was terminated without an exit code")]
    Terminated { executable: String },
}

/// Launches the external data extraction executable.
///
/// The executable receives the CAD input path as its only argument. There is
/// no timeout: the call blocks until the process exits.
#[derive(Debug, Clone)]
pub struct ExtractionInvoker {
    executable: String,
}

impl ExtractionInvoker {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Run the executable against `cad_input` and wait for it.
    ///
    /// # Returns
    /// `Ok(())` on a zero exit code, otherwise an [`ExtractionError`] carrying the
    /// underlying error text.
    pub fn invoke(&self, cad_input: &Utf8Path) -> Result<(), ExtractionError> {
        tracing::info!("Executing: {} \"{}\"", self.executable, cad_input);

        let start = Instant::now();

        let status = Command::new(&self.executable)
            .arg(cad_input.as_str())
            .status()
            .map_err(|source| {
                tracing::error!("Failed to launch {}: {}", self.executable, source);
                ExtractionError::Launch {
                    executable: self.executable.clone(),
                    source,
                }
            })?;

        tracing::info!(
            "{} completed in {:.2}s with status {}",
            self.executable,
            start.elapsed().as_secs_f32(),
            status
        );

        self.check_status(status)
    }

    fn check_status(&self, status: ExitStatus) -> Result<(), ExtractionError> {
        if status.success() {
            return Ok(());
        }

        match status.code() {
            Some(code) => Err(ExtractionError::NonZeroExit {
                executable: self.executable.clone(),
                code,
            }),
            None => Err(ExtractionError::Terminated {
                executable: self.executable.clone(),
            }),
        }
    }
}

impl Default for ExtractionInvoker {
    fn default() -> Self {
        Self::new(crate::models::DEFAULT_EXTRACTION_EXE)
    }
}
