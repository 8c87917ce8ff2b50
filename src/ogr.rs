use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

const DEFAULT_PROGRAM: &str = "ogr2ogr";

/// Converts shapefiles to GML by running GDAL's `ogr2ogr`.
#[derive(Debug, Clone)]
pub struct Ogr2Ogr {
    program: PathBuf,
}

impl Default for Ogr2Ogr {
    fn default() -> Self {
        Self::new()
    }
}

impl Ogr2Ogr {
    pub fn new() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// `ogr2ogr -f GML <output> <input>`
    pub fn command(&self, input: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("-f").arg("GML").arg(output).arg(input);
        command
    }

    pub fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        tracing::info!("Converting {:?} to GML with {:?}", input, self.program);

        let result = self
            .command(input, output)
            .output()
            .with_context(|| format!("Failed to run {:?}", self.program))?;

        let stderr = String::from_utf8_lossy(&result.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            tracing::warn!("{}: {}", self.program.display(), line);
        }

        if !result.status.success() {
            bail!(
                "{} exited with {} while converting {:?}",
                self.program.display(),
                result.status,
                input
            );
        }

        Ok(())
    }
}
