//! Reading spectra, throughputs and calibration tables from disk
//!
//! Evaluation only talks to the [`DataLoader`] trait. [`TextLoader`] reads
//! whitespace-delimited text tables:
//!
//! ```text
//! # fluxunit: flam
//! # wavelength  flux
//! 1000.0  1.2e-15
//! 1010.0  1.3e-15
//! ```
//!
//! Lines starting with `#` are comments, except for `# key: value`
//! directives such as the flux unit of a spectrum file (default `flam`).

pub mod paths;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::obsmode::{ComponentTable, GraphRow, GraphTable};
use crate::photometry::{Bandpass, BandpassError, FluxUnit, SourceSpectrum, SpectrumError};

pub use paths::{CalibrationRoot, CALIBRATION_ROOT_VAR};

/// Errors raised while reading data files
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}: {source}", path.display())]
    Spectrum {
        path: PathBuf,
        source: SpectrumError,
    },

    #[error("{}: {source}", path.display())]
    Throughput {
        path: PathBuf,
        source: BandpassError,
    },
}

/// Source of spectra, throughputs and calibration tables
pub trait DataLoader: Send + Sync {
    /// Read a source spectrum, converting its flux to photlam
    fn read_spectrum(&self, path: &Path) -> Result<SourceSpectrum, LoadError>;

    /// Read a throughput curve
    fn read_throughput(&self, path: &Path) -> Result<Bandpass, LoadError>;

    /// Read a graph table
    fn read_graph_table(&self, path: &Path) -> Result<GraphTable, LoadError>;

    /// Read a component table
    fn read_component_table(&self, path: &Path) -> Result<ComponentTable, LoadError>;
}

/// A parsed text table: data rows with their 1-based line numbers, plus
/// `# key: value` directives
struct TextTable {
    rows: Vec<(usize, Vec<String>)>,
    directives: HashMap<String, String>,
}

/// Reads whitespace-delimited text tables
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

impl TextLoader {
    pub fn new() -> Self {
        Self
    }

    fn read_table(path: &Path) -> Result<TextTable, LoadError> {
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut rows = Vec::new();
        let mut directives = HashMap::new();

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                if let Some((key, value)) = comment.split_once(':') {
                    let key = key.trim().to_lowercase();
                    if !key.is_empty() && !key.contains(char::is_whitespace) {
                        directives.insert(key, value.trim().to_string());
                    }
                }
                continue;
            }
            rows.push((
                idx + 1,
                line.split_whitespace().map(str::to_string).collect(),
            ));
        }

        Ok(TextTable { rows, directives })
    }

    /// Two numeric columns, returned as separate vectors
    fn read_columns(path: &Path, table: &TextTable) -> Result<(Vec<f64>, Vec<f64>), LoadError> {
        let mut x = Vec::with_capacity(table.rows.len());
        let mut y = Vec::with_capacity(table.rows.len());

        for (line, fields) in &table.rows {
            if fields.len() < 2 {
                return Err(parse_error(path, *line, "expected two numeric columns"));
            }
            x.push(parse_number(path, *line, &fields[0])?);
            y.push(parse_number(path, *line, &fields[1])?);
        }

        Ok((x, y))
    }
}

fn parse_error(path: &Path, line: usize, message: impl Into<String>) -> LoadError {
    LoadError::Parse {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

fn parse_number(path: &Path, line: usize, field: &str) -> Result<f64, LoadError> {
    field
        .parse::<f64>()
        .map_err(|_| parse_error(path, line, format!("invalid number '{field}'")))
}

fn file_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl DataLoader for TextLoader {
    fn read_spectrum(&self, path: &Path) -> Result<SourceSpectrum, LoadError> {
        let table = Self::read_table(path)?;

        let unit = match table.directives.get("fluxunit") {
            Some(name) => name
                .parse::<FluxUnit>()
                .map_err(|e| parse_error(path, 0, e.to_string()))?,
            None => FluxUnit::Flam,
        };

        let (wave, flux) = Self::read_columns(path, &table)?;
        SourceSpectrum::from_table(file_label(path), wave, flux, unit).map_err(|source| {
            LoadError::Spectrum {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    fn read_throughput(&self, path: &Path) -> Result<Bandpass, LoadError> {
        let table = Self::read_table(path)?;
        let (wave, throughput) = Self::read_columns(path, &table)?;
        Bandpass::from_table(file_label(path), wave, throughput).map_err(|source| {
            LoadError::Throughput {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    fn read_graph_table(&self, path: &Path) -> Result<GraphTable, LoadError> {
        let table = Self::read_table(path)?;
        let mut rows = Vec::with_capacity(table.rows.len());

        for (line, fields) in &table.rows {
            if fields.len() < 4 || fields.len() > 5 {
                return Err(parse_error(
                    path,
                    *line,
                    "expected columns: compname keyword innode outnode [thcompname]",
                ));
            }
            let node = |field: &str| {
                field
                    .parse::<i64>()
                    .map_err(|_| parse_error(path, *line, format!("invalid node '{field}'")))
            };
            rows.push(GraphRow {
                compname: fields[0].clone(),
                keyword: fields[1].clone(),
                innode: node(&fields[2])?,
                outnode: node(&fields[3])?,
                thcompname: fields.get(4).cloned(),
            });
        }

        log::debug!("Read {} graph rows from {}", rows.len(), path.display());
        Ok(GraphTable::new(rows))
    }

    fn read_component_table(&self, path: &Path) -> Result<ComponentTable, LoadError> {
        let table = Self::read_table(path)?;
        let mut entries = Vec::with_capacity(table.rows.len());

        for (line, fields) in &table.rows {
            if fields.len() != 2 {
                return Err(parse_error(path, *line, "expected columns: compname filename"));
            }
            entries.push((fields[0].clone(), fields[1].clone()));
        }

        log::debug!("Read {} components from {}", entries.len(), path.display());
        Ok(ComponentTable::new(entries))
    }
}
