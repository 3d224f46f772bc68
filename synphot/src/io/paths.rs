//! Calibration root resolution and legacy path notation
//!
//! Calibration files live under a root directory named by the `PYSYN_CDBS`
//! environment variable. Tables refer to each other with two legacy
//! notations which are expanded here:
//!
//! * `$VAR/rest` - environment variable expansion (`$PYSYN_CDBS` maps to the
//!   configured root even when the variable itself is unset)
//! * `prefix$file` - a calibration shorthand such as `crotacomp$hst_ota.dat`,
//!   resolved through an environment variable of the same name or the
//!   built-in shorthand table relative to the root

use std::io;
use std::path::{Path, PathBuf};

/// Environment variable naming the calibration root directory
pub const CALIBRATION_ROOT_VAR: &str = "PYSYN_CDBS";

/// Shorthand prefixes and their directory relative to the calibration root
const SHORTHANDS: &[(&str, &str)] = &[
    ("crrefer", ""),
    ("mtab", "mtab"),
    ("crcalspec", "calspec"),
    ("crgrid", "grid"),
    ("crcomp", "comp"),
    ("crotacomp", "comp/ota"),
    ("cracscomp", "comp/acs"),
    ("crcoscomp", "comp/cos"),
    ("crnicmoscomp", "comp/nicmos"),
    ("crstiscomp", "comp/stis"),
    ("crwfc3comp", "comp/wfc3"),
    ("crwfpc2comp", "comp/wfpc2"),
    ("crnonhstcomp", "comp/nonhst"),
];

/// The directory calibration tables are discovered under
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalibrationRoot {
    path: Option<PathBuf>,
}

impl CalibrationRoot {
    /// Root taken from the `PYSYN_CDBS` environment variable, unset if empty
    pub fn from_env() -> Self {
        let path = std::env::var_os(CALIBRATION_ROOT_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self { path }
    }

    /// Root at an explicit directory
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// No calibration root; every table probe fails
    pub fn unset() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Resolve a glob pattern relative to the root to exactly one file
    ///
    /// # Arguments
    ///
    /// * `pattern` - Pattern such as `mtab/*_tmg.fits`
    ///
    /// # Returns
    ///
    /// The absolute path of the single match. Fails when the root is unset,
    /// or when zero or several files match.
    pub fn resolve_pattern(&self, pattern: &str) -> io::Result<PathBuf> {
        let root = self.path.as_deref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{CALIBRATION_ROOT_VAR} is undefined; cannot resolve {pattern}"),
            )
        })?;

        let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
        let full_pattern = format!("{escaped_root}/{pattern}");

        let entries = glob::glob(&full_pattern)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        let mut matches = Vec::new();
        for entry in entries {
            matches.push(entry.map_err(io::Error::from)?);
        }

        match matches.len() {
            0 => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("No file matches {full_pattern}"),
            )),
            1 => std::fs::canonicalize(&matches[0]),
            n => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{n} files match {full_pattern}, expected exactly one"),
            )),
        }
    }

    /// Expand legacy `$VAR/...` and `prefix$file` notations into a path
    ///
    /// Anything that cannot be expanded is returned unchanged.
    pub fn convert_legacy_path(&self, spec: &str) -> PathBuf {
        if let Some(rest) = spec.strip_prefix('$') {
            let (var, tail) = match rest.find('/') {
                Some(idx) => rest.split_at(idx),
                None => (rest, ""),
            };
            return match self.lookup_variable(var) {
                Some(base) => join_tail(&base, tail),
                None => {
                    log::debug!("Cannot expand ${var} in {spec}; leaving path unchanged");
                    PathBuf::from(spec)
                }
            };
        }

        if let Some((prefix, file)) = spec.split_once('$') {
            if !prefix.is_empty() && !prefix.contains('/') {
                if let Some(base) = self.lookup_shorthand(prefix) {
                    return join_tail(&base, file);
                }
                log::debug!("Unknown path shorthand {prefix}$ in {spec}");
            }
        }

        PathBuf::from(spec)
    }

    fn lookup_variable(&self, var: &str) -> Option<PathBuf> {
        if var == CALIBRATION_ROOT_VAR {
            if let Some(root) = &self.path {
                return Some(root.clone());
            }
        }
        std::env::var_os(var)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn lookup_shorthand(&self, prefix: &str) -> Option<PathBuf> {
        if let Some(value) = std::env::var_os(prefix).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(value));
        }
        let lower = prefix.to_lowercase();
        let (_, subdir) = SHORTHANDS.iter().find(|(name, _)| *name == lower)?;
        let root = self.path.as_ref()?;
        Some(if subdir.is_empty() {
            root.clone()
        } else {
            root.join(subdir)
        })
    }
}

fn join_tail(base: &Path, tail: &str) -> PathBuf {
    let tail = tail.trim_start_matches('/');
    if tail.is_empty() {
        base.to_path_buf()
    } else {
        base.join(tail)
    }
}
