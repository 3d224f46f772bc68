//! Reference data shared by every evaluation
//!
//! A [`ReferenceManager`] owns the graph, component and thermal table paths,
//! the telescope collecting area, the default waveset and the caches of
//! parsed tables. It starts in the default state found by probing the
//! calibration root:
//!
//! * `mtab/*_tmg.fits` graph table
//! * `mtab/*_tmc.fits` component table
//! * `mtab/*_tmt.fits` thermal table
//!
//! and moves to an overridden state through [`ReferenceManager::configure`].
//! Every operation runs in one critical section, so readers always see a
//! whole configuration. An evaluation captures a [`RefContext`] once and
//! reads the area, waveset and tables through it.

mod waveset;

pub use waveset::{Waveset, WavesetError, WavesetSpec, MAX_POINTS};

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::io::{CalibrationRoot, DataLoader, LoadError, TextLoader};
use crate::obsmode::{ComponentTable, GraphTable};

/// Collecting area of the Hubble Space Telescope in cm²
pub const DEFAULT_AREA: f64 = 45238.93416;

const GRAPH_TABLE_PATTERN: &str = "mtab/*_tmg.fits";
const COMPONENT_TABLE_PATTERN: &str = "mtab/*_tmc.fits";
const THERMAL_TABLE_PATTERN: &str = "mtab/*_tmt.fits";

#[derive(Debug, Error)]
pub enum RefError {
    #[error("{0}")]
    Value(String),

    #[error("No {0} is available; define PYSYN_CDBS or configure one explicitly")]
    Unavailable(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Table(#[from] LoadError),
}

/// Location of a calibration table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TablePath {
    Resolved(PathBuf),
    Unavailable,
}

impl TablePath {
    pub fn path(&self) -> Option<&Path> {
        match self {
            TablePath::Resolved(path) => Some(path),
            TablePath::Unavailable => None,
        }
    }
}

impl fmt::Display for TablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TablePath::Resolved(path) => write!(f, "{}", path.display()),
            TablePath::Unavailable => write!(f, "None"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefMode {
    /// Values found by probing the calibration root
    Default,
    /// At least one value was set explicitly
    Overridden,
}

/// One element of a waveset override: `[min, max, num]` or
/// `[min, max, num, "log" | "linear"]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WavesetItem {
    Number(f64),
    Text(String),
}

impl From<f64> for WavesetItem {
    fn from(value: f64) -> Self {
        WavesetItem::Number(value)
    }
}

impl From<&str> for WavesetItem {
    fn from(value: &str) -> Self {
        WavesetItem::Text(value.to_string())
    }
}

/// Reference values to override; `None` fields keep their current value
///
/// Can be read from a JSON file:
///
/// ```json
/// { "area": 10000.0, "waveset": [1000, 11000, 5000, "linear"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefOverrides {
    pub graphtable: Option<String>,
    pub comptable: Option<String>,
    pub thermtable: Option<String>,
    pub area: Option<f64>,
    pub waveset: Option<Vec<WavesetItem>>,
}

impl RefOverrides {
    /// True when no field is set, which requests a reset to defaults
    pub fn is_empty(&self) -> bool {
        self.graphtable.is_none()
            && self.comptable.is_none()
            && self.thermtable.is_none()
            && self.area.is_none()
            && self.waveset.is_none()
    }

    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// A read-only copy of the reference values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefSnapshot {
    pub graphtable: TablePath,
    pub comptable: TablePath,
    pub thermtable: TablePath,
    pub area: f64,
    pub waveset: String,
    pub mode: RefMode,
}

impl fmt::Display for RefSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>10}: {}", "graphtable", self.graphtable)?;
        writeln!(f, "{:>10}: {}", "comptable", self.comptable)?;
        writeln!(f, "{:>10}: {}", "thermtable", self.thermtable)?;
        writeln!(f, "{:>10}: {}", "area", self.area)?;
        write!(f, "{:>10}: {}", "waveset", self.waveset)
    }
}

struct ReferenceState {
    graphtable: TablePath,
    comptable: TablePath,
    thermtable: TablePath,
    area: f64,
    waveset: Arc<Waveset>,
    mode: RefMode,
    graph_cache: HashMap<PathBuf, Arc<GraphTable>>,
    component_cache: HashMap<PathBuf, Arc<ComponentTable>>,
    /// Bumped whenever the configuration changes
    epoch: u64,
}

impl ReferenceState {
    /// Default state found by probing `root`
    fn probe(root: &CalibrationRoot) -> Self {
        let (graphtable, comptable) = match (
            root.resolve_pattern(GRAPH_TABLE_PATTERN),
            root.resolve_pattern(COMPONENT_TABLE_PATTERN),
        ) {
            (Ok(graph), Ok(comp)) => (TablePath::Resolved(graph), TablePath::Resolved(comp)),
            (Err(e), _) | (_, Err(e)) => {
                log::warn!(
                    "No graph or component tables could be found ({e}); \
                     functionality will be SEVERELY crippled."
                );
                (TablePath::Unavailable, TablePath::Unavailable)
            }
        };

        let thermtable = match root.resolve_pattern(THERMAL_TABLE_PATTERN) {
            Ok(path) => TablePath::Resolved(path),
            Err(e) => {
                log::warn!("{e}. No thermal calculations can be performed.");
                TablePath::Unavailable
            }
        };

        Self {
            graphtable,
            comptable,
            thermtable,
            area: DEFAULT_AREA,
            waveset: Arc::new(Waveset::default()),
            mode: RefMode::Default,
            graph_cache: HashMap::new(),
            component_cache: HashMap::new(),
            epoch: 0,
        }
    }

    fn clear_caches(&mut self) {
        self.graph_cache.clear();
        self.component_cache.clear();
        self.epoch += 1;
    }
}

/// Parse a `[min, max, num]` or `[min, max, num, "log" | "linear"]` override
fn parse_waveset(items: &[WavesetItem]) -> Result<Waveset, RefError> {
    if !matches!(items.len(), 3 | 4) {
        return Err(RefError::Value(
            "waveset must contain 3 or 4 values".to_string(),
        ));
    }

    let number = |idx: usize, what: &str| match &items[idx] {
        WavesetItem::Number(value) => Ok(*value),
        WavesetItem::Text(text) => Err(RefError::Value(format!(
            "waveset {what} must be a number, got \"{text}\""
        ))),
    };

    let minwave = number(0, "minimum")?;
    let maxwave = number(1, "maximum")?;
    let num = number(2, "count")?;
    if !(num >= 0.0) || num.fract() != 0.0 {
        return Err(RefError::Value(format!(
            "waveset count must be a whole number, got {num}"
        )));
    }

    let log = match items.get(3) {
        None => true,
        Some(WavesetItem::Text(text)) if text.eq_ignore_ascii_case("log") => true,
        Some(WavesetItem::Text(text)) if text.eq_ignore_ascii_case("linear") => false,
        Some(_) => {
            return Err(RefError::Value(
                "fourth waveset option must be \"log\" or \"linear\"".to_string(),
            ))
        }
    };

    Waveset::new(WavesetSpec {
        minwave,
        maxwave,
        num: num as usize,
        delta: None,
        log,
    })
    .map_err(|e| RefError::Value(e.to_string()))
}

/// Owner of the reference configuration and its table caches
pub struct ReferenceManager {
    root: CalibrationRoot,
    loader: Arc<dyn DataLoader>,
    state: Mutex<ReferenceState>,
}

impl ReferenceManager {
    /// Create a manager in the default state for `root`
    pub fn new(root: CalibrationRoot, loader: Arc<dyn DataLoader>) -> Self {
        let state = ReferenceState::probe(&root);
        Self {
            root,
            loader,
            state: Mutex::new(state),
        }
    }

    /// Manager rooted at `PYSYN_CDBS`, reading text tables
    pub fn from_env() -> Self {
        Self::new(CalibrationRoot::from_env(), Arc::new(TextLoader))
    }

    fn lock(&self) -> MutexGuard<'_, ReferenceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn root(&self) -> &CalibrationRoot {
        &self.root
    }

    pub fn loader(&self) -> &dyn DataLoader {
        self.loader.as_ref()
    }

    /// Return to the default state: probe tables, reset area and waveset,
    /// drop cached tables
    pub fn initialize(&self) {
        let fresh = ReferenceState::probe(&self.root);
        let mut state = self.lock();
        let epoch = state.epoch + 1;
        *state = fresh;
        state.epoch = epoch;
        log::debug!("Reference data reset to defaults");
    }

    /// Apply `overrides`
    ///
    /// With every field `None` this is [`ReferenceManager::initialize`].
    /// Otherwise all supplied values are checked before any is applied, so
    /// a rejected call leaves the configuration untouched. Table caches are
    /// always cleared.
    ///
    /// # Errors
    ///
    /// `RefError::Value` for a malformed waveset, a non-positive area or an
    /// empty table path.
    pub fn configure(&self, overrides: &RefOverrides) -> Result<(), RefError> {
        if overrides.is_empty() {
            self.initialize();
            return Ok(());
        }

        if let Some(area) = overrides.area {
            if !(area > 0.0 && area.is_finite()) {
                return Err(RefError::Value(format!(
                    "area must be a positive number, got {area}"
                )));
            }
        }
        let waveset = overrides
            .waveset
            .as_deref()
            .map(parse_waveset)
            .transpose()?;
        let graphtable = self.table_override(overrides.graphtable.as_deref())?;
        let comptable = self.table_override(overrides.comptable.as_deref())?;
        let thermtable = self.table_override(overrides.thermtable.as_deref())?;

        let mut state = self.lock();
        if let Some(path) = graphtable {
            state.graphtable = path;
        }
        if let Some(path) = comptable {
            state.comptable = path;
        }
        if let Some(path) = thermtable {
            state.thermtable = path;
        }
        if let Some(area) = overrides.area {
            state.area = area;
        }
        if let Some(waveset) = waveset {
            state.waveset = Arc::new(waveset);
        }
        state.mode = RefMode::Overridden;
        state.clear_caches();

        log::debug!("Reference data overridden: {overrides:?}");
        Ok(())
    }

    /// Read overrides from a JSON file and apply them
    pub fn configure_from_file(&self, path: &Path) -> Result<(), RefError> {
        let overrides = RefOverrides::load_from_file(path)?;
        self.configure(&overrides)
    }

    /// Expand a table path override to an absolute file path
    fn table_override(&self, text: Option<&str>) -> Result<Option<TablePath>, RefError> {
        let text = match text.map(str::trim) {
            None => return Ok(None),
            Some("") => {
                return Err(RefError::Value("table path must not be empty".to_string()))
            }
            Some(text) => text,
        };

        let converted = self.root.convert_legacy_path(text);
        let lossy = converted.to_string_lossy();
        if lossy.contains('$') {
            return Err(RefError::Value(format!(
                "cannot expand the variable or shorthand in table path {text}"
            )));
        }
        if lossy.contains(['*', '?', '[']) {
            return Err(RefError::Value(format!(
                "table path {text} must name a single file, not a pattern"
            )));
        }

        Ok(Some(TablePath::Resolved(std::path::absolute(&converted)?)))
    }

    /// Replace only the default waveset
    pub fn set_default_waveset(&self, spec: WavesetSpec) -> Result<(), RefError> {
        let waveset = Waveset::new(spec).map_err(|e| RefError::Value(e.to_string()))?;
        let mut state = self.lock();
        state.waveset = Arc::new(waveset);
        state.mode = RefMode::Overridden;
        state.clear_caches();
        Ok(())
    }

    /// Current reference values
    pub fn query(&self) -> RefSnapshot {
        let state = self.lock();
        RefSnapshot {
            graphtable: state.graphtable.clone(),
            comptable: state.comptable.clone(),
            thermtable: state.thermtable.clone(),
            area: state.area,
            waveset: state.waveset.descriptor(),
            mode: state.mode,
        }
    }

    pub fn waveset(&self) -> Arc<Waveset> {
        Arc::clone(&self.lock().waveset)
    }

    /// Collecting area in cm²
    pub fn area(&self) -> f64 {
        self.lock().area
    }

    /// Number of parsed tables currently cached
    pub fn cached_tables(&self) -> usize {
        let state = self.lock();
        state.graph_cache.len() + state.component_cache.len()
    }

    /// Capture the current configuration for one evaluation
    pub fn context(&self) -> RefContext<'_> {
        let state = self.lock();
        RefContext {
            manager: self,
            graphtable: state.graphtable.clone(),
            comptable: state.comptable.clone(),
            area: state.area,
            waveset: Arc::clone(&state.waveset),
            epoch: state.epoch,
        }
    }

    /// The configured graph table, parsed once per configuration
    pub fn graph_table(&self) -> Result<Arc<GraphTable>, RefError> {
        self.context().graph_table()
    }

    /// The configured component table, parsed once per configuration
    pub fn component_table(&self) -> Result<Arc<ComponentTable>, RefError> {
        self.context().component_table()
    }

    /// Look a table up in its cache, loading it outside the lock on a miss.
    /// Only a configuration still at `epoch` reads or fills the cache.
    fn cached<T>(
        &self,
        what: &'static str,
        table_path: &TablePath,
        epoch: u64,
        cache: fn(&mut ReferenceState) -> &mut HashMap<PathBuf, Arc<T>>,
        load: impl FnOnce(&Path) -> Result<T, LoadError>,
    ) -> Result<Arc<T>, RefError> {
        let path = table_path.path().ok_or(RefError::Unavailable(what))?;
        {
            let mut state = self.lock();
            if state.epoch == epoch {
                if let Some(table) = cache(&mut state).get(path) {
                    return Ok(Arc::clone(table));
                }
            }
        }

        log::debug!("Loading {what} from {}", path.display());
        let table = Arc::new(load(path)?);

        let mut state = self.lock();
        if state.epoch == epoch {
            cache(&mut state).insert(path.to_path_buf(), Arc::clone(&table));
        } else {
            log::debug!("Reference data changed since {what} was requested; not caching it");
        }
        Ok(table)
    }
}

/// Reference values taken together from one configuration
///
/// Tables are still loaded on first use, but always from the paths in
/// effect when the context was captured, so one evaluation never mixes two
/// configurations.
pub struct RefContext<'m> {
    manager: &'m ReferenceManager,
    graphtable: TablePath,
    comptable: TablePath,
    area: f64,
    waveset: Arc<Waveset>,
    epoch: u64,
}

impl RefContext<'_> {
    /// Collecting area in cm²
    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn waveset(&self) -> &Waveset {
        &self.waveset
    }

    pub fn graph_table(&self) -> Result<Arc<GraphTable>, RefError> {
        self.manager.cached(
            "graph table",
            &self.graphtable,
            self.epoch,
            |s| &mut s.graph_cache,
            |path| self.manager.loader.read_graph_table(path),
        )
    }

    pub fn component_table(&self) -> Result<Arc<ComponentTable>, RefError> {
        self.manager.cached(
            "component table",
            &self.comptable,
            self.epoch,
            |s| &mut s.component_cache,
            |path| self.manager.loader.read_component_table(path),
        )
    }
}

static GLOBAL: Lazy<ReferenceManager> = Lazy::new(ReferenceManager::from_env);

/// Process-wide manager rooted at `PYSYN_CDBS`
pub fn global() -> &'static ReferenceManager {
    &GLOBAL
}

/// Apply overrides to the process-wide reference data
pub fn configure_references(overrides: &RefOverrides) -> Result<(), RefError> {
    global().configure(overrides)
}

/// Snapshot of the process-wide reference data
pub fn query_references() -> RefSnapshot {
    global().query()
}
