//! Graph and component tables, and the obsmode traversal that turns a list
//! of instrument keywords into a throughput curve
//!
//! The graph table is a directed graph of throughput components. Each row
//! leads from an `innode` to an `outnode` through a component and is
//! selected by a keyword. Walking the graph from the lowest node and picking,
//! at every node, the row whose keyword appears in the obsmode (or the
//! `default` row) yields the components of the optical path.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::io::{CalibrationRoot, DataLoader, LoadError};
use crate::photometry::Bandpass;

/// Keyword selecting a row when no obsmode keyword matches at a node
const DEFAULT_KEYWORD: &str = "default";

/// Component name marking a pass-through row
const CLEAR_COMPONENT: &str = "clear";

#[derive(Debug, Error)]
pub enum ObsmodeError {
    #[error("Empty obsmode")]
    Empty,

    #[error("Graph table has no rows")]
    EmptyGraph,

    #[error("No row matches obsmode at graph node {node} and there is no default")]
    NoDefault { node: i64 },

    #[error("Graph table loops back on itself at node {node}")]
    Cycle { node: i64 },

    #[error("Obsmode keywords not used by the graph table: {}", .0.join(","))]
    UnusedKeywords(Vec<String>),

    #[error("Obsmode {0} selects only clear components")]
    NoComponents(String),

    #[error("Component {0} is not listed in the component table")]
    UnknownComponent(String),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// One edge of the graph table
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRow {
    pub compname: String,
    pub keyword: String,
    pub innode: i64,
    pub outnode: i64,
    /// Thermal component paired with this row, if any
    pub thcompname: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphTable {
    rows: Vec<GraphRow>,
}

impl GraphTable {
    pub fn new(rows: Vec<GraphRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[GraphRow] {
        &self.rows
    }

    /// Throughput components selected by `obsmode`, in optical path order
    ///
    /// # Arguments
    ///
    /// * `obsmode` - Instrument keywords, matched case-insensitively
    ///
    /// # Returns
    ///
    /// Component names, excluding `clear` rows. Every keyword must select at
    /// least one row.
    pub fn components(&self, obsmode: &[String]) -> Result<Vec<String>, ObsmodeError> {
        let keywords: Vec<String> = obsmode.iter().map(|k| k.to_lowercase()).collect();
        if keywords.is_empty() {
            return Err(ObsmodeError::Empty);
        }

        let mut node = self
            .rows
            .iter()
            .map(|r| r.innode)
            .min()
            .ok_or(ObsmodeError::EmptyGraph)?;

        let mut used = HashSet::new();
        let mut components = Vec::new();

        // Each step consumes one edge, so a walk longer than the table loops
        for _ in 0..=self.rows.len() {
            let candidates: Vec<&GraphRow> =
                self.rows.iter().filter(|r| r.innode == node).collect();
            if candidates.is_empty() {
                let unused: Vec<String> = keywords
                    .iter()
                    .filter(|k| !used.contains(k.as_str()))
                    .cloned()
                    .collect();
                if !unused.is_empty() {
                    return Err(ObsmodeError::UnusedKeywords(unused));
                }
                return Ok(components);
            }

            let row = candidates
                .iter()
                .find(|r| keywords.contains(&r.keyword.to_lowercase()))
                .or_else(|| {
                    candidates
                        .iter()
                        .find(|r| r.keyword.eq_ignore_ascii_case(DEFAULT_KEYWORD))
                })
                .ok_or(ObsmodeError::NoDefault { node })?;

            if !row.keyword.eq_ignore_ascii_case(DEFAULT_KEYWORD) {
                used.insert(row.keyword.to_lowercase());
            }
            if !row.compname.eq_ignore_ascii_case(CLEAR_COMPONENT) {
                components.push(row.compname.clone());
            }
            node = row.outnode;
        }

        Err(ObsmodeError::Cycle { node })
    }
}

/// Maps component names to throughput file references
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentTable {
    files: HashMap<String, String>,
}

impl ComponentTable {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            files: entries
                .into_iter()
                .map(|(name, file)| (name.to_lowercase(), file))
                .collect(),
        }
    }

    /// File reference for `compname`, possibly in legacy `prefix$file` form
    pub fn file_for(&self, compname: &str) -> Option<&str> {
        self.files.get(&compname.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Build the bandpass of an obsmode by multiplying its component throughputs
///
/// # Arguments
///
/// * `obsmode` - Instrument keywords, e.g. `["stis", "ccd", "g430m"]`
/// * `graph` - Graph table to traverse
/// * `components` - Component table naming each throughput file
/// * `root` - Calibration root for legacy path expansion
/// * `loader` - Reader for throughput files
pub fn bandpass_from_components(
    obsmode: &[String],
    graph: &GraphTable,
    components: &ComponentTable,
    root: &CalibrationRoot,
    loader: &dyn DataLoader,
) -> Result<Bandpass, ObsmodeError> {
    let names = graph.components(obsmode)?;
    log::debug!("Obsmode {} uses components {:?}", obsmode.join(","), names);

    let mut product: Option<Bandpass> = None;
    for name in &names {
        let file = components
            .file_for(name)
            .ok_or_else(|| ObsmodeError::UnknownComponent(name.clone()))?;
        let throughput = loader.read_throughput(&root.convert_legacy_path(file))?;
        product = Some(match product {
            Some(acc) => acc.times(&throughput),
            None => throughput,
        });
    }

    product
        .map(|bp| bp.with_name(format!("band({})", obsmode.join(","))))
        .ok_or_else(|| ObsmodeError::NoComponents(obsmode.join(",")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(compname: &str, keyword: &str, innode: i64, outnode: i64) -> GraphRow {
        GraphRow {
            compname: compname.to_string(),
            keyword: keyword.to_string(),
            innode,
            outnode,
            thcompname: None,
        }
    }

    fn stis_graph() -> GraphTable {
        GraphTable::new(vec![
            row("hst_ota", "default", 1, 2),
            row("clear", "default", 2, 3),
            row("stis_ccd", "ccd", 2, 3),
            row("stis_fuv", "fuvmama", 2, 3),
            row("stis_g430m", "g430m", 3, 4),
            row("clear", "default", 3, 4),
            row("stis_c4451", "c4451", 4, 5),
            row("clear", "default", 4, 5),
            row("stis_52x02", "52x0.2", 5, 6),
            row("clear", "default", 5, 6),
        ])
    }

    fn modes(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_traversal_picks_keywords_then_defaults() {
        let graph = stis_graph();
        let comps = graph
            .components(&modes(&["stis", "ccd", "g430m", "c4451", "52X0.2"]))
            .unwrap_err();
        // "stis" selects nothing in this graph
        assert!(matches!(comps, ObsmodeError::UnusedKeywords(ref k) if k == &["stis"]));

        let comps = graph
            .components(&modes(&["ccd", "g430m", "c4451", "52X0.2"]))
            .unwrap();
        assert_eq!(
            comps,
            vec!["hst_ota", "stis_ccd", "stis_g430m", "stis_c4451", "stis_52x02"]
        );
    }

    #[test]
    fn test_clear_rows_are_skipped() {
        let comps = stis_graph().components(&modes(&["ccd"])).unwrap();
        assert_eq!(comps, vec!["hst_ota", "stis_ccd"]);
    }

    #[test]
    fn test_missing_default_fails() {
        let graph = GraphTable::new(vec![row("a", "x", 1, 2), row("b", "y", 1, 2)]);
        let err = graph.components(&modes(&["z"])).unwrap_err();
        assert!(matches!(err, ObsmodeError::NoDefault { node: 1 }));
    }

    #[test]
    fn test_cycle_is_detected() {
        let graph = GraphTable::new(vec![row("a", "default", 1, 2), row("b", "default", 2, 1)]);
        let err = graph.components(&modes(&["q"])).unwrap_err();
        assert!(matches!(err, ObsmodeError::Cycle { .. }));
    }

    #[test]
    fn test_component_table_is_case_insensitive() {
        let table = ComponentTable::new(vec![(
            "HST_OTA".to_string(),
            "crotacomp$hst_ota.dat".to_string(),
        )]);
        assert_eq!(table.file_for("hst_ota"), Some("crotacomp$hst_ota.dat"));
        assert_eq!(table.file_for("acs_wfc"), None);
        assert_eq!(table.len(), 1);
    }
}
