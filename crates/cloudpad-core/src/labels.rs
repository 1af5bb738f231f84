//! Workload label conventions.
//!
//! Only two labels are interpreted by the adapters: the enable flag that gates
//! grid placement and the preferred-row hint. Everything else is carried along
//! untouched for event consumers.

use std::collections::BTreeMap;
use std::num::ParseIntError;

/// Key/value labels attached to a workload.
pub type Labels = BTreeMap<String, String>;

/// Workloads must carry `LAUNCHPAD_ENABLE=true` to be placed on the grid.
pub const ENABLE_LABEL: &str = "LAUNCHPAD_ENABLE";
/// Preferred row for a workload, as an integer string.
pub const ROW_LABEL: &str = "LAUNCHPAD_ROW";
/// Row color override, consumed by the grid.
pub const COLOR_LABEL: &str = "LAUNCHPAD_COLOR";

/// Whether the enable flag is present and set to `true` (case-insensitive).
pub fn is_enabled(labels: &Labels) -> bool {
    labels
        .get(ENABLE_LABEL)
        .map_or(false, |v| v.trim().eq_ignore_ascii_case("true"))
}

/// The preferred-row hint, if any. A hint that is not an integer is an error;
/// range checking is left to placement.
pub fn row_hint(labels: &Labels) -> Result<Option<i64>, ParseIntError> {
    labels
        .get(ROW_LABEL)
        .map(|v| v.trim().parse::<i64>())
        .transpose()
}

/// Color override label value.
pub fn color(labels: &Labels) -> Option<&str> {
    labels.get(COLOR_LABEL).map(String::as_str)
}
