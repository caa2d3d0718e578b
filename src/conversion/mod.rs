// Unit Conversion Module
//
// Bidirectional mapping between loyalty points and physical cement
// bags, keyed off the cement-type tag embedded in a transaction
// description. All functions are total: malformed or negative input
// normalizes to 0 rather than erroring.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Points required per bag of OPC cement
pub const OPC_POINTS_PER_BAG: i64 = 5;

/// Points required per bag of PPC cement
pub const PPC_POINTS_PER_BAG: i64 = 10;

/// Cement type resolved from a transaction description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CementType {
    Opc,
    Ppc,
    /// No recognizable tag in the description (legacy data)
    Unknown,
}

impl CementType {
    /// Convert cement type to its tag representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CementType::Opc => "OPC",
            CementType::Ppc => "PPC",
            CementType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for CementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Points-per-bag policy table.
///
/// OPC converts at 5 points per bag, PPC at 10. `Unknown` falls back
/// to the PPC rate, the conservative default applied to legacy
/// transactions recorded before descriptions carried a tag.
pub fn points_per_bag(cement_type: CementType) -> i64 {
    match cement_type {
        CementType::Opc => OPC_POINTS_PER_BAG,
        CementType::Ppc | CementType::Unknown => PPC_POINTS_PER_BAG,
    }
}

/// Resolve the cement type from a free-text description.
///
/// "OPC" takes precedence when both tags somehow co-occur; a
/// description with neither tag (including the empty string) resolves
/// to `Unknown`.
pub fn cement_type_from_description(description: &str) -> CementType {
    if description.contains("OPC") {
        CementType::Opc
    } else if description.contains("PPC") {
        CementType::Ppc
    } else {
        CementType::Unknown
    }
}

/// Convert points to whole bags for a known cement type.
///
/// Uses floor division so a partial bag's worth of points never
/// counts as a whole bag: the derived count may understate but never
/// overstates physical inventory. Negative input normalizes to 0.
pub fn bags_from_points(points: i64, cement_type: CementType) -> i64 {
    if points <= 0 {
        return 0;
    }
    points / points_per_bag(cement_type)
}

/// Derive the bag count for a transaction from its description and
/// point amount. An untagged description uses the PPC legacy rate.
pub fn bags_from_transaction(description: &str, points: i64) -> i64 {
    let cement_type = cement_type_from_description(description);
    bags_from_points(points, cement_type)
}

/// Convert a whole-bag count back to points. Negative input
/// normalizes to 0.
pub fn points_from_bags(bags: i64, cement_type: CementType) -> i64 {
    if bags <= 0 {
        return 0;
    }
    bags * points_per_bag(cement_type)
}

/// Convert free-form bag input to points.
///
/// Anything that does not parse as a positive integer yields 0 points;
/// this function never fails.
pub fn points_from_bag_input(raw: &str, cement_type: CementType) -> i64 {
    match raw.trim().parse::<i64>() {
        Ok(bags) => points_from_bags(bags, cement_type),
        Err(_) => 0,
    }
}
