//! Record domains.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A category of locally cached record.
///
/// Each domain is an independent keyed table in the local store.
/// [`Domain::Misc`] holds engine bookkeeping such as sync watermarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Known users (providers).
    Users,
    /// Locations with localized names.
    Locations,
    /// Flattened chart layout rows.
    ChartItems,
    /// Concepts with types and localized names.
    Concepts,
    /// Patients.
    Patients,
    /// Clinical observations.
    Observations,
    /// Orders.
    Orders,
    /// Form definitions.
    Forms,
    /// Engine bookkeeping values.
    Misc,
}

impl Domain {
    /// Every domain, in table order.
    pub const ALL: [Domain; 9] = [
        Domain::Users,
        Domain::Locations,
        Domain::ChartItems,
        Domain::Concepts,
        Domain::Patients,
        Domain::Observations,
        Domain::Orders,
        Domain::Forms,
        Domain::Misc,
    ];

    /// Returns the table name of this domain.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Users => "users",
            Domain::Locations => "locations",
            Domain::ChartItems => "chart_items",
            Domain::Concepts => "concepts",
            Domain::Patients => "patients",
            Domain::Observations => "observations",
            Domain::Orders => "orders",
            Domain::Forms => "forms",
            Domain::Misc => "misc",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
