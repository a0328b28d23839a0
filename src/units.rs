//! Physical unit tags for data columns.
//!
//! Units are metadata only: tagging a column never rescales its values.
//! Each source carries a fixed registry of the columns it knows about;
//! anything not listed there is dimensionless.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Physical unit attached to a data column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Ratio, proxy or flag values with no physical dimension
    Dimensionless,
    /// Irradiance, W m^-2
    WattPerSquareMetre,
    /// Raw detector counts
    Count,
}

impl Unit {
    /// Short symbol in the usual astronomy notation
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Dimensionless => "",
            Unit::WattPerSquareMetre => "W / m2",
            Unit::Count => "ct",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Dimensionless => write!(f, "dimensionless"),
            other => write!(f, "{}", other.symbol()),
        }
    }
}

/// Fixed column → unit lookup for one source
#[derive(Debug, Clone, Copy)]
pub struct UnitRegistry {
    entries: &'static [(&'static str, Unit)],
}

impl UnitRegistry {
    pub const fn new(entries: &'static [(&'static str, Unit)]) -> Self {
        Self { entries }
    }

    /// Registry with no entries: every column is dimensionless
    pub const fn empty() -> Self {
        Self { entries: &[] }
    }

    /// Unit registered for `column`, dimensionless when unregistered
    pub fn unit_for(&self, column: &str) -> Unit {
        match self.entries.iter().find(|(name, _)| *name == column) {
            Some((_, unit)) => *unit,
            None => {
                debug!("Column '{}' has no registered unit, using dimensionless", column);
                Unit::Dimensionless
            }
        }
    }

    /// Build the unit mapping for an ordered list of data columns
    pub fn resolve<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> ColumnUnits {
        ColumnUnits {
            entries: columns
                .into_iter()
                .map(|name| (name.to_string(), self.unit_for(name)))
                .collect(),
        }
    }
}

/// Per-column units of a record, in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnUnits {
    entries: Vec<(String, Unit)>,
}

impl ColumnUnits {
    /// Unit of `column`; unknown columns are dimensionless, never an error
    pub fn get(&self, column: &str) -> Unit {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, unit)| *unit)
            .unwrap_or(Unit::Dimensionless)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Unit)> {
        self.entries.iter().map(|(name, unit)| (name.as_str(), *unit))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// SDO/EVE level 0CS broadband channels
pub const EVE_UNITS: UnitRegistry = UnitRegistry::new(&[
    ("XRS-B proxy", Unit::Dimensionless),
    ("XRS-A proxy", Unit::Dimensionless),
    ("SEM proxy", Unit::Dimensionless),
    ("0.1-7ESPquad", Unit::WattPerSquareMetre),
    ("17.1ESP", Unit::WattPerSquareMetre),
    ("25.7ESP", Unit::WattPerSquareMetre),
    ("30.4ESP", Unit::WattPerSquareMetre),
    ("36.6ESP", Unit::WattPerSquareMetre),
    ("darkESP", Unit::Count),
    ("121.6MEGS-P", Unit::WattPerSquareMetre),
    ("darkMEGS-P", Unit::Count),
    ("q0ESP", Unit::Dimensionless),
    ("q1ESP", Unit::Dimensionless),
    ("q2ESP", Unit::Dimensionless),
    ("q3ESP", Unit::Dimensionless),
    ("CMLat", Unit::WattPerSquareMetre),
    ("CMLon", Unit::WattPerSquareMetre),
]);

/// Nobeyama Radioheliograph correlation plots
pub const NORH_UNITS: UnitRegistry =
    UnitRegistry::new(&[("Correlation Coefficient", Unit::Dimensionless)]);
