//! Dashboard document shapes.
//!
//! Field names follow the stored JSON exactly (`UK`, `US`, `total`, ...), so
//! aggregates, seed data and cached records all read the same way.

use crate::territory::Territory;
use serde::{Deserialize, Serialize};

/// Complete output of one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub summary: Summary,
    pub territory: Vec<TerritoryEntry>,
    pub product_types_comparison: Vec<ProductTypeComparison>,
    pub devices_comparison: Vec<DeviceComparison>,
    pub design_parents_comparison: Vec<DesignParentComparison>,
    pub design_children_comparison: Vec<DesignChildComparison>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_units: i64,
    pub uk_units: i64,
    pub us_units: i64,
    pub uk_sales: i64,
    pub us_sales: i64,
    pub unique_skus: usize,
    pub unique_devices: usize,
    pub unique_designs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryEntry {
    pub country: Territory,
    pub currency: String,
    pub units: i64,
    pub sales: i64,
    /// Fixed share of the overall distinct-SKU count, not a per-territory count.
    pub unique_skus: i64,
}

/// Units per territory for one category value, before ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTally {
    pub category: String,
    pub uk: i64,
    pub us: i64,
}

impl CategoryTally {
    pub fn total(&self) -> i64 {
        self.uk.saturating_add(self.us)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTypeComparison {
    pub product_type: String,
    #[serde(rename = "UK")]
    pub uk: i64,
    #[serde(rename = "US")]
    pub us: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceComparison {
    pub device: String,
    #[serde(rename = "UK")]
    pub uk: i64,
    #[serde(rename = "US")]
    pub us: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignParentComparison {
    pub design_parent: String,
    #[serde(rename = "UK")]
    pub uk: i64,
    #[serde(rename = "US")]
    pub us: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignChildComparison {
    pub design_child: String,
    #[serde(rename = "UK")]
    pub uk: i64,
    #[serde(rename = "US")]
    pub us: i64,
    pub total: i64,
}

impl From<CategoryTally> for ProductTypeComparison {
    fn from(t: CategoryTally) -> Self {
        let total = t.total();
        Self {
            product_type: t.category,
            uk: t.uk,
            us: t.us,
            total,
        }
    }
}

impl From<CategoryTally> for DeviceComparison {
    fn from(t: CategoryTally) -> Self {
        let total = t.total();
        Self {
            device: t.category,
            uk: t.uk,
            us: t.us,
            total,
        }
    }
}

impl From<CategoryTally> for DesignParentComparison {
    fn from(t: CategoryTally) -> Self {
        let total = t.total();
        Self {
            design_parent: t.category,
            uk: t.uk,
            us: t.us,
            total,
        }
    }
}

impl From<CategoryTally> for DesignChildComparison {
    fn from(t: CategoryTally) -> Self {
        let total = t.total();
        Self {
            design_child: t.category,
            uk: t.uk,
            us: t.us,
            total,
        }
    }
}

/// Flat view over any comparison row, used for exports and checks.
pub trait ComparisonRow {
    fn label(&self) -> &str;
    fn uk(&self) -> i64;
    fn us(&self) -> i64;
    fn total(&self) -> i64;
}

impl ComparisonRow for ProductTypeComparison {
    fn label(&self) -> &str {
        &self.product_type
    }

    fn uk(&self) -> i64 {
        self.uk
    }

    fn us(&self) -> i64 {
        self.us
    }

    fn total(&self) -> i64 {
        self.total
    }
}

impl ComparisonRow for DeviceComparison {
    fn label(&self) -> &str {
        &self.device
    }

    fn uk(&self) -> i64 {
        self.uk
    }

    fn us(&self) -> i64 {
        self.us
    }

    fn total(&self) -> i64 {
        self.total
    }
}

impl ComparisonRow for DesignParentComparison {
    fn label(&self) -> &str {
        &self.design_parent
    }

    fn uk(&self) -> i64 {
        self.uk
    }

    fn us(&self) -> i64 {
        self.us
    }

    fn total(&self) -> i64 {
        self.total
    }
}

impl ComparisonRow for DesignChildComparison {
    fn label(&self) -> &str {
        &self.design_child
    }

    fn uk(&self) -> i64 {
        self.uk
    }

    fn us(&self) -> i64 {
        self.us
    }

    fn total(&self) -> i64 {
        self.total
    }
}

impl AggregateResult {
    /// Territory entry for `territory`, if present.
    pub fn territory(&self, territory: Territory) -> Option<&TerritoryEntry> {
        self.territory.iter().find(|t| t.country == territory)
    }
}
