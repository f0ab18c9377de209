//! Column role detection for sales CSV headers.
//!
//! Roles are resolved once per run into column indices. A role that matches no
//! header stays `None` and contributes nothing for every row.

use std::fmt;

/// What a column means to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    Country,
    Units,
    Sales,
    ProductType,
    Device,
    DesignParent,
    DesignChild,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 7] = [
        ColumnRole::Country,
        ColumnRole::Units,
        ColumnRole::Sales,
        ColumnRole::ProductType,
        ColumnRole::Device,
        ColumnRole::DesignParent,
        ColumnRole::DesignChild,
    ];

    /// Header substrings accepted for this role, in priority order.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            ColumnRole::Country => &["country", "territory", "marketplace"],
            ColumnRole::Units => &["units", "quantity", "qty"],
            ColumnRole::Sales => &["sales", "revenue", "amount"],
            ColumnRole::ProductType => &["product_type", "producttype", "type"],
            ColumnRole::Device => &["device", "model"],
            ColumnRole::DesignParent => &["design_parent", "designparent", "parent"],
            ColumnRole::DesignChild => &["design_child", "designchild", "child", "sku"],
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnRole::Country => "country",
            ColumnRole::Units => "units",
            ColumnRole::Sales => "sales",
            ColumnRole::ProductType => "product_type",
            ColumnRole::Device => "device",
            ColumnRole::DesignParent => "design_parent",
            ColumnRole::DesignChild => "design_child",
        };
        f.write_str(name)
    }
}

/// Find column index by matching headers against known name fragments.
/// Headers are scanned left to right; the first header containing any candidate wins.
pub fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let normalized = header.trim().to_lowercase();
        candidates.iter().any(|candidate| normalized.contains(candidate))
    })
}

/// Resolved role → column index mapping for one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnMapping {
    slots: [Option<usize>; 7],
}

impl ColumnMapping {
    pub fn resolve(headers: &[String]) -> Self {
        let mut slots = [None; 7];
        for role in ColumnRole::ALL {
            slots[role.slot()] = find_column(headers, role.candidates());
        }
        Self { slots }
    }

    pub fn get(&self, role: ColumnRole) -> Option<usize> {
        self.slots[role.slot()]
    }

    pub fn unresolved(&self) -> impl Iterator<Item = ColumnRole> + '_ {
        ColumnRole::ALL
            .into_iter()
            .filter(move |role| self.get(*role).is_none())
    }
}
