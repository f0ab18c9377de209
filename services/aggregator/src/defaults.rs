//! Built-in dashboard documents.
//!
//! The same data seeds the document store and backs the CLI when no upload
//! has been cached.

use crate::model::AggregateResult;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Collection holding every dashboard document.
pub const DASHBOARD_COLLECTION: &str = "dashboards";

/// Period label shown for the built-in data.
pub const DEFAULT_PERIOD: &str = "January 2026";

const MAIN_JSON: &str = include_str!("../data/main.json");
const PHONE_CASES_JSON: &str = include_str!("../data/phone-cases.json");

/// The two documents served to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardDocument {
    /// All product types.
    Main,
    /// Phone-case product types only.
    PhoneCases,
}

impl DashboardDocument {
    pub const ALL: [DashboardDocument; 2] = [DashboardDocument::Main, DashboardDocument::PhoneCases];

    pub fn doc_id(self) -> &'static str {
        match self {
            DashboardDocument::Main => "main",
            DashboardDocument::PhoneCases => "phone-cases",
        }
    }

    /// Built-in content for this document.
    pub fn default_data(self) -> Result<Value, serde_json::Error> {
        let raw = match self {
            DashboardDocument::Main => MAIN_JSON,
            DashboardDocument::PhoneCases => PHONE_CASES_JSON,
        };
        serde_json::from_str(raw)
    }
}

impl fmt::Display for DashboardDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.doc_id())
    }
}

impl FromStr for DashboardDocument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(DashboardDocument::Main),
            "phone-cases" => Ok(DashboardDocument::PhoneCases),
            other => Err(format!(
                "unknown dashboard document '{}', expected 'main' or 'phone-cases'",
                other
            )),
        }
    }
}

/// Built-in main dashboard as a typed aggregate.
pub fn default_aggregate() -> Result<AggregateResult, serde_json::Error> {
    serde_json::from_str(MAIN_JSON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::TOP_N;

    #[test]
    fn test_default_documents_parse() {
        for doc in DashboardDocument::ALL {
            let data = doc.default_data().unwrap();
            assert!(data["summary"]["total_units"].is_i64(), "{}", doc);
            assert_eq!(data["territory"].as_array().map(Vec::len), Some(2));
        }
    }

    #[test]
    fn test_default_main_is_a_full_aggregate() {
        let data = default_aggregate().unwrap();
        assert_eq!(
            data.summary.total_units,
            data.summary.uk_units + data.summary.us_units
        );
        assert!(data.devices_comparison.len() <= TOP_N);
        assert!(!data.design_children_comparison.is_empty());
    }

    #[test]
    fn test_phone_case_document_keeps_display_fields() {
        let data = DashboardDocument::PhoneCases.default_data().unwrap();
        assert_eq!(data["product_types_comparison"][0]["description"], "Tough Phone Case Regular");
        assert!(data["top_skus"].is_array());
    }

    #[test]
    fn test_document_ids_round_trip_through_from_str() {
        for doc in DashboardDocument::ALL {
            assert_eq!(doc.doc_id().parse::<DashboardDocument>(), Ok(doc));
        }
        assert!("other".parse::<DashboardDocument>().is_err());
    }
}
