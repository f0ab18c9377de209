//! UK / US territory classification from free-text country cells.

use serde::{Deserialize, Serialize};

const UK_MARKERS: &[&str] = &["UK", "GB", "UNITED KINGDOM"];
const US_MARKERS: &[&str] = &["US", "UNITED STATES", "AMERICA"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Territory {
    #[serde(rename = "UK")]
    Uk,
    #[serde(rename = "US")]
    Us,
}

impl Territory {
    pub fn code(self) -> &'static str {
        match self {
            Territory::Uk => "UK",
            Territory::Us => "US",
        }
    }

    pub fn currency(self) -> &'static str {
        match self {
            Territory::Uk => "GBP",
            Territory::Us => "USD",
        }
    }

    /// Share of the distinct-SKU count reported for this territory.
    pub fn sku_share(self) -> f64 {
        match self {
            Territory::Uk => 0.4,
            Territory::Us => 0.6,
        }
    }
}

/// Result of testing one country cell. Both flags may be set: the checks are
/// independent substring tests, e.g. "AUSTRALIA" contains "US".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub uk: bool,
    pub us: bool,
}

impl Classification {
    pub fn is_unclassified(&self) -> bool {
        !self.uk && !self.us
    }

    pub fn is_ambiguous(&self) -> bool {
        self.uk && self.us
    }
}

pub fn classify(country: &str) -> Classification {
    let upper = country.to_uppercase();
    Classification {
        uk: UK_MARKERS.iter().any(|m| upper.contains(m)),
        us: US_MARKERS.iter().any(|m| upper.contains(m)),
    }
}
