//! The fixed category vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;

/// Business-domain category a spreadsheet is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    FinancialData,
    InventoryData,
    SalesData,
    CustomerData,
    OperationalData,
}

impl Category {
    /// Every category, in the order candidates are offered to the model
    pub const ALL: [Category; 5] = [
        Category::FinancialData,
        Category::InventoryData,
        Category::SalesData,
        Category::CustomerData,
        Category::OperationalData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinancialData => "financial_data",
            Self::InventoryData => "inventory_data",
            Self::SalesData => "sales_data",
            Self::CustomerData => "customer_data",
            Self::OperationalData => "operational_data",
        }
    }

    /// Exact label match. Anything outside the vocabulary is `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == label.trim())
    }

    /// Candidate labels as sent to the model
    pub fn candidate_labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.as_str()).collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
