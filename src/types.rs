use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single review row as written to the CSV dataset.
///
/// Field order matters: serde/csv serialize struct fields in declaration
/// order, and downstream analysis expects `review,rating,date,bank,source`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewRecord {
    pub review: String,
    pub rating: Option<u8>,
    pub date: String,
    pub bank: String,
    pub source: String,
}

/// A bank app to scrape, from built-in defaults or a JSON mapping file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTarget {
    pub name: String,
    pub app_id: String,
}

impl BankTarget {
    pub fn new(name: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            app_id: app_id.into(),
        }
    }
}

/// Raw review as extracted from the marketplace response, before it is
/// stamped with a bank name and source label
#[derive(Debug, Clone)]
pub struct RawReview {
    pub text: String,
    pub score: Option<u8>,
    pub at: Option<NaiveDate>,
}

/// Fetch parameters shared by every target in a collector run
#[derive(Debug, Clone)]
pub struct FetchParams {
    pub lang: String,
    pub country: String,
    pub count: usize,
}

/// A candidate app from marketplace search, used by `find-apps`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppCandidate {
    #[serde(rename = "appId")]
    pub app_id: String,
    pub title: String,
    pub summary: Option<String>,
}

/// Core trait for review sources. There is a single production
/// implementation (Google Play); the seam exists so the collector can be
/// exercised against a canned source in tests.
#[async_trait::async_trait]
pub trait ReviewApi: Send + Sync {
    /// Unique identifier for this source
    fn source_name(&self) -> &'static str;

    /// Fetch up to `params.count` reviews for one app, newest first
    async fn fetch_reviews(&self, app_id: &str, params: &FetchParams) -> Result<Vec<RawReview>>;
}
