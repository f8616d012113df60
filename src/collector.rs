use crate::constants::{self, DATE_FORMAT};
use crate::error::Result;
use crate::storage;
use crate::types::{BankTarget, FetchParams, RawReview, ReviewApi, ReviewRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// A target whose unique review count came in under the configured minimum
#[derive(Debug, Clone, Serialize)]
pub struct Shortfall {
    pub bank: String,
    pub unique_reviews: usize,
    pub minimum: usize,
}

/// Result of a complete collector run
#[derive(Debug, Serialize)]
pub struct CollectorReport {
    pub total_fetched: usize,
    pub unique_records: usize,
    pub duplicates_dropped: usize,
    pub per_bank: BTreeMap<String, usize>,
    pub shortfalls: Vec<Shortfall>,
    pub failed_targets: Vec<String>,
    pub output_file: String,
}

impl CollectorReport {
    /// True when no target reached the minimum, the exit-code condition
    /// for a collector run.
    pub fn all_targets_short(&self) -> bool {
        !self.shortfalls.is_empty() && self.shortfalls.len() == self.per_bank.len()
    }
}

pub struct Collector {
    api: Box<dyn ReviewApi>,
    /// Pause between targets, to stay polite to the marketplace
    delay_ms: u64,
}

impl Collector {
    pub fn new(api: Box<dyn ReviewApi>, delay_ms: u64) -> Self {
        Self { api, delay_ms }
    }

    /// Stamp a raw marketplace review with its bank and source label
    fn to_record(raw: RawReview, bank: &str, source: &str) -> ReviewRecord {
        ReviewRecord {
            review: raw.text,
            rating: raw.score,
            date: raw
                .at
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
            bank: bank.to_string(),
            source: source.to_string(),
        }
    }

    /// Drop records whose trimmed review text was already seen, first
    /// occurrence wins. Returns survivors plus the number dropped.
    pub fn dedupe_by_text(records: Vec<ReviewRecord>) -> (Vec<ReviewRecord>, usize) {
        let before = records.len();
        let mut seen = HashSet::new();
        let survivors: Vec<ReviewRecord> = records
            .into_iter()
            .filter(|r| seen.insert(r.review.trim().to_string()))
            .collect();
        let dropped = before - survivors.len();
        (survivors, dropped)
    }

    /// Run the collector across all targets and write the raw CSV.
    ///
    /// A target that keeps failing after retries is skipped with a warning;
    /// it still shows up in the shortfall report with zero reviews.
    #[instrument(skip(self, targets, params), fields(source = %self.api.source_name()))]
    pub async fn run(
        &self,
        targets: &[BankTarget],
        params: &FetchParams,
        min_per_bank: usize,
        output: &Path,
    ) -> Result<CollectorReport> {
        let source = constants::source_label(&params.country);
        let mut all_records: Vec<ReviewRecord> = Vec::new();
        let mut failed_targets = Vec::new();

        for (i, target) in targets.iter().enumerate() {
            info!("Scraping {} reviews ({})", target.name, target.app_id);
            println!("📡 Scraping {} reviews...", target.name);

            match self.api.fetch_reviews(&target.app_id, params).await {
                Ok(reviews) => {
                    println!("   → Got {} reviews", reviews.len());
                    all_records.extend(
                        reviews
                            .into_iter()
                            .map(|raw| Self::to_record(raw, &target.name, &source)),
                    );
                }
                Err(e) => {
                    warn!("Skipping {} after repeated failures: {}", target.name, e);
                    println!("   ⚠️  Skipping {}: {}", target.name, e);
                    failed_targets.push(target.name.clone());
                }
            }

            if i + 1 < targets.len() && self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
        }

        let total_fetched = all_records.len();
        let (unique, duplicates_dropped) = Self::dedupe_by_text(all_records);
        info!(
            "Collected {} reviews ({} duplicates dropped)",
            unique.len(),
            duplicates_dropped
        );

        let mut per_bank: BTreeMap<String, usize> = BTreeMap::new();
        for target in targets {
            per_bank.insert(target.name.clone(), 0);
        }
        for record in &unique {
            *per_bank.entry(record.bank.clone()).or_insert(0) += 1;
        }

        let shortfalls: Vec<Shortfall> = per_bank
            .iter()
            .filter(|(_, &count)| count < min_per_bank)
            .map(|(bank, &count)| Shortfall {
                bank: bank.clone(),
                unique_reviews: count,
                minimum: min_per_bank,
            })
            .collect();
        for shortfall in &shortfalls {
            warn!(
                "{} has only {} unique reviews (minimum {})",
                shortfall.bank, shortfall.unique_reviews, shortfall.minimum
            );
        }

        storage::write_reviews(output, &unique)?;

        Ok(CollectorReport {
            total_fetched,
            unique_records: unique.len(),
            duplicates_dropped,
            per_bank,
            shortfalls,
            failed_targets,
            output_file: output.display().to_string(),
        })
    }
}
