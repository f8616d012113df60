use crate::collector::Shortfall;
use crate::constants::{CSV_COLUMNS, DATE_FORMAT};
use crate::error::Result;
use crate::storage;
use crate::types::ReviewRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Missing-value summary for one CSV column
#[derive(Debug, Clone, Serialize)]
pub struct ColumnStats {
    pub column: String,
    pub missing: usize,
    pub missing_pct: f64,
}

/// Result of a complete cleaner run
#[derive(Debug, Serialize)]
pub struct CleanReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub empty_text_dropped: usize,
    pub duplicates_dropped: usize,
    pub invalid_ratings_cleared: usize,
    pub unparseable_dates_cleared: usize,
    pub column_stats: Vec<ColumnStats>,
    pub per_bank: BTreeMap<String, usize>,
    pub shortfalls: Vec<Shortfall>,
    pub max_missing_pct: f64,
    pub output_file: String,
}

impl CleanReport {
    /// Largest per-column missing percentage, compared against the
    /// advisory threshold.
    pub fn worst_missing_pct(&self) -> f64 {
        self.column_stats
            .iter()
            .map(|s| s.missing_pct)
            .fold(0.0, f64::max)
    }
}

pub struct Cleaner {
    min_per_bank: usize,
    max_missing_pct: f64,
}

/// Date formats seen in raw review exports, tried in order
const DATE_INPUT_FORMATS: [&str; 4] = [
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y",
    "%B %d, %Y",
];

/// Normalize a raw date string to `YYYY-MM-DD`. Unparseable input becomes
/// `None` and is counted as missing rather than dropping the row.
pub fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive().format(DATE_FORMAT).to_string());
    }
    for format in &DATE_INPUT_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.format(DATE_FORMAT).to_string());
        }
    }
    None
}

/// Counters accumulated while cleaning a batch of records
#[derive(Debug, Default)]
pub struct CleaningCounts {
    pub empty_text_dropped: usize,
    pub duplicates_dropped: usize,
    pub invalid_ratings_cleared: usize,
    pub unparseable_dates_cleared: usize,
}

impl Cleaner {
    pub fn new(min_per_bank: usize, max_missing_pct: f64) -> Self {
        Self {
            min_per_bank,
            max_missing_pct,
        }
    }

    /// Apply the full cleaning pass: drop empty text, normalize dates,
    /// validate ratings, dedupe by exact text (first occurrence wins).
    pub fn clean_records(records: Vec<ReviewRecord>) -> (Vec<ReviewRecord>, CleaningCounts) {
        let mut counts = CleaningCounts::default();
        let mut seen = std::collections::HashSet::new();
        let mut survivors = Vec::with_capacity(records.len());

        for mut record in records {
            let text = record.review.trim().to_string();
            if text.is_empty() {
                counts.empty_text_dropped += 1;
                continue;
            }
            if !seen.insert(text.clone()) {
                counts.duplicates_dropped += 1;
                continue;
            }
            record.review = text;

            match normalize_date(&record.date) {
                Some(normalized) => record.date = normalized,
                None => {
                    if !record.date.trim().is_empty() {
                        counts.unparseable_dates_cleared += 1;
                        debug!("Could not parse date: {}", record.date);
                    }
                    record.date = String::new();
                }
            }

            if let Some(rating) = record.rating {
                if !(1..=5).contains(&rating) {
                    counts.invalid_ratings_cleared += 1;
                    record.rating = None;
                }
            }

            survivors.push(record);
        }
        (survivors, counts)
    }

    /// Per-column missing counts over the cleaned rows. `review` can no
    /// longer be missing at this point but is reported for completeness.
    fn column_stats(records: &[ReviewRecord]) -> Vec<ColumnStats> {
        let total = records.len();
        let missing_for = |column: &str| -> usize {
            records
                .iter()
                .filter(|r| match column {
                    "review" => r.review.is_empty(),
                    "rating" => r.rating.is_none(),
                    "date" => r.date.is_empty(),
                    "bank" => r.bank.is_empty(),
                    "source" => r.source.is_empty(),
                    _ => false,
                })
                .count()
        };
        CSV_COLUMNS
            .iter()
            .map(|&column| {
                let missing = missing_for(column);
                ColumnStats {
                    column: column.to_string(),
                    missing,
                    missing_pct: if total > 0 {
                        missing as f64 / total as f64 * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect()
    }

    /// Read the raw CSV, clean it, report data quality, and write the
    /// surviving rows. Only unreadable input is fatal.
    #[instrument(skip(self))]
    pub fn run(&self, input: &Path, output: &Path) -> Result<CleanReport> {
        let records = storage::read_reviews(input)?;
        let rows_in = records.len();
        println!("📄 Loaded {} rows from {}", rows_in, input.display());

        let (cleaned, counts) = Self::clean_records(records);
        info!(
            "Cleaned {} rows: {} empty, {} duplicates dropped",
            rows_in, counts.empty_text_dropped, counts.duplicates_dropped
        );

        let column_stats = Self::column_stats(&cleaned);
        println!("🧹 Final rows after cleaning: {}", cleaned.len());
        println!("   Missing values per column:");
        for stats in &column_stats {
            println!(
                "   - {}: {} missing ({:.2}%)",
                stats.column, stats.missing, stats.missing_pct
            );
        }

        let mut per_bank: BTreeMap<String, usize> = BTreeMap::new();
        for record in &cleaned {
            *per_bank.entry(record.bank.clone()).or_insert(0) += 1;
        }
        let shortfalls: Vec<Shortfall> = per_bank
            .iter()
            .filter(|(_, &count)| count < self.min_per_bank)
            .map(|(bank, &count)| Shortfall {
                bank: bank.clone(),
                unique_reviews: count,
                minimum: self.min_per_bank,
            })
            .collect();
        for shortfall in &shortfalls {
            warn!(
                "{} has only {} reviews post-cleaning (minimum {})",
                shortfall.bank, shortfall.unique_reviews, shortfall.minimum
            );
        }

        storage::write_reviews(output, &cleaned)?;

        let report = CleanReport {
            rows_in,
            rows_out: cleaned.len(),
            empty_text_dropped: counts.empty_text_dropped,
            duplicates_dropped: counts.duplicates_dropped,
            invalid_ratings_cleared: counts.invalid_ratings_cleared,
            unparseable_dates_cleared: counts.unparseable_dates_cleared,
            column_stats,
            per_bank,
            shortfalls,
            max_missing_pct: self.max_missing_pct,
            output_file: output.display().to_string(),
        };

        let worst = report.worst_missing_pct();
        if worst > self.max_missing_pct {
            warn!(
                "Maximum missing percentage {:.2}% exceeds threshold {:.2}%",
                worst, self.max_missing_pct
            );
            println!(
                "⚠️  Maximum missing percentage {:.2}% exceeds threshold {:.2}%",
                worst, self.max_missing_pct
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, rating: Option<u8>, date: &str) -> ReviewRecord {
        ReviewRecord {
            review: text.to_string(),
            rating,
            date: date.to_string(),
            bank: "CBE".to_string(),
            source: "Google Play (US)".to_string(),
        }
    }

    #[test]
    fn date_normalization_handles_common_formats() {
        assert_eq!(normalize_date("2024-06-01").as_deref(), Some("2024-06-01"));
        assert_eq!(
            normalize_date("2024-06-01T08:30:00+03:00").as_deref(),
            Some("2024-06-01")
        );
        assert_eq!(
            normalize_date("2024-06-01 08:30:00").as_deref(),
            Some("2024-06-01")
        );
        assert_eq!(normalize_date("06/01/2024").as_deref(), Some("2024-06-01"));
        assert_eq!(
            normalize_date("June 1, 2024").as_deref(),
            Some("2024-06-01")
        );
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("not a date"), None);
    }

    #[test]
    fn one_duplicate_and_one_empty_row_means_two_fewer_rows() {
        let records = vec![
            record("Works well", Some(5), "2024-06-01"),
            record("Works well", Some(5), "2024-06-01"),
            record("   ", Some(3), "2024-06-02"),
            record("Transfers fail often", Some(2), "2024-06-03"),
        ];
        let rows_in = records.len();
        let (cleaned, counts) = Cleaner::clean_records(records);
        assert_eq!(cleaned.len(), rows_in - 2);
        assert_eq!(counts.duplicates_dropped, 1);
        assert_eq!(counts.empty_text_dropped, 1);
    }

    #[test]
    fn cleaning_is_idempotent() {
        let records = vec![
            record("First review", Some(5), "06/01/2024"),
            record("First review", Some(4), "2024-06-02"),
            record("", None, ""),
            record("Second review", Some(9), "garbage"),
        ];
        let (once, _) = Cleaner::clean_records(records);
        let (twice, counts) = Cleaner::clean_records(once.clone());
        assert_eq!(once, twice);
        assert_eq!(counts.empty_text_dropped, 0);
        assert_eq!(counts.duplicates_dropped, 0);
    }

    #[test]
    fn out_of_range_ratings_become_missing() {
        let (cleaned, counts) = Cleaner::clean_records(vec![
            record("ok", Some(0), "2024-06-01"),
            record("bad", Some(9), "2024-06-01"),
            record("fine", Some(3), "2024-06-01"),
        ]);
        assert_eq!(counts.invalid_ratings_cleared, 2);
        assert!(cleaned
            .iter()
            .all(|r| r.rating.is_none() || (1..=5).contains(&r.rating.unwrap())));
    }

    #[test]
    fn missing_stats_count_cleared_fields() {
        let (cleaned, _) = Cleaner::clean_records(vec![
            record("a review", None, "nope"),
            record("another", Some(4), "2024-06-01"),
        ]);
        let stats = Cleaner::column_stats(&cleaned);
        let by_column: BTreeMap<_, _> =
            stats.iter().map(|s| (s.column.as_str(), s.missing)).collect();
        assert_eq!(by_column["rating"], 1);
        assert_eq!(by_column["date"], 1);
        assert_eq!(by_column["review"], 0);
        assert_eq!(stats[1].missing_pct, 50.0);
    }
}
