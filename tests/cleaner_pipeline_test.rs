use anyhow::Result;
use regex::Regex;
use review_scraper::cleaner::Cleaner;
use review_scraper::storage;
use review_scraper::types::ReviewRecord;
use tempfile::tempdir;

fn record(text: &str, rating: Option<u8>, date: &str, bank: &str) -> ReviewRecord {
    ReviewRecord {
        review: text.to_string(),
        rating,
        date: date.to_string(),
        bank: bank.to_string(),
        source: "Google Play (US)".to_string(),
    }
}

#[test]
fn cleaner_end_to_end_over_raw_csv() -> Result<()> {
    let dir = tempdir()?;
    let raw_path = dir.path().join("reviews.csv");
    let clean_path = dir.path().join("clean_reviews.csv");

    let raw = vec![
        record("Fast and reliable transfers", Some(5), "2024-06-01", "CBE"),
        // Exact duplicate text, should be dropped
        record("Fast and reliable transfers", Some(4), "2024-06-02", "CBE"),
        // Empty after trimming, should be dropped
        record("   ", Some(3), "2024-06-02", "BOA"),
        // Date needs normalization, rating out of range
        record("Login fails every morning", Some(9), "06/03/2024", "BOA"),
        record("Good app but slow updates", None, "2024-06-04", "Dashen"),
    ];
    storage::write_reviews(&raw_path, &raw)?;

    let cleaner = Cleaner::new(1, 5.0);
    let report = cleaner.run(&raw_path, &clean_path)?;

    // One duplicate and one empty-text row: output = input - 2
    assert_eq!(report.rows_in, 5);
    assert_eq!(report.rows_out, 3);
    assert_eq!(report.duplicates_dropped, 1);
    assert_eq!(report.empty_text_dropped, 1);
    assert_eq!(report.invalid_ratings_cleared, 1);

    let cleaned = storage::read_reviews(&clean_path)?;
    let date_re = Regex::new(r"^\d{4}-\d{2}-\d{2}$")?;
    for row in &cleaned {
        assert!(!row.review.trim().is_empty());
        if let Some(rating) = row.rating {
            assert!((1..=5).contains(&rating));
        }
        if !row.date.is_empty() {
            assert!(date_re.is_match(&row.date), "bad date: {}", row.date);
        }
    }
    assert!(cleaned.iter().any(|r| r.date == "2024-06-03"));
    Ok(())
}

#[test]
fn cleaning_its_own_output_changes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let raw_path = dir.path().join("reviews.csv");
    let first_pass = dir.path().join("clean_once.csv");
    let second_pass = dir.path().join("clean_twice.csv");

    let raw = vec![
        record("Works offline too", Some(5), "2024-05-30 10:00:00", "CBE"),
        record("Works offline too", Some(5), "2024-05-30 10:00:00", "CBE"),
        record("Needs fingerprint login", Some(4), "", "BOA"),
    ];
    storage::write_reviews(&raw_path, &raw)?;

    let cleaner = Cleaner::new(1, 5.0);
    cleaner.run(&raw_path, &first_pass)?;
    let second_report = cleaner.run(&first_pass, &second_pass)?;

    assert_eq!(second_report.duplicates_dropped, 0);
    assert_eq!(second_report.empty_text_dropped, 0);
    assert_eq!(
        storage::read_reviews(&first_pass)?,
        storage::read_reviews(&second_pass)?
    );
    Ok(())
}

#[test]
fn shortfall_banks_are_reported_without_failing_the_run() -> Result<()> {
    let dir = tempdir()?;
    let raw_path = dir.path().join("reviews.csv");
    let clean_path = dir.path().join("clean_reviews.csv");

    let raw = vec![
        record("One lonely review", Some(2), "2024-06-01", "Dashen"),
        record("Plenty here", Some(5), "2024-06-01", "CBE"),
        record("And here", Some(4), "2024-06-01", "CBE"),
    ];
    storage::write_reviews(&raw_path, &raw)?;

    let cleaner = Cleaner::new(2, 5.0);
    let report = cleaner.run(&raw_path, &clean_path)?;

    assert_eq!(report.shortfalls.len(), 1);
    assert_eq!(report.shortfalls[0].bank, "Dashen");
    assert_eq!(report.shortfalls[0].unique_reviews, 1);
    assert_eq!(report.rows_out, 3);
    Ok(())
}

#[test]
fn zero_survivors_still_writes_a_valid_csv() -> Result<()> {
    let dir = tempdir()?;
    let raw_path = dir.path().join("reviews.csv");
    let clean_path = dir.path().join("clean_reviews.csv");

    // Every row is empty after trimming, so nothing survives cleaning
    storage::write_reviews(&raw_path, &[record("   ", Some(3), "2024-06-01", "CBE")])?;

    let cleaner = Cleaner::new(1, 5.0);
    let report = cleaner.run(&raw_path, &clean_path)?;
    assert_eq!(report.rows_out, 0);

    let content = std::fs::read_to_string(&clean_path)?;
    assert_eq!(
        content.lines().next(),
        Some("review,rating,date,bank,source")
    );
    assert!(storage::read_reviews(&clean_path)?.is_empty());
    Ok(())
}

#[test]
fn unreadable_input_is_fatal() {
    let dir = tempdir().unwrap();
    let cleaner = Cleaner::new(1, 5.0);
    let result = cleaner.run(
        &dir.path().join("does_not_exist.csv"),
        &dir.path().join("out.csv"),
    );
    assert!(result.is_err());
}
