/// Bank and CSV constants shared across the collector and cleaner.
// Default bank targets: Play Store app ids discovered via `find-apps`
pub const CBE_BANK: &str = "CBE";
pub const CBE_APP_ID: &str = "com.combanketh.mobilebanking";
pub const BOA_BANK: &str = "BOA";
pub const BOA_APP_ID: &str = "com.boa.boaMobileBanking";
pub const DASHEN_BANK: &str = "Dashen";
pub const DASHEN_APP_ID: &str = "com.cr2.amolelight";

/// CSV column order for both the raw and the cleaned dataset
pub const CSV_COLUMNS: [&str; 5] = ["review", "rating", "date", "bank", "source"];

/// Canonical date format for the `date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Default paths, matching the layout downstream analysis expects
pub const DEFAULT_RAW_OUTPUT: &str = "data/reviews.csv";
pub const DEFAULT_CLEAN_OUTPUT: &str = "data/clean_reviews.csv";

/// Source label written into every record, e.g. "Google Play (US)"
pub fn source_label(country: &str) -> String {
    format!("Google Play ({})", country.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_label_uppercases_country() {
        assert_eq!(source_label("us"), "Google Play (US)");
        assert_eq!(source_label("ET"), "Google Play (ET)");
    }
}
