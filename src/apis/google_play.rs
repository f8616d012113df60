use crate::config::GooglePlayConfig;
use crate::error::{Result, ScraperError};
use crate::types::{AppCandidate, FetchParams, RawReview, ReviewApi};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const BATCHEXECUTE_URL: &str = "https://play.google.com/_/PlayStoreUi/data/batchexecute";
const SEARCH_URL: &str = "https://play.google.com/store/search";

/// Review list RPC id used by the Play Store web UI
const REVIEWS_RPC_ID: &str = "UsvDTd";
/// Sort.NEWEST in the Play Store review RPC
const SORT_NEWEST: u8 = 2;
/// The web UI never returns more than 199 reviews per page
const MAX_PAGE_SIZE: usize = 199;

pub struct GooglePlayClient {
    client: reqwest::Client,
    config: GooglePlayConfig,
}

impl GooglePlayClient {
    pub fn new(config: GooglePlayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    /// Build the `f.req` envelope for one page of reviews. `token` is the
    /// continuation token from the previous page, absent on the first page.
    fn reviews_request_body(
        app_id: &str,
        count: usize,
        sort: u8,
        token: Option<&str>,
    ) -> String {
        let token_fragment = match token {
            Some(t) => format!("\\\"{}\\\"", t),
            None => "null".to_string(),
        };
        format!(
            "[[[\"{rpc}\",\"[null,null,[2,{sort},[{count},null,{token}]],[\\\"{app_id}\\\",7]]\",null,\"generic\"]]]",
            rpc = REVIEWS_RPC_ID,
            sort = sort,
            count = count,
            token = token_fragment,
            app_id = app_id,
        )
    }

    /// batchexecute responses start with an anti-JSON prefix line (`)]}'`);
    /// the JSON envelope follows on the next line.
    fn strip_response_prefix(body: &str) -> &str {
        match body.find('\n') {
            Some(idx) => &body[idx..],
            None => body,
        }
    }

    /// Unwrap the batchexecute envelope down to the RPC payload. The payload
    /// itself is a JSON string nested inside the envelope.
    fn extract_rpc_payload(body: &str) -> Result<Value> {
        let envelope: Value = serde_json::from_str(Self::strip_response_prefix(body))?;
        let frames = envelope
            .as_array()
            .ok_or_else(|| ScraperError::MissingField("batchexecute envelope".into()))?;
        let frame = frames
            .iter()
            .find(|f| f.get(0).and_then(Value::as_str) == Some("wrb.fr"))
            .ok_or_else(|| ScraperError::MissingField("wrb.fr frame".into()))?;
        let payload_str = frame
            .get(2)
            .and_then(Value::as_str)
            .ok_or_else(|| ScraperError::MissingField("rpc payload".into()))?;
        Ok(serde_json::from_str(payload_str)?)
    }

    /// Parse one review entry from the RPC payload. Entries are positional
    /// arrays: [2] = star rating, [4] = review text, [5] = [seconds, nanos].
    fn parse_review_entry(entry: &Value) -> Option<RawReview> {
        let text = entry.get(4).and_then(Value::as_str)?.to_string();
        let score = entry
            .get(2)
            .and_then(Value::as_u64)
            .and_then(|s| u8::try_from(s).ok());
        let at = entry
            .get(5)
            .and_then(|ts| ts.get(0))
            .and_then(Value::as_i64)
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.date_naive());
        Some(RawReview { text, score, at })
    }

    /// Parse a full reviews payload into entries plus the continuation token
    /// for the next page, if any.
    fn parse_reviews_payload(payload: &Value) -> (Vec<RawReview>, Option<String>) {
        let reviews = payload
            .get(0)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Self::parse_review_entry)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let token = payload
            .get(1)
            .and_then(|t| t.get(1))
            .and_then(Value::as_str)
            .map(|s| s.to_string());
        (reviews, token)
    }

    /// POST one page request, retrying up to the configured limit.
    async fn fetch_page_with_retry(
        &self,
        app_id: &str,
        params: &FetchParams,
        page_size: usize,
        token: Option<&str>,
    ) -> Result<(Vec<RawReview>, Option<String>)> {
        let url = format!(
            "{}?hl={}&gl={}",
            BATCHEXECUTE_URL, params.lang, params.country
        );
        let body = Self::reviews_request_body(app_id, page_size, SORT_NEWEST, token);

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                warn!("Retrying page fetch for {} (attempt {})", app_id, attempt + 1);
                tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
            }
            let result = async {
                let response = self
                    .client
                    .post(&url)
                    .form(&[("f.req", body.as_str())])
                    .send()
                    .await?
                    .error_for_status()?;
                let text = response.text().await?;
                let payload = Self::extract_rpc_payload(&text)?;
                Ok::<_, ScraperError>(Self::parse_reviews_payload(&payload))
            }
            .await;
            match result {
                Ok(page) => return Ok(page),
                Err(e) => {
                    debug!("Page fetch failed for {}: {}", app_id, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ScraperError::Api {
            message: format!("review fetch for {app_id} failed with no attempts"),
        }))
    }

    /// Search the Play Store for apps matching `query` and extract candidate
    /// package ids. The search page embeds its datasets in
    /// `AF_initDataCallback` script blocks; extraction is best-effort and an
    /// empty result is not an error.
    #[instrument(skip(self))]
    pub async fn search_apps(
        &self,
        query: &str,
        lang: &str,
        country: &str,
        limit: usize,
    ) -> Result<Vec<AppCandidate>> {
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[("q", query), ("c", "apps"), ("hl", lang), ("gl", country)])
            .send()
            .await?
            .error_for_status()?;
        let html = response.text().await?;

        let mut candidates = Vec::new();
        for dataset in Self::extract_embedded_datasets(&html)? {
            Self::collect_app_candidates(&dataset, &mut candidates);
        }
        candidates.truncate(limit);
        info!("Found {} app candidates for '{}'", candidates.len(), query);
        Ok(candidates)
    }

    /// Pull the `data:` arrays out of every AF_initDataCallback script block.
    fn extract_embedded_datasets(html: &str) -> Result<Vec<Value>> {
        let document = scraper::Html::parse_document(html);
        let selector = scraper::Selector::parse("script").map_err(|e| ScraperError::Api {
            message: format!("script selector: {e:?}"),
        })?;
        let data_re = regex::Regex::new(r"(?s)AF_initDataCallback\(\{.*?data:(\[.*\]), sideChannel")
            .map_err(|e| ScraperError::Api {
                message: format!("dataset regex: {e}"),
            })?;

        let mut datasets = Vec::new();
        for script in document.select(&selector) {
            let text = script.inner_html();
            if let Some(captures) = data_re.captures(&text) {
                if let Ok(value) = serde_json::from_str::<Value>(&captures[1]) {
                    datasets.push(value);
                }
            }
        }
        Ok(datasets)
    }

    /// Recursively scan a dataset for arrays that look like app entries:
    /// a package-id string followed by display strings.
    fn collect_app_candidates(value: &Value, out: &mut Vec<AppCandidate>) {
        let Some(items) = value.as_array() else {
            return;
        };
        if let Some(candidate) = Self::candidate_from_array(items) {
            if !out.iter().any(|c| c.app_id == candidate.app_id) {
                out.push(candidate);
            }
        }
        for item in items {
            Self::collect_app_candidates(item, out);
        }
    }

    fn candidate_from_array(items: &[Value]) -> Option<AppCandidate> {
        let app_id = items.first().and_then(Value::as_str)?;
        if !Self::looks_like_package_id(app_id) {
            return None;
        }
        // The strings after the package id are display fields; the first is
        // the app title, the next (if any) a summary line.
        let mut strings = items
            .iter()
            .skip(1)
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty());
        let title = strings.next()?.to_string();
        let summary = strings.next().map(|s| s.to_string());
        Some(AppCandidate {
            app_id: app_id.to_string(),
            title,
            summary,
        })
    }

    fn looks_like_package_id(s: &str) -> bool {
        s.contains('.')
            && !s.contains(' ')
            && s.split('.').count() >= 2
            && s.split('.').all(|part| {
                !part.is_empty()
                    && part
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
            })
    }
}

#[async_trait::async_trait]
impl ReviewApi for GooglePlayClient {
    fn source_name(&self) -> &'static str {
        "google_play"
    }

    /// Fetch up to `params.count` reviews, following continuation tokens.
    /// A failed first page is an error; a failed later page ends the feed
    /// with whatever was collected so far.
    #[instrument(skip(self, params), fields(app_id = %app_id))]
    async fn fetch_reviews(&self, app_id: &str, params: &FetchParams) -> Result<Vec<RawReview>> {
        let mut collected: Vec<RawReview> = Vec::new();
        let mut token: Option<String> = None;

        while collected.len() < params.count {
            let remaining = params.count - collected.len();
            let page_size = remaining.min(MAX_PAGE_SIZE);
            let page = self
                .fetch_page_with_retry(app_id, params, page_size, token.as_deref())
                .await;
            let (reviews, next_token) = match page {
                Ok(page) => page,
                Err(e) if collected.is_empty() => return Err(e),
                Err(e) => {
                    warn!(
                        "Pagination for {} stopped after {} reviews: {}",
                        app_id,
                        collected.len(),
                        e
                    );
                    break;
                }
            };

            if reviews.is_empty() {
                debug!("Review feed for {} exhausted", app_id);
                break;
            }
            collected.extend(reviews);
            debug!("Collected {}/{} reviews for {}", collected.len(), params.count, app_id);

            match next_token {
                Some(t) => token = Some(t),
                None => break,
            }
        }

        collected.truncate(params.count);
        info!("Fetched {} reviews for {}", collected.len(), app_id);
        Ok(collected)
    }
}
