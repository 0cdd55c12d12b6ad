//! Semantic Scholar Graph API client: paper search and citation lookups.

use crate::retry::RetryPolicy;
use async_trait::async_trait;
use paperscout_core::config::SearchConfig;
use paperscout_core::error::SourceError;
use paperscout_core::paper::{Paper, Source};
use paperscout_core::sources::{CitationProvider, CitationRecord, SearchProvider};
use serde_json::Value;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const SEMANTIC_SCHOLAR_API: &str = "https://api.semanticscholar.org/graph/v1";
const SEARCH_FIELDS: &str =
    "paperId,title,abstract,authors,year,citationCount,url,venue,publicationDate";
const CITATION_FIELDS: &str =
    "references.paperId,citations.paperId,influentialCitationCount";

/// The API caps a single search page at 100 results.
const SEARCH_LIMIT_MAX: usize = 100;

const PROVIDER: &str = "semantic_scholar";

/// Rate-limited Semantic Scholar API client.
pub struct SemanticScholarClient {
    client: reqwest::Client,
    api_key: Option<String>,
    retry: RetryPolicy,
    last_request: Mutex<Option<Instant>>,
}

impl SemanticScholarClient {
    /// Create a client, reading the optional API key from the environment
    /// variable named in the configuration.
    pub fn new(config: &SearchConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("Paperscout/0.3")
            .build()
            .map_err(|e| SourceError::Request {
                provider: PROVIDER.to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let api_key = std::env::var(&config.scholar_api_key_env).ok();
        if api_key.is_some() {
            debug!("Using Semantic Scholar API key");
        }

        Ok(Self {
            client,
            api_key,
            retry: RetryPolicy::new(config.retry.clone()),
            last_request: Mutex::new(None),
        })
    }

    /// Enforce a 1-second minimum delay between requests.
    async fn rate_limit(&self) {
        let wait_duration = {
            let last = self.last_request.lock().unwrap();
            if let Some(instant) = *last {
                let elapsed = instant.elapsed();
                if elapsed < Duration::from_secs(1) {
                    Some(Duration::from_secs(1) - elapsed)
                } else {
                    None
                }
            } else {
                None
            }
        }; // MutexGuard dropped before any .await

        if let Some(wait) = wait_duration {
            tokio::time::sleep(wait).await;
        }

        let mut last = self.last_request.lock().unwrap();
        *last = Some(Instant::now());
    }

    async fn get_json(&self, url: &str) -> Result<Value, SourceError> {
        self.rate_limit().await;

        let fetch = || async {
            let mut request = self.client.get(url);
            if let Some(ref key) = self.api_key {
                request = request.header("x-api-key", key);
            }

            let response = request.send().await.map_err(|e| SourceError::Request {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::Status {
                    provider: PROVIDER.to_string(),
                    status: status.as_u16(),
                });
            }

            response.json::<Value>().await.map_err(|e| SourceError::Parse {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })
        };

        self.retry.run(fetch).await
    }
}

#[async_trait]
impl SearchProvider for SemanticScholarClient {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        year_min: Option<i32>,
    ) -> Result<Vec<Paper>, SourceError> {
        let mut url = format!(
            "{}/paper/search?query={}&limit={}&fields={}",
            SEMANTIC_SCHOLAR_API,
            urlencoding::encode(query),
            limit.min(SEARCH_LIMIT_MAX),
            SEARCH_FIELDS,
        );
        if let Some(year) = year_min {
            url.push_str(&format!("&year={}-", year));
        }

        info!(query, limit, "Searching Semantic Scholar");
        let body = self.get_json(&url).await?;

        let papers: Vec<Paper> = body
            .get("data")
            .and_then(|d| d.as_array())
            .map(|arr| arr.iter().map(standardize_paper).collect())
            .unwrap_or_default();

        info!(found = papers.len(), "Semantic Scholar search complete");
        Ok(papers)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl CitationProvider for SemanticScholarClient {
    async fn get_citations(
        &self,
        paper_id: &str,
        max_refs: usize,
        max_cites: usize,
    ) -> Result<CitationRecord, SourceError> {
        let url = format!(
            "{}/paper/{}?fields={}",
            SEMANTIC_SCHOLAR_API, paper_id, CITATION_FIELDS,
        );

        debug!(paper_id, "Fetching citation data");
        let body = self.get_json(&url).await?;
        Ok(parse_citation_record(&body, max_refs, max_cites))
    }
}

/// Convert a raw Semantic Scholar search entry into the standardized record.
fn standardize_paper(raw: &Value) -> Paper {
    let authors = raw
        .get("authors")
        .and_then(|a| a.as_array())
        .map(|arr| {
            arr.iter()
                .map(|author| {
                    author
                        .get("name")
                        .and_then(|n| n.as_str())
                        .unwrap_or("Unknown")
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default();

    Paper {
        id: str_field(raw, "paperId"),
        source: Source::SemanticScholar,
        title: raw
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or("Untitled")
            .to_string(),
        abstract_text: str_field(raw, "abstract"),
        authors,
        year: raw.get("year").and_then(|y| y.as_i64()).map(|y| y as i32),
        citation_count: raw
            .get("citationCount")
            .and_then(|c| c.as_u64())
            .unwrap_or(0),
        url: str_field(raw, "url"),
        venue: str_field(raw, "venue"),
        publication_date: str_field(raw, "publicationDate"),
        categories: Vec::new(),
        pdf_url: None,
        updated: None,
    }
}

/// Parse a citation lookup response, bounding each list.
fn parse_citation_record(body: &Value, max_refs: usize, max_cites: usize) -> CitationRecord {
    let ids_from = |key: &str, cap: usize| -> Vec<String> {
        body.get(key)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|entry| {
                        entry
                            .get("paperId")
                            .and_then(|id| id.as_str())
                            .filter(|id| !id.is_empty())
                            .map(|id| id.to_string())
                    })
                    .take(cap)
                    .collect()
            })
            .unwrap_or_default()
    };

    CitationRecord {
        references: ids_from("references", max_refs),
        citations: ids_from("citations", max_cites),
        influential_citation_count: body
            .get("influentialCitationCount")
            .and_then(|c| c.as_u64())
            .unwrap_or(0),
    }
}

fn str_field(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
