//! arXiv API client: Atom XML search parsed by string scanning.

use crate::retry::RetryPolicy;
use async_trait::async_trait;
use paperscout_core::config::SearchConfig;
use paperscout_core::error::SourceError;
use paperscout_core::paper::{Paper, Source};
use paperscout_core::sources::SearchProvider;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const ARXIV_API_BASE: &str = "https://export.arxiv.org/api/query";

const PROVIDER: &str = "arxiv";

/// HTTP client for the arXiv API.
pub struct ArxivClient {
    client: reqwest::Client,
    retry: RetryPolicy,
    last_request: Mutex<Option<Instant>>,
}

impl ArxivClient {
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
        Ok(Self {
            client,
            retry: RetryPolicy::new(config.retry.clone()),
            last_request: Mutex::new(None),
        })
    }

    /// Enforce the arXiv-requested minimum 3-second delay between requests.
    async fn rate_limit(&self) {
        let wait_duration = {
            let last = self.last_request.lock().unwrap();
            if let Some(instant) = *last {
                let elapsed = instant.elapsed();
                if elapsed < Duration::from_secs(3) {
                    Some(Duration::from_secs(3) - elapsed)
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
}

#[async_trait]
impl SearchProvider for ArxivClient {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        year_min: Option<i32>,
    ) -> Result<Vec<Paper>, SourceError> {
        self.rate_limit().await;

        // arXiv has no server-side year filter; fetch extra and post-filter.
        let fetch_count = if year_min.is_some() { limit * 2 } else { limit };
        let url = build_search_url(query, fetch_count);
        debug!(url = %url, "arXiv search URL");
        info!(query, limit, "Searching arXiv");

        let fetch = || async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| SourceError::Request {
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

            response.text().await.map_err(|e| SourceError::Request {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })
        };

        let body = self.retry.run(fetch).await?;
        let mut papers = parse_atom_response(&body)?;

        if let Some(year) = year_min {
            papers.retain(|p| p.year.is_none_or(|y| y >= year));
        }
        papers.truncate(limit);

        info!(found = papers.len(), "arXiv search complete");
        Ok(papers)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// Build the arXiv API search URL, newest submissions first.
pub fn build_search_url(query: &str, max_results: usize) -> String {
    format!(
        "{}?search_query=all:{}&start=0&max_results={}&sortBy=submittedDate&sortOrder=descending",
        ARXIV_API_BASE,
        urlencoding::encode(query),
        max_results,
    )
}

/// Parse the Atom XML response into standardized papers.
pub fn parse_atom_response(xml: &str) -> Result<Vec<Paper>, SourceError> {
    let entries = extract_entries(xml);
    let mut papers = Vec::new();
    for entry_xml in &entries {
        if let Some(paper) = parse_entry(entry_xml) {
            papers.push(paper);
        }
    }
    Ok(papers)
}

/// Extract all <entry>...</entry> blocks from the XML.
fn extract_entries(xml: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut search_from = 0;

    loop {
        let start_tag = "<entry>";
        let end_tag = "</entry>";

        let start = match xml[search_from..].find(start_tag) {
            Some(pos) => search_from + pos,
            None => break,
        };

        let end = match xml[start..].find(end_tag) {
            Some(pos) => start + pos + end_tag.len(),
            None => break,
        };

        entries.push(xml[start..end].to_string());
        search_from = end;
    }

    entries
}

/// Parse a single <entry> block into a standardized paper.
fn parse_entry(entry: &str) -> Option<Paper> {
    let id_url = extract_tag_text(entry, "id")?;
    let arxiv_id = extract_arxiv_id_from_url(&id_url);
    let title = normalize_whitespace(&extract_tag_text(entry, "title")?);

    // Authors: every <author><name>...</name></author> block.
    let mut authors = Vec::new();
    let mut author_search = 0;
    while let Some(pos) = entry[author_search..].find("<author>") {
        let author_start = author_search + pos;
        let Some(end_pos) = entry[author_start..].find("</author>") else {
            break;
        };
        let author_end = author_start + end_pos + "</author>".len();
        let author_block = &entry[author_start..author_end];
        if let Some(name) = extract_tag_text(author_block, "name") {
            authors.push(name);
        }
        author_search = author_end;
    }

    let summary = normalize_whitespace(&extract_tag_text(entry, "summary").unwrap_or_default());
    let published = extract_tag_text(entry, "published").unwrap_or_default();
    let updated = extract_tag_text(entry, "updated").unwrap_or_default();
    let year = extract_year(&published);

    // Categories from <category term="..."/> tags.
    let mut categories = Vec::new();
    let mut cat_search = 0;
    while let Some(pos) = entry[cat_search..].find("<category") {
        let cat_start = cat_search + pos;
        let cat_end = if let Some(end_pos) = entry[cat_start..].find("/>") {
            cat_start + end_pos + 2
        } else if let Some(end_pos) = entry[cat_start..].find('>') {
            cat_start + end_pos + 1
        } else {
            break;
        };
        let cat_tag = &entry[cat_start..cat_end];
        if let Some(term) = extract_attribute(cat_tag, "term") {
            categories.push(term);
        }
        cat_search = cat_end;
    }

    let pdf_url = format!("https://arxiv.org/pdf/{}", arxiv_id);
    let abs_url = format!("https://arxiv.org/abs/{}", arxiv_id);

    Some(Paper {
        id: arxiv_id,
        source: Source::Arxiv,
        title,
        abstract_text: summary,
        authors,
        year,
        citation_count: 0, // arXiv does not report citation counts
        url: abs_url,
        venue: "arXiv".to_string(),
        publication_date: published.chars().take(10).collect(),
        categories,
        pdf_url: Some(pdf_url),
        updated: if updated.is_empty() {
            None
        } else {
            Some(updated)
        },
    })
}

/// Extract the text content of the first occurrence of <tag>text</tag>.
fn extract_tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let start_pos = xml.find(&open)?;
    // Find the end of the opening tag (could have attributes)
    let content_start = xml[start_pos..].find('>')? + start_pos + 1;
    let content_end = xml[content_start..].find(&close)? + content_start;

    Some(xml[content_start..content_end].trim().to_string())
}

/// Extract an attribute value from a tag string.
fn extract_attribute(tag: &str, attr: &str) -> Option<String> {
    let search = format!("{}=\"", attr);
    let start = tag.find(&search)? + search.len();
    let end = tag[start..].find('"')? + start;
    Some(tag[start..end].to_string())
}

/// Extract the arXiv ID from a URL like "http://arxiv.org/abs/1706.03762v7".
fn extract_arxiv_id_from_url(url: &str) -> String {
    if let Some(pos) = url.rfind("/abs/") {
        url[pos + 5..].to_string()
    } else if let Some(pos) = url.rfind("/pdf/") {
        url[pos + 5..].trim_end_matches(".pdf").to_string()
    } else {
        // Already just an ID
        url.to_string()
    }
}

/// Collapse runs of whitespace into single spaces.
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the year from a date string like "2017-06-12T17:57:34Z".
fn extract_year(date_str: &str) -> Option<i32> {
    date_str.split('-').next()?.parse().ok()
}
