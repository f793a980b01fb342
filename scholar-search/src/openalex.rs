//! OpenAlex REST client
//!
//! Only `GET /works` (search) and `GET /works/{id}` are used. OpenAlex asks
//! callers to identify themselves with a contact email in the User-Agent to
//! get into the "polite pool".

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use scholar_core::config::ScholarConfig;
use scholar_core::work::{Work, WorksPage};
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_PER_PAGE: usize = 200;

/// Parameters for a works search
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub year: Option<i32>,
    pub limit: usize,
    pub min_citations: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            year: None,
            limit: 10,
            min_citations: None,
        }
    }

    pub fn year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn min_citations(mut self, min: Option<u64>) -> Self {
        self.min_citations = min;
        self
    }

    /// OpenAlex `filter` parameter
    pub fn filter(&self) -> String {
        let mut filters = vec!["type:article".to_string()];
        if let Some(year) = self.year {
            filters.push(format!("publication_year:{}", year));
        }
        match self.min_citations {
            Some(0) | None => {}
            Some(min) => filters.push(format!("cited_by_count:>{}", min - 1)),
        }
        filters.join(",")
    }
}

/// OpenAlex works client
#[derive(Debug, Clone)]
pub struct OpenAlexClient {
    client: Client,
    base_url: String,
}

impl OpenAlexClient {
    pub fn new(base_url: impl Into<String>, email: Option<&str>) -> Result<Self> {
        let user_agent = match email.filter(|e| !e.trim().is_empty()) {
            Some(email) => format!("ACM Scholar CLI (mailto:{})", email.trim()),
            None => "ACM Scholar CLI".to_string(),
        };

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ScholarConfig) -> Result<Self> {
        Self::new(config.openalex.base_url(), config.openalex.email.as_deref())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full request URL for a search
    pub fn search_url(&self, query: &SearchQuery) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/works", self.base_url))
            .with_context(|| format!("Invalid OpenAlex base URL: {}", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("search", &query.query)
            .append_pair("filter", &query.filter())
            .append_pair("per-page", &query.limit.clamp(1, MAX_PER_PAGE).to_string());
        Ok(url)
    }

    #[instrument(skip(self), fields(query = %query.query))]
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Work>> {
        let url = self.search_url(query)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send OpenAlex search request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAlex search failed ({}): {}", status, truncate_body(&body));
        }

        let page: WorksPage = response
            .json()
            .await
            .context("Failed to parse OpenAlex response")?;
        debug!(
            "OpenAlex returned {} results (total {:?})",
            page.results.len(),
            page.meta.and_then(|m| m.count)
        );
        Ok(page.results)
    }

    /// Same request as `search`, keeping only ACM publications
    pub async fn search_acm(&self, query: &str, year: Option<i32>, limit: usize) -> Result<Vec<Work>> {
        let query = SearchQuery::new(query).year(year).limit(limit);
        let works = self.search(&query).await?;
        Ok(works.into_iter().filter(Work::is_acm).collect())
    }

    /// Fetch one work by OpenAlex id, URL or DOI; `None` when unknown
    #[instrument(skip(self))]
    pub async fn get_work(&self, id: &str) -> Result<Option<Work>> {
        let key = work_key(id);
        if key.is_empty() {
            anyhow::bail!("Empty paper id");
        }
        let url = format!("{}/works/{}", self.base_url, key);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send OpenAlex work request")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAlex lookup failed ({}): {}", status, truncate_body(&body));
        }

        let work = response
            .json()
            .await
            .context("Failed to parse OpenAlex work")?;
        Ok(Some(work))
    }
}

/// Path key for `/works/{key}`
fn work_key(id: &str) -> String {
    let id = id.trim();
    if let Some(doi) = id
        .strip_prefix("https://doi.org/")
        .or_else(|| id.strip_prefix("doi:"))
    {
        return format!("doi:{}", doi);
    }
    if id.starts_with("10.") && id.contains('/') {
        return format!("doi:{}", id);
    }
    id.rsplit('/').next().unwrap_or(id).to_string()
}

/// Cap upstream error bodies at 500 characters
pub(crate) fn truncate_body(body: &str) -> String {
    if body.chars().count() > 500 {
        let head: String = body.chars().take(500).collect();
        format!("{}...", head)
    } else {
        body.to_string()
    }
}
