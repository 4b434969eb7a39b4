use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use lore_core::enrich::ContextEnricher;
use lore_core::error::{LoreError, Result};

const SUMMARY_SENTENCES: usize = 3;
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(rename = "type", default)]
    page_type: Option<String>,
    #[serde(default)]
    extract: Option<String>,
}

/// Topic summaries from the Wikipedia REST API.
///
/// The topic is first run through `opensearch` so loose phrasings
/// ("who founded acme corp") land on the closest article title.
pub struct WikipediaEnricher {
    client: Client,
    base_url: String,
}

impl WikipediaEnricher {
    pub fn new(lang: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent("lore-enrich/0.1")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LoreError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("https://{lang}.wikipedia.org"),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json(&self, url: &str) -> Result<Option<serde_json::Value>> {
        debug!(url = %url, "Fetching Wikipedia resource");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoreError::Enrichment(format!("HTTP request failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LoreError::Enrichment(format!(
                "Wikipedia returned HTTP {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        let value = response
            .json()
            .await
            .map_err(|e| LoreError::Enrichment(format!("Failed to parse response JSON: {e}")))?;
        Ok(Some(value))
    }

    /// Best matching article title for a free-text topic.
    async fn suggest_title(&self, topic: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/w/api.php?action=opensearch&format=json&limit=1&namespace=0&search={}",
            self.base_url,
            urlencoding::encode(topic)
        );

        // opensearch answers `[query, [titles], [descriptions], [urls]]`
        let title = self.get_json(&url).await?.and_then(|value| {
            value
                .get(1)
                .and_then(|titles| titles.get(0))
                .and_then(|t| t.as_str())
                .map(str::to_string)
        });
        Ok(title)
    }

    async fn page_summary(&self, title: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/api/rest_v1/page/summary/{}",
            self.base_url,
            urlencoding::encode(&title.replace(' ', "_"))
        );

        let Some(value) = self.get_json(&url).await? else {
            return Ok(None);
        };
        let summary: PageSummary = serde_json::from_value(value)?;

        if summary.page_type.as_deref() == Some("disambiguation") {
            debug!(title = %title, "Skipping disambiguation page");
            return Ok(None);
        }

        Ok(summary
            .extract
            .map(|text| first_sentences(&text, SUMMARY_SENTENCES))
            .filter(|text| !text.is_empty()))
    }
}

/// The first `count` sentences of `text`, split on `.`, `!` or `?`
/// followed by whitespace.
pub fn first_sentences(text: &str, count: usize) -> String {
    let text = text.trim();
    let mut seen = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                seen += 1;
                if seen == count {
                    return text[..i + c.len_utf8()].to_string();
                }
            }
        }
    }

    text.to_string()
}

#[async_trait]
impl ContextEnricher for WikipediaEnricher {
    fn name(&self) -> &str {
        "wikipedia"
    }

    async fn summary(&self, topic: &str) -> Result<Option<String>> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Ok(None);
        }

        let Some(title) = self.suggest_title(topic).await? else {
            debug!(topic = %topic, "No Wikipedia article matched");
            return Ok(None);
        };

        let summary = self.page_summary(&title).await?;
        info!(
            topic = %topic,
            title = %title,
            found = summary.is_some(),
            "Wikipedia lookup finished"
        );
        Ok(summary)
    }
}
