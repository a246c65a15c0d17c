use super::provider::{MetadataProvider, ProviderError, SceneCandidate};
use crate::config::MatcherSettings;
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use log::debug;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use std::time::Duration;

/// ThePornDB 場景搜尋 API
pub struct TpdbClient {
    client: Client,
    api_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TpdbResponse {
    #[serde(default)]
    data: Vec<TpdbScene>,
}

#[derive(Debug, Deserialize)]
struct TpdbScene {
    id: Option<serde_json::Value>,
    title: Option<String>,
    date: Option<String>,
    url: Option<String>,
    description: Option<String>,
    image: Option<String>,
    duration: Option<f64>,
    site: Option<TpdbNamed>,
    #[serde(default)]
    performers: Vec<TpdbPerformer>,
    #[serde(default)]
    tags: Vec<TpdbNamed>,
}

#[derive(Debug, Deserialize)]
struct TpdbNamed {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TpdbPerformer {
    name: Option<String>,
    parent: Option<TpdbNamed>,
}

impl TpdbClient {
    pub fn new(settings: &MatcherSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!("尚未設定中繼資料服務的 API 金鑰");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("無法建立 HTTP client")?;

        Ok(Self {
            client,
            api_url: settings.api_url.clone(),
            api_key: settings.api_key.clone(),
        })
    }
}

impl MetadataProvider for TpdbClient {
    fn name(&self) -> &'static str {
        "ThePornDB"
    }

    fn search_scenes(&self, query: &str) -> Result<Vec<SceneCandidate>, ProviderError> {
        debug!("搜尋場景: {query}");

        let response = self
            .client
            .get(&self.api_url)
            .bearer_auth(&self.api_key)
            .query(&[("parse", query)])
            .send()
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if status.is_server_error() {
            return Err(ProviderError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ProviderError::Rejected(format!("HTTP {status}")));
        }

        let body: TpdbResponse = response
            .json()
            .map_err(|e| ProviderError::Transient(format!("無法解析回應: {e}")))?;

        Ok(body.data.into_iter().map(SceneCandidate::from).collect())
    }
}

impl From<TpdbScene> for SceneCandidate {
    fn from(scene: TpdbScene) -> Self {
        let scene_id = match scene.id {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        // 有上層演員資料時使用其正式名稱
        let performers = scene
            .performers
            .into_iter()
            .filter_map(|p| p.parent.and_then(|parent| parent.name).or(p.name))
            .collect();

        Self {
            scene_id,
            title: scene.title.unwrap_or_default(),
            studio: scene.site.and_then(|s| s.name),
            release_date: scene
                .date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            performers,
            tags: scene.tags.into_iter().filter_map(|t| t.name).collect(),
            description: scene.description,
            url: scene.url,
            image_url: scene.image,
            duration_seconds: scene.duration.filter(|d| *d > 0.0).map(|d| d as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_conversion() {
        let json = r#"{
            "data": [{
                "id": "abc-123",
                "title": "Pool Day -",
                "date": "2024-01-02",
                "url": "https://example.com/scene",
                "site": { "name": "Studio" },
                "performers": [
                    { "name": "Jane D", "parent": { "name": "Jane Doe" } },
                    { "name": "John Roe", "parent": null }
                ],
                "tags": [ { "name": "Outdoor" }, { "name": null } ],
                "duration": 1800
            }]
        }"#;

        let response: TpdbResponse = serde_json::from_str(json).unwrap();
        let candidates: Vec<SceneCandidate> =
            response.data.into_iter().map(SceneCandidate::from).collect();

        assert_eq!(candidates.len(), 1);
        let scene = &candidates[0];
        assert_eq!(scene.scene_id, "abc-123");
        assert_eq!(scene.studio.as_deref(), Some("Studio"));
        assert_eq!(scene.release_date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(scene.performers, vec!["Jane Doe", "John Roe"]);
        assert_eq!(scene.tags, vec!["Outdoor"]);
        assert_eq!(scene.duration_seconds, Some(1800));
    }

    #[test]
    fn test_numeric_id_and_missing_fields() {
        let json = r#"{ "data": [ { "id": 42 } ] }"#;
        let response: TpdbResponse = serde_json::from_str(json).unwrap();
        let scene = SceneCandidate::from(response.data.into_iter().next().unwrap());
        assert_eq!(scene.scene_id, "42");
        assert!(scene.title.is_empty());
        assert!(scene.release_date.is_none());
    }

    #[test]
    fn test_empty_body() {
        let response: TpdbResponse = serde_json::from_str("{}").unwrap();
        assert!(response.data.is_empty());
    }

    #[test]
    fn test_requires_api_key() {
        assert!(TpdbClient::new(&MatcherSettings::default()).is_err());
    }
}
