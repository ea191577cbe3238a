#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::AppConfig;
use crate::spoonacular::types::{RawRecipe, RawSearchResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Placeholder values that mean "no key was ever configured".
const PLACEHOLDER_KEYS: [&str; 2] = ["your_spoonacular_api_key", "SPOONACULAR_API_KEY"];

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The client cannot make requests at all (missing or placeholder key).
    #[error("{0}")]
    Configuration(String),
    /// Upstream quota exhausted (Spoonacular signals this with HTTP 402).
    #[error("{0}")]
    RateLimited(String),
    /// Any other failed request: non-2xx status, timeout, transport or decode
    /// failure. `status` is `None` when no HTTP response was received.
    #[error("{message}")]
    Request {
        status: Option<u16>,
        message: String,
    },
}

/// External recipe source. The real implementation talks to Spoonacular;
/// tests swap in [`MockProvider`].
#[async_trait]
pub trait RecipeProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        offset: u32,
        number: u32,
    ) -> Result<RawSearchResponse, ProviderError>;

    async fn get_details(
        &self,
        external_id: i64,
        include_nutrition: bool,
    ) -> Result<RawRecipe, ProviderError>;
}

#[derive(Debug)]
pub struct SpoonacularClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SpoonacularClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let key = config.spoonacular_api_key.trim();
        if key.is_empty() || PLACEHOLDER_KEYS.contains(&key) {
            return Err(ProviderError::Configuration(
                "SPOONACULAR_API_KEY is missing or still set to a placeholder value".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("failed to build http client: {e}"))
            })?;
        Ok(Self {
            http,
            base_url: config.spoonacular_base_url.trim_end_matches('/').to_string(),
            api_key: key.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(path, "spoonacular request");

        let resp = self
            .http
            .get(&url)
            .query(params)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("Spoonacular request to {path} timed out")
                } else {
                    format!("Spoonacular request to {path} failed: {e}")
                };
                ProviderError::Request {
                    status: None,
                    message,
                }
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::PAYMENT_REQUIRED {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::RateLimited(format!(
                "Spoonacular request failed (status 402 Payment Required, often the points limit): {body}"
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Request {
                status: Some(status.as_u16()),
                message: format!(
                    "Spoonacular request to {path} failed with status {status}: {body}"
                ),
            });
        }

        resp.json::<T>().await.map_err(|e| ProviderError::Request {
            status: None,
            message: format!("Spoonacular returned an invalid response body for {path}: {e}"),
        })
    }
}

#[async_trait]
impl RecipeProvider for SpoonacularClient {
    async fn search(
        &self,
        query: &str,
        offset: u32,
        number: u32,
    ) -> Result<RawSearchResponse, ProviderError> {
        let params = [
            ("query", query.to_string()),
            ("offset", offset.to_string()),
            ("number", number.to_string()),
            ("addRecipeInformation", "true".to_string()),
            ("fillIngredients", "false".to_string()),
        ];
        self.get_json("/recipes/complexSearch", &params).await
    }

    async fn get_details(
        &self,
        external_id: i64,
        include_nutrition: bool,
    ) -> Result<RawRecipe, ProviderError> {
        let params = [("includeNutrition", include_nutrition.to_string())];
        self.get_json(&format!("/recipes/{external_id}/information"), &params)
            .await
    }
}

/// Stand-in used when the API key is absent at startup. The app still serves
/// the local catalog; external routes fail with a configuration error.
pub struct UnconfiguredProvider {
    reason: String,
}

impl UnconfiguredProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RecipeProvider for UnconfiguredProvider {
    async fn search(
        &self,
        _query: &str,
        _offset: u32,
        _number: u32,
    ) -> Result<RawSearchResponse, ProviderError> {
        Err(ProviderError::Configuration(self.reason.clone()))
    }

    async fn get_details(
        &self,
        _external_id: i64,
        _include_nutrition: bool,
    ) -> Result<RawRecipe, ProviderError> {
        Err(ProviderError::Configuration(self.reason.clone()))
    }
}

/// In-memory provider with canned responses and call counters.
#[cfg(test)]
#[derive(Default)]
pub struct MockProvider {
    search_result: Option<Result<RawSearchResponse, ProviderError>>,
    details: HashMap<i64, Result<RawRecipe, ProviderError>>,
    pub search_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
}

#[cfg(test)]
impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, response: RawSearchResponse) -> Self {
        self.search_result = Some(Ok(response));
        self
    }

    pub fn with_search_error(mut self, error: ProviderError) -> Self {
        self.search_result = Some(Err(error));
        self
    }

    pub fn with_details(mut self, external_id: i64, recipe: RawRecipe) -> Self {
        self.details.insert(external_id, Ok(recipe));
        self
    }

    pub fn with_details_error(mut self, external_id: i64, error: ProviderError) -> Self {
        self.details.insert(external_id, Err(error));
        self
    }
}

#[cfg(test)]
#[async_trait]
impl RecipeProvider for MockProvider {
    async fn search(
        &self,
        _query: &str,
        _offset: u32,
        _number: u32,
    ) -> Result<RawSearchResponse, ProviderError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.search_result
            .clone()
            .unwrap_or_else(|| Ok(RawSearchResponse::default()))
    }

    async fn get_details(
        &self,
        external_id: i64,
        _include_nutrition: bool,
    ) -> Result<RawRecipe, ProviderError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.details.get(&external_id).cloned().unwrap_or_else(|| {
            Err(ProviderError::Request {
                status: Some(404),
                message: format!("recipe {external_id} not found"),
            })
        })
    }
}
