use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The backing store rejected the write with a uniqueness/exclusion
    /// violation. Callers map this to their own conflict semantics.
    #[error("Row conflict: {0}")]
    RowConflict(String),

    #[error("Storage API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Storage transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Thin PostgREST-style JSON client. All tables are reached through
/// `/rest/v1/<table>` paths with filter query strings.
pub struct RestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.storage_url.clone(),
            service_key: config.storage_service_key.clone(),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.service_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.service_key) {
            headers.insert("apikey", value);
        }
        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Storage request {} {}", method, url);

        let mut headers = self.headers();
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Storage API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::NOT_FOUND => StoreError::NotFound(error_text),
                // PostgREST surfaces exclusion/uniqueness violations as 409.
                StatusCode::CONFLICT => StoreError::RowConflict(error_text),
                _ => StoreError::Api {
                    status: status.as_u16(),
                    body: error_text,
                },
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Insert returning the stored representation.
    pub async fn insert_returning<T>(&self, table: &str, row: Value) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let rows: Vec<T> = self
            .request_with_headers(
                Method::POST,
                &format!("/rest/v1/{}", table),
                Some(row),
                Some(headers),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("insert into {} returned no rows", table)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
