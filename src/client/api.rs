use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::db::models::{LanguageCount, Snippet, SnippetFilter, SnippetInput, SnippetQuery, TagWithCount};
use crate::web::models::{ApiResponse, FavouriteToggleResponse, PageResponse, ToggleFavouriteRequest};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Server answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Response carried no data")]
    MissingData,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The snippet endpoints as the client sees them.
#[async_trait]
pub trait SnippetApi: Send + Sync {
    async fn list_snippets(
        &self,
        filter: SnippetFilter,
        query: &SnippetQuery,
    ) -> Result<PageResponse<Snippet>, ApiError>;
    async fn create_snippet(&self, input: &SnippetInput) -> Result<Snippet, ApiError>;
    async fn update_snippet(&self, snippet_id: i32, input: &SnippetInput) -> Result<Snippet, ApiError>;
    async fn delete_snippet(&self, snippet_id: i32) -> Result<(), ApiError>;
    async fn toggle_favourite(&self, snippet_id: i32) -> Result<FavouriteToggleResponse, ApiError>;
    async fn archive_snippet(&self, snippet_id: i32) -> Result<Snippet, ApiError>;
    async fn restore_snippet(&self, snippet_id: i32) -> Result<Snippet, ApiError>;
    async fn get_shared_snippet(&self, share_id: &str) -> Result<Snippet, ApiError>;
    async fn list_tags(&self) -> Result<Vec<TagWithCount>, ApiError>;
    async fn list_languages(&self) -> Result<Vec<LanguageCount>, ApiError>;
}

fn into_data<T>(envelope: ApiResponse<T>) -> Result<T, ApiError> {
    envelope.data.ok_or(ApiError::MissingData)
}

/// [`SnippetApi`] over HTTP with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpSnippetApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpSnippetApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, token)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        HttpSnippetApi {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiResponse<serde_json::Value>>().await {
                Ok(ApiResponse { error: Some(error), .. }) => error,
                _ => status.canonical_reason().unwrap_or("request failed").to_string(),
            };
            warn!(status = status.as_u16(), %message, "Snippet API request failed.");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        debug!(status = status.as_u16(), "Snippet API request succeeded.");
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl SnippetApi for HttpSnippetApi {
    async fn list_snippets(
        &self,
        filter: SnippetFilter,
        query: &SnippetQuery,
    ) -> Result<PageResponse<Snippet>, ApiError> {
        self.send(self.client.get(self.url(filter.api_path())).query(query)).await
    }

    async fn create_snippet(&self, input: &SnippetInput) -> Result<Snippet, ApiError> {
        let envelope: ApiResponse<Snippet> = self
            .send(self.client.post(self.url("/api/snippets")).json(input))
            .await?;
        into_data(envelope)
    }

    async fn update_snippet(&self, snippet_id: i32, input: &SnippetInput) -> Result<Snippet, ApiError> {
        let envelope: ApiResponse<Snippet> = self
            .send(
                self.client
                    .put(self.url(&format!("/api/snippets/{snippet_id}")))
                    .json(input),
            )
            .await?;
        into_data(envelope)
    }

    async fn delete_snippet(&self, snippet_id: i32) -> Result<(), ApiError> {
        let _: ApiResponse<serde_json::Value> = self
            .send(self.client.delete(self.url(&format!("/api/snippets/{snippet_id}"))))
            .await?;
        Ok(())
    }

    async fn toggle_favourite(&self, snippet_id: i32) -> Result<FavouriteToggleResponse, ApiError> {
        let body = ToggleFavouriteRequest {
            snippet_id: Some(snippet_id),
        };
        self.send(
            self.client
                .patch(self.url(&format!("/api/snippets/{snippet_id}")))
                .json(&body),
        )
        .await
    }

    async fn archive_snippet(&self, snippet_id: i32) -> Result<Snippet, ApiError> {
        let envelope: ApiResponse<Snippet> = self
            .send(self.client.patch(self.url(&format!("/api/snippets/trash/{snippet_id}"))))
            .await?;
        into_data(envelope)
    }

    async fn restore_snippet(&self, snippet_id: i32) -> Result<Snippet, ApiError> {
        let envelope: ApiResponse<Snippet> = self
            .send(
                self.client
                    .patch(self.url(&format!("/api/snippets/trash/restore/{snippet_id}"))),
            )
            .await?;
        into_data(envelope)
    }

    async fn get_shared_snippet(&self, share_id: &str) -> Result<Snippet, ApiError> {
        let envelope: ApiResponse<Snippet> = self
            .send(self.client.get(self.url(&format!("/api/snippets/share/{share_id}"))))
            .await?;
        into_data(envelope)
    }

    async fn list_tags(&self) -> Result<Vec<TagWithCount>, ApiError> {
        let envelope: ApiResponse<Vec<TagWithCount>> =
            self.send(self.client.get(self.url("/api/tags"))).await?;
        into_data(envelope)
    }

    async fn list_languages(&self) -> Result<Vec<LanguageCount>, ApiError> {
        let envelope: ApiResponse<Vec<LanguageCount>> =
            self.send(self.client.get(self.url("/api/languages"))).await?;
        into_data(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let api = HttpSnippetApi::new("http://localhost:8080/", "t");
        assert_eq!(api.url("/api/tags"), "http://localhost:8080/api/tags");
    }

    #[test]
    fn status_errors_expose_the_code() {
        let err = ApiError::Status {
            status: 404,
            message: "Snippet not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(ApiError::MissingData.status(), None);
    }
}
