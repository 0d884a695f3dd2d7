use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::types::{
    AskRequest, AskResponse, HistoryEntry, LoginRequest, LoginResponse, Product, SaveAck,
    SaveRequest,
};
use crate::error::ApiError;

/// Seam for the Ask collaborator.
#[async_trait]
pub trait AskService: Send + Sync + 'static {
    async fn ask(&self, query: &str, context_product_id: Option<i64>)
        -> Result<AskResponse, ApiError>;
}

/// Seam for the Save collaborator.
#[async_trait]
pub trait SaveService: Send + Sync + 'static {
    async fn save(&self, request: SaveRequest) -> Result<SaveAck, ApiError>;
}

#[derive(Clone)]
pub struct InsightClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl InsightClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Shared response screening: 401 is reported separately so the caller
    /// can tear the session down.
    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    pub async fn ask(
        &self,
        query: &str,
        context_product_id: Option<i64>,
    ) -> Result<AskResponse, ApiError> {
        let request = AskRequest {
            query: query.to_string(),
            context_product_id,
        };
        debug!(?context_product_id, "POST /chat/ask");

        let response = self
            .authed(self.client.post(self.url("/chat/ask")))
            .json(&request)
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    pub async fn save_report(&self, request: &SaveRequest) -> Result<SaveAck, ApiError> {
        debug!(product_id = ?request.product_id, "POST /chat/save");
        let response = self
            .authed(self.client.post(self.url("/chat/save")))
            .json(request)
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        let response = self
            .authed(self.client.get(self.url("/analytics/products")))
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        let response = self
            .authed(self.client.get(self.url("/chat/history")))
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Exchange credentials for a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let response = Self::check(response).await?;
        let login: LoginResponse = response.json().await?;
        match (login.access_token, login.error) {
            (Some(token), _) => Ok(token),
            (None, Some(error)) => Err(ApiError::Rejected(error)),
            (None, None) => Err(ApiError::Decode("login response carried no token".to_string())),
        }
    }
}

#[async_trait]
impl AskService for InsightClient {
    async fn ask(
        &self,
        query: &str,
        context_product_id: Option<i64>,
    ) -> Result<AskResponse, ApiError> {
        InsightClient::ask(self, query, context_product_id).await
    }
}

#[async_trait]
impl SaveService for InsightClient {
    async fn save(&self, request: SaveRequest) -> Result<SaveAck, ApiError> {
        self.save_report(&request).await
    }
}
