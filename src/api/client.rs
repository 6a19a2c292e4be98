//! HTTP access to the worksheet server.
//!
//! [`WorksheetApi`] is the seam the rest of the crate talks to; the
//! production implementation is [`RestClient`], built on `reqwest`. Tests
//! substitute an in-memory fake.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::{
    AddItemsRequest, ApiError, CliCommandRequest, CliCommandResponse, JsonApiDocument,
    UserDocument, UserInfo, WorksheetPayload,
};
use crate::utils::url::construct_api_url;

#[async_trait]
pub trait WorksheetApi: Send + Sync {
    /// Full interpreted worksheet. `brief` skips the expensive derivations.
    async fn fetch_worksheet(&self, uuid: &str, brief: bool)
        -> Result<WorksheetPayload, ApiError>;

    /// Same endpoint filtered to the listed bundle uuids. Unchanged blocks
    /// and rows come back as `null`.
    async fn fetch_partial(
        &self,
        uuid: &str,
        bundle_uuids: &[String],
    ) -> Result<WorksheetPayload, ApiError>;

    async fn save_raw_source(&self, uuid: &str, lines: &[String]) -> Result<(), ApiError>;

    async fn delete_worksheet(&self, uuid: &str) -> Result<(), ApiError>;

    async fn add_items(&self, uuid: &str, request: &AddItemsRequest) -> Result<(), ApiError>;

    async fn update_worksheet_fields(
        &self,
        uuid: &str,
        attributes: Map<String, Value>,
    ) -> Result<(), ApiError>;

    async fn update_bundle_metadata(
        &self,
        uuid: &str,
        metadata: Map<String, Value>,
    ) -> Result<(), ApiError>;

    async fn execute_command(
        &self,
        worksheet_uuid: &str,
        command: &str,
        autocomplete: bool,
    ) -> Result<CliCommandResponse, ApiError>;

    async fn fetch_user(&self) -> Result<UserInfo, ApiError>;
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = construct_api_url(&self.base_url, endpoint);
        let request = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn interpret(&self, uuid: &str, query: &[(&str, &str)]) -> Result<WorksheetPayload, ApiError> {
        let endpoint = format!("rest/interpret/worksheet/{uuid}");
        let response = self.request(Method::GET, &endpoint).query(query).send().await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl WorksheetApi for RestClient {
    async fn fetch_worksheet(
        &self,
        uuid: &str,
        brief: bool,
    ) -> Result<WorksheetPayload, ApiError> {
        debug!(%uuid, brief, "Fetching worksheet");
        let query: &[(&str, &str)] = if brief { &[("brief", "1")] } else { &[] };
        self.interpret(uuid, query).await
    }

    async fn fetch_partial(
        &self,
        uuid: &str,
        bundle_uuids: &[String],
    ) -> Result<WorksheetPayload, ApiError> {
        debug!(%uuid, bundles = bundle_uuids.len(), "Fetching partial worksheet");
        let query: Vec<(&str, &str)> = bundle_uuids
            .iter()
            .map(|bundle| ("uuid", bundle.as_str()))
            .collect();
        self.interpret(uuid, &query).await
    }

    async fn save_raw_source(&self, uuid: &str, lines: &[String]) -> Result<(), ApiError> {
        debug!(%uuid, lines = lines.len(), "Saving raw source");
        let endpoint = format!("rest/worksheets/{uuid}/raw");
        let response = self
            .request(Method::POST, &endpoint)
            .header("Content-Type", "text/plain")
            .body(lines.join("\n"))
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    async fn delete_worksheet(&self, uuid: &str) -> Result<(), ApiError> {
        debug!(%uuid, "Deleting worksheet");
        let body = JsonApiDocument::single(uuid, "worksheets", None);
        let response = self
            .request(Method::DELETE, "rest/worksheets")
            .query(&[("force", "1")])
            .json(&body)
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    async fn add_items(&self, uuid: &str, request: &AddItemsRequest) -> Result<(), ApiError> {
        debug!(
            %uuid,
            item_type = %request.item_type,
            items = request.items.len(),
            after_sort_key = ?request.after_sort_key,
            "Adding worksheet items"
        );
        let endpoint = format!("rest/worksheets/{uuid}/add-items");
        let response = self
            .request(Method::POST, &endpoint)
            .json(request)
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    async fn update_worksheet_fields(
        &self,
        uuid: &str,
        attributes: Map<String, Value>,
    ) -> Result<(), ApiError> {
        let body = JsonApiDocument::single(uuid, "worksheets", Some(attributes));
        let response = self
            .request(Method::PATCH, "rest/worksheets")
            .json(&body)
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    async fn update_bundle_metadata(
        &self,
        uuid: &str,
        metadata: Map<String, Value>,
    ) -> Result<(), ApiError> {
        let mut attributes = Map::new();
        attributes.insert("metadata".to_string(), Value::Object(metadata));
        let body = JsonApiDocument::single(uuid, "bundles", Some(attributes));
        let response = self
            .request(Method::PATCH, "rest/bundles")
            .json(&body)
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    async fn execute_command(
        &self,
        worksheet_uuid: &str,
        command: &str,
        autocomplete: bool,
    ) -> Result<CliCommandResponse, ApiError> {
        debug!(%worksheet_uuid, %command, autocomplete, "Executing CLI command");
        let body = CliCommandRequest {
            worksheet_uuid,
            command,
            autocomplete,
        };
        let response = self
            .request(Method::POST, "rest/cli/command")
            .json(&body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn fetch_user(&self) -> Result<UserInfo, ApiError> {
        let response = self.request(Method::GET, "rest/user").send().await?;
        let document: UserDocument = Self::decode(response).await?;
        Ok(document.into())
    }
}
