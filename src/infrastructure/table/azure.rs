//! Azure Table Storage REST implementation of [`TableStore`]

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ETAG, IF_MATCH};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::auth::{format_request_date, shared_key_lite};
use super::connection::StorageAccount;
use crate::domain::table::{
    ContinuationToken, ETag, EntityPage, TableCreation, TableEntity, TableFilter, TableStore,
};
use crate::domain::DomainError;

const API_VERSION: &str = "2019-02-02";
const ACCEPT_JSON: &str = "application/json;odata=minimalmetadata";
const DATA_SERVICE_VERSION: &str = "3.0;NetFx";
const NEXT_PARTITION_KEY: &str = "x-ms-continuation-NextPartitionKey";
const NEXT_ROW_KEY: &str = "x-ms-continuation-NextRowKey";
const ERROR_CODE_HEADER: &str = "x-ms-error-code";

/// Largest `$top` the service accepts
const MAX_PAGE_SIZE: usize = 1000;

/// Error reported by the table service
#[derive(Debug, Clone)]
struct ServiceError {
    status: StatusCode,
    code: Option<String>,
    message: String,
}

impl ServiceError {
    async fn from_response(response: Response) -> Self {
        let status = response.status();
        let header_code = response
            .headers()
            .get(ERROR_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        let parsed: Option<Value> = serde_json::from_str(&body).ok();
        let error = parsed.as_ref().and_then(|v| v.get("odata.error"));
        let body_code = error
            .and_then(|e| e.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let message = error
            .and_then(|e| e.pointer("/message/value"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(body);

        Self {
            status,
            code: header_code.or(body_code),
            message,
        }
    }

    fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    fn into_domain(self, context: &str) -> DomainError {
        let detail = match self.code {
            Some(ref code) => format!("{} ({}): {}", context, code, self.message.trim()),
            None => format!("{}: {}", context, self.message.trim()),
        };

        match self.status {
            StatusCode::NOT_FOUND => DomainError::not_found(detail),
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => DomainError::conflict(detail),
            status => DomainError::storage(format!("HTTP {} - {}", status, detail)),
        }
    }
}

/// Table store backed by the Azure Table service (or a compatible emulator)
#[derive(Debug, Clone)]
pub struct AzureTableStore {
    client: Client,
    account: StorageAccount,
}

impl AzureTableStore {
    pub fn new(account: StorageAccount, timeout: Duration) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, account })
    }

    fn url(&self, resource: &str) -> Result<Url, DomainError> {
        let raw = format!("{}/{}", self.account.table_endpoint(), resource);
        Url::parse(&raw).map_err(|e| DomainError::configuration(format!("Invalid table URL '{}': {}", raw, e)))
    }

    fn entity_url(&self, table: &str, partition_key: &str, row_key: &str) -> Result<Url, DomainError> {
        self.url(&format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            table,
            encode_key(partition_key),
            encode_key(row_key)
        ))
    }

    /// Builds a signed request with the headers common to every operation
    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, DomainError> {
        let date = format_request_date(Utc::now());
        let authorization = shared_key_lite(&self.account, &date, url.path())?;

        let mut headers = HeaderMap::new();
        headers.insert("x-ms-date", header_value(&date)?);
        headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));
        headers.insert("dataserviceversion", HeaderValue::from_static(DATA_SERVICE_VERSION));
        headers.insert("maxdataserviceversion", HeaderValue::from_static(DATA_SERVICE_VERSION));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
        headers.insert(AUTHORIZATION, header_value(&authorization)?);

        Ok(self.client.request(method, url).headers(headers))
    }

    async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response, DomainError> {
        request.send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else if e.is_connect() {
                "connection failed".to_string()
            } else {
                e.to_string()
            };
            DomainError::storage(format!("{}: {}", context, reason))
        })
    }

    async fn read_entity(response: Response, context: &str) -> Result<TableEntity, DomainError> {
        let etag = response_etag(&response);
        let body: Map<String, Value> = response
            .json()
            .await
            .map_err(|e| DomainError::storage(format!("{}: failed to parse response: {}", context, e)))?;

        TableEntity::from_json(body, etag).ok_or_else(|| {
            DomainError::storage(format!("{}: response is missing PartitionKey or RowKey", context))
        })
    }
}

#[async_trait]
impl TableStore for AzureTableStore {
    async fn create_table(&self, table: &str) -> Result<TableCreation, DomainError> {
        let context = format!("Create table '{}'", table);
        let request = self
            .request(Method::POST, self.url("Tables")?)?
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return-no-content")
            .json(&json!({ "TableName": table }));

        let response = self.send(request, &context).await?;

        if response.status().is_success() {
            debug!(table = %table, "Table created");
            return Ok(TableCreation::Created);
        }

        let error = ServiceError::from_response(response).await;

        if error.status == StatusCode::CONFLICT {
            if error.has_code("TableAlreadyExists") {
                return Ok(TableCreation::AlreadyExists);
            }
            if error.has_code("TableBeingDeleted") {
                warn!(table = %table, "Table is being deleted");
                return Ok(TableCreation::BeingDeleted);
            }
        }

        Err(error.into_domain(&context))
    }

    async fn insert_entity(
        &self,
        table: &str,
        entity: &TableEntity,
    ) -> Result<TableEntity, DomainError> {
        let context = format!(
            "Insert '{}/{}' into '{}'",
            entity.partition_key, entity.row_key, table
        );
        let request = self
            .request(Method::POST, self.url(table)?)?
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return-content")
            .json(&entity.to_json());

        let response = self.send(request, &context).await?;

        if !response.status().is_success() {
            return Err(ServiceError::from_response(response)
                .await
                .into_domain(&context));
        }

        Self::read_entity(response, &context).await
    }

    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>, DomainError> {
        let context = format!("Get '{}/{}' from '{}'", partition_key, row_key, table);
        let request = self.request(
            Method::GET,
            self.entity_url(table, partition_key, row_key)?,
        )?;

        let response = self.send(request, &context).await?;

        if response.status() == StatusCode::NOT_FOUND {
            let error = ServiceError::from_response(response).await;
            if error.has_code("TableNotFound") {
                return Err(error.into_domain(&context));
            }
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(ServiceError::from_response(response)
                .await
                .into_domain(&context));
        }

        Self::read_entity(response, &context).await.map(Some)
    }

    async fn query_entities(
        &self,
        table: &str,
        filter: &TableFilter,
        page_size: usize,
        continuation: Option<ContinuationToken>,
    ) -> Result<EntityPage, DomainError> {
        let context = format!("Query '{}'", table);
        let mut url = self.url(&format!("{}()", table))?;

        let mut query = vec![format!("$top={}", page_size.clamp(1, MAX_PAGE_SIZE))];
        if let Some(expression) = filter.to_odata() {
            query.push(format!("$filter={}", urlencoding::encode(&expression)));
        }
        if let Some(token) = continuation {
            query.push(format!(
                "NextPartitionKey={}",
                urlencoding::encode(&token.next_partition_key)
            ));
            if let Some(ref row_key) = token.next_row_key {
                query.push(format!("NextRowKey={}", urlencoding::encode(row_key)));
            }
        }
        url.set_query(Some(query.join("&").as_str()));

        debug!(table = %table, query = ?url.query(), "Querying entities");

        let request = self.request(Method::GET, url)?;
        let response = self.send(request, &context).await?;

        if !response.status().is_success() {
            return Err(ServiceError::from_response(response)
                .await
                .into_domain(&context));
        }

        let continuation = continuation_token(response.headers());
        let body: Value = response
            .json()
            .await
            .map_err(|e| DomainError::storage(format!("{}: failed to parse response: {}", context, e)))?;

        let entities = match body.get("value") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .filter_map(|item| TableEntity::from_json(item, None))
                .collect(),
            _ => {
                return Err(DomainError::storage(format!(
                    "{}: response has no 'value' array",
                    context
                )));
            }
        };

        Ok(EntityPage {
            entities,
            continuation,
        })
    }

    async fn replace_entity(
        &self,
        table: &str,
        entity: &TableEntity,
        etag: &ETag,
    ) -> Result<ETag, DomainError> {
        let context = format!(
            "Replace '{}/{}' in '{}'",
            entity.partition_key, entity.row_key, table
        );
        let request = self
            .request(
                Method::PUT,
                self.entity_url(table, &entity.partition_key, &entity.row_key)?,
            )?
            .header(CONTENT_TYPE, "application/json")
            .header(IF_MATCH, header_value(etag.as_str())?)
            .json(&entity.to_json());

        let response = self.send(request, &context).await?;

        if !response.status().is_success() {
            return Err(ServiceError::from_response(response)
                .await
                .into_domain(&context));
        }

        response_etag(&response).ok_or_else(|| {
            DomainError::storage(format!("{}: response has no ETag header", context))
        })
    }

    async fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<bool, DomainError> {
        let context = format!("Delete '{}/{}' from '{}'", partition_key, row_key, table);
        let request = self
            .request(
                Method::DELETE,
                self.entity_url(table, partition_key, row_key)?,
            )?
            .header(IF_MATCH, "*");

        let response = self.send(request, &context).await?;

        if response.status() == StatusCode::NOT_FOUND {
            let error = ServiceError::from_response(response).await;
            // A missing table is a real failure, a missing entity is not
            if error.has_code("TableNotFound") {
                return Err(error.into_domain(&context));
            }
            return Ok(false);
        }

        if !response.status().is_success() {
            return Err(ServiceError::from_response(response)
                .await
                .into_domain(&context));
        }

        Ok(true)
    }
}

/// Escapes a key for use inside a quoted OData key predicate in the URL path
fn encode_key(key: &str) -> String {
    urlencoding::encode(&key.replace('\'', "''")).into_owned()
}

fn header_value(value: &str) -> Result<HeaderValue, DomainError> {
    HeaderValue::from_str(value)
        .map_err(|e| DomainError::validation(format!("Invalid header value '{}': {}", value, e)))
}

fn response_etag(response: &Response) -> Option<ETag> {
    response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(ETag::new)
}

fn continuation_token(headers: &HeaderMap) -> Option<ContinuationToken> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    header(NEXT_PARTITION_KEY).map(|next_partition_key| ContinuationToken {
        next_partition_key,
        next_row_key: header(NEXT_ROW_KEY),
    })
}
