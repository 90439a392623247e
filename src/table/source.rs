use std::future::Future;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::TableError;
use crate::models::TokenBody;

/// Transport between a table and its entity's paginate and delete endpoints.
pub trait PageSource: Send + Sync + 'static {
    /// `GET <uri>/paginate` with the given query pairs. Returns the raw JSON body.
    fn fetch_page(
        &self,
        uri: &str,
        query: &[(String, String)],
    ) -> impl Future<Output = Result<serde_json::Value, TableError>> + Send;

    /// `DELETE <uri>/<id>`. Returns the server's success message.
    fn delete(&self, uri: &str, id: i64) -> impl Future<Output = Result<String, TableError>> + Send;
}

#[derive(Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: String,
}

impl HttpPageSource {
    pub fn new(client: reqwest::Client, base_url: String, token: String) -> Self {
        Self { client, base_url, token }
    }

    fn url(&self, uri: &str, tail: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            uri.trim_matches('/'),
            urlencoding::encode(tail)
        )
    }
}

impl PageSource for HttpPageSource {
    async fn fetch_page(
        &self,
        uri: &str,
        query: &[(String, String)],
    ) -> Result<serde_json::Value, TableError> {
        let url = self.url(uri, "paginate");
        debug!(url = %url, "fetching page");

        let resp = self
            .client
            .get(url)
            .query(query)
            .query(&[("_token", self.token.as_str())])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(server_error(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn delete(&self, uri: &str, id: i64) -> Result<String, TableError> {
        let url = self.url(uri, &id.to_string());
        debug!(url = %url, "deleting row");

        let resp = self
            .client
            .delete(url)
            .json(&TokenBody { token: Some(self.token.clone()) })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(server_error(status, &body));
        }
        // success bodies are a JSON string, but accept plain text too
        Ok(serde_json::from_str::<String>(&body).unwrap_or(body))
    }
}

fn server_error(status: StatusCode, body: &str) -> TableError {
    let message = serde_json::from_str::<ErrorPayload>(body)
        .map(|p| p.error)
        .unwrap_or_else(|_| {
            status.canonical_reason().unwrap_or("request failed").to_string()
        });
    TableError::Server { status: status.as_u16(), message }
}
