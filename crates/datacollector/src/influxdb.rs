// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! [`StorageClient`] backed by the InfluxDB v2 HTTP API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::errors::StorageError;
use crate::point::MetricPoint;
use crate::storage::{Provisioning, StorageClient};

#[derive(Debug, Clone)]
pub struct InfluxDbConfig {
    /// Base URL, e.g. `http://influxdb2:8086`
    pub url: String,
    pub token: String,
    pub org: String,
    pub timeout: Duration,
}

#[derive(Debug)]
pub struct InfluxDbClient {
    client: reqwest::Client,
    base_url: String,
    org: String,
    timeout: Duration,
    org_id: OnceCell<String>,
}

#[derive(Deserialize)]
struct Organizations {
    #[serde(default)]
    orgs: Vec<Organization>,
}

#[derive(Deserialize)]
struct Organization {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
}

impl InfluxDbClient {
    pub fn new(config: InfluxDbConfig) -> Result<Self, StorageError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Token {}", config.token))
            .map_err(|_| StorageError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(InfluxDbClient {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            org: config.org,
            timeout: config.timeout,
            org_id: OnceCell::new(),
        })
    }

    async fn org_id(&self) -> Result<&str, StorageError> {
        self.org_id
            .get_or_try_init::<StorageError, _, _>(|| async {
                let resp = self
                    .client
                    .get(format!("{}/api/v2/orgs", self.base_url))
                    .query(&[("org", self.org.as_str())])
                    .send()
                    .await?;
                let resp = error_for_status(resp).await?;
                let orgs: Organizations = resp.json().await?;
                orgs.orgs
                    .into_iter()
                    .find(|o| o.name == self.org)
                    .map(|o| o.id)
                    .ok_or_else(|| StorageError::OrganizationNotFound(self.org.clone()))
            })
            .await
            .map(String::as_str)
    }
}

#[async_trait]
impl StorageClient for InfluxDbClient {
    async fn ensure_destination(&self, name: &str) -> Result<Provisioning, StorageError> {
        let org_id = self.org_id().await?;
        debug!("Ensuring bucket '{name}' exists");
        let resp = self
            .client
            .post(format!("{}/api/v2/buckets", self.base_url))
            .json(&serde_json::json!({
                "orgID": org_id,
                "name": name,
                "retentionRules": [],
            }))
            .send()
            .await?;

        match resp.status() {
            status if status.is_success() => {
                info!("Bucket '{name}' created");
                Ok(Provisioning::Created)
            }
            StatusCode::CONFLICT => Ok(Provisioning::AlreadyExists),
            status @ StatusCode::UNPROCESSABLE_ENTITY => {
                let body = resp.text().await.unwrap_or_default();
                let is_conflict = serde_json::from_str::<ApiError>(&body)
                    .map(|e| e.code == "conflict")
                    .unwrap_or(false)
                    || body.contains("already exists");
                if is_conflict {
                    Ok(Provisioning::AlreadyExists)
                } else {
                    Err(StorageError::Status { status, body })
                }
            }
            status => Err(StorageError::Status {
                status,
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn write_batch(
        &self,
        destination: &str,
        points: &[MetricPoint],
    ) -> Result<(), StorageError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = points
            .iter()
            .map(MetricPoint::to_line_protocol)
            .collect::<Vec<_>>()
            .join("\n");

        let resp = self
            .client
            .post(format!("{}/api/v2/write", self.base_url))
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", destination),
                ("precision", "ns"),
            ])
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;
        error_for_status(resp).await?;
        Ok(())
    }
}

async fn error_for_status(resp: Response) -> Result<Response, StorageError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(StorageError::Status {
            status,
            body: resp.text().await.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(url: String) -> InfluxDbClient {
        InfluxDbClient::new(InfluxDbConfig {
            url,
            token: "admin-token".to_string(),
            org: "org".to_string(),
            timeout: Duration::from_secs(1),
        })
        .expect("client builds")
    }

    async fn mock_orgs(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/api/v2/orgs")
            .match_query(Matcher::UrlEncoded("org".into(), "org".into()))
            .match_header("Authorization", "Token admin-token")
            .with_status(200)
            .with_body(r#"{"orgs":[{"id":"0123abcd","name":"org"}]}"#)
            .expect(1)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_ensure_destination_creates_bucket() {
        let mut server = Server::new_async().await;
        let orgs = mock_orgs(&mut server).await;
        let create = server
            .mock("POST", "/api/v2/buckets")
            .match_body(Matcher::PartialJson(
                serde_json::json!({"orgID": "0123abcd", "name": "w1"}),
            ))
            .with_status(201)
            .with_body(r#"{"id":"b1","name":"w1"}"#)
            .create_async()
            .await;

        let client = client(server.url());
        assert_eq!(
            client.ensure_destination("w1").await.unwrap(),
            Provisioning::Created
        );
        orgs.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_ensure_destination_already_exists() {
        let mut server = Server::new_async().await;
        let orgs = mock_orgs(&mut server).await;
        let _create = server
            .mock("POST", "/api/v2/buckets")
            .with_status(422)
            .with_body(r#"{"code":"conflict","message":"bucket with name w1 already exists"}"#)
            .expect(2)
            .create_async()
            .await;

        let client = client(server.url());
        assert_eq!(
            client.ensure_destination("w1").await.unwrap(),
            Provisioning::AlreadyExists
        );
        assert_eq!(
            client.ensure_destination("w1").await.unwrap(),
            Provisioning::AlreadyExists
        );
        // org id is looked up only once
        orgs.assert_async().await;
    }

    #[tokio::test]
    async fn test_ensure_destination_unknown_org() {
        let mut server = Server::new_async().await;
        let _orgs = server
            .mock("GET", "/api/v2/orgs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"orgs":[]}"#)
            .create_async()
            .await;

        let client = client(server.url());
        assert!(matches!(
            client.ensure_destination("w1").await,
            Err(StorageError::OrganizationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_destination_server_error() {
        let mut server = Server::new_async().await;
        let _orgs = mock_orgs(&mut server).await;
        let _create = server
            .mock("POST", "/api/v2/buckets")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = client(server.url());
        match client.ensure_destination("w1").await {
            Err(StorageError::Status { status, body }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_batch_sends_line_protocol() {
        let mut server = Server::new_async().await;
        let write = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("org".into(), "org".into()),
                Matcher::UrlEncoded("bucket".into(), "w1".into()),
                Matcher::UrlEncoded("precision".into(), "ns".into()),
            ]))
            .match_header("Authorization", "Token admin-token")
            .match_body("fps,user=abc value=72 10\nvr,user=abc value=true 10")
            .with_status(204)
            .create_async()
            .await;

        let points = vec![
            MetricPoint::measurement("fps")
                .tag("user", "abc")
                .field("value", 72.0)
                .timestamp(10),
            MetricPoint::measurement("vr")
                .tag("user", "abc")
                .field("value", true)
                .timestamp(10),
        ];
        client(server.url())
            .write_batch("w1", &points)
            .await
            .unwrap();
        write.assert_async().await;
    }

    #[tokio::test]
    async fn test_write_batch_failure() {
        let mut server = Server::new_async().await;
        let _write = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let points = vec![MetricPoint::measurement("fps").field("value", 1.0)];
        assert!(matches!(
            client(server.url()).write_batch("w1", &points).await,
            Err(StorageError::Status { status: StatusCode::SERVICE_UNAVAILABLE, .. })
        ));
    }

    #[tokio::test]
    async fn test_write_empty_batch_is_noop() {
        let client = client("http://127.0.0.1:1".to_string());
        assert!(client.write_batch("w1", &[]).await.is_ok());
    }
}
