use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::models::{RemoteClass, RemoteClassDraft};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote responded with status {0}")]
    Status(u16),
    #[error("class not found on remote")]
    NotFound,
    #[error("invalid remote URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Serialize)]
struct DraftEnvelope<'a> {
    gym_class: &'a RemoteClassDraft,
}

/// Client for the backend's `/classes` resource.
#[derive(Clone)]
pub struct ClassesClient {
    client: reqwest::Client,
    base_url: Arc<Url>,
    token: Option<Arc<str>>,
}

impl ClassesClient {
    pub fn new(
        base_url: Url,
        timeout: Duration,
        token: Option<String>,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Arc::new(base_url),
            token: token.filter(|t| !t.is_empty()).map(Arc::from),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&DraftEnvelope<'_>>,
    ) -> Result<reqwest::Response, RemoteError> {
        let url = self.endpoint(path)?;
        let mut builder = self.request(method.clone(), url);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let result = builder.send().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(%method, path, elapsed_ms, error = %err, "remote request failed");
                return Err(err.into());
            }
        };

        let status = response.status();
        debug!(%method, path, status = status.as_u16(), elapsed_ms, "remote request completed");

        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound);
        }
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        Ok(response)
    }

    pub async fn list_classes(&self) -> Result<Vec<RemoteClass>, RemoteError> {
        let response = self.send(Method::GET, "/classes", None).await?;
        Ok(response.json().await?)
    }

    pub async fn get_class(&self, id: i64) -> Result<RemoteClass, RemoteError> {
        let response = self.send(Method::GET, &format!("/classes/{id}"), None).await?;
        Ok(response.json().await?)
    }

    pub async fn create_class(
        &self,
        draft: &RemoteClassDraft,
    ) -> Result<RemoteClass, RemoteError> {
        let envelope = DraftEnvelope { gym_class: draft };
        let response = self.send(Method::POST, "/classes", Some(&envelope)).await?;
        Ok(response.json().await?)
    }

    pub async fn delete_class(&self, id: i64) -> Result<(), RemoteError> {
        self.send(Method::DELETE, &format!("/classes/{id}"), None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer, token: Option<&str>) -> ClassesClient {
        ClassesClient::new(
            Url::parse(&server.base_url()).unwrap(),
            Duration::from_secs(2),
            token.map(str::to_string),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_classes() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/classes");
            then.status(200).json_body(serde_json::json!([
                {"id": 1, "name": "Yoga", "teacher_name": "Maria", "start_time": "10:00"},
                {"id": 2, "name": "HIIT"}
            ]));
        });

        let classes = client_for(&server, None).list_classes().await.unwrap();

        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].teacher_name.as_deref(), Some("Maria"));
        assert_eq!(classes[1].description, None);
    }

    #[tokio::test]
    async fn test_bearer_token_attached() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/classes")
                .header("authorization", "Bearer secret");
            then.status(200).json_body(serde_json::json!([]));
        });

        client_for(&server, Some("secret"))
            .list_classes()
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn test_get_class_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/classes/9");
            then.status(404);
        });

        let err = client_for(&server, None).get_class(9).await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound));
    }

    #[tokio::test]
    async fn test_server_error_is_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/classes/3");
            then.status(503);
        });

        let err = client_for(&server, None).delete_class(3).await.unwrap_err();
        assert!(matches!(err, RemoteError::Status(503)));
    }

    #[tokio::test]
    async fn test_create_class_wraps_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/classes")
                .json_body(serde_json::json!({
                    "gym_class": {
                        "name": "Spin",
                        "description": "Cardio",
                        "teacher_name": "Rui",
                        "start_time": "18:00"
                    }
                }));
            then.status(201)
                .json_body(serde_json::json!({"id": 77, "name": "Spin"}));
        });

        let draft = RemoteClassDraft {
            name: "Spin".to_string(),
            description: "Cardio".to_string(),
            teacher_name: "Rui".to_string(),
            start_time: "18:00".to_string(),
        };
        let created = client_for(&server, None).create_class(&draft).await.unwrap();

        mock.assert();
        assert_eq!(created.id, 77);
    }

    #[test]
    fn test_endpoint_joins_base_path() {
        let client = ClassesClient::new(
            Url::parse("https://gym.example.com/api/").unwrap(),
            Duration::from_secs(1),
            None,
        )
        .unwrap();
        assert_eq!(
            client.endpoint("/classes/5").unwrap().as_str(),
            "https://gym.example.com/api/classes/5"
        );
    }
}
