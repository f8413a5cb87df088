use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::document::{AppId, ApplicationSpec, DeploymentAck, LiveApp};
use crate::error::ConvergeError;
use crate::scheduler::Scheduler;

/// Marathon REST accessor for `/v2/apps`.
///
/// - `GET /v2/apps/{id}`: 404 becomes `None`, the `{"app": ...}` envelope is unwrapped
/// - `POST /v2/apps`: body is the desired definition
/// - `PUT /v2/apps/{id}?force=`: body is the desired definition
/// - `DELETE /v2/apps/{id}?force=`
///
/// Non-2xx responses become `ConvergeError::Remote` carrying Marathon's
/// `message` and `details`.
pub struct MarathonClient {
    client: Client,
    endpoint: String,
    credentials: Option<(String, Option<String>)>,
}

impl MarathonClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConvergeError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ConvergeError::ClientSetup)?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            credentials: config
                .username
                .clone()
                .map(|user| (user, config.password.clone())),
        })
    }

    fn app_url(&self, id: &AppId) -> String {
        format!("{}/v2/apps/{}", self.endpoint, id.path_segment())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let req = self.client.request(method, url);
        match &self.credentials {
            Some((user, password)) => req.basic_auth(user, password.as_deref()),
            None => req,
        }
    }

    /// Send a request and read the whole body.
    async fn send(
        &self,
        id: &AppId,
        req: RequestBuilder,
    ) -> Result<(StatusCode, String), ConvergeError> {
        let transport = |source: reqwest::Error| ConvergeError::Transport {
            app_id: id.to_string(),
            endpoint: self.endpoint.clone(),
            source,
        };
        let response = req.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        Ok((status, body))
    }

    fn rejection(&self, id: &AppId, status: StatusCode, body: &str) -> ConvergeError {
        let (message, details) = parse_error_body(body);
        ConvergeError::Remote {
            app_id: id.to_string(),
            endpoint: self.endpoint.clone(),
            status: status.as_u16(),
            message,
            details,
        }
    }
}

/// Split a Marathon error body into message and details. Non-JSON bodies
/// become the message verbatim.
fn parse_error_body(body: &str) -> (String, Vec<Value>) {
    let parsed = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => return (body.trim().to_string(), Vec::new()),
    };
    let message = match parsed.get("message") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => body.trim().to_string(),
    };
    let details = match parsed.get("details") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other.clone()],
    };
    (message, details)
}

/// `GET /v2/apps/{id}` wraps the app in `{"app": ...}`; other endpoints don't.
fn unwrap_app(doc: Value) -> Value {
    match doc {
        Value::Object(mut map) if map.contains_key("app") && !map.contains_key("id") => {
            map.remove("app").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[async_trait]
impl Scheduler for MarathonClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn read(&self, id: &AppId) -> Result<Option<LiveApp>, ConvergeError> {
        let url = self.app_url(id);
        debug!(app = %id, %url, "reading app");
        let (status, body) = self.send(id, self.request(Method::GET, &url)).await?;

        if status == StatusCode::NOT_FOUND {
            debug!(app = %id, "app not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.rejection(id, status, &body));
        }
        let doc: Value = serde_json::from_str(&body)?;
        Ok(Some(LiveApp::new(unwrap_app(doc))))
    }

    async fn create(&self, spec: &ApplicationSpec) -> Result<LiveApp, ConvergeError> {
        let url = format!("{}/v2/apps", self.endpoint);
        debug!(app = %spec.id(), %url, "creating app");
        let req = self.request(Method::POST, &url).json(spec.document());
        let (status, body) = self.send(spec.id(), req).await?;

        if !status.is_success() {
            return Err(self.rejection(spec.id(), status, &body));
        }
        let doc: Value = serde_json::from_str(&body)?;
        Ok(LiveApp::new(unwrap_app(doc)))
    }

    async fn update(
        &self,
        spec: &ApplicationSpec,
        force: bool,
    ) -> Result<DeploymentAck, ConvergeError> {
        let url = self.app_url(spec.id());
        debug!(app = %spec.id(), %url, force, "updating app");
        let req = self
            .request(Method::PUT, &url)
            .query(&[("force", force)])
            .json(spec.document());
        let (status, body) = self.send(spec.id(), req).await?;

        if !status.is_success() {
            return Err(self.rejection(spec.id(), status, &body));
        }
        Ok(DeploymentAck::from_body(&body))
    }

    async fn delete(&self, id: &AppId, force: bool) -> Result<DeploymentAck, ConvergeError> {
        let url = self.app_url(id);
        debug!(app = %id, %url, force, "deleting app");
        let req = self.request(Method::DELETE, &url).query(&[("force", force)]);
        let (status, body) = self.send(id, req).await?;

        if !status.is_success() {
            return Err(self.rejection(id, status, &body));
        }
        Ok(DeploymentAck::from_body(&body))
    }
}
