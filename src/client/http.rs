//! reqwest-backed implementation of the cluster client
//!
//! The client is constructed once per invocation from a [`ClientConfig`]
//! derived from the parsed target configuration. Headers are never memoized
//! at process start; each invocation carries its own set.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{AlertDestinationSpec, MonitorSpec, TargetConfiguration};
use crate::error::Error;

use super::{payload, CatIndex, ClusterClient, Destination, MonitorHit};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Header required by the dashboards surface on state-changing calls
const XSRF_HEADER: &str = "osd-xsrf";

/// Per-invocation connection settings for the cluster
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Cluster administrative endpoint URL
    pub endpoint: String,
    /// Headers applied to every request
    pub headers: BTreeMap<String, String>,
    /// Optional basic-auth credentials
    pub basic_auth: Option<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            endpoint: String::new(),
            headers,
            basic_auth: None,
        }
    }
}

impl ClientConfig {
    /// Derive connection settings from a parsed target configuration
    pub fn from_target(config: &TargetConfiguration) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            headers: config.headers.clone(),
            basic_auth: None,
        }
    }
}

/// Cluster client speaking the administrative HTTP surface via reqwest
pub struct HttpClusterClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpClusterClient {
    /// Build a client for one invocation
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the underlying TLS/connection pool cannot
    /// be constructed.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str, dashboard: bool) -> RequestBuilder {
        let mut builder = self.http.request(method, self.url(path));
        for (name, value) in &self.config.headers {
            builder = builder.header(name, value);
        }
        if dashboard && !self.config.headers.contains_key(XSRF_HEADER) {
            builder = builder.header(XSRF_HEADER, "true");
        }
        if let Some((user, pass)) = &self.config.basic_auth {
            builder = builder.basic_auth(user, Some(pass));
        }
        builder
    }

    /// Interpret a mutating call: 2xx is success, anything else a rejection
    async fn expect_ok(&self, path: &str, response: Response) -> Result<(), Error> {
        let status = response.status();
        if status.is_success() {
            debug!(path, status = status.as_u16(), "cluster call succeeded");
            Ok(())
        } else {
            warn!(path, status = status.as_u16(), "cluster rejected request");
            Err(Error::rejected(status))
        }
    }

    /// Interpret a lookup call: 2xx yields the body, anything else absence
    async fn lookup_json(&self, path: &str, response: Response) -> Result<Option<Value>, Error> {
        let status = response.status();
        if !status.is_success() {
            debug!(path, status = status.as_u16(), "lookup returned no result");
            return Ok(None);
        }
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| Error::serialization(e.to_string()))?;
        Ok(Some(body))
    }
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    async fn cat_indices(&self) -> Result<Vec<CatIndex>, Error> {
        let path = "_cat/indices?format=json&h=index,docs.count";
        let response = self.request(Method::GET, path, false).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::rejected(status));
        }
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| Error::serialization(e.to_string()))?;
        Ok(parse_cat_indices(&body))
    }

    async fn create_index<'a>(
        &self,
        name: &str,
        mappings: Option<&'a Value>,
    ) -> Result<(), Error> {
        let response = self
            .request(Method::PUT, name, false)
            .json(&payload::index_settings(mappings))
            .send()
            .await?;
        self.expect_ok(name, response).await
    }

    async fn delete_index(&self, name: &str) -> Result<(), Error> {
        let response = self.request(Method::DELETE, name, false).send().await?;
        self.expect_ok(name, response).await
    }

    async fn start_reindex(&self, source: &str, destination: &str) -> Result<(), Error> {
        let response = self
            .request(Method::POST, "_reindex", false)
            .json(&payload::reindex(source, destination))
            .send()
            .await?;
        self.expect_ok("_reindex", response).await
    }

    async fn delete_documents(&self, index: &str, range: &Value) -> Result<(), Error> {
        let path = format!("{index}/_delete_by_query");
        let response = self
            .request(Method::POST, &path, false)
            .json(&payload::delete_by_query(range))
            .send()
            .await?;
        self.expect_ok(&path, response).await
    }

    async fn find_destination(&self, name: &str) -> Result<Option<Destination>, Error> {
        let path = "_plugins/_alerting/destinations";
        let response = self.request(Method::GET, path, false).send().await?;
        let Some(body) = self.lookup_json(path, response).await? else {
            return Ok(None);
        };
        Ok(parse_destination(&body, name))
    }

    async fn create_destination(
        &self,
        spec: &AlertDestinationSpec,
        update: bool,
    ) -> Result<(), Error> {
        let path = "_plugins/_alerting/destinations";
        let method = if update { Method::PUT } else { Method::POST };
        let response = self
            .request(method, path, false)
            .json(&payload::destination(spec))
            .send()
            .await?;
        self.expect_ok(path, response).await
    }

    async fn find_monitor(&self, name: &str) -> Result<Option<MonitorHit>, Error> {
        let path = "_plugins/_alerting/monitors/_search";
        let response = self
            .request(Method::GET, path, false)
            .json(&payload::monitor_search(name))
            .send()
            .await?;
        let Some(body) = self.lookup_json(path, response).await? else {
            return Ok(None);
        };
        Ok(parse_monitor_hit(&body))
    }

    async fn put_monitor<'a>(
        &self,
        spec: &MonitorSpec,
        index: &str,
        destination_id: &str,
        monitor_id: Option<&'a str>,
    ) -> Result<(), Error> {
        let (method, path) = match monitor_id {
            Some(id) => (Method::PUT, format!("_plugins/_alerting/monitors/{id}")),
            None => (Method::POST, "_plugins/_alerting/monitors".to_string()),
        };
        let response = self
            .request(method, &path, false)
            .json(&payload::monitor(spec, index, destination_id))
            .send()
            .await?;
        self.expect_ok(&path, response).await
    }

    async fn get_index_pattern(&self, id: &str) -> Result<Option<String>, Error> {
        let path = format!("_dashboards/api/saved_objects/index-pattern/{id}");
        let response = self.request(Method::GET, &path, true).send().await?;
        let Some(body) = self.lookup_json(&path, response).await? else {
            return Ok(None);
        };
        Ok(saved_object_id(&body))
    }

    async fn put_index_pattern(&self, id: &str, title: &str, update: bool) -> Result<(), Error> {
        let path = format!("_dashboards/api/saved_objects/index-pattern/{id}");
        let method = if update { Method::PUT } else { Method::POST };
        let response = self
            .request(method, &path, true)
            .json(&payload::saved_object(title))
            .send()
            .await?;
        self.expect_ok(&path, response).await
    }

    async fn get_dashboard(&self, title: &str) -> Result<Option<String>, Error> {
        let path = format!("_dashboards/api/saved_objects/dashboard/{title}");
        let response = self.request(Method::GET, &path, true).send().await?;
        let Some(body) = self.lookup_json(&path, response).await? else {
            return Ok(None);
        };
        Ok(saved_object_id(&body))
    }

    async fn put_dashboard(&self, title: &str, update: bool) -> Result<(), Error> {
        let path = format!("_dashboards/api/saved_objects/dashboard/{title}");
        let method = if update { Method::PUT } else { Method::POST };
        let response = self
            .request(method, &path, true)
            .json(&payload::saved_object(title))
            .send()
            .await?;
        self.expect_ok(&path, response).await
    }
}

fn parse_cat_indices(body: &Value) -> Vec<CatIndex> {
    body.as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let index = row.get("index")?.as_str()?.to_string();
                    let docs_count = row
                        .get("docs.count")
                        .and_then(Value::as_str)
                        .and_then(|count| count.parse::<u64>().ok());
                    Some(CatIndex { index, docs_count })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_destination(body: &Value, name: &str) -> Option<Destination> {
    body.get("destinations")?
        .as_array()?
        .iter()
        .find(|d| d.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|d| {
            Some(Destination {
                id: d.get("id")?.as_str()?.to_string(),
                name: name.to_string(),
            })
        })
}

fn parse_monitor_hit(body: &Value) -> Option<MonitorHit> {
    let id = body
        .pointer("/hits/hits/0/_id")
        .and_then(Value::as_str)?
        .to_string();
    Some(MonitorHit { id })
}

fn saved_object_id(body: &Value) -> Option<String> {
    body.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
}
