//! Blocking HTTP client for the Datadog v1 API.
//!
//! Implements [`reconcile::Api`]. The endpoints disagree about envelopes:
//! monitors come back bare, dashboards and synthetic tests are wrapped in a
//! named list, and SLOs wrap everything in `data` (a list even for a single
//! create or update). [`unwrap_list`] and [`unwrap_object`] undo that so the
//! engine only ever sees plain objects.

use crate::error::{Error, Result};
use reconcile::{Api, ProviderId, ResourceKind};
use serde_json::{Value, json};
use std::time::Duration;

/// Default Datadog site.
pub const DEFAULT_SITE: &str = "datadoghq.com";

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 500;

const TIMEOUT: Duration = Duration::from_secs(60);

/// Datadog API client.
///
/// # Example
///
/// ```no_run
/// use ddapi::DatadogClient;
/// use reconcile::{Api, ResourceKind};
///
/// let client = DatadogClient::new("datadoghq.com", "api-key", "app-key").unwrap();
/// let monitors = client.list(ResourceKind::Monitor).unwrap();
/// println!("{} monitors", monitors.len());
/// ```
pub struct DatadogClient {
    agent: ureq::Agent,
    api_base: String,
    api_key: String,
    app_key: String,
}

impl DatadogClient {
    /// Create a client for `site`, e.g. "datadoghq.eu".
    pub fn new(site: &str, api_key: &str, app_key: &str) -> Result<Self> {
        Self::with_api_base(format!("https://api.{site}"), api_key, app_key)
    }

    /// Create a client with a custom API base (for proxies and tests).
    pub fn with_api_base(
        api_base: impl Into<String>,
        api_key: &str,
        app_key: &str,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::MissingCredentials("DATADOG_API_KEY"));
        }
        if app_key.is_empty() {
            return Err(Error::MissingCredentials("DATADOG_APP_KEY"));
        }

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(TIMEOUT))
            .build()
            .into();

        Ok(Self {
            agent,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            app_key: app_key.to_string(),
        })
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn collection_url(&self, kind: ResourceKind) -> String {
        format!("{}/api/v1/{}", self.api_base, kind.api_resource())
    }

    fn object_url(&self, kind: ResourceKind, id: &ProviderId) -> String {
        format!("{}/{id}", self.collection_url(kind))
    }

    fn get(&self, url: &str) -> Result<Value> {
        log::debug!("GET {url}");
        let response = self
            .agent
            .get(url)
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
            .call()?;
        read_reply(response)
    }

    fn send(&self, method: &str, url: &str, body: &Value) -> Result<Value> {
        log::debug!("{method} {url}");
        let request = match method {
            "PUT" => self.agent.put(url),
            _ => self.agent.post(url),
        };
        let response = request
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
            .send_json(body)?;
        read_reply(response)
    }

    fn remove(&self, url: &str) -> Result<Value> {
        log::debug!("DELETE {url}");
        let response = self
            .agent
            .delete(url)
            .query("force", "true")
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
            .call()?;
        read_reply(response)
    }
}

/// Read a reply, turning a non-success status into an error that quotes the body.
fn read_reply(mut response: ureq::http::Response<ureq::Body>) -> Result<Value> {
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string()?;

    if !(200..300).contains(&status) {
        return Err(Error::http(
            format!("HTTP {status}: {}", truncate(&body, MAX_ERROR_BODY)),
            Some(status),
        ));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Extract the object list from a `list` reply.
pub fn unwrap_list(kind: ResourceKind, reply: Value) -> Result<Vec<Value>> {
    let list = match kind {
        ResourceKind::Monitor => reply,
        ResourceKind::Dashboard => field(reply, "dashboards")?,
        ResourceKind::Slo => field(reply, "data")?,
        ResourceKind::SyntheticTest => field(reply, "tests")?,
    };
    match list {
        Value::Array(items) => Ok(items),
        other => Err(Error::InvalidResponse(format!(
            "expected a list of {}, got {other}",
            kind.api_resource()
        ))),
    }
}

/// Extract the single object from a `show`, `create` or `update` reply.
pub fn unwrap_object(kind: ResourceKind, reply: Value) -> Result<Value> {
    let object = match kind {
        ResourceKind::Slo => match field(reply, "data")? {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            Value::Array(_) => {
                return Err(Error::InvalidResponse("empty slo data".to_string()));
            }
            other => other,
        },
        _ => reply,
    };
    if object.is_object() {
        Ok(object)
    } else {
        Err(Error::InvalidResponse(format!(
            "expected a {} object, got {object}",
            kind.api_resource()
        )))
    }
}

fn field(mut reply: Value, key: &str) -> Result<Value> {
    reply
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| Error::InvalidResponse(format!("reply has no {key:?} field")))
}

impl Api for DatadogClient {
    fn list(&self, kind: ResourceKind) -> reconcile::Result<Vec<Value>> {
        self.get(&self.collection_url(kind))
            .and_then(|reply| unwrap_list(kind, reply))
            .map_err(|e| e.into_engine("list", kind, None))
    }

    fn show(&self, kind: ResourceKind, id: &ProviderId) -> reconcile::Result<Value> {
        let subject = id.to_string();
        self.get(&self.object_url(kind, id))
            .and_then(|reply| unwrap_object(kind, reply))
            .map_err(|e| e.into_engine("show", kind, Some(&subject)))
    }

    fn create(&self, kind: ResourceKind, payload: &Value) -> reconcile::Result<Value> {
        self.send("POST", &self.collection_url(kind), payload)
            .and_then(|reply| unwrap_object(kind, reply))
            .map_err(|e| e.into_engine("create", kind, None))
    }

    fn update(
        &self,
        kind: ResourceKind,
        id: &ProviderId,
        payload: &Value,
    ) -> reconcile::Result<Value> {
        let subject = id.to_string();
        self.send("PUT", &self.object_url(kind, id), payload)
            .and_then(|reply| unwrap_object(kind, reply))
            .map_err(|e| e.into_engine("update", kind, Some(&subject)))
    }

    fn delete(&self, kind: ResourceKind, id: &ProviderId) -> reconcile::Result<()> {
        let subject = id.to_string();
        // synthetic tests are deleted in bulk by public id
        let result = match kind {
            ResourceKind::SyntheticTest => self.send(
                "POST",
                &format!("{}/delete", self.collection_url(kind)),
                &json!({"public_ids": [subject]}),
            ),
            _ => self.remove(&self.object_url(kind, id)),
        };

        match result {
            Ok(_) => Ok(()),
            Err(err) if err.status() == Some(404) => {
                log::warn!("{kind} {subject} was already deleted");
                Ok(())
            }
            Err(err) => Err(err.into_engine("delete", kind, Some(&subject))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> DatadogClient {
        DatadogClient::new(DEFAULT_SITE, "key", "app").unwrap()
    }

    #[test]
    fn test_site_builds_api_base() {
        assert_eq!(client().api_base(), "https://api.datadoghq.com");
        let eu = DatadogClient::new("datadoghq.eu", "key", "app").unwrap();
        assert_eq!(eu.api_base(), "https://api.datadoghq.eu");
    }

    #[test]
    fn test_custom_api_base_trims_slash() {
        let client = DatadogClient::with_api_base("http://localhost:8080/", "k", "a").unwrap();
        assert_eq!(client.api_base(), "http://localhost:8080");
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(
            client.collection_url(ResourceKind::SyntheticTest),
            "https://api.datadoghq.com/api/v1/synthetics/tests"
        );
        assert_eq!(
            client.object_url(ResourceKind::Monitor, &ProviderId::Int(42)),
            "https://api.datadoghq.com/api/v1/monitor/42"
        );
        assert_eq!(
            client.object_url(ResourceKind::Dashboard, &ProviderId::from("abc-def-ghi")),
            "https://api.datadoghq.com/api/v1/dashboard/abc-def-ghi"
        );
    }

    #[test]
    fn test_missing_credentials() {
        let err = DatadogClient::new(DEFAULT_SITE, "", "app").err().unwrap();
        assert!(matches!(err, Error::MissingCredentials("DATADOG_API_KEY")));
        let err = DatadogClient::new(DEFAULT_SITE, "key", "").err().unwrap();
        assert!(matches!(err, Error::MissingCredentials("DATADOG_APP_KEY")));
    }

    #[test]
    fn test_unwrap_list_envelopes() {
        let monitors = unwrap_list(ResourceKind::Monitor, json!([{"id": 1}])).unwrap();
        assert_eq!(monitors.len(), 1);

        let dashboards =
            unwrap_list(ResourceKind::Dashboard, json!({"dashboards": [{"id": "a"}, {"id": "b"}]}))
                .unwrap();
        assert_eq!(dashboards.len(), 2);

        let slos = unwrap_list(ResourceKind::Slo, json!({"data": [], "errors": []})).unwrap();
        assert!(slos.is_empty());

        let tests =
            unwrap_list(ResourceKind::SyntheticTest, json!({"tests": [{"public_id": "x"}]}))
                .unwrap();
        assert_eq!(tests[0]["public_id"], json!("x"));
    }

    #[test]
    fn test_unwrap_list_rejects_wrong_shape() {
        let err = unwrap_list(ResourceKind::Dashboard, json!([])).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
        let err = unwrap_list(ResourceKind::Monitor, json!({"monitors": []})).unwrap_err();
        assert!(err.to_string().contains("list of monitor"));
    }

    #[test]
    fn test_unwrap_object() {
        let monitor = unwrap_object(ResourceKind::Monitor, json!({"id": 3})).unwrap();
        assert_eq!(monitor["id"], json!(3));

        // create and update reply with a one-element list
        let created = unwrap_object(ResourceKind::Slo, json!({"data": [{"id": "s1"}]})).unwrap();
        assert_eq!(created["id"], json!("s1"));

        // show replies with the object itself
        let shown = unwrap_object(ResourceKind::Slo, json!({"data": {"id": "s1"}})).unwrap();
        assert_eq!(shown["id"], json!("s1"));

        assert!(unwrap_object(ResourceKind::Slo, json!({"data": []})).is_err());
        assert!(unwrap_object(ResourceKind::Dashboard, json!([1])).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("ééé", 2), "éé");
    }
}
