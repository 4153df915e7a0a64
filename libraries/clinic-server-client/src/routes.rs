//! Mapping of queue intents onto REST routes.

use crate::error::{Result, ServerClientError};
use clinic_core::{Operation, Placeholder, Resource};
use reqwest::Method;
use serde_json::Value;
use url::Url;

/// Header carrying the queue item id so the server can drop replays.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Collection segment for a resource.
pub fn collection_path(resource: Resource) -> &'static str {
    match resource {
        Resource::Patient => "patients",
        Resource::Appointment => "appointments",
        Resource::VitalSign => "vital-signs",
        Resource::SupportContact => "support-contacts",
        Resource::Medication => "medications",
    }
}

/// Verb and path for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    /// Path segments after the API prefix, unencoded
    pub segments: Vec<String>,
    /// Whether the payload is sent as a JSON body
    pub has_body: bool,
}

impl Route {
    /// Route for a resolved payload.
    ///
    /// `update` and `delete` address the record named by the payload's `id`
    /// field, which must already be a server id.
    pub fn for_request(resource: Resource, operation: Operation, payload: &Value) -> Result<Self> {
        let collection = collection_path(resource).to_string();

        match operation {
            Operation::Create => Ok(Self {
                method: Method::POST,
                segments: vec![collection],
                has_body: true,
            }),
            Operation::Update => Ok(Self {
                method: Method::PUT,
                segments: vec![collection, target_id(payload)?],
                has_body: true,
            }),
            Operation::Delete => Ok(Self {
                method: Method::DELETE,
                segments: vec![collection, target_id(payload)?],
                has_body: false,
            }),
        }
    }

    /// Absolute URL under `base` and `prefix`.
    pub fn url(&self, base: &Url, prefix: &str) -> Result<Url> {
        let mut url = base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ServerClientError::InvalidUrl(base.to_string()))?;
            path.pop_if_empty();
            path.extend(prefix.split('/').filter(|s| !s.is_empty()));
            path.extend(self.segments.iter());
        }
        Ok(url)
    }

    /// Human-readable form for logs, e.g. `PUT /patients/77`.
    pub fn describe(&self) -> String {
        format!("{} /{}", self.method, self.segments.join("/"))
    }
}

fn target_id(payload: &Value) -> Result<String> {
    match payload.get("id") {
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s)) if Placeholder::parse(s).is_some() => Err(ServerClientError::Route(
            format!("target id `{}` is still a placeholder", s),
        )),
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(ServerClientError::Route(
            "payload has no target `id`".to_string(),
        )),
    }
}
