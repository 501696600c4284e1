//! REST API client used by the sync engine
//!
//! The server is an external collaborator; this module only knows the
//! narrow replay contract: send a pending mutation or record, get back
//! success (with server-assigned ids) or failure.

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

use crate::error::{Error, Result};
use crate::models::{Evidence, Inspection, PendingMutation};

/// Header carrying the client-generated idempotency token, so the server
/// can dedupe a retried create whose first response was lost
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Server-assigned identity returned from a create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub id: String,
}

/// Server-assigned identity and storage key returned from an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEvidence {
    pub id: String,
    pub file_key: Option<String>,
}

/// Trait for the replay operations the sync engine needs (async)
#[allow(async_fn_in_trait)]
pub trait InspectionApi {
    /// Create an inspection; returns the server-assigned id
    async fn create_inspection(&self, inspection: &Inspection) -> Result<RemoteRecord>;

    /// Update an inspection that already has a server id
    async fn update_inspection(&self, inspection: &Inspection) -> Result<()>;

    /// Upload evidence as multipart; returns server id and storage key
    async fn upload_evidence(&self, evidence: &Evidence) -> Result<RemoteEvidence>;

    /// Replay a raw queued mutation
    async fn replay(&self, mutation: &PendingMutation) -> Result<()>;
}

/// HTTP implementation of `InspectionApi` over reqwest
#[derive(Clone)]
pub struct HttpInspectionApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpInspectionApi {
    /// Create a client for the given API origin (e.g. `https://api.example.com`)
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().build()?,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.base_url)
        }
    }

    /// Map an HTTP response to the error taxonomy: 4xx (except timeout and
    /// throttling) is a permanent rejection; 5xx and transport failures are
    /// transient.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_client_error()
            && status != StatusCode::REQUEST_TIMEOUT
            && status != StatusCode::TOO_MANY_REQUESTS
        {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.error_for_status()?)
    }

    fn extract_id(value: &serde_json::Value) -> Result<String> {
        match value.get("id") {
            Some(serde_json::Value::String(id)) => Ok(id.clone()),
            Some(serde_json::Value::Number(id)) => Ok(id.to_string()),
            _ => Err(Error::InvalidInput(
                "Server response did not include an id".to_string(),
            )),
        }
    }
}

impl InspectionApi for HttpInspectionApi {
    async fn create_inspection(&self, inspection: &Inspection) -> Result<RemoteRecord> {
        let response = self
            .client
            .post(self.endpoint("/api/inspections"))
            .json(inspection)
            .send()
            .await?;
        let body: serde_json::Value = Self::check(response).await?.json().await?;
        Ok(RemoteRecord {
            id: Self::extract_id(&body)?,
        })
    }

    async fn update_inspection(&self, inspection: &Inspection) -> Result<()> {
        let response = self
            .client
            .put(self.endpoint(&format!("/api/inspections/{}", inspection.id)))
            .json(inspection)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn upload_evidence(&self, evidence: &Evidence) -> Result<RemoteEvidence> {
        let mut form = Form::new()
            .part(
                "evidenceFile",
                Part::bytes(evidence.content.clone()).file_name(evidence.file_name.clone()),
            )
            .text("inspectionId", evidence.inspection_id.clone())
            .text("caption", evidence.caption.clone());
        if let Some(category) = &evidence.category {
            form = form.text("category", category.clone());
        }
        if let Some(notes) = &evidence.notes {
            form = form.text("notes", notes.clone());
        }

        let response = self
            .client
            .post(self.endpoint("/api/evidences"))
            .multipart(form)
            .send()
            .await?;
        let body: serde_json::Value = Self::check(response).await?.json().await?;

        Ok(RemoteEvidence {
            id: Self::extract_id(&body)?,
            file_key: body
                .get("fileKey")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string),
        })
    }

    async fn replay(&self, mutation: &PendingMutation) -> Result<()> {
        let method = reqwest::Method::from_bytes(mutation.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {}", mutation.method)))?;

        let mut request = self
            .client
            .request(method, self.endpoint(&mutation.url))
            .header(IDEMPOTENCY_HEADER, &mutation.idempotency_key);
        if let Some(body) = &mutation.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "API base URL must not be empty".to_string(),
        ));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(Error::InvalidInput(
            "API base URL must start with http:// or https://".to_string(),
        ));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://api.example.com/".to_string()).unwrap(),
            "https://api.example.com"
        );
        assert!(normalize_base_url("  ".to_string()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let api = HttpInspectionApi::new("https://api.example.com/").unwrap();
        assert_eq!(
            api.endpoint("/api/inspections"),
            "https://api.example.com/api/inspections"
        );
        // Absolute replay URLs pass through untouched
        assert_eq!(
            api.endpoint("https://other.example.com/api/x"),
            "https://other.example.com/api/x"
        );
    }

    #[test]
    fn test_extract_id_accepts_string_and_number() {
        assert_eq!(
            HttpInspectionApi::extract_id(&json!({"id": 42})).unwrap(),
            "42"
        );
        assert_eq!(
            HttpInspectionApi::extract_id(&json!({"id": "abc"})).unwrap(),
            "abc"
        );
        assert!(HttpInspectionApi::extract_id(&json!({})).is_err());
    }
}
