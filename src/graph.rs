use std::time::Duration;

use base64::Engine as _;
use chrono::NaiveDateTime;
use serde::Serialize;
use url::form_urlencoded;

use crate::errors::ToolError;
use crate::token::Credential;
use crate::util::{env_optional, env_u64};

pub(crate) const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

// Per-call ceiling — prevents hanging on an unresponsive Graph endpoint.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Thin authenticated transport over the Graph REST surface. Holds the bearer
/// token read-only for its lifetime; all `$filter`/`$search`/`$orderby`
/// assembly lives here so callers never build query strings themselves.
pub(crate) struct GraphClient {
    base_url: String,
    access_token: String,
    timeout_ms: u64,
}

/// Per-item record produced by sequential bulk operations. A failure on one
/// item never aborts the remaining items.
#[derive(Debug, Serialize)]
pub(crate) struct BulkOutcome {
    pub(crate) id: String,
    pub(crate) success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl GraphClient {
    pub(crate) fn new(credential: &Credential) -> Self {
        let base_url = env_optional("GRAPH_API_BASE").unwrap_or_else(|| GRAPH_BASE_URL.to_string());
        GraphClient::with_base_url(credential, base_url)
    }

    pub(crate) fn with_base_url(credential: &Credential, base_url: impl Into<String>) -> Self {
        GraphClient {
            base_url: base_url.into(),
            access_token: credential.access_token.clone(),
            timeout_ms: env_u64("GRAPH_TIMEOUT_MS", DEFAULT_TIMEOUT_MS),
        }
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(self.timeout_ms))
            .timeout_read(Duration::from_millis(self.timeout_ms))
            .timeout_write(Duration::from_millis(self.timeout_ms))
            .build()
    }

    /// Send one authenticated request. Any 2xx is success (an empty body is
    /// the JSON null, not an error); 401 is a distinguished auth failure; any
    /// other status surfaces immediately with its body — no retries.
    pub(crate) fn call(
        &self,
        method: &str,
        endpoint: &str,
        query: &[(String, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, ToolError> {
        let mut url = format!("{}{}", self.base_url, endpoint);
        if !query.is_empty() {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (key, value) in query {
                serializer.append_pair(key, value);
            }
            url.push('?');
            url.push_str(&serializer.finish());
        }

        let request = self
            .agent()
            .request(method, &url)
            .set("authorization", &format!("Bearer {}", self.access_token))
            .set("content-type", "application/json");

        let response = match body {
            Some(json) => request.send_json(json.clone()),
            None => request.call(),
        };

        match response {
            Ok(resp) => {
                if resp.status() == 204 {
                    return Ok(serde_json::Value::Null);
                }
                let text = resp
                    .into_string()
                    .map_err(|e| ToolError::Transport(format!("read body: {e}")))?;
                if text.trim().is_empty() {
                    Ok(serde_json::Value::Null)
                } else {
                    serde_json::from_str(&text)
                        .map_err(|e| ToolError::Transport(format!("invalid response body: {e}")))
                }
            }
            Err(ureq::Error::Status(401, resp)) => {
                let _ = resp.into_string();
                Err(ToolError::AuthExpired { status: 401 })
            }
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(ToolError::RemoteCallFailed { status, body })
            }
            Err(err) => Err(ToolError::Transport(err.to_string())),
        }
    }

    // ── Mail ────────────────────────────────────────────────────────────

    pub(crate) fn get_messages(
        &self,
        folder: &str,
        top: u64,
        search: Option<&str>,
        filter: Option<&str>,
    ) -> Result<serde_json::Value, ToolError> {
        let endpoint = format!("/me/mailFolders/{folder}/messages");
        self.call("GET", &endpoint, &message_query(top, search, filter), None)
    }

    pub(crate) fn search_messages(&self, query: &str, top: u64) -> Result<serde_json::Value, ToolError> {
        self.get_messages("inbox", top, Some(query), None)
    }

    pub(crate) fn mark_as_read(&self, message_id: &str) -> Result<serde_json::Value, ToolError> {
        let endpoint = format!("/me/messages/{message_id}");
        self.call("PATCH", &endpoint, &[], Some(&serde_json::json!({ "isRead": true })))
    }

    pub(crate) fn bulk_mark_read(&self, message_ids: &[String]) -> Vec<BulkOutcome> {
        let mut outcomes = Vec::with_capacity(message_ids.len());
        for id in message_ids {
            match self.mark_as_read(id) {
                Ok(_) => outcomes.push(BulkOutcome {
                    id: id.clone(),
                    success: true,
                    error: None,
                }),
                Err(err) => outcomes.push(BulkOutcome {
                    id: id.clone(),
                    success: false,
                    error: Some(err.to_string()),
                }),
            }
        }
        outcomes
    }

    pub(crate) fn get_unread_count(&self, folder: &str) -> Result<u64, ToolError> {
        let endpoint = format!("/me/mailFolders/{folder}");
        let payload = self.call("GET", &endpoint, &[], None)?;
        Ok(payload
            .get("unreadItemCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(0))
    }

    pub(crate) fn get_message_attachments(&self, message_id: &str) -> Result<serde_json::Value, ToolError> {
        let endpoint = format!("/me/messages/{message_id}/attachments");
        self.call("GET", &endpoint, &[], None)
    }

    /// Fetch and decode one file attachment. Only `fileAttachment` entries
    /// carry inline base64 content; anything else is unsupported.
    pub(crate) fn download_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, ToolError> {
        let endpoint = format!("/me/messages/{message_id}/attachments/{attachment_id}");
        let attachment = self.call("GET", &endpoint, &[], None)?;
        decode_file_attachment(&attachment)
    }

    // ── Calendar ────────────────────────────────────────────────────────

    pub(crate) fn get_events(
        &self,
        start: Option<&str>,
        end: Option<&str>,
        top: u64,
    ) -> Result<serde_json::Value, ToolError> {
        self.call("GET", "/me/events", &event_query(top, start, end), None)
    }

    pub(crate) fn create_event(&self, payload: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        self.call("POST", "/me/events", &[], Some(payload))
    }

    // ── Profile ─────────────────────────────────────────────────────────

    pub(crate) fn get_user_info(&self) -> Result<serde_json::Value, ToolError> {
        self.call("GET", "/me", &[], None)
    }
}

/// Query parameters for a message listing: fixed most-recent-first order,
/// search terms quoted before transmission. Deterministic in its inputs.
pub(crate) fn message_query(
    top: u64,
    search: Option<&str>,
    filter: Option<&str>,
) -> Vec<(String, String)> {
    let mut params = vec![
        ("$top".to_string(), top.to_string()),
        ("$orderby".to_string(), "receivedDateTime desc".to_string()),
    ];
    if let Some(search) = search {
        params.push(("$search".to_string(), format!("\"{search}\"")));
    }
    if let Some(filter) = filter {
        params.push(("$filter".to_string(), filter.to_string()));
    }
    params
}

/// Query parameters for an event listing: ascending start order, optional
/// start/end bounds rendered as a `$filter` window.
pub(crate) fn event_query(top: u64, start: Option<&str>, end: Option<&str>) -> Vec<(String, String)> {
    let mut params = vec![
        ("$top".to_string(), top.to_string()),
        ("$orderby".to_string(), "start/dateTime".to_string()),
    ];
    if let (Some(start), Some(end)) = (start, end) {
        params.push((
            "$filter".to_string(),
            format!("start/dateTime ge '{start}' and end/dateTime le '{end}'"),
        ));
    }
    params
}

/// Outbound event-creation body. Attendee addresses expand into the Graph
/// recipient shape, with the display name derived from the local part.
pub(crate) fn event_payload(
    subject: &str,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    body: Option<&str>,
    location: Option<&str>,
    attendees: &[String],
    timezone: &str,
) -> serde_json::Value {
    let mut event = serde_json::json!({
        "subject": subject,
        "start": {
            "dateTime": start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "timeZone": timezone
        },
        "end": {
            "dateTime": end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "timeZone": timezone
        }
    });
    if let Some(body) = body {
        event["body"] = serde_json::json!({ "contentType": "text", "content": body });
    }
    if let Some(location) = location {
        event["location"] = serde_json::json!({ "displayName": location });
    }
    if !attendees.is_empty() {
        let expanded: Vec<serde_json::Value> = attendees
            .iter()
            .map(|email| {
                serde_json::json!({
                    "emailAddress": {
                        "address": email,
                        "name": email.split('@').next().unwrap_or(email)
                    },
                    "type": "required"
                })
            })
            .collect();
        event["attendees"] = serde_json::Value::Array(expanded);
    }
    event
}

pub(crate) fn decode_file_attachment(attachment: &serde_json::Value) -> Result<Vec<u8>, ToolError> {
    let odata_type = attachment
        .get("@odata.type")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if odata_type != "#microsoft.graph.fileAttachment" {
        let shown = if odata_type.is_empty() { "unknown" } else { odata_type };
        return Err(ToolError::UnsupportedResource(format!(
            "attachment type {shown}"
        )));
    }
    let encoded = attachment
        .get("contentBytes")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::UnsupportedResource("attachment has no contentBytes".to_string()))?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| ToolError::UnsupportedResource(format!("attachment decode: {e}")))
}
