use chrono::{Duration, Utc};
use serde_json::Value;

use crate::errors::{ToolError, render_error};
use crate::graph::{GraphClient, event_payload};
use crate::render::{render_created_event, render_emails, render_events, render_user_info};
use crate::tool_args::{CreateEventArgs, GetEmailsArgs, parse_args};
use crate::tool_defs::{clamp_int_arg, tool_catalog};
use crate::util::{EVENT_TIME_EXAMPLE, parse_event_time};

/// Result of one tool invocation. `output` is the text handed to the caller;
/// `details` carries the raw Graph payload for diagnostic consumers. A failed
/// invocation is still a normal result with `is_error` set, never a protocol
/// fault.
pub(crate) struct ToolExecution {
    pub(crate) output: String,
    pub(crate) details: Option<Value>,
    pub(crate) is_error: bool,
}

/// Routes tool calls by name. Carries the Graph client it was constructed
/// with; a dispatcher built without one answers every call with an
/// authentication error instead of panicking mid-session.
pub(crate) struct Dispatcher {
    client: Option<GraphClient>,
    catalog: Vec<Value>,
}

impl Dispatcher {
    pub(crate) fn new(client: Option<GraphClient>) -> Self {
        Dispatcher {
            client,
            catalog: tool_catalog(),
        }
    }

    pub(crate) fn catalog(&self) -> &[Value] {
        &self.catalog
    }

    fn descriptor(&self, name: &str) -> Option<&Value> {
        self.catalog.iter().find(|tool| tool["name"] == name)
    }

    fn client(&self) -> Result<&GraphClient, ToolError> {
        self.client.as_ref().ok_or(ToolError::Unauthenticated)
    }

    pub(crate) fn invoke(&self, name: &str, args: &Value) -> ToolExecution {
        match self.try_invoke(name, args) {
            Ok(execution) => execution,
            Err(err) => ToolExecution {
                output: render_error(name, &err),
                details: None,
                is_error: true,
            },
        }
    }

    fn try_invoke(&self, name: &str, args: &Value) -> Result<ToolExecution, ToolError> {
        let descriptor = self
            .descriptor(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?
            .clone();
        match name {
            "get_emails" => self.get_emails(&descriptor, args),
            "get_calendar_events" => self.get_calendar_events(&descriptor, args),
            "create_calendar_event" => self.create_calendar_event(args),
            "get_user_info" => self.get_user_info(),
            // Catalog and dispatch arms are kept in lockstep.
            _ => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    fn get_emails(&self, descriptor: &Value, args: &Value) -> Result<ToolExecution, ToolError> {
        let client = self.client()?;
        let count = clamp_int_arg(descriptor, args, "count");
        let parsed: GetEmailsArgs = parse_args(args)?;
        let payload = match parsed.search.as_deref() {
            Some(search) => client.search_messages(search, count)?,
            None => client.get_messages("inbox", count, None, None)?,
        };
        Ok(ToolExecution {
            output: render_emails(&payload, parsed.search.as_deref()),
            details: Some(payload),
            is_error: false,
        })
    }

    fn get_calendar_events(&self, descriptor: &Value, args: &Value) -> Result<ToolExecution, ToolError> {
        let client = self.client()?;
        let days = clamp_int_arg(descriptor, args, "days");
        let count = clamp_int_arg(descriptor, args, "count");
        let now = Utc::now();
        let start = now.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let end = (now + Duration::days(days as i64))
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();
        let payload = client.get_events(Some(&start), Some(&end), count)?;
        Ok(ToolExecution {
            output: render_events(&payload, days),
            details: Some(payload),
            is_error: false,
        })
    }

    fn create_calendar_event(&self, args: &Value) -> Result<ToolExecution, ToolError> {
        let client = self.client()?;
        let parsed: CreateEventArgs = parse_args(args)?;
        let start = parse_event_time(&parsed.start_time).ok_or_else(|| {
            ToolError::ValidationFailed {
                field: "start_time",
                reason: format!(
                    "could not parse '{}'; use format like {EVENT_TIME_EXAMPLE}",
                    parsed.start_time
                ),
            }
        })?;
        let end = parse_event_time(&parsed.end_time).ok_or_else(|| {
            ToolError::ValidationFailed {
                field: "end_time",
                reason: format!(
                    "could not parse '{}'; use format like {EVENT_TIME_EXAMPLE}",
                    parsed.end_time
                ),
            }
        })?;
        let attendees = parsed.attendees.unwrap_or_default();
        let payload = event_payload(
            &parsed.subject,
            &start,
            &end,
            parsed.description.as_deref(),
            parsed.location.as_deref(),
            &attendees,
            "UTC",
        );
        let created = client.create_event(&payload)?;
        Ok(ToolExecution {
            output: render_created_event(
                &parsed.subject,
                &start,
                &end,
                parsed.location.as_deref(),
                &attendees,
            ),
            details: Some(created),
            is_error: false,
        })
    }

    fn get_user_info(&self) -> Result<ToolExecution, ToolError> {
        let client = self.client()?;
        let user = client.get_user_info()?;
        Ok(ToolExecution {
            output: render_user_info(&user),
            details: Some(user),
            is_error: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{spawn_mock, test_credential};
    use serde_json::json;

    fn dispatcher_for(base: String) -> Dispatcher {
        Dispatcher::new(Some(GraphClient::with_base_url(&test_credential(), base)))
    }

    #[test]
    fn unknown_tool_is_a_textual_error() {
        let dispatcher = Dispatcher::new(None);
        let execution = dispatcher.invoke("send_email", &json!({}));
        assert!(execution.is_error);
        assert!(execution.output.starts_with("\u{274c} Error executing send_email:"));
        assert!(execution.output.contains("unknown tool"));
    }

    #[test]
    fn missing_client_reports_unauthenticated() {
        let dispatcher = Dispatcher::new(None);
        let execution = dispatcher.invoke("get_user_info", &json!({}));
        assert!(execution.is_error);
        assert!(execution.output.contains("not authenticated"));
    }

    #[test]
    fn get_emails_clamps_count_to_catalog_maximum() {
        let (base, handle) = spawn_mock(vec![(200, r#"{"value":[]}"#)]);
        let dispatcher = dispatcher_for(base);
        let execution = dispatcher.invoke("get_emails", &json!({"count": 500}));
        assert!(!execution.is_error);
        let seen = handle.join().unwrap();
        assert!(seen[0].contains("%24top=50"), "{}", seen[0]);
    }

    #[test]
    fn get_emails_search_goes_over_the_wire_quoted() {
        let (base, handle) = spawn_mock(vec![(200, r#"{"value":[]}"#)]);
        let dispatcher = dispatcher_for(base);
        let execution = dispatcher.invoke("get_emails", &json!({"search": "budget"}));
        assert!(!execution.is_error);
        assert!(execution.output.contains("matching 'budget'"));
        let seen = handle.join().unwrap();
        assert!(seen[0].contains("%24search=%22budget%22"), "{}", seen[0]);
    }

    #[test]
    fn get_calendar_events_sends_window_filter() {
        let (base, handle) = spawn_mock(vec![(200, r#"{"value":[]}"#)]);
        let dispatcher = dispatcher_for(base);
        let execution = dispatcher.invoke("get_calendar_events", &json!({"days": 3}));
        assert!(!execution.is_error);
        assert_eq!(execution.output, "\u{1f4c5} No events found in the next 3 days.");
        let seen = handle.join().unwrap();
        assert!(seen[0].starts_with("GET /me/events?"));
        assert!(seen[0].contains("%24filter="));
    }

    #[test]
    fn create_event_rejects_unparsable_start_time() {
        let dispatcher = dispatcher_for("http://127.0.0.1:1".to_string());
        let execution = dispatcher.invoke(
            "create_calendar_event",
            &json!({
                "subject": "Sync",
                "start_time": "soon",
                "end_time": "2025-08-14T15:00:00"
            }),
        );
        assert!(execution.is_error);
        assert!(execution.output.contains("start_time"));
        assert!(execution.output.contains("2025-08-14T14:00:00"));
    }

    #[test]
    fn create_event_missing_subject_is_validation_error() {
        let dispatcher = dispatcher_for("http://127.0.0.1:1".to_string());
        let execution = dispatcher.invoke(
            "create_calendar_event",
            &json!({"start_time": "2025-08-14T14:00:00", "end_time": "2025-08-14T15:00:00"}),
        );
        assert!(execution.is_error);
        assert!(execution.output.contains("invalid arguments"));
    }

    #[test]
    fn create_event_success_renders_confirmation() {
        let (base, handle) = spawn_mock(vec![(201, r#"{"id":"evt-1"}"#)]);
        let dispatcher = dispatcher_for(base);
        let execution = dispatcher.invoke(
            "create_calendar_event",
            &json!({
                "subject": "Review",
                "start_time": "2025-08-14T14:00:00",
                "end_time": "2025-08-14T15:00:00",
                "location": "Room 9"
            }),
        );
        assert!(!execution.is_error);
        assert!(execution.output.contains("created successfully"));
        assert!(execution.output.contains("When: 2025-08-14 14:00 - 15:00"));
        assert_eq!(execution.details.unwrap()["id"], "evt-1");
        let seen = handle.join().unwrap();
        assert_eq!(seen[0], "POST /me/events");
    }

    #[test]
    fn get_user_info_renders_profile() {
        let (base, handle) = spawn_mock(vec![(
            200,
            r#"{"displayName":"Ada Example","mail":"ada@example.com"}"#,
        )]);
        let dispatcher = dispatcher_for(base);
        let execution = dispatcher.invoke("get_user_info", &json!({}));
        assert!(!execution.is_error);
        assert!(execution.output.contains("Name: Ada Example"));
        handle.join().unwrap();
    }

    #[test]
    fn remote_failure_becomes_text_not_panic() {
        let (base, handle) = spawn_mock(vec![(500, r#"{"error":"boom"}"#)]);
        let dispatcher = dispatcher_for(base);
        let execution = dispatcher.invoke("get_user_info", &json!({}));
        assert!(execution.is_error);
        assert!(execution.output.contains("500"));
        handle.join().unwrap();
    }
}
