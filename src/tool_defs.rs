use serde_json::{Value, json};

/// The four tools exposed over the protocol. Each descriptor carries the
/// JSON Schema the client sees plus the numeric defaults and ceilings the
/// dispatcher enforces, so schema and enforcement can never drift apart.
pub(crate) fn tool_catalog() -> Vec<Value> {
    vec![
        json!({
            "name": "get_emails",
            "description": "Get recent emails from Outlook inbox",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "count": {
                        "type": "integer",
                        "description": "Number of emails to retrieve (default: 10, max: 50)",
                        "default": 10,
                        "maximum": 50
                    },
                    "search": {
                        "type": "string",
                        "description": "Search term to filter emails (optional)"
                    }
                }
            }
        }),
        json!({
            "name": "get_calendar_events",
            "description": "Get upcoming calendar events from Outlook",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "days": {
                        "type": "integer",
                        "description": "Number of days ahead to look (default: 7, max: 30)",
                        "default": 7,
                        "maximum": 30
                    },
                    "count": {
                        "type": "integer",
                        "description": "Number of events to retrieve (default: 20, max: 50)",
                        "default": 20,
                        "maximum": 50
                    }
                }
            }
        }),
        json!({
            "name": "create_calendar_event",
            "description": "Create a new calendar event in Outlook",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "subject": {
                        "type": "string",
                        "description": "Event title/subject"
                    },
                    "start_time": {
                        "type": "string",
                        "description": "Start time in ISO format (e.g. 2025-08-14T14:00:00)"
                    },
                    "end_time": {
                        "type": "string",
                        "description": "End time in ISO format (e.g. 2025-08-14T15:00:00)"
                    },
                    "location": {
                        "type": "string",
                        "description": "Event location (optional)"
                    },
                    "description": {
                        "type": "string",
                        "description": "Event description/body (optional)"
                    },
                    "attendees": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "List of attendee email addresses (optional)"
                    }
                },
                "required": ["subject", "start_time", "end_time"]
            }
        }),
        json!({
            "name": "get_user_info",
            "description": "Get current user information from Microsoft Graph",
            "inputSchema": {
                "type": "object",
                "properties": {}
            }
        }),
    ]
}

/// Read an integer argument, falling back to the descriptor's declared
/// default and clamping to its declared maximum. Out-of-range requests are
/// narrowed, never rejected.
pub(crate) fn clamp_int_arg(descriptor: &Value, args: &Value, name: &str) -> u64 {
    let schema = &descriptor["inputSchema"]["properties"][name];
    let default = schema["default"].as_u64().unwrap_or(0);
    let maximum = schema["maximum"].as_u64().unwrap_or(u64::MAX);
    let requested = args.get(name).and_then(|v| v.as_u64()).unwrap_or(default);
    requested.min(maximum)
}
