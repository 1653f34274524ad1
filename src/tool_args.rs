use serde::Deserialize;

use crate::errors::ToolError;

/// Typed views over the raw `arguments` object of a tool call. Numeric
/// arguments with defaults and ceilings are clamped from the catalog
/// descriptors instead, so they never appear here.
#[derive(Debug, Deserialize)]
pub(crate) struct GetEmailsArgs {
    #[serde(default)]
    pub(crate) search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateEventArgs {
    pub(crate) subject: String,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    #[serde(default)]
    pub(crate) location: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) attendees: Option<Vec<String>>,
}

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(
    args: &serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::ValidationFailed {
        field: "arguments",
        reason: e.to_string(),
    })
}
