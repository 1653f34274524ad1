use thiserror::Error;

/// Everything that can go wrong between receiving a tool invocation and
/// producing its text result. Every variant is converted to a textual
/// `ToolExecution` at the dispatcher boundary; none of them cross the
/// protocol channel as a transport fault.
#[derive(Debug, Error)]
pub(crate) enum ToolError {
    #[error(
        "not authenticated with Microsoft Graph; run `outlook-connector auth` and make sure the saved token is present"
    )]
    Unauthenticated,

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid {field}: {reason}")]
    ValidationFailed { field: &'static str, reason: String },

    /// Non-success HTTP status from Graph. The body is the raw response text;
    /// it never contains the bearer token.
    #[error("Graph request failed: {status} - {body}")]
    RemoteCallFailed { status: u16, body: String },

    /// HTTP 401 gets its own kind so callers can be told to re-authorize
    /// instead of seeing a generic remote failure.
    #[error("access token rejected (HTTP {status}); re-run `outlook-connector auth`")]
    AuthExpired { status: u16 },

    #[error("unsupported resource: {0}")]
    UnsupportedResource(String),

    /// The request never produced an HTTP status (connect failure, timeout,
    /// unparsable response body).
    #[error("Graph request failed: {0}")]
    Transport(String),
}

/// Single error-to-text mapping applied at the invocation boundary, so every
/// tool renders failures the same way.
pub(crate) fn render_error(tool: &str, err: &ToolError) -> String {
    format!("\u{274c} Error executing {tool}: {err}")
}
