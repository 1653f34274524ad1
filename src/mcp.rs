use std::io::{self, BufRead, BufReader, Read, Write};

use crate::tool_exec::Dispatcher;

// === MCP stdio server ===
// Stdout is the protocol channel; every diagnostic goes to stderr. Requests
// arrive either Content-Length framed or as single-line JSON; responses are
// always written framed.

pub(crate) fn read_mcp_message(reader: &mut BufReader<impl Read>) -> io::Result<Option<serde_json::Value>> {
    let mut first_line = String::new();
    if reader.read_line(&mut first_line)? == 0 {
        return Ok(None);
    }
    if first_line.trim().is_empty() {
        return Ok(None);
    }

    if first_line
        .to_ascii_lowercase()
        .starts_with("content-length:")
    {
        let mut content_length = first_line
            .split(':')
            .nth(1)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        // Read remaining headers
        loop {
            let mut line = String::new();
            reader.read_line(&mut line)?;
            if line == "\r\n" || line == "\n" || line.is_empty() {
                break;
            }
            if line.to_ascii_lowercase().starts_with("content-length:") {
                content_length = line
                    .split(':')
                    .nth(1)
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(content_length);
            }
        }

        if content_length == 0 {
            return Ok(None);
        }
        let mut buffer = vec![0u8; content_length];
        reader.read_exact(&mut buffer)?;
        let value = serde_json::from_slice(&buffer).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("invalid json: {e}"))
        })?;
        Ok(Some(value))
    } else {
        let value = serde_json::from_str(first_line.trim()).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("invalid json: {e}"))
        })?;
        Ok(Some(value))
    }
}

pub(crate) fn write_mcp_response(writer: &mut impl Write, value: &serde_json::Value) -> io::Result<()> {
    let payload = serde_json::to_vec(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{e}")))?;
    write!(writer, "Content-Length: {}\r\n\r\n", payload.len())?;
    writer.write_all(&payload)?;
    writer.flush()
}

/// Map one request to its response. Returns the response (if the message
/// warrants one) and whether the session should end. Tool failures come back
/// as a normal `result` with `isError` set; a JSON-RPC `error` is reserved
/// for protocol-level problems like an unknown method.
pub(crate) fn handle_message(
    dispatcher: &Dispatcher,
    msg: &serde_json::Value,
) -> (Option<serde_json::Value>, bool) {
    let id = msg.get("id").cloned();
    let has_id = id.as_ref().is_some_and(|v| !v.is_null());
    let method = msg.get("method").and_then(|m| m.as_str()).unwrap_or("");
    let params = msg
        .get("params")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    match method {
        "initialize" => {
            let protocol = params
                .get("protocolVersion")
                .and_then(|v| v.as_str())
                .unwrap_or("2024-11-05");
            let response = serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": protocol,
                    "capabilities": {
                        "tools": {
                            "list": true,
                            "call": true
                        }
                    },
                    "serverInfo": {
                        "name": "outlook-connector",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }
            });
            (Some(response), false)
        }
        "tools/list" => {
            let response = serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "tools": dispatcher.catalog() }
            });
            (Some(response), false)
        }
        "tools/call" => {
            let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let arguments = params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));
            let execution = dispatcher.invoke(name, &arguments);
            let response = serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "content": [
                        { "type": "text", "text": execution.output }
                    ],
                    "isError": execution.is_error
                }
            });
            (Some(response), false)
        }
        "shutdown" => {
            let response = serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": null
            });
            (Some(response), true)
        }
        _ => {
            if !has_id {
                // Notification; nothing to answer.
                return (None, false);
            }
            let response = serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": "method not found" }
            });
            (Some(response), false)
        }
    }
}

pub(crate) fn run_mcp_server(dispatcher: &Dispatcher) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = BufReader::new(io::stdin());
    let mut writer = io::stdout();

    loop {
        let Some(msg) = read_mcp_message(&mut reader)? else {
            break;
        };
        let (response, should_stop) = handle_message(dispatcher, &msg);
        if let Some(response) = response {
            write_mcp_response(&mut writer, &response)?;
        }
        if should_stop {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(None)
    }

    fn framed(value: &serde_json::Value) -> Vec<u8> {
        let body = serde_json::to_string(value).unwrap();
        format!("Content-Length: {}\r\n\r\n{body}", body.len()).into_bytes()
    }

    #[test]
    fn read_framed_message() {
        let msg = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"});
        let bytes = framed(&msg);
        let mut reader = BufReader::new(bytes.as_slice());
        let parsed = read_mcp_message(&mut reader).unwrap().unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn read_line_delimited_message() {
        let input = b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/list\"}\n";
        let mut reader = BufReader::new(input.as_slice());
        let parsed = read_mcp_message(&mut reader).unwrap().unwrap();
        assert_eq!(parsed["method"], "tools/list");
    }

    #[test]
    fn read_eof_is_none() {
        let mut reader = BufReader::new(&b""[..]);
        assert!(read_mcp_message(&mut reader).unwrap().is_none());
    }

    #[test]
    fn write_response_is_framed() {
        let mut out = Vec::new();
        write_mcp_response(&mut out, &json!({"ok": true})).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Content-Length: "));
        assert!(text.ends_with("{\"ok\":true}"));
    }

    #[test]
    fn initialize_echoes_protocol_version() {
        let msg = json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2024-11-05"}
        });
        let (response, stop) = handle_message(&dispatcher(), &msg);
        let response = response.unwrap();
        assert!(!stop);
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(response["result"]["serverInfo"]["name"], "outlook-connector");
        assert_eq!(response["result"]["capabilities"]["tools"]["call"], true);
    }

    #[test]
    fn tools_list_returns_catalog() {
        let msg = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"});
        let (response, _) = handle_message(&dispatcher(), &msg);
        let tools = response.unwrap()["result"]["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 4);
        assert_eq!(tools[0]["name"], "get_emails");
    }

    #[test]
    fn tools_call_failure_is_result_not_rpc_error() {
        let msg = json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": {"name": "get_user_info", "arguments": {}}
        });
        let (response, _) = handle_message(&dispatcher(), &msg);
        let response = response.unwrap();
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("not authenticated"));
    }

    #[test]
    fn shutdown_replies_then_stops() {
        let msg = json!({"jsonrpc": "2.0", "id": 4, "method": "shutdown"});
        let (response, stop) = handle_message(&dispatcher(), &msg);
        assert!(stop);
        assert!(response.unwrap()["result"].is_null());
    }

    #[test]
    fn unknown_method_with_id_is_method_not_found() {
        let msg = json!({"jsonrpc": "2.0", "id": 5, "method": "resources/list"});
        let (response, stop) = handle_message(&dispatcher(), &msg);
        assert!(!stop);
        assert_eq!(response.unwrap()["error"]["code"], -32601);
    }

    #[test]
    fn notification_gets_no_response() {
        let msg = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        let (response, stop) = handle_message(&dispatcher(), &msg);
        assert!(response.is_none());
        assert!(!stop);
    }
}
