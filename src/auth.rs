use std::io;

use tiny_http::{Header, Response, Server};
use url::form_urlencoded;

use crate::graph::GraphClient;
use crate::token::{Credential, save_token, token_file_path};
use crate::util::env_required;

const LOGIN_BASE: &str = "https://login.microsoftonline.com/common/oauth2/v2.0";

// Delegated permissions requested during consent. Mail.Send is included so a
// previously issued token keeps working if send support is enabled later.
const SCOPES: &str = "User.Read Calendars.ReadWrite Mail.Read Mail.ReadWrite Mail.Send";

pub(crate) fn build_authorize_url(client_id: &str, redirect_uri: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", SCOPES)
        .append_pair("response_mode", "query")
        .finish();
    format!("{LOGIN_BASE}/authorize?{query}")
}

/// Pull the `code` query parameter out of the callback request path.
pub(crate) fn extract_code(request_url: &str) -> Option<String> {
    let query = request_url.split_once('?')?.1;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .filter(|code| !code.is_empty())
}

pub(crate) fn exchange_code(
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let response = ureq::post(token_url)
        .send_form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .map_err(|e| format!("token exchange: {e}"))?;
    let token: serde_json::Value = response.into_json()?;
    if token.get("access_token").and_then(|v| v.as_str()).is_none() {
        return Err("token response missing access_token".into());
    }
    Ok(token)
}

/// One-time interactive authorization. Prints the consent URL, catches the
/// redirect on a local listener, exchanges the code, saves the token file and
/// smoke-tests it against /me.
pub(crate) fn run_auth_flow(bind: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let client_id = env_required("AZURE_CLIENT_ID")?;
    let client_secret = env_required("AZURE_CLIENT_SECRET")?;
    let redirect_uri = format!("http://localhost:{port}/callback");

    let authorize_url = build_authorize_url(&client_id, &redirect_uri);
    eprintln!("[auth] open this URL in a browser and sign in:");
    eprintln!("{authorize_url}");
    eprintln!("[auth] waiting for the redirect on {redirect_uri} ...");

    let addr = format!("{bind}:{port}");
    let server = Server::http(&addr)
        .map_err(|e| io::Error::other(format!("listener on {addr}: {e}")))?;

    let mut code = None;
    for request in server.incoming_requests() {
        if request.url().starts_with("/callback") {
            if let Some(found) = extract_code(request.url()) {
                let mut response =
                    Response::from_string("Authentication complete. You can close this tab.");
                if let Ok(header) = Header::from_bytes("Content-Type", "text/plain; charset=utf-8")
                {
                    response.add_header(header);
                }
                let _ = request.respond(response);
                code = Some(found);
                break;
            }
            let _ = request.respond(Response::from_string("missing code parameter"));
            continue;
        }
        let _ = request.respond(Response::from_string("ok"));
    }
    let code = code.ok_or("listener closed before a code arrived")?;

    eprintln!("[auth] exchanging code for access token ...");
    let token_url = format!("{LOGIN_BASE}/token");
    let token = exchange_code(&token_url, &client_id, &client_secret, &code, &redirect_uri)?;

    let path = token_file_path();
    save_token(&path, &token)?;
    eprintln!("[auth] token saved to {}", path.display());
    if let Some(expires_in) = token.get("expires_in").and_then(|v| v.as_u64()) {
        eprintln!("[auth] token expires in {expires_in} seconds");
    }

    // Smoke test against /me so a bad token is caught now, not mid-session.
    let credential = Credential {
        access_token: token["access_token"].as_str().unwrap_or_default().to_string(),
        expires_in: token.get("expires_in").and_then(|v| v.as_u64()),
    };
    let client = GraphClient::new(&credential);
    match client.get_user_info() {
        Ok(user) => {
            let name = user.get("displayName").and_then(|v| v.as_str()).unwrap_or("Unknown");
            let email = user
                .get("mail")
                .and_then(|v| v.as_str())
                .or_else(|| user.get("userPrincipalName").and_then(|v| v.as_str()))
                .unwrap_or("no email");
            eprintln!("[auth] connected as: {name} ({email})");
        }
        Err(err) => eprintln!("[auth] warning: token check failed: {err}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::spawn_mock;

    #[test]
    fn authorize_url_carries_required_params() {
        let url = build_authorize_url("client-123", "http://localhost:8000/callback");
        assert!(url.starts_with(
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize?"
        ));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Fcallback"));
        assert!(url.contains("scope=User.Read+Calendars.ReadWrite+Mail.Read"));
    }

    #[test]
    fn extract_code_from_callback_url() {
        let code = extract_code("/callback?code=abc123&state=x").unwrap();
        assert_eq!(code, "abc123");
    }

    #[test]
    fn extract_code_missing_is_none() {
        assert!(extract_code("/callback?error=access_denied").is_none());
        assert!(extract_code("/callback").is_none());
        assert!(extract_code("/callback?code=").is_none());
    }

    #[test]
    fn exchange_code_parses_token_response() {
        let (base, handle) = spawn_mock(vec![(
            200,
            r#"{"access_token":"tok-1","token_type":"Bearer","expires_in":3600}"#,
        )]);
        let token_url = format!("{base}/token");
        let token = exchange_code(&token_url, "id", "secret", "code", "http://localhost:8000/callback")
            .unwrap();
        assert_eq!(token["access_token"], "tok-1");
        let seen = handle.join().unwrap();
        assert_eq!(seen[0], "POST /token");
    }

    #[test]
    fn exchange_code_rejects_missing_access_token() {
        let (base, handle) = spawn_mock(vec![(200, r#"{"error":"invalid_grant"}"#)]);
        let token_url = format!("{base}/token");
        let err = exchange_code(&token_url, "id", "secret", "code", "http://localhost:8000/callback")
            .unwrap_err();
        assert!(err.to_string().contains("access_token"));
        handle.join().unwrap();
    }
}
