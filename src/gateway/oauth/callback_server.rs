//! Usage: One-shot loopback callback listener for the OAuth authorization-code redirect.

use crate::shared::error::{AppError, AppResult};
use url::Url;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const SUCCESS_HTML: &str = "<html><body><h2>Authorization received.</h2><p>You can close this tab and return to the terminal.</p></body></html>";
const ERROR_HTML: &str = "<html><body><h2>Authorization failed.</h2><p>You can close this tab and retry from the terminal.</p></body></html>";
const NOT_FOUND_HTML: &str = "<html><body><h2>Not found.</h2></body></html>";
const MAX_REQUEST_BYTES: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OAuthCallbackPayload {
    pub(crate) code: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) error_description: Option<String>,
}

#[derive(Debug)]
pub(crate) struct CallbackListener {
    redirect_uri: Url,
    listener_v4: Option<TcpListener>,
    listener_v6: Option<TcpListener>,
}

/// Accepts only `http://<loopback>[:port]/path` redirect URIs.
pub(crate) fn parse_loopback_redirect(redirect_uri: &str) -> AppResult<Url> {
    let url = Url::parse(redirect_uri.trim())
        .map_err(|e| AppError::InvalidInput(format!("invalid redirect_uri: {e}")))?;
    if url.scheme() != "http" {
        return Err(AppError::InvalidInput(
            "redirect_uri must use plain http for the local callback listener".to_string(),
        ));
    }
    let is_loopback = match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    };
    if !is_loopback {
        return Err(AppError::InvalidInput(
            "redirect_uri host must be localhost, 127.0.0.1 or ::1".to_string(),
        ));
    }
    Ok(url)
}

impl CallbackListener {
    pub(crate) async fn bind(redirect_uri: &str) -> AppResult<Self> {
        let mut url = parse_loopback_redirect(redirect_uri)?;
        let port = url.port_or_known_default().unwrap_or(80);

        let candidates: Vec<IpAddr> = match url.host() {
            Some(url::Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
            Some(url::Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
            _ => vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
        };

        let mut bind_errors: Vec<String> = Vec::new();
        let mut bound_port = port;
        let mut listener_v4 = None;
        let mut listener_v6 = None;
        for ip in candidates {
            // A dynamic port is chosen by the first bind; later binds reuse it.
            match TcpListener::bind((ip, bound_port)).await {
                Ok(listener) => {
                    if bound_port == 0 {
                        bound_port = listener
                            .local_addr()
                            .map_err(|e| format!("SYSTEM_ERROR: callback local_addr failed: {e}"))?
                            .port();
                    }
                    match ip {
                        IpAddr::V4(_) => listener_v4 = Some(listener),
                        IpAddr::V6(_) => listener_v6 = Some(listener),
                    }
                }
                Err(err) => bind_errors.push(format!("{ip}:{bound_port} ({err})")),
            }
        }

        if listener_v4.is_none() && listener_v6.is_none() {
            return Err(format!(
                "SYSTEM_ERROR: oauth callback bind failed: {}",
                bind_errors.join("; ")
            )
            .into());
        }
        if port == 0 {
            url.set_port(Some(bound_port))
                .map_err(|_| "SYSTEM_ERROR: failed to set callback port".to_string())?;
        }
        tracing::debug!(redirect_uri = %url, "oauth callback listener bound");

        Ok(Self {
            redirect_uri: url,
            listener_v4,
            listener_v6,
        })
    }

    /// Effective redirect URI (rewritten with the bound port when `0` was requested).
    pub(crate) fn redirect_uri(&self) -> &str {
        self.redirect_uri.as_str()
    }

    pub(crate) fn port(&self) -> u16 {
        self.redirect_uri.port_or_known_default().unwrap_or(80)
    }

    /// Waits at most `wait` for one connection, including reading its request. `Ok(None)`
    /// means nothing usable arrived (timeout, stray request, idle pre-connect).
    pub(crate) async fn poll(&mut self, wait: Duration) -> AppResult<Option<OAuthCallbackPayload>> {
        let deadline = Instant::now() + wait;
        let accept_future = async {
            match (self.listener_v4.as_mut(), self.listener_v6.as_mut()) {
                (Some(v4), Some(v6)) => {
                    tokio::select! {
                        result = v4.accept() => result,
                        result = v6.accept() => result,
                    }
                }
                (Some(v4), None) => v4.accept().await,
                (None, Some(v6)) => v6.accept().await,
                (None, None) => Err(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "callback listener closed",
                )),
            }
        };

        let accepted = match tokio::time::timeout(wait, accept_future).await {
            Err(_) => return Ok(None),
            Ok(result) => result,
        };
        let (socket, _) =
            accepted.map_err(|e| format!("SYSTEM_ERROR: oauth callback accept failed: {e}"))?;

        let read_budget = deadline.saturating_duration_since(Instant::now());
        Ok(self.handle_connection(socket, read_budget).await)
    }

    async fn handle_connection(
        &self,
        mut socket: TcpStream,
        read_budget: Duration,
    ) -> Option<OAuthCallbackPayload> {
        let mut buffer = vec![0u8; MAX_REQUEST_BYTES];
        let size = match tokio::time::timeout(read_budget, socket.read(&mut buffer)).await {
            Ok(Ok(size)) if size > 0 => size,
            _ => return None,
        };

        let request = String::from_utf8_lossy(&buffer[..size]);
        let payload = extract_request_target(request.as_ref())
            .and_then(|target| parse_callback_target(target, self.redirect_uri.path()));

        let (status, body) = match &payload {
            Some(p) if p.error.is_some() => ("HTTP/1.1 200 OK", ERROR_HTML),
            Some(_) => ("HTTP/1.1 200 OK", SUCCESS_HTML),
            None => ("HTTP/1.1 404 Not Found", NOT_FOUND_HTML),
        };
        let response = format!(
            "{status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;

        payload
    }
}

fn extract_request_target(request: &str) -> Option<&str> {
    let first = request.lines().next()?;
    let mut parts = first.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    if method != "GET" || target.is_empty() {
        return None;
    }
    Some(target)
}

/// Parses `code`/`state`/`error` from a request target on the expected callback path.
pub(crate) fn parse_callback_target(
    target: &str,
    expected_path: &str,
) -> Option<OAuthCallbackPayload> {
    let url = Url::parse(&format!("http://127.0.0.1{target}")).ok()?;
    let expected_path = if expected_path.is_empty() { "/" } else { expected_path };
    if url.path() != expected_path {
        return None;
    }

    let mut payload = OAuthCallbackPayload {
        code: None,
        state: None,
        error: None,
        error_description: None,
    };
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => payload.code = Some(value.to_string()).filter(|v| !v.is_empty()),
            "state" => payload.state = Some(value.to_string()),
            "error" => payload.error = Some(value.to_string()),
            "error_description" => payload.error_description = Some(value.to_string()),
            _ => {}
        }
    }

    if payload.code.is_none() && payload.error.is_none() {
        return None;
    }
    Some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_callback_target_extracts_code_and_state() {
        let payload = parse_callback_target("/callback?code=abc123&state=xyz", "/callback")
            .expect("payload");
        assert_eq!(payload.code.as_deref(), Some("abc123"));
        assert_eq!(payload.state.as_deref(), Some("xyz"));
        assert!(payload.error.is_none());
    }

    #[test]
    fn parse_callback_target_accepts_provider_error() {
        let payload = parse_callback_target(
            "/callback?error=access_denied&error_description=nope&state=xyz",
            "/callback",
        )
        .expect("payload");
        assert_eq!(payload.error.as_deref(), Some("access_denied"));
        assert_eq!(payload.error_description.as_deref(), Some("nope"));
    }

    #[test]
    fn parse_callback_target_ignores_other_paths_and_empty_queries() {
        assert!(parse_callback_target("/favicon.ico", "/callback").is_none());
        assert!(parse_callback_target("/callback?state=xyz", "/callback").is_none());
        assert!(parse_callback_target("/other?code=abc&state=xyz", "/callback").is_none());
    }

    #[test]
    fn parse_callback_target_treats_empty_path_as_root() {
        let payload = parse_callback_target("/?code=abc&state=s", "").expect("payload");
        assert_eq!(payload.code.as_deref(), Some("abc"));
    }

    #[test]
    fn extract_request_target_requires_get() {
        assert_eq!(
            extract_request_target("GET /callback?code=1 HTTP/1.1\r\nHost: x\r\n\r\n"),
            Some("/callback?code=1")
        );
        assert_eq!(extract_request_target("POST /callback HTTP/1.1\r\n\r\n"), None);
        assert_eq!(extract_request_target(""), None);
    }

    #[test]
    fn redirect_must_be_plain_http_on_loopback() {
        assert!(parse_loopback_redirect("http://127.0.0.1:8888/callback").is_ok());
        assert!(parse_loopback_redirect("http://localhost:8000/").is_ok());
        assert!(parse_loopback_redirect("http://[::1]:9000/cb").is_ok());

        let err = parse_loopback_redirect("https://127.0.0.1:8888/callback").expect_err("https");
        assert_eq!(err.code(), "SEC_INVALID_INPUT");
        let err = parse_loopback_redirect("http://example.com/callback").expect_err("remote");
        assert_eq!(err.code(), "SEC_INVALID_INPUT");
        assert!(parse_loopback_redirect("http://10.0.0.5:8888/callback").is_err());
        assert!(parse_loopback_redirect("not a url").is_err());
    }

    #[tokio::test]
    async fn dynamic_port_is_written_back_into_redirect_uri() {
        let listener = CallbackListener::bind("http://127.0.0.1:0/callback")
            .await
            .expect("bind");
        assert_ne!(listener.port(), 0);
        assert_eq!(
            listener.redirect_uri(),
            format!("http://127.0.0.1:{}/callback", listener.port())
        );
    }

    #[tokio::test]
    async fn poll_returns_none_when_nothing_arrives() {
        let mut listener = CallbackListener::bind("http://127.0.0.1:0/callback")
            .await
            .expect("bind");
        let polled = listener
            .poll(Duration::from_millis(50))
            .await
            .expect("poll");
        assert!(polled.is_none());
    }

    #[tokio::test]
    async fn idle_connection_does_not_stretch_poll_wait() {
        let mut listener = CallbackListener::bind("http://127.0.0.1:0/callback")
            .await
            .expect("bind");
        let _idle = TcpStream::connect(("127.0.0.1", listener.port()))
            .await
            .expect("connect");

        let started = Instant::now();
        let polled = listener
            .poll(Duration::from_millis(200))
            .await
            .expect("poll");
        assert!(polled.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn poll_captures_code_and_answers_with_html() {
        let mut listener = CallbackListener::bind("http://127.0.0.1:0/callback")
            .await
            .expect("bind");
        let port = listener.port();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
            stream
                .write_all(b"GET /callback?code=c0de&state=st HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .expect("write");
            let mut response = String::new();
            stream.read_to_string(&mut response).await.expect("read");
            response
        });

        let payload = listener
            .poll(Duration::from_secs(5))
            .await
            .expect("poll")
            .expect("payload");
        assert_eq!(payload.code.as_deref(), Some("c0de"));
        assert_eq!(payload.state.as_deref(), Some("st"));

        let response = client.await.expect("client task");
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("text/html"));
        assert!(response.contains("Authorization received."));
    }
}
