use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::models::PageVisit;

pub const DEFAULT_VISIT_PATH: &str = "/api/analytics/page-visit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Ordinary background send while the tracker is alive.
    Background,
    /// Send issued on unload or destroy; must not depend on the tracker surviving.
    KeepAlive,
}

/// Destination for finished visit records.
#[async_trait]
pub trait VisitSink: Send + Sync {
    async fn deliver(&self, visit: &PageVisit, delivery: Delivery) -> Result<()>;
}

/// Posts visits as JSON to the portal's analytics endpoint.
///
/// Requests carry no timeout: a send in flight runs until the server answers
/// or the connection fails.
pub struct HttpSink {
    client: Client,
    endpoint: Url,
    auth_token: Option<String>,
}

impl HttpSink {
    pub fn new(api_base_url: &str, visit_path: &str, auth_token: Option<String>) -> Result<Self> {
        let endpoint = endpoint_url(api_base_url, visit_path)?;
        let client = Client::builder()
            .build()
            .map_err(|err| anyhow!("failed to build analytics client: {err}"))?;

        Ok(Self {
            client,
            endpoint,
            auth_token: auth_token.filter(|token| !token.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Append `visit_path` below the base url's own path, so a portal mounted
/// under a prefix keeps it.
fn endpoint_url(api_base_url: &str, visit_path: &str) -> Result<Url> {
    let mut base = Url::parse(api_base_url)
        .with_context(|| format!("invalid analytics base url '{api_base_url}'"))?;
    if !base.path().ends_with('/') {
        let prefix = format!("{}/", base.path());
        base.set_path(&prefix);
    }
    base.join(visit_path.trim_start_matches('/'))
        .with_context(|| format!("invalid analytics path '{visit_path}'"))
}

#[async_trait]
impl VisitSink for HttpSink {
    async fn deliver(&self, visit: &PageVisit, _delivery: Delivery) -> Result<()> {
        let mut request = self.client.post(self.endpoint.clone()).json(visit);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            bail!("analytics endpoint answered {status}");
        }
        Ok(())
    }
}

/// Accepts and discards everything. Used when tracking is disabled.
pub struct NullSink;

#[async_trait]
impl VisitSink for NullSink {
    async fn deliver(&self, _visit: &PageVisit, _delivery: Delivery) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceType, PageType, SessionId};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    fn visit() -> PageVisit {
        PageVisit {
            page_path: "/recordings/9".into(),
            page_title: None,
            page_type: PageType::Recording,
            page_id: Some("9".into()),
            referrer: None,
            session_id: SessionId::generate(),
            time_spent_seconds: Some(4),
            user_agent: None,
            device_type: DeviceType::Desktop,
        }
    }

    /// Read one full request (headers plus content-length body).
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= split + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    async fn reply(socket: &mut TcpStream, status_line: &str) {
        let reply = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        socket.write_all(reply.as_bytes()).await.unwrap();
    }

    /// Accept one connection, capture the raw request, answer with `status_line`.
    async fn one_shot_server(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let raw = read_request(&mut socket).await;
            reply(&mut socket, status_line).await;
            raw
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn joins_endpoint_onto_base() {
        let sink = HttpSink::new("https://portal.example", DEFAULT_VISIT_PATH, None).unwrap();
        assert_eq!(
            sink.endpoint().as_str(),
            "https://portal.example/api/analytics/page-visit"
        );
    }

    #[test]
    fn keeps_base_path_prefix() {
        for base in ["https://portal.example/backend", "https://portal.example/backend/"] {
            let sink = HttpSink::new(base, DEFAULT_VISIT_PATH, None).unwrap();
            assert_eq!(
                sink.endpoint().as_str(),
                "https://portal.example/backend/api/analytics/page-visit"
            );
        }
    }

    #[test]
    fn rejects_malformed_base() {
        assert!(HttpSink::new("not a url", DEFAULT_VISIT_PATH, None).is_err());
    }

    #[tokio::test]
    async fn posts_json_with_bearer_token() {
        let (base, server) = one_shot_server("HTTP/1.1 201 Created").await;
        let sink = HttpSink::new(&base, DEFAULT_VISIT_PATH, Some("secret-token".into())).unwrap();

        sink.deliver(&visit(), Delivery::Background).await.unwrap();

        let raw = server.await.unwrap();
        let lower = raw.to_ascii_lowercase();
        assert!(raw.starts_with("POST /api/analytics/page-visit HTTP/1.1"));
        assert!(lower.contains("authorization: bearer secret-token"));
        assert!(lower.contains("content-type: application/json"));
        assert!(raw.contains("\"page_type\":\"recording\""));
        assert!(raw.contains("\"time_spent_seconds\":4"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (base, server) = one_shot_server("HTTP/1.1 500 Internal Server Error").await;
        let sink = HttpSink::new(&base, DEFAULT_VISIT_PATH, None).unwrap();

        let err = sink.deliver(&visit(), Delivery::KeepAlive).await.unwrap_err();
        assert!(err.to_string().contains("500"));

        let raw = server.await.unwrap();
        assert!(!raw.to_ascii_lowercase().contains("authorization"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_server_is_waited_for() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (received_tx, received_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            received_tx.send(()).unwrap();
            release_rx.await.unwrap();
            reply(&mut socket, "HTTP/1.1 204 No Content").await;
        });

        let sink = HttpSink::new(&base, DEFAULT_VISIT_PATH, None).unwrap();
        let send = tokio::spawn(async move { sink.deliver(&visit(), Delivery::KeepAlive).await });

        received_rx.await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!send.is_finished());

        release_tx.send(()).unwrap();
        send.await.unwrap().unwrap();
        server.await.unwrap();
    }
}
