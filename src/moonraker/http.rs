//! REST status client.
use crate::acquisition::status::StatusSource;
use crate::acquisition::types::StatusSample;
use crate::config::PrinterConfig;
use crate::error::{AppResult, DaqError};
use crate::moonraker::protocol::{parse_status_response, status_query_url};
use async_trait::async_trait;
use chrono::Utc;

/// Polls `printer/objects/query` for heater and progress values.
#[derive(Debug, Clone)]
pub struct MoonrakerStatusClient {
    client: reqwest::Client,
    url: String,
}

impl MoonrakerStatusClient {
    /// Build a client for the printer described by `config`.
    pub fn new(config: &PrinterConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DaqError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: status_query_url(&config.status_base_url()),
        })
    }

    /// Full query URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StatusSource for MoonrakerStatusClient {
    async fn query(&self) -> AppResult<StatusSample> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        parse_status_response(&body, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};

    /// Serve a single HTTP response, returning the request line.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request.lines().next().unwrap_or_default().to_string()
        });
        (base, handle)
    }

    fn client_for(base: String) -> MoonrakerStatusClient {
        MoonrakerStatusClient::new(&PrinterConfig {
            status_url: Some(base),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn queries_heaters_and_progress() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"result":{"status":{"heater_bed":{"temperature":60.1,"target":60.0},"extruder":{"temperature":215.0,"target":215.0},"display_status":{"progress":0.25}}}}"#,
        )
        .await;

        let status = assert_ok!(client_for(base).query().await);
        assert!(status.heaters_at_target());
        assert_eq!(status.progress, 0.25);

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with(
            "GET /printer/objects/query?heater_bed&extruder&print_stats&display_status "
        ));
    }

    #[tokio::test]
    async fn http_errors_are_recoverable() {
        let (base, _server) = serve_once("503 Service Unavailable", "{}").await;
        let err = assert_err!(client_for(base).query().await);
        assert!(matches!(err, DaqError::StatusQuery(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn unreachable_printer_is_recoverable() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = assert_err!(client_for(base).query().await);
        assert!(err.is_recoverable());
    }
}
