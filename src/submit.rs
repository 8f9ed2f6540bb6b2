//! Upload of hash results to the hiveforge API.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use color_eyre::eyre::{Context, Result, bail};
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};

use hiveforge_core::HashRunSummary;

use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::payload;

/// Path of the hash result endpoint.
pub const HASH_RESULTS_PATH: &str = "/api/v1/hash-results";

/// Path of the credential refresh endpoint.
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";

/// Sends hash results with a bearer credential.
pub struct Submitter {
    client: reqwest::Client,
    base_url: String,
    credential_path: PathBuf,
}

impl Submitter {
    /// Build an HTTP client from the client configuration.
    pub fn new(config: &ClientConfig, credential_path: PathBuf) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(cacert) = &config.cacert_file {
            let pem = fs::read(cacert)
                .wrap_err_with(|| format!("Failed to read CA certificate {}", cacert.display()))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .wrap_err_with(|| format!("Invalid CA certificate {}", cacert.display()))?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(Self {
            client: builder.build().wrap_err("Failed to build HTTP client")?,
            base_url: config.base_url(),
            credential_path,
        })
    }

    /// Full URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Upload a summary. Any non-2xx response is an error carrying the body.
    pub async fn submit(&self, summary: &HashRunSummary) -> Result<()> {
        let credential = self.credential().await?;
        let payload = payload::encode(summary)?;
        let url = self.url(HASH_RESULTS_PATH);

        tracing::info!(
            url = %url,
            files = summary.total_files,
            json_len = payload.json_len,
            bytes = payload.body.len(),
            encoding = payload.encoding.as_str(),
            "submitting hash result"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&credential.token)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, payload.encoding.as_str())
            .body(payload.body)
            .send()
            .await
            .wrap_err_with(|| format!("Failed to send hash result to {url}"))?;

        let status = response.status();
        let body = read_body(response).await;
        if !status.is_success() {
            bail!("API returned non-OK status: {}, body: {}", status.as_u16(), body);
        }

        tracing::debug!(status = status.as_u16(), body = %body, "hash result accepted");
        Ok(())
    }

    /// Load the stored credential, refreshing it first when due.
    async fn credential(&self) -> Result<Credential> {
        let credential = Credential::load(&self.credential_path)?;
        let now = Utc::now();

        if credential.is_expired(now) {
            bail!(
                "Credential in {} expired at {}",
                self.credential_path.display(),
                credential.expires_at
            );
        }
        if !credential.refresh_due(now) {
            return Ok(credential);
        }

        let refreshed = self.refresh(&credential).await?;
        refreshed.save(&self.credential_path)?;
        tracing::info!(expires_at = %refreshed.expires_at, "credential refreshed");
        Ok(refreshed)
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let url = self.url(REFRESH_PATH);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&credential.token)
            .send()
            .await
            .wrap_err_with(|| format!("Failed to refresh credential at {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = read_body(response).await;
            bail!("Credential refresh failed: {}, body: {}", status.as_u16(), body);
        }
        let body = response
            .text()
            .await
            .wrap_err("Failed to read refreshed credential")?;
        serde_json::from_str(&body).wrap_err("Failed to parse refreshed credential")
    }
}

/// Response body as text, or a note saying why it could not be read.
async fn read_body(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_else(describe_body_error)
}

fn describe_body_error(err: reqwest::Error) -> String {
    format!("<unreadable response body: {err}>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveforge_core::DirectoryEntry;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::path::Path;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config() -> ClientConfig {
        ClientConfig {
            api_endpoint: "127.0.0.1".to_string(),
            port: 4000,
            cacert_file: None,
            debug: false,
        }
    }

    fn empty_summary() -> HashRunSummary {
        HashRunSummary::assemble(
            Path::new("/data").to_path_buf(),
            DirectoryEntry::new_directory("data"),
            Duration::from_secs(1),
            Vec::new(),
        )
    }

    /// Answers one request with a 500 whose body stops short of its length.
    fn truncated_error_server() -> (u16, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_lowercase();
                if let Some(end) = text.find("\r\n\r\n") {
                    let body_len = text
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .map(|v| v.trim().parse::<usize>().unwrap())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }
            let response = b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\r\npartial";
            stream.write_all(response).unwrap();
        });
        (port, handle)
    }

    #[test]
    fn test_endpoint_urls() {
        let submitter = Submitter::new(&config(), PathBuf::from("cred.json")).unwrap();
        assert_eq!(
            submitter.url(HASH_RESULTS_PATH),
            "http://127.0.0.1:4000/api/v1/hash-results"
        );
        assert_eq!(submitter.url(REFRESH_PATH), "http://127.0.0.1:4000/api/v1/auth/refresh");
    }

    #[test]
    fn test_missing_cacert_is_error() {
        let mut config = config();
        config.cacert_file = Some(PathBuf::from("/nonexistent/ca.pem"));
        assert!(Submitter::new(&config, PathBuf::from("cred.json")).is_err());
    }

    #[tokio::test]
    async fn test_submit_without_credential_fails_before_sending() {
        let temp = TempDir::new().unwrap();
        let submitter = Submitter::new(&config(), temp.path().join("missing.json")).unwrap();
        let err = submitter.submit(&empty_summary()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read credential"));
    }

    #[tokio::test]
    async fn test_unreadable_error_body_is_reported() {
        let (port, server) = truncated_error_server();
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let response = client
            .get(format!("http://127.0.0.1:{port}/"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 500);

        let body = read_body(response).await;
        server.join().unwrap();
        assert!(body.starts_with("<unreadable response body: "), "{body}");
    }
}
