//! HTTP adapter for the Computer Vision Read API v3.2.
//!
//! Two calls make up the protocol:
//!
//! ```text
//! POST {endpoint}/vision/v3.2/read/analyze[?language=xx]   → 202 + Operation-Location
//! GET  {endpoint}/vision/v3.2/read/analyzeResults/{id}     → { status, analyzeResult? }
//! ```
//!
//! Status codes are mapped onto [`OcrError`] by [`classify_status`] so the
//! mapping can be tested without a server.

use super::model::{OperationHandle, ReadOperationResult};
use super::ReadService;
use crate::config::OcrConfig;
use crate::error::{ChartReadError, OcrError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use tracing::{debug, warn};

const READ_ANALYZE_PATH: &str = "/vision/v3.2/read/analyze";
const READ_RESULTS_PATH: &str = "/vision/v3.2/read/analyzeResults";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "Operation-Location";

/// Read API client bound to one resource endpoint.
#[derive(Debug, Clone)]
pub struct ReadClient {
    http: reqwest::Client,
    config: OcrConfig,
}

impl ReadClient {
    /// Build a client; the configuration is validated first.
    pub fn new(config: OcrConfig) -> Result<Self, ChartReadError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChartReadError::Internal(format!("HTTP client: {e}")))?;
        debug!("Read API client initialised for {}", config.base_url());
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    fn analyze_url(&self) -> String {
        format!("{}{}", self.config.base_url(), READ_ANALYZE_PATH)
    }

    fn result_url(&self, handle: &OperationHandle) -> String {
        format!("{}{}/{}", self.config.base_url(), READ_RESULTS_PATH, handle)
    }
}

#[async_trait]
impl ReadService for ReadClient {
    async fn submit(
        &self,
        content: &[u8],
        language: Option<&str>,
    ) -> Result<OperationHandle, OcrError> {
        if content.is_empty() {
            return Err(OcrError::InvalidRequest {
                status: 0,
                detail: "document is empty".into(),
            });
        }

        let mut request = self
            .http
            .post(self.analyze_url())
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content.to_vec());
        if let Some(lang) = language {
            request = request.query(&[("language", lang)]);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &headers, &body));
        }

        let handle = operation_handle(&headers)?;
        debug!("Read operation submitted: {}", handle);
        Ok(handle)
    }

    async fn fetch_result(
        &self,
        handle: &OperationHandle,
    ) -> Result<ReadOperationResult, OcrError> {
        let response = self
            .http
            .get(self.result_url(handle))
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.key)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &headers, &body));
        }

        response
            .json::<ReadOperationResult>()
            .await
            .map_err(|e| OcrError::MalformedResponse(e.to_string()))
    }
}

/// Pull the operation handle out of the `Operation-Location` header.
pub fn operation_handle(headers: &HeaderMap) -> Result<OperationHandle, OcrError> {
    headers
        .get(OPERATION_LOCATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(OperationHandle::from_operation_location)
        .ok_or(OcrError::NoOperationId)
}

/// Map a non-success HTTP status onto the OCR error taxonomy.
pub fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> OcrError {
    let detail = service_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    });

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_secs = headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            warn!(
                "Read API rate limit exceeded (retry after {:?}s). Retry with exponential backoff.",
                retry_after_secs
            );
            OcrError::RateLimited { retry_after_secs }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OcrError::AuthFailed {
            status: status.as_u16(),
            detail,
        },
        s if s.is_client_error() => {
            warn!("Read API bad request: {detail} — check the file format and size");
            OcrError::InvalidRequest {
                status: s.as_u16(),
                detail,
            }
        }
        s => OcrError::ServiceUnavailable {
            reason: format!("HTTP {}: {}", s.as_u16(), detail),
        },
    }
}

/// Extract `error.message` from a Cognitive Services error body.
fn service_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

fn transport_error(e: reqwest::Error) -> OcrError {
    let reason = if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    };
    OcrError::ServiceUnavailable { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::model::OperationStatus;
    use reqwest::header::HeaderValue;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one HTTP request with `response`; the task yields the raw request.
    async fn serve_once(response: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}"), task)
    }

    fn reply(status_line: &str, headers: &[&str], body: &str) -> String {
        let mut out = format!("HTTP/1.1 {status_line}\r\n");
        for h in headers {
            out.push_str(h);
            out.push_str("\r\n");
        }
        out.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ));
        out
    }

    fn local_client(endpoint: &str) -> ReadClient {
        let mut config = OcrConfig::new(endpoint, "secret-key");
        config.allow_insecure_endpoint = true;
        ReadClient::new(config).unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn handle_from_headers() {
        let h = headers(&[(
            "operation-location",
            "https://x.cognitiveservices.azure.com/vision/v3.2/read/analyzeResults/a1b2",
        )]);
        assert_eq!(operation_handle(&h).unwrap().as_str(), "a1b2");
    }

    #[test]
    fn missing_operation_location_is_no_operation_id() {
        let h = headers(&[("content-length", "0")]);
        assert_eq!(operation_handle(&h), Err(OcrError::NoOperationId));
    }

    #[test]
    fn rate_limit_reads_retry_after() {
        let h = headers(&[("retry-after", "7")]);
        let e = classify_status(StatusCode::TOO_MANY_REQUESTS, &h, "");
        assert_eq!(
            e,
            OcrError::RateLimited {
                retry_after_secs: Some(7)
            }
        );
    }

    #[test]
    fn bad_request_carries_service_message() {
        let body = r#"{"error":{"code":"InvalidImageFormat","message":"Input data is not a valid image."}}"#;
        let e = classify_status(StatusCode::BAD_REQUEST, &HeaderMap::new(), body);
        assert_eq!(
            e,
            OcrError::InvalidRequest {
                status: 400,
                detail: "Input data is not a valid image.".into()
            }
        );
    }

    #[test]
    fn auth_failures() {
        let e = classify_status(StatusCode::UNAUTHORIZED, &HeaderMap::new(), "");
        assert!(matches!(e, OcrError::AuthFailed { status: 401, .. }));
    }

    #[test]
    fn server_errors_are_unavailable() {
        let e = classify_status(StatusCode::SERVICE_UNAVAILABLE, &HeaderMap::new(), "oops");
        match e {
            OcrError::ServiceUnavailable { reason } => assert!(reason.contains("503")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn urls() {
        let client =
            ReadClient::new(OcrConfig::new("https://x.cognitiveservices.azure.com/", "k")).unwrap();
        assert_eq!(
            client.analyze_url(),
            "https://x.cognitiveservices.azure.com/vision/v3.2/read/analyze"
        );
        assert_eq!(
            client.result_url(&OperationHandle::new("op1")),
            "https://x.cognitiveservices.azure.com/vision/v3.2/read/analyzeResults/op1"
        );
    }

    #[tokio::test]
    async fn empty_content_rejected_before_network() {
        // Port 9 is never listened on; reaching the network would fail differently.
        let mut config = OcrConfig::new("http://127.0.0.1:9", "k");
        config.allow_insecure_endpoint = true;
        let client = ReadClient::new(config).unwrap();
        let err = client.submit(&[], None).await.unwrap_err();
        assert!(matches!(err, OcrError::InvalidRequest { status: 0, .. }));
    }

    #[tokio::test]
    async fn submit_over_http_returns_handle() {
        let (endpoint, server) = serve_once(reply(
            "202 Accepted",
            &["Operation-Location: https://x.cognitiveservices.azure.com/vision/v3.2/read/analyzeResults/abc-1"],
            "",
        ))
        .await;

        let handle = local_client(&endpoint)
            .submit(b"%PDF-1.7", Some("en"))
            .await
            .unwrap();
        assert_eq!(handle, OperationHandle::new("abc-1"));

        let request = server.await.unwrap();
        assert!(
            request.starts_with("POST /vision/v3.2/read/analyze?language=en HTTP/1.1"),
            "got: {request}"
        );
        let lower = request.to_ascii_lowercase();
        assert!(lower.contains("ocp-apim-subscription-key: secret-key"));
        assert!(lower.contains("content-type: application/octet-stream"));
        assert!(request.ends_with("%PDF-1.7"));
    }

    #[tokio::test]
    async fn accepted_without_operation_location_is_no_operation_id() {
        let (endpoint, server) = serve_once(reply("202 Accepted", &[], "")).await;
        let err = local_client(&endpoint)
            .submit(b"%PDF", None)
            .await
            .unwrap_err();
        assert_eq!(err, OcrError::NoOperationId);
        assert!(server.await.unwrap().starts_with("POST /vision/v3.2/read/analyze HTTP/1.1"));
    }

    #[tokio::test]
    async fn throttled_submit_is_rate_limited() {
        let (endpoint, _server) =
            serve_once(reply("429 Too Many Requests", &["Retry-After: 3"], "")).await;
        let err = local_client(&endpoint)
            .submit(b"%PDF", None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OcrError::RateLimited {
                retry_after_secs: Some(3)
            }
        );
    }

    #[tokio::test]
    async fn fetch_result_over_http_decodes_payload() {
        let body = r#"{"status":"succeeded","analyzeResult":{"version":"3.2.0","readResults":[{"page":1,"lines":[{"text":"Q1 100"}]}]}}"#;
        let (endpoint, server) =
            serve_once(reply("200 OK", &["Content-Type: application/json"], body)).await;

        let result = local_client(&endpoint)
            .fetch_result(&OperationHandle::new("abc-1"))
            .await
            .unwrap();
        assert_eq!(result.status, OperationStatus::Succeeded);
        let pages = result.analyze_result.unwrap().read_results;
        assert_eq!(pages[0].lines.as_ref().unwrap()[0].text, "Q1 100");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /vision/v3.2/read/analyzeResults/abc-1 HTTP/1.1"));
    }

    #[tokio::test]
    async fn garbled_result_is_malformed() {
        let (endpoint, _server) = serve_once(reply("200 OK", &[], "not json")).await;
        let err = local_client(&endpoint)
            .fetch_result(&OperationHandle::new("abc-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::MalformedResponse(_)));
    }
}
