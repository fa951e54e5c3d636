// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The HTTP seam between the delivery worker and the collector.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::TransportError;

/// Longest response body kept in [`TransportError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// A finished request handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportRequest {
	pub url: String,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
}

/// What came back from the collector.
#[derive(Debug, Clone)]
pub struct TransportResponse {
	pub status: u16,
	pub body: Vec<u8>,
}

/// Sends one request and reports the raw response.
///
/// Implementations do not interpret the status; the delivery worker does.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
	client: Client,
}

impl ReqwestTransport {
	/// Builds a client identifying itself with `user_agent` and bounded by
	/// `timeout` per request.
	pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
		let client = loom_common_http::builder_with_user_agent(user_agent)
			.timeout(timeout)
			.build()?;
		Ok(Self { client })
	}

	pub fn with_client(client: Client) -> Self {
		Self { client }
	}
}

#[async_trait]
impl Transport for ReqwestTransport {
	async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
		let mut builder = self.client.post(&request.url);
		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}

		let response = builder.body(request.body).send().await?;
		let status = response.status().as_u16();
		let body = response.bytes().await?.to_vec();

		debug!(url = %request.url, status, body_len = body.len(), "collector responded");

		Ok(TransportResponse { status, body })
	}
}

/// Turns a raw response into the stored event ID.
///
/// Anything but a 2xx status with a JSON object carrying a string `id` is a
/// failure.
pub(crate) fn parse_response(response: &TransportResponse) -> Result<String, TransportError> {
	if !(200..300).contains(&response.status) {
		let mut body = String::from_utf8_lossy(&response.body).into_owned();
		if body.len() > MAX_ERROR_BODY {
			let mut end = MAX_ERROR_BODY;
			while !body.is_char_boundary(end) {
				end -= 1;
			}
			body.truncate(end);
		}
		return Err(TransportError::Status {
			status: response.status,
			body,
		});
	}

	#[derive(serde::Deserialize)]
	struct StoreResponse {
		id: String,
	}

	serde_json::from_slice::<StoreResponse>(&response.body)
		.map(|parsed| parsed.id)
		.map_err(|e| TransportError::InvalidResponse(e.to_string()))
}


#[cfg(test)]
mod tests {
	use super::*;
	use wiremock::matchers::{body_bytes, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn response(status: u16, body: &str) -> TransportResponse {
		TransportResponse {
			status,
			body: body.as_bytes().to_vec(),
		}
	}

	#[test]
	fn test_parse_response_extracts_id() {
		let id = parse_response(&response(200, r#"{"id":"fc6d8c0c43fc4630ad850f5b9e6e4b2b"}"#)).unwrap();
		assert_eq!(id, "fc6d8c0c43fc4630ad850f5b9e6e4b2b");
	}

	#[test]
	fn test_parse_response_rejects_missing_id() {
		assert!(matches!(
			parse_response(&response(200, r#"{"ok":true}"#)),
			Err(TransportError::InvalidResponse(_))
		));
		assert!(matches!(
			parse_response(&response(200, "not json")),
			Err(TransportError::InvalidResponse(_))
		));
	}

	#[test]
	fn test_parse_response_rejects_error_status() {
		let long_body = "é".repeat(MAX_ERROR_BODY);
		match parse_response(&response(429, &long_body)) {
			Err(TransportError::Status { status, body }) => {
				assert_eq!(status, 429);
				assert!(body.len() <= MAX_ERROR_BODY);
			}
			other => panic!("unexpected result: {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_reqwest_transport_posts_headers_and_body() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/1/store/"))
			.and(header("X-Sentry-Auth", "Sentry sentry_key=abc"))
			.and(header("Content-Encoding", "gzip"))
			.and(body_bytes(b"payload".to_vec()))
			.respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"abc123"}"#))
			.expect(1)
			.mount(&server)
			.await;

		let transport = ReqwestTransport::new("loom-sentry-rust/test", Duration::from_secs(5)).unwrap();
		let response = transport
			.post(TransportRequest {
				url: format!("{}/api/1/store/", server.uri()),
				headers: vec![
					("X-Sentry-Auth".into(), "Sentry sentry_key=abc".into()),
					("Content-Encoding".into(), "gzip".into()),
				],
				body: b"payload".to_vec(),
			})
			.await
			.unwrap();

		assert_eq!(response.status, 200);
		assert_eq!(parse_response(&response).unwrap(), "abc123");
	}

	#[tokio::test]
	async fn test_reqwest_transport_reports_status_without_failing() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
			.mount(&server)
			.await;

		let transport = ReqwestTransport::new("loom-sentry-rust/test", Duration::from_secs(5)).unwrap();
		let response = transport
			.post(TransportRequest {
				url: server.uri(),
				headers: Vec::new(),
				body: Vec::new(),
			})
			.await
			.unwrap();

		assert_eq!(response.status, 403);
		assert!(matches!(
			parse_response(&response),
			Err(TransportError::Status { status: 403, .. })
		));
	}

	#[tokio::test]
	async fn test_reqwest_transport_surfaces_connection_errors() {
		let transport = ReqwestTransport::new("loom-sentry-rust/test", Duration::from_millis(500)).unwrap();
		let result = transport
			.post(TransportRequest {
				url: "http://127.0.0.1:9/api/1/store/".into(),
				headers: Vec::new(),
				body: Vec::new(),
			})
			.await;
		assert!(matches!(result, Err(TransportError::Request(_))));
	}
}
