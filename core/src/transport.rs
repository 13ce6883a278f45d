//! Blocking `Transport` implementation backed by `ureq`.
//!
//! # Design
//! The agent is configured with `http_status_as_error(false)` so 4xx/5xx
//! responses come back as data and `GraphClient` owns status
//! interpretation. Only connection, TLS, and timeout failures surface as
//! `io::Error`.

use std::io;
use std::time::Duration;

use tracing::trace;
use ureq::Agent;
use uuid::Uuid;

use crate::http::{BinaryAttachment, HttpResponse, Transport};

/// `Transport` that performs real HTTP round-trips with `ureq`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /// Build a transport whose exchanges fail after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(180))
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, header_token: Option<&str>) -> io::Result<HttpResponse> {
        trace!(url = %redact(url), "GET");
        let mut request = self.agent.get(url);
        if let Some(token) = header_token {
            request = request.header("Authorization", format!("OAuth {token}"));
        }
        read_response(request.call())
    }

    fn post(
        &self,
        url: &str,
        header_token: Option<&str>,
        params: &str,
        attachments: &[BinaryAttachment],
    ) -> io::Result<HttpResponse> {
        trace!(url = %redact(url), attachments = attachments.len(), "POST");
        let mut request = self.agent.post(url);
        if let Some(token) = header_token {
            request = request.header("Authorization", format!("OAuth {token}"));
        }
        let result = if attachments.is_empty() {
            request
                .content_type("application/x-www-form-urlencoded")
                .send(params.as_bytes())
        } else {
            let boundary = multipart_boundary(attachments);
            let body = multipart_body(&boundary, attachments);
            request
                .content_type(format!("multipart/form-data; boundary={boundary}"))
                .send(&body[..])
        };
        read_response(result)
    }

    fn delete(&self, url: &str, header_token: Option<&str>) -> io::Result<HttpResponse> {
        trace!(url = %redact(url), "DELETE");
        let mut request = self.agent.delete(url);
        if let Some(token) = header_token {
            request = request.header("Authorization", format!("OAuth {token}"));
        }
        read_response(request.call())
    }
}

fn read_response(
    result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
) -> io::Result<HttpResponse> {
    let mut response = result.map_err(into_io)?;
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let body = response.body_mut().read_to_string().map_err(into_io)?;
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn into_io(e: ureq::Error) -> io::Error {
    match e {
        ureq::Error::Io(io) => io,
        ureq::Error::Timeout(t) => io::Error::new(io::ErrorKind::TimedOut, t.to_string()),
        other => io::Error::other(other.to_string()),
    }
}

/// A fresh boundary that occurs in none of the attachment payloads.
fn multipart_boundary(attachments: &[BinaryAttachment]) -> String {
    loop {
        let boundary = format!("graphlink-{}", Uuid::new_v4().simple());
        let collides = attachments.iter().any(|a| {
            a.data
                .windows(boundary.len())
                .any(|w| w == boundary.as_bytes())
        });
        if !collides {
            return boundary;
        }
    }
}

/// Percent-escapes the characters that would end a quoted header parameter.
fn quote_param(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Builds a multipart/form-data body with one part per attachment.
fn multipart_body(boundary: &str, attachments: &[BinaryAttachment]) -> Vec<u8> {
    let mut body = Vec::new();
    for attachment in attachments {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                quote_param(&attachment.field_name),
                quote_param(&attachment.filename)
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", attachment.content_type).as_bytes());
        body.extend_from_slice(&attachment.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

/// Strips the query string so tokens never reach the logs.
pub(crate) fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_body_wraps_each_attachment() {
        let attachments = vec![
            BinaryAttachment::new("source", "cat.png", "image/png", b"PNGDATA".to_vec()),
            BinaryAttachment::new("thumb", "t.jpg", "image/jpeg", b"JPG".to_vec()),
        ];
        let boundary = multipart_boundary(&attachments);
        let body = String::from_utf8(multipart_body(&boundary, &attachments)).unwrap();
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.contains("name=\"source\"; filename=\"cat.png\""));
        assert!(body.contains("Content-Type: image/png\r\n\r\nPNGDATA\r\n"));
        assert!(body.contains("name=\"thumb\"; filename=\"t.jpg\""));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn boundary_is_fresh_and_absent_from_payloads() {
        let first = multipart_boundary(&[]);
        let second = multipart_boundary(&[]);
        assert_ne!(first, second);

        // A payload that embeds an earlier boundary cannot be split by the next one.
        let payload = format!("prefix--{first}--suffix").into_bytes();
        let attachments = vec![BinaryAttachment::new("source", "a.bin", "application/octet-stream", payload)];
        let boundary = multipart_boundary(&attachments);
        assert!(!attachments[0]
            .data
            .windows(boundary.len())
            .any(|w| w == boundary.as_bytes()));
    }

    #[test]
    fn disposition_parameters_are_escaped() {
        let attachments = vec![BinaryAttachment::new(
            "source",
            "evil\"; name=\"x\r\n.png",
            "image/png",
            b"D".to_vec(),
        )];
        let body = String::from_utf8(multipart_body("b", &attachments)).unwrap();
        assert!(body.contains("filename=\"evil%22; name=%22x%0D%0A.png\"\r\n"));
        assert_eq!(body.matches("Content-Disposition").count(), 1);
    }

    #[test]
    fn redact_drops_query() {
        assert_eq!(
            redact("https://graph.facebook.com/me?access_token=secret"),
            "https://graph.facebook.com/me"
        );
        assert_eq!(redact("https://graph.facebook.com/me"), "https://graph.facebook.com/me");
    }
}
