use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};
use stamp_logging::stamp_debug;

use crate::persist::AtomicFileWriter;
use crate::query::{parse_reply_status, timestamp_query};
use crate::{FailureKind, StampError, StampOutcome};

const QUERY_CONTENT_TYPE: &str = "application/timestamp-query";
const REPLY_CONTENT_TYPE: &str = "application/timestamp-reply";

#[derive(Debug, Clone)]
pub struct TimestamperSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_reply_bytes: u64,
}

impl Default for TimestamperSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_reply_bytes: 1024 * 1024,
        }
    }
}

#[async_trait::async_trait]
pub trait Timestamper: Send + Sync {
    /// Sends a request for `digest` and checks that a timestamp is granted.
    async fn test_connectivity(&self, url: &str, digest: &[u8; 32]) -> Result<(), StampError>;

    async fn stamp_file(
        &self,
        url: &str,
        input: &Path,
        output: &Path,
    ) -> Result<StampOutcome, StampError>;
}

/// Talks RFC 3161 over HTTP. A stamped file is the time server's reply token
/// for the SHA-256 of the input, written next to it.
#[derive(Debug, Clone)]
pub struct ReqwestTimestamper {
    settings: TimestamperSettings,
    client: reqwest::Client,
}

impl ReqwestTimestamper {
    pub fn new(settings: TimestamperSettings) -> Result<Self, StampError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| StampError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    async fn request(&self, url: &str, digest: &[u8; 32]) -> Result<Vec<u8>, StampError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| StampError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .post(parsed)
            .header(CONTENT_TYPE, QUERY_CONTENT_TYPE)
            .body(timestamp_query(digest))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StampError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_reply_bytes {
                return Err(StampError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_reply_bytes,
                        actual: Some(content_len),
                    },
                    "reply too large",
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        if let Some(ct) = content_type.as_deref() {
            let essence = ct.split(';').next().unwrap_or(ct).trim();
            if !essence.eq_ignore_ascii_case(REPLY_CONTENT_TYPE) {
                return Err(StampError::new(
                    FailureKind::UnexpectedContentType {
                        content_type: ct.to_string(),
                    },
                    "time server did not answer with a timestamp reply",
                ));
            }
        }

        let mut reply = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = reply.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_reply_bytes {
                return Err(StampError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_reply_bytes,
                        actual: Some(next_len),
                    },
                    "reply too large",
                ));
            }
            reply.extend_from_slice(&chunk);
        }

        match parse_reply_status(&reply) {
            Some(status) if status.is_granted() => Ok(reply),
            Some(status) => Err(StampError::new(
                FailureKind::Rejected {
                    status: status.code(),
                },
                "timestamp not granted",
            )),
            None => Err(StampError::new(
                FailureKind::MalformedReply,
                "reply is not a TimeStampResp",
            )),
        }
    }
}

#[async_trait::async_trait]
impl Timestamper for ReqwestTimestamper {
    async fn test_connectivity(&self, url: &str, digest: &[u8; 32]) -> Result<(), StampError> {
        let reply = self.request(url, digest).await?;
        stamp_debug!("Test request to {} answered with {} bytes", url, reply.len());
        Ok(())
    }

    async fn stamp_file(
        &self,
        url: &str,
        input: &Path,
        output: &Path,
    ) -> Result<StampOutcome, StampError> {
        let content = tokio::fs::read(input)
            .await
            .map_err(|err| StampError::new(FailureKind::Io, err.to_string()))?;
        let digest: [u8; 32] = Sha256::digest(&content).into();

        let reply = self.request(url, &digest).await?;
        let reply_bytes = reply.len() as u64;

        let target = output.to_path_buf();
        let written = tokio::task::spawn_blocking(move || write_reply(&target, &reply))
            .await
            .map_err(|err| StampError::new(FailureKind::Io, err.to_string()))??;

        Ok(StampOutcome {
            output: written,
            reply_bytes,
        })
    }
}

fn write_reply(target: &Path, reply: &[u8]) -> Result<PathBuf, StampError> {
    let (writer, filename) = AtomicFileWriter::for_target(target)
        .map_err(|err| StampError::new(FailureKind::Io, err.to_string()))?;
    writer
        .write(&filename, reply)
        .map_err(|err| StampError::new(FailureKind::Io, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> StampError {
    if err.is_timeout() {
        return StampError::new(FailureKind::Timeout, err.to_string());
    }
    StampError::new(FailureKind::Network, err.to_string())
}
