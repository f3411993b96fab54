//! QR image fetch and encode
//!
//! This module handles:
//! - Requesting a QR image for a value from a remote chart service
//! - Decoding whatever image format comes back
//! - Re-encoding it as PNG and base64 so it fits in a dataset cell

use crate::error::FetchError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use log::debug;
use std::io::{Cursor, Read};
use std::time::Duration;

/// Chart endpoint that renders `cht=qr` requests
pub const DEFAULT_CHART_URL: &str = "https://chart.googleapis.com/chart";

/// Edge length used when the caller does not ask for a size
pub const DEFAULT_QR_SIZE: u32 = 300;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest response body accepted (5 MiB)
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;

const USER_AGENT: &str = concat!("report-pipeline/", env!("CARGO_PKG_VERSION"));

/// A PNG image plus its base64 text form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub png: Vec<u8>,
    pub base64: String,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// Value to store in a dataset cell
    pub fn as_cell(&self) -> serde_json::Value {
        serde_json::Value::String(self.base64.clone())
    }
}

/// HTTP client for the chart service
#[derive(Debug, Clone)]
pub struct ChartClient {
    agent: ureq::Agent,
    base_url: String,
    max_bytes: u64,
}

impl ChartClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).user_agent(USER_AGENT).build();
        Self { agent, base_url: base_url.into(), max_bytes: DEFAULT_MAX_BYTES }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// GET the QR image for `value` and return the raw response body.
    pub fn fetch_qr_bytes(&self, value: &str, width: u32, height: u32) -> Result<Vec<u8>, FetchError> {
        debug!("fetching {}x{} QR image from {}", width, height, self.base_url);

        let resp = self
            .agent
            .get(&self.base_url)
            .query("cht", "qr")
            .query("chs", &format!("{}x{}", width, height))
            .query("chl", value)
            .call()?;

        let len = resp.header("Content-Length").and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
        if len > self.max_bytes {
            return Err(FetchError::TooLarge { limit: self.max_bytes });
        }

        // The reader owns the connection; it is released when dropped.
        let mut data = Vec::with_capacity(len as usize);
        resp.into_reader().take(self.max_bytes + 1).read_to_end(&mut data)?;
        if data.len() as u64 > self.max_bytes {
            return Err(FetchError::TooLarge { limit: self.max_bytes });
        }

        debug!("received {} bytes from chart service", data.len());
        Ok(data)
    }
}

impl Default for ChartClient {
    fn default() -> Self {
        Self::new(DEFAULT_CHART_URL, DEFAULT_FETCH_TIMEOUT)
    }
}

/// Fetch a QR image for `value` and return it as base64 PNG.
pub fn fetch_encoded_image(client: &ChartClient, value: &str, width: u32, height: u32) -> Result<EncodedImage, FetchError> {
    let bytes = client.fetch_qr_bytes(value, width, height)?;
    encode_image_bytes(&bytes)
}

/// Decode `bytes` as any supported image and re-encode it as PNG.
///
/// Deterministic: the same input always yields the same text.
pub fn encode_image_bytes(bytes: &[u8]) -> Result<EncodedImage, FetchError> {
    let img = image::load_from_memory(bytes)?;

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    Ok(EncodedImage { base64: STANDARD.encode(&png), width: img.width(), height: img.height(), png })
}
