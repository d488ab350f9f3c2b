//! Value encoding for the backing store
//!
//! Values are serialized with `serde_json` and optionally gzip-compressed.
//! Every stored payload carries a one-byte frame header naming its encoding,
//! so reads do not depend on the writer's compression setting.

use anyhow::{Context, Result, anyhow};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{Read, Write};

const FRAME_PLAIN: u8 = 0;
const FRAME_GZIP: u8 = 1;

/// Serialization settings for one wrapper
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    /// Compress payloads larger than `min_bytes`
    pub compression: bool,
    /// Size threshold below which compression is skipped
    pub min_bytes: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            compression: false,
            min_bytes: 1024,
        }
    }
}

impl Codec {
    pub fn new(compression: bool, min_bytes: usize) -> Self {
        Self {
            compression,
            min_bytes,
        }
    }

    /// Encode a value into a framed payload.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(value).context("failed to serialize cache value")?;

        if self.compression && json.len() >= self.min_bytes {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(&json)
                .context("failed to gzip cache value")?;
            let compressed = encoder.finish().context("failed to finish gzip stream")?;

            let mut framed = Vec::with_capacity(compressed.len() + 1);
            framed.push(FRAME_GZIP);
            framed.extend_from_slice(&compressed);
            Ok(framed)
        } else {
            let mut framed = Vec::with_capacity(json.len() + 1);
            framed.push(FRAME_PLAIN);
            framed.extend_from_slice(&json);
            Ok(framed)
        }
    }

    /// Decode a framed payload back into a value.
    ///
    /// Fails on an unknown frame byte or corrupt payload; callers treat that
    /// as a cache miss.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let (frame, payload) = bytes
            .split_first()
            .ok_or_else(|| anyhow!("empty cache payload"))?;

        match *frame {
            FRAME_PLAIN => {
                serde_json::from_slice(payload).context("failed to deserialize cache value")
            }
            FRAME_GZIP => {
                let mut decoder = GzDecoder::new(payload);
                let mut json = Vec::new();
                decoder
                    .read_to_end(&mut json)
                    .context("failed to gunzip cache value")?;
                serde_json::from_slice(&json).context("failed to deserialize cache value")
            }
            other => Err(anyhow!("unknown cache frame byte: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Product {
        id: u64,
        name: String,
        price: f64,
    }

    fn product() -> Product {
        Product {
            id: 7,
            name: "Widget".to_string(),
            price: 899.99,
        }
    }

    #[test]
    fn test_round_trip_plain() {
        let codec = Codec::default();
        let bytes = codec.encode(&product()).unwrap();
        assert_eq!(bytes.first(), Some(&FRAME_PLAIN));
        let decoded: Product = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, product());
    }

    #[test]
    fn test_round_trip_compressed() {
        let codec = Codec::new(true, 16);
        let big = Product {
            id: 1,
            name: "x".repeat(4096),
            price: 1.0,
        };
        let bytes = codec.encode(&big).unwrap();
        assert_eq!(bytes.first(), Some(&FRAME_GZIP));
        assert!(bytes.len() < 4096, "compressible payload should shrink");
        let decoded: Product = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, big);
    }

    #[test]
    fn test_small_values_stay_plain_under_threshold() {
        let codec = Codec::new(true, 1024);
        let bytes = codec.encode(&product()).unwrap();
        assert_eq!(bytes.first(), Some(&FRAME_PLAIN));
    }

    #[test]
    fn test_reader_independent_of_writer_settings() {
        let writer = Codec::new(true, 1);
        let reader = Codec::default();
        let bytes = writer.encode(&product()).unwrap();
        let decoded: Product = reader.decode(&bytes).unwrap();
        assert_eq!(decoded, product());
    }

    #[test]
    fn test_corrupt_payload_is_an_error() {
        let codec = Codec::default();
        assert!(codec.decode::<Product>(&[]).is_err());
        assert!(codec.decode::<Product>(&[9, 1, 2, 3]).is_err());
        assert!(codec.decode::<Product>(&[FRAME_PLAIN, b'{']).is_err());
    }
}
