use crate::backup::compress::{Compressor, CompressorBuilder};
use crate::backup::result_error::result::Result;
use bon::Builder;
use liblzma::stream::{Check, MtStreamBuilder};
use liblzma::write::XzEncoder;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::io::Write;
use std::num::NonZero;
use validator::Validate;

static DEFAULT_COMPRESSION_LEVEL: u32 = 6;
static DEFAULT_MAX_PARALLELIZATION: usize = 32;

/// XZ (LZMA2) compression settings.
///
/// `level` ranges from 0 (fastest) to 9 (smallest). `thread` is the number of
/// encoder threads; it defaults to half the available cores and `1` selects
/// the single threaded encoder.
#[skip_serializing_none]
#[derive(Clone, Default, Validate, Serialize, Deserialize, Debug, PartialEq, Eq, Builder)]
#[serde(deny_unknown_fields)]
pub struct XzConfig {
    #[validate(range(min = 0, max = 9))]
    level: Option<u32>,
    #[validate(range(min = 1))]
    thread: Option<u32>,
}

impl XzConfig {
    fn thread_count(&self) -> u32 {
        self.thread.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZero::get)
                .map(|core| (core / 2).clamp(1, DEFAULT_MAX_PARALLELIZATION) as u32)
                .unwrap_or(1)
        })
    }
}

impl<W: Write> CompressorBuilder<W> for XzConfig {
    fn build_compressor(&self, writer: W) -> Result<Compressor<W>> {
        let level = self.level.unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        let thread = self.thread_count();
        tracing::debug!("Creating xz compressor with level={}, threads={}", level, thread);

        if thread == 1 {
            Ok(XzEncoder::new(writer, level).into())
        } else {
            let stream = MtStreamBuilder::new()
                .preset(level)
                .check(Check::Crc64)
                .threads(thread)
                .encoder()?;
            Ok(XzEncoder::new_stream(writer, stream).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(XzConfig::default().validate().is_ok());
        assert!(XzConfig::builder().level(9).thread(4).build().validate().is_ok());
        assert!(XzConfig::builder().level(10).build().validate().is_err());
        assert!(XzConfig::builder().thread(0).build().validate().is_err());
    }

    #[test]
    fn test_thread_count() {
        assert_eq!(XzConfig::builder().thread(3).build().thread_count(), 3);
        let auto = XzConfig::default().thread_count();
        assert!((1..=DEFAULT_MAX_PARALLELIZATION as u32).contains(&auto));
    }

    #[test]
    fn test_build_single_and_multi_thread() {
        for thread in [1, 2] {
            let config = XzConfig::builder().level(1).thread(thread).build();
            match config.build_compressor(Vec::new()).unwrap() {
                Compressor::XzEncoder(_) => (),
                _ => panic!("Expected XzEncoder"),
            }
        }
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<XzConfig>(r#"{"level": 3}"#).is_ok());
        assert!(serde_json::from_str::<XzConfig>(r#"{"preset": 3}"#).is_err());
    }
}
