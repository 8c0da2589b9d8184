//! Sample loading — the boundary with the strategy layer.
//!
//! The strategy layer writes one CSV row per kline:
//!
//! ```text
//! timestamp,close,long,short,exitlong,exitshort
//! 1600000000,10650.5,1,0,0,0
//! ```
//!
//! Signal cells accept `1/0`, `1.0/0.0` or `true/false`. Timestamps accept
//! epoch seconds, RFC 3339, or `YYYY-MM-DD HH:MM:SS` (UTC).
//!
//! Synthetic samples (random walk with random signals) are available for
//! development and are tagged as such in results.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use klinesim_core::domain::{PriceSample, Signals};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{de, Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

use crate::config::DataConfig;

/// Errors from loading samples.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read samples from {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("row {row}: timestamp {timestamp} is not after the previous sample")]
    OutOfOrder { row: usize, timestamp: DateTime<Utc> },
    #[error("row {row}: invalid close price {close}")]
    InvalidPrice { row: usize, close: f64 },
    #[error("no sample source configured")]
    NoSource,
}

/// Samples plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedSamples {
    pub samples: Vec<PriceSample>,
    pub dataset_hash: String,
    pub synthetic: bool,
}

#[derive(Debug, Deserialize)]
struct SampleRow {
    #[serde(deserialize_with = "timestamp")]
    timestamp: DateTime<Utc>,
    close: f64,
    #[serde(deserialize_with = "flag")]
    long: bool,
    #[serde(deserialize_with = "flag")]
    short: bool,
    #[serde(deserialize_with = "flag")]
    exitlong: bool,
    #[serde(deserialize_with = "flag")]
    exitshort: bool,
}

impl From<SampleRow> for PriceSample {
    fn from(row: SampleRow) -> Self {
        PriceSample::new(
            row.timestamp,
            row.close,
            Signals {
                enter_long: row.long,
                enter_short: row.short,
                exit_long: row.exitlong,
                exit_short: row.exitshort,
            },
        )
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim() {
        "1" | "1.0" | "true" | "True" => Ok(true),
        "0" | "0.0" | "false" | "False" | "" => Ok(false),
        other => Err(de::Error::custom(format!("invalid signal flag '{other}'"))),
    }
}

fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(raw.trim())
        .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp(secs, 0);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Read samples from a strategy CSV, enforcing strictly increasing timestamps.
pub fn load_samples_csv(path: &Path) -> Result<Vec<PriceSample>, LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut samples: Vec<PriceSample> = Vec::new();
    for (row, record) in reader.deserialize::<SampleRow>().enumerate() {
        let sample = PriceSample::from(record.map_err(csv_err)?);
        check_sample(&samples, row, &sample)?;
        samples.push(sample);
    }
    debug!(path = %path.display(), samples = samples.len(), "loaded samples");
    Ok(samples)
}

fn check_sample(prev: &[PriceSample], row: usize, sample: &PriceSample) -> Result<(), LoadError> {
    if !sample.is_valid() {
        return Err(LoadError::InvalidPrice {
            row,
            close: sample.close,
        });
    }
    if let Some(last) = prev.last() {
        if sample.timestamp <= last.timestamp {
            return Err(LoadError::OutOfOrder {
                row,
                timestamp: sample.timestamp,
            });
        }
    }
    Ok(())
}

/// Deterministic random-walk samples with random signals, five minutes apart.
pub fn synthetic_samples(len: usize, seed: u64) -> Vec<PriceSample> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = DateTime::<Utc>::from_timestamp(1_600_000_000, 0).unwrap_or_default();
    let mut price = 10_000.0_f64;

    (0..len)
        .map(|i| {
            price *= 1.0 + rng.gen_range(-0.004..0.004);
            let signals = Signals {
                enter_long: rng.gen_bool(0.04),
                enter_short: rng.gen_bool(0.04),
                exit_long: rng.gen_bool(0.06),
                exit_short: rng.gen_bool(0.06),
            };
            PriceSample::new(
                start + chrono::Duration::minutes(5 * i as i64),
                price,
                signals,
            )
        })
        .collect()
}

/// Load samples according to a `[data]` section.
pub fn load_samples(data: &DataConfig) -> Result<LoadedSamples, LoadError> {
    let (samples, synthetic) = match (&data.path, data.synthetic) {
        (Some(path), _) => (load_samples_csv(path)?, false),
        (None, true) => (synthetic_samples(data.synthetic_len, data.seed), true),
        (None, false) => return Err(LoadError::NoSource),
    };
    Ok(LoadedSamples {
        dataset_hash: dataset_hash(&samples),
        samples,
        synthetic,
    })
}

/// Deterministic BLAKE3 hash over timestamps, prices and signal flags.
pub fn dataset_hash(samples: &[PriceSample]) -> String {
    let mut hasher = blake3::Hasher::new();
    for sample in samples {
        hasher.update(&sample.timestamp.timestamp().to_le_bytes());
        hasher.update(&sample.close.to_le_bytes());
        let s = sample.signals;
        hasher.update(&[
            s.enter_long as u8,
            s.enter_short as u8,
            s.exit_long as u8,
            s.exit_short as u8,
        ]);
    }
    hasher.finalize().to_hex().to_string()
}
