use serde::{ Deserialize, Serialize };
use thiserror::Error;

pub mod connection;
pub mod websocket;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    #[serde(rename = "usage")]
    pub usage_percent: f64,
}

/// Byte counts plus the usage percentage the server computed for them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(rename = "total")]
    pub total_bytes: f64,
    #[serde(rename = "used")]
    pub used_bytes: f64,
    #[serde(rename = "usage")]
    pub usage_percent: f64,
}

/// One decoded snapshot of the server's resource usage.
///
/// The serde layout is the wire layout, so a sample serializes back into
/// the same JSON shape it was received in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub cpu: CpuUsage,
    pub ram: ResourceUsage,
    pub storage: ResourceUsage,
    #[serde(rename = "timestamp")]
    pub sampled_at_millis: f64,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid stats JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} usage is not a finite number")]
    NonFinite { field: &'static str },
}

impl TelemetrySample {
    pub fn cpu_usage_percent(&self) -> f64 {
        self.cpu.usage_percent
    }
}

impl TryFrom<&str> for TelemetrySample {
    type Error = DecodeError;

    fn try_from(payload: &str) -> Result<Self, Self::Error> {
        let sample: TelemetrySample = serde_json::from_str(payload)?;

        // Ranges are not enforced, the mapper clamps whatever arrives.
        let usages = [
            ("cpu", sample.cpu.usage_percent),
            ("ram", sample.ram.usage_percent),
            ("storage", sample.storage.usage_percent),
        ];
        for (field, usage) in usages {
            if !usage.is_finite() {
                return Err(DecodeError::NonFinite { field });
            }
        }

        Ok(sample)
    }
}

#[cfg(test)]
pub(crate) fn sample(cpu: f64, ram: f64, storage: f64) -> TelemetrySample {
    TelemetrySample {
        cpu: CpuUsage { usage_percent: cpu },
        ram: ResourceUsage { total_bytes: 16.0 * 1024f64.powi(3), used_bytes: 8.0 * 1024f64.powi(3), usage_percent: ram },
        storage: ResourceUsage { total_bytes: 2.0 * 1024f64.powi(4), used_bytes: 1024f64.powi(4), usage_percent: storage },
        sampled_at_millis: 1_700_000_000_000.0,
    }
}
