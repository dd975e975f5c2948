use serde::Serialize;

use crate::interpolator::Channel;
use crate::stats::TelemetrySample;

pub const PARAMETER_MIN: f64 = 0.85;
pub const PARAMETER_MAX: f64 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualParameters {
    pub speed: f64,
    pub amplitude: f64,
    pub frequency: f64,
    pub star_density: f64,
    pub color_shift: f64,
}

impl VisualParameters {
    pub const NEUTRAL: VisualParameters = VisualParameters {
        speed: 1.0,
        amplitude: 1.0,
        frequency: 1.0,
        star_density: 1.0,
        color_shift: 1.0,
    };

    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Speed => self.speed,
            Channel::Amplitude => self.amplitude,
            Channel::Frequency => self.frequency,
            Channel::StarDensity => self.star_density,
            Channel::ColorShift => self.color_shift,
        }
    }

    pub fn set(&mut self, channel: Channel, value: f64) {
        match channel {
            Channel::Speed => self.speed = value,
            Channel::Amplitude => self.amplitude = value,
            Channel::Frequency => self.frequency = value,
            Channel::StarDensity => self.star_density = value,
            Channel::ColorShift => self.color_shift = value,
        }
    }
}

impl Default for VisualParameters {
    fn default() -> Self {
        VisualParameters::NEUTRAL
    }
}

fn clamp01(t: f64) -> f64 {
    t.min(1.0).max(0.0)
}

fn lerp(lo: f64, hi: f64, t: f64) -> f64 {
    lo + (hi - lo) * t
}

fn scale(usage_percent: f64) -> f64 {
    lerp(PARAMETER_MIN, PARAMETER_MAX, clamp01(usage_percent / 100.0))
}

/// CPU drives speed and color shift, RAM drives amplitude and storage drives
/// star density. Frequency never follows the stats.
pub fn map(sample: Option<&TelemetrySample>) -> VisualParameters {
    let sample = match sample {
        Some(sample) => sample,
        None => return VisualParameters::NEUTRAL,
    };

    let cpu = scale(sample.cpu_usage_percent());
    VisualParameters {
        speed: cpu,
        amplitude: scale(sample.ram.usage_percent),
        frequency: 1.0,
        star_density: scale(sample.storage.usage_percent),
        color_shift: cpu,
    }
}
