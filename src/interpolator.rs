//! Exponential smoothing of the visual parameters, one channel per scalar.
//!
//! A channel only asks the frame clock for work while it is visibly moving.
//! Once the gap to its target drops below [`EPSILON`] it snaps onto the
//! target and goes idle until the next `set_target`.

use std::mem;

use crate::mapper::VisualParameters;

pub const EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Speed,
    Amplitude,
    Frequency,
    StarDensity,
    ColorShift,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Speed,
        Channel::Amplitude,
        Channel::Frequency,
        Channel::StarDensity,
        Channel::ColorShift,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Token for one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

/// The host renderer's frame callback, as seen by the channels.
pub trait FrameClock {
    fn request_frame(&mut self) -> FrameId;
    fn cancel_frame(&mut self, id: FrameId);
}

/// Frame requests waiting for the next frame.
#[derive(Debug, Default)]
pub struct FrameQueue {
    next_id: u64,
    pending: Vec<FrameId>,
}

impl FrameQueue {
    pub fn new() -> FrameQueue {
        FrameQueue::default()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[FrameId] {
        &self.pending
    }

    /// Everything requested up to now. Requests made while handling the
    /// returned batch land in the next one.
    pub fn take_due(&mut self) -> Vec<FrameId> {
        mem::take(&mut self.pending)
    }
}

impl FrameClock for FrameQueue {
    fn request_frame(&mut self) -> FrameId {
        let id = FrameId(self.next_id);
        self.next_id += 1;
        self.pending.push(id);
        id
    }

    fn cancel_frame(&mut self, id: FrameId) {
        self.pending.retain(|pending| *pending != id);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interpolator {
    current: f64,
    target: f64,
    scheduled: Option<FrameId>,
}

impl Interpolator {
    pub fn new(initial: f64) -> Interpolator {
        Interpolator { current: initial, target: initial, scheduled: None }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_converging(&self) -> bool {
        self.scheduled.is_some()
    }

    pub fn set_target(&mut self, target: f64, frames: &mut dyn FrameClock) {
        self.target = target;
        if self.scheduled.is_none() {
            self.scheduled = Some(frames.request_frame());
        }
    }

    /// Runs the frame `id` if it is the one this channel is waiting on.
    /// Returns the published value, or `None` for a foreign or cancelled frame.
    pub fn on_frame(&mut self, id: FrameId, rate: f64, frames: &mut dyn FrameClock) -> Option<f64> {
        if self.scheduled != Some(id) {
            return None;
        }
        self.scheduled = None;

        let diff = self.target - self.current;
        if diff.abs() > EPSILON {
            self.current += diff * rate;
            self.scheduled = Some(frames.request_frame());
        } else {
            self.current = self.target;
        }
        Some(self.current)
    }

    pub fn cancel(&mut self, frames: &mut dyn FrameClock) {
        if let Some(id) = self.scheduled.take() {
            frames.cancel_frame(id);
        }
    }

    pub fn reset(&mut self, value: f64, frames: &mut dyn FrameClock) {
        self.cancel(frames);
        self.current = value;
        self.target = value;
    }
}

/// All parameter channels, indexed by [`Channel`], sharing one convergence rate.
#[derive(Debug, Clone)]
pub struct ChannelBank {
    rate: f64,
    channels: Vec<Interpolator>,
}

impl ChannelBank {
    pub fn new(initial: VisualParameters, rate: f64) -> ChannelBank {
        let channels = Channel::ALL.iter()
            .map(|channel| Interpolator::new(initial.get(*channel)))
            .collect();
        ChannelBank { rate, channels }
    }

    pub fn channel(&self, channel: Channel) -> &Interpolator {
        &self.channels[channel.index()]
    }

    pub fn set_target(&mut self, channel: Channel, target: f64, frames: &mut dyn FrameClock) {
        self.channels[channel.index()].set_target(target, frames);
    }

    /// Retargets every channel whose target differs from `targets`.
    pub fn retarget(&mut self, targets: &VisualParameters, frames: &mut dyn FrameClock) {
        for channel in Channel::ALL {
            let target = targets.get(channel);
            if self.channel(channel).target() != target {
                self.set_target(channel, target, frames);
            }
        }
    }

    pub fn on_frame(&mut self, id: FrameId, frames: &mut dyn FrameClock) -> Option<(Channel, f64)> {
        let rate = self.rate;
        Channel::ALL.iter()
            .zip(self.channels.iter_mut())
            .find_map(|(channel, interpolator)| {
                interpolator.on_frame(id, rate, &mut *frames).map(|value| (*channel, value))
            })
    }

    pub fn is_idle(&self) -> bool {
        self.channels.iter().all(|channel| !channel.is_converging())
    }

    pub fn cancel_all(&mut self, frames: &mut dyn FrameClock) {
        for channel in &mut self.channels {
            channel.cancel(frames);
        }
    }

    pub fn reset(&mut self, values: VisualParameters, frames: &mut dyn FrameClock) {
        for channel in Channel::ALL {
            self.channels[channel.index()].reset(values.get(channel), frames);
        }
    }

    pub fn values(&self) -> VisualParameters {
        let mut values = VisualParameters::NEUTRAL;
        for channel in Channel::ALL {
            values.set(channel, self.channel(channel).current());
        }
        values
    }
}
