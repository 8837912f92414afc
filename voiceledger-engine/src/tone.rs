use std::f32::consts::TAU;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::Ringer;

/// Receives rendered PCM (mono f32 in [-1, 1]).
pub trait PcmSink: Send + Sync {
    fn write(&self, samples: &[f32], sample_rate_hz: u32);
}

/// North-American style ringback: 440 Hz + 480 Hz, 2 s on, 4 s off.
#[derive(Debug, Clone, PartialEq)]
pub struct RingTone {
    pub sample_rate_hz: u32,
    pub frequencies_hz: [f32; 2],
    pub on: Duration,
    pub off: Duration,
    pub amplitude: f32,
}

impl RingTone {
    pub fn ringback(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            frequencies_hz: [440.0, 480.0],
            on: Duration::from_secs(2),
            off: Duration::from_secs(4),
            amplitude: 0.2,
        }
    }

    pub fn period(&self) -> Duration {
        self.on + self.off
    }

    fn samples_for(&self, d: Duration) -> usize {
        (d.as_secs_f64() * self.sample_rate_hz as f64).round() as usize
    }

    pub fn is_on_at(&self, n: usize) -> bool {
        let period = self.samples_for(self.period()).max(1);
        n % period < self.samples_for(self.on)
    }

    pub fn sample_at(&self, n: usize) -> f32 {
        if !self.is_on_at(n) {
            return 0.0;
        }
        let t = n as f32 / self.sample_rate_hz as f32;
        let mix: f32 = self
            .frequencies_hz
            .iter()
            .map(|f| (TAU * f * t).sin())
            .sum::<f32>()
            / self.frequencies_hz.len() as f32;
        mix * self.amplitude
    }

    /// One full on/off cadence.
    pub fn render_period(&self) -> Vec<f32> {
        (0..self.samples_for(self.period()))
            .map(|n| self.sample_at(n))
            .collect()
    }
}

/// Loops the ring tone into a sink until stopped.
pub struct ToneRinger {
    tone: RingTone,
    sink: Arc<dyn PcmSink>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ToneRinger {
    pub fn new(tone: RingTone, sink: Arc<dyn PcmSink>) -> Self {
        Self {
            tone,
            sink,
            task: Mutex::new(None),
        }
    }
}

impl Ringer for ToneRinger {
    fn start(&self) {
        let mut task = match self.task.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if task.is_some() {
            return;
        }

        let clip = self.tone.render_period();
        let rate = self.tone.sample_rate_hz;
        let period = self.tone.period();
        let sink = self.sink.clone();
        *task = Some(tokio::spawn(async move {
            loop {
                sink.write(&clip, rate);
                tokio::time::sleep(period).await;
            }
        }));
    }

    fn stop(&self) {
        let mut task = match self.task.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(t) = task.take() {
            t.abort();
        }
    }
}

impl Drop for ToneRinger {
    fn drop(&mut self) {
        self.stop();
    }
}
