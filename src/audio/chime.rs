use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44_100;
/// Two short rising notes, like a chirp.
const NOTES: [(f32, f32); 2] = [(1_760.0, 0.09), (2_349.3, 0.14)];

/// Finite mono chirp played when a new species is sighted.
pub struct Chirp {
    sample: usize,
    total_samples: usize,
}

impl Chirp {
    pub fn new() -> Self {
        let seconds: f32 = NOTES.iter().map(|(_, len)| len).sum();
        Self {
            sample: 0,
            total_samples: (seconds * SAMPLE_RATE as f32) as usize,
        }
    }

    fn note_at(&self, t: f32) -> Option<(f32, f32, f32)> {
        let mut offset = 0.0;
        for (freq, len) in NOTES {
            if t < offset + len {
                return Some((freq, t - offset, len));
            }
            offset += len;
        }
        None
    }
}

impl Iterator for Chirp {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.sample >= self.total_samples {
            return None;
        }
        let t = self.sample as f32 / SAMPLE_RATE as f32;
        self.sample += 1;

        let (freq, local_t, len) = self.note_at(t)?;
        // Linear decay over each note to avoid clicks at the boundaries.
        let envelope = 1.0 - local_t / len;
        Some((2.0 * PI * freq * local_t).sin() * envelope * 0.2)
    }
}

impl Source for Chirp {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples.saturating_sub(self.sample))
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / SAMPLE_RATE as f32,
        ))
    }
}
