use crate::models::media::AudioFormat;

/// Overlay mixer for little-endian PCM streams of one shared format.
///
/// `mix` adds the streams sample by sample and saturates at the bit depth's
/// range instead of wrapping. Shorter streams are treated as silence past
/// their end. Supported depths: 8-bit unsigned, 16/24/32-bit signed.
#[derive(Debug, Clone, Copy)]
pub struct AudioMixer {
    format: AudioFormat,
}

impl AudioMixer {
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }

    /// Mix `streams` into one. Trailing bytes that do not form a whole
    /// sample are dropped.
    pub fn mix(&self, streams: &[&[u8]]) -> Vec<u8> {
        let width = self.format.bytes_per_sample();
        let sample_count = streams.iter().map(|s| s.len() / width).max().unwrap_or(0);
        if sample_count == 0 {
            return Vec::new();
        }

        let (min, max) = self.range();
        let mut mixed = Vec::with_capacity(sample_count * width);
        for index in 0..sample_count {
            let offset = index * width;
            let sum: i64 = streams
                .iter()
                .filter(|s| offset + width <= s.len())
                .map(|s| self.decode(&s[offset..offset + width]))
                .sum();
            self.encode(sum.clamp(min, max), &mut mixed);
        }
        mixed
    }

    /// Peak absolute level of `samples`, normalized to 0.0–1.0.
    pub fn peak_level(&self, samples: &[u8]) -> f32 {
        let width = self.format.bytes_per_sample();
        let (_, max) = self.range();
        let peak = samples
            .chunks_exact(width)
            .map(|s| self.decode(s).unsigned_abs())
            .max()
            .unwrap_or(0);
        (peak as f64 / max as f64).min(1.0) as f32
    }

    /// Representable range of one sample, centered on zero.
    fn range(&self) -> (i64, i64) {
        match self.format.bit_depth {
            8 => (-128, 127),
            24 => (-(1 << 23), (1 << 23) - 1),
            32 => (i32::MIN as i64, i32::MAX as i64),
            _ => (i16::MIN as i64, i16::MAX as i64),
        }
    }

    fn decode(&self, bytes: &[u8]) -> i64 {
        match self.format.bit_depth {
            8 => bytes[0] as i64 - 128,
            24 => {
                let raw = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]);
                (raw >> 8) as i64
            }
            32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
            _ => i16::from_le_bytes([bytes[0], bytes[1]]) as i64,
        }
    }

    fn encode(&self, value: i64, out: &mut Vec<u8>) {
        match self.format.bit_depth {
            8 => out.push((value + 128) as u8),
            24 => out.extend_from_slice(&(value as i32).to_le_bytes()[..3]),
            32 => out.extend_from_slice(&(value as i32).to_le_bytes()),
            _ => out.extend_from_slice(&(value as i16).to_le_bytes()),
        }
    }
}
