//! PCM WAV header layout for the intermediate audio track.

use crate::models::media::AudioFormat;

/// Size of the canonical RIFF/WAVE header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Build the 44-byte header for `data_size` bytes of PCM in `format`.
///
/// ```text
/// [0-3]   "RIFF"          [4-7]   36 + data_size
/// [8-11]  "WAVE"          [12-15] "fmt "
/// [16-19] 16              [20-21] 1 (PCM)
/// [22-23] channels        [24-27] sample_rate
/// [28-31] byte_rate       [32-33] block_align
/// [34-35] bit_depth       [36-39] "data"
/// [40-43] data_size
/// ```
pub fn wav_header(format: &AudioFormat, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let mut header = [0u8; WAV_HEADER_SIZE];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36u32.saturating_add(data_size)).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&(format.byte_rate() as u32).to_le_bytes());
    header[32..34].copy_from_slice(&(format.block_align() as u16).to_le_bytes());
    header[34..36].copy_from_slice(&format.bit_depth.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
    header
}

/// Read the format and data size back out of a canonical header.
///
/// Returns `None` for anything that is not a 44-byte PCM header.
#[cfg(test)]
pub(crate) fn parse_wav_header(bytes: &[u8]) -> Option<(AudioFormat, u32)> {
    if bytes.len() < WAV_HEADER_SIZE || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }
    if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
        return None;
    }
    let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
    let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    if u16_at(20) != 1 {
        return None;
    }

    let format = AudioFormat {
        channels: u16_at(22),
        sample_rate: u32_at(24),
        bit_depth: u16_at(34),
    };
    Some((format, u32_at(40)))
}
