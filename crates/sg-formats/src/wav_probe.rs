//! WAV header probing: sample rate and length without decoding audio.

use crate::FormatError;

const FORMAT_PCM: u16 = 1;
const FORMAT_FLOAT: u16 = 3;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// What a segment needs to know about a WAV file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Length in sample frames.
    pub frames: u64,
}

impl WavInfo {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Read the `fmt ` and `data` chunks of a RIFF/WAVE file.
///
/// A truncated `data` chunk counts only the frames actually present.
pub fn probe_wav(data: &[u8]) -> Result<WavInfo, FormatError> {
    if data.len() < 12 {
        return Err(FormatError::UnexpectedEof);
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(FormatError::InvalidHeader);
    }

    let mut pos = 12;
    let mut fmt: Option<(u16, u32, u16)> = None;
    let mut data_size: Option<usize> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32_le(data, pos + 4) as usize;

        if chunk_id == b"fmt " {
            if chunk_size < 16 || pos + 24 > data.len() {
                return Err(FormatError::UnexpectedEof);
            }
            let format = read_u16_le(data, pos + 8);
            if !matches!(format, FORMAT_PCM | FORMAT_FLOAT | FORMAT_EXTENSIBLE) {
                return Err(FormatError::UnsupportedVersion);
            }
            let channels = read_u16_le(data, pos + 10);
            let rate = read_u32_le(data, pos + 12);
            let bits = read_u16_le(data, pos + 22);
            fmt = Some((channels, rate, bits));
        } else if chunk_id == b"data" {
            let available = data.len() - (pos + 8);
            data_size = Some(chunk_size.min(available));
            if fmt.is_some() {
                break;
            }
        }

        pos = pos.saturating_add(8).saturating_add(chunk_size);
        if pos % 2 != 0 {
            pos += 1;
        }
    }

    let (channels, sample_rate, bits_per_sample) = fmt.ok_or(FormatError::InvalidHeader)?;
    let data_size = data_size.ok_or(FormatError::InvalidHeader)?;
    if channels == 0 || sample_rate == 0 || bits_per_sample == 0 || bits_per_sample % 8 != 0 {
        return Err(FormatError::UnsupportedVersion);
    }

    let block_align = channels as usize * (bits_per_sample as usize / 8);
    Ok(WavInfo {
        sample_rate,
        channels,
        bits_per_sample,
        frames: (data_size / block_align) as u64,
    })
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}
