//! §4.7 audio preparation: 32-bit float PCM mono -> 16-bit PCM mono wrapped in a canonical
//! RIFF/WAVE container.

const BITS_PER_SAMPLE: u16 = 16;
const CHANNELS: u16 = 1;

/// Clamp each sample to [-1, 1] and scale by 32767, little-endian, wrapped in a RIFF header.
pub fn encode_wav_mono_pcm16le(samples: &[f32], sample_rate_hz: u32) -> Vec<u8> {
    let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate_hz * block_align as u32;
    let data_len = (samples.len() * 2) as u32;
    let riff_len = 36 + data_len;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate_hz.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let scaled = (clamped * 32767.0) as i16;
        out.extend_from_slice(&scaled.to_le_bytes());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_declares_correct_lengths() {
        let samples = vec![0.0_f32; 100];
        let wav = encode_wav_mono_pcm16le(&samples, 44_100);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");
        let data_len = u32::from_le_bytes(wav[40..44].try_into().unwrap());
        assert_eq!(data_len, 200);
        assert_eq!(wav.len(), 44 + 200);
    }

    #[test]
    fn clamps_out_of_range_samples() {
        let samples = vec![2.0_f32, -2.0_f32];
        let wav = encode_wav_mono_pcm16le(&samples, 16_000);
        let first = i16::from_le_bytes(wav[44..46].try_into().unwrap());
        let second = i16::from_le_bytes(wav[46..48].try_into().unwrap());
        assert_eq!(first, 32767);
        assert_eq!(second, -32767);
    }
}
