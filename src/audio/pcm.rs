use base64::Engine;

/// Convert a block of float samples to 16-bit signed PCM.
///
/// Samples are clamped to [-1.0, 1.0] first. Negative samples scale by
/// 32768 and non-negative samples by 32767 (the two halves of the i16
/// range are asymmetric), truncating toward zero.
pub fn convert_block(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let s = s.clamp(-1.0, 1.0);
            if s < 0.0 {
                (s * 32768.0) as i16
            } else {
                (s * 32767.0) as i16
            }
        })
        .collect()
}

/// Serialize PCM samples as little-endian bytes and base64-encode them
/// (standard alphabet, no line breaks) for transport.
pub fn encode_block(samples: &[i16]) -> String {
    let pcm_bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    base64::engine::general_purpose::STANDARD.encode(pcm_bytes)
}
