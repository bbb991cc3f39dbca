// Unit tests for the PCM conversion and transport encoding rules.
//
// Conversion: clamp to [-1, 1], scale negatives by 32768 and non-negatives
// by 32767, truncate toward zero. Encoding: little-endian bytes, standard
// base64 alphabet.

use base64::Engine;
use voicelink::audio::pcm::{convert_block, encode_block};

#[test]
fn test_boundary_values() {
    assert_eq!(convert_block(&[-1.0, 0.0, 1.0]), vec![-32768, 0, 32767]);
}

#[test]
fn test_out_of_range_inputs_clamp_before_scaling() {
    // -1.5/1.5 must clamp first, not wrap or overflow
    assert_eq!(convert_block(&[-1.5, 1.5]), vec![-32768, 32767]);
}

#[test]
fn test_asymmetric_scaling() {
    assert_eq!(convert_block(&[-0.5]), vec![-16384]); // -0.5 * 32768
    assert_eq!(convert_block(&[0.5]), vec![16383]); // 0.5 * 32767 = 16383.5, truncated
}

#[test]
fn test_output_length_matches_input_length() {
    for len in [0usize, 1, 7, 4096] {
        let samples = vec![0.25f32; len];
        assert_eq!(convert_block(&samples).len(), len);
    }
}

#[test]
fn test_order_preserved() {
    let converted = convert_block(&[0.1, -0.2, 0.3]);
    assert_eq!(converted.len(), 3);
    assert!(converted[0] > 0 && converted[1] < 0 && converted[2] > 0);
    assert_eq!(converted[0], (0.1f32 * 32767.0) as i16);
    assert_eq!(converted[1], (-0.2f32 * 32768.0) as i16);
    assert_eq!(converted[2], (0.3f32 * 32767.0) as i16);
}

#[test]
fn test_encoding_is_little_endian_standard_base64() {
    // 0x1234 little-endian -> [0x34, 0x12]
    let encoded = encode_block(&[0x1234, -1]);
    let expected =
        base64::engine::general_purpose::STANDARD.encode([0x34u8, 0x12, 0xFF, 0xFF]);
    assert_eq!(encoded, expected);
    // Standard alphabet, no line breaks
    assert!(!encoded.contains('\n'));
}

#[test]
fn test_full_block_round_shape() {
    // A 4096-sample block encodes to ceil(8192 / 3) * 4 base64 chars
    let block = vec![0.0f32; 4096];
    let encoded = encode_block(&convert_block(&block));
    assert_eq!(encoded.len(), 8192_usize.div_ceil(3) * 4);
}
