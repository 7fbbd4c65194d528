// Integration tests: decoding and encoding frames through a parsed network
use dbc_decoder::{parse, CodecError, DecoderConfig, MuxContext, Network, RawValue};

fn network(signals: &str) -> Network {
    let text = format!(
        "VERSION \"\"\nNS_ :\nBS_:\nBU_: ECU1 ECU2\nBO_ 1 Frame: 8 ECU1\n{}",
        signals
    );
    parse(&text).unwrap()
}

fn decode(network: &Network, signal: &str, frame: &[u8]) -> f64 {
    network
        .decode_signal(1, signal, frame, MuxContext::FromFrame)
        .unwrap()
}

#[test]
fn test_literal_bit_vectors() {
    let network = network(
        " SG_ LeByte : 0|8@1+ (1,0) [0|0] \"\" ECU2\n\
         \x20SG_ BeByte : 7|8@0+ (1,0) [0|0] \"\" ECU2\n\
         \x20SG_ Nibble : 4|4@1+ (1,0) [0|0] \"\" ECU2\n\
         \x20SG_ Signed : 0|8@1- (1,0) [0|0] \"\" ECU2\n",
    );
    let frame = [0x2A, 0, 0, 0, 0, 0, 0, 0];
    assert_eq!(decode(&network, "LeByte", &frame), 42.0);
    assert_eq!(decode(&network, "BeByte", &frame), 42.0);
    assert_eq!(decode(&network, "Nibble", &frame), 2.0);

    let frame = [0xFF, 0, 0, 0, 0, 0, 0, 0];
    assert_eq!(decode(&network, "Signed", &frame), -1.0);

    let decoded = network
        .decode_message(1, &frame, &DecoderConfig::default())
        .unwrap();
    assert_eq!(decoded.signal("Signed").unwrap().raw_value, RawValue::Signed(-1));
}

#[test]
fn test_multi_byte_layouts() {
    let network = network(
        " SG_ Intel : 0|16@1+ (1,0) [0|0] \"\" ECU2\n\
         \x20SG_ Motorola : 23|16@0+ (1,0) [0|0] \"\" ECU2\n\
         \x20SG_ Odd : 36|12@0+ (1,0) [0|0] \"\" ECU2\n",
    );
    let frame = [0x34, 0x12, 0x12, 0x34, 0x1A, 0xBC, 0, 0];
    assert_eq!(decode(&network, "Intel", &frame), 0x1234 as f64);
    assert_eq!(decode(&network, "Motorola", &frame), 0x1234 as f64);
    // Motorola starting mid-byte: bits 4..0 of byte 4, then byte 5 down to bit 1
    assert_eq!(decode(&network, "Odd", &frame), ((0x1A & 0x1F) << 7 | 0xBC >> 1) as f64);
}

#[test]
fn test_scaling() {
    let network = network(" SG_ Temp : 0|8@1+ (0.1,-40) [-40|-20] \"degC\" ECU2\n");
    let value = decode(&network, "Temp", &[100, 0, 0, 0, 0, 0, 0, 0]);
    assert!((value - -30.0).abs() < 1e-9);

    // Out-of-range values pass through; range membership is reported separately
    let decoded = network
        .decode_message(1, &[255, 0, 0, 0, 0, 0, 0, 0], &DecoderConfig::default())
        .unwrap();
    let temp = decoded.signal("Temp").unwrap();
    assert!((temp.value - -14.5).abs() < 1e-9);
    assert!(!temp.within_range);
    assert_eq!(temp.unit.as_deref(), Some("degC"));

    let decoded = network
        .decode_message(1, &[50, 0, 0, 0, 0, 0, 0, 0], &DecoderConfig::default())
        .unwrap();
    assert!(decoded.signal("Temp").unwrap().within_range);
}

#[test]
fn test_float_signals() {
    let network = network(
        " SG_ Single : 0|32@1- (1,0) [0|0] \"\" ECU2\n\
         \x20SG_ Short : 32|16@1- (1,0) [0|0] \"\" ECU2\n\
         SIG_VALTYPE_ 1 Single : 1;\n\
         SIG_VALTYPE_ 1 Short : 1;\n",
    );
    let mut frame = [0u8; 8];
    frame[..4].copy_from_slice(&1.5f32.to_le_bytes());
    assert_eq!(decode(&network, "Single", &frame), 1.5);

    assert!(matches!(
        network.decode_signal(1, "Short", &frame, MuxContext::FromFrame),
        Err(CodecError::UnsupportedValueRepresentation { .. })
    ));

    let encoded = network
        .encode_signal(1, "Single", -2.25, &frame, MuxContext::FromFrame)
        .unwrap();
    assert_eq!(&encoded[..4], &(-2.25f32).to_le_bytes());
}

#[test]
fn test_multiplexing() {
    let network = network(
        " SG_ Mode M : 0|8@1+ (1,0) [0|0] \"\" ECU2\n\
         \x20SG_ A m2 : 8|8@1+ (1,0) [0|0] \"\" ECU2\n\
         \x20SG_ B m3 : 8|8@1+ (1,0) [0|0] \"\" ECU2\n\
         \x20SG_ C m1 : 16|8@1+ (1,0) [0|0] \"\" ECU2\n\
         SG_MUL_VAL_ 1 A Mode 2-2;\n\
         SG_MUL_VAL_ 1 B Mode 3-3;\n\
         SG_MUL_VAL_ 1 C Mode 1-1, 4-6;\n",
    );
    let frame = [2, 7, 9, 0, 0, 0, 0, 0];
    assert_eq!(decode(&network, "A", &frame), 7.0);
    assert_eq!(
        network.decode_signal(1, "B", &frame, MuxContext::FromFrame),
        Err(CodecError::MultiplexorNotPresent {
            signal: "B".to_string(),
            active: Some(2)
        })
    );

    // Extended ranges
    for (mode, present) in [(1u8, true), (2, false), (4, true), (6, true), (7, false)] {
        let frame = [mode, 0, 9, 0, 0, 0, 0, 0];
        assert_eq!(
            network
                .decode_signal(1, "C", &frame, MuxContext::FromFrame)
                .is_ok(),
            present,
            "mode {}",
            mode
        );
    }

    // Explicit contexts
    assert_eq!(
        network.decode_signal(1, "B", &frame, MuxContext::Active(3)),
        Ok(7.0)
    );
    assert!(network
        .decode_signal(1, "A", &frame, MuxContext::Unknown)
        .is_err());
}

#[test]
fn test_encode_decode_round_trip() {
    let network = network(
        " SG_ Speed : 0|16@1+ (0.01,0) [0|655.35] \"km/h\" ECU2\n\
         \x20SG_ Angle : 23|12@0- (0.1,0) [-204.8|204.7] \"deg\" ECU2\n\
         \x20SG_ Flag : 63|1@0+ (1,0) [0|1] \"\" ECU2\n",
    );

    let data = network
        .encode_message(1, &[("Speed", 123.45), ("Angle", -12.3), ("Flag", 1.0)])
        .unwrap();
    assert!((decode(&network, "Speed", &data) - 123.45).abs() < 0.005);
    assert!((decode(&network, "Angle", &data) - -12.3).abs() < 0.05);
    assert_eq!(decode(&network, "Flag", &data), 1.0);

    // Re-encoding one signal leaves the others alone
    let updated = network
        .encode_signal(1, "Speed", 1.0, &data, MuxContext::FromFrame)
        .unwrap();
    assert_eq!(decode(&network, "Speed", &updated), 1.0);
    assert!((decode(&network, "Angle", &updated) - -12.3).abs() < 0.05);
    assert_eq!(decode(&network, "Flag", &updated), 1.0);
}

#[test]
fn test_short_frame() {
    let network = network(" SG_ Late : 56|8@1+ (1,0) [0|0] \"\" ECU2\n");
    assert_eq!(
        network.decode_signal(1, "Late", &[0; 4], MuxContext::FromFrame),
        Err(CodecError::BitRangeOutOfBounds {
            signal: "Late".to_string(),
            required: 8,
            available: 4
        })
    );
}
