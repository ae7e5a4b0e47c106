#![no_main]

use jupiter_core::jupiter::wire::{decode_message, encode_message};
use jupiter_core::jupiter::{WireFormat, WireMessage};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Malformed input must be rejected with an error, never a panic.
    // Whatever decodes must encode again and decode to the same value.
    for format in [WireFormat::Binary, WireFormat::Json] {
        if let Ok(message) = decode_message(data, format) {
            let bytes = encode_message(&message, format).expect("decoded message re-encodes");
            let again: WireMessage = decode_message(&bytes, format).expect("re-encoded message decodes");
            assert_eq!(again, message);
        }
    }

    if let Ok(json_str) = std::str::from_utf8(data) {
        let _ = serde_json::from_str::<jupiter_core::Request>(json_str);
    }
});
