//! Fuzz target for CoAP message decoding
//!
//! # Strategy
//!
//! - Raw datagrams: arbitrary bytes straight into `Message::decode`
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - A decoded message re-encodes, and decoding that yields the same message
//! - Request/response conversion of a decoded message never panics

#![no_main]

use libfuzzer_sys::fuzz_target;
use lwm2m_proto::coap::Message;

fuzz_target!(|data: &[u8]| {
    let Ok(message) = Message::decode(data) else {
        return;
    };

    let encoded = message.encode().expect("decoded message must re-encode");
    let again = Message::decode(&encoded).expect("re-encoded message must decode");
    assert_eq!(again, message);

    if message.is_request() {
        let _ = message.to_request();
    } else if message.is_response() {
        let _ = message.to_response();
    }
});
