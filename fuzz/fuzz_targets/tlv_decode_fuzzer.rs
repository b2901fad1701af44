//! Fuzz target for OMA-TLV decoding
//!
//! # Strategy
//!
//! - Raw payloads against the entry decoder
//! - The same payload against every Device resource definition, covering
//!   each resource type and multiple-instance resources
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - Decoded entries never claim more value bytes than the input holds

#![no_main]

use libfuzzer_sys::fuzz_target;
use lwm2m_proto::{tlv, ObjectType, OmaRegistry, Registry};

fuzz_target!(|data: &[u8]| {
    if let Ok(entries) = tlv::decode_entries(data) {
        let total: usize = entries.iter().map(|e| e.value.len()).sum();
        assert!(total <= data.len());
    }

    let registry = OmaRegistry::new();
    let Some(device) = registry.definition(ObjectType::DEVICE) else {
        return;
    };
    for resource in device.resources() {
        let _ = tlv::decode(data, resource);
    }
});
