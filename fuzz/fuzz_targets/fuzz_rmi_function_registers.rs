//! Fuzzes decoding of attach-time register blocks: PDT entries, F11 query
//! and control registers and the F30 GPIO configuration.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_rmi_function_registers

#![no_main]

use hid_rmi_protocol::f11::{self, F11Control, F11Query0, F11Query1};
use hid_rmi_protocol::f30::{ButtonWiring, F30Query};
use hid_rmi_protocol::{FunctionDescriptor, PdtEntry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(entry) = PdtEntry::parse(data) {
        let page = data.get(6).copied().unwrap_or(0);
        let function = FunctionDescriptor::from_pdt(&entry, page, u16::from(page));
        let _ = function.fires(u32::MAX);
    }

    if let [q0, q1, q8, ..] = data {
        let query0 = F11Query0::from_byte(*q0);
        let query1 = F11Query1::from_byte(*q1);
        assert!(query1.max_fingers >= 1 && query1.max_fingers <= 10);
        let _ = query0.query12_offset(f11::has_query10(*q8));
    }
    let _ = f11::physical_size_mm(data);
    let _ = F11Control::parse(data);

    if let Ok(query) = F30Query::parse(data) {
        let block = data.get(2..).unwrap_or_default();
        if let Ok(wiring) = ButtonWiring::from_control(&query, block) {
            assert!(wiring.button_count() <= usize::from(query.gpio_led_count));
            assert_eq!(wiring.button_mask & !wiring.state_mask, 0);
        }
    }
});
