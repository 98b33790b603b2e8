//! Fuzzes attention report decoding.
//!
//! The first bytes of the input pick a touch/button layout, the rest is fed
//! to `decode_attention` as the report. Decoding must never panic and never
//! claim more bytes than the report carries.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_rmi_attention

#![no_main]

use hid_rmi_protocol::{
    AttentionLayout, ButtonLayout, TouchLayout, decode_attention, irq_mask,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let [fingers, touch_base, button_base, gpio, buttons, pull, rest @ ..] = data else {
        return;
    };

    let touch_base = u16::from(touch_base & 0x07);
    let button_base = u16::from(button_base & 0x07);
    let layout = AttentionLayout {
        touch: Some(TouchLayout {
            irq_mask: irq_mask(touch_base, 1),
            interrupt_base: touch_base,
            max_fingers: *fingers,
            max_y: u16::from_le_bytes([*pull, *buttons]),
        }),
        buttons: Some(ButtonLayout {
            irq_mask: irq_mask(button_base, 1),
            interrupt_base: button_base,
            gpio_led_count: gpio & 0x1F,
            button_mask: u32::from(*buttons),
            state_mask: u32::from(*pull),
        }),
    };

    if let Ok(frame) = decode_attention(&layout, rest) {
        assert!(frame.consumed + 2 <= rest.len().max(2));
        if let Some(touch) = frame.touch {
            assert!(touch.slot_count() <= 10);
        }
    }
});
