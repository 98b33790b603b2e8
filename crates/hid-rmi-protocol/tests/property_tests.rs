use hid_rmi_protocol::attention::decode_buttons;
use hid_rmi_protocol::f11::{finger_count, report_size};
use hid_rmi_protocol::report::{ReadResponse, encode_read_request, encode_write};
use hid_rmi_protocol::touch::{TouchContact, decode_touch};
use hid_rmi_protocol::{
    AttentionLayout, ButtonLayout, MAX_FINGERS, PdtEntry, TouchLayout, decode_attention,
    irq_mask, rmi_page,
};
use proptest::prelude::*;

fn touch_layout() -> impl Strategy<Value = TouchLayout> {
    (0u16..8, 1u8..=10, any::<u16>()).prop_map(|(base, fingers, max_y)| TouchLayout {
        irq_mask: irq_mask(base, 1),
        interrupt_base: base,
        max_fingers: fingers,
        max_y,
    })
}

fn button_layout() -> impl Strategy<Value = ButtonLayout> {
    (0u16..8, 0u8..=31, any::<u32>(), any::<u32>()).prop_map(|(base, count, mask, state)| {
        let valid = if count == 0 { 0 } else { u32::MAX >> (32 - u32::from(count)) };
        ButtonLayout {
            irq_mask: irq_mask(base, 1),
            interrupt_base: base,
            gpio_led_count: count,
            button_mask: mask & valid,
            state_mask: state & valid,
        }
    })
}

// ── Finger count ────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The advertised finger count is always 1..=5 or exactly 10.
    #[test]
    fn prop_finger_count_bounded(raw in any::<u8>()) {
        let fingers = finger_count(raw);
        prop_assert!((1..=5).contains(&fingers) || fingers == 10);
        prop_assert!(usize::from(fingers) <= MAX_FINGERS);
    }

    /// Report size grows by five bytes per finger plus the state bitfield.
    #[test]
    fn prop_report_size_formula(fingers in 1usize..=10) {
        prop_assert_eq!(report_size(fingers), fingers * 5 + fingers.div_ceil(4));
    }
}

// ── Decoders never over-read ────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_attention_decode_never_overreads(
        touch in proptest::option::of(touch_layout()),
        buttons in proptest::option::of(button_layout()),
        body in proptest::collection::vec(any::<u8>(), 0..80),
        irq in any::<u8>(),
    ) {
        let layout = AttentionLayout { touch, buttons };
        let mut report = vec![0x0C, irq];
        report.extend_from_slice(&body);
        let frame = decode_attention(&layout, &report);
        prop_assert!(frame.is_ok());
        if let Ok(frame) = frame {
            prop_assert!(frame.consumed <= body.len());
            if let Some(t) = frame.touch {
                prop_assert!(t.slot_count() <= MAX_FINGERS);
                prop_assert!(t.active_count() <= t.slot_count());
            }
        }
    }

    /// Touch slots are never more than the layout's finger count.
    #[test]
    fn prop_touch_slots_follow_layout(
        layout in touch_layout(),
        data in proptest::collection::vec(any::<u8>(), 53..60),
    ) {
        let (frame, consumed) = decode_touch(&layout, &data).ok_or_else(|| TestCaseError::fail("fits"))?;
        prop_assert_eq!(frame.slot_count(), usize::from(layout.max_fingers));
        prop_assert_eq!(consumed, layout.report_size());
    }

    /// Y is mirrored around max_y for every in-range raw value.
    #[test]
    fn prop_y_is_inverted(max_y in 1u16..4096, raw_y in 0u16..4096) {
        prop_assume!(raw_y <= max_y);
        let record = [0u8, (raw_y >> 4) as u8, ((raw_y & 0x0F) << 4) as u8, 0, 0];
        let contact = TouchContact::from_record(&record, max_y);
        prop_assert_eq!(contact.y, max_y - raw_y);
    }

    /// Every configured button yields exactly one value.
    #[test]
    fn prop_one_value_per_button(layout in button_layout(), data in any::<[u8; 4]>()) {
        let (frame, consumed) = decode_buttons(&layout, &data).ok_or_else(|| TestCaseError::fail("fits"))?;
        prop_assert_eq!(frame.count(), layout.button_count());
        prop_assert_eq!(consumed, layout.report_size());
    }
}

// ── Framing ─────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_read_request_carries_address_and_length(addr in any::<u16>(), len in any::<u16>()) {
        let mut buf = [0u8; 26];
        prop_assert!(encode_read_request(&mut buf, addr, len).is_ok());
        prop_assert_eq!(u16::from_le_bytes([buf[2], buf[3]]), addr);
        prop_assert_eq!(u16::from_le_bytes([buf[4], buf[5]]), len);
        prop_assert_eq!(rmi_page(u16::from_le_bytes([buf[2], buf[3]])), (addr >> 8) as u8);
    }

    #[test]
    fn prop_write_payload_bounded(addr in any::<u16>(), data in proptest::collection::vec(any::<u8>(), 0..40)) {
        let mut buf = [0u8; 26];
        let result = encode_write(&mut buf, addr, &data);
        prop_assert_eq!(result.is_ok(), data.len() <= 22);
    }

    /// Response parsing never yields more bytes than the report holds.
    #[test]
    fn prop_read_response_bounded(report in proptest::collection::vec(any::<u8>(), 0..40)) {
        if let Ok(resp) = ReadResponse::parse(&report) {
            prop_assert!(resp.payload.len() + 2 <= report.len());
            prop_assert!(resp.payload.len() <= usize::from(resp.count));
        }
    }

    #[test]
    fn prop_pdt_entry_decoding_masks_fields(bytes in any::<[u8; 6]>()) {
        let entry = PdtEntry::parse(&bytes).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert!(entry.interrupt_source_count <= 7);
        prop_assert!(entry.function_version <= 3);
        prop_assert_eq!(entry.function_number, bytes[5]);
    }
}
