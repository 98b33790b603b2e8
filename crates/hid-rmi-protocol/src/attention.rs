//! Attention report decoding.
//!
//! An attention report is `[0x0C, irq, function data...]`. Each function
//! whose interrupt fired contributes a block, in the order the functions'
//! interrupt bits were allocated during the PDT scan.

use crate::report::ATTENTION_HEADER_LEN;
use crate::touch::{TouchFrame, TouchLayout, decode_touch};
use crate::{RmiProtocolError, RmiProtocolResult, report_ids};

/// Decoding parameters for the F30 part of an attention report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonLayout {
    pub irq_mask: u32,
    pub interrupt_base: u16,
    pub gpio_led_count: u8,
    pub button_mask: u32,
    /// Positions whose raw level is inverted before being reported.
    pub state_mask: u32,
}

impl ButtonLayout {
    pub fn report_size(&self) -> usize {
        usize::from(self.gpio_led_count).div_ceil(8)
    }

    pub fn button_count(&self) -> usize {
        self.button_mask.count_ones() as usize
    }
}

/// Logical state of every configured button, in GPIO order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonFrame {
    count: u8,
    pressed: u32,
}

impl ButtonFrame {
    pub fn count(&self) -> usize {
        usize::from(self.count)
    }

    pub fn pressed(&self, button: usize) -> Option<bool> {
        (button < self.count()).then(|| self.pressed & (1 << button) != 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.count()).map(|button| self.pressed & (1 << button) != 0)
    }
}

/// Decode the F30 block at the start of `data`.
///
/// Returns `None` without consuming anything when `data` is too short.
pub fn decode_buttons(layout: &ButtonLayout, data: &[u8]) -> Option<(ButtonFrame, usize)> {
    let size = layout.report_size();
    let block = data.get(..size)?;

    let mut frame = ButtonFrame::default();
    for gpio in 0..usize::from(layout.gpio_led_count) {
        if layout.button_mask & (1 << gpio) == 0 {
            continue;
        }
        let raw = block
            .get(gpio / 8)
            .is_some_and(|byte| (byte >> (gpio % 8)) & 1 != 0);
        let inverted = layout.state_mask & (1 << gpio) != 0;
        if raw != inverted {
            frame.pressed |= 1 << frame.count;
        }
        frame.count += 1;
    }
    Some((frame, size))
}

/// Everything needed to split an attention report between functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttentionLayout {
    pub touch: Option<TouchLayout>,
    pub buttons: Option<ButtonLayout>,
}

impl AttentionLayout {
    /// Interrupt bits owned by a decoded function.
    pub fn known_irq_mask(&self) -> u32 {
        self.touch.map_or(0, |t| t.irq_mask) | self.buttons.map_or(0, |b| b.irq_mask)
    }

    fn touch_first(&self) -> bool {
        match (self.touch, self.buttons) {
            (Some(t), Some(b)) => t.interrupt_base < b.interrupt_base,
            _ => true,
        }
    }
}

/// Result of decoding one attention report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttentionFrame {
    pub irq: u8,
    /// Interrupt bits that no decoded function owns.
    pub unknown_irq: u8,
    pub touch: Option<TouchFrame>,
    pub buttons: Option<ButtonFrame>,
    /// A function fired but its block did not fit in the report.
    pub truncated: bool,
    /// Function bytes consumed after the two header bytes.
    pub consumed: usize,
}

/// Split `report` between the touch and button decoders.
pub fn decode_attention(
    layout: &AttentionLayout,
    report: &[u8],
) -> RmiProtocolResult<AttentionFrame> {
    let [id, irq, ..] = *report else {
        return Err(RmiProtocolError::InvalidReportSize {
            expected: ATTENTION_HEADER_LEN,
            actual: report.len(),
        });
    };
    if id != report_ids::ATTENTION {
        return Err(RmiProtocolError::UnexpectedReportId {
            expected: report_ids::ATTENTION,
            actual: id,
        });
    }

    let body = report.get(ATTENTION_HEADER_LEN..).unwrap_or_default();
    let irq_bits = u32::from(irq);
    let mut frame = AttentionFrame {
        irq,
        unknown_irq: (irq_bits & !layout.known_irq_mask()) as u8,
        ..AttentionFrame::default()
    };

    let step = |touch: bool, frame: &mut AttentionFrame| {
        let rest = body.get(frame.consumed..).unwrap_or_default();
        let consumed = if touch {
            let Some(l) = layout.touch.filter(|l| l.irq_mask & irq_bits != 0) else {
                return;
            };
            decode_touch(&l, rest).map(|(t, n)| {
                frame.touch = Some(t);
                n
            })
        } else {
            let Some(l) = layout.buttons.filter(|l| l.irq_mask & irq_bits != 0) else {
                return;
            };
            decode_buttons(&l, rest).map(|(b, n)| {
                frame.buttons = Some(b);
                n
            })
        };
        match consumed {
            Some(n) => frame.consumed += n,
            None => frame.truncated = true,
        }
    };

    let touch_first = layout.touch_first();
    step(touch_first, &mut frame);
    step(!touch_first, &mut frame);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buttons(state_mask: u32) -> ButtonLayout {
        ButtonLayout {
            irq_mask: 0b1000,
            interrupt_base: 3,
            gpio_led_count: 4,
            button_mask: 0b0101,
            state_mask,
        }
    }

    fn touch() -> TouchLayout {
        TouchLayout {
            irq_mask: 0b0100,
            interrupt_base: 2,
            max_fingers: 1,
            max_y: 1000,
        }
    }

    #[test]
    fn test_button_polarity() {
        // gpio 0 raw 1 with pull-state set reads as released,
        // gpio 2 raw 1 with pull-state clear reads as pressed
        let (frame, n) = decode_buttons(&buttons(0b0001), &[0b0101]).expect("decode");
        assert_eq!(n, 1);
        assert_eq!(frame.count(), 2);
        assert_eq!(frame.pressed(0), Some(false));
        assert_eq!(frame.pressed(1), Some(true));
        assert_eq!(frame.pressed(2), None);
    }

    #[test]
    fn test_button_pull_up_released_reads_false() {
        let (frame, _) = decode_buttons(&buttons(0b0101), &[0b0101]).expect("decode");
        assert_eq!(frame.iter().collect::<Vec<_>>(), vec![false, false]);
        let (frame, _) = decode_buttons(&buttons(0b0101), &[0b0000]).expect("decode");
        assert_eq!(frame.iter().collect::<Vec<_>>(), vec![true, true]);
    }

    #[test]
    fn test_decode_in_interrupt_order() {
        let layout = AttentionLayout {
            touch: Some(touch()),
            buttons: Some(buttons(0)),
        };
        // touch block (6 bytes) then button block (1 byte)
        let report = [0x0C, 0b1100, 0x01, 0x10, 0x06, 0x44, 0x11, 0x80, 0b0001];
        let frame = decode_attention(&layout, &report).expect("decode");
        assert_eq!(frame.consumed, 7);
        assert_eq!(frame.unknown_irq, 0);
        assert_eq!(frame.touch.and_then(|t| t.slot(0).map(|c| c.y)), Some(900));
        assert_eq!(frame.buttons.and_then(|b| b.pressed(0)), Some(true));
    }

    #[test]
    fn test_buttons_decoded_first_when_allocated_first() {
        let layout = AttentionLayout {
            touch: Some(TouchLayout {
                interrupt_base: 4,
                irq_mask: 0b1_0000,
                ..touch()
            }),
            buttons: Some(ButtonLayout {
                interrupt_base: 1,
                irq_mask: 0b10,
                ..buttons(0)
            }),
        };
        let report = [0x0C, 0b1_0010, 0b0100, 0x01, 0x10, 0x06, 0x44, 0x11, 0x80];
        let frame = decode_attention(&layout, &report).expect("decode");
        assert_eq!(frame.buttons.and_then(|b| b.pressed(1)), Some(true));
        assert_eq!(frame.touch.map(|t| t.active_count()), Some(1));
        assert_eq!(frame.consumed, 7);
    }

    #[test]
    fn test_only_fired_functions_consume_bytes() {
        let layout = AttentionLayout {
            touch: Some(touch()),
            buttons: Some(buttons(0)),
        };
        let report = [0x0C, 0b1000, 0b0100];
        let frame = decode_attention(&layout, &report).expect("decode");
        assert!(frame.touch.is_none());
        assert_eq!(frame.buttons.and_then(|b| b.pressed(1)), Some(true));
        assert_eq!(frame.consumed, 1);
    }

    #[test]
    fn test_unknown_irq_bits_are_reported() {
        let layout = AttentionLayout {
            touch: Some(touch()),
            buttons: None,
        };
        let frame = decode_attention(&layout, &[0x0C, 0b0000_0011]).expect("decode");
        assert_eq!(frame.unknown_irq, 0b11);
        assert!(frame.touch.is_none());
        assert!(!frame.truncated);
    }

    #[test]
    fn test_short_report_is_skipped() {
        let layout = AttentionLayout {
            touch: Some(touch()),
            buttons: None,
        };
        let frame = decode_attention(&layout, &[0x0C, 0b0100, 0x01, 0x10]).expect("decode");
        assert!(frame.touch.is_none());
        assert!(frame.truncated);
        assert_eq!(frame.consumed, 0);
    }

    #[test]
    fn test_rejects_non_attention_reports() {
        let layout = AttentionLayout::default();
        assert!(decode_attention(&layout, &[0x0C]).is_err());
        assert!(matches!(
            decode_attention(&layout, &[0x0B, 0x00]),
            Err(RmiProtocolError::UnexpectedReportId { actual: 0x0B, .. })
        ));
    }
}
