//! F11 absolute finger data inside attention reports.
//!
//! The F11 block starts with the finger-state bitfield (two bits per finger,
//! four fingers per byte) followed by one 5-byte record per finger:
//!
//! | Byte | Content                                  |
//! |------|------------------------------------------|
//! | 0    | X bits 11..4                             |
//! | 1    | Y bits 11..4                             |
//! | 2    | Y bits 3..0 (high nibble), X bits 3..0   |
//! | 3    | WY (high nibble), WX (low nibble)        |
//! | 4    | Z (pressure)                             |

use crate::f11::{
    FINGER_RECORD_SIZE, FINGERS_PER_STATE_BYTE, MAX_FINGERS, finger_state_len, report_size,
};

/// Finger-state value for a finger touching the sensor.
pub const FINGER_STATE_PRESENT: u8 = 0x01;

/// Decoding parameters for the F11 part of an attention report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchLayout {
    pub irq_mask: u32,
    pub interrupt_base: u16,
    pub max_fingers: u8,
    pub max_y: u16,
}

impl TouchLayout {
    /// Slots actually decoded, never above [`MAX_FINGERS`].
    pub fn slot_count(&self) -> usize {
        usize::from(self.max_fingers).min(MAX_FINGERS)
    }

    pub fn report_size(&self) -> usize {
        report_size(self.slot_count())
    }
}

/// One finger in contact with the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct TouchContact {
    pub x: u16,
    /// Already flipped so that the origin is at the top.
    pub y: u16,
    /// 0..=255.
    pub pressure: u8,
    /// 0..=15.
    pub touch_major: u8,
    /// 0..=15.
    pub touch_minor: u8,
    /// `true` when the contact is wider than it is tall.
    pub wide: bool,
}

impl TouchContact {
    /// Decode one 5-byte finger record.
    pub fn from_record(record: &[u8; FINGER_RECORD_SIZE], max_y: u16) -> Self {
        let [x_hi, y_hi, xy_lo, w, z] = *record;
        let x = (u16::from(x_hi) << 4) | u16::from(xy_lo & 0x0F);
        let raw_y = (u16::from(y_hi) << 4) | u16::from(xy_lo >> 4);
        let wx = w & 0x0F;
        let wy = w >> 4;

        Self {
            x,
            // y is inverted
            y: max_y.saturating_sub(raw_y),
            pressure: z,
            touch_major: wx.max(wy),
            touch_minor: wx.min(wy),
            wide: wx > wy,
        }
    }
}

/// Decoded state of every finger slot for one attention report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchFrame {
    slot_count: u8,
    slots: [Option<TouchContact>; MAX_FINGERS],
}

impl TouchFrame {
    pub fn slot_count(&self) -> usize {
        usize::from(self.slot_count)
    }

    pub fn slot(&self, index: usize) -> Option<&TouchContact> {
        if index >= self.slot_count() {
            return None;
        }
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Every slot in order, `None` for lifted fingers.
    pub fn slots(&self) -> &[Option<TouchContact>] {
        self.slots.get(..self.slot_count()).unwrap_or_default()
    }

    pub fn active_count(&self) -> usize {
        self.slots().iter().filter(|s| s.is_some()).count()
    }
}

fn finger_state(states: &[u8], finger: usize) -> u8 {
    let byte = states.get(finger / FINGERS_PER_STATE_BYTE).copied().unwrap_or(0);
    let shift = (finger % FINGERS_PER_STATE_BYTE) * 2;
    (byte >> shift) & 0x03
}

/// Decode the F11 block at the start of `data`.
///
/// Returns the frame and the number of bytes consumed, or `None` when `data`
/// is shorter than the F11 block (nothing is consumed in that case).
pub fn decode_touch(layout: &TouchLayout, data: &[u8]) -> Option<(TouchFrame, usize)> {
    let slot_count = layout.slot_count();
    let size = report_size(slot_count);
    let block = data.get(..size)?;
    let (states, records) = block.split_at(finger_state_len(slot_count));

    let mut frame = TouchFrame {
        slot_count: slot_count as u8,
        slots: [None; MAX_FINGERS],
    };
    for (finger, (slot, record)) in frame
        .slots
        .iter_mut()
        .zip(records.chunks_exact(FINGER_RECORD_SIZE))
        .enumerate()
    {
        if finger_state(states, finger) != FINGER_STATE_PRESENT {
            continue;
        }
        if let Ok(record) = <&[u8; FINGER_RECORD_SIZE]>::try_from(record) {
            *slot = Some(TouchContact::from_record(record, layout.max_y));
        }
    }
    Some((frame, size))
}
