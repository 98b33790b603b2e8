//! F11 (2D sensor) query and control register decoding.
//!
//! Only the registers needed to learn finger count, absolute-position
//! support, physical size and coordinate range are decoded.

use crate::function::FunctionDescriptor;
use crate::touch::TouchLayout;
use crate::{RmiProtocolError, RmiProtocolResult};

/// Hard upper bound on finger slots.
pub const MAX_FINGERS: usize = 10;
/// Bytes of absolute data per finger in an attention report.
pub const FINGER_RECORD_SIZE: usize = 5;
/// Fingers sharing one finger-state byte (two bits each).
pub const FINGERS_PER_STATE_BYTE: usize = 4;

/// Query register offsets relative to the F11 query base.
pub mod query {
    pub const GENERAL: u16 = 0;
    pub const SENSOR: u16 = 1;
    pub const GESTURES: u16 = 8;
    /// Offset of query 12 when none of the optional queries 9, 10, 11 exist.
    pub const QUERY12_MIN_OFFSET: u16 = 9;
    /// Bytes of physical size data following query 12.
    pub const PHYSICAL_SIZE_LEN: usize = 4;
}

/// Length of the control block holding the coordinate range.
pub const CONTROL_BLOCK_LEN: usize = 20;

const CTRL_MAX_X: usize = 6;
const CTRL_MAX_Y: usize = 8;

/// Query 0: presence of the optional query registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct F11Query0 {
    pub has_query9: bool,
    pub has_query11: bool,
    pub has_query12: bool,
}

impl F11Query0 {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            has_query9: byte & (1 << 3) != 0,
            has_query11: byte & (1 << 4) != 0,
            has_query12: byte & (1 << 5) != 0,
        }
    }

    /// Offset of query 12 from the query base, given whether query 10 exists.
    pub fn query12_offset(&self, has_query10: bool) -> u16 {
        query::QUERY12_MIN_OFFSET
            + u16::from(self.has_query9)
            + u16::from(has_query10)
            + u16::from(self.has_query11)
    }
}

/// Query 1: finger count and reporting capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct F11Query1 {
    pub max_fingers: u8,
    pub has_absolute: bool,
}

impl F11Query1 {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            max_fingers: finger_count(byte),
            has_absolute: byte & (1 << 4) != 0,
        }
    }
}

/// Number of finger slots advertised by the 3-bit query 1 field.
///
/// Encodings 0..=4 mean 1..=5 fingers; anything above means 10.
pub fn finger_count(query1: u8) -> u8 {
    let fingers = (query1 & 0x07) + 1;
    if fingers > 5 { MAX_FINGERS as u8 } else { fingers }
}

/// Bytes of finger-state bitfield preceding the finger records.
pub fn finger_state_len(max_fingers: usize) -> usize {
    max_fingers.div_ceil(FINGERS_PER_STATE_BYTE)
}

/// Bytes F11 contributes to an attention report.
pub fn report_size(max_fingers: usize) -> usize {
    max_fingers * FINGER_RECORD_SIZE + finger_state_len(max_fingers)
}

/// Query 8 bit 2: query 10 is present.
pub fn has_query10(query8: u8) -> bool {
    query8 & (1 << 2) != 0
}

/// Query 12 bit 5: physical sensor size follows.
pub fn has_physical_props(query12: u8) -> bool {
    query12 & (1 << 5) != 0
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let lo = *bytes.get(at)?;
    let hi = *bytes.get(at + 1)?;
    Some(u16::from_le_bytes([lo, hi]))
}

fn tenths_to_mm(tenths: u16) -> u16 {
    ((u32::from(tenths) + 5) / 10) as u16
}

/// Decode the sensor size (x, y) in whole millimetres from the four bytes
/// following query 12. The device reports tenths of a millimetre.
pub fn physical_size_mm(bytes: &[u8]) -> RmiProtocolResult<(u16, u16)> {
    match (le_u16(bytes, 0), le_u16(bytes, 2)) {
        (Some(x), Some(y)) => Ok((tenths_to_mm(x), tenths_to_mm(y))),
        _ => Err(RmiProtocolError::InvalidReportSize {
            expected: query::PHYSICAL_SIZE_LEN,
            actual: bytes.len(),
        }),
    }
}

/// Coordinate range from the F11 control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct F11Control {
    pub max_x: u16,
    pub max_y: u16,
}

impl F11Control {
    pub fn parse(block: &[u8]) -> RmiProtocolResult<Self> {
        match (le_u16(block, CTRL_MAX_X), le_u16(block, CTRL_MAX_Y)) {
            (Some(max_x), Some(max_y)) => Ok(Self { max_x, max_y }),
            _ => Err(RmiProtocolError::InvalidReportSize {
                expected: CTRL_MAX_Y + 2,
                actual: block.len(),
            }),
        }
    }
}

/// Everything learned about the 2D sensor at attach time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct F11SensorInfo {
    pub max_fingers: u8,
    pub max_x: u16,
    pub max_y: u16,
    /// Physical (x, y) size in millimetres, when the sensor reports it.
    pub size_mm: Option<(u16, u16)>,
}

impl F11SensorInfo {
    pub fn report_size(&self) -> usize {
        report_size(usize::from(self.max_fingers))
    }

    /// Units per millimetre on each axis.
    pub fn resolution(&self) -> Option<(u16, u16)> {
        let (x_mm, y_mm) = self.size_mm?;
        if x_mm == 0 || y_mm == 0 {
            return None;
        }
        Some((
            self.max_x.saturating_sub(1) / x_mm,
            self.max_y.saturating_sub(1) / y_mm,
        ))
    }

    /// Attention decoding layout for the function described by `function`.
    pub fn touch_layout(&self, function: &FunctionDescriptor) -> TouchLayout {
        TouchLayout {
            irq_mask: function.irq_mask,
            interrupt_base: function.interrupt_base,
            max_fingers: self.max_fingers,
            max_y: self.max_y,
        }
    }
}
