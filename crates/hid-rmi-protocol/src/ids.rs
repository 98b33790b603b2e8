//! RMI4-over-HID wire constants.

/// HID report identifiers used by RMI4 devices.
pub mod report_ids {
    /// Legacy mouse-emulation input report (device is in passthrough mode).
    pub const MOUSE: u8 = 0x01;
    /// Output report carrying a register write.
    pub const WRITE: u8 = 0x09;
    /// Output report requesting a register read.
    pub const READ_ADDRESS: u8 = 0x0A;
    /// Input report carrying read data.
    pub const READ_DATA: u8 = 0x0B;
    /// Input report carrying attention (interrupt) data.
    pub const ATTENTION: u8 = 0x0C;
    /// Feature report selecting the RMI reporting mode.
    pub const SET_RMI_MODE: u8 = 0x0F;
}

/// RMI4 function numbers as they appear in the Page Description Table.
pub mod function_numbers {
    /// 2D capacitive sensor.
    pub const F11: u8 = 0x11;
    /// GPIO / LED block.
    pub const F30: u8 = 0x30;
}

/// Reporting mode written through the [`report_ids::SET_RMI_MODE`] feature report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RmiMode {
    /// Device stays in mouse emulation.
    Off = 0,
    /// Attention reports, packed.
    AttentionReports = 1,
    /// Attention reports without packing.
    AttentionReportsNoPacking = 2,
}

impl RmiMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::AttentionReports),
            2 => Some(Self::AttentionReportsNoPacking),
            _ => None,
        }
    }

    /// Whether the device emits RMI attention reports in this mode.
    pub fn is_attention(self) -> bool {
        !matches!(self, Self::Off)
    }
}
