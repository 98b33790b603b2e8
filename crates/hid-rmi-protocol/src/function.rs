//! RMI4 function identity and register map.

use crate::address::page_base;
use crate::ids::function_numbers;
use crate::pdt::PdtEntry;

/// The functions this stack knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    /// F11, 2D capacitive sensor.
    Touch,
    /// F30, GPIO / LED block carrying the physical buttons.
    ButtonLed,
    /// Any other function. Still consumes interrupt bits.
    Unknown(u8),
}

impl FunctionKind {
    pub fn from_number(number: u8) -> Self {
        match number {
            function_numbers::F11 => Self::Touch,
            function_numbers::F30 => Self::ButtonLed,
            other => Self::Unknown(other),
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::Touch => function_numbers::F11,
            Self::ButtonLed => function_numbers::F30,
            Self::Unknown(number) => number,
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl std::fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "F{:02X}", self.number())
    }
}

/// Mask of `count` interrupt bits starting at `base`.
///
/// Bits beyond the 32-bit interrupt space are dropped.
pub fn irq_mask(base: u16, count: u8) -> u32 {
    let ones = match count {
        0 => return 0,
        c if c >= 32 => u32::MAX,
        c => (1u32 << c) - 1,
    };
    ones.checked_shl(u32::from(base)).unwrap_or(0)
}

/// Register map and interrupt assignment of one discovered function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub kind: FunctionKind,
    pub page: u8,
    pub query_base: u16,
    pub command_base: u16,
    pub control_base: u16,
    pub data_base: u16,
    /// First interrupt bit owned by this function, unique across the device.
    pub interrupt_base: u16,
    pub interrupt_count: u8,
    pub irq_mask: u32,
    /// Bytes this function contributes to an attention report.
    /// Zero until the function has been populated.
    pub report_size: usize,
}

impl FunctionDescriptor {
    /// Build a descriptor from a PDT entry found on `page`.
    pub fn from_pdt(entry: &PdtEntry, page: u8, interrupt_base: u16) -> Self {
        let base = page_base(page);
        Self {
            kind: entry.kind(),
            page,
            query_base: base | u16::from(entry.query_base),
            command_base: base | u16::from(entry.command_base),
            control_base: base | u16::from(entry.control_base),
            data_base: base | u16::from(entry.data_base),
            interrupt_base,
            interrupt_count: entry.interrupt_source_count,
            irq_mask: irq_mask(interrupt_base, entry.interrupt_source_count),
            report_size: 0,
        }
    }

    /// Whether any interrupt in `irq` belongs to this function.
    pub fn fires(&self, irq: u32) -> bool {
        irq & self.irq_mask != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irq_mask() {
        assert_eq!(irq_mask(0, 0), 0);
        assert_eq!(irq_mask(0, 1), 0b1);
        assert_eq!(irq_mask(2, 4), 0b11_1100);
        assert_eq!(irq_mask(6, 1), 0b100_0000);
        assert_eq!(irq_mask(0, 40), u32::MAX);
        assert_eq!(irq_mask(40, 1), 0);
    }

    #[test]
    fn test_function_kind() {
        assert_eq!(FunctionKind::from_number(0x11), FunctionKind::Touch);
        assert_eq!(FunctionKind::from_number(0x30), FunctionKind::ButtonLed);
        assert_eq!(FunctionKind::from_number(0x01), FunctionKind::Unknown(0x01));
        assert_eq!(FunctionKind::Unknown(0x34).number(), 0x34);
        assert_eq!(FunctionKind::Touch.to_string(), "F11");
        assert_eq!(FunctionKind::Unknown(0x1A).to_string(), "F1A");
        assert!(!FunctionKind::Unknown(0x01).is_supported());
    }

    #[test]
    fn test_descriptor_from_pdt() {
        let entry = PdtEntry {
            query_base: 0x80,
            command_base: 0x7E,
            control_base: 0x40,
            data_base: 0x06,
            interrupt_source_count: 4,
            function_version: 0,
            function_number: 0x11,
        };
        let f = FunctionDescriptor::from_pdt(&entry, 1, 2);
        assert_eq!(f.kind, FunctionKind::Touch);
        assert_eq!(f.query_base, 0x0180);
        assert_eq!(f.command_base, 0x017E);
        assert_eq!(f.control_base, 0x0140);
        assert_eq!(f.data_base, 0x0106);
        assert_eq!(f.irq_mask, 0b11_1100);
        assert!(f.fires(0b100));
        assert!(!f.fires(0b11));
    }
}
