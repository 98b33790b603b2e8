//! Page Description Table entries.
//!
//! Each page that hosts functions carries a table growing downwards from
//! offset `0xE9`. One entry is six bytes:
//!
//! | Offset | Content                                                  |
//! |--------|----------------------------------------------------------|
//! | 0      | query base (low byte)                                    |
//! | 1      | command base (low byte)                                  |
//! | 2      | control base (low byte)                                  |
//! | 3      | data base (low byte)                                     |
//! | 4      | bits 0..2 interrupt source count, bits 5..6 version      |
//! | 5      | function number                                          |

use crate::address::page_base;
use crate::function::FunctionKind;
use crate::{RmiProtocolError, RmiProtocolResult};

/// Size of one PDT entry in bytes.
pub const PDT_ENTRY_SIZE: usize = 6;
/// Page offset of the first (highest) PDT entry.
pub const PDT_START_SCAN_LOCATION: u16 = 0x00E9;
/// Page offset below which no PDT entry is read.
pub const PDT_END_SCAN_LOCATION: u16 = 0x0005;

const QUERY_BASE: usize = 0;
const COMMAND_BASE: usize = 1;
const CONTROL_BASE: usize = 2;
const DATA_BASE: usize = 3;
const INTERRUPT_INFO: usize = 4;
const FUNCTION_NUMBER: usize = 5;

const INTERRUPT_COUNT_MASK: u8 = 0x07;
const FUNCTION_VERSION_SHIFT: u8 = 5;
const FUNCTION_VERSION_MASK: u8 = 0x03;

/// Function numbers that terminate a page's table.
pub fn is_end_of_pdt(function_number: u8) -> bool {
    function_number == 0x00 || function_number == 0xFF
}

/// Addresses of every PDT slot on `page`, highest first.
pub fn pdt_scan_addresses(page: u8) -> impl Iterator<Item = u16> {
    let base = page_base(page);
    (PDT_END_SCAN_LOCATION..=PDT_START_SCAN_LOCATION)
        .rev()
        .step_by(PDT_ENTRY_SIZE)
        .map(move |offset| base | offset)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdtEntry {
    pub query_base: u8,
    pub command_base: u8,
    pub control_base: u8,
    pub data_base: u8,
    pub interrupt_source_count: u8,
    pub function_version: u8,
    pub function_number: u8,
}

impl PdtEntry {
    pub fn parse(bytes: &[u8]) -> RmiProtocolResult<Self> {
        let Some(raw) = bytes.get(..PDT_ENTRY_SIZE) else {
            return Err(RmiProtocolError::InvalidReportSize {
                expected: PDT_ENTRY_SIZE,
                actual: bytes.len(),
            });
        };
        let byte = |i: usize| raw.get(i).copied().unwrap_or(0);
        let info = byte(INTERRUPT_INFO);
        Ok(Self {
            query_base: byte(QUERY_BASE),
            command_base: byte(COMMAND_BASE),
            control_base: byte(CONTROL_BASE),
            data_base: byte(DATA_BASE),
            interrupt_source_count: info & INTERRUPT_COUNT_MASK,
            function_version: (info >> FUNCTION_VERSION_SHIFT) & FUNCTION_VERSION_MASK,
            function_number: byte(FUNCTION_NUMBER),
        })
    }

    pub fn to_bytes(&self) -> [u8; PDT_ENTRY_SIZE] {
        let info = (self.interrupt_source_count & INTERRUPT_COUNT_MASK)
            | ((self.function_version & FUNCTION_VERSION_MASK) << FUNCTION_VERSION_SHIFT);
        [
            self.query_base,
            self.command_base,
            self.control_base,
            self.data_base,
            info,
            self.function_number,
        ]
    }

    pub fn is_end_of_table(&self) -> bool {
        is_end_of_pdt(self.function_number)
    }

    pub fn kind(&self) -> FunctionKind {
        FunctionKind::from_number(self.function_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry() {
        // F11 with 1 interrupt source, version 1, reserved bits set
        let entry = PdtEntry::parse(&[0x2D, 0x2C, 0x16, 0x06, 0xB9, 0x11]).expect("parse");
        assert_eq!(entry.query_base, 0x2D);
        assert_eq!(entry.command_base, 0x2C);
        assert_eq!(entry.control_base, 0x16);
        assert_eq!(entry.data_base, 0x06);
        assert_eq!(entry.interrupt_source_count, 1);
        assert_eq!(entry.function_version, 1);
        assert_eq!(entry.kind(), FunctionKind::Touch);
        assert!(!entry.is_end_of_table());
    }

    #[test]
    fn test_parse_short_entry() {
        assert_eq!(
            PdtEntry::parse(&[0x00, 0x01]),
            Err(RmiProtocolError::InvalidReportSize {
                expected: 6,
                actual: 2
            })
        );
    }

    #[test]
    fn test_end_of_table_sentinels() {
        assert!(is_end_of_pdt(0x00));
        assert!(is_end_of_pdt(0xFF));
        assert!(!is_end_of_pdt(0x01));
    }

    #[test]
    fn test_scan_addresses() {
        let addrs: Vec<u16> = pdt_scan_addresses(0).collect();
        assert_eq!(addrs.first(), Some(&0x00E9));
        assert_eq!(addrs.get(1), Some(&0x00E3));
        assert_eq!(addrs.last(), Some(&0x0005));
        assert_eq!(addrs.len(), 39);

        let page2: Vec<u16> = pdt_scan_addresses(2).take(2).collect();
        assert_eq!(page2, vec![0x02E9, 0x02E3]);
    }
}
