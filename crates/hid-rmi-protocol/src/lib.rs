//! Synaptics RMI4-over-HID wire format.
//!
//! This crate is intentionally I/O-free. It knows how RMI4 registers are
//! framed inside HID reports, how the Page Description Table is laid out and
//! how the F11 (2D sensor) and F30 (GPIO/LED) register blocks and attention
//! payloads are packed. Everything here is a pure function over byte slices so
//! it can be tested and fuzzed without hardware.
//!
//! The transport, the blocking read protocol and the device lifecycle live in
//! the `hid-rmi` crate.

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod address;
pub mod attention;
pub mod f11;
pub mod f30;
pub mod function;
pub mod ids;
pub mod pdt;
pub mod report;
pub mod touch;

pub use address::{PAGE_SELECT_REGISTER, RMI4_MAX_PAGE, RMI4_PAGE_SIZE, page_base, rmi_page};
pub use attention::{AttentionFrame, AttentionLayout, ButtonFrame, ButtonLayout, decode_attention};
pub use f11::{F11Control, F11Query0, F11Query1, F11SensorInfo, MAX_FINGERS};
pub use f30::{ButtonWiring, F30Query};
pub use function::{FunctionDescriptor, FunctionKind, irq_mask};
pub use ids::{RmiMode, function_numbers, report_ids};
pub use pdt::{PDT_END_SCAN_LOCATION, PDT_ENTRY_SIZE, PDT_START_SCAN_LOCATION, PdtEntry};
pub use report::{ReadResponse, ReportSizes};
pub use touch::{TouchContact, TouchFrame, TouchLayout};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RmiProtocolError {
    #[error("Invalid report size: expected at least {expected}, got {actual}")]
    InvalidReportSize { expected: usize, actual: usize },

    #[error("Unexpected report id: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedReportId { expected: u8, actual: u8 },

    #[error("Payload of {len} bytes does not fit a {capacity}-byte report")]
    PayloadTooLarge { len: usize, capacity: usize },
}

pub type RmiProtocolResult<T> = Result<T, RmiProtocolError>;
