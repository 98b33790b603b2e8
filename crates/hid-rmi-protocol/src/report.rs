//! Framing of RMI4 register traffic inside HID reports.
//!
//! Output reports are always sent at the full size advertised by the HID
//! descriptor; unused trailing bytes are zero.
//!
//! | Report        | Layout                                                   |
//! |---------------|----------------------------------------------------------|
//! | write (0x09)  | `[id, len, addr_lo, addr_hi, data...]`                   |
//! | read (0x0A)   | `[id, 0, addr_lo, addr_hi, len_lo, len_hi]`              |
//! | data (0x0B)   | `[id, count, data...]`                                   |
//! | mode (0x0F)   | `[id, mode]` (feature report)                            |

use crate::address::PAGE_SELECT_REGISTER;
use crate::ids::{RmiMode, report_ids};
use crate::{RmiProtocolError, RmiProtocolResult};

/// Bytes preceding the payload of a write report.
pub const WRITE_HEADER_LEN: usize = 4;
/// Bytes used by a read-address request.
pub const READ_REQUEST_LEN: usize = 6;
/// Bytes preceding the payload of a read-data report.
pub const READ_RESPONSE_HEADER_LEN: usize = 2;
/// Bytes preceding the function data of an attention report.
pub const ATTENTION_HEADER_LEN: usize = 2;

/// Input/output report sizes, report ID byte included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReportSizes {
    /// Size of an inbound attention / read-data report.
    pub input: usize,
    /// Size of an outbound write / read-address report.
    pub output: usize,
}

impl ReportSizes {
    pub fn new(input: usize, output: usize) -> RmiProtocolResult<Self> {
        if output < READ_REQUEST_LEN {
            return Err(RmiProtocolError::InvalidReportSize {
                expected: READ_REQUEST_LEN,
                actual: output,
            });
        }
        if input <= READ_RESPONSE_HEADER_LEN {
            return Err(RmiProtocolError::InvalidReportSize {
                expected: READ_RESPONSE_HEADER_LEN + 1,
                actual: input,
            });
        }
        Ok(Self { input, output })
    }

    /// Derive sizes from the HID descriptor report lengths in bits
    /// (report ID excluded, as HID descriptors count them).
    pub fn from_descriptor_bits(
        attention_bits: usize,
        write_bits: usize,
    ) -> RmiProtocolResult<Self> {
        Self::new((attention_bits >> 3) + 1, (write_bits >> 3) + 1)
    }

    /// Largest register block a single write report can carry.
    pub fn max_write_payload(&self) -> usize {
        self.output.saturating_sub(WRITE_HEADER_LEN)
    }

    /// Largest number of data bytes a single read-data report can carry.
    pub fn max_read_chunk(&self) -> usize {
        self.input.saturating_sub(READ_RESPONSE_HEADER_LEN)
    }
}

impl Default for ReportSizes {
    /// Sizes advertised by common Synaptics HID touchpads.
    fn default() -> Self {
        Self {
            input: 30,
            output: 26,
        }
    }
}

fn clear(buf: &mut [u8], needed: usize) -> RmiProtocolResult<()> {
    if buf.len() < needed {
        return Err(RmiProtocolError::PayloadTooLarge {
            len: needed,
            capacity: buf.len(),
        });
    }
    buf.fill(0);
    Ok(())
}

/// Encode a register write of `data` at `addr` into `buf`.
pub fn encode_write(buf: &mut [u8], addr: u16, data: &[u8]) -> RmiProtocolResult<()> {
    let Ok(len) = u8::try_from(data.len()) else {
        return Err(RmiProtocolError::PayloadTooLarge {
            len: data.len(),
            capacity: usize::from(u8::MAX),
        });
    };
    clear(buf, WRITE_HEADER_LEN + data.len())?;
    let [lo, hi] = addr.to_le_bytes();
    let (header, payload) = buf.split_at_mut(WRITE_HEADER_LEN);
    header.copy_from_slice(&[report_ids::WRITE, len, lo, hi]);
    if let Some(dst) = payload.get_mut(..data.len()) {
        dst.copy_from_slice(data);
    }
    Ok(())
}

/// Encode a page select write. The page register is addressed through the
/// fixed `0xFF` sub-address, whatever page is current.
pub fn encode_set_page(buf: &mut [u8], page: u8) -> RmiProtocolResult<()> {
    encode_write(buf, u16::from(PAGE_SELECT_REGISTER), &[page])
}

/// Encode a read-address request for `len` bytes at `addr`.
pub fn encode_read_request(buf: &mut [u8], addr: u16, len: u16) -> RmiProtocolResult<()> {
    clear(buf, READ_REQUEST_LEN)?;
    let [addr_lo, addr_hi] = addr.to_le_bytes();
    let [len_lo, len_hi] = len.to_le_bytes();
    if let Some(dst) = buf.get_mut(..READ_REQUEST_LEN) {
        // byte 1 is the legacy one-byte read count, unused
        dst.copy_from_slice(&[report_ids::READ_ADDRESS, 0, addr_lo, addr_hi, len_lo, len_hi]);
    }
    Ok(())
}

/// Feature report payload selecting `mode`.
pub fn encode_set_mode(mode: RmiMode) -> [u8; 2] {
    [report_ids::SET_RMI_MODE, mode.as_u8()]
}

/// Borrowed view of a read-data input report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResponse<'a> {
    /// Byte count announced by the device.
    pub count: u8,
    /// Data bytes actually present, at most `count`.
    pub payload: &'a [u8],
}

impl<'a> ReadResponse<'a> {
    pub fn parse(report: &'a [u8]) -> RmiProtocolResult<Self> {
        let Some((&id, rest)) = report.split_first() else {
            return Err(RmiProtocolError::InvalidReportSize {
                expected: READ_RESPONSE_HEADER_LEN,
                actual: 0,
            });
        };
        if id != report_ids::READ_DATA {
            return Err(RmiProtocolError::UnexpectedReportId {
                expected: report_ids::READ_DATA,
                actual: id,
            });
        }
        let Some((&count, data)) = rest.split_first() else {
            return Err(RmiProtocolError::InvalidReportSize {
                expected: READ_RESPONSE_HEADER_LEN,
                actual: report.len(),
            });
        };
        let available = usize::from(count).min(data.len());
        Ok(Self {
            count,
            payload: data.get(..available).unwrap_or_default(),
        })
    }

    /// Whether the report held fewer bytes than it announced.
    pub fn is_truncated(&self) -> bool {
        self.payload.len() < usize::from(self.count)
    }
}
