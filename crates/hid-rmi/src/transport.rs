//! The report channel the RMI stack runs on.
//!
//! A transport moves whole HID reports. Inbound reports are not pulled by
//! the stack; the transport pushes each one to [`crate::RmiDevice::on_report`]
//! from its own delivery context.

use crate::error::TransportError;
use hid_rmi_protocol::ReportSizes;

/// Direction of a feature report request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDirection {
    /// GET_REPORT: the device fills the buffer.
    Get,
    /// SET_REPORT: the buffer is sent to the device.
    Set,
}

/// Outbound half of an HID report channel plus its lifecycle hooks.
///
/// Implementations must be callable from several threads: the register
/// engine sends from the caller's thread while mode recovery sends from its
/// own worker.
pub trait ReportTransport: Send + Sync {
    /// Input / output report sizes advertised by the device.
    fn report_sizes(&self) -> ReportSizes;

    /// Send one output report. Returns the number of bytes sent.
    fn output_report(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Issue a feature report request for `report_id`.
    fn feature_report(
        &self,
        report_id: u8,
        data: &mut [u8],
        direction: ReportDirection,
    ) -> Result<usize, TransportError>;

    /// Open the low level device. Called before any protocol traffic.
    fn open(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&self) {}

    /// Start delivering inbound reports.
    fn start_io(&self) {}

    /// Stop delivering inbound reports.
    fn stop_io(&self) {}
}
