//! Synaptics RMI4 over HID.
//!
//! Drives RMI4 touchpads that tunnel their register interface through HID
//! reports: register reads and writes over output reports, Page Description
//! Table discovery, F11 (2D sensor) and F30 (GPIO buttons) setup, and
//! decoding of attention reports into multi-touch contacts and button
//! states.
//!
//! The crate is transport-agnostic. A [`ReportTransport`] sends reports and
//! pushes every inbound report to [`RmiDevice::on_report`]; decoded input is
//! handed to an [`InputSink`].
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use hid_rmi::{RmiConfig, RmiDevice, ReportTransport, InputSink};
//! # fn run(transport: Arc<dyn ReportTransport>, sink: Box<dyn InputSink>) -> hid_rmi::RmiResult<()> {
//! let device = Arc::new(RmiDevice::new(transport, sink, RmiConfig::from_env())?);
//! // wire the transport's inbound reports to `device.on_report` here
//! let capabilities = device.attach()?;
//! println!("{} touch slots", capabilities.slots);
//! # Ok(())
//! # }
//! ```

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod input;
pub mod mode;
pub mod populate;
pub mod scan;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::RmiConfig;
pub use device::RmiDevice;
pub use engine::{RegisterEngine, Transaction};
pub use error::{ErrorSeverity, RmiError, RmiResult, TransportError};
pub use input::{AxisRange, DeviceCapabilities, InputSink, InputState};
pub use mode::{ModeController, ModeState};
pub use populate::{Population, populate, populate_f11, populate_f30};
pub use scan::{FunctionTable, PdtScanner};
pub use transport::{ReportDirection, ReportTransport};

pub use hid_rmi_protocol as protocol;
