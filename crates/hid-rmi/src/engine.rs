//! Register read/write engine.
//!
//! RMI4 registers are reached through output reports: writes are a single
//! write report, reads are a read-address request answered asynchronously by
//! one or more read-data reports. A read therefore parks the calling thread
//! until the delivery path ([`RegisterEngine::complete_read`]) has collected
//! the requested number of bytes.
//!
//! Every register transaction (page select, request, wait) runs while holding
//! the transaction lock, so the device page register and the in-flight read
//! always belong to exactly one caller.

use crate::config::RmiConfig;
use crate::error::{RmiError, RmiResult};
use crate::transport::ReportTransport;
use hid_rmi_protocol::report::{self, ReadResponse};
use hid_rmi_protocol::{ReportSizes, RmiProtocolError, rmi_page};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Page register mirror plus the scratch buffer for outbound reports.
#[derive(Debug)]
struct PageState {
    page: u8,
    write_report: Vec<u8>,
}

/// Progress of the single in-flight read.
#[derive(Debug, Default)]
enum ReadState {
    #[default]
    Idle,
    RequestSent {
        wanted: usize,
    },
    Collecting {
        wanted: usize,
        data: Vec<u8>,
    },
    Complete(Vec<u8>),
    /// The reader gave up; late responses are dropped.
    TimedOut,
}

impl ReadState {
    fn collected(&self) -> usize {
        match self {
            ReadState::Collecting { data, .. } | ReadState::Complete(data) => data.len(),
            _ => 0,
        }
    }

    /// Append a read-data payload. Returns `false` when no read is waiting.
    fn accept(&mut self, chunk: &[u8]) -> bool {
        let (wanted, mut data) = match std::mem::take(self) {
            ReadState::RequestSent { wanted } => (wanted, Vec::with_capacity(wanted)),
            ReadState::Collecting { wanted, data } => (wanted, data),
            other => {
                *self = other;
                return false;
            }
        };

        let room = wanted.saturating_sub(data.len());
        data.extend_from_slice(chunk.get(..room).unwrap_or(chunk));
        *self = if data.len() >= wanted {
            ReadState::Complete(data)
        } else {
            ReadState::Collecting { wanted, data }
        };
        true
    }
}

pub struct RegisterEngine {
    transport: Arc<dyn ReportTransport>,
    sizes: ReportSizes,
    config: RmiConfig,
    transaction: Mutex<PageState>,
    read: Mutex<ReadState>,
    read_ready: Condvar,
}

impl std::fmt::Debug for RegisterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterEngine")
            .field("sizes", &self.sizes)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RegisterEngine {
    /// Create an engine over `transport`. The page register is assumed to
    /// be 0 until the first explicit page select.
    pub fn new(transport: Arc<dyn ReportTransport>, config: RmiConfig) -> RmiResult<Self> {
        let advertised = transport.report_sizes();
        let sizes = ReportSizes::new(advertised.input, advertised.output)?;
        debug!(
            "RMI report sizes: input {} output {}",
            sizes.input, sizes.output
        );

        Ok(Self {
            transport,
            sizes,
            config,
            transaction: Mutex::new(PageState {
                page: 0,
                write_report: vec![0; sizes.output],
            }),
            read: Mutex::new(ReadState::Idle),
            read_ready: Condvar::new(),
        })
    }

    pub fn report_sizes(&self) -> ReportSizes {
        self.sizes
    }

    pub fn config(&self) -> &RmiConfig {
        &self.config
    }

    /// Start an exclusive register transaction.
    ///
    /// Blocks until any transaction in progress on another thread finishes.
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction {
            engine: self,
            state: self.transaction.lock(),
        }
    }

    pub fn set_page(&self, page: u8) -> RmiResult<()> {
        self.transaction().set_page(page)
    }

    pub fn write_block(&self, addr: u16, data: &[u8]) -> RmiResult<()> {
        self.transaction().write_block(addr, data)
    }

    pub fn read_block(&self, addr: u16, len: usize) -> RmiResult<Vec<u8>> {
        self.transaction().read_block(addr, len)
    }

    pub fn read_byte(&self, addr: u16) -> RmiResult<u8> {
        self.transaction().read_byte(addr)
    }

    /// Page the device is believed to have selected.
    pub fn current_page(&self) -> u8 {
        self.transaction.lock().page
    }

    /// Whether a read request is waiting for data.
    pub fn is_read_pending(&self) -> bool {
        matches!(
            *self.read.lock(),
            ReadState::RequestSent { .. } | ReadState::Collecting { .. }
        )
    }

    /// Deliver a read-data report from the inbound path.
    ///
    /// Returns `true` when the report was consumed by a waiting read.
    pub fn complete_read(&self, report: &[u8]) -> bool {
        let response = match ReadResponse::parse(report) {
            Ok(response) => response,
            Err(e) => {
                warn!("Malformed read-data report: {}", e);
                return false;
            }
        };
        if response.is_truncated() {
            debug!(
                "Read-data report claims {} bytes, carries {}",
                response.count,
                response.payload.len()
            );
        }
        let limit = self.sizes.max_read_chunk();
        let payload = response.payload.get(..limit).unwrap_or(response.payload);

        let mut read = self.read.lock();
        if !read.accept(payload) {
            error!(
                "Read-data report ({} bytes) with no read request pending",
                payload.len()
            );
            return false;
        }
        trace!("Read-data chunk of {} bytes", payload.len());
        self.read_ready.notify_all();
        true
    }

    fn send(&self, report: &[u8]) -> RmiResult<()> {
        let sent = self.transport.output_report(report).map_err(|e| {
            error!("Failed to send output report: {}", e);
            RmiError::Transport(e)
        })?;
        if sent != report.len() {
            error!("Short write: {} of {} bytes", sent, report.len());
            return Err(RmiError::ShortWrite {
                expected: report.len(),
                actual: sent,
            });
        }
        Ok(())
    }

    fn arm_read(&self, wanted: usize) {
        *self.read.lock() = ReadState::RequestSent { wanted };
    }

    fn reset_read(&self) {
        *self.read.lock() = ReadState::Idle;
    }

    /// Wait for the armed read to complete. `None` when no data arrived for
    /// a whole timeout period. The period restarts whenever a chunk arrives.
    fn wait_for_data(&self) -> Option<Vec<u8>> {
        let timeout = self.config.read_timeout();
        let mut read = self.read.lock();
        loop {
            if matches!(*read, ReadState::Complete(_)) {
                if let ReadState::Complete(data) = std::mem::take(&mut *read) {
                    return Some(data);
                }
            }
            let before = read.collected();
            let result = self.read_ready.wait_for(&mut read, timeout);
            if result.timed_out()
                && read.collected() == before
                && !matches!(*read, ReadState::Complete(_))
            {
                *read = ReadState::TimedOut;
                return None;
            }
        }
    }
}

/// Exclusive access to the device register space.
///
/// Holds the transaction lock until dropped.
pub struct Transaction<'a> {
    engine: &'a RegisterEngine,
    state: MutexGuard<'a, PageState>,
}

impl Transaction<'_> {
    /// Unconditionally write the page select register.
    pub fn set_page(&mut self, page: u8) -> RmiResult<()> {
        report::encode_set_page(&mut self.state.write_report, page)?;
        self.engine.send(&self.state.write_report)?;
        self.state.page = page;
        debug!("Selected RMI page {:#04x}", page);
        Ok(())
    }

    fn ensure_page(&mut self, addr: u16) -> RmiResult<()> {
        let page = rmi_page(addr);
        if page != self.state.page {
            self.set_page(page)?;
        }
        Ok(())
    }

    pub fn write_block(&mut self, addr: u16, data: &[u8]) -> RmiResult<()> {
        let capacity = self.engine.sizes.max_write_payload();
        if data.len() > capacity {
            return Err(RmiProtocolError::PayloadTooLarge {
                len: data.len(),
                capacity,
            }
            .into());
        }
        self.ensure_page(addr)?;
        report::encode_write(&mut self.state.write_report, addr, data)?;
        self.engine.send(&self.state.write_report)
    }

    /// Read `len` bytes starting at `addr`.
    ///
    /// Re-issues the request after each silent timeout period, up to the
    /// configured number of attempts.
    pub fn read_block(&mut self, addr: u16, len: usize) -> RmiResult<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let Ok(wire_len) = u16::try_from(len) else {
            return Err(RmiProtocolError::PayloadTooLarge {
                len,
                capacity: usize::from(u16::MAX),
            }
            .into());
        };
        self.ensure_page(addr)?;

        let attempts = self.engine.config.max_read_attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(data) = self.read_attempt(addr, wire_len, len)? {
                return Ok(data);
            }
            warn!(
                "Read of {} bytes at {:#06x} timed out (attempt {}/{})",
                len, addr, attempt, attempts
            );
        }

        self.engine.reset_read();
        error!("Giving up reading {:#06x} after {} attempts", addr, attempts);
        Err(RmiError::ProtocolTimeout { addr, attempts })
    }

    pub fn read_byte(&mut self, addr: u16) -> RmiResult<u8> {
        let data = self.read_block(addr, 1)?;
        data.first().copied().ok_or(RmiError::ProtocolTimeout {
            addr,
            attempts: self.engine.config.max_read_attempts,
        })
    }

    fn read_attempt(&mut self, addr: u16, wire_len: u16, len: usize) -> RmiResult<Option<Vec<u8>>> {
        report::encode_read_request(&mut self.state.write_report, addr, wire_len)?;
        // armed before sending: the response may beat the send call back
        self.engine.arm_read(len);
        if let Err(e) = self.engine.send(&self.state.write_report) {
            self.engine.reset_read();
            return Err(e);
        }
        Ok(self.engine.wait_for_data())
    }

    pub fn current_page(&self) -> u8 {
        self.state.page
    }
}
