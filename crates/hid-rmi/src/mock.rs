//! Simulated RMI4 device and recording input sink for tests.
//!
//! [`SimulatedRmi`] keeps a 64 KiB register map, honours the page select
//! register and answers read requests with read-data reports delivered from
//! its own thread, the way a real transport delivers inbound reports.

use crate::device::RmiDevice;
use crate::error::TransportError;
use crate::input::{DeviceCapabilities, InputSink};
use crate::transport::{ReportDirection, ReportTransport};
use crossbeam::channel::{Receiver, Sender};
use hid_rmi_protocol::report::{READ_RESPONSE_HEADER_LEN, WRITE_HEADER_LEN};
use hid_rmi_protocol::{
    PAGE_SELECT_REGISTER, PDT_ENTRY_SIZE, PDT_START_SCAN_LOCATION, PdtEntry, ReportSizes,
    RmiMode, TouchContact, page_base, report_ids, rmi_page,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type ReportHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

const REGISTER_SPACE: usize = 0x1_0000;

struct SimState {
    sizes: ReportSizes,
    registers: Vec<u8>,
    page: u8,
    mode: RmiMode,
    output_log: Vec<Vec<u8>>,
    feature_log: Vec<Vec<u8>>,
    drop_reads: usize,
    chunk_limit: Option<usize>,
    fail_output: bool,
    short_writes: bool,
    fail_feature: bool,
    page_violations: usize,
    open: bool,
    io_started: bool,
}

fn le_addr(report: &[u8]) -> Option<u16> {
    Some(u16::from_le_bytes([*report.get(2)?, *report.get(3)?]))
}

impl SimState {
    fn check_page(&mut self, addr: u16) {
        if rmi_page(addr) != self.page {
            self.page_violations += 1;
        }
    }

    fn handle_output(&mut self, report: &[u8]) -> Vec<Vec<u8>> {
        match report.first().copied() {
            Some(report_ids::WRITE) => {
                self.handle_write(report);
                Vec::new()
            }
            Some(report_ids::READ_ADDRESS) => self.handle_read(report),
            _ => Vec::new(),
        }
    }

    fn handle_write(&mut self, report: &[u8]) {
        let (Some(&len), Some(addr)) = (report.get(1), le_addr(report)) else {
            return;
        };
        let data = report
            .get(WRITE_HEADER_LEN..WRITE_HEADER_LEN + usize::from(len))
            .unwrap_or_default();

        if addr & 0x00FF == u16::from(PAGE_SELECT_REGISTER) {
            if let Some(&page) = data.first() {
                self.page = page;
            }
            return;
        }
        self.check_page(addr);
        for (offset, byte) in data.iter().enumerate() {
            let at = (usize::from(addr) + offset) % REGISTER_SPACE;
            if let Some(slot) = self.registers.get_mut(at) {
                *slot = *byte;
            }
        }
    }

    fn handle_read(&mut self, report: &[u8]) -> Vec<Vec<u8>> {
        let (Some(addr), Some(&lo), Some(&hi)) = (le_addr(report), report.get(4), report.get(5))
        else {
            return Vec::new();
        };
        let len = usize::from(u16::from_le_bytes([lo, hi]));
        self.check_page(addr);

        if self.drop_reads > 0 {
            self.drop_reads -= 1;
            return Vec::new();
        }

        let max_chunk = self.sizes.max_read_chunk();
        let chunk = self.chunk_limit.unwrap_or(max_chunk).clamp(1, max_chunk);
        let data: Vec<u8> = (0..len)
            .map(|offset| {
                let at = (usize::from(addr) + offset) % REGISTER_SPACE;
                self.registers.get(at).copied().unwrap_or(0)
            })
            .collect();

        data.chunks(chunk)
            .map(|part| {
                let mut response = vec![0u8; self.sizes.input];
                if let Some(header) = response.get_mut(..READ_RESPONSE_HEADER_LEN) {
                    header.copy_from_slice(&[report_ids::READ_DATA, part.len() as u8]);
                }
                if let Some(body) = response
                    .get_mut(READ_RESPONSE_HEADER_LEN..READ_RESPONSE_HEADER_LEN + part.len())
                {
                    body.copy_from_slice(part);
                }
                response
            })
            .collect()
    }
}

/// In-memory RMI4 device speaking the HID report protocol.
pub struct SimulatedRmi {
    state: Mutex<SimState>,
    handler: Arc<RwLock<Option<ReportHandler>>>,
    inbound_tx: Mutex<Option<Sender<Vec<u8>>>>,
}

impl SimulatedRmi {
    pub fn new(sizes: ReportSizes) -> std::io::Result<Arc<Self>> {
        let handler: Arc<RwLock<Option<ReportHandler>>> = Arc::new(RwLock::new(None));
        let (inbound_tx, inbound_rx) = crossbeam::channel::unbounded();

        let delivery_handler = Arc::clone(&handler);
        thread::Builder::new()
            .name("hid-rmi-sim-delivery".to_string())
            .spawn(move || delivery_main(inbound_rx, delivery_handler))?;

        Ok(Arc::new(Self {
            state: Mutex::new(SimState {
                sizes,
                registers: vec![0; REGISTER_SPACE],
                page: 0,
                mode: RmiMode::Off,
                output_log: Vec::new(),
                feature_log: Vec::new(),
                drop_reads: 0,
                chunk_limit: None,
                fail_output: false,
                short_writes: false,
                fail_feature: false,
                page_violations: 0,
                open: false,
                io_started: false,
            }),
            handler,
            inbound_tx: Mutex::new(Some(inbound_tx)),
        }))
    }

    /// Route inbound reports to `handler`.
    pub fn connect(&self, handler: impl Fn(&[u8]) + Send + Sync + 'static) {
        *self.handler.write() = Some(Arc::new(handler));
    }

    /// Route inbound reports to `device` without keeping it alive.
    pub fn connect_device(&self, device: &Arc<RmiDevice>) {
        let weak = Arc::downgrade(device);
        self.connect(move |report| {
            if let Some(device) = weak.upgrade() {
                device.on_report(report);
            }
        });
    }

    /// Queue an inbound report for delivery.
    pub fn inject(&self, report: Vec<u8>) {
        if let Some(tx) = self.inbound_tx.lock().as_ref() {
            if tx.send(report).is_err() {
                tracing::warn!("Simulated delivery thread is gone");
            }
        }
    }

    /// Emulate a device reset: drop back to mouse mode and emit a mouse report.
    pub fn revert_to_passthrough(&self) {
        self.state.lock().mode = RmiMode::Off;
        self.inject(vec![report_ids::MOUSE, 0x00, 0x00, 0x00]);
    }

    pub fn load(&self, addr: u16, bytes: &[u8]) {
        let mut state = self.state.lock();
        for (offset, byte) in bytes.iter().enumerate() {
            let at = (usize::from(addr) + offset) % REGISTER_SPACE;
            if let Some(slot) = state.registers.get_mut(at) {
                *slot = *byte;
            }
        }
    }

    pub fn register(&self, addr: u16) -> u8 {
        self.state
            .lock()
            .registers
            .get(usize::from(addr))
            .copied()
            .unwrap_or(0)
    }

    /// Write `entries` as the PDT of `page`, terminated by an empty entry.
    pub fn install_pdt(&self, page: u8, entries: &[PdtEntry]) {
        let mut addr = page_base(page) | PDT_START_SCAN_LOCATION;
        for entry in entries {
            self.load(addr, &entry.to_bytes());
            addr = addr.wrapping_sub(PDT_ENTRY_SIZE as u16);
        }
        self.load(addr, &[0; PDT_ENTRY_SIZE]);
    }

    /// Populate the registers of a typical touchpad.
    ///
    /// Page 0 holds F01 (two interrupt sources, no decoder), F11 and F30,
    /// so F11 owns interrupt bit 2 and F30 bit 3.
    pub fn load_touchpad(&self, fixture: &TouchpadFixture) {
        let mut entries = vec![
            PdtEntry {
                query_base: 0x3D,
                command_base: 0x36,
                control_base: 0x14,
                data_base: 0x04,
                interrupt_source_count: 2,
                function_version: 0,
                function_number: 0x01,
            },
            PdtEntry {
                query_base: TouchpadFixture::F11_QUERY_BASE as u8,
                command_base: 0x00,
                control_base: TouchpadFixture::F11_CONTROL_BASE as u8,
                data_base: 0x06,
                interrupt_source_count: 1,
                function_version: 0,
                function_number: 0x11,
            },
        ];
        if fixture.with_f30 {
            entries.push(PdtEntry {
                query_base: TouchpadFixture::F30_QUERY_BASE as u8,
                command_base: 0x00,
                control_base: TouchpadFixture::F30_CONTROL_BASE as u8,
                data_base: 0x30,
                interrupt_source_count: 1,
                function_version: 0,
                function_number: 0x30,
            });
        }
        self.install_pdt(0, &entries);

        let q = TouchpadFixture::F11_QUERY_BASE;
        let query0 = if fixture.size_tenths.is_some() { 1 << 5 } else { 0 };
        let query1 = (fixture.finger_code & 0x07) | if fixture.absolute { 1 << 4 } else { 0 };
        self.load(q, &[query0, query1]);
        if let Some((x, y)) = fixture.size_tenths {
            let [x_lo, x_hi] = x.to_le_bytes();
            let [y_lo, y_hi] = y.to_le_bytes();
            // no query 9/10/11, so query 12 sits at offset 9
            self.load(q + 9, &[1 << 5, x_lo, x_hi, y_lo, y_hi]);
        }
        let [mx_lo, mx_hi] = fixture.max_x.to_le_bytes();
        let [my_lo, my_hi] = fixture.max_y.to_le_bytes();
        self.load(
            TouchpadFixture::F11_CONTROL_BASE + 6,
            &[mx_lo, mx_hi, my_lo, my_hi],
        );

        if fixture.with_f30 {
            let buttons = fixture.buttons.min(8);
            let button_bits = ((1u16 << buttons) - 1) as u8;
            // GPIO only: control 0 absent, control 1 one byte
            self.load(TouchpadFixture::F30_QUERY_BASE, &[1 << 3, 8]);
            self.load(
                TouchpadFixture::F30_CONTROL_BASE + 1,
                &[!button_bits, button_bits],
            );
        }
    }

    pub fn drop_next_reads(&self, count: usize) {
        self.state.lock().drop_reads = count;
    }

    /// Split read responses into chunks of at most `limit` data bytes.
    pub fn set_chunk_limit(&self, limit: Option<usize>) {
        self.state.lock().chunk_limit = limit;
    }

    pub fn fail_output(&self, fail: bool) {
        self.state.lock().fail_output = fail;
    }

    /// Report one byte less than requested for every output report.
    pub fn short_writes(&self, short: bool) {
        self.state.lock().short_writes = short;
    }

    pub fn fail_feature_reports(&self, fail: bool) {
        self.state.lock().fail_feature = fail;
    }

    pub fn output_reports(&self) -> Vec<Vec<u8>> {
        self.state.lock().output_log.clone()
    }

    pub fn feature_reports(&self) -> Vec<Vec<u8>> {
        self.state.lock().feature_log.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.output_log.clear();
        state.feature_log.clear();
    }

    pub fn read_requests(&self) -> usize {
        self.state
            .lock()
            .output_log
            .iter()
            .filter(|r| r.first() == Some(&report_ids::READ_ADDRESS))
            .count()
    }

    /// Pages written to the page select register, in order.
    pub fn page_selects(&self) -> Vec<u8> {
        self.state
            .lock()
            .output_log
            .iter()
            .filter(|r| r.first() == Some(&report_ids::WRITE))
            .filter(|r| le_addr(r).is_some_and(|a| a & 0x00FF == u16::from(PAGE_SELECT_REGISTER)))
            .filter_map(|r| r.get(WRITE_HEADER_LEN).copied())
            .collect()
    }

    pub fn page(&self) -> u8 {
        self.state.lock().page
    }

    /// Register accesses issued while a different page was selected.
    pub fn page_violations(&self) -> usize {
        self.state.lock().page_violations
    }

    pub fn mode(&self) -> RmiMode {
        self.state.lock().mode
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn is_io_started(&self) -> bool {
        self.state.lock().io_started
    }
}

impl ReportTransport for SimulatedRmi {
    fn report_sizes(&self) -> ReportSizes {
        self.state.lock().sizes
    }

    fn output_report(&self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        if state.fail_output {
            return Err(TransportError::Disconnected);
        }
        state.output_log.push(data.to_vec());
        let responses = state.handle_output(data);
        let sent = if state.short_writes {
            data.len().saturating_sub(1)
        } else {
            data.len()
        };
        drop(state);

        for response in responses {
            self.inject(response);
        }
        Ok(sent)
    }

    fn feature_report(
        &self,
        report_id: u8,
        data: &mut [u8],
        direction: ReportDirection,
    ) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        if state.fail_feature {
            return Err(TransportError::Rejected(format!(
                "feature report {report_id:#04x}"
            )));
        }
        state.feature_log.push(data.to_vec());
        if report_id == report_ids::SET_RMI_MODE && direction == ReportDirection::Set {
            if let Some(mode) = data.get(1).copied().and_then(RmiMode::from_u8) {
                state.mode = mode;
            }
        }
        Ok(data.len())
    }

    fn open(&self) -> Result<(), TransportError> {
        self.state.lock().open = true;
        Ok(())
    }

    fn close(&self) {
        self.state.lock().open = false;
    }

    fn start_io(&self) {
        self.state.lock().io_started = true;
    }

    fn stop_io(&self) {
        self.state.lock().io_started = false;
    }
}

impl Drop for SimulatedRmi {
    fn drop(&mut self) {
        // disconnecting ends the delivery thread
        self.inbound_tx.lock().take();
    }
}

fn delivery_main(rx: Receiver<Vec<u8>>, handler: Arc<RwLock<Option<ReportHandler>>>) {
    for report in rx.iter() {
        let current = handler.read().clone();
        if let Some(handler) = current {
            handler(&report);
        }
    }
}

/// Register contents for [`SimulatedRmi::load_touchpad`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchpadFixture {
    /// Raw 3-bit finger field of F11 query 1.
    pub finger_code: u8,
    pub absolute: bool,
    pub max_x: u16,
    pub max_y: u16,
    /// Physical size in tenths of a millimetre.
    pub size_tenths: Option<(u16, u16)>,
    pub with_f30: bool,
    /// Buttons wired to the first GPIOs (at most 8).
    pub buttons: u8,
}

impl TouchpadFixture {
    pub const F11_QUERY_BASE: u16 = 0x0080;
    pub const F11_CONTROL_BASE: u16 = 0x0040;
    pub const F30_QUERY_BASE: u16 = 0x00B0;
    pub const F30_CONTROL_BASE: u16 = 0x00A0;
    /// F11 interrupt bit in attention reports.
    pub const F11_IRQ: u8 = 1 << 2;
    /// F30 interrupt bit in attention reports.
    pub const F30_IRQ: u8 = 1 << 3;
}

impl Default for TouchpadFixture {
    fn default() -> Self {
        Self {
            finger_code: 4,
            absolute: true,
            max_x: 3001,
            max_y: 1801,
            size_tenths: Some((1000, 600)),
            with_f30: true,
            buttons: 1,
        }
    }
}

/// An event observed by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Configured(DeviceCapabilities),
    Touch {
        slot: usize,
        contact: Option<TouchContact>,
    },
    Button {
        index: usize,
        pressed: bool,
    },
    Sync,
}

/// Input sink that records every call. Clones share one event log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<InputEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().clone()
    }

    /// Return and clear the recorded events.
    pub fn take(&self) -> Vec<InputEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl InputSink for RecordingSink {
    fn configure(&mut self, capabilities: &DeviceCapabilities) {
        self.events
            .lock()
            .push(InputEvent::Configured(capabilities.clone()));
    }

    fn touch(&mut self, slot: usize, contact: Option<&TouchContact>) {
        self.events.lock().push(InputEvent::Touch {
            slot,
            contact: contact.copied(),
        });
    }

    fn button(&mut self, index: usize, pressed: bool) {
        self.events
            .lock()
            .push(InputEvent::Button { index, pressed });
    }

    fn sync(&mut self) {
        self.events.lock().push(InputEvent::Sync);
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    loop {
        if condition() {
            return true;
        }
        if started.elapsed() >= timeout {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}
