//! Device lifecycle and inbound report routing.

use crate::config::RmiConfig;
use crate::engine::RegisterEngine;
use crate::error::{RmiError, RmiResult};
use crate::input::{DeviceCapabilities, InputSink, InputState};
use crate::mode::{ModeController, ModeState};
use crate::populate::{Population, populate};
use crate::scan::FunctionTable;
use crate::transport::ReportTransport;
use hid_rmi_protocol::{AttentionLayout, TouchContact, decode_attention, report_ids};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, trace, warn};

/// State learned at attach time.
#[derive(Debug, Clone)]
struct Attachment {
    functions: FunctionTable,
    capabilities: DeviceCapabilities,
    layout: AttentionLayout,
}

struct InputPath {
    state: InputState,
    sink: Box<dyn InputSink>,
}

/// An RMI4 device reached through a HID report transport.
///
/// Construction does no I/O. The transport's inbound reports must be routed
/// to [`RmiDevice::on_report`] before [`RmiDevice::attach`] is called, since
/// attach itself depends on read responses.
pub struct RmiDevice {
    transport: Arc<dyn ReportTransport>,
    engine: RegisterEngine,
    mode: ModeController,
    started: AtomicBool,
    /// Serializes attach and detach.
    lifecycle: Mutex<()>,
    attachment: RwLock<Option<Attachment>>,
    input: Mutex<InputPath>,
}

impl RmiDevice {
    pub fn new(
        transport: Arc<dyn ReportTransport>,
        sink: Box<dyn InputSink>,
        config: RmiConfig,
    ) -> RmiResult<Self> {
        let engine = RegisterEngine::new(Arc::clone(&transport), config.clone())?;
        let mode = ModeController::new(Arc::clone(&transport), config.recovery_queue_depth);
        Ok(Self {
            transport,
            engine,
            mode,
            started: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
            attachment: RwLock::new(None),
            input: Mutex::new(InputPath {
                state: InputState::default(),
                sink,
            }),
        })
    }

    /// Bring the device up: open the transport, switch to attention mode,
    /// discover and populate functions and announce the input device.
    ///
    /// On failure the transport is closed again and the device stays
    /// unstarted. Concurrent callers are serialized; whoever comes second
    /// gets the capabilities of the first attach.
    pub fn attach(&self) -> RmiResult<DeviceCapabilities> {
        let _lifecycle = self.lifecycle.lock();
        if let Some(attachment) = self.attachment.read().as_ref() {
            warn!("RMI device already attached");
            return Ok(attachment.capabilities.clone());
        }

        info!("Opening low level transport");
        self.transport.open()?;
        self.transport.start_io();

        match self.configure() {
            Ok(capabilities) => Ok(capabilities),
            Err(e) => {
                error!("RMI attach failed: {}", e);
                self.mode.shutdown();
                self.mode.reset();
                self.transport.stop_io();
                self.transport.close();
                Err(e)
            }
        }
    }

    fn configure(&self) -> RmiResult<DeviceCapabilities> {
        self.mode.start_worker()?;
        self.mode.enter_attention_mode().inspect_err(|e| {
            error!("Failed to set RMI mode: {}", e);
        })?;
        self.engine.set_page(0).inspect_err(|e| {
            error!("Failed to set page select to 0: {}", e);
        })?;

        let population: Population = populate(&self.engine)?;
        let capabilities = DeviceCapabilities::from_population(&population);
        let layout = population.attention_layout();

        {
            let mut input = self.input.lock();
            input.state = InputState::new(&capabilities);
            input.sink.configure(&capabilities);
        }
        *self.attachment.write() = Some(Attachment {
            functions: population.functions,
            capabilities: capabilities.clone(),
            layout,
        });
        self.started.store(true, Ordering::Release);

        info!(
            "RMI device attached: {} slots, {}x{}, {} buttons",
            capabilities.slots, capabilities.x.max, capabilities.y.max, capabilities.buttons
        );
        Ok(capabilities)
    }

    /// Stop reporting input and release the transport.
    pub fn detach(&self) {
        let _lifecycle = self.lifecycle.lock();
        self.started.store(false, Ordering::Release);
        self.mode.shutdown();
        self.mode.reset();
        self.transport.stop_io();
        self.transport.close();
        self.attachment.write().take();
        info!("RMI device detached");
    }

    /// Re-apply attention mode after the host resumed from suspend.
    pub fn resume(&self) -> RmiResult<()> {
        debug!("Resuming RMI device");
        self.mode.enter_attention_mode()
    }

    /// Re-apply attention mode after the device was reset during resume.
    pub fn reset_resume(&self) -> RmiResult<()> {
        debug!("Reset-resuming RMI device");
        self.mode.enter_attention_mode()
    }

    /// Route one inbound report.
    ///
    /// Returns `true` when the report was consumed; anything else (mouse
    /// reports included) is left for the caller's default handling.
    ///
    /// Any mouse report seen in attention mode schedules recovery, whatever
    /// its button and motion bytes hold.
    pub fn on_report(&self, report: &[u8]) -> bool {
        match report.first().copied() {
            Some(report_ids::READ_DATA) => self.engine.complete_read(report),
            Some(report_ids::ATTENTION) => self.handle_attention(report),
            Some(report_ids::MOUSE) => {
                self.mode.on_passthrough_report();
                false
            }
            Some(id) => {
                trace!("Ignoring report {:#04x}", id);
                false
            }
            None => false,
        }
    }

    fn handle_attention(&self, report: &[u8]) -> bool {
        if !self.started.load(Ordering::Acquire) {
            // still attaching, the input side is not ready
            return false;
        }
        let Some(layout) = self.attachment.read().as_ref().map(|a| a.layout) else {
            return false;
        };

        let frame = match decode_attention(&layout, report) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping attention report: {}", e);
                return false;
            }
        };
        if frame.unknown_irq != 0 {
            warn!("Unknown interrupt source: {:#04x}", frame.unknown_irq);
        }
        if frame.truncated {
            debug!(
                "Attention report too short for irq {:#04x} ({} bytes)",
                frame.irq,
                report.len()
            );
        }

        let mut input = self.input.lock();
        let InputPath { state, sink } = &mut *input;
        state.apply(&frame, sink.as_mut());
        true
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn mode_state(&self) -> ModeState {
        self.mode.state()
    }

    /// Mouse-mode recoveries completed since creation.
    pub fn recoveries(&self) -> u64 {
        self.mode.recoveries()
    }

    /// Register access for callers that need to talk to functions directly.
    pub fn engine(&self) -> &RegisterEngine {
        &self.engine
    }

    pub fn capabilities(&self) -> Option<DeviceCapabilities> {
        self.attachment
            .read()
            .as_ref()
            .map(|a| a.capabilities.clone())
    }

    pub fn functions(&self) -> RmiResult<FunctionTable> {
        self.attachment
            .read()
            .as_ref()
            .map(|a| a.functions.clone())
            .ok_or(RmiError::NotAttached)
    }

    /// Last reported contact per slot.
    pub fn touch_state(&self) -> Vec<Option<TouchContact>> {
        self.input.lock().state.touches().to_vec()
    }

    /// Last reported state per button.
    pub fn button_state(&self) -> Vec<bool> {
        self.input.lock().state.buttons().to_vec()
    }
}

impl Drop for RmiDevice {
    fn drop(&mut self) {
        if self.is_started() {
            debug!("RMI device dropped while attached");
            self.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{RecordingSink, SimulatedRmi, TouchpadFixture};
    use hid_rmi_protocol::ReportSizes;
    use tracing_test::traced_test;

    fn fast_config() -> RmiConfig {
        RmiConfig {
            read_timeout_ms: 50,
            ..RmiConfig::default()
        }
    }

    fn attached() -> Result<(Arc<SimulatedRmi>, Arc<RmiDevice>, RecordingSink), Box<dyn std::error::Error>>
    {
        let sim = SimulatedRmi::new(ReportSizes::default())?;
        sim.load_touchpad(&TouchpadFixture::default());
        let sink = RecordingSink::default();
        let device = Arc::new(RmiDevice::new(
            sim.clone(),
            Box::new(sink.clone()),
            fast_config(),
        )?);
        sim.connect_device(&device);
        device.attach()?;
        Ok((sim, device, sink))
    }

    #[test]
    fn test_attention_ignored_before_attach() -> Result<(), Box<dyn std::error::Error>> {
        let sim = SimulatedRmi::new(ReportSizes::default())?;
        let sink = RecordingSink::default();
        let device = RmiDevice::new(sim, Box::new(sink.clone()), fast_config())?;
        assert!(!device.on_report(&[report_ids::ATTENTION, 0x04, 0x01]));
        assert!(sink.events().is_empty());
        assert!(matches!(device.functions(), Err(RmiError::NotAttached)));
        Ok(())
    }

    #[test]
    #[traced_test]
    fn test_unknown_interrupt_is_logged() -> Result<(), Box<dyn std::error::Error>> {
        let (_sim, device, _sink) = attached()?;
        // bit 0 belongs to F01, which has no decoder
        let mut report = vec![report_ids::ATTENTION, 0b0000_0001];
        report.resize(30, 0);
        assert!(device.on_report(&report));
        assert!(logs_contain("Unknown interrupt source: 0x01"));
        Ok(())
    }

    #[test]
    #[traced_test]
    fn test_orphan_read_data_is_logged() -> Result<(), Box<dyn std::error::Error>> {
        let (_sim, device, _sink) = attached()?;
        let mut report = vec![report_ids::READ_DATA, 2, 0xAA, 0xBB];
        report.resize(30, 0);
        assert!(!device.on_report(&report));
        assert!(logs_contain("no read request pending"));
        Ok(())
    }

    #[test]
    fn test_detach_stops_input() -> Result<(), Box<dyn std::error::Error>> {
        let (sim, device, sink) = attached()?;
        assert!(device.is_started());
        assert!(sim.is_open());

        device.detach();
        assert!(!device.is_started());
        assert!(!sim.is_open());
        assert_eq!(device.mode_state(), ModeState::Uninitialized);

        sink.take();
        let mut report = vec![report_ids::ATTENTION, 0b0000_0100, 0x01];
        report.resize(30, 0);
        assert!(!device.on_report(&report));
        assert!(sink.events().is_empty());
        Ok(())
    }

    #[test]
    fn test_second_attach_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
        let (sim, device, _sink) = attached()?;
        sim.clear_log();
        let caps = device.attach()?;
        assert_eq!(Some(caps), device.capabilities());
        assert!(sim.output_reports().is_empty());
        Ok(())
    }
}
