//! RMI mode control and recovery from pass-through (mouse) mode.
//!
//! A device that is reset or power-cycled behind our back comes back up in
//! mouse mode and starts emitting standard mouse reports. Seeing one while
//! attention mode is supposed to be active queues a request to re-apply the
//! mode on a dedicated worker, since the inbound delivery context must not
//! block on feature report I/O. Requests raised while one is already
//! pending are coalesced.

use crate::error::{RmiError, RmiResult};
use crate::transport::{ReportDirection, ReportTransport};
use crossbeam::channel::{Receiver, Sender, TrySendError};
use hid_rmi_protocol::report::encode_set_mode;
use hid_rmi_protocol::{RmiMode, report_ids};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

const MODE_STATE_UNINITIALIZED: u8 = 0;
const MODE_STATE_ATTENTION: u8 = 1;
const MODE_STATE_RECOVERY_PENDING: u8 = 2;

/// Mode the host believes the device is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    /// Attention mode not (or no longer) requested.
    Uninitialized,
    /// Attention mode applied.
    Attention,
    /// A pass-through report was seen; re-applying attention mode.
    RecoveryPending,
}

impl ModeState {
    fn from_u8(value: u8) -> Self {
        match value {
            MODE_STATE_ATTENTION => Self::Attention,
            MODE_STATE_RECOVERY_PENDING => Self::RecoveryPending,
            _ => Self::Uninitialized,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Uninitialized => MODE_STATE_UNINITIALIZED,
            Self::Attention => MODE_STATE_ATTENTION,
            Self::RecoveryPending => MODE_STATE_RECOVERY_PENDING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryRequest {
    ReapplyAttention,
}

fn send_mode(transport: &dyn ReportTransport, mode: RmiMode) -> RmiResult<()> {
    let mut report = encode_set_mode(mode);
    transport
        .feature_report(report_ids::SET_RMI_MODE, &mut report, ReportDirection::Set)
        .map_err(|e| {
            error!("Unable to set RMI mode to {}: {}", mode.as_u8(), e);
            RmiError::Transport(e)
        })?;
    Ok(())
}

pub struct ModeController {
    transport: Arc<dyn ReportTransport>,
    state: Arc<AtomicU8>,
    recoveries: Arc<AtomicU64>,
    queue_depth: usize,
    recovery_tx: Mutex<Option<Sender<RecoveryRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ModeController {
    pub fn new(transport: Arc<dyn ReportTransport>, queue_depth: usize) -> Self {
        Self {
            transport,
            state: Arc::new(AtomicU8::new(MODE_STATE_UNINITIALIZED)),
            recoveries: Arc::new(AtomicU64::new(0)),
            queue_depth: queue_depth.max(1),
            recovery_tx: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ModeState {
        ModeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Recoveries completed since creation.
    pub fn recoveries(&self) -> u64 {
        self.recoveries.load(Ordering::Acquire)
    }

    /// Send the set-mode feature report.
    pub fn set_mode(&self, mode: RmiMode) -> RmiResult<()> {
        send_mode(&*self.transport, mode)?;
        let next = if mode.is_attention() {
            ModeState::Attention
        } else {
            ModeState::Uninitialized
        };
        self.state.store(next.to_u8(), Ordering::Release);
        debug!("RMI mode set to {}", mode.as_u8());
        Ok(())
    }

    pub fn enter_attention_mode(&self) -> RmiResult<()> {
        self.set_mode(RmiMode::AttentionReports)
    }

    /// Forget the applied mode without talking to the device.
    pub fn reset(&self) {
        self.state
            .store(MODE_STATE_UNINITIALIZED, Ordering::Release);
    }

    /// Spawn the recovery worker if it is not already running.
    pub fn start_worker(&self) -> RmiResult<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let (tx, rx) = crossbeam::channel::bounded(self.queue_depth);
        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        let recoveries = Arc::clone(&self.recoveries);
        let handle = thread::Builder::new()
            .name("hid-rmi-recovery".to_string())
            .spawn(move || recovery_worker_main(rx, transport, state, recoveries))
            .map_err(|e| RmiError::Worker(format!("Failed to spawn recovery worker: {}", e)))?;

        *worker = Some(handle);
        *self.recovery_tx.lock() = Some(tx);
        Ok(())
    }

    /// React to a pass-through report. Returns `true` when a recovery was
    /// queued by this call.
    pub fn on_passthrough_report(&self) -> bool {
        if self
            .state
            .compare_exchange(
                MODE_STATE_ATTENTION,
                MODE_STATE_RECOVERY_PENDING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            // not in attention mode, or a recovery is already queued
            return false;
        }

        let queued = match self.recovery_tx.lock().as_ref() {
            Some(tx) => match tx.try_send(RecoveryRequest::ReapplyAttention) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    debug!("Recovery already queued");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            },
            None => false,
        };

        if queued {
            warn!("Device reverted to mouse mode, scheduling recovery");
        } else {
            warn!("Device reverted to mouse mode but recovery worker is not running");
            self.state.store(MODE_STATE_ATTENTION, Ordering::Release);
        }
        queued
    }

    /// Stop the recovery worker and wait for it to exit.
    pub fn shutdown(&self) {
        // disconnecting the channel ends the worker loop
        self.recovery_tx.lock().take();

        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        match handle.join() {
            Ok(()) => debug!("Recovery worker stopped cleanly"),
            Err(_) => error!("Recovery worker panicked"),
        }
    }

    pub fn is_worker_running(&self) -> bool {
        self.worker.lock().is_some()
    }
}

impl Drop for ModeController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn recovery_worker_main(
    rx: Receiver<RecoveryRequest>,
    transport: Arc<dyn ReportTransport>,
    state: Arc<AtomicU8>,
    recoveries: Arc<AtomicU64>,
) {
    debug!("Recovery worker started");

    for request in rx.iter() {
        match request {
            RecoveryRequest::ReapplyAttention => {
                match send_mode(&*transport, RmiMode::AttentionReports) {
                    Ok(()) => {
                        recoveries.fetch_add(1, Ordering::AcqRel);
                        info!("Attention mode re-applied");
                    }
                    Err(e) => warn!("Failed to re-apply attention mode: {}", e),
                }
                // detach may have reset the state meanwhile
                if state
                    .compare_exchange(
                        MODE_STATE_RECOVERY_PENDING,
                        MODE_STATE_ATTENTION,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_err()
                {
                    debug!("Mode state changed during recovery");
                }
            }
        }
    }

    debug!("Recovery worker stopping");
}
