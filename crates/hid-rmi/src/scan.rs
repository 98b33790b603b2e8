//! Page Description Table discovery.

use crate::engine::RegisterEngine;
use crate::error::{RmiError, RmiResult};
use hid_rmi_protocol::pdt::pdt_scan_addresses;
use hid_rmi_protocol::{FunctionDescriptor, FunctionKind, PDT_ENTRY_SIZE, PdtEntry, RMI4_MAX_PAGE};
use tracing::{debug, error, info};

/// Functions found by a PDT scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionTable {
    /// F11, the 2D sensor.
    pub touch: Option<FunctionDescriptor>,
    /// F30, the GPIO/LED block.
    pub buttons: Option<FunctionDescriptor>,
    /// Every function in discovery order, including unsupported ones.
    pub discovered: Vec<FunctionDescriptor>,
    /// Total interrupt sources allocated across all functions.
    pub interrupt_count: u16,
}

impl FunctionTable {
    fn register(&mut self, function: FunctionDescriptor) {
        match function.kind {
            FunctionKind::Touch => self.touch = Some(function),
            FunctionKind::ButtonLed => self.buttons = Some(function),
            FunctionKind::Unknown(_) => {}
        }
        self.discovered.push(function);
    }

    pub fn find(&self, kind: FunctionKind) -> Option<&FunctionDescriptor> {
        match kind {
            FunctionKind::Touch => self.touch.as_ref(),
            FunctionKind::ButtonLed => self.buttons.as_ref(),
            FunctionKind::Unknown(_) => self.discovered.iter().find(|f| f.kind == kind),
        }
    }
}

pub struct PdtScanner<'a> {
    engine: &'a RegisterEngine,
}

impl<'a> PdtScanner<'a> {
    pub fn new(engine: &'a RegisterEngine) -> Self {
        Self { engine }
    }

    /// Walk every page's PDT until a page without any function.
    ///
    /// Interrupt bits are handed out in discovery order; functions this stack
    /// does not drive still consume their share.
    pub fn scan(&self) -> RmiResult<FunctionTable> {
        let mut table = FunctionTable::default();
        let mut interrupt: u16 = 0;

        info!("Scanning PDT...");
        for page in 0..=RMI4_MAX_PAGE {
            let mut page_has_function = false;

            for addr in pdt_scan_addresses(page) {
                let entry = self.read_entry(addr)?;
                if entry.is_end_of_table() {
                    break;
                }
                page_has_function = true;

                let function = FunctionDescriptor::from_pdt(&entry, page, interrupt);
                info!(
                    "Found {} on page {:#04x} (irq base {}, {} sources)",
                    function.kind, page, interrupt, function.interrupt_count
                );
                debug!("{} register map: {:?}", function.kind, function);
                interrupt = interrupt.saturating_add(u16::from(entry.interrupt_source_count));
                table.register(function);
            }

            if !page_has_function {
                break;
            }
        }

        table.interrupt_count = interrupt;
        info!(
            "PDT scan complete: {} functions, {} interrupt sources",
            table.discovered.len(),
            interrupt
        );
        Ok(table)
    }

    fn read_entry(&self, addr: u16) -> RmiResult<PdtEntry> {
        let bytes = self
            .engine
            .read_block(addr, PDT_ENTRY_SIZE)
            .map_err(|source| {
                error!("Read of PDT entry at {:#06x} failed: {}", addr, source);
                RmiError::Scan {
                    addr,
                    source: Box::new(source),
                }
            })?;
        Ok(PdtEntry::parse(&bytes)?)
    }
}
