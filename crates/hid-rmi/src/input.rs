//! Input-event side of the stack: advertised capabilities, the sink that
//! receives decoded contacts and buttons, and the last reported state.

use crate::populate::Population;
use hid_rmi_protocol::{AttentionFrame, ButtonFrame, MAX_FINGERS, TouchContact, TouchFrame};
use serde::Serialize;

/// Highest orientation value (`TouchContact::wide`).
pub const ORIENTATION_MAX: u8 = 1;
/// Highest pressure value.
pub const PRESSURE_MAX: u8 = u8::MAX;
/// Highest touch major / minor value.
pub const TOUCH_SIZE_MAX: u8 = 0x0F;

/// One absolute axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisRange {
    pub min: u16,
    pub max: u16,
    /// Units per millimetre, 0 when unknown.
    pub resolution: u16,
}

/// What the device reports, announced to the sink once at attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCapabilities {
    /// Multi-touch slots.
    pub slots: u8,
    pub x: AxisRange,
    pub y: AxisRange,
    pub size_mm: Option<(u16, u16)>,
    pub buttons: usize,
    /// The whole surface is one clickable button.
    pub button_pad: bool,
}

impl DeviceCapabilities {
    pub fn from_population(population: &Population) -> Self {
        let sensor = &population.sensor;
        let (res_x, res_y) = sensor.resolution().unwrap_or((0, 0));
        let buttons = population.buttons.button_count();
        Self {
            slots: sensor.max_fingers.min(MAX_FINGERS as u8),
            x: AxisRange {
                min: 1,
                max: sensor.max_x,
                resolution: res_x,
            },
            y: AxisRange {
                min: 1,
                max: sensor.max_y,
                resolution: res_y,
            },
            size_mm: sensor.size_mm,
            buttons,
            button_pad: buttons == 1,
        }
    }
}

/// Consumer of decoded input.
///
/// Called from the transport's inbound delivery context, so implementations
/// should hand events off rather than block.
pub trait InputSink: Send {
    /// Announce the device before any event is reported.
    fn configure(&mut self, capabilities: &DeviceCapabilities);

    /// State of one multi-touch slot; `None` when no finger is present.
    fn touch(&mut self, slot: usize, contact: Option<&TouchContact>);

    fn button(&mut self, index: usize, pressed: bool);

    /// End of the events from one attention report.
    fn sync(&mut self);
}

/// Last state forwarded to the sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    touches: Vec<Option<TouchContact>>,
    buttons: Vec<bool>,
}

impl InputState {
    pub fn new(capabilities: &DeviceCapabilities) -> Self {
        Self {
            touches: vec![None; usize::from(capabilities.slots)],
            buttons: vec![false; capabilities.buttons],
        }
    }

    pub fn touches(&self) -> &[Option<TouchContact>] {
        &self.touches
    }

    pub fn buttons(&self) -> &[bool] {
        &self.buttons
    }

    /// Forward a decoded attention frame to `sink`. Every slot of a touch
    /// frame is reported, lifted fingers included.
    pub fn apply(&mut self, frame: &AttentionFrame, sink: &mut dyn InputSink) -> bool {
        let mut emitted = false;
        if let Some(touch) = &frame.touch {
            self.apply_touch(touch, sink);
            emitted = true;
        }
        if let Some(buttons) = &frame.buttons {
            emitted |= self.apply_buttons(buttons, sink);
        }
        if emitted {
            sink.sync();
        }
        emitted
    }

    fn apply_touch(&mut self, frame: &TouchFrame, sink: &mut dyn InputSink) {
        for (slot, contact) in frame.slots().iter().enumerate() {
            if let Some(stored) = self.touches.get_mut(slot) {
                *stored = *contact;
            }
            sink.touch(slot, contact.as_ref());
        }
    }

    fn apply_buttons(&mut self, frame: &ButtonFrame, sink: &mut dyn InputSink) -> bool {
        for (index, pressed) in frame.iter().enumerate() {
            if let Some(stored) = self.buttons.get_mut(index) {
                *stored = pressed;
            }
            sink.button(index, pressed);
        }
        frame.count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{InputEvent, RecordingSink};
    use crate::scan::FunctionTable;
    use hid_rmi_protocol::{
        AttentionLayout, ButtonWiring, F11SensorInfo, TouchLayout, decode_attention,
    };

    fn population(buttons: u32) -> Population {
        Population {
            functions: FunctionTable::default(),
            sensor: F11SensorInfo {
                max_fingers: 2,
                max_x: 3001,
                max_y: 1801,
                size_mm: Some((100, 60)),
            },
            buttons: ButtonWiring {
                gpio_led_count: 8,
                button_mask: buttons,
                state_mask: buttons,
            },
        }
    }

    #[test]
    fn test_capabilities() {
        let caps = DeviceCapabilities::from_population(&population(0b1));
        assert_eq!(caps.slots, 2);
        assert_eq!(
            caps.x,
            AxisRange {
                min: 1,
                max: 3001,
                resolution: 30
            }
        );
        assert_eq!(caps.y.resolution, 30);
        assert!(caps.button_pad);

        let caps = DeviceCapabilities::from_population(&population(0b11));
        assert_eq!(caps.buttons, 2);
        assert!(!caps.button_pad);
    }

    #[test]
    fn test_capabilities_without_physical_size() {
        let mut population = population(0);
        population.sensor.size_mm = None;
        let caps = DeviceCapabilities::from_population(&population);
        assert_eq!(caps.x.resolution, 0);
        assert_eq!(caps.y.resolution, 0);
        assert!(!caps.button_pad);
    }

    #[test]
    fn test_apply_touch_frame_reports_every_slot() -> Result<(), Box<dyn std::error::Error>> {
        let caps = DeviceCapabilities::from_population(&population(0));
        let mut state = InputState::new(&caps);
        let mut sink = RecordingSink::default();

        let layout = AttentionLayout {
            touch: Some(TouchLayout {
                irq_mask: 0b1,
                interrupt_base: 0,
                max_fingers: 2,
                max_y: 1801,
            }),
            buttons: None,
        };
        // finger 0 present, finger 1 lifted
        let report = [
            0x0C, 0b1, 0b0000_0001, 0x10, 0x20, 0x34, 0x21, 0x40, 0, 0, 0, 0, 0,
        ];
        let frame = decode_attention(&layout, &report)?;
        assert!(state.apply(&frame, &mut sink));

        let events = sink.take();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events.first(),
            Some(InputEvent::Touch {
                slot: 0,
                contact: Some(_)
            })
        ));
        assert_eq!(
            events.get(1),
            Some(&InputEvent::Touch {
                slot: 1,
                contact: None
            })
        );
        assert_eq!(events.get(2), Some(&InputEvent::Sync));
        assert!(state.touches().first().is_some_and(Option::is_some));
        Ok(())
    }

    #[test]
    fn test_empty_frame_emits_nothing() {
        let caps = DeviceCapabilities::from_population(&population(0));
        let mut state = InputState::new(&caps);
        let mut sink = RecordingSink::default();
        assert!(!state.apply(&AttentionFrame::default(), &mut sink));
        assert!(sink.events().is_empty());
    }
}
