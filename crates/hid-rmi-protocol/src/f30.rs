//! F30 (GPIO / LED) query and control register decoding.
//!
//! Physical buttons are the GPIOs configured as inputs with their pull
//! resistor enabled. Control registers 2 (direction) and 3 (data / pull)
//! are each `ceil(gpio_led_count / 8)` bytes long; control 0 only exists
//! when the block has both GPIOs and LEDs.

use crate::attention::ButtonLayout;
use crate::function::FunctionDescriptor;
use crate::{RmiProtocolError, RmiProtocolResult};

/// Bytes of F30 query registers read at attach time.
pub const QUERY_LEN: usize = 2;

const GPIO_LED_COUNT_MASK: u8 = 0x1F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct F30Query {
    pub has_gpio: bool,
    pub has_led: bool,
    pub gpio_led_count: u8,
}

impl F30Query {
    pub fn parse(bytes: &[u8]) -> RmiProtocolResult<Self> {
        let [q0, q1, ..] = *bytes else {
            return Err(RmiProtocolError::InvalidReportSize {
                expected: QUERY_LEN,
                actual: bytes.len(),
            });
        };
        Ok(Self {
            has_gpio: q0 & (1 << 3) != 0,
            has_led: q0 & (1 << 2) != 0,
            gpio_led_count: q1 & GPIO_LED_COUNT_MASK,
        })
    }

    /// Length of one per-GPIO control register.
    pub fn bytes_per_ctrl(&self) -> usize {
        usize::from(self.gpio_led_count).div_ceil(8)
    }

    /// Offset of control 2 (direction) from the control base; control 3
    /// (data) follows immediately.
    pub fn direction_data_offset(&self) -> u16 {
        let per_ctrl = self.bytes_per_ctrl() as u16;
        let ctrl0 = if self.has_gpio && self.has_led {
            per_ctrl
        } else {
            0
        };
        // ctrl 1 is always present
        ctrl0 + per_ctrl
    }

    /// Bytes covering controls 2 and 3.
    pub fn direction_data_len(&self) -> usize {
        2 * self.bytes_per_ctrl()
    }

    /// Bytes F30 contributes to an attention report.
    pub fn report_size(&self) -> usize {
        self.bytes_per_ctrl()
    }
}

fn bit(bytes: &[u8], index: usize) -> bool {
    bytes
        .get(index / 8)
        .is_some_and(|byte| (byte >> (index % 8)) & 1 != 0)
}

/// Which GPIO positions are wired as buttons, and their pull polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonWiring {
    pub gpio_led_count: u8,
    /// Bit `i` set when GPIO `i` is a button.
    pub button_mask: u32,
    /// Bit `i` set when GPIO `i` reads 0 while pressed.
    pub state_mask: u32,
}

impl ButtonWiring {
    /// Derive the wiring from the control 2 + 3 block.
    pub fn from_control(query: &F30Query, block: &[u8]) -> RmiProtocolResult<Self> {
        let per_ctrl = query.bytes_per_ctrl();
        if block.len() < query.direction_data_len() {
            return Err(RmiProtocolError::InvalidReportSize {
                expected: query.direction_data_len(),
                actual: block.len(),
            });
        }
        let (direction, data) = block.split_at(per_ctrl);

        let mut wiring = Self {
            gpio_led_count: query.gpio_led_count,
            ..Self::default()
        };
        for gpio in 0..usize::from(query.gpio_led_count) {
            let is_input = !bit(direction, gpio);
            let pulled = bit(data, gpio);
            // actual buttons have a pull-up resistor
            if is_input && pulled {
                wiring.button_mask |= 1 << gpio;
                wiring.state_mask |= 1 << gpio;
            }
        }
        Ok(wiring)
    }

    pub fn button_count(&self) -> usize {
        self.button_mask.count_ones() as usize
    }

    pub fn button_layout(&self, function: &FunctionDescriptor) -> ButtonLayout {
        ButtonLayout {
            irq_mask: function.irq_mask,
            interrupt_base: function.interrupt_base,
            gpio_led_count: self.gpio_led_count,
            button_mask: self.button_mask,
            state_mask: self.state_mask,
        }
    }
}
