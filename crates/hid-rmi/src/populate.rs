//! Attach-time register reads for the supported functions.

use crate::engine::RegisterEngine;
use crate::error::{RmiError, RmiResult};
use crate::scan::{FunctionTable, PdtScanner};
use hid_rmi_protocol::f11::{self, CONTROL_BLOCK_LEN, query};
use hid_rmi_protocol::f30::{self, F30Query};
use hid_rmi_protocol::{
    AttentionLayout, ButtonWiring, F11Control, F11Query0, F11Query1, F11SensorInfo,
    FunctionDescriptor,
};
use tracing::{debug, error, info, warn};

/// Read the F11 query and control registers.
pub fn populate_f11(
    engine: &RegisterEngine,
    function: Option<&FunctionDescriptor>,
) -> RmiResult<F11SensorInfo> {
    let Some(function) = function else {
        error!("No 2D sensor found, giving up");
        return Err(RmiError::unsupported("no F11 2D sensor"));
    };
    let query_base = function.query_base;

    let query0 = F11Query0::from_byte(engine.read_byte(query_base.wrapping_add(query::GENERAL))?);
    let query1 = F11Query1::from_byte(engine.read_byte(query_base.wrapping_add(query::SENSOR))?);
    if !query1.has_absolute {
        error!("F11 sensor does not report absolute positions");
        return Err(RmiError::unsupported("F11 without absolute reporting"));
    }
    debug!("F11 reports {} fingers", query1.max_fingers);

    let has_query10 =
        f11::has_query10(engine.read_byte(query_base.wrapping_add(query::GESTURES))?);

    let mut size_mm = None;
    if query0.has_query12 {
        let query12_addr = query_base.wrapping_add(query0.query12_offset(has_query10));
        let query12 = engine.read_byte(query12_addr)?;
        if f11::has_physical_props(query12) {
            let bytes =
                engine.read_block(query12_addr.wrapping_add(1), query::PHYSICAL_SIZE_LEN)?;
            let (x_mm, y_mm) = f11::physical_size_mm(&bytes)?;
            info!("Sensor size: {} mm x {} mm", x_mm, y_mm);
            size_mm = Some((x_mm, y_mm));
        }
    }

    let control = F11Control::parse(&engine.read_block(function.control_base, CONTROL_BLOCK_LEN)?)?;
    info!(
        "Sensor range: x 1..{} y 1..{}",
        control.max_x, control.max_y
    );

    Ok(F11SensorInfo {
        max_fingers: query1.max_fingers,
        max_x: control.max_x,
        max_y: control.max_y,
        size_mm,
    })
}

/// Read the F30 query registers and the GPIO direction/data controls.
pub fn populate_f30(
    engine: &RegisterEngine,
    function: Option<&FunctionDescriptor>,
) -> RmiResult<(F30Query, ButtonWiring)> {
    let Some(function) = function else {
        return Err(RmiError::unsupported("no F30 GPIO/LED function"));
    };

    let query = F30Query::parse(&engine.read_block(function.query_base, f30::QUERY_LEN)?)?;
    debug!(
        "F30: gpio {} led {} count {}",
        query.has_gpio, query.has_led, query.gpio_led_count
    );

    let block = engine.read_block(
        function.control_base.wrapping_add(query.direction_data_offset()),
        query.direction_data_len(),
    )?;
    let wiring = ButtonWiring::from_control(&query, &block)?;
    info!("Found {} buttons", wiring.button_count());
    Ok((query, wiring))
}

/// Everything attach learns about the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Population {
    pub functions: FunctionTable,
    pub sensor: F11SensorInfo,
    /// Zero buttons when F30 is absent or could not be read.
    pub buttons: ButtonWiring,
}

impl Population {
    /// Attention decoding layout for the populated functions.
    pub fn attention_layout(&self) -> AttentionLayout {
        AttentionLayout {
            touch: self
                .functions
                .touch
                .as_ref()
                .map(|f| self.sensor.touch_layout(f)),
            buttons: self
                .functions
                .buttons
                .as_ref()
                .map(|f| self.buttons.button_layout(f)),
        }
    }
}

/// Scan the PDT and populate F11 and F30.
///
/// A missing or unusable F11 fails the whole population; F30 problems only
/// leave the device without buttons.
pub fn populate(engine: &RegisterEngine) -> RmiResult<Population> {
    let mut functions = PdtScanner::new(engine).scan()?;

    let sensor = populate_f11(engine, functions.touch.as_ref()).inspect_err(|e| {
        error!("Error while initializing F11: {}", e);
    })?;
    if let Some(touch) = functions.touch.as_mut() {
        touch.report_size = sensor.report_size();
    }

    let buttons = match populate_f30(engine, functions.buttons.as_ref()) {
        Ok((query, wiring)) => {
            if let Some(f) = functions.buttons.as_mut() {
                f.report_size = query.report_size();
            }
            wiring
        }
        Err(e) => {
            warn!("Error while initializing F30: {}", e);
            ButtonWiring::default()
        }
    };

    Ok(Population {
        functions,
        sensor,
        buttons,
    })
}
