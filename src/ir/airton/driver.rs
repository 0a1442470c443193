use std::convert::TryFrom;
use std::fmt::{Debug, Formatter};

use thiserror::Error;

use crate::ir::airton::types::{
    ClimateCommand, ClimateField, ClimateMode, FanSpeed, StateChange, TEMPERATURE_MAX,
    TEMPERATURE_MIN,
};
use crate::ir::airton::Airton;
use crate::ir::output::IrTransceiver;
use crate::ir::types::{IrDecodeError, IrFrame, IrPulseBytes, IrTarget};

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DriverError {
    #[error("Invalid {field} value: {value}")]
    InvalidArgument { field: ClimateField, value: String },
}

pub type Result<T> = std::result::Result<T, DriverError>;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DriverState {
    Clean,
    Dirty,
}

pub type StateObserver = Box<dyn FnMut(&StateChange) + Send>;

/// Owns the commanded climate state of one indoor unit.
pub struct AirtonDriver {
    command: ClimateCommand,
    resume_mode: ClimateMode,
    state: DriverState,
    /// Last received state reported to observers, until a setter runs.
    observed: Option<ClimateCommand>,
    observers: Vec<StateObserver>,
}

impl Debug for AirtonDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirtonDriver")
            .field("command", &self.command)
            .field("resume_mode", &self.resume_mode)
            .field("state", &self.state)
            .field("observed", &self.observed)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for AirtonDriver {
    fn default() -> Self {
        Self::new(ClimateCommand::default())
    }
}

impl AirtonDriver {
    pub fn new(command: ClimateCommand) -> AirtonDriver {
        AirtonDriver {
            command,
            resume_mode: if command.mode.is_active() {
                command.mode
            } else {
                ClimateMode::Auto
            },
            state: DriverState::Clean,
            observed: None,
            observers: Vec::new(),
        }
    }

    pub fn command(&self) -> &ClimateCommand {
        &self.command
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == DriverState::Dirty
    }

    pub fn display(&self) -> bool {
        self.command.display
    }

    pub fn sleep(&self) -> bool {
        self.command.sleep
    }

    /// Registers a callback for field changes reported by received frames.
    pub fn register_observer<F: FnMut(&StateChange) + Send + 'static>(&mut self, observer: F) {
        self.observers.push(Box::new(observer));
    }

    fn mark_dirty(&mut self) {
        if self.state == DriverState::Clean {
            trace!("state dirty");
        }
        self.state = DriverState::Dirty;
        self.observed = None;
    }

    pub fn set_power(&mut self, power: bool) -> Result<()> {
        if power {
            if !self.command.mode.is_active() {
                self.command.mode = self.resume_mode;
            }
        } else {
            if self.command.mode.is_active() {
                self.resume_mode = self.command.mode;
            }
            self.command.mode = ClimateMode::Off;
        }
        self.command.power = power;
        self.mark_dirty();
        Ok(())
    }

    pub fn set_mode(&mut self, mode: ClimateMode) -> Result<()> {
        match mode {
            ClimateMode::Unknown => {
                return Err(DriverError::InvalidArgument {
                    field: ClimateField::Mode,
                    value: mode.to_string(),
                })
            }
            ClimateMode::Off => return self.set_power(false),
            _ => {
                self.command.power = true;
                self.command.mode = mode;
                self.resume_mode = mode;
            }
        }
        self.mark_dirty();
        Ok(())
    }

    pub fn set_temperature(&mut self, temperature: i32) -> Result<()> {
        let temperature = u8::try_from(temperature)
            .ok()
            .filter(|t| (TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(t))
            .ok_or_else(|| DriverError::InvalidArgument {
                field: ClimateField::TargetTemperature,
                value: temperature.to_string(),
            })?;
        self.command.target_temperature = temperature;
        self.mark_dirty();
        Ok(())
    }

    pub fn set_fan_speed(&mut self, fan_speed: FanSpeed) -> Result<()> {
        if fan_speed == FanSpeed::Unknown {
            return Err(DriverError::InvalidArgument {
                field: ClimateField::FanSpeed,
                value: fan_speed.to_string(),
            });
        }
        self.command.fan_speed = fan_speed;
        self.mark_dirty();
        Ok(())
    }

    pub fn set_swing(&mut self, swing: bool) -> Result<()> {
        self.command.swing = swing;
        self.mark_dirty();
        Ok(())
    }

    pub fn set_sleep(&mut self, sleep: bool) -> Result<()> {
        self.command.sleep = sleep;
        self.mark_dirty();
        Ok(())
    }

    pub fn set_display(&mut self, display: bool) -> Result<()> {
        self.command.display = display;
        self.mark_dirty();
        Ok(())
    }

    /// Encodes the commanded state. Always allowed, clean state re-encodes to
    /// the same frame.
    pub fn transmit(&mut self) -> IrFrame {
        debug!(
            "transmitting {}: {}",
            self.command.normalized(),
            self.state_bytes()
        );
        self.state = DriverState::Clean;
        Airton::encode_resuming(&self.command, self.resume_mode)
    }

    /// Transmits through `transceiver` if anything changed since the last
    /// transmission. Returns whether a frame was sent.
    pub fn step<T: IrTransceiver>(&mut self, transceiver: &mut T) -> std::result::Result<bool, T::Error> {
        if !self.is_dirty() {
            return Ok(false);
        }
        let frame = self.transmit();
        transceiver.send(&frame)?;
        Ok(true)
    }

    /// Merges the state carried by a received frame and notifies observers of
    /// every field that differs from what they last saw: the previous received
    /// state, or the commanded state if a setter ran since. Frames that fail
    /// to decode leave the state untouched.
    pub fn on_frame_received(
        &mut self,
        frame: &IrFrame,
    ) -> std::result::Result<Vec<StateChange>, IrDecodeError> {
        let received = Airton::decode(frame).map_err(|e| {
            debug!("discarding received frame: {}", e);
            e
        })?;
        let baseline = self
            .observed
            .unwrap_or_else(|| self.command.normalized());
        let changes = baseline.diff(&received);
        trace!("received {}, {} changed fields", received, changes.len());

        if received.mode.is_active() {
            self.resume_mode = received.mode;
        }
        self.command = received;
        self.observed = Some(received);

        for change in changes.iter() {
            debug!("state changed {}", change);
            for observer in self.observers.iter_mut() {
                observer(change);
            }
        }
        Ok(changes)
    }

    pub fn state_bytes(&self) -> IrPulseBytes {
        IrPulseBytes(Airton::state_bytes(&self.command, self.resume_mode).to_vec())
    }
}
