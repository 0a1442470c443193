use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::ir::airton::driver::{AirtonDriver, Result};
use crate::ir::airton::types::{ClimateField, StateChange};

const ACTION_PREFIX: &str = "climate_ir.airton.";

type Setter = fn(&mut AirtonDriver, bool) -> Result<()>;
type Getter = fn(&AirtonDriver) -> bool;

/// The on/off settings of the indoor unit exposed as switches, keyed by
/// their configuration name.
#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum SwitchKind {
    Display,
    #[strum(to_string = "sleep", serialize = "sleep_mode")]
    Sleep,
}

impl SwitchKind {
    pub fn setter(self) -> Setter {
        match self {
            SwitchKind::Display => AirtonDriver::set_display,
            SwitchKind::Sleep => AirtonDriver::set_sleep,
        }
    }

    pub fn getter(self) -> Getter {
        match self {
            SwitchKind::Display => AirtonDriver::display,
            SwitchKind::Sleep => AirtonDriver::sleep,
        }
    }

    pub const fn field(self) -> ClimateField {
        match self {
            SwitchKind::Display => ClimateField::Display,
            SwitchKind::Sleep => ClimateField::Sleep,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AirtonSwitch {
    kind: SwitchKind,
    state: Option<bool>,
}

impl AirtonSwitch {
    pub fn new(kind: SwitchKind) -> AirtonSwitch {
        AirtonSwitch { kind, state: None }
    }

    /// Creates the switch already showing the driver's current value.
    pub fn attach(kind: SwitchKind, driver: &AirtonDriver) -> AirtonSwitch {
        AirtonSwitch {
            kind,
            state: Some(kind.getter()(driver)),
        }
    }

    pub fn kind(&self) -> SwitchKind {
        self.kind
    }

    /// Last published state.
    pub fn state(&self) -> Option<bool> {
        self.state
    }

    pub fn write_state(&mut self, driver: &mut AirtonDriver, state: bool) -> Result<bool> {
        if self.kind.getter()(driver) != state {
            self.kind.setter()(driver, state)?;
        }
        self.state = Some(state);
        Ok(state)
    }

    /// Follows state reported by the unit, returns whether it applied.
    pub fn sync(&mut self, change: &StateChange) -> bool {
        match change {
            StateChange::Display(state) | StateChange::Sleep(state)
                if change.field() == self.kind.field() =>
            {
                self.state = Some(*state);
                true
            }
            _ => false,
        }
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("Unknown airton action {0}")]
pub struct ParseActionError(String);

/// Automation actions toggling the switchable settings.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum SwitchAction {
    DisplayOn,
    DisplayOff,
    SleepOn,
    SleepOff,
}

impl SwitchAction {
    pub const fn kind(self) -> SwitchKind {
        match self {
            SwitchAction::DisplayOn | SwitchAction::DisplayOff => SwitchKind::Display,
            SwitchAction::SleepOn | SwitchAction::SleepOff => SwitchKind::Sleep,
        }
    }

    pub const fn state(self) -> bool {
        matches!(self, SwitchAction::DisplayOn | SwitchAction::SleepOn)
    }

    pub fn apply(self, driver: &mut AirtonDriver) -> Result<()> {
        debug!("applying action {}", self);
        self.kind().setter()(driver, self.state())
    }

    /// Accepts both the short name and the registered `climate_ir.airton.` one.
    pub fn parse(name: &str) -> std::result::Result<SwitchAction, ParseActionError> {
        SwitchAction::from_str(name.strip_prefix(ACTION_PREFIX).unwrap_or(name))
            .map_err(|_| ParseActionError(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::airton::types::ClimateMode;
    use strum::IntoEnumIterator;

    #[test]
    fn parses_config_keys() {
        assert_eq!(SwitchKind::from_str("display").unwrap(), SwitchKind::Display);
        assert_eq!(SwitchKind::from_str("sleep").unwrap(), SwitchKind::Sleep);
        assert_eq!(SwitchKind::from_str("sleep_mode").unwrap(), SwitchKind::Sleep);
        assert!(SwitchKind::from_str("swing").is_err());
    }

    #[test]
    fn switches_drive_their_field() {
        for kind in SwitchKind::iter() {
            let mut driver = AirtonDriver::default();
            let before = kind.getter()(&driver);
            kind.setter()(&mut driver, !before).unwrap();
            assert_eq!(kind.getter()(&driver), !before);
            assert!(driver.is_dirty());
        }
    }

    #[test]
    fn write_state_only_sets_changes() {
        let mut driver = AirtonDriver::default();
        let mut display = AirtonSwitch::attach(SwitchKind::Display, &driver);
        assert_eq!(display.state(), Some(true));

        assert!(display.write_state(&mut driver, true).unwrap());
        assert!(!driver.is_dirty());

        assert!(!display.write_state(&mut driver, false).unwrap());
        assert!(driver.is_dirty());
        assert!(!driver.display());
        assert_eq!(display.state(), Some(false));
    }

    #[test]
    fn switch_follows_received_state() {
        let mut sleep = AirtonSwitch::new(SwitchKind::Sleep);
        assert!(!sleep.sync(&StateChange::Display(false)));
        assert_eq!(sleep.state(), None);
        assert!(sleep.sync(&StateChange::Sleep(true)));
        assert_eq!(sleep.state(), Some(true));
    }

    #[test]
    fn actions_apply_to_driver() {
        let mut driver = AirtonDriver::default();
        driver.set_mode(ClimateMode::Cool).unwrap();
        SwitchAction::parse("climate_ir.airton.sleep_on")
            .unwrap()
            .apply(&mut driver)
            .unwrap();
        SwitchAction::parse("display_off")
            .unwrap()
            .apply(&mut driver)
            .unwrap();
        assert!(driver.sleep());
        assert!(!driver.display());
        assert_eq!(
            SwitchAction::parse("climate_ir.airton.turbo_on"),
            Err(ParseActionError("climate_ir.airton.turbo_on".to_string()))
        );
    }
}
