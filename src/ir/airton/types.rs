use std::fmt::{Display, Formatter};

use num_traits::clamp;
use strum_macros::{Display, EnumIter, EnumString};

pub const TEMPERATURE_MIN: u8 = 16;
pub const TEMPERATURE_MAX: u8 = 31;
/// Auto mode runs against a fixed setpoint.
pub const AUTO_SETPOINT: u8 = 25;

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ClimateMode {
    Off,
    #[strum(to_string = "heat", serialize = "warm")]
    Heat,
    Cool,
    Dry,
    #[strum(to_string = "fan", serialize = "fan_only")]
    Fan,
    #[strum(to_string = "auto", serialize = "heat_cool")]
    Auto,
    Unknown,
}

impl Default for ClimateMode {
    fn default() -> Self {
        ClimateMode::Off
    }
}

impl ClimateMode {
    /// Three bit mode code, `None` for states the mode bits can't carry.
    pub const fn code(self) -> Option<u8> {
        match self {
            ClimateMode::Auto => Some(0b000),
            ClimateMode::Cool => Some(0b001),
            ClimateMode::Dry => Some(0b010),
            ClimateMode::Fan => Some(0b011),
            ClimateMode::Heat => Some(0b100),
            ClimateMode::Off | ClimateMode::Unknown => None,
        }
    }

    pub const fn from_code(code: u8) -> ClimateMode {
        match code & 0b111 {
            0b000 => ClimateMode::Auto,
            0b001 => ClimateMode::Cool,
            0b010 => ClimateMode::Dry,
            0b011 => ClimateMode::Fan,
            0b100 => ClimateMode::Heat,
            _ => ClimateMode::Unknown,
        }
    }

    pub const fn is_active(self) -> bool {
        !matches!(self, ClimateMode::Off | ClimateMode::Unknown)
    }
}

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FanSpeed {
    Auto,
    Low,
    Medium,
    High,
    Unknown,
}

impl Default for FanSpeed {
    fn default() -> Self {
        FanSpeed::Auto
    }
}

impl FanSpeed {
    /// The remote has five speed steps, only 1, 3 and 5 are sent.
    pub const fn code(self) -> u8 {
        match self {
            FanSpeed::Low => 1,
            FanSpeed::Medium => 3,
            FanSpeed::High => 5,
            FanSpeed::Auto | FanSpeed::Unknown => 0,
        }
    }

    pub const fn from_code(code: u8) -> FanSpeed {
        match code & 0b111 {
            0 => FanSpeed::Auto,
            1 | 2 => FanSpeed::Low,
            3 => FanSpeed::Medium,
            4 | 5 => FanSpeed::High,
            _ => FanSpeed::Unknown,
        }
    }
}

/// Addressable fields of the climate state.
#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ClimateField {
    Power,
    Mode,
    TargetTemperature,
    FanSpeed,
    Swing,
    Sleep,
    Display,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum StateChange {
    Power(bool),
    Mode(ClimateMode),
    TargetTemperature(u8),
    FanSpeed(FanSpeed),
    Swing(bool),
    Sleep(bool),
    Display(bool),
}

impl StateChange {
    pub const fn field(&self) -> ClimateField {
        match self {
            StateChange::Power(_) => ClimateField::Power,
            StateChange::Mode(_) => ClimateField::Mode,
            StateChange::TargetTemperature(_) => ClimateField::TargetTemperature,
            StateChange::FanSpeed(_) => ClimateField::FanSpeed,
            StateChange::Swing(_) => ClimateField::Swing,
            StateChange::Sleep(_) => ClimateField::Sleep,
            StateChange::Display(_) => ClimateField::Display,
        }
    }

    pub fn value(&self) -> String {
        match self {
            StateChange::Power(v)
            | StateChange::Swing(v)
            | StateChange::Sleep(v)
            | StateChange::Display(v) => v.to_string(),
            StateChange::Mode(m) => m.to_string(),
            StateChange::TargetTemperature(t) => t.to_string(),
            StateChange::FanSpeed(f) => f.to_string(),
        }
    }
}

impl Display for StateChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field(), self.value())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ClimateCommand {
    pub power: bool,
    pub mode: ClimateMode,
    pub target_temperature: u8,
    pub fan_speed: FanSpeed,
    pub swing: bool,
    pub sleep: bool,
    pub display: bool,
}

impl Default for ClimateCommand {
    fn default() -> Self {
        ClimateCommand {
            power: false,
            mode: ClimateMode::Off,
            target_temperature: 24,
            fan_speed: FanSpeed::Auto,
            swing: false,
            sleep: false,
            display: true,
        }
    }
}

impl Display for ClimateCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ power: {}, mode: {}, target_temperature: {}, fan_speed: {}, swing: {}, sleep: {}, display: {} }}",
            self.power,
            self.mode,
            self.target_temperature,
            self.fan_speed,
            self.swing,
            self.sleep,
            self.display
        )
    }
}

impl ClimateCommand {
    /// The form of this command a state frame can carry.
    pub fn normalized(&self) -> ClimateCommand {
        let mut command = *self;
        if !command.power || command.mode == ClimateMode::Off {
            command.power = false;
            command.mode = ClimateMode::Off;
        } else if command.mode == ClimateMode::Unknown {
            command.mode = ClimateMode::Auto;
        }
        if command.fan_speed == FanSpeed::Unknown {
            command.fan_speed = FanSpeed::Auto;
        }
        command.target_temperature = if command.mode == ClimateMode::Auto {
            AUTO_SETPOINT
        } else {
            clamp(self.target_temperature, TEMPERATURE_MIN, TEMPERATURE_MAX)
        };
        command
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized() == *self
    }

    /// Field by field differences, reported with the values of `other`.
    pub fn diff(&self, other: &ClimateCommand) -> Vec<StateChange> {
        let mut changes = Vec::new();
        if self.power != other.power {
            changes.push(StateChange::Power(other.power));
        }
        if self.mode != other.mode {
            changes.push(StateChange::Mode(other.mode));
        }
        if self.target_temperature != other.target_temperature {
            changes.push(StateChange::TargetTemperature(other.target_temperature));
        }
        if self.fan_speed != other.fan_speed {
            changes.push(StateChange::FanSpeed(other.fan_speed));
        }
        if self.swing != other.swing {
            changes.push(StateChange::Swing(other.swing));
        }
        if self.sleep != other.sleep {
            changes.push(StateChange::Sleep(other.sleep));
        }
        if self.display != other.display {
            changes.push(StateChange::Display(other.display));
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn mode_codes_are_unique() {
        let mut codes: Vec<_> = ClimateMode::iter().filter_map(ClimateMode::code).collect();
        assert_eq!(codes.len(), 5);
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 5);
        ClimateMode::iter()
            .filter(|m| m.is_active())
            .for_each(|m| assert_eq!(ClimateMode::from_code(m.code().unwrap()), m));
    }

    #[test]
    fn reserved_codes_are_unknown() {
        for code in 5..8 {
            assert_eq!(ClimateMode::from_code(code), ClimateMode::Unknown);
        }
        assert_eq!(FanSpeed::from_code(6), FanSpeed::Unknown);
        assert_eq!(FanSpeed::from_code(7), FanSpeed::Unknown);
        assert_eq!(FanSpeed::from_code(2), FanSpeed::Low);
        assert_eq!(FanSpeed::from_code(4), FanSpeed::High);
    }

    #[test]
    fn parses_config_names() {
        assert_eq!(ClimateMode::from_str("Cool").unwrap(), ClimateMode::Cool);
        assert_eq!(ClimateMode::from_str("heat_cool").unwrap(), ClimateMode::Auto);
        assert_eq!(ClimateMode::from_str("fan_only").unwrap(), ClimateMode::Fan);
        assert!(ClimateMode::from_str("turbo").is_err());
        assert_eq!(FanSpeed::from_str("medium").unwrap(), FanSpeed::Medium);
        assert_eq!(
            ClimateField::from_str("target_temperature").unwrap(),
            ClimateField::TargetTemperature
        );
        assert_eq!(ClimateField::Display.to_string(), "display");
    }

    #[test]
    fn normalizes_power_and_mode() {
        let off = ClimateCommand {
            power: false,
            mode: ClimateMode::Cool,
            ..Default::default()
        };
        assert_eq!(off.normalized().mode, ClimateMode::Off);

        let no_power = ClimateCommand {
            power: true,
            mode: ClimateMode::Off,
            ..Default::default()
        };
        assert!(!no_power.normalized().power);

        let auto = ClimateCommand {
            power: true,
            mode: ClimateMode::Auto,
            target_temperature: 18,
            fan_speed: FanSpeed::Unknown,
            ..Default::default()
        };
        let auto = auto.normalized();
        assert_eq!(auto.target_temperature, AUTO_SETPOINT);
        assert_eq!(auto.fan_speed, FanSpeed::Auto);
        assert!(auto.is_normalized());
    }

    #[test]
    fn clamps_temperature() {
        let hot = ClimateCommand {
            power: true,
            mode: ClimateMode::Heat,
            target_temperature: 40,
            ..Default::default()
        };
        assert_eq!(hot.normalized().target_temperature, TEMPERATURE_MAX);
    }

    #[test]
    fn diff_reports_other_values() {
        let a = ClimateCommand::default();
        let b = ClimateCommand {
            display: false,
            swing: true,
            ..a
        };
        assert_eq!(a.diff(&b), vec![StateChange::Swing(true), StateChange::Display(false)]);
        assert!(a.diff(&a).is_empty());
        assert_eq!(StateChange::Display(false).to_string(), "display: false");
    }
}
