pub mod driver;
pub mod types;

use cached::proc_macro::cached;

use crate::ir::airton::types::{ClimateCommand, ClimateMode, FanSpeed, TEMPERATURE_MIN};
use crate::ir::format::AirtonFormat;
use crate::ir::types::{IrDecodeError, IrFormat, IrFrame, IrTarget};

pub const STATE_FRAME_SIZE: usize = 7;
pub type StateBytes = [u8; STATE_FRAME_SIZE];

const SIGNATURE: [u8; 2] = [0xD3, 0x11];

const POWER_BIT: u8 = 0b0000_1000;
const MODE_MASK: u8 = 0b0000_0111;
const SWING_BASE: u8 = 0b0110_0000;

// byte 5, from MSB: light, health, unknown, heating, unknown, not auto on, sleep, econo
const SETTING_DISPLAY: u8 = 1 << 7;
const SETTING_HEATING: u8 = 1 << 4;
const SETTING_SLEEP: u8 = 1 << 1;
const SETTING_DEFAULTS: u8 = 0b0100_0100;

/// State frame codec for Airton SMVH09B-2A2A3NH remotes.
#[derive(Debug, Default)]
pub struct Airton {}

impl Airton {
    /// Encodes `command`, keeping `resume` in the mode bits when powered off
    /// so the unit comes back in that mode.
    pub fn encode_resuming(command: &ClimateCommand, resume: ClimateMode) -> IrFrame {
        AirtonFormat::encode(Self::state_bytes(command, resume))
    }

    pub fn state_bytes(command: &ClimateCommand, resume: ClimateMode) -> StateBytes {
        state_bytes(command.normalized(), resume)
    }

    pub fn checksum(bytes: &[u8]) -> u8 {
        let sum = bytes
            .iter()
            .take(STATE_FRAME_SIZE - 1)
            .fold(0u8, |acc, b| acc.wrapping_add(*b));
        0x7Fu8.wrapping_sub(sum) ^ 0x2C
    }

    /// Checks the checksum and signature of raw state bytes and extracts the
    /// command they carry.
    pub fn decode_bytes(bytes: &[u8]) -> Result<ClimateCommand, IrDecodeError> {
        if bytes.len() != STATE_FRAME_SIZE {
            return Err(IrDecodeError::MalformedState {
                expected: STATE_FRAME_SIZE,
                actual: bytes.len(),
            });
        }

        let calculated = Self::checksum(bytes);
        let received = bytes[STATE_FRAME_SIZE - 1];
        if calculated != received {
            debug!(
                "checksum error: calculated {:02X}, received {:02X}",
                calculated, received
            );
            return Err(IrDecodeError::ChecksumMismatch {
                calculated,
                received,
            });
        }

        if bytes[..2] != SIGNATURE {
            return Err(IrDecodeError::InvalidSignature(bytes[0], bytes[1]));
        }

        Ok(parse_state_bytes(bytes))
    }
}

impl IrTarget for Airton {
    type Format = AirtonFormat;
    type Command = ClimateCommand;
    const FRAME_PAIRS: usize = 2 + STATE_FRAME_SIZE * 8;

    fn encode(command: &ClimateCommand) -> IrFrame {
        Self::encode_resuming(command, ClimateMode::Auto)
    }

    fn decode(frame: &IrFrame) -> Result<ClimateCommand, IrDecodeError> {
        if frame.len() != Self::FRAME_PAIRS {
            return Err(IrDecodeError::MalformedLength {
                expected: Self::FRAME_PAIRS,
                actual: frame.len(),
            });
        }
        let bytes = Self::Format::decode(frame)?;
        trace!("received state bytes {}", bytes);
        Self::decode_bytes(bytes.as_ref())
    }
}

#[cached]
fn state_bytes(command: ClimateCommand, resume: ClimateMode) -> StateBytes {
    let mut state = [0u8; STATE_FRAME_SIZE];
    state[..2].copy_from_slice(&SIGNATURE);

    state[2] = if command.power {
        POWER_BIT | command.mode.code().unwrap_or_default()
    } else {
        resume.code().unwrap_or_default() & MODE_MASK
    };
    // turbo (bit 7) stays off, the remote never sets it
    state[2] |= command.fan_speed.code() << 4;

    state[3] = command.target_temperature - TEMPERATURE_MIN;

    state[4] = SWING_BASE | u8::from(command.swing);

    state[5] = SETTING_DEFAULTS;
    if command.mode == ClimateMode::Heat {
        state[5] |= SETTING_HEATING;
    }
    if command.display {
        state[5] |= SETTING_DISPLAY;
    }
    if command.sleep {
        state[5] |= SETTING_SLEEP;
    }

    state[6] = Airton::checksum(&state);
    state
}

fn parse_state_bytes(bytes: &[u8]) -> ClimateCommand {
    let power = bytes[2] & POWER_BIT != 0;
    ClimateCommand {
        power,
        mode: if power {
            ClimateMode::from_code(bytes[2] & MODE_MASK)
        } else {
            ClimateMode::Off
        },
        target_temperature: (bytes[3] & 0x0F) + TEMPERATURE_MIN,
        fan_speed: FanSpeed::from_code((bytes[2] >> 4) & 0b111),
        swing: bytes[4] & 1 != 0,
        sleep: bytes[5] & SETTING_SLEEP != 0,
        display: bytes[5] & SETTING_DISPLAY != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::airton::types::{AUTO_SETPOINT, TEMPERATURE_MAX};
    use crate::ir::types::{IrPair, IrPulse};
    use strum::IntoEnumIterator;

    fn bytes_of(frame: &IrFrame) -> Vec<u8> {
        AirtonFormat::decode(frame).unwrap().0
    }

    fn all_commands() -> Vec<ClimateCommand> {
        let mut commands = Vec::new();
        for mode in ClimateMode::iter().filter(|m| *m != ClimateMode::Unknown) {
            for fan_speed in FanSpeed::iter().filter(|f| *f != FanSpeed::Unknown) {
                for target_temperature in TEMPERATURE_MIN..=TEMPERATURE_MAX {
                    for flags in 0..8u8 {
                        commands.push(
                            ClimateCommand {
                                power: mode != ClimateMode::Off,
                                mode,
                                target_temperature,
                                fan_speed,
                                swing: flags & 1 != 0,
                                sleep: flags & 2 != 0,
                                display: flags & 4 != 0,
                            }
                            .normalized(),
                        );
                    }
                }
            }
        }
        commands
    }

    #[test]
    fn matches_sampled_remote() {
        // dry, fan 1, 20C, swing, light and health on
        let command = ClimateCommand {
            power: true,
            mode: ClimateMode::Dry,
            target_temperature: 20,
            fan_speed: FanSpeed::Low,
            swing: true,
            sleep: false,
            display: true,
        };
        assert_eq!(
            bytes_of(&Airton::encode(&command)),
            [0xD3, 0x11, 0x1A, 0x04, 0x61, 0xC4, 0x74]
        );
    }

    #[test]
    fn frame_has_fixed_length() {
        all_commands()
            .iter()
            .for_each(|c| assert_eq!(Airton::encode(c).len(), Airton::FRAME_PAIRS));
    }

    #[test]
    fn round_trips_normalized_commands() {
        for command in all_commands() {
            assert_eq!(Airton::decode(&Airton::encode(&command)), Ok(command));
        }
    }

    #[test]
    fn decodes_to_normalized_form() {
        let command = ClimateCommand {
            power: true,
            mode: ClimateMode::Auto,
            target_temperature: 18,
            ..Default::default()
        };
        let decoded = Airton::decode(&Airton::encode(&command)).unwrap();
        assert_eq!(decoded.target_temperature, AUTO_SETPOINT);
        assert_eq!(decoded, command.normalized());
    }

    #[test]
    fn any_flipped_bit_fails_checksum() {
        let frame = Airton::encode(&ClimateCommand {
            power: true,
            mode: ClimateMode::Cool,
            target_temperature: 22,
            fan_speed: FanSpeed::High,
            ..Default::default()
        });
        for index in 1..Airton::FRAME_PAIRS - 1 {
            let mut corrupted = frame.clone();
            let pair = &mut corrupted.0[index];
            pair.space = IrPulse(if pair.space.0 == AirtonFormat::ONE_SPACE {
                AirtonFormat::ZERO_SPACE
            } else {
                AirtonFormat::ONE_SPACE
            });
            assert!(
                matches!(
                    Airton::decode(&corrupted),
                    Err(IrDecodeError::ChecksumMismatch { .. })
                ),
                "flipped bit at pair {} was accepted",
                index
            );
        }
    }

    #[test]
    fn rejects_wrong_length() {
        let mut frame = Airton::encode(&ClimateCommand::default());
        frame.0.push(IrPair::new(400, 430));
        assert_eq!(
            Airton::decode(&frame),
            Err(IrDecodeError::MalformedLength {
                expected: 58,
                actual: 59
            })
        );
        assert_eq!(
            Airton::decode_bytes(&[0xD3, 0x11]),
            Err(IrDecodeError::MalformedState {
                expected: 7,
                actual: 2
            })
        );
        assert_eq!(
            Airton::decode_bytes(&[0xD3, 0x11]).unwrap_err().to_string(),
            "State has 2 bytes, expected 7"
        );
    }

    #[test]
    fn rejects_foreign_signature() {
        let mut bytes = [0xC3, 0x11, 0x1A, 0x04, 0x61, 0xC4, 0];
        bytes[6] = Airton::checksum(&bytes);
        assert_eq!(
            Airton::decode(&AirtonFormat::encode(bytes)),
            Err(IrDecodeError::InvalidSignature(0xC3, 0x11))
        );
    }

    #[test]
    fn reserved_fan_pattern_is_unknown() {
        let mut bytes = [0xD3, 0x11, 0x6A, 0x04, 0x61, 0xC4, 0];
        bytes[6] = Airton::checksum(&bytes);
        let decoded = Airton::decode(&AirtonFormat::encode(bytes)).unwrap();
        assert_eq!(decoded.fan_speed, FanSpeed::Unknown);
        assert_eq!(decoded.mode, ClimateMode::Dry);
    }

    #[test]
    fn reserved_mode_pattern_is_unknown() {
        let mut bytes = [0xD3, 0x11, 0x1E, 0x04, 0x61, 0xC4, 0];
        bytes[6] = Airton::checksum(&bytes);
        let decoded = Airton::decode(&AirtonFormat::encode(bytes)).unwrap();
        assert!(decoded.power);
        assert_eq!(decoded.mode, ClimateMode::Unknown);
    }

    #[test]
    fn power_off_keeps_resume_mode() {
        let off = ClimateCommand::default();
        let bytes = bytes_of(&Airton::encode_resuming(&off, ClimateMode::Heat));
        assert_eq!(bytes[2] & POWER_BIT, 0);
        assert_eq!(bytes[2] & MODE_MASK, ClimateMode::Heat.code().unwrap());
        let decoded = Airton::decode_bytes(&bytes).unwrap();
        assert_eq!(decoded.mode, ClimateMode::Off);
        assert!(!decoded.power);
    }

    #[test]
    fn heating_sets_settings_bit() {
        let heat = ClimateCommand {
            power: true,
            mode: ClimateMode::Heat,
            ..Default::default()
        };
        let bytes = bytes_of(&Airton::encode(&heat));
        assert_ne!(bytes[5] & SETTING_HEATING, 0);
        assert_eq!(bytes[5] & SETTING_DEFAULTS, SETTING_DEFAULTS);
    }
}
