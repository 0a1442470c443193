use itertools::Itertools;
use num_traits::AsPrimitive;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// A single mark or space length in microseconds.
#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Default)]
pub struct IrPulse(pub u32);

impl IrPulse {
    pub fn into_inner(self) -> u32 {
        self.0
    }
}

impl AsPrimitive<f64> for IrPulse {
    fn as_(self) -> f64 {
        self.0.as_()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct IrPair {
    pub mark: IrPulse,
    pub space: IrPulse,
}

impl IrPair {
    pub const fn new(mark: u32, space: u32) -> IrPair {
        IrPair {
            mark: IrPulse(mark),
            space: IrPulse(space),
        }
    }
}

/// Ordered mark/space pairs making up one transmission.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Default)]
pub struct IrFrame(pub Vec<IrPair>);

impl IrFrame {
    pub fn into_inner(self) -> Vec<IrPair> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds a frame from alternating mark/space durations. Captures end on a
    /// mark, so a trailing lone mark is given an empty space.
    pub fn from_pulses<T: AsRef<[IrPulse]>>(pulses: T) -> IrFrame {
        IrFrame(
            pulses
                .as_ref()
                .iter()
                .chunks(2)
                .into_iter()
                .map(|mut chunk| {
                    let mark = chunk.next().copied().unwrap_or_default();
                    let space = chunk.next().copied().unwrap_or_default();
                    IrPair { mark, space }
                })
                .collect(),
        )
    }

    pub fn pulses(&self) -> impl Iterator<Item = IrPulse> + '_ {
        self.0.iter().flat_map(|pair| [pair.mark, pair.space])
    }

    /// Total on-air duration in microseconds.
    pub fn duration(&self) -> u64 {
        self.pulses().map(|p| u64::from(p.0)).sum()
    }
}

impl AsRef<[IrPair]> for IrFrame {
    fn as_ref(&self) -> &[IrPair] {
        &self.0
    }
}

impl Display for IrFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pulses().map(|p| p.0).join(" "))
    }
}

pub trait IrFormat {
    const CARRIER_FREQUENCY: u32 = 38000;
    const HEADER: IrPair;
    const BIT_MARK: u32;
    const ONE_SPACE: u32;
    const ZERO_SPACE: u32;
    const MESSAGE_SPACE: u32;

    fn matches(pulse: IrPulse, target: u32) -> bool {
        in_bounds(pulse, target)
    }
    fn verify_leader(pair: &IrPair) -> bool {
        Self::matches(pair.mark, Self::HEADER.mark.0) && Self::matches(pair.space, Self::HEADER.space.0)
    }
    /// Number of mark/space pairs a frame of `bytes` payload bytes occupies.
    fn frame_pairs(bytes: usize) -> usize {
        bytes * 8 + 2
    }
    fn decode<T: AsRef<[IrPair]>>(frame: T) -> Result<IrPulseBytes, IrDecodeError>;
    fn encode<T: AsRef<[u8]>>(bytes: T) -> IrFrame;
}

/// A device protocol: how its commands map onto frames of some format.
pub trait IrTarget {
    type Format: IrFormat;
    type Command;
    const FRAME_PAIRS: usize;
    fn encode(command: &Self::Command) -> IrFrame;
    fn decode(frame: &IrFrame) -> Result<Self::Command, IrDecodeError>;
}

fn in_bounds<L: AsPrimitive<f64>, T: AsPrimitive<f64>>(length: L, target: T) -> bool {
    const TOL: f64 = 0.35;
    length.as_() > target.as_() * (1f64 - TOL) && length.as_() < target.as_() * (1f64 + TOL)
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum IrDecodeError {
    #[error("Frame has {actual} pulse pairs, expected {expected}")]
    MalformedLength { expected: usize, actual: usize },
    #[error("State has {actual} bytes, expected {expected}")]
    MalformedState { expected: usize, actual: usize },
    #[error("Frame does not start with a leader")]
    InvalidLeader,
    #[error("Unknown bit at pair {0}")]
    UnknownBit(usize),
    #[error("Frame does not end with a stop mark")]
    MissingStop,
    #[error("Checksum mismatch: calculated {calculated:#04X}, received {received:#04X}")]
    ChecksumMismatch { calculated: u8, received: u8 },
    #[error("Wrong signature bytes {0:#04X} {1:#04X}")]
    InvalidSignature(u8, u8),
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct IrPulseBytes(pub Vec<u8>);

impl AsRef<[u8]> for IrPulseBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for IrPulseBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().map(|b| format!("0x{:02X}", b)).join(", "))
    }
}
