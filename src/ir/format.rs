use crate::ir::types::{IrDecodeError, IrFormat, IrFrame, IrPair, IrPulseBytes};

/// Pulse distance coding used by Airton remotes: a long leader, every bit as
/// a fixed mark followed by a short (0) or long (1) space, least significant
/// bit first, and a closing stop mark with a long message gap.
pub struct AirtonFormat {}

impl AirtonFormat {
    fn decode_bit(pair: &IrPair) -> Option<bool> {
        if !Self::matches(pair.mark, Self::BIT_MARK) {
            None
        } else if Self::matches(pair.space, Self::ONE_SPACE) {
            Some(true)
        } else if Self::matches(pair.space, Self::ZERO_SPACE) {
            Some(false)
        } else {
            None
        }
    }
}

impl IrFormat for AirtonFormat {
    const HEADER: IrPair = IrPair::new(6630, 3350);
    const BIT_MARK: u32 = 400;
    const ONE_SPACE: u32 = 1260;
    const ZERO_SPACE: u32 = 430;
    const MESSAGE_SPACE: u32 = 100000;

    fn decode<T: AsRef<[IrPair]>>(frame: T) -> Result<IrPulseBytes, IrDecodeError> {
        let frame = frame.as_ref();
        let (leader, rest) = frame.split_first().ok_or(IrDecodeError::InvalidLeader)?;
        if !Self::verify_leader(leader) {
            return Err(IrDecodeError::InvalidLeader);
        }
        let (stop, data) = rest.split_last().ok_or(IrDecodeError::MissingStop)?;
        if data.len() % 8 != 0 {
            return Err(IrDecodeError::MalformedLength {
                expected: Self::frame_pairs(data.len() / 8 + 1),
                actual: frame.len(),
            });
        }

        let mut bytes = Vec::with_capacity(data.len() / 8);
        for (byte_index, bits) in data.chunks(8).enumerate() {
            let mut byte = 0u8;
            for (bit_index, pair) in bits.iter().enumerate() {
                match Self::decode_bit(pair) {
                    Some(true) => byte |= 1 << bit_index,
                    Some(false) => {}
                    None => {
                        trace!("wrong modulation for byte {}, bit {}: {:?}", byte_index, bit_index, pair);
                        return Err(IrDecodeError::UnknownBit(1 + byte_index * 8 + bit_index));
                    }
                }
            }
            bytes.push(byte);
        }

        // the message gap is usually cut off by the capture timeout
        if !Self::matches(stop.mark, Self::BIT_MARK) {
            return Err(IrDecodeError::MissingStop);
        }
        Ok(IrPulseBytes(bytes))
    }

    fn encode<T: AsRef<[u8]>>(bytes: T) -> IrFrame {
        let bytes = bytes.as_ref();
        let mut code = Vec::with_capacity(Self::frame_pairs(bytes.len()));

        // leader
        code.push(Self::HEADER);

        // data
        for byte in bytes {
            let mut bits = *byte;
            for _ in 0..8 {
                code.push(IrPair::new(
                    Self::BIT_MARK,
                    if (bits & 1) == 0 {
                        Self::ZERO_SPACE
                    } else {
                        Self::ONE_SPACE
                    },
                ));
                bits >>= 1;
            }
        }

        // stop bit
        code.push(IrPair::new(Self::BIT_MARK, Self::MESSAGE_SPACE));

        IrFrame(code)
    }
}
