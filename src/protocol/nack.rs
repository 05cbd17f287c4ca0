use byteorder::WriteBytesExt;
use std::io::Write;

use super::{message::Payload, Error};

///Reason codes carried in a DoIP header negative acknowledgement.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NegativeAckCode {
    UnknownPayloadType,
    RoutingNotActivated,
    InvalidPayloadLength,
}

impl From<NegativeAckCode> for u8 {
    fn from(code: NegativeAckCode) -> u8 {
        match code {
            NegativeAckCode::UnknownPayloadType => 0x00,
            NegativeAckCode::RoutingNotActivated => 0x02,
            NegativeAckCode::InvalidPayloadLength => 0x04,
        }
    }
}

/// Negative acknowledgement for a rejected DoIP message.
///
/// Not the generic 0x0000 negative acknowledge of ISO 13400: this entity
/// echoes the rejected payload type with the high bit of its high byte set,
/// followed by a single reason byte.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeaderNegativeAck {
    pub rejected_payload_type: u16,
    pub code: NegativeAckCode,
}

impl Payload for HeaderNegativeAck {
    fn payload_type(&self) -> u16 {
        self.rejected_payload_type | 0x8000
    }

    fn required_size(&self) -> usize {
        1
    }

    fn write<T: Write>(&self, writer: &mut T) -> Result<usize, Error> {
        writer.write_u8(u8::from(self.code))?;
        Ok(1)
    }
}
