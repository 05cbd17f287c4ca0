use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use super::Error;

/// Length of the fixed DoIP generic header in bytes.
pub const DOIP_HEADER_LENGTH: usize = 8;

/// DoIP protocol version spoken by this entity (ISO 13400-2:2012).
pub const PROTOCOL_VERSION: u8 = 0x02;

/// One's complement of [`PROTOCOL_VERSION`], carried in every header.
pub const INVERSE_PROTOCOL_VERSION: u8 = !PROTOCOL_VERSION; // 0xFD

/// DoIP generic header
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Header {
    pub protocol_version: u8,
    pub inverse_protocol_version: u8,
    /// Raw payload type, kept undecoded so negative acknowledgements can echo
    /// values this entity does not understand.
    pub payload_type: u16,
    /// Payload length in bytes, the 8 header bytes excluded.
    pub payload_length: u32,
}

impl Header {
    /// Header for an outbound frame, version fields filled in.
    pub fn new(payload_type: u16, payload_length: u32) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            inverse_protocol_version: INVERSE_PROTOCOL_VERSION,
            payload_type,
            payload_length,
        }
    }

    pub fn read<T: Read>(message_bytes: &mut T) -> Result<Self, Error> {
        let protocol_version = message_bytes.read_u8()?;
        let inverse_protocol_version = message_bytes.read_u8()?;
        let payload_type = message_bytes.read_u16::<BigEndian>()?;
        let payload_length = message_bytes.read_u32::<BigEndian>()?;
        Ok(Self {
            protocol_version,
            inverse_protocol_version,
            payload_type,
            payload_length,
        })
    }

    pub fn write<T: Write>(&self, writer: &mut T) -> Result<usize, Error> {
        writer.write_u8(self.protocol_version)?;
        writer.write_u8(self.inverse_protocol_version)?;
        writer.write_u16::<BigEndian>(self.payload_type)?;
        writer.write_u32::<BigEndian>(self.payload_length)?;
        Ok(DOIP_HEADER_LENGTH)
    }

    /// True when the version byte matches the supported version and the
    /// inverse byte is its one's complement.
    pub fn version_is_supported(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
            && self.inverse_protocol_version == INVERSE_PROTOCOL_VERSION
    }
}
