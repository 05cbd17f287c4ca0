use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;

use super::{Error, Header, PayloadType, DOIP_HEADER_LENGTH};

/// A serializable DoIP payload.
///
/// Implementors describe the payload body only; [`encode_frame`] prepends the
/// generic header with the matching payload type and length.
pub trait Payload {
    /// Raw payload type carried in the frame header.
    fn payload_type(&self) -> u16;
    /// Number of bytes [`write`](Self::write) will produce.
    fn required_size(&self) -> usize;
    /// Serialize the payload body, header excluded.
    /// # Errors
    /// - If the body cannot be written to the stream
    fn write<T: Write>(&self, writer: &mut T) -> Result<usize, Error>;
}

/// Encode a payload into a complete frame, generic header included.
pub fn encode_frame<P: Payload>(payload: &P) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::with_capacity(DOIP_HEADER_LENGTH + payload.required_size());
    Header::new(payload.payload_type(), payload.required_size() as u32).write(&mut buffer)?;
    payload.write(&mut buffer)?;
    Ok(buffer)
}

/// Identity advertised in vehicle identification responses.
///
/// Constant for the lifetime of the process.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VehicleIdentity {
    /// Six byte VIN surrogate.
    pub vin: [u8; 6],
    pub logical_address: u16,
    pub eid: u16,
}

impl Default for VehicleIdentity {
    fn default() -> Self {
        Self {
            vin: *b"123456",
            logical_address: 0x0000,
            eid: 0xE000,
        }
    }
}

/// Fixed payload length of a vehicle identification response.
pub const VEHICLE_IDENT_PAYLOAD_LENGTH: usize = 33;

const VIN_GID: u8 = 0x01;

///Vehicle identification response (payload type 0x0004).
///
/// Body: VIN group identifier, high byte of the logical address, EID, the
/// six byte VIN surrogate, then zero padding up to the fixed 33 byte length.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VehicleIdentificationResponse {
    pub identity: VehicleIdentity,
}

impl Payload for VehicleIdentificationResponse {
    fn payload_type(&self) -> u16 {
        PayloadType::VehicleIdentificationResponse.into()
    }

    fn required_size(&self) -> usize {
        VEHICLE_IDENT_PAYLOAD_LENGTH
    }

    fn write<T: Write>(&self, writer: &mut T) -> Result<usize, Error> {
        writer.write_u8(VIN_GID)?;
        writer.write_u8((self.identity.logical_address >> 8) as u8)?;
        writer.write_u16::<BigEndian>(self.identity.eid)?;
        writer.write_all(&self.identity.vin)?;
        let padding = VEHICLE_IDENT_PAYLOAD_LENGTH - 4 - self.identity.vin.len();
        for _ in 0..padding {
            writer.write_u8(0x00)?;
        }
        Ok(VEHICLE_IDENT_PAYLOAD_LENGTH)
    }
}

const ROUTING_ACTIVATION_REQUEST_MIN_LENGTH: usize = 7;

///Routing activation request (payload type 0x0005).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoutingActivationRequest {
    pub source_address: u16,
    pub activation_type: u8,
}

impl RoutingActivationRequest {
    /// Parse from a payload of at least seven bytes: source address (2),
    /// activation type (1), reserved (4).
    pub fn read(payload: &[u8]) -> Result<Self, Error> {
        if payload.len() < ROUTING_ACTIVATION_REQUEST_MIN_LENGTH {
            return Err(Error::InvalidPayloadLength {
                payload_type: PayloadType::RoutingActivationRequest.into(),
                length: payload.len() as u32,
            });
        }
        let mut reader = payload;
        let source_address = reader.read_u16::<BigEndian>()?;
        let activation_type = reader.read_u8()?;
        Ok(Self {
            source_address,
            activation_type,
        })
    }
}

/// Response code for a successful routing activation.
pub const ROUTING_SUCCESSFULLY_ACTIVATED: u8 = 0x10;

const EXTERNAL_TEST_EQUIPMENT_ADDRESS: u16 = 0x0000;

///Routing activation response (payload type 0x0006).
///
/// This entity activates routing unconditionally, so the body always carries
/// [`ROUTING_SUCCESSFULLY_ACTIVATED`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoutingActivationResponse {
    /// Logical address of the tester the activation is confirmed for.
    pub client_address: u16,
}

impl Payload for RoutingActivationResponse {
    fn payload_type(&self) -> u16 {
        PayloadType::RoutingActivationResponse.into()
    }

    fn required_size(&self) -> usize {
        9
    }

    fn write<T: Write>(&self, writer: &mut T) -> Result<usize, Error> {
        writer.write_u16::<BigEndian>(self.client_address)?;
        writer.write_u16::<BigEndian>(EXTERNAL_TEST_EQUIPMENT_ADDRESS)?;
        writer.write_u8(ROUTING_SUCCESSFULLY_ACTIVATED)?;
        writer.write_u32::<BigEndian>(0)?; // reserved
        Ok(9)
    }
}

const DIAGNOSTIC_MESSAGE_MIN_LENGTH: usize = 4;

///Diagnostic message (payload type 0x8001) carrying UDS bytes between a
///tester and this entity.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiagnosticMessage {
    pub source_address: u16,
    pub target_address: u16,
    pub user_data: Vec<u8>,
}

impl DiagnosticMessage {
    /// Parse the addressing prefix and take the rest as UDS bytes.
    pub fn read(payload: &[u8]) -> Result<Self, Error> {
        if payload.len() < DIAGNOSTIC_MESSAGE_MIN_LENGTH {
            return Err(Error::InvalidPayloadLength {
                payload_type: PayloadType::DiagnosticMessage.into(),
                length: payload.len() as u32,
            });
        }
        let mut reader = payload;
        let source_address = reader.read_u16::<BigEndian>()?;
        let target_address = reader.read_u16::<BigEndian>()?;
        Ok(Self {
            source_address,
            target_address,
            user_data: reader.to_vec(),
        })
    }
}

impl Payload for DiagnosticMessage {
    fn payload_type(&self) -> u16 {
        PayloadType::DiagnosticMessage.into()
    }

    fn required_size(&self) -> usize {
        DIAGNOSTIC_MESSAGE_MIN_LENGTH + self.user_data.len()
    }

    fn write<T: Write>(&self, writer: &mut T) -> Result<usize, Error> {
        writer.write_u16::<BigEndian>(self.source_address)?;
        writer.write_u16::<BigEndian>(self.target_address)?;
        writer.write_all(&self.user_data)?;
        Ok(self.required_size())
    }
}
