use super::Error;

///Payload types exchanged by this DoIP entity.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PayloadType {
    VehicleIdentificationRequest,
    VehicleIdentificationResponse,
    RoutingActivationRequest,
    RoutingActivationResponse,
    DiagnosticMessage,
}

impl TryFrom<u16> for PayloadType {
    type Error = Error;
    fn try_from(value: u16) -> Result<Self, Error> {
        match value {
            0x0001 => Ok(PayloadType::VehicleIdentificationRequest),
            0x0004 => Ok(PayloadType::VehicleIdentificationResponse),
            0x0005 => Ok(PayloadType::RoutingActivationRequest),
            0x0006 => Ok(PayloadType::RoutingActivationResponse),
            0x8001 => Ok(PayloadType::DiagnosticMessage),
            _ => Err(Error::UnsupportedPayloadType(value)),
        }
    }
}

impl From<PayloadType> for u16 {
    fn from(payload_type: PayloadType) -> u16 {
        match payload_type {
            PayloadType::VehicleIdentificationRequest => 0x0001,
            PayloadType::VehicleIdentificationResponse => 0x0004,
            PayloadType::RoutingActivationRequest => 0x0005,
            PayloadType::RoutingActivationResponse => 0x0006,
            PayloadType::DiagnosticMessage => 0x8001,
        }
    }
}
