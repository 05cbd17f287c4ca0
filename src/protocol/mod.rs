//! DoIP (Diagnostics over IP, ISO 13400) wire protocol.
//!
//! Big-endian framing: an 8 byte generic header followed by a payload whose
//! shape depends on the payload type. Diagnostic messages (0x8001) wrap UDS
//! bytes between a source and a target logical address.

mod error;
mod header;
mod message;
mod nack;
mod payload_type;

pub use error::Error;
pub use header::{Header, DOIP_HEADER_LENGTH, INVERSE_PROTOCOL_VERSION, PROTOCOL_VERSION};
pub use message::{
    encode_frame, DiagnosticMessage, Payload, RoutingActivationRequest, RoutingActivationResponse,
    VehicleIdentificationResponse, VehicleIdentity, ROUTING_SUCCESSFULLY_ACTIVATED,
    VEHICLE_IDENT_PAYLOAD_LENGTH,
};
pub use nack::{HeaderNegativeAck, NegativeAckCode};
pub use payload_type::PayloadType;
