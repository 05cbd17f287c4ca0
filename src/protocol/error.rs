use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Unsupported payload type: {0:#06X}")]
    UnsupportedPayloadType(u16),
    #[error("Invalid payload length {length} for payload type {payload_type:#06X}")]
    InvalidPayloadLength { payload_type: u16, length: u32 },
    #[error("Declared payload length {0} exceeds the receive buffer")]
    PayloadTooLarge(u32),
}
