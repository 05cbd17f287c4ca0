//! DoIP entity server: TCP accept loop and per-connection framing.
//!
//! The listener serves one tester at a time. Each accepted connection gets a
//! fresh routing-activation gate and its own [`UdsServer`], both discarded on
//! disconnect. Frames are reassembled from the stream using the length field
//! of the generic header.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::protocol::{
    self, encode_frame, DiagnosticMessage, Header, HeaderNegativeAck, NegativeAckCode, PayloadType,
    RoutingActivationRequest, RoutingActivationResponse, VehicleIdentificationResponse,
    VehicleIdentity, DOIP_HEADER_LENGTH,
};
use crate::uds::UdsServer;
use crate::Error;

/// TCP port assigned to DoIP by ISO 13400.
pub const DOIP_PORT: u16 = 13400;

/// Largest frame this entity buffers, header included.
const MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Configuration for a DoIP entity.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind: SocketAddr,
    /// Identity advertised in vehicle identification responses.
    pub identity: VehicleIdentity,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DOIP_PORT)),
            identity: VehicleIdentity::default(),
        }
    }
}

/// A DoIP entity accepting tester connections in sequence.
pub struct DoIpServer {
    config: ServerConfig,
    listener: TcpListener,
}

impl DoIpServer {
    /// Bind the TCP listener for the configured address.
    pub async fn bind(config: ServerConfig) -> Result<Self, Error> {
        let listener = TcpListener::bind(config.bind).await?;
        tracing::info!("DoIP server listening on {}", listener.local_addr()?);
        Ok(Self { config, listener })
    }

    /// Address the listener is bound to. Useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve tester connections, strictly one at a time.
    pub async fn run(&self) -> Result<(), Error> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            tracing::info!("Client connected from {}", peer);
            let mut connection = Connection::new(stream, self.config.identity);
            match connection.serve().await {
                Ok(()) => tracing::info!("Client disconnected"),
                Err(error) => tracing::warn!("Connection closed: {}", error),
            }
        }
    }
}

/// One tester connection: routing gate, UDS state, framing.
struct Connection {
    stream: TcpStream,
    identity: VehicleIdentity,
    routing_activated: bool,
    uds: UdsServer,
}

impl Connection {
    fn new(stream: TcpStream, identity: VehicleIdentity) -> Self {
        Self {
            stream,
            identity,
            routing_activated: false,
            uds: UdsServer::new(),
        }
    }

    async fn serve(&mut self) -> Result<(), Error> {
        loop {
            let (header, payload) = match self.read_frame().await? {
                Some(frame) => frame,
                None => return Ok(()),
            };
            if let Some(response) = self.handle_frame(&header, &payload)? {
                self.stream.write_all(&response).await?;
            }
        }
    }

    /// Read one frame off the stream: 8 header bytes, then exactly the
    /// declared payload length. `None` on EOF at a frame boundary.
    async fn read_frame(&mut self) -> Result<Option<(Header, Vec<u8>)>, Error> {
        let mut header_bytes = [0u8; DOIP_HEADER_LENGTH];
        match self.stream.read_exact(&mut header_bytes).await {
            Ok(_) => {}
            Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        }
        let header = Header::read(&mut header_bytes.as_slice())?;
        if !header.version_is_supported() {
            tracing::warn!(
                "Unexpected protocol version {:#04X}/{:#04X}",
                header.protocol_version,
                header.inverse_protocol_version
            );
        }
        if header.payload_length as usize > MAX_FRAME_LENGTH - DOIP_HEADER_LENGTH {
            return Err(protocol::Error::PayloadTooLarge(header.payload_length).into());
        }
        let mut payload = vec![0u8; header.payload_length as usize];
        self.stream.read_exact(&mut payload).await?;
        tracing::trace!(
            "Received payload type {:#06X}, {} payload bytes",
            header.payload_type,
            header.payload_length
        );
        Ok(Some((header, payload)))
    }

    /// Dispatch one frame by payload type and build the response frame.
    fn handle_frame(&mut self, header: &Header, payload: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let payload_type = match PayloadType::try_from(header.payload_type) {
            Ok(payload_type) => payload_type,
            Err(protocol::Error::UnsupportedPayloadType(raw)) => {
                tracing::warn!("Unsupported payload type {:#06X}", raw);
                return self.negative_ack(raw, NegativeAckCode::UnknownPayloadType);
            }
            Err(error) => return Err(error.into()),
        };
        match payload_type {
            PayloadType::VehicleIdentificationRequest => {
                let response = VehicleIdentificationResponse {
                    identity: self.identity,
                };
                Ok(Some(encode_frame(&response)?))
            }
            PayloadType::RoutingActivationRequest => self.handle_routing_activation(payload),
            PayloadType::DiagnosticMessage => self.handle_diagnostic_message(payload),
            PayloadType::VehicleIdentificationResponse | PayloadType::RoutingActivationResponse => {
                // response types are never valid inbound
                tracing::warn!("Rejecting inbound payload type {:?}", payload_type);
                self.negative_ack(header.payload_type, NegativeAckCode::UnknownPayloadType)
            }
        }
    }

    fn handle_routing_activation(&mut self, payload: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let request = match RoutingActivationRequest::read(payload) {
            Ok(request) => request,
            Err(protocol::Error::InvalidPayloadLength { .. }) => {
                return self.negative_ack(
                    PayloadType::RoutingActivationRequest.into(),
                    NegativeAckCode::InvalidPayloadLength,
                );
            }
            Err(error) => return Err(error.into()),
        };
        // a simulated entity accepts any tester and activation type
        self.routing_activated = true;
        tracing::info!(
            "Routing activated for tester {:#06X} (activation type {:#04X})",
            request.source_address,
            request.activation_type
        );
        let response = RoutingActivationResponse {
            client_address: request.source_address,
        };
        Ok(Some(encode_frame(&response)?))
    }

    fn handle_diagnostic_message(&mut self, payload: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        if !self.routing_activated {
            tracing::warn!("Diagnostic message before routing activation");
            return self.negative_ack(
                PayloadType::DiagnosticMessage.into(),
                NegativeAckCode::RoutingNotActivated,
            );
        }
        let message = match DiagnosticMessage::read(payload) {
            Ok(message) => message,
            Err(protocol::Error::InvalidPayloadLength { .. }) => {
                return self.negative_ack(
                    PayloadType::DiagnosticMessage.into(),
                    NegativeAckCode::InvalidPayloadLength,
                );
            }
            Err(error) => return Err(error.into()),
        };
        let uds_response = self.uds.handle(&message.user_data);
        let response = DiagnosticMessage {
            source_address: message.target_address,
            target_address: message.source_address,
            user_data: uds_response,
        };
        Ok(Some(encode_frame(&response)?))
    }

    fn negative_ack(
        &self,
        rejected_payload_type: u16,
        code: NegativeAckCode,
    ) -> Result<Option<Vec<u8>>, Error> {
        let nack = HeaderNegativeAck {
            rejected_payload_type,
            code,
        };
        Ok(Some(encode_frame(&nack)?))
    }
}
