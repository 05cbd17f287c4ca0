//! UDS (Unified Diagnostic Services, ISO 14229) request dispatcher.
//!
//! [`UdsServer`] is purely computational: [`UdsServer::handle`] maps one
//! request to exactly one response, positive or negative, and never blocks.
//! Session expiry is evaluated lazily on each incoming request against the
//! injected [`Clock`]; the hardware predicates behind the programming
//! routines come in through [`EcuHardware`].

mod routine;
mod session;
mod transfer;

pub use routine::{memory_checksum, routine_id, RoutineControlType, MEMORY_END};
pub use session::{DiagnosticSession, ResetType};
pub use transfer::{MemoryRegion, Transfer};

use std::time::Instant;

use crate::traits::{Clock, EcuHardware, MonotonicClock, SimulatedHardware};

///UDS service identifiers handled by this ECU.
pub mod service_id {
    pub const DIAGNOSTIC_SESSION_CONTROL: u8 = 0x10;
    pub const ECU_RESET: u8 = 0x11;
    pub const ROUTINE_CONTROL: u8 = 0x31;
    pub const REQUEST_DOWNLOAD: u8 = 0x34;
    pub const TRANSFER_DATA: u8 = 0x36;
    pub const REQUEST_TRANSFER_EXIT: u8 = 0x37;
    pub const TESTER_PRESENT: u8 = 0x3E;
    pub const NEGATIVE_RESPONSE: u8 = 0x7F;
}

///UDS negative response codes used by this ECU.
pub mod nrc {
    pub const SERVICE_NOT_SUPPORTED: u8 = 0x11;
    pub const SUB_FUNCTION_NOT_SUPPORTED: u8 = 0x12;
    pub const INCORRECT_MESSAGE_LENGTH: u8 = 0x13;
    pub const CONDITIONS_NOT_CORRECT: u8 = 0x22;
    pub const REQUEST_OUT_OF_RANGE: u8 = 0x31;
    pub const WRONG_BLOCK_SEQUENCE_COUNTER: u8 = 0x73;
    pub const SERVICE_NOT_SUPPORTED_IN_ACTIVE_SESSION: u8 = 0x7E;
}

/// P2server_max advertised on session change: 50 ms.
const P2_SERVER_MAX: u16 = 0x0032;
/// P2*server_max advertised on session change: 500 ms.
const P2_STAR_SERVER_MAX: u16 = 0x01F4;

/// maxNumberOfBlockLength granted to every download: 1024 bytes.
const MAX_BLOCK_LENGTH: u16 = 0x0400;

/// Build a positive response: request SID + 0x40, then `data`.
fn positive_response(service: u8, data: &[u8]) -> Vec<u8> {
    let mut response = Vec::with_capacity(1 + data.len());
    response.push(service + 0x40);
    response.extend_from_slice(data);
    response
}

/// Build a negative response `{0x7F, service, code}`.
fn negative_response(service: u8, code: u8) -> Vec<u8> {
    vec![service_id::NEGATIVE_RESPONSE, service, code]
}

/// Build a RoutineControl positive response: `{0x71, control, id, data...}`.
fn routine_response(control: RoutineControlType, routine: u16, data: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(3 + data.len());
    payload.push(u8::from(control));
    payload.extend_from_slice(&routine.to_be_bytes());
    payload.extend_from_slice(data);
    positive_response(service_id::ROUTINE_CONTROL, &payload)
}

/// A simulated UDS server for a single ECU.
pub struct UdsServer {
    session: DiagnosticSession,
    last_activity: Instant,
    tester_present: bool,
    transfer: Option<Transfer>,
    erase: Option<MemoryRegion>,
    clock: Box<dyn Clock>,
    hardware: Box<dyn EcuHardware>,
}

impl UdsServer {
    /// Server with the system clock and simulated hardware on which every
    /// check passes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_environment(Box::new(MonotonicClock), Box::new(SimulatedHardware))
    }

    /// Server with an injected clock and hardware, for tests that drive
    /// session expiry or force check failures.
    #[must_use]
    pub fn with_environment(clock: Box<dyn Clock>, hardware: Box<dyn EcuHardware>) -> Self {
        let last_activity = clock.now();
        Self {
            session: DiagnosticSession::Default,
            last_activity,
            tester_present: false,
            transfer: None,
            erase: None,
            clock,
            hardware,
        }
    }

    /// The currently active diagnostic session.
    pub fn session(&self) -> DiagnosticSession {
        self.session
    }

    /// Whether a tester has announced itself via TesterPresent.
    pub fn tester_present(&self) -> bool {
        self.tester_present
    }

    /// True while a download accepted by RequestDownload is still open.
    pub fn transfer_in_progress(&self) -> bool {
        self.transfer.is_some()
    }

    /// Dispatch one UDS request and build the response bytes.
    ///
    /// Every request produces exactly one response; failures are encoded as
    /// negative responses, never as Rust errors.
    pub fn handle(&mut self, request: &[u8]) -> Vec<u8> {
        let now = self.clock.now();
        self.expire_session(now);
        self.last_activity = now;

        let service = match request.first() {
            Some(&service) => service,
            None => return negative_response(0x00, nrc::SERVICE_NOT_SUPPORTED),
        };
        tracing::debug!("UDS request {:02X?}", request);
        match service {
            service_id::DIAGNOSTIC_SESSION_CONTROL => self.handle_session_control(request),
            service_id::ECU_RESET => self.handle_ecu_reset(request),
            service_id::TESTER_PRESENT => self.handle_tester_present(request),
            service_id::REQUEST_DOWNLOAD => self.handle_request_download(request),
            service_id::TRANSFER_DATA => self.handle_transfer_data(request),
            service_id::REQUEST_TRANSFER_EXIT => self.handle_transfer_exit(request),
            service_id::ROUTINE_CONTROL => self.handle_routine_control(request),
            _ => negative_response(service, nrc::SERVICE_NOT_SUPPORTED),
        }
    }

    /// Lazy session timer: fall back to the default session when the
    /// inactivity window of the current session has passed.
    fn expire_session(&mut self, now: Instant) {
        if self.session != DiagnosticSession::Default
            && now.duration_since(self.last_activity) > self.session.timeout()
        {
            tracing::info!("Session {:?} timed out, reverting to default", self.session);
            self.session = DiagnosticSession::Default;
        }
    }

    fn handle_session_control(&mut self, request: &[u8]) -> Vec<u8> {
        if request.len() < 2 {
            return negative_response(
                service_id::DIAGNOSTIC_SESSION_CONTROL,
                nrc::INCORRECT_MESSAGE_LENGTH,
            );
        }
        let session = match DiagnosticSession::from_subfunction(request[1]) {
            Some(session) => session,
            None => {
                return negative_response(
                    service_id::DIAGNOSTIC_SESSION_CONTROL,
                    nrc::SUB_FUNCTION_NOT_SUPPORTED,
                )
            }
        };
        self.session = session;
        tracing::debug!("Switched to session {:?}", session);

        let mut data = vec![request[1]];
        data.extend_from_slice(&P2_SERVER_MAX.to_be_bytes());
        data.extend_from_slice(&P2_STAR_SERVER_MAX.to_be_bytes());
        positive_response(service_id::DIAGNOSTIC_SESSION_CONTROL, &data)
    }

    fn handle_ecu_reset(&mut self, request: &[u8]) -> Vec<u8> {
        if request.len() < 2 {
            return negative_response(service_id::ECU_RESET, nrc::INCORRECT_MESSAGE_LENGTH);
        }
        let reset = match ResetType::from_subfunction(request[1]) {
            Some(reset) => reset,
            None => {
                return negative_response(service_id::ECU_RESET, nrc::SUB_FUNCTION_NOT_SUPPORTED)
            }
        };
        self.perform_reset(reset);
        positive_response(service_id::ECU_RESET, &[request[1]])
    }

    fn perform_reset(&mut self, reset: ResetType) {
        tracing::info!("Performing {:?}", reset);
        // any reset leaves the ECU in the default session
        self.session = DiagnosticSession::Default;
    }

    fn handle_tester_present(&mut self, request: &[u8]) -> Vec<u8> {
        if request.len() < 2 {
            return negative_response(service_id::TESTER_PRESENT, nrc::INCORRECT_MESSAGE_LENGTH);
        }
        match request[1] {
            0x00 => self.tester_present = true,
            0x01 => self.tester_present = false,
            _ => return negative_response(service_id::TESTER_PRESENT, nrc::REQUEST_OUT_OF_RANGE),
        }
        positive_response(service_id::TESTER_PRESENT, &[0x00])
    }

    fn handle_request_download(&mut self, request: &[u8]) -> Vec<u8> {
        if request.len() < 3 {
            return negative_response(service_id::REQUEST_DOWNLOAD, nrc::INCORRECT_MESSAGE_LENGTH);
        }
        // request[1] (dataFormatIdentifier) and request[2]
        // (addressAndLengthFormatIdentifier) are accepted as-is
        let region = match MemoryRegion::parse(&request[3..]) {
            Some(region) => region,
            None => {
                return negative_response(
                    service_id::REQUEST_DOWNLOAD,
                    nrc::INCORRECT_MESSAGE_LENGTH,
                )
            }
        };
        if self.session != DiagnosticSession::Programming {
            return negative_response(service_id::REQUEST_DOWNLOAD, nrc::CONDITIONS_NOT_CORRECT);
        }
        tracing::info!(
            "Download requested: address {:#010X}, {} bytes",
            region.address,
            region.size
        );
        self.transfer = Some(Transfer::new(region));
        positive_response(service_id::REQUEST_DOWNLOAD, &MAX_BLOCK_LENGTH.to_be_bytes())
    }

    fn handle_transfer_data(&mut self, request: &[u8]) -> Vec<u8> {
        if request.len() < 2 {
            return negative_response(service_id::TRANSFER_DATA, nrc::INCORRECT_MESSAGE_LENGTH);
        }
        let transfer = match self.transfer.as_mut() {
            Some(transfer) => transfer,
            None => {
                return negative_response(service_id::TRANSFER_DATA, nrc::CONDITIONS_NOT_CORRECT)
            }
        };
        let region = match transfer.region {
            Some(region) => region,
            None => {
                // all declared bytes already arrived
                return negative_response(service_id::TRANSFER_DATA, nrc::CONDITIONS_NOT_CORRECT);
            }
        };

        let block_counter = request[1];
        if block_counter != transfer.expected_counter() {
            tracing::warn!(
                "TransferData block counter {} received, {} expected",
                block_counter,
                transfer.expected_counter()
            );
            return negative_response(service_id::TRANSFER_DATA, nrc::WRONG_BLOCK_SEQUENCE_COUNTER);
        }
        transfer.block_counter = block_counter;
        transfer.buffer.extend_from_slice(&request[2..]);

        if transfer.buffer.len() >= region.size as usize {
            transfer.buffer.truncate(region.size as usize);
            tracing::info!("Download complete, {} bytes received", transfer.buffer.len());
            transfer.region = None;
            transfer.block_counter = 0;
        }
        positive_response(service_id::TRANSFER_DATA, &[block_counter])
    }

    fn handle_transfer_exit(&mut self, _request: &[u8]) -> Vec<u8> {
        match self.transfer.take() {
            Some(transfer) => {
                tracing::info!(
                    "Transfer closed, {} bytes received in total",
                    transfer.buffer.len()
                );
                positive_response(service_id::REQUEST_TRANSFER_EXIT, &[])
            }
            None => {
                negative_response(service_id::REQUEST_TRANSFER_EXIT, nrc::CONDITIONS_NOT_CORRECT)
            }
        }
    }

    fn handle_routine_control(&mut self, request: &[u8]) -> Vec<u8> {
        if request.len() < 4 {
            return negative_response(service_id::ROUTINE_CONTROL, nrc::INCORRECT_MESSAGE_LENGTH);
        }
        if self.session != DiagnosticSession::Programming {
            return negative_response(service_id::ROUTINE_CONTROL, nrc::CONDITIONS_NOT_CORRECT);
        }
        let control = match RoutineControlType::from_subfunction(request[1]) {
            Some(control) => control,
            None => {
                return negative_response(service_id::ROUTINE_CONTROL, nrc::REQUEST_OUT_OF_RANGE)
            }
        };
        let routine = u16::from_be_bytes([request[2], request[3]]);
        let data = &request[4..];
        match routine {
            routine_id::ERASE_MEMORY => self.erase_routine(control, data),
            routine_id::CHECK_PROGRAMMING_PRECONDITIONS => self.preconditions_routine(control),
            routine_id::CHECK_PROGRAMMING_DEPENDENCIES => self.dependencies_routine(control),
            routine_id::CHECK_MEMORY => self.check_memory_routine(control, data),
            _ => negative_response(service_id::ROUTINE_CONTROL, nrc::REQUEST_OUT_OF_RANGE),
        }
    }

    fn erase_routine(&mut self, control: RoutineControlType, data: &[u8]) -> Vec<u8> {
        match control {
            RoutineControlType::Start => {
                let region = match MemoryRegion::parse(data) {
                    Some(region) => region,
                    None => {
                        return negative_response(
                            service_id::ROUTINE_CONTROL,
                            nrc::INCORRECT_MESSAGE_LENGTH,
                        )
                    }
                };
                tracing::info!(
                    "Starting erase at {:#010X}, {} bytes",
                    region.address,
                    region.size
                );
                self.erase = Some(region);
                routine_response(control, routine_id::ERASE_MEMORY, &[])
            }
            RoutineControlType::Stop => {
                if self.erase.is_none() {
                    return negative_response(
                        service_id::ROUTINE_CONTROL,
                        nrc::CONDITIONS_NOT_CORRECT,
                    );
                }
                tracing::info!("Stopping erase");
                self.erase = None;
                routine_response(control, routine_id::ERASE_MEMORY, &[])
            }
            RoutineControlType::RequestResults => {
                let status = if self.erase.is_some() { 0x01 } else { 0x00 };
                routine_response(control, routine_id::ERASE_MEMORY, &[status])
            }
        }
    }

    fn preconditions_routine(&mut self, control: RoutineControlType) -> Vec<u8> {
        match control {
            RoutineControlType::Start => {
                let voltage_ok = self.hardware.check_voltage();
                let temperature_ok = self.hardware.check_temperature();
                let security_ok = self.hardware.check_security_access();
                let mut result = 0u8;
                if voltage_ok {
                    result |= 0x01;
                }
                if temperature_ok {
                    result |= 0x02;
                }
                if security_ok {
                    result |= 0x04;
                }
                tracing::info!(
                    "Programming preconditions: voltage {}, temperature {}, security {}",
                    voltage_ok,
                    temperature_ok,
                    security_ok
                );
                routine_response(
                    control,
                    routine_id::CHECK_PROGRAMMING_PRECONDITIONS,
                    &[result],
                )
            }
            // this routine runs to completion on start; there is nothing to
            // stop or to report later
            _ => negative_response(service_id::ROUTINE_CONTROL, nrc::CONDITIONS_NOT_CORRECT),
        }
    }

    fn dependencies_routine(&mut self, control: RoutineControlType) -> Vec<u8> {
        match control {
            RoutineControlType::Start => {
                let software_ok = self.hardware.check_software_version_compatibility();
                let hardware_ok = self.hardware.check_hardware_version_compatibility();
                let memory_ok = self.hardware.check_memory_availability();
                let mut result = 0u8;
                if software_ok {
                    result |= 0x01;
                }
                if hardware_ok {
                    result |= 0x02;
                }
                if memory_ok {
                    result |= 0x04;
                }
                tracing::info!(
                    "Programming dependencies: software {}, hardware {}, memory {}",
                    software_ok,
                    hardware_ok,
                    memory_ok
                );
                routine_response(
                    control,
                    routine_id::CHECK_PROGRAMMING_DEPENDENCIES,
                    &[result],
                )
            }
            _ => negative_response(service_id::ROUTINE_CONTROL, nrc::CONDITIONS_NOT_CORRECT),
        }
    }

    fn check_memory_routine(&mut self, control: RoutineControlType, data: &[u8]) -> Vec<u8> {
        match control {
            RoutineControlType::Start => {
                let region = match MemoryRegion::parse(data) {
                    Some(region) => region,
                    None => {
                        return negative_response(
                            service_id::ROUTINE_CONTROL,
                            nrc::INCORRECT_MESSAGE_LENGTH,
                        )
                    }
                };
                if !routine::memory_range_valid(region.address, region.size) {
                    return negative_response(
                        service_id::ROUTINE_CONTROL,
                        nrc::REQUEST_OUT_OF_RANGE,
                    );
                }
                let checksum = memory_checksum(region.address, region.size);
                routine_response(control, routine_id::CHECK_MEMORY, &checksum.to_be_bytes())
            }
            _ => negative_response(service_id::ROUTINE_CONTROL, nrc::CONDITIONS_NOT_CORRECT),
        }
    }
}

impl Default for UdsServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Clock whose time only moves when the test advances it.
    #[derive(Clone)]
    struct TestClock(Arc<Mutex<Instant>>);

    impl TestClock {
        fn new() -> Self {
            TestClock(Arc::new(Mutex::new(Instant::now())))
        }

        fn advance(&self, duration: Duration) {
            *self.0.lock().unwrap() += duration;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            *self.0.lock().unwrap()
        }
    }

    /// Hardware with individually forceable check outcomes.
    struct TestHardware {
        voltage: bool,
        temperature: bool,
        security: bool,
        software: bool,
        hardware: bool,
        memory: bool,
    }

    impl TestHardware {
        fn all_ok() -> Self {
            Self {
                voltage: true,
                temperature: true,
                security: true,
                software: true,
                hardware: true,
                memory: true,
            }
        }
    }

    impl EcuHardware for TestHardware {
        fn check_voltage(&self) -> bool {
            self.voltage
        }
        fn check_temperature(&self) -> bool {
            self.temperature
        }
        fn check_security_access(&self) -> bool {
            self.security
        }
        fn check_software_version_compatibility(&self) -> bool {
            self.software
        }
        fn check_hardware_version_compatibility(&self) -> bool {
            self.hardware
        }
        fn check_memory_availability(&self) -> bool {
            self.memory
        }
    }

    fn programming_session(server: &mut UdsServer) {
        assert_eq!(
            server.handle(&[0x10, 0x02]),
            [0x50, 0x02, 0x00, 0x32, 0x01, 0xF4]
        );
    }

    #[test]
    fn test_empty_request_is_rejected() {
        let mut server = UdsServer::new();
        assert_eq!(server.handle(&[]), [0x7F, 0x00, 0x11]);
    }

    #[test]
    fn test_unknown_service_is_rejected() {
        let mut server = UdsServer::new();
        assert_eq!(server.handle(&[0x84, 0x01]), [0x7F, 0x84, 0x11]);
    }

    #[test]
    fn test_session_control_responses() {
        let mut server = UdsServer::new();
        assert_eq!(
            server.handle(&[0x10, 0x01]),
            [0x50, 0x01, 0x00, 0x32, 0x01, 0xF4]
        );
        assert_eq!(server.session(), DiagnosticSession::Default);
        assert_eq!(
            server.handle(&[0x10, 0x03]),
            [0x50, 0x03, 0x00, 0x32, 0x01, 0xF4]
        );
        assert_eq!(server.session(), DiagnosticSession::Extended);
        assert_eq!(server.handle(&[0x10, 0x05]), [0x7F, 0x10, 0x12]);
        assert_eq!(server.handle(&[0x10]), [0x7F, 0x10, 0x13]);
    }

    #[test]
    fn test_default_session_request_is_idempotent() {
        let mut server = UdsServer::new();
        for _ in 0..3 {
            assert_eq!(
                server.handle(&[0x10, 0x01]),
                [0x50, 0x01, 0x00, 0x32, 0x01, 0xF4]
            );
            assert_eq!(server.session(), DiagnosticSession::Default);
        }
    }

    #[test]
    fn test_ecu_reset_reverts_session() {
        let mut server = UdsServer::new();
        programming_session(&mut server);
        assert_eq!(server.handle(&[0x11, 0x03]), [0x51, 0x03]);
        assert_eq!(server.session(), DiagnosticSession::Default);
        // session-dependent service now refuses
        assert_eq!(server.handle(&[0x31, 0x01, 0xFF, 0x01]), [0x7F, 0x31, 0x22]);
    }

    #[test]
    fn test_ecu_reset_subfunctions() {
        let mut server = UdsServer::new();
        for subfunction in 0x01..=0x05 {
            assert_eq!(server.handle(&[0x11, subfunction]), [0x51, subfunction]);
        }
        assert_eq!(server.handle(&[0x11, 0x06]), [0x7F, 0x11, 0x12]);
        assert_eq!(server.handle(&[0x11]), [0x7F, 0x11, 0x13]);
    }

    #[test]
    fn test_tester_present_toggles_flag() {
        let mut server = UdsServer::new();
        assert!(!server.tester_present());
        assert_eq!(server.handle(&[0x3E, 0x00]), [0x7E, 0x00]);
        assert!(server.tester_present());
        // idempotent
        assert_eq!(server.handle(&[0x3E, 0x00]), [0x7E, 0x00]);
        assert!(server.tester_present());
        assert_eq!(server.handle(&[0x3E, 0x01]), [0x7E, 0x00]);
        assert!(!server.tester_present());
        assert_eq!(server.handle(&[0x3E, 0x02]), [0x7F, 0x3E, 0x31]);
        assert_eq!(server.handle(&[0x3E]), [0x7F, 0x3E, 0x13]);
    }

    #[test]
    fn test_download_happy_path() {
        let mut server = UdsServer::new();
        programming_session(&mut server);
        assert_eq!(
            server.handle(&[0x34, 0x00, 0x44, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x04]),
            [0x74, 0x04, 0x00]
        );
        assert!(server.transfer_in_progress());
        assert_eq!(server.handle(&[0x36, 0x01, 0xDE, 0xAD]), [0x76, 0x01]);
        assert_eq!(server.handle(&[0x36, 0x02, 0xBE, 0xEF]), [0x76, 0x02]);
        // declared size reached; the transfer stays open until the exit
        assert!(server.transfer_in_progress());
        assert_eq!(server.handle(&[0x37]), [0x77]);
        assert!(!server.transfer_in_progress());
    }

    #[test]
    fn test_download_requires_programming_session() {
        let mut server = UdsServer::new();
        assert_eq!(
            server.handle(&[0x34, 0x00, 0x44, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x04]),
            [0x7F, 0x34, 0x22]
        );
    }

    #[test]
    fn test_download_length_checks() {
        let mut server = UdsServer::new();
        programming_session(&mut server);
        assert_eq!(server.handle(&[0x34, 0x00]), [0x7F, 0x34, 0x13]);
        // address/size pair incomplete
        assert_eq!(
            server.handle(&[0x34, 0x00, 0x44, 0x00, 0x00, 0x10, 0x00]),
            [0x7F, 0x34, 0x13]
        );
    }

    #[test]
    fn test_transfer_data_wrong_counter_leaves_state_unchanged() {
        let mut server = UdsServer::new();
        programming_session(&mut server);
        server.handle(&[0x34, 0x00, 0x44, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x10]);
        // first block must carry counter 1
        assert_eq!(server.handle(&[0x36, 0x02, 0xAA]), [0x7F, 0x36, 0x73]);
        assert_eq!(server.handle(&[0x36, 0x00, 0xAA]), [0x7F, 0x36, 0x73]);
        assert_eq!(server.handle(&[0x36, 0x01, 0xAA]), [0x76, 0x01]);
    }

    #[test]
    fn test_transfer_data_preconditions() {
        let mut server = UdsServer::new();
        programming_session(&mut server);
        assert_eq!(server.handle(&[0x36, 0x01, 0xAA]), [0x7F, 0x36, 0x22]);
        server.handle(&[0x34, 0x00, 0x44, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x10]);
        assert_eq!(server.handle(&[0x36]), [0x7F, 0x36, 0x13]);
    }

    #[test]
    fn test_transfer_data_after_completion_is_refused() {
        let mut server = UdsServer::new();
        programming_session(&mut server);
        server.handle(&[0x34, 0x00, 0x44, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x02]);
        assert_eq!(server.handle(&[0x36, 0x01, 0xDE, 0xAD]), [0x76, 0x01]);
        // all declared bytes received; further blocks are refused
        assert_eq!(server.handle(&[0x36, 0x02, 0xBE]), [0x7F, 0x36, 0x22]);
        // the exit still completes the sequence
        assert_eq!(server.handle(&[0x37]), [0x77]);
    }

    #[test]
    fn test_transfer_exit_without_download() {
        let mut server = UdsServer::new();
        assert_eq!(server.handle(&[0x37]), [0x7F, 0x37, 0x22]);
    }

    #[test]
    fn test_download_then_exit_restores_state() {
        let mut server = UdsServer::new();
        programming_session(&mut server);
        assert!(!server.transfer_in_progress());
        server.handle(&[0x34, 0x00, 0x44, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x04]);
        assert_eq!(server.handle(&[0x37]), [0x77]);
        assert!(!server.transfer_in_progress());
        assert_eq!(server.session(), DiagnosticSession::Programming);
    }

    #[test]
    fn test_block_counter_wraps_through_zero() {
        let mut server = UdsServer::new();
        programming_session(&mut server);
        // large enough that the download never completes in this test
        server.handle(&[0x34, 0x00, 0x44, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00]);
        for block in 1..=255u8 {
            assert_eq!(server.handle(&[0x36, block, 0x00]), [0x76, block]);
        }
        assert_eq!(server.handle(&[0x36, 0x00, 0x00]), [0x76, 0x00]);
        assert_eq!(server.handle(&[0x36, 0x01, 0x00]), [0x76, 0x01]);
    }

    #[test]
    fn test_routine_control_requires_programming_session() {
        let mut server = UdsServer::new();
        assert_eq!(server.handle(&[0x31, 0x01, 0xFF, 0x01]), [0x7F, 0x31, 0x22]);
    }

    #[test]
    fn test_routine_control_validation() {
        let mut server = UdsServer::new();
        programming_session(&mut server);
        assert_eq!(server.handle(&[0x31, 0x01, 0xFF]), [0x7F, 0x31, 0x13]);
        // unknown control type
        assert_eq!(server.handle(&[0x31, 0x04, 0xFF, 0x00]), [0x7F, 0x31, 0x31]);
        // unknown routine
        assert_eq!(server.handle(&[0x31, 0x01, 0xAB, 0xCD]), [0x7F, 0x31, 0x31]);
    }

    #[test]
    fn test_erase_routine_lifecycle() {
        let mut server = UdsServer::new();
        programming_session(&mut server);
        // not started yet: stop refused, results report completed
        assert_eq!(server.handle(&[0x31, 0x02, 0xFF, 0x00]), [0x7F, 0x31, 0x22]);
        assert_eq!(
            server.handle(&[0x31, 0x03, 0xFF, 0x00]),
            [0x71, 0x03, 0xFF, 0x00, 0x00]
        );
        // start without the address/size pair
        assert_eq!(server.handle(&[0x31, 0x01, 0xFF, 0x00]), [0x7F, 0x31, 0x13]);
        assert_eq!(
            server.handle(&[
                0x31, 0x01, 0xFF, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x10, 0x00
            ]),
            [0x71, 0x01, 0xFF, 0x00]
        );
        assert_eq!(
            server.handle(&[0x31, 0x03, 0xFF, 0x00]),
            [0x71, 0x03, 0xFF, 0x00, 0x01]
        );
        assert_eq!(
            server.handle(&[0x31, 0x02, 0xFF, 0x00]),
            [0x71, 0x02, 0xFF, 0x00]
        );
        assert_eq!(
            server.handle(&[0x31, 0x03, 0xFF, 0x00]),
            [0x71, 0x03, 0xFF, 0x00, 0x00]
        );
    }

    #[test]
    fn test_precondition_check_reports_all_ok() {
        let mut server = UdsServer::new();
        programming_session(&mut server);
        assert_eq!(
            server.handle(&[0x31, 0x01, 0xFF, 0x01]),
            [0x71, 0x01, 0xFF, 0x01, 0x07]
        );
        // start-only routine
        assert_eq!(server.handle(&[0x31, 0x02, 0xFF, 0x01]), [0x7F, 0x31, 0x22]);
        assert_eq!(server.handle(&[0x31, 0x03, 0xFF, 0x01]), [0x7F, 0x31, 0x22]);
    }

    #[test]
    fn test_precondition_check_reports_failure_bits() {
        let hardware = TestHardware {
            voltage: false,
            security: false,
            ..TestHardware::all_ok()
        };
        let mut server =
            UdsServer::with_environment(Box::new(TestClock::new()), Box::new(hardware));
        programming_session(&mut server);
        // bit 0 voltage, bit 1 temperature, bit 2 security
        assert_eq!(
            server.handle(&[0x31, 0x01, 0xFF, 0x01]),
            [0x71, 0x01, 0xFF, 0x01, 0x02]
        );
    }

    #[test]
    fn test_dependency_check_reports_failure_bits() {
        let hardware = TestHardware {
            memory: false,
            ..TestHardware::all_ok()
        };
        let mut server =
            UdsServer::with_environment(Box::new(TestClock::new()), Box::new(hardware));
        programming_session(&mut server);
        // bit 0 software, bit 1 hardware, bit 2 memory availability
        assert_eq!(
            server.handle(&[0x31, 0x01, 0xFF, 0x02]),
            [0x71, 0x01, 0xFF, 0x02, 0x03]
        );
        assert_eq!(server.handle(&[0x31, 0x02, 0xFF, 0x02]), [0x7F, 0x31, 0x22]);
    }

    #[test]
    fn test_check_memory_routine() {
        let mut server = UdsServer::new();
        programming_session(&mut server);
        // whole addressable range, end-exclusive boundary
        assert_eq!(
            server.handle(&[
                0x31, 0x01, 0xFF, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00
            ]),
            [0x71, 0x01, 0xFF, 0x03, 0x4A, 0xC2, 0x12, 0x51]
        );
        // one byte past the end
        assert_eq!(
            server.handle(&[
                0x31, 0x01, 0xFF, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x10, 0x00, 0x00
            ]),
            [0x7F, 0x31, 0x31]
        );
        assert_eq!(
            server.handle(&[0x31, 0x01, 0xFF, 0x03, 0x00, 0x00]),
            [0x7F, 0x31, 0x13]
        );
        assert_eq!(server.handle(&[0x31, 0x02, 0xFF, 0x03]), [0x7F, 0x31, 0x22]);
    }

    #[test]
    fn test_session_expires_after_inactivity() {
        let clock = TestClock::new();
        let mut server = UdsServer::with_environment(
            Box::new(clock.clone()),
            Box::new(TestHardware::all_ok()),
        );
        programming_session(&mut server);
        clock.advance(Duration::from_secs(9));
        // still inside the 10 s programming window
        assert_eq!(
            server.handle(&[0x34, 0x00, 0x44, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x04]),
            [0x74, 0x04, 0x00]
        );
        clock.advance(Duration::from_secs(11));
        assert_eq!(server.handle(&[0x31, 0x01, 0xFF, 0x01]), [0x7F, 0x31, 0x22]);
        assert_eq!(server.session(), DiagnosticSession::Default);
    }

    #[test]
    fn test_activity_keeps_session_alive() {
        let clock = TestClock::new();
        let mut server = UdsServer::with_environment(
            Box::new(clock.clone()),
            Box::new(TestHardware::all_ok()),
        );
        programming_session(&mut server);
        for _ in 0..5 {
            clock.advance(Duration::from_secs(8));
            assert_eq!(server.handle(&[0x3E, 0x00]), [0x7E, 0x00]);
        }
        assert_eq!(server.session(), DiagnosticSession::Programming);
    }
}
