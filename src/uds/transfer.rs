//! Download transfer state for RequestDownload / TransferData /
//! RequestTransferExit.

use byteorder::{BigEndian, ReadBytesExt};

/// A memory range addressed by a download, erase or checksum request.
/// Address and size travel big-endian on the wire.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryRegion {
    pub address: u32,
    pub size: u32,
}

impl MemoryRegion {
    /// Parse a big-endian address/size pair from the front of `data`.
    /// `None` when fewer than eight bytes are available.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }
        let mut reader = data;
        let address = reader.read_u32::<BigEndian>().ok()?;
        let size = reader.read_u32::<BigEndian>().ok()?;
        Some(Self { address, size })
    }
}

/// An open download accepted by RequestDownload.
///
/// `region` is cleared once the declared byte count has been received; the
/// transfer itself stays open until RequestTransferExit closes it, so a late
/// TransferData is refused while RequestTransferExit still succeeds.
#[derive(Debug)]
pub struct Transfer {
    /// Remaining target region, `None` once all declared bytes arrived.
    pub region: Option<MemoryRegion>,
    /// Counter of the last accepted TransferData block.
    pub block_counter: u8,
    /// Bytes accumulated so far, capped at the declared size.
    pub buffer: Vec<u8>,
}

impl Transfer {
    #[must_use]
    pub fn new(region: MemoryRegion) -> Self {
        Self {
            region: Some(region),
            block_counter: 0,
            buffer: Vec::new(),
        }
    }

    /// Counter value the next TransferData block must carry.
    pub fn expected_counter(&self) -> u8 {
        self.block_counter.wrapping_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_region_parse() {
        let data = [0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x04, 0x00, 0xAA];
        let region = MemoryRegion::parse(&data).unwrap();
        assert_eq!(region.address, 0x0000_1000);
        assert_eq!(region.size, 0x0000_0400);
    }

    #[test]
    fn test_memory_region_needs_eight_bytes() {
        assert_eq!(MemoryRegion::parse(&[0x00; 7]), None);
    }

    #[test]
    fn test_expected_counter_wraps() {
        let mut transfer = Transfer::new(MemoryRegion {
            address: 0,
            size: 1024,
        });
        assert_eq!(transfer.expected_counter(), 1);
        transfer.block_counter = 0xFF;
        assert_eq!(transfer.expected_counter(), 0);
    }
}
