// crc.rs — 16-bit CCITT CRC used to fingerprint loaded collision data

use crc::{Crc, Digest, CRC_16_IBM_3740};

static CRC_CALC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Incremental checksum over little-endian scalars.
pub struct CrcStream {
    digest: Digest<'static, u16>,
}

impl CrcStream {
    pub fn new() -> Self {
        Self { digest: CRC_CALC.digest() }
    }

    pub fn float(&mut self, v: f32) {
        self.digest.update(&v.to_le_bytes());
    }

    pub fn int(&mut self, v: i32) {
        self.digest.update(&v.to_le_bytes());
    }

    pub fn finish(self) -> u16 {
        self.digest.finalize()
    }
}

impl Default for CrcStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crc_block(data: &[u8]) -> u16 {
        CRC_CALC.checksum(data)
    }

    #[test]
    fn test_crc_empty() {
        assert_eq!(crc_block(&[]), 0xffff);
    }

    #[test]
    fn test_crc_check_value() {
        // standard check value for CRC-16/CCITT-FALSE over "123456789"
        assert_eq!(crc_block(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_stream_matches_block() {
        let mut s = CrcStream::new();
        s.float(1.5);
        s.int(-3);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-3i32).to_le_bytes());
        assert_eq!(s.finish(), crc_block(&bytes));
    }
}
