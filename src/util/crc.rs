//! CRC-8 used by the MX1 serial framing.
//!
//! Dallas/Maxim CRC-8 (`CRC_8_MAXIM_DLS`, reflected). The seed is supplied
//! by the caller and is the initial value of the reflected shift register,
//! so an empty input checksums to the seed itself.

use crc::{CRC_8_MAXIM_DOW, Crc, Digest};

/// Generator polynomial in reflected form (x^8 + x^5 + x^4 + 1).
pub const CRC8_POLY: u8 = 0x8C;

static MX1_CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_MAXIM_DOW);

/// Compute the CRC-8 of `data` starting from `seed`.
#[must_use]
pub fn crc8(seed: u8, data: &[u8]) -> u8 {
    let mut digest = Crc8::new(seed);
    digest.update(data);
    digest.finish()
}

/// Incremental CRC-8 digest.
pub struct Crc8 {
    digest: Digest<'static, u8>,
}

impl Crc8 {
    /// Start a digest from `seed`.
    #[must_use]
    pub fn new(seed: u8) -> Self {
        // the crate reflects the initial value of reflected algorithms
        Self {
            digest: MX1_CRC.digest_with_initial(seed.reverse_bits()),
        }
    }

    /// Feed a single byte.
    pub fn push(&mut self, byte: u8) {
        self.digest.update(&[byte]);
    }

    /// Feed a slice.
    pub fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    /// Current checksum value.
    #[must_use]
    pub fn finish(self) -> u8 {
        self.digest.finalize()
    }
}

impl std::fmt::Debug for Crc8 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc8").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitwise(seed: u8, data: &[u8]) -> u8 {
        let mut crc = seed;
        for &byte in data {
            crc ^= byte;
            for _ in 0..8 {
                crc = if crc & 0x01 != 0 {
                    (crc >> 1) ^ CRC8_POLY
                } else {
                    crc >> 1
                };
            }
        }
        crc
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(crc8(0xFF, &[0x88, 0x00, 0x01]), 0xCB);
    }

    #[test]
    fn test_polynomial_matches_algorithm() {
        assert_eq!(CRC_8_MAXIM_DOW.poly.reverse_bits(), CRC8_POLY);
        // Maxim 1-Wire table starts 00 5E BC E2
        let row: Vec<u8> = (0..4).map(|i| crc8(0, &[i])).collect();
        assert_eq!(row, [0x00, 0x5E, 0xBC, 0xE2]);
    }

    #[test]
    fn test_empty_input_returns_seed() {
        assert_eq!(crc8(0xA5, &[]), 0xA5);
        assert_eq!(crc8(0x01, &[]), 0x01);
    }

    #[test]
    fn test_asymmetric_seed_is_register_value() {
        let data = [0x88, 0x00, 0x01, 0x10, 0x17];
        for seed in [0x00, 0x01, 0x5A, 0x80, 0xC3] {
            assert_eq!(crc8(seed, &data), bitwise(seed, &data), "seed {seed:#04x}");
        }
    }

    #[test]
    fn test_incremental_equals_oneshot() {
        let data = [0x10, 0x01, 0x17, 0x42, 0x99];
        let mut digest = Crc8::new(0xFF);
        digest.update(&data[..2]);
        digest.push(data[2]);
        digest.update(&data[3..]);
        assert_eq!(digest.finish(), crc8(0xFF, &data));
    }
}
