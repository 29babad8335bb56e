//! Dallas/iButton CRC-8.
//!
//! Reflected polynomial `0x8C` (x^8 + x^5 + x^4 + 1), seeded at zero for
//! every command. Both ends update the running value one byte at a time, so
//! the incremental form is the primary API.

/// Reflected Dallas/Maxim polynomial.
pub const POLY: u8 = 0x8C;

/// Fold one byte into a running CRC.
#[inline]
pub const fn crc8_update(crc: u8, byte: u8) -> u8 {
    let mut crc = crc ^ byte;
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 0x01 != 0 {
            (crc >> 1) ^ POLY
        } else {
            crc >> 1
        };
        bit += 1;
    }
    crc
}

/// CRC of a whole buffer, seeded at zero.
pub fn crc8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |crc, &b| crc8_update(crc, b))
}
