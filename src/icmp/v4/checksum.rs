/// Internet checksum (RFC 1071).
///
/// Sums the buffer as big-endian 16-bit words, folding every carry back into the
/// low 16 bits, and returns the ones' complement of the sum. An odd trailing byte
/// is padded with a zero byte. The checksum field of the buffer must be zero while
/// computing; a filled buffer re-checksums to zero.
pub(crate) fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
        sum = fold(sum);
    }
    if let [last] = words.remainder() {
        sum += u32::from(*last) << 8;
        sum = fold(sum);
    }
    !u16::try_from(fold(sum)).unwrap_or(u16::MAX)
}

/// Writes the checksum of `data` into `data[offset..offset + 2]`, zeroing the
/// field first.
pub(crate) fn fill_checksum(data: &mut [u8], offset: usize) {
    data[offset] = 0;
    data[offset + 1] = 0;
    let sum = checksum(data);
    data[offset..offset + 2].copy_from_slice(&sum.to_be_bytes());
}

/// Whether a buffer including its checksum field sums to the ones'-complement zero.
pub(crate) fn is_valid(data: &[u8]) -> bool {
    checksum(data) == 0
}

fn fold(mut sum: u32) -> u32 {
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc_1071_example() {
        // Section 3 of RFC 1071: the words sum to 0xddf2, complement is 0x220d.
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(0x220d, checksum(&data));
    }

    #[test]
    fn empty_buffer() {
        assert_eq!(0xFFFF, checksum(&[]));
    }

    #[test]
    fn odd_length_pads_with_zero() {
        assert_eq!(checksum(&[0xAB, 0xCD, 0xEF, 0x00]), checksum(&[0xAB, 0xCD, 0xEF]));
    }

    #[test]
    fn carry_wraps_around() {
        // 0xFFFF + 0x0001 = 0x1_0000 -> 0x0001 after the end-around carry.
        assert_eq!(!0x0001_u16, checksum(&[0xFF, 0xFF, 0x00, 0x01]));
    }

    #[test]
    fn all_ones_sum_to_zero_checksum() {
        assert_eq!(0x0000, checksum(&[0xFF; 16]));
    }

    #[test]
    fn filled_buffer_verifies() {
        let mut data = vec![0x08, 0x00, 0x00, 0x00, 0x12, 0x34, 0x00, 0x01, b'e', b'e', b'e'];
        fill_checksum(&mut data, 2);
        assert!(is_valid(&data));
    }

    #[test]
    fn fill_checksum_is_idempotent() {
        let mut data = vec![0x08, 0x00, 0x00, 0x00, 0xBE, 0xEF, 0x00, 0x07, 1, 2, 3, 4];
        fill_checksum(&mut data, 2);
        let first = data.clone();
        fill_checksum(&mut data, 2);
        assert_eq!(first, data);
    }

    #[test]
    fn detects_every_single_bit_flip() {
        let mut data = vec![0x08, 0x00, 0x00, 0x00, 0x4A, 0x11, 0x00, 0x2A, b'e', b'e', b'e', b'e'];
        fill_checksum(&mut data, 2);
        for byte in 0..data.len() {
            for bit in 0..8 {
                let mut corrupted = data.clone();
                corrupted[byte] ^= 1 << bit;
                assert!(!is_valid(&corrupted), "flip of bit {bit} in byte {byte} went unnoticed");
            }
        }
    }

    #[test]
    fn agrees_with_pnet() {
        let mut data = vec![0x08, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x03, 9, 8, 7, 6, 5];
        fill_checksum(&mut data, 2);
        let expected = pnet_packet::util::checksum(&data, 1);
        assert_eq!(expected.to_be_bytes(), [data[2], data[3]]);
    }
}
