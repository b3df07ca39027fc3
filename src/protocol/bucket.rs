//! Bit-bucket codec: the 7-bit-safe transport encoding.
//!
//! SysEx payload bytes must stay below 0x80. The codec packs up to 7 input
//! bytes per group: one leading "bucket" byte collects the stripped high
//! bits (bit i of the bucket is the high bit of the i-th byte of the
//! group), then the 7-bit remainders follow. A short final group emits a
//! bucket sized to whatever is left, no padding.

/// Encode arbitrary bytes into a MIDI-safe payload.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 7 + 1);
    for group in data.chunks(7) {
        let mut bucket = 0u8;
        for (i, &b) in group.iter().enumerate() {
            bucket |= (b >> 7) << i;
        }
        out.push(bucket);
        out.extend(group.iter().map(|&b| b & 0x7F));
    }
    out
}

/// Decode a payload produced by [`encode`]. A trailing lone bucket byte
/// (a group with no data bytes) decodes to nothing.
pub fn decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for group in data.chunks(8) {
        let bucket = group[0];
        for (i, &b) in group[1..].iter().enumerate() {
            out.push(b | (((bucket >> i) & 1) << 7));
        }
    }
    out
}

/// Encoded size of `len` input bytes: one bucket per started group of 7.
pub fn encoded_len(len: usize) -> usize {
    len + len.div_ceil(7)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_round_trip() {
        assert_eq!(encode(&[]), Vec::<u8>::new());
        assert_eq!(decode(&[]), Vec::<u8>::new());
    }

    #[test]
    fn high_bits_move_into_the_bucket() {
        // 0xFF x7 strips to 0x7F x7 with all bucket bits set.
        let enc = encode(&[0xFF; 7]);
        assert_eq!(enc[0], 0x7F);
        assert_eq!(&enc[1..], &[0x7F; 7]);
    }

    #[test]
    fn bucket_bit_order_is_first_byte_lowest_bit() {
        let enc = encode(&[0x80, 0x00, 0x00]);
        assert_eq!(enc, vec![0x01, 0x00, 0x00, 0x00]);
        let enc = encode(&[0x00, 0x00, 0x80]);
        assert_eq!(enc, vec![0x04, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn short_tail_group() {
        let data = [0x81, 0x02, 0x83, 0x04, 0x85, 0x06, 0x87, 0x88, 0x09];
        let enc = encode(&data);
        assert_eq!(enc.len(), encoded_len(data.len()));
        assert_eq!(decode(&enc), data);
    }

    #[test]
    fn slice_sized_group_has_no_partial_tail() {
        let data = vec![0xAB; 210];
        assert_eq!(encode(&data).len(), 240);
    }

    #[test]
    fn output_is_seven_bit_clean() {
        let data: Vec<u8> = (0..=255).collect();
        assert!(encode(&data).iter().all(|&b| b < 0x80));
    }

    proptest! {
        #[test]
        fn round_trips_any_input(data in proptest::collection::vec(any::<u8>(), 0..2000)) {
            let enc = encode(&data);
            prop_assert!(enc.iter().all(|&b| b < 0x80));
            prop_assert_eq!(enc.len(), encoded_len(data.len()));
            prop_assert_eq!(decode(&enc), data);
        }
    }
}
