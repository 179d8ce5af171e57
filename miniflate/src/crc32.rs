//! CRC-32 with the reflected polynomial used by gzip and zip containers.
//!
//! The deflate formats themselves only carry Adler-32, but the engine is
//! routinely embedded under containers that frame it with this checksum, so
//! it ships with the same resumable contract.

/// Reflected form of the CRC-32 generator polynomial.
const POLYNOMIAL: u32 = 0xEDB8_8320;

static CRC32_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];

    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;

        let mut j = 0;
        while j < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Rolling CRC-32 over `buf`, resuming from `start`.
///
/// Chunk-invariant like [`crate::adler32`]; the initial value is
/// [`crate::CRC32_INITIAL_VALUE`]. Empty input returns `start` unchanged.
pub fn crc32(start: u32, buf: &[u8]) -> u32 {
    let mut crc = !start;

    for byte in buf {
        crc = CRC32_TABLE[((crc ^ *byte as u32) & 0xff) as usize] ^ (crc >> 8);
    }

    !crc
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::CRC32_INITIAL_VALUE;

    const INPUT: [u8; 1024] = {
        let mut array = [0; 1024];
        let mut i = 0;
        while i < array.len() {
            array[i] = i as u8;
            i += 1;
        }

        array
    };

    #[test]
    fn empty_input_is_identity() {
        assert_eq!(crc32(CRC32_INITIAL_VALUE, &[]), 0);

        let mid = crc32(CRC32_INITIAL_VALUE, b"abc");
        assert_eq!(crc32(mid, &[]), mid);
    }

    #[test]
    fn check_value() {
        // the standard check vector for this polynomial
        assert_eq!(crc32(0, b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn matches_crc32fast() {
        let mut h = crc32fast::Hasher::new_with_initial(CRC32_INITIAL_VALUE);
        h.update(&INPUT);
        assert_eq!(crc32(CRC32_INITIAL_VALUE, &INPUT), h.finalize());
    }

    quickcheck::quickcheck! {
        fn crc32_is_crc32fast(start: u32, v: Vec<u8>) -> bool {
            let mut h = crc32fast::Hasher::new_with_initial(start);
            h.update(&v);

            crc32(start, &v) == h.finalize()
        }

        fn chunked_update_matches_whole(v: Vec<u8>, cut: usize) -> bool {
            let cut = if v.is_empty() { 0 } else { cut % v.len() };
            let (front, back) = v.split_at(cut);

            crc32(crc32(0, front), back) == crc32(0, &v)
        }
    }
}
