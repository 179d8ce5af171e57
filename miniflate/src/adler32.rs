const BASE: u32 = 65521; /* largest prime smaller than 65536 */

/// Largest n such that 255n(n+1)/2 + (n+1)(BASE-1) <= 2^32-1. Sums can be
/// accumulated for this many bytes before the modulo reduction is forced; it
/// is a property of 32-bit accumulation, not a tunable.
const NMAX: u32 = 5552;

// macros for loop unrolling
macro_rules! do1 {
    ($sum1:expr, $sum2:expr, $chunk:expr, $i:expr) => {
        $sum1 += $chunk[$i] as u32;
        $sum2 += $sum1;
    };
}

macro_rules! do2 {
    ($sum1:expr, $sum2:expr, $chunk:expr, $i:expr) => {
        do1!($sum1, $sum2, $chunk, $i);
        do1!($sum1, $sum2, $chunk, $i + 1);
    };
}

macro_rules! do4 {
    ($sum1:expr, $sum2:expr, $chunk:expr, $i:expr) => {
        do2!($sum1, $sum2, $chunk, $i);
        do2!($sum1, $sum2, $chunk, $i + 2);
    };
}

macro_rules! do8 {
    ($sum1:expr, $sum2:expr, $chunk:expr, $i:expr) => {
        do4!($sum1, $sum2, $chunk, $i);
        do4!($sum1, $sum2, $chunk, $i + 4);
    };
}

macro_rules! do16 {
    ($sum1:expr, $sum2:expr, $chunk:expr) => {
        do8!($sum1, $sum2, $chunk, 0);
        do8!($sum1, $sum2, $chunk, 8);
    };
}

/// Rolling Adler-32 over `buf`, resuming from `start`.
///
/// Feeding the same bytes in any chunking produces the same checksum, so the
/// result of one call can be passed as the `start` of the next. The initial
/// value is [`crate::ADLER32_INITIAL_VALUE`].
pub fn adler32(start: u32, buf: &[u8]) -> u32 {
    /* split Adler-32 into component sums */
    let mut adler = start & 0xffff;
    let mut sum2 = (start >> 16) & 0xffff;

    /* in case user likes doing a byte at a time, keep it fast */
    if buf.len() == 1 {
        return adler32_len_1(adler, buf, sum2);
    }

    if buf.is_empty() {
        return start;
    }

    /* in case short lengths are provided, keep it somewhat fast */
    if buf.len() < 16 {
        return adler32_len_16(adler, buf, sum2);
    }

    let mut it = buf.chunks_exact(NMAX as usize);
    for big_chunk in it.by_ref() {
        for chunk in big_chunk.chunks_exact(16) {
            do16!(adler, sum2, chunk);
        }

        adler %= BASE;
        sum2 %= BASE;
    }

    /* do remaining bytes (less than NMAX, still just one modulo) */
    adler32_len_64(adler, it.remainder(), sum2)
}

fn adler32_len_1(mut adler: u32, buf: &[u8], mut sum2: u32) -> u32 {
    adler += buf[0] as u32;
    adler %= BASE;
    sum2 += adler;
    sum2 %= BASE;
    adler | (sum2 << 16)
}

fn adler32_len_16(mut adler: u32, buf: &[u8], mut sum2: u32) -> u32 {
    for b in buf {
        adler += (*b) as u32;
        sum2 += adler;
    }

    adler %= BASE;
    sum2 %= BASE; /* only added so many BASE's */
    /* return recombined sums */
    adler | (sum2 << 16)
}

fn adler32_len_64(mut adler: u32, buf: &[u8], mut sum2: u32) -> u32 {
    let mut it = buf.chunks_exact(16);
    for chunk in it.by_ref() {
        do16!(adler, sum2, chunk);
    }

    /* Process tail (len < 16).  */
    adler32_len_16(adler, it.remainder(), sum2)
}

#[cfg(test)]
mod test {
    use super::*;

    // inefficient but correct, useful for testing
    fn naive_adler32(start_checksum: u32, data: &[u8]) -> u32 {
        const MOD_ADLER: u32 = 65521; // Largest prime smaller than 2^16

        let mut a = start_checksum & 0xFFFF;
        let mut b = (start_checksum >> 16) & 0xFFFF;

        for &byte in data {
            a = (a + byte as u32) % MOD_ADLER;
            b = (b + a) % MOD_ADLER;
        }

        (b << 16) | a
    }

    #[test]
    fn empty_input_is_identity() {
        assert_eq!(adler32(crate::ADLER32_INITIAL_VALUE, &[]), 1);

        // an in-progress checksum must also pass through unchanged
        let mid = adler32(crate::ADLER32_INITIAL_VALUE, b"abc");
        assert_eq!(adler32(mid, &[]), mid);
    }

    #[test]
    fn single_byte() {
        assert_eq!(adler32(1, &[0x61]), 0x0062_0062);
    }

    #[test]
    fn known_vectors() {
        assert_eq!(adler32(1, b"Wikipedia"), 0x11E6_0398);
        assert_eq!(adler32(1, b"Hello, world!"), 0x205E_048A);
    }

    #[test]
    fn nmax_boundary() {
        // straddle the deferred-reduction block size
        let data = [0xffu8; 2 * NMAX as usize + 17];
        for len in [
            NMAX as usize - 1,
            NMAX as usize,
            NMAX as usize + 1,
            data.len(),
        ] {
            assert_eq!(adler32(1, &data[..len]), naive_adler32(1, &data[..len]));
        }
    }

    quickcheck::quickcheck! {
        fn adler32_is_naive_adler32(start: u32, v: Vec<u8>) -> bool {
            adler32(start, &v) == naive_adler32(start, &v)
        }

        fn chunked_update_matches_whole(v: Vec<u8>, cut: usize) -> bool {
            let cut = if v.is_empty() { 0 } else { cut % v.len() };
            let (front, back) = v.split_at(cut);

            adler32(adler32(1, front), back) == adler32(1, &v)
        }
    }
}
