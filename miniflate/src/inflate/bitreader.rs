use core::slice;

/// LSB-first bit reader over one call's input slice.
///
/// The accumulator and bit count are persisted in the session between calls;
/// the iterator is rebuilt per call. Reads that run out of input may leave
/// whole bytes in the accumulator, which [`BitReader::undo_bytes`] hands back
/// to the caller.
pub(crate) struct BitReader<'a> {
    pub iter: slice::Iter<'a, u8>,
    pub bit_buf: u64,
    pub num_bits: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(input: &'a [u8], bit_buf: u64, num_bits: u32) -> Self {
        Self {
            iter: input.iter(),
            bit_buf,
            num_bits,
        }
    }

    #[inline]
    pub fn bytes_left(&self) -> usize {
        self.iter.len()
    }

    /// Top the accumulator up to at least 32 bits. Requires 4 bytes of input.
    #[inline(always)]
    pub fn fill(&mut self) {
        if self.num_bits < 30 {
            let four_bytes: [u8; 4] = match self.iter.as_slice()[..4].try_into() {
                Ok(bytes) => bytes,
                Err(_) => unreachable!(),
            };
            self.bit_buf |= u64::from(u32::from_le_bytes(four_bytes)) << self.num_bits;
            self.num_bits += 32;
            self.iter.nth(3);
        }
    }

    /// Add the next two input bytes to the accumulator. Requires 2 bytes.
    #[inline]
    pub fn fill_u16(&mut self) {
        let two_bytes: [u8; 2] = match self.iter.as_slice()[..2].try_into() {
            Ok(bytes) => bytes,
            Err(_) => unreachable!(),
        };
        self.bit_buf |= u64::from(u16::from_le_bytes(two_bytes)) << self.num_bits;
        self.num_bits += 16;
        self.iter.nth(1);
    }

    /// Read one raw input byte, bypassing the accumulator.
    #[inline]
    pub fn pull_byte(&mut self) -> Option<u8> {
        self.iter.next().copied()
    }

    /// Read `amount` bits, refilling bytewise. `None` when input runs out;
    /// bytes pulled before that stay in the accumulator for the next call.
    #[inline]
    pub fn try_read_bits(&mut self, amount: u32) -> Option<u64> {
        while self.num_bits < amount {
            let byte = self.pull_byte()?;
            self.bit_buf |= u64::from(byte) << self.num_bits;
            self.num_bits += 8;
        }

        let bits = self.bit_buf & ((1 << amount) - 1);
        self.bit_buf >>= amount;
        self.num_bits -= amount;
        Some(bits)
    }

    /// Drop bits so the next read is byte aligned.
    #[inline]
    pub fn try_pad_to_bytes(&mut self) -> Option<()> {
        let num_bits = self.num_bits & 7;
        self.try_read_bits(num_bits).map(|_| ())
    }

    /// Return up to `max` whole unconsumed bytes from the accumulator.
    #[inline]
    pub fn undo_bytes(&mut self, max: u32) -> u32 {
        let res = Ord::min(self.num_bits >> 3, max);
        self.num_bits -= res << 3;
        res
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bits_come_out_lsb_first() {
        let data = [0b1010_0110, 0xFF];
        let mut reader = BitReader::new(&data, 0, 0);

        assert_eq!(reader.try_read_bits(3), Some(0b110));
        assert_eq!(reader.try_read_bits(5), Some(0b10100));
        assert_eq!(reader.try_read_bits(8), Some(0xFF));
        assert_eq!(reader.try_read_bits(1), None);
    }

    #[test]
    fn accumulator_survives_short_input() {
        let data = [0xAB];
        let mut reader = BitReader::new(&data, 0, 0);

        // asking for 16 bits fails but keeps the pulled byte
        assert_eq!(reader.try_read_bits(16), None);
        assert_eq!(reader.num_bits, 8);

        // resuming with more input picks up where we left off
        let more = [0xCD];
        let mut reader = BitReader::new(&more, reader.bit_buf, reader.num_bits);
        assert_eq!(reader.try_read_bits(16), Some(0xCDAB));
    }

    #[test]
    fn undo_returns_whole_bytes_only() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let mut reader = BitReader::new(&data, 0, 0);

        assert_eq!(reader.try_read_bits(3), Some(1));
        reader.fill();
        assert_eq!(reader.num_bits, 5 + 32);

        assert_eq!(reader.undo_bytes(10), 4);
        assert_eq!(reader.num_bits, 5);
    }

    #[test]
    fn pad_drops_partial_byte() {
        let data = [0b1110_0101, 0x42];
        let mut reader = BitReader::new(&data, 0, 0);

        assert_eq!(reader.try_read_bits(3), Some(0b101));
        assert_eq!(reader.try_pad_to_bytes(), Some(()));
        assert_eq!(reader.try_read_bits(8), Some(0x42));
    }
}
