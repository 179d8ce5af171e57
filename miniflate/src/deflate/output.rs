use crate::deflate::OUT_BUF_SIZE;

/// The block staging buffer ran out of room. Surfaced to callers as
/// [`DeflateStatus::PutBufFailed`](crate::deflate::DeflateStatus::PutBufFailed).
#[derive(Debug)]
pub(crate) struct BufError;

/// Staging buffer for one block's worth of compressed output, with an
/// LSB-first bit accumulator.
///
/// Whole bytes are written out as soon as the accumulator holds them; at most
/// 7 residual bits stay behind between blocks (and between calls), which is
/// why the accumulator is copied back into the persistent session state when
/// a block is done.
pub(crate) struct OutputBuffer<'a> {
    inner: &'a mut [u8],
    pub pos: usize,
    pub bit_buffer: u32,
    pub bits_in: u32,
}

/// A position to rewind to when a block turns out to be better off stored.
pub(crate) struct SavedOutput {
    pub pos: usize,
    pub bit_buffer: u32,
    pub bits_in: u32,
}

impl<'a> OutputBuffer<'a> {
    pub fn new(buf: &'a mut [u8], bit_buffer: u32, bits_in: u32) -> Self {
        // the cap leaves headroom so a symbol in flight never straddles the
        // buffer end
        let len = Ord::min(buf.len(), OUT_BUF_SIZE - 16);

        Self {
            inner: &mut buf[..len],
            pos: 0,
            bit_buffer,
            bits_in,
        }
    }

    pub fn put_bits(&mut self, bits: u32, len: u32) -> Result<(), BufError> {
        debug_assert!(bits <= (1u32 << len) - 1);

        self.bit_buffer |= bits << self.bits_in;
        self.bits_in += len;

        while self.bits_in >= 8 {
            match self.inner.get_mut(self.pos) {
                Some(byte) => *byte = self.bit_buffer as u8,
                None => return Err(BufError),
            }
            self.pos += 1;
            self.bit_buffer >>= 8;
            self.bits_in -= 8;
        }

        Ok(())
    }

    /// Align to a byte boundary by topping the accumulator up with zero bits.
    pub fn pad_to_bytes(&mut self) -> Result<(), BufError> {
        if self.bits_in != 0 {
            let len = 8 - self.bits_in;
            self.put_bits(0, len)?;
        }

        Ok(())
    }

    pub fn save(&self) -> SavedOutput {
        SavedOutput {
            pos: self.pos,
            bit_buffer: self.bit_buffer,
            bits_in: self.bits_in,
        }
    }

    pub fn load(&mut self, saved: SavedOutput) {
        self.pos = saved.pos;
        self.bit_buffer = saved.bit_buffer;
        self.bits_in = saved.bits_in;
    }
}
