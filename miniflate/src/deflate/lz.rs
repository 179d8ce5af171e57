use alloc::boxed::Box;

/// Size of the buffer of LZ77-coded symbols awaiting Huffman emission.
pub(crate) const LZ_CODE_BUF_SIZE: usize = 64 * 1024;

/// Buffer of LZ77 symbols for the block under construction.
///
/// The wire-ish layout matches what the block encoder consumes: a flag byte
/// covering the next 8 symbols (bit set = match, clear = literal), followed by
/// the symbols themselves. A literal is 1 byte; a match is 3 bytes (length - 3,
/// then the distance - 1 as a little-endian u16).
pub(crate) struct LzBuffer {
    codes: Box<[u8; LZ_CODE_BUF_SIZE]>,
    pub code_position: usize,
    pub flag_position: usize,

    /// Number of input bytes the buffered symbols cover, used to decide when a
    /// block is better off stored and when to force a block flush.
    pub total_bytes: u32,
    pub num_flags_left: u32,
}

impl LzBuffer {
    pub fn new() -> Self {
        Self {
            codes: alloc::vec![0u8; LZ_CODE_BUF_SIZE]
                .into_boxed_slice()
                .try_into()
                .unwrap_or_else(|_| unreachable!()),
            // position 0 is reserved for the first flag byte
            code_position: 1,
            flag_position: 0,
            total_bytes: 0,
            num_flags_left: 8,
        }
    }

    /// The coded symbols accumulated so far, flag bytes included.
    pub fn codes_slice(&self) -> &[u8] {
        &self.codes[..self.code_position]
    }

    pub fn write_code(&mut self, val: u8) {
        self.codes[self.code_position] = val;
        self.code_position += 1;
    }

    /// Finalize the trailing flag byte before the block is encoded.
    ///
    /// A partially filled flag byte still has its valid bits at the top, so it
    /// is shifted down; a completely unused one is dropped instead.
    pub fn init_flag(&mut self) {
        if self.num_flags_left == 8 {
            *self.get_flag() = 0;
            self.code_position -= 1;
        } else {
            *self.get_flag() >>= self.num_flags_left;
        }
    }

    pub fn get_flag(&mut self) -> &mut u8 {
        &mut self.codes[self.flag_position]
    }

    pub fn plant_flag(&mut self) {
        self.flag_position = self.code_position;
        self.code_position += 1;
    }

    pub fn consume_flag(&mut self) {
        self.num_flags_left -= 1;
        if self.num_flags_left == 0 {
            self.num_flags_left = 8;
            self.plant_flag();
        }
    }

    pub fn reset(&mut self) {
        self.code_position = 1;
        self.flag_position = 0;
        self.num_flags_left = 8;
        self.total_bytes = 0;
    }
}
