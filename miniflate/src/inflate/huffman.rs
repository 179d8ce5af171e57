//! Canonical Huffman decode tables: a 10-bit fast lookup backed by a binary
//! tree for longer codes.

pub(crate) const MAX_HUFF_TABLES: usize = 3;
/// Literal/length alphabet size.
pub(crate) const MAX_HUFF_SYMBOLS_0: usize = 288;
/// Distance alphabet size.
pub(crate) const MAX_HUFF_SYMBOLS_1: usize = 32;
/// Maximum code length that resolves in one fast table probe.
pub(crate) const FAST_LOOKUP_BITS: u8 = 10;
pub(crate) const FAST_LOOKUP_SIZE: u32 = 1 << FAST_LOOKUP_BITS;
const MAX_HUFF_TREE_SIZE: usize = MAX_HUFF_SYMBOLS_0 * 2;

pub(crate) const LITLEN_TABLE: usize = 0;
pub(crate) const DIST_TABLE: usize = 1;
pub(crate) const HUFFLEN_TABLE: usize = 2;

/// Smallest legal number of codes in each table; the block header stores the
/// count as an offset from these.
pub(crate) const MIN_TABLE_SIZES: [u16; 3] = [257, 1, 4];

/// Order in which code-length code sizes appear in a dynamic block header.
pub(crate) const HUFFMAN_LENGTH_ORDER: [u8; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

// The length/distance base and extra-bit tables are padded to 32 entries so a
// mask can replace the bounds check; the padding values are high enough not
// to underflow a match length.
#[rustfmt::skip]
pub(crate) const LENGTH_BASE: [u16; 32] = [
    3,  4,  5,  6,  7,  8,  9,  10,  11,  13,  15,  17,  19,  23,  27,  31,
    35, 43, 51, 59, 67, 83, 99, 115, 131, 163, 195, 227, 258, 512, 512, 512
];

#[rustfmt::skip]
pub(crate) const LENGTH_EXTRA: [u8; 32] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2,
    3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0, 0, 0, 0
];

#[rustfmt::skip]
pub(crate) const DIST_BASE: [u16; 32] = [
    1,    2,    3,    4,    5,    7,      9,      13,     17,     25,    33,
    49,   65,   97,   129,  193,  257,    385,    513,    769,    1025,  1537,
    2049, 3073, 4097, 6145, 8193, 12_289, 16_385, 24_577, 32_768, 32_768
];

#[rustfmt::skip]
pub(crate) const DIST_EXTRA: [u8; 32] = [
    0, 0, 0, 0, 1, 1, 2,  2,  3,  3,  4,  4,  5,  5,  6,  6,
    7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13, 13, 13, 13
];

/// Mask for indexing the padded base/extra tables.
pub(crate) const BASE_EXTRA_MASK: usize = 32 - 1;

/// One decode table: per-symbol code lengths, the fast lookup, and the
/// overflow tree.
pub(crate) struct HuffmanTable {
    /// Length of the code for each symbol.
    pub code_size: [u8; MAX_HUFF_SYMBOLS_0],
    /// Fast lookup indexed by the low bits of the bit buffer; the symbol sits
    /// in the low 9 bits with the code length above. Negative entries point
    /// into `tree`.
    pub look_up: [i16; FAST_LOOKUP_SIZE as usize],
    /// Binary tree for codes longer than [`FAST_LOOKUP_BITS`]. Non-negative
    /// values are symbols, negative values reference other nodes.
    pub tree: [i16; MAX_HUFF_TREE_SIZE],
}

impl HuffmanTable {
    pub const fn new() -> HuffmanTable {
        HuffmanTable {
            code_size: [0; MAX_HUFF_SYMBOLS_0],
            look_up: [0; FAST_LOOKUP_SIZE as usize],
            tree: [0; MAX_HUFF_TREE_SIZE],
        }
    }

    #[inline]
    pub fn fast_lookup(&self, bit_buf: u64) -> i16 {
        self.look_up[(bit_buf & u64::from(FAST_LOOKUP_SIZE - 1)) as usize]
    }

    /// Walk the overflow tree until a symbol (non-negative value) is found.
    #[inline]
    pub fn tree_lookup(&self, fast_symbol: i32, bit_buf: u64, mut code_len: u32) -> (i32, u32) {
        let mut symbol = fast_symbol;
        loop {
            // symbol is the position of the left (0) node; the next bit
            // selects left or right
            symbol = i32::from(self.tree[(!symbol + ((bit_buf >> code_len) & 1) as i32) as usize]);
            code_len += 1;
            if symbol >= 0 {
                break;
            }
        }
        (symbol, code_len)
    }

    /// Decode a symbol and its code length from the low bits of `bit_buf`.
    /// `None` means the bits map to a zero-length (unused) code.
    #[inline]
    pub fn lookup(&self, bit_buf: u64) -> Option<(i32, u32)> {
        let symbol = i32::from(self.fast_lookup(bit_buf));
        if symbol >= 0 {
            if (symbol >> 9) as u32 != 0 {
                Some((symbol, (symbol >> 9) as u32))
            } else {
                None
            }
        } else {
            Some(self.tree_lookup(symbol, bit_buf, u32::from(FAST_LOOKUP_BITS)))
        }
    }

    /// Build the lookup structures from `code_size[..table_size]`.
    ///
    /// Returns `false` when the lengths oversubscribe the code space, or
    /// leave it incomplete with more than one code in use. Zero or one codes
    /// always pass; a lone length-1 distance code is a legal table.
    pub fn build(&mut self, table_size: usize) -> bool {
        let mut total_symbols = [0u32; 16];
        let mut next_code = [0u32; 17];
        self.look_up.fill(0);
        self.tree.fill(0);

        for &code_size in &self.code_size[..table_size] {
            total_symbols[code_size as usize] += 1;
        }

        let mut total = 0;
        for i in 1..16 {
            total += total_symbols[i];
            total <<= 1;
            next_code[i + 1] = total;
        }

        total_symbols[0] = 0;
        if total != 65_536 && total_symbols.iter().sum::<u32>() > 1 {
            return false;
        }

        let mut tree_next = -1i32;
        for symbol_index in 0..table_size {
            let code_size = self.code_size[symbol_index];
            if code_size == 0 {
                continue;
            }

            let cur_code = next_code[code_size as usize];
            next_code[code_size as usize] += 1;

            let n = cur_code & (u32::MAX >> (32 - code_size));
            let mut rev_code = n.reverse_bits() >> (32 - code_size);

            if code_size <= FAST_LOOKUP_BITS {
                let k = (i16::from(code_size) << 9) | symbol_index as i16;
                while rev_code < FAST_LOOKUP_SIZE {
                    self.look_up[rev_code as usize] = k;
                    rev_code += 1 << code_size;
                }
                continue;
            }

            let mut tree_cur = self.look_up[(rev_code & (FAST_LOOKUP_SIZE - 1)) as usize];
            if tree_cur == 0 {
                self.look_up[(rev_code & (FAST_LOOKUP_SIZE - 1)) as usize] = tree_next as i16;
                tree_cur = tree_next as i16;
                tree_next -= 2;
            }

            rev_code >>= FAST_LOOKUP_BITS - 1;
            for _ in FAST_LOOKUP_BITS + 1..code_size {
                rev_code >>= 1;
                tree_cur -= (rev_code & 1) as i16;
                if self.tree[(-tree_cur - 1) as usize] == 0 {
                    self.tree[(-tree_cur - 1) as usize] = tree_next as i16;
                    tree_cur = tree_next as i16;
                    tree_next -= 2;
                } else {
                    tree_cur = self.tree[(-tree_cur - 1) as usize];
                }
            }

            rev_code >>= 1;
            tree_cur -= (rev_code & 1) as i16;
            self.tree[(-tree_cur - 1) as usize] = symbol_index as i16;
        }

        true
    }
}
