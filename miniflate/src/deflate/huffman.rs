//! Per-block Huffman code construction and symbol emission for the
//! compressor.
//!
//! Code lengths come from an in-place minimum-redundancy pass over the
//! frequency-sorted symbols, clamped to deflate's 15-bit limit (7 bits for the
//! code-length alphabet) and turned into canonical codes stored bit-reversed,
//! ready for LSB-first emission.

use crate::deflate::output::{BufError, OutputBuffer};

pub(crate) const MAX_HUFF_TABLES: usize = 3;
/// Literal/length alphabet size.
pub(crate) const MAX_HUFF_SYMBOLS_0: usize = 288;
/// Distance alphabet size.
pub(crate) const MAX_HUFF_SYMBOLS_1: usize = 32;
/// Code-length alphabet size.
pub(crate) const MAX_HUFF_SYMBOLS_2: usize = 19;
pub(crate) const MAX_HUFF_SYMBOLS: usize = 288;

pub(crate) const LITLEN_TABLE: usize = 0;
pub(crate) const DIST_TABLE: usize = 1;
pub(crate) const HUFFLEN_TABLE: usize = 2;

const MAX_SUPPORTED_HUFF_CODE_SIZE: usize = 32;

/// Order in which code-length code sizes appear in a dynamic block header.
const CODE_SIZE_SYMS_SWIZZLE: [u8; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

pub(crate) const BITMASKS: [u32; 17] = {
    let mut masks = [0u32; 17];
    let mut i = 0;
    while i < 17 {
        masks[i] = (1 << i) - 1;
        i += 1;
    }
    masks
};

const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12_289, 16_385, 24_577,
];

const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Literal/length symbol for each `match_len - 3`. Length 258 gets the
/// dedicated symbol 285 rather than the extra-bits form of code 27, so it is
/// filled last and overrides.
pub(crate) const LEN_SYM: [u16; 256] = {
    let mut table = [0u16; 256];
    let mut code = 0;
    while code < 29 {
        let base = (LENGTH_BASE[code] - 3) as usize;
        let count = if code == 28 { 1 } else { 1 << LENGTH_EXTRA[code] };
        let mut i = 0;
        while i < count && base + i < 256 {
            table[base + i] = 257 + code as u16;
            i += 1;
        }
        code += 1;
    }
    table
};

/// Number of extra length bits for each `match_len - 3`.
pub(crate) const LEN_EXTRA: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut code = 0;
    while code < 29 {
        let base = (LENGTH_BASE[code] - 3) as usize;
        let count = if code == 28 { 1 } else { 1 << LENGTH_EXTRA[code] };
        let mut i = 0;
        while i < count && base + i < 256 {
            table[base + i] = LENGTH_EXTRA[code];
            i += 1;
        }
        code += 1;
    }
    table
};

/// Distance symbol for each `dist - 1` below 512.
pub(crate) const SMALL_DIST_SYM: [u8; 512] = {
    let mut table = [0u8; 512];
    let mut sym = 0;
    while sym < 18 {
        let start = (DIST_BASE[sym] - 1) as usize;
        let end = start + (1 << DIST_EXTRA[sym]);
        let mut d = start;
        while d < end && d < 512 {
            table[d] = sym as u8;
            d += 1;
        }
        sym += 1;
    }
    table
};

pub(crate) const SMALL_DIST_EXTRA: [u8; 512] = {
    let mut table = [0u8; 512];
    let mut d = 0;
    while d < 512 {
        table[d] = DIST_EXTRA[SMALL_DIST_SYM[d] as usize];
        d += 1;
    }
    table
};

/// Distance symbol for each `(dist - 1) >> 8` at distances of 512 and above.
/// The code ranges up there are 256-aligned, so the low byte never matters.
pub(crate) const LARGE_DIST_SYM: [u8; 128] = {
    let mut table = [0u8; 128];
    let mut sym = 18;
    while sym < 30 {
        let start = (DIST_BASE[sym] - 1) as usize >> 8;
        let end = (DIST_BASE[sym] as usize - 1 + (1 << DIST_EXTRA[sym])) >> 8;
        let mut i = start;
        while i < end && i < 128 {
            table[i] = sym as u8;
            i += 1;
        }
        sym += 1;
    }
    table
};

pub(crate) const LARGE_DIST_EXTRA: [u8; 128] = {
    let mut table = [0u8; 128];
    let mut i = 2;
    while i < 128 {
        table[i] = DIST_EXTRA[LARGE_DIST_SYM[i] as usize];
        i += 1;
    }
    table
};

#[derive(Copy, Clone, Default)]
struct SymFreq {
    key: u16,
    sym_index: u16,
}

/// Two-pass radix sort of the used symbols by frequency. Skips the high pass
/// when every frequency fits in the low byte.
fn radix_sort_symbols<'a>(
    symbols0: &'a mut [SymFreq],
    symbols1: &'a mut [SymFreq],
) -> &'a mut [SymFreq] {
    let mut hist = [[0; 256]; 2];

    for freq in symbols0.iter() {
        hist[0][(freq.key & 0xFF) as usize] += 1;
        hist[1][((freq.key >> 8) & 0xFF) as usize] += 1;
    }

    let mut n_passes = 2;
    if symbols0.len() == hist[1][0] {
        n_passes -= 1;
    }

    let mut current_symbols = symbols0;
    let mut new_symbols = symbols1;

    for (pass, hist_item) in hist.iter().enumerate().take(n_passes) {
        let mut offsets = [0; 256];
        let mut offset = 0;
        for i in 0..256 {
            offsets[i] = offset;
            offset += hist_item[i];
        }

        for sym in current_symbols.iter() {
            let j = ((sym.key >> (pass * 8)) & 0xFF) as usize;
            new_symbols[offsets[j]] = *sym;
            offsets[j] += 1;
        }

        core::mem::swap(&mut current_symbols, &mut new_symbols);
    }

    current_symbols
}

/// Moffat in-place minimum-redundancy code length calculation over the
/// frequency-sorted symbol list. On return each key holds the code depth.
fn calculate_minimum_redundancy(symbols: &mut [SymFreq]) {
    match symbols.len() {
        0 => (),
        1 => symbols[0].key = 1,
        n => {
            symbols[0].key += symbols[1].key;
            let mut root = 0;
            let mut leaf = 2;
            for next in 1..n - 1 {
                if (leaf >= n) || (symbols[root].key < symbols[leaf].key) {
                    symbols[next].key = symbols[root].key;
                    symbols[root].key = next as u16;
                    root += 1;
                } else {
                    symbols[next].key = symbols[leaf].key;
                    leaf += 1;
                }

                if (leaf >= n) || (root < next && symbols[root].key < symbols[leaf].key) {
                    symbols[next].key = symbols[next].key.wrapping_add(symbols[root].key);
                    symbols[root].key = next as u16;
                    root += 1;
                } else {
                    symbols[next].key = symbols[next].key.wrapping_add(symbols[leaf].key);
                    leaf += 1;
                }
            }

            symbols[n - 2].key = 0;
            for next in (0..n - 2).rev() {
                symbols[next].key = symbols[symbols[next].key as usize].key + 1;
            }

            let mut avbl = 1;
            let mut used = 0;
            let mut dpth = 0;
            let mut root = (n - 2) as i32;
            let mut next = (n - 1) as i32;
            while avbl > 0 {
                while (root >= 0) && (symbols[root as usize].key == dpth) {
                    used += 1;
                    root -= 1;
                }
                while avbl > used {
                    symbols[next as usize].key = dpth;
                    next -= 1;
                    avbl -= 1;
                }
                avbl = 2 * used;
                dpth += 1;
                used = 0;
            }
        }
    }
}

/// Kraft fixup: squash any code deeper than `max_code_size` and re-balance the
/// depth histogram until the lengths form a valid prefix code again.
fn enforce_max_code_size(num_codes: &mut [i32], code_list_len: usize, max_code_size: usize) {
    if code_list_len <= 1 {
        return;
    }

    num_codes[max_code_size] += num_codes[max_code_size + 1..].iter().sum::<i32>();
    let total = num_codes[1..=max_code_size]
        .iter()
        .rev()
        .enumerate()
        .fold(0u32, |total, (i, &x)| total + ((x as u32) << i));

    for _ in (1 << max_code_size)..total {
        num_codes[max_code_size] -= 1;
        for i in (1..max_code_size).rev() {
            if num_codes[i] != 0 {
                num_codes[i] -= 1;
                num_codes[i + 1] += 2;
                break;
            }
        }
    }
}

/// Frequency counts, canonical codes, and code lengths for the three deflate
/// alphabets of the block under construction.
pub(crate) struct HuffmanEncoder {
    pub count: [[u16; MAX_HUFF_SYMBOLS]; MAX_HUFF_TABLES],
    pub codes: [[u16; MAX_HUFF_SYMBOLS]; MAX_HUFF_TABLES],
    pub code_sizes: [[u8; MAX_HUFF_SYMBOLS]; MAX_HUFF_TABLES],
}

impl HuffmanEncoder {
    pub fn new() -> Self {
        Self {
            count: [[0; MAX_HUFF_SYMBOLS]; MAX_HUFF_TABLES],
            codes: [[0; MAX_HUFF_SYMBOLS]; MAX_HUFF_TABLES],
            code_sizes: [[0; MAX_HUFF_SYMBOLS]; MAX_HUFF_TABLES],
        }
    }

    pub fn reset_block_counts(&mut self) {
        self.count[LITLEN_TABLE][..MAX_HUFF_SYMBOLS_0].fill(0);
        self.count[DIST_TABLE][..MAX_HUFF_SYMBOLS_1].fill(0);
    }

    /// Build the codes for one table, either from the static lengths already
    /// in `code_sizes` or optimally from the gathered frequencies.
    fn optimize_table(
        &mut self,
        table_num: usize,
        table_len: usize,
        code_size_limit: usize,
        static_table: bool,
    ) {
        let mut num_codes = [0i32; MAX_SUPPORTED_HUFF_CODE_SIZE + 1];
        let mut next_code = [0u32; MAX_SUPPORTED_HUFF_CODE_SIZE + 1];

        if static_table {
            for &code_size in &self.code_sizes[table_num][..table_len] {
                num_codes[code_size as usize] += 1;
            }
        } else {
            let mut symbols0 = [SymFreq::default(); MAX_HUFF_SYMBOLS];
            let mut symbols1 = [SymFreq::default(); MAX_HUFF_SYMBOLS];

            let mut num_used_symbols = 0;
            for i in 0..table_len {
                if self.count[table_num][i] != 0 {
                    symbols0[num_used_symbols] = SymFreq {
                        key: self.count[table_num][i],
                        sym_index: i as u16,
                    };
                    num_used_symbols += 1;
                }
            }

            let symbols = radix_sort_symbols(
                &mut symbols0[..num_used_symbols],
                &mut symbols1[..num_used_symbols],
            );
            calculate_minimum_redundancy(symbols);

            for symbol in symbols.iter() {
                num_codes[symbol.key as usize] += 1;
            }

            enforce_max_code_size(&mut num_codes, num_used_symbols, code_size_limit);

            self.code_sizes[table_num].fill(0);
            self.codes[table_num].fill(0);

            let mut last = num_used_symbols;
            for (i, &count) in num_codes.iter().enumerate().take(code_size_limit + 1).skip(1) {
                let first = last - count as usize;
                for symbol in &symbols[first..last] {
                    self.code_sizes[table_num][symbol.sym_index as usize] = i as u8;
                }
                last = first;
            }
        }

        let mut j = 0;
        next_code[1] = 0;
        for i in 2..=code_size_limit {
            j = (j + num_codes[i - 1]) << 1;
            next_code[i] = j as u32;
        }

        for (&code_size, huff_code) in self.code_sizes[table_num]
            .iter()
            .take(table_len)
            .zip(self.codes[table_num].iter_mut().take(table_len))
        {
            if code_size == 0 {
                continue;
            }

            let code = next_code[code_size as usize];
            next_code[code_size as usize] += 1;

            // canonical codes are stored bit-reversed for LSB-first emission
            *huff_code = (code.reverse_bits() >> (32 - code_size)) as u16;
        }
    }

    /// Write a dynamic block header: optimal litlen/dist codes, their lengths
    /// run-length packed and themselves Huffman coded.
    fn start_dynamic_block(&mut self, output: &mut OutputBuffer) -> Result<(), BufError> {
        // the end-of-block symbol must always have a code
        self.count[LITLEN_TABLE][256] = 1;

        self.optimize_table(LITLEN_TABLE, MAX_HUFF_SYMBOLS_0, 15, false);
        self.optimize_table(DIST_TABLE, MAX_HUFF_SYMBOLS_1, 15, false);

        let num_lit_codes = 286
            - self.code_sizes[LITLEN_TABLE][257..286]
                .iter()
                .rev()
                .take_while(|&&x| x == 0)
                .count();

        let num_dist_codes = 30
            - self.code_sizes[DIST_TABLE][1..30]
                .iter()
                .rev()
                .take_while(|&&x| x == 0)
                .count();

        let mut code_sizes_to_pack = [0u8; MAX_HUFF_SYMBOLS_0 + MAX_HUFF_SYMBOLS_1];
        let mut packed_code_sizes = [0u8; MAX_HUFF_SYMBOLS_0 + MAX_HUFF_SYMBOLS_1];

        let total_code_sizes_to_pack = num_lit_codes + num_dist_codes;

        code_sizes_to_pack[..num_lit_codes]
            .copy_from_slice(&self.code_sizes[LITLEN_TABLE][..num_lit_codes]);

        code_sizes_to_pack[num_lit_codes..total_code_sizes_to_pack]
            .copy_from_slice(&self.code_sizes[DIST_TABLE][..num_dist_codes]);

        let mut rle = CodeSizeRle::default();
        self.count[HUFFLEN_TABLE][..MAX_HUFF_SYMBOLS_2].fill(0);

        let mut packed_pos = 0;
        for &code_size in &code_sizes_to_pack[..total_code_sizes_to_pack] {
            if code_size == 0 {
                rle.flush_repeats(self, &mut packed_code_sizes, &mut packed_pos);
                rle.z_count += 1;
                if rle.z_count == 138 {
                    rle.flush_zeros(self, &mut packed_code_sizes, &mut packed_pos);
                }
            } else {
                rle.flush_zeros(self, &mut packed_code_sizes, &mut packed_pos);
                if code_size != rle.prev_code_size {
                    rle.flush_repeats(self, &mut packed_code_sizes, &mut packed_pos);
                    self.count[HUFFLEN_TABLE][code_size as usize] += 1;
                    packed_code_sizes[packed_pos] = code_size;
                    packed_pos += 1;
                } else {
                    rle.repeat_count += 1;
                    if rle.repeat_count == 6 {
                        rle.flush_repeats(self, &mut packed_code_sizes, &mut packed_pos);
                    }
                }
            }
            rle.prev_code_size = code_size;
        }

        if rle.repeat_count != 0 {
            rle.flush_repeats(self, &mut packed_code_sizes, &mut packed_pos);
        } else {
            rle.flush_zeros(self, &mut packed_code_sizes, &mut packed_pos);
        }

        self.optimize_table(HUFFLEN_TABLE, MAX_HUFF_SYMBOLS_2, 7, false);

        output.put_bits(2, 2)?;

        output.put_bits((num_lit_codes - 257) as u32, 5)?;
        output.put_bits((num_dist_codes - 1) as u32, 5)?;

        let mut num_bit_lengths = 18
            - CODE_SIZE_SYMS_SWIZZLE
                .iter()
                .rev()
                .take_while(|&&swizzle| self.code_sizes[HUFFLEN_TABLE][swizzle as usize] == 0)
                .count();

        num_bit_lengths = core::cmp::max(4, num_bit_lengths + 1);
        output.put_bits(num_bit_lengths as u32 - 4, 4)?;
        for &swizzle in &CODE_SIZE_SYMS_SWIZZLE[..num_bit_lengths] {
            output.put_bits(
                u32::from(self.code_sizes[HUFFLEN_TABLE][swizzle as usize]),
                3,
            )?;
        }

        let mut i = 0;
        while i < packed_pos {
            let code = packed_code_sizes[i] as usize;
            i += 1;
            debug_assert!(code < MAX_HUFF_SYMBOLS_2);
            output.put_bits(
                u32::from(self.codes[HUFFLEN_TABLE][code]),
                u32::from(self.code_sizes[HUFFLEN_TABLE][code]),
            )?;
            if code >= 16 {
                output.put_bits(u32::from(packed_code_sizes[i]), [2, 3, 7][code - 16])?;
                i += 1;
            }
        }

        Ok(())
    }

    /// Write a static block header and install the fixed RFC 1951 tables.
    fn start_static_block(&mut self, output: &mut OutputBuffer) -> Result<(), BufError> {
        self.code_sizes[LITLEN_TABLE][0..144].fill(8);
        self.code_sizes[LITLEN_TABLE][144..256].fill(9);
        self.code_sizes[LITLEN_TABLE][256..280].fill(7);
        self.code_sizes[LITLEN_TABLE][280..288].fill(8);

        self.code_sizes[DIST_TABLE][..32].fill(5);

        self.optimize_table(LITLEN_TABLE, 288, 15, true);
        self.optimize_table(DIST_TABLE, 32, 15, true);

        output.put_bits(1, 2)
    }

    /// Emit every buffered LZ symbol against the current code tables, then the
    /// end-of-block symbol.
    fn compress_lz_codes(
        &self,
        output: &mut OutputBuffer,
        lz_code_buf: &[u8],
    ) -> Result<bool, BufError> {
        let mut flags = 1u32;

        let mut i = 0;
        while i < lz_code_buf.len() {
            if flags == 1 {
                flags = u32::from(lz_code_buf[i]) | 0x100;
                i += 1;
            }

            if flags & 1 == 1 {
                let match_len = lz_code_buf[i] as usize;
                let match_dist =
                    lz_code_buf[i + 1] as usize | ((lz_code_buf[i + 2] as usize) << 8);
                i += 3;

                let len_sym = LEN_SYM[match_len] as usize;
                debug_assert!(self.code_sizes[LITLEN_TABLE][len_sym] != 0);
                output.put_bits(
                    u32::from(self.codes[LITLEN_TABLE][len_sym]),
                    u32::from(self.code_sizes[LITLEN_TABLE][len_sym]),
                )?;
                output.put_bits(
                    match_len as u32 & BITMASKS[LEN_EXTRA[match_len] as usize],
                    u32::from(LEN_EXTRA[match_len]),
                )?;

                let (sym, num_extra_bits) = if match_dist < 512 {
                    (
                        SMALL_DIST_SYM[match_dist] as usize,
                        SMALL_DIST_EXTRA[match_dist] as usize,
                    )
                } else {
                    (
                        LARGE_DIST_SYM[match_dist >> 8] as usize,
                        LARGE_DIST_EXTRA[match_dist >> 8] as usize,
                    )
                };

                debug_assert!(self.code_sizes[DIST_TABLE][sym] != 0);
                output.put_bits(
                    u32::from(self.codes[DIST_TABLE][sym]),
                    u32::from(self.code_sizes[DIST_TABLE][sym]),
                )?;
                output.put_bits(
                    match_dist as u32 & BITMASKS[num_extra_bits],
                    num_extra_bits as u32,
                )?;
            } else {
                let lit = lz_code_buf[i] as usize;
                i += 1;

                debug_assert!(self.code_sizes[LITLEN_TABLE][lit] != 0);
                output.put_bits(
                    u32::from(self.codes[LITLEN_TABLE][lit]),
                    u32::from(self.code_sizes[LITLEN_TABLE][lit]),
                )?;
            }

            flags >>= 1;
        }

        output.put_bits(
            u32::from(self.codes[LITLEN_TABLE][256]),
            u32::from(self.code_sizes[LITLEN_TABLE][256]),
        )?;

        Ok(true)
    }

    /// Write a complete Huffman block (header + coded symbols) for the given
    /// LZ buffer.
    pub fn compress_block(
        &mut self,
        output: &mut OutputBuffer,
        lz_code_buf: &[u8],
        static_block: bool,
    ) -> Result<bool, BufError> {
        if static_block {
            self.start_static_block(output)?;
        } else {
            self.start_dynamic_block(output)?;
        }

        self.compress_lz_codes(output, lz_code_buf)
    }
}

/// Run-length state for packing code lengths into the 16/17/18 repeat codes of
/// a dynamic header.
struct CodeSizeRle {
    z_count: u32,
    repeat_count: u32,
    prev_code_size: u8,
}

impl CodeSizeRle {
    fn flush_repeats(&mut self, h: &mut HuffmanEncoder, packed: &mut [u8], pos: &mut usize) {
        if self.repeat_count != 0 {
            if self.repeat_count < 3 {
                h.count[HUFFLEN_TABLE][self.prev_code_size as usize] += self.repeat_count as u16;
                while self.repeat_count != 0 {
                    self.repeat_count -= 1;
                    packed[*pos] = self.prev_code_size;
                    *pos += 1;
                }
            } else {
                h.count[HUFFLEN_TABLE][16] += 1;
                packed[*pos] = 16;
                packed[*pos + 1] = (self.repeat_count - 3) as u8;
                *pos += 2;
            }
            self.repeat_count = 0;
        }
    }

    fn flush_zeros(&mut self, h: &mut HuffmanEncoder, packed: &mut [u8], pos: &mut usize) {
        if self.z_count != 0 {
            if self.z_count < 3 {
                h.count[HUFFLEN_TABLE][0] += self.z_count as u16;
                while self.z_count != 0 {
                    self.z_count -= 1;
                    packed[*pos] = 0;
                    *pos += 1;
                }
            } else if self.z_count <= 10 {
                h.count[HUFFLEN_TABLE][17] += 1;
                packed[*pos] = 17;
                packed[*pos + 1] = (self.z_count - 3) as u8;
                *pos += 2;
            } else {
                h.count[HUFFLEN_TABLE][18] += 1;
                packed[*pos] = 18;
                packed[*pos + 1] = (self.z_count - 11) as u8;
                *pos += 2;
            }
            self.z_count = 0;
        }
    }
}

impl Default for CodeSizeRle {
    fn default() -> Self {
        Self {
            z_count: 0,
            repeat_count: 0,
            prev_code_size: 0xFF,
        }
    }
}
