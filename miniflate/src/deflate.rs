//! Streaming compressor producing raw deflate or zlib-wrapped output.
//!
//! The session object owns all persistent state (dictionary, symbol buffer,
//! Huffman counts, staged output) so a stream can be fed in arbitrary chunks.
//! Compressed bytes are staged into an internal buffer one block at a time and
//! drained into the caller's output slice; when the slice fills mid-drain the
//! leftover is carried to the next call.

mod dictionary;
mod huffman;
mod lz;
mod output;

use alloc::boxed::Box;

use crate::deflate::dictionary::{
    Dictionary, LZ_DICT_SIZE, LZ_DICT_SIZE_MASK, MAX_MATCH_LEN, MIN_MATCH_LEN,
};
use crate::deflate::huffman::{HuffmanEncoder, LARGE_DIST_SYM, LEN_SYM, SMALL_DIST_SYM};
use crate::deflate::lz::{LzBuffer, LZ_CODE_BUF_SIZE};
use crate::deflate::output::{BufError, OutputBuffer};
use crate::{trace, Flush};

/// Size of the internal staging buffer; big enough that one maximally bad
/// block (every symbol a 9-bit literal plus headers) always fits.
pub(crate) const OUT_BUF_SIZE: usize = (LZ_CODE_BUF_SIZE * 13) / 10;

/// Bit flags accepted by [`Compressor::new`]. The low 12 bits set the match
/// probe budget; zero probes means Huffman-only coding.
pub mod deflate_flags {
    /// Emit a zlib (RFC 1950) header and Adler-32 trailer around the deflate
    /// stream.
    pub const WRITE_ZLIB_HEADER: u32 = 0x0000_1000;

    /// Keep a running Adler-32 of the input even without the zlib wrapper.
    pub const COMPUTE_ADLER32: u32 = 0x0000_2000;

    /// Take every match immediately instead of deferring one position.
    pub const GREEDY_PARSING: u32 = 0x0000_4000;

    /// Accepted for layout compatibility; the engine is always deterministic.
    pub const NONDETERMINISTIC_PARSING: u32 = 0x0000_8000;

    /// Only look for distance-1 matches (run-length encoding).
    pub const RLE_MATCHES: u32 = 0x0001_0000;

    /// Discard matches of 5 bytes or shorter.
    pub const FILTER_MATCHES: u32 = 0x0002_0000;

    /// Disable dynamic Huffman tables.
    pub const FORCE_ALL_STATIC_BLOCKS: u32 = 0x0004_0000;

    /// Emit stored blocks only.
    pub const FORCE_ALL_RAW_BLOCKS: u32 = 0x0008_0000;

    pub(crate) const MAX_PROBES_MASK: u32 = 0xFFF;
}

use deflate_flags::*;

/// Probe budget per compression level 0..=10.
pub const NUM_PROBES: [u16; 11] = [0, 1, 6, 32, 16, 32, 128, 256, 512, 768, 1500];

const DEFAULT_LEVEL: i32 = 6;

/// Return status of [`Compressor::compress`].
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeflateStatus {
    /// Broken call sequencing: a finished or failed stream was given more
    /// work, or a finish in progress was downgraded.
    BadParam = -2,
    /// The staged block overflowed the internal output buffer.
    PutBufFailed = -1,
    Ok = 0,
    /// The stream is terminated and fully drained.
    Done = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "__internal-fuzz", derive(arbitrary::Arbitrary))]
#[repr(i32)]
pub enum Strategy {
    #[default]
    Default = 0,
    Filtered = 1,
    HuffmanOnly = 2,
    Rle = 3,
    Fixed = 4,
}

impl TryFrom<i32> for Strategy {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Strategy::Default),
            1 => Ok(Strategy::Filtered),
            2 => Ok(Strategy::HuffmanOnly),
            3 => Ok(Strategy::Rle),
            4 => Ok(Strategy::Fixed),
            _ => Err(()),
        }
    }
}

/// zlib-style compression parameters, lowered to the engine flag word by
/// [`CompressionConfig::comp_flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "__internal-fuzz", derive(arbitrary::Arbitrary))]
pub struct CompressionConfig {
    /// 0..=10; 0 selects stored blocks only.
    pub level: i32,
    /// Positive for zlib-wrapped output, non-positive for raw deflate.
    pub window_bits: i32,
    pub strategy: Strategy,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            window_bits: 15,
            strategy: Strategy::Default,
        }
    }
}

#[cfg(any(test, feature = "__internal-test"))]
impl quickcheck::Arbitrary for CompressionConfig {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let levels: alloc::vec::Vec<_> = (0..=10).collect();

        Self {
            level: *g.choose(&levels).unwrap(),
            window_bits: *g.choose(&[-15, 15]).unwrap(),
            strategy: *g
                .choose(&[
                    Strategy::Default,
                    Strategy::Filtered,
                    Strategy::HuffmanOnly,
                    Strategy::Rle,
                    Strategy::Fixed,
                ])
                .unwrap(),
        }
    }
}

impl CompressionConfig {
    pub fn new(level: i32) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Lower the zlib-style parameters to the engine flag word.
    pub fn comp_flags(self) -> u32 {
        let num_probes = if self.level >= 0 {
            Ord::min(10, self.level)
        } else {
            DEFAULT_LEVEL
        } as usize;

        let greedy = if self.level <= 3 { GREEDY_PARSING } else { 0 };
        let mut comp_flags = u32::from(NUM_PROBES[num_probes]) | greedy;

        if self.window_bits > 0 {
            comp_flags |= WRITE_ZLIB_HEADER;
        }

        if self.level == 0 {
            comp_flags |= FORCE_ALL_RAW_BLOCKS;
        } else {
            match self.strategy {
                Strategy::Default => {}
                Strategy::Filtered => comp_flags |= FILTER_MATCHES,
                Strategy::HuffmanOnly => comp_flags &= !MAX_PROBES_MASK,
                Strategy::Rle => comp_flags |= RLE_MATCHES,
                Strategy::Fixed => comp_flags |= FORCE_ALL_STATIC_BLOCKS,
            }
        }

        comp_flags
    }
}

/// The CMF/FLG pair must be divisible by this to be valid.
const FCHECK_DIVISOR: u32 = 31;

/// RFC 1950 header for the given flag word: deflate method, 32 KiB window,
/// FLEVEL from the probe budget, FCHECK filled in.
fn zlib_header(flags: u32) -> [u8; 2] {
    // CM = 8 (deflate), CINFO = 7 (32 KiB window)
    let cmf = 0x78u8;

    let num_probes = flags & MAX_PROBES_MASK;
    let level: u8 = if flags & GREEDY_PARSING != 0 {
        if num_probes <= 1 {
            0
        } else {
            1
        }
    } else if num_probes >= u32::from(NUM_PROBES[9]) {
        3
    } else {
        2
    };

    let flg = u32::from(level) << 6;
    let rem = (u32::from(cmf) * 256 + flg) % FCHECK_DIVISOR;
    let flg = (flg + (FCHECK_DIVISOR - rem)) as u8;

    [cmf, flg]
}

/// A deflate compression session.
pub struct Compressor {
    flags: u32,
    greedy_parsing: bool,
    adler32: u32,

    dict: Dictionary,
    lz: LzBuffer,
    huff: Box<HuffmanEncoder>,

    /// Staging area for the block being flushed; drained into the caller's
    /// output slice, possibly across calls.
    output_buf: Box<[u8; OUT_BUF_SIZE]>,
    output_flush_ofs: u32,
    output_flush_remaining: u32,

    /// Residual bits of the staged stream, carried between blocks.
    bit_buffer: u32,
    bits_in: u32,

    /// Deferred match from lazy parsing, pending the next position's result.
    saved_match_dist: u32,
    saved_match_len: u32,
    saved_lit: u8,

    finished: bool,
    block_index: u32,
    flush: Flush,
    prev_return_status: DeflateStatus,
}

impl Compressor {
    pub fn new(flags: u32) -> Self {
        Self {
            flags,
            greedy_parsing: flags & GREEDY_PARSING != 0,
            adler32: crate::ADLER32_INITIAL_VALUE,
            dict: Dictionary::new(flags),
            lz: LzBuffer::new(),
            huff: Box::new(HuffmanEncoder::new()),
            output_buf: alloc::vec![0u8; OUT_BUF_SIZE]
                .into_boxed_slice()
                .try_into()
                .unwrap_or_else(|_| unreachable!()),
            output_flush_ofs: 0,
            output_flush_remaining: 0,
            bit_buffer: 0,
            bits_in: 0,
            saved_match_dist: 0,
            saved_match_len: 0,
            saved_lit: 0,
            finished: false,
            block_index: 0,
            flush: Flush::NoFlush,
            prev_return_status: DeflateStatus::Ok,
        }
    }

    pub fn with_config(config: CompressionConfig) -> Self {
        Self::new(config.comp_flags())
    }

    /// Make the session ready for a new stream, keeping its allocations.
    pub fn reset(&mut self) {
        self.adler32 = crate::ADLER32_INITIAL_VALUE;
        self.dict.reset_hash();
        self.dict.code_buf_dict_pos = 0;
        self.dict.lookahead_size = 0;
        self.dict.lookahead_pos = 0;
        self.lz.reset();
        self.huff.reset_block_counts();
        self.output_flush_ofs = 0;
        self.output_flush_remaining = 0;
        self.bit_buffer = 0;
        self.bits_in = 0;
        self.saved_match_dist = 0;
        self.saved_match_len = 0;
        self.saved_lit = 0;
        self.finished = false;
        self.block_index = 0;
        self.flush = Flush::NoFlush;
        self.prev_return_status = DeflateStatus::Ok;
    }

    /// The running Adler-32 of the input consumed so far. Only maintained
    /// when the zlib-header or compute-adler flags are set.
    pub fn adler32(&self) -> u32 {
        self.adler32
    }

    pub fn prev_return_status(&self) -> DeflateStatus {
        self.prev_return_status
    }

    /// Consume input and produce compressed output, resumable on both sides.
    ///
    /// Returns the status together with the number of input bytes consumed
    /// and output bytes written. `Done` is returned once a `Finish` stream is
    /// fully drained into the caller's buffers; further calls are `BadParam`.
    pub fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: Flush,
    ) -> (DeflateStatus, usize, usize) {
        let mut src_pos = 0;
        let mut out_ofs = 0;

        let prev_ok = self.prev_return_status == DeflateStatus::Ok;
        let finish_in_progress = self.flush == Flush::Finish && flush != Flush::Finish;
        self.flush = flush;

        if !prev_ok || finish_in_progress {
            self.prev_return_status = DeflateStatus::BadParam;
            return (DeflateStatus::BadParam, 0, 0);
        }

        if self.output_flush_remaining != 0 || self.finished {
            let status = self.flush_output(output, &mut out_ofs);
            self.prev_return_status = status;
            return (status, 0, out_ofs);
        }

        if !self.compress_normal(input, &mut src_pos, output, &mut out_ofs) {
            return (self.prev_return_status, src_pos, out_ofs);
        }

        if self.flags & (WRITE_ZLIB_HEADER | COMPUTE_ADLER32) != 0 {
            self.adler32 = crate::adler32(self.adler32, &input[..src_pos]);
        }

        let remaining = src_pos < input.len() || self.output_flush_remaining != 0;
        if flush != Flush::NoFlush && self.dict.lookahead_size == 0 && !remaining {
            match self.flush_block(flush, output, &mut out_ofs) {
                Err(BufError) => {
                    self.prev_return_status = DeflateStatus::PutBufFailed;
                    return (DeflateStatus::PutBufFailed, src_pos, out_ofs);
                }
                Ok(_) => {
                    self.finished = flush == Flush::Finish;
                    if flush == Flush::FullFlush {
                        self.dict.reset_hash();
                    }
                }
            }
        }

        let status = if self.finished && self.output_flush_remaining == 0 {
            DeflateStatus::Done
        } else {
            DeflateStatus::Ok
        };
        self.prev_return_status = status;

        (status, src_pos, out_ofs)
    }

    /// The block-building loop: slide input into the dictionary, pick matches
    /// or literals, and flush a block when the symbol buffer fills up or
    /// enough raw bytes are pending.
    fn compress_normal(
        &mut self,
        input: &[u8],
        src_pos: &mut usize,
        output: &mut [u8],
        out_ofs: &mut usize,
    ) -> bool {
        let mut lookahead_size = self.dict.lookahead_size;
        let mut lookahead_pos = self.dict.lookahead_pos;
        let mut saved_lit = self.saved_lit;
        let mut saved_match_dist = self.saved_match_dist;
        let mut saved_match_len = self.saved_match_len;

        while *src_pos < input.len() || (self.flush != Flush::NoFlush && lookahead_size != 0) {
            let src_buf_left = input.len() - *src_pos;
            let num_bytes_to_process =
                Ord::min(src_buf_left, MAX_MATCH_LEN - lookahead_size as usize);

            if lookahead_size + self.dict.size >= MIN_MATCH_LEN - 1 && num_bytes_to_process > 0 {
                let dictb = &mut self.dict.b;

                let mut dst_pos = (lookahead_pos + lookahead_size) & LZ_DICT_SIZE_MASK;
                let mut ins_pos = lookahead_pos + lookahead_size - 2;
                // rolling 2-byte hash prefix, completed per inserted byte
                let mut hash = (u32::from(dictb.dict[(ins_pos & LZ_DICT_SIZE_MASK) as usize])
                    << dictionary::LZ_HASH_SHIFT)
                    ^ u32::from(dictb.dict[((ins_pos + 1) & LZ_DICT_SIZE_MASK) as usize]);

                lookahead_size += num_bytes_to_process as u32;
                for &c in &input[*src_pos..*src_pos + num_bytes_to_process] {
                    dictb.dict[dst_pos as usize] = c;
                    if (dst_pos as usize) < MAX_MATCH_LEN - 1 {
                        dictb.dict[LZ_DICT_SIZE + dst_pos as usize] = c;
                    }

                    hash = ((hash << dictionary::LZ_HASH_SHIFT) ^ u32::from(c))
                        & (dictionary::LZ_HASH_SIZE as u32 - 1);
                    dictb.next[(ins_pos & LZ_DICT_SIZE_MASK) as usize] =
                        dictb.hash[hash as usize];
                    dictb.hash[hash as usize] = ins_pos as u16;

                    dst_pos = (dst_pos + 1) & LZ_DICT_SIZE_MASK;
                    ins_pos += 1;
                }
                *src_pos += num_bytes_to_process;
            } else {
                let dictb = &mut self.dict.b;
                for &c in &input[*src_pos..*src_pos + num_bytes_to_process] {
                    let dst_pos = (lookahead_pos + lookahead_size) & LZ_DICT_SIZE_MASK;
                    dictb.dict[dst_pos as usize] = c;
                    if (dst_pos as usize) < MAX_MATCH_LEN - 1 {
                        dictb.dict[LZ_DICT_SIZE + dst_pos as usize] = c;
                    }

                    lookahead_size += 1;
                    if lookahead_size + self.dict.size >= MIN_MATCH_LEN {
                        let ins_pos = lookahead_pos + lookahead_size - 3;
                        let hash = ((u32::from(
                            dictb.dict[(ins_pos & LZ_DICT_SIZE_MASK) as usize],
                        ) << (dictionary::LZ_HASH_SHIFT * 2))
                            ^ ((u32::from(
                                dictb.dict[((ins_pos + 1) & LZ_DICT_SIZE_MASK) as usize],
                            ) << dictionary::LZ_HASH_SHIFT)
                                ^ u32::from(c)))
                            & (dictionary::LZ_HASH_SIZE as u32 - 1);

                        dictb.next[(ins_pos & LZ_DICT_SIZE_MASK) as usize] =
                            dictb.hash[hash as usize];
                        dictb.hash[hash as usize] = ins_pos as u16;
                    }
                }
                *src_pos += num_bytes_to_process;
            }

            self.dict.size = Ord::min(LZ_DICT_SIZE as u32 - lookahead_size, self.dict.size);
            if self.flush == Flush::NoFlush && (lookahead_size as usize) < MAX_MATCH_LEN {
                break;
            }

            let mut len_to_move = 1;
            let mut cur_match_dist = 0;
            let mut cur_match_len = if saved_match_len != 0 {
                saved_match_len
            } else {
                MIN_MATCH_LEN - 1
            };
            let cur_pos = lookahead_pos & LZ_DICT_SIZE_MASK;

            if self.flags & (RLE_MATCHES | FORCE_ALL_RAW_BLOCKS) != 0 {
                if self.dict.size != 0 && self.flags & FORCE_ALL_RAW_BLOCKS == 0 {
                    let c = self.dict.b.dict
                        [(cur_pos.wrapping_sub(1) & LZ_DICT_SIZE_MASK) as usize];
                    cur_match_len = self.dict.b.dict
                        [cur_pos as usize..(cur_pos + lookahead_size) as usize]
                        .iter()
                        .take_while(|&x| *x == c)
                        .count() as u32;
                    if cur_match_len < MIN_MATCH_LEN {
                        cur_match_len = 0;
                    } else {
                        cur_match_dist = 1;
                    }
                }
            } else {
                let dist_len = self.dict.find_match(
                    lookahead_pos,
                    self.dict.size,
                    lookahead_size,
                    cur_match_dist,
                    cur_match_len,
                );
                cur_match_dist = dist_len.0;
                cur_match_len = dist_len.1;
            }

            let far_and_small = cur_match_len == MIN_MATCH_LEN && cur_match_dist >= 8 * 1024;
            let filter_small = self.flags & FILTER_MATCHES != 0 && cur_match_len <= 5;
            if far_and_small || filter_small || cur_pos == cur_match_dist {
                cur_match_dist = 0;
                cur_match_len = 0;
            }

            if saved_match_len != 0 {
                if cur_match_len > saved_match_len {
                    record_literal(&mut self.huff, &mut self.lz, saved_lit);
                    if cur_match_len >= 128 {
                        record_match(&mut self.huff, &mut self.lz, cur_match_len, cur_match_dist);
                        saved_match_len = 0;
                        len_to_move = cur_match_len;
                    } else {
                        saved_lit = self.dict.b.dict[cur_pos as usize];
                        saved_match_dist = cur_match_dist;
                        saved_match_len = cur_match_len;
                    }
                } else {
                    record_match(&mut self.huff, &mut self.lz, saved_match_len, saved_match_dist);
                    len_to_move = saved_match_len - 1;
                    saved_match_len = 0;
                }
            } else if cur_match_dist == 0 {
                record_literal(
                    &mut self.huff,
                    &mut self.lz,
                    self.dict.b.dict[Ord::min(cur_pos as usize, self.dict.b.dict.len() - 1)],
                );
            } else if self.greedy_parsing
                || (self.flags & RLE_MATCHES != 0)
                || cur_match_len >= 128
            {
                record_match(&mut self.huff, &mut self.lz, cur_match_len, cur_match_dist);
                len_to_move = cur_match_len;
            } else {
                saved_lit =
                    self.dict.b.dict[Ord::min(cur_pos as usize, self.dict.b.dict.len() - 1)];
                saved_match_dist = cur_match_dist;
                saved_match_len = cur_match_len;
            }

            lookahead_pos += len_to_move;
            debug_assert!(lookahead_size >= len_to_move);
            lookahead_size -= len_to_move;
            self.dict.size = Ord::min(self.dict.size + len_to_move, LZ_DICT_SIZE as u32);

            let lz_buf_tight = self.lz.code_position > LZ_CODE_BUF_SIZE - 8;
            let raw = self.flags & FORCE_ALL_RAW_BLOCKS != 0;
            let fat = ((self.lz.code_position * 115) >> 7) >= self.lz.total_bytes as usize;
            let fat_or_raw = (self.lz.total_bytes > 31 * 1024) && (fat || raw);

            if lz_buf_tight || fat_or_raw {
                // flush_block reads these through self
                self.dict.lookahead_size = lookahead_size;
                self.dict.lookahead_pos = lookahead_pos;

                let n = match self.flush_block(Flush::NoFlush, output, out_ofs) {
                    Ok(n) => n,
                    Err(BufError) => {
                        self.prev_return_status = DeflateStatus::PutBufFailed;
                        -1
                    }
                };
                if n != 0 {
                    self.saved_lit = saved_lit;
                    self.saved_match_dist = saved_match_dist;
                    self.saved_match_len = saved_match_len;
                    return n > 0;
                }
            }
        }

        self.dict.lookahead_size = lookahead_size;
        self.dict.lookahead_pos = lookahead_pos;
        self.saved_lit = saved_lit;
        self.saved_match_dist = saved_match_dist;
        self.saved_match_len = saved_match_len;
        true
    }

    /// Encode the buffered symbols as one block into the staging buffer, with
    /// the stored-block fallback, then drain what fits into the caller's
    /// output. Returns the number of staged bytes still pending.
    fn flush_block(
        &mut self,
        flush: Flush,
        output: &mut [u8],
        out_ofs: &mut usize,
    ) -> Result<i32, BufError> {
        let n;
        {
            let mut out =
                OutputBuffer::new(&mut self.output_buf[..], self.bit_buffer, self.bits_in);

            let use_raw_block = (self.flags & FORCE_ALL_RAW_BLOCKS != 0)
                && (self.dict.lookahead_pos - self.dict.code_buf_dict_pos) <= self.dict.size;

            debug_assert_eq!(self.output_flush_remaining, 0);
            self.output_flush_ofs = 0;
            self.output_flush_remaining = 0;

            trace!(
                "flush block {}: {} bytes, flush {:?}\n",
                self.block_index,
                self.lz.total_bytes,
                flush
            );

            self.lz.init_flag();

            if self.flags & WRITE_ZLIB_HEADER != 0 && self.block_index == 0 {
                let header = zlib_header(self.flags);
                out.put_bits(header[0].into(), 8)?;
                out.put_bits(header[1].into(), 8)?;
            }

            out.put_bits((flush == Flush::Finish) as u32, 1)?;

            let saved = out.save();
            let saved_pos = saved.pos;

            let comp_success = if use_raw_block {
                false
            } else {
                let use_static = (self.flags & FORCE_ALL_STATIC_BLOCKS != 0)
                    || self.lz.total_bytes < 48;
                self.huff
                    .compress_block(&mut out, self.lz.codes_slice(), use_static)?
            };

            // a stored block costs at most 5 bytes of overhead; take it when
            // the coded block cannot beat the raw bytes still in the window
            let expanded = (self.lz.total_bytes != 0)
                && (out.pos - saved_pos + 1 >= self.lz.total_bytes as usize)
                && (self.dict.lookahead_pos - self.dict.code_buf_dict_pos <= self.dict.size);

            if use_raw_block || expanded {
                out.load(saved);

                out.put_bits(0, 2)?;
                out.pad_to_bytes()?;

                for _ in 0..2 {
                    out.put_bits(self.lz.total_bytes & 0xFFFF, 16)?;
                    self.lz.total_bytes ^= 0xFFFF;
                }

                for i in 0..self.lz.total_bytes {
                    let pos = (self.dict.code_buf_dict_pos + i) & LZ_DICT_SIZE_MASK;
                    out.put_bits(u32::from(self.dict.b.dict[pos as usize]), 8)?;
                }
            } else if !comp_success {
                out.load(saved);
                self.huff
                    .compress_block(&mut out, self.lz.codes_slice(), true)?;
            }

            match flush {
                Flush::NoFlush => (),
                Flush::Finish => {
                    out.pad_to_bytes()?;
                    if self.flags & WRITE_ZLIB_HEADER != 0 {
                        let mut adler = self.adler32;
                        for _ in 0..4 {
                            out.put_bits((adler >> 24) & 0xFF, 8)?;
                            adler <<= 8;
                        }
                    }
                }
                // empty stored block as a byte-aligned resumption point
                Flush::SyncFlush | Flush::FullFlush => {
                    out.put_bits(0, 3)?;
                    out.pad_to_bytes()?;
                    out.put_bits(0, 16)?;
                    out.put_bits(0xFFFF, 16)?;
                }
            }

            n = out.pos;
            self.bit_buffer = out.bit_buffer;
            self.bits_in = out.bits_in;
        }

        self.huff.reset_block_counts();
        self.dict.code_buf_dict_pos += self.lz.total_bytes;
        self.lz.reset();
        self.block_index += 1;

        if n != 0 {
            let bytes_to_copy = Ord::min(n, output.len() - *out_ofs);
            output[*out_ofs..*out_ofs + bytes_to_copy]
                .copy_from_slice(&self.output_buf[..bytes_to_copy]);
            *out_ofs += bytes_to_copy;

            if n != bytes_to_copy {
                self.output_flush_ofs = bytes_to_copy as u32;
                self.output_flush_remaining = (n - bytes_to_copy) as u32;
            }
        }

        Ok(self.output_flush_remaining as i32)
    }

    /// Drain staged bytes left over from a previous call.
    fn flush_output(&mut self, output: &mut [u8], out_ofs: &mut usize) -> DeflateStatus {
        let n = Ord::min(
            output.len() - *out_ofs,
            self.output_flush_remaining as usize,
        );
        if n != 0 {
            let start = self.output_flush_ofs as usize;
            output[*out_ofs..*out_ofs + n].copy_from_slice(&self.output_buf[start..start + n]);
        }
        self.output_flush_ofs += n as u32;
        self.output_flush_remaining -= n as u32;
        *out_ofs += n;

        if self.finished && self.output_flush_remaining == 0 {
            DeflateStatus::Done
        } else {
            DeflateStatus::Ok
        }
    }
}

fn record_literal(h: &mut HuffmanEncoder, lz: &mut LzBuffer, lit: u8) {
    lz.total_bytes += 1;
    lz.write_code(lit);

    *lz.get_flag() >>= 1;
    lz.consume_flag();

    h.count[0][lit as usize] += 1;
}

fn record_match(h: &mut HuffmanEncoder, lz: &mut LzBuffer, mut match_len: u32, mut match_dist: u32) {
    debug_assert!(match_len >= MIN_MATCH_LEN);
    debug_assert!(match_dist >= 1);
    debug_assert!(match_dist as usize <= LZ_DICT_SIZE);

    lz.total_bytes += match_len;
    match_dist -= 1;
    match_len -= MIN_MATCH_LEN;
    lz.write_code(match_len as u8);
    lz.write_code(match_dist as u8);
    lz.write_code((match_dist >> 8) as u8);

    *lz.get_flag() >>= 1;
    *lz.get_flag() |= 0x80;
    lz.consume_flag();

    let symbol = if match_dist < 512 {
        SMALL_DIST_SYM[match_dist as usize]
    } else {
        LARGE_DIST_SYM[((match_dist >> 8) & 127) as usize]
    } as usize;
    h.count[1][symbol] += 1;
    h.count[0][LEN_SYM[match_len as usize] as usize] += 1;
}
