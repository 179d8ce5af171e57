//! Streaming decompression of deflate and zlib streams.
//!
//! The decompressor is a resumable state machine: each [`Decompressor::decompress`]
//! call consumes what it can from the input, writes what fits in the output,
//! and parks the machine in whatever mode it reached. The caller's output
//! buffer doubles as the back-reference window, either as one large
//! non-wrapping buffer or as a power-of-two ring.

mod bitreader;
mod huffman;
mod writer;

use crate::ADLER32_INITIAL_VALUE;

use self::bitreader::BitReader;
use self::huffman::{
    HuffmanTable, BASE_EXTRA_MASK, DIST_BASE, DIST_EXTRA, DIST_TABLE, FAST_LOOKUP_BITS,
    HUFFLEN_TABLE, HUFFMAN_LENGTH_ORDER, LENGTH_BASE, LENGTH_EXTRA, LITLEN_TABLE,
    MAX_HUFF_SYMBOLS_0, MAX_HUFF_SYMBOLS_1, MAX_HUFF_TABLES, MIN_TABLE_SIZES,
};
use self::writer::{apply_match, transfer, OutputWindow};

/// Flags for [`Decompressor::decompress`].
pub mod inflate_flags {
    /// The input is a zlib stream: parse and validate the 2-byte header and
    /// check the Adler-32 trailer.
    pub const PARSE_ZLIB_HEADER: u32 = 1;
    /// The caller will provide more input in a later call; running out of
    /// input is not an error yet.
    pub const HAS_MORE_INPUT: u32 = 2;
    /// The output buffer is large enough for the whole stream and is not
    /// treated as a wrapping ring.
    pub const USING_NON_WRAPPING_OUTPUT_BUF: u32 = 4;
    /// Maintain an Adler-32 of the produced bytes even for raw streams.
    pub const COMPUTE_ADLER32: u32 = 8;
    /// Skip the checksum of the produced bytes entirely; overrides
    /// [`COMPUTE_ADLER32`] and the zlib trailer check.
    pub const IGNORE_ADLER32: u32 = 64;
}

use self::inflate_flags::{
    COMPUTE_ADLER32, HAS_MORE_INPUT, IGNORE_ADLER32, PARSE_ZLIB_HEADER,
    USING_NON_WRAPPING_OUTPUT_BUF,
};

/// Return status of [`Decompressor::decompress`].
///
/// Negative values are errors, non-negative values indicate progress.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflateStatus {
    /// The input ended mid-stream and the caller declared there is no more.
    FailedCannotMakeProgress = -4,
    /// A wrapping output buffer whose size is not a power of two, or an
    /// out-of-range starting position.
    BadParam = -3,
    /// The stream decoded fully but its Adler-32 trailer does not match the
    /// produced bytes. The bytes written so far are still valid.
    Adler32Mismatch = -2,
    /// The stream is corrupt; the machine is parked in a failure mode and
    /// further calls keep failing.
    Failed = -1,
    /// The final block has been fully decoded.
    Done = 0,
    /// The input ran dry; call again with more.
    NeedsMoreInput = 1,
    /// The output filled up; call again with (window-preserving) room.
    HasMoreOutput = 2,
}

impl TryFrom<i32> for InflateStatus {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -4 => Ok(Self::FailedCannotMakeProgress),
            -3 => Ok(Self::BadParam),
            -2 => Ok(Self::Adler32Mismatch),
            -1 => Ok(Self::Failed),
            0 => Ok(Self::Done),
            1 => Ok(Self::NeedsMoreInput),
            2 => Ok(Self::HasMoreOutput),
            _ => Err(()),
        }
    }
}

/// Resume point of the state machine. One mode per place the input or output
/// can run out; the failure modes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Start,
    ReadZlibCmf,
    ReadZlibFlg,
    ReadBlockHeader,
    BlockTypeNoCompression,
    RawHeader,
    RawMemcpy1,
    RawMemcpy2,
    RawReadFirstByte,
    RawStoreFirstByte,
    ReadTableSizes,
    ReadHufflenTableCodeSize,
    ReadLitlenDistTablesCodeSize,
    ReadExtraBitsCodeSize,
    DecodeLitlen,
    WriteSymbol,
    HuffDecodeOuterLoop1,
    HuffDecodeOuterLoop2,
    ReadExtraBitsLitlen,
    DecodeDistance,
    ReadExtraBitsDistance,
    WriteLenBytesToEnd,
    BlockDone,
    ReadAdler32,
    DoneForever,

    // failure modes
    BlockTypeUnexpected,
    BadCodeSizeSum,
    BadDistOrLiteralTableLength,
    BadTotalSymbols,
    BadZlibHeader,
    DistanceOutOfBounds,
    BadRawLength,
    BadCodeSizeDistPrevLookup,
    InvalidLitlen,
    InvalidDist,
    InvalidCodeLen,
}

impl Mode {
    const fn is_failure(self) -> bool {
        matches!(
            self,
            Mode::BlockTypeUnexpected
                | Mode::BadCodeSizeSum
                | Mode::BadDistOrLiteralTableLength
                | Mode::BadTotalSymbols
                | Mode::BadZlibHeader
                | Mode::DistanceOutOfBounds
                | Mode::BadRawLength
                | Mode::BadCodeSizeDistPrevLookup
                | Mode::InvalidLitlen
                | Mode::InvalidDist
                | Mode::InvalidCodeLen
        )
    }
}

use self::Mode::*;

enum Action {
    None,
    Jump(Mode),
    End(InflateStatus),
}

/// Dispatch to the next mode without falling through the outer match; a jump
/// restarts the mode dispatch, an end breaks out with a status.
macro_rules! generate_state {
    ($state: ident, $state_machine: tt, $f: expr) => {
        loop {
            match $f {
                Action::None => continue,
                Action::Jump(new_state) => {
                    $state = new_state;
                    continue $state_machine;
                },
                Action::End(result) => break $state_machine result,
            }
        }
    };
}

/// The in-flight values of the current block, kept on the stack during a
/// call and persisted in the session between calls.
#[derive(Copy, Clone)]
struct LocalVars {
    pub dist: u32,
    pub counter: u32,
    pub num_extra: u32,
}

#[inline]
fn read_byte<F>(br: &mut BitReader, flags: u32, f: F) -> Action
where
    F: FnOnce(u8) -> Action,
{
    match br.pull_byte() {
        None => end_of_input(flags),
        Some(byte) => f(byte),
    }
}

#[inline]
fn read_bits<F>(br: &mut BitReader, amount: u32, flags: u32, f: F) -> Action
where
    F: FnOnce(&mut BitReader, u64) -> Action,
{
    match br.try_read_bits(amount) {
        None => end_of_input(flags),
        Some(bits) => f(br, bits),
    }
}

#[inline]
fn pad_to_bytes<F>(br: &mut BitReader, flags: u32, f: F) -> Action
where
    F: FnOnce(&mut BitReader) -> Action,
{
    match br.try_pad_to_bytes() {
        None => end_of_input(flags),
        Some(()) => f(br),
    }
}

#[inline]
fn end_of_input(flags: u32) -> Action {
    Action::End(if flags & HAS_MORE_INPUT != 0 {
        InflateStatus::NeedsMoreInput
    } else {
        InflateStatus::FailedCannotMakeProgress
    })
}

/// RFC 1950 header check: FCHECK divisibility, method 8, no preset
/// dictionary, window within 32 KiB and within a wrapping output buffer.
#[inline]
fn validate_zlib_header(cmf: u32, flg: u32, flags: u32, mask: usize) -> Action {
    let mut failed = ((cmf * 256 + flg) % 31 != 0)
        || ((flg & 0b0010_0000) != 0)
        || ((cmf & 15) != 8);

    let window_size = 1 << ((cmf >> 4) + 8);
    if (flags & USING_NON_WRAPPING_OUTPUT_BUF) == 0 {
        // a wrapping buffer must be able to hold the full window
        failed |= (mask + 1) < window_size;
    }

    failed |= window_size > 32_768;

    if failed {
        crate::trace!("inflate: rejecting zlib header {:#04x} {:#04x}\n", cmf, flg);
        Action::Jump(BadZlibHeader)
    } else {
        Action::Jump(ReadBlockHeader)
    }
}

/// Decode the next huffman code from `table` and hand the symbol to `f`.
///
/// Needs up to 15 bits; when fewer than 2 input bytes remain it pulls single
/// bytes only as long as the lookup keeps failing, so no byte is consumed
/// beyond the code actually decoded.
fn decode_huffman_code<F>(
    r: &mut Decompressor,
    l: &mut LocalVars,
    table: usize,
    flags: u32,
    br: &mut BitReader,
    f: F,
) -> Action
where
    F: FnOnce(&mut Decompressor, &mut LocalVars, i32) -> Action,
{
    if br.num_bits < 15 {
        if br.bytes_left() < 2 {
            loop {
                let mut temp = i32::from(r.tables[table].fast_lookup(br.bit_buf));

                if temp >= 0 {
                    let code_len = (temp >> 9) as u32;
                    if (code_len != 0) && (br.num_bits >= code_len) {
                        break;
                    }
                } else if br.num_bits > u32::from(FAST_LOOKUP_BITS) {
                    let mut code_len = u32::from(FAST_LOOKUP_BITS);
                    loop {
                        temp = i32::from(
                            r.tables[table].tree
                                [(!temp + ((br.bit_buf >> code_len) & 1) as i32) as usize],
                        );
                        code_len += 1;
                        if temp >= 0 || br.num_bits < code_len + 1 {
                            break;
                        }
                    }
                    if temp >= 0 {
                        break;
                    }
                }

                let byte = match br.pull_byte() {
                    Some(byte) => byte,
                    None => return end_of_input(flags),
                };
                br.bit_buf |= u64::from(byte) << br.num_bits;
                br.num_bits += 8;

                if br.num_bits >= 15 {
                    break;
                }
            }
        } else {
            br.fill_u16();
        }
    }

    let mut symbol = i32::from(r.tables[table].fast_lookup(br.bit_buf));
    let code_len;
    if symbol >= 0 {
        code_len = (symbol >> 9) as u32;
        symbol &= 511;
    } else {
        let res = r.tables[table].tree_lookup(symbol, br.bit_buf, u32::from(FAST_LOOKUP_BITS));
        symbol = res.0;
        code_len = res.1;
    }

    if code_len == 0 {
        return Action::Jump(InvalidCodeLen);
    }

    br.bit_buf >>= code_len;
    br.num_bits -= code_len;
    f(r, l, symbol)
}

fn start_static_table(r: &mut Decompressor) {
    r.table_sizes[LITLEN_TABLE] = 288;
    r.table_sizes[DIST_TABLE] = 32;
    r.tables[LITLEN_TABLE].code_size[0..144].fill(8);
    r.tables[LITLEN_TABLE].code_size[144..256].fill(9);
    r.tables[LITLEN_TABLE].code_size[256..280].fill(7);
    r.tables[LITLEN_TABLE].code_size[280..288].fill(8);
    r.tables[DIST_TABLE].code_size[0..32].fill(5);
}

/// Build the decode tables for the current block, working down from the
/// code-length table (block type 2) through distance and literal/length.
fn init_tree(r: &mut Decompressor, l: &mut LocalVars) -> Action {
    loop {
        let table_size = r.table_sizes[r.block_type as usize] as usize;
        if !r.tables[r.block_type as usize].build(table_size) {
            return Action::Jump(BadTotalSymbols);
        }

        if r.block_type == 2 {
            l.counter = 0;
            return Action::Jump(ReadLitlenDistTablesCodeSize);
        }

        if r.block_type == 0 {
            break;
        }
        r.block_type -= 1;
    }

    l.counter = 0;
    Action::Jump(DecodeLitlen)
}

/// Checked-read-free inner loop for the common case.
///
/// Assumes at least 259 bytes of output slack (one literal plus a maximal
/// match) and 14 input bytes (enough bits for a literal, a length with
/// extra, and a distance with extra) on entry to each iteration; falls back
/// to the mode machine when either runs low.
fn decompress_fast(
    r: &mut Decompressor,
    br: &mut BitReader,
    out_buf: &mut OutputWindow,
    flags: u32,
    l: &mut LocalVars,
    out_buf_size_mask: usize,
) -> (InflateStatus, Mode) {
    let mut state;

    let status: InflateStatus = 'o: loop {
        state = Mode::DecodeLitlen;
        loop {
            if out_buf.bytes_left() < 259 || br.bytes_left() < 14 {
                state = Mode::DecodeLitlen;
                break 'o InflateStatus::Done;
            }

            br.fill();

            if let Some((symbol, code_len)) = r.tables[LITLEN_TABLE].lookup(br.bit_buf) {
                l.counter = symbol as u32;
                br.bit_buf >>= code_len;
                br.num_bits -= code_len;

                if (l.counter & 256) != 0 {
                    // a length code, not a literal
                    break;
                }

                // the accumulator still holds enough bits for a second code
                if let Some((symbol, code_len)) = r.tables[LITLEN_TABLE].lookup(br.bit_buf) {
                    br.bit_buf >>= code_len;
                    br.num_bits -= code_len;
                    out_buf.write_byte(l.counter as u8);
                    if (symbol & 256) != 0 {
                        l.counter = symbol as u32;
                        break;
                    }
                    out_buf.write_byte(symbol as u8);
                } else {
                    state = Mode::InvalidCodeLen;
                    break 'o InflateStatus::Failed;
                }
            } else {
                state = Mode::InvalidCodeLen;
                break 'o InflateStatus::Failed;
            }
        }

        // the top bits may still hold the code length
        l.counter &= 511;
        if l.counter == 256 {
            state = Mode::BlockDone;
            break 'o InflateStatus::Done;
        } else if l.counter > 285 {
            state = Mode::InvalidLitlen;
            break 'o InflateStatus::Failed;
        }

        l.num_extra = u32::from(LENGTH_EXTRA[(l.counter - 257) as usize & BASE_EXTRA_MASK]);
        l.counter = u32::from(LENGTH_BASE[(l.counter - 257) as usize & BASE_EXTRA_MASK]);

        br.fill();
        if l.num_extra != 0 {
            let extra_bits = br.bit_buf & ((1 << l.num_extra) - 1);
            br.bit_buf >>= l.num_extra;
            br.num_bits -= l.num_extra;
            l.counter += extra_bits as u32;
        }

        if let Some((mut symbol, code_len)) = r.tables[DIST_TABLE].lookup(br.bit_buf) {
            symbol &= 511;
            br.bit_buf >>= code_len;
            br.num_bits -= code_len;
            if symbol > 29 {
                state = Mode::InvalidDist;
                break 'o InflateStatus::Failed;
            }

            l.num_extra = u32::from(DIST_EXTRA[symbol as usize]);
            l.dist = u32::from(DIST_BASE[symbol as usize]);
        } else {
            state = Mode::InvalidCodeLen;
            break 'o InflateStatus::Failed;
        }

        if l.num_extra != 0 {
            br.fill();
            let extra_bits = br.bit_buf & ((1 << l.num_extra) - 1);
            br.bit_buf >>= l.num_extra;
            br.num_bits -= l.num_extra;
            l.dist += extra_bits as u32;
        }

        let position = out_buf.position();
        if l.dist as usize > position && (flags & USING_NON_WRAPPING_OUTPUT_BUF != 0) {
            // the distance reaches before the start of the decoded data
            state = Mode::DistanceOutOfBounds;
            break InflateStatus::Failed;
        }

        apply_match(
            out_buf.get_mut(),
            position,
            l.dist as usize,
            l.counter as usize,
            out_buf_size_mask,
        );

        out_buf.set_position(position + l.counter as usize);
    };

    (status, state)
}

const LEN_CODES_SIZE: usize = MAX_HUFF_SYMBOLS_0 + MAX_HUFF_SYMBOLS_1 + 137;

/// A decompression session.
///
/// All buffers are owned inline; the struct is around 11 KiB, so callers
/// that keep many sessions around may want to box it.
pub struct Decompressor {
    state: Mode,

    num_bits: u32,
    bit_buf: u64,

    z_header0: u32,
    z_header1: u32,
    /// Adler-32 read from the stream trailer.
    z_adler32: u32,
    /// Adler-32 of the bytes produced so far.
    check_adler32: u32,

    /// Final-block bit of the block being decoded.
    finish: u32,
    block_type: u32,

    dist: u32,
    counter: u32,
    num_extra: u32,

    raw_header: [u8; 4],
    table_sizes: [u32; MAX_HUFF_TABLES],
    tables: [HuffmanTable; MAX_HUFF_TABLES],
    /// Combined literal/length and distance code lengths of a dynamic block,
    /// with room for the worst-case repeat overshoot.
    len_codes: [u8; LEN_CODES_SIZE],
}

impl Default for Decompressor {
    fn default() -> Self {
        Decompressor::new()
    }
}

impl Decompressor {
    pub fn new() -> Decompressor {
        Decompressor {
            state: Mode::Start,
            num_bits: 0,
            bit_buf: 0,
            z_header0: 0,
            z_header1: 0,
            z_adler32: ADLER32_INITIAL_VALUE,
            check_adler32: ADLER32_INITIAL_VALUE,
            finish: 0,
            block_type: 0,
            dist: 0,
            counter: 0,
            num_extra: 0,
            raw_header: [0; 4],
            table_sizes: [0; MAX_HUFF_TABLES],
            tables: [HuffmanTable::new(), HuffmanTable::new(), HuffmanTable::new()],
            len_codes: [0; LEN_CODES_SIZE],
        }
    }

    /// Make the session ready for a new stream. Only the resume point needs
    /// resetting; the start mode clears the rest.
    pub fn reset(&mut self) {
        self.state = Mode::Start;
    }

    /// Adler-32 of the decompressed data so far, when one is being tracked.
    pub fn adler32(&self) -> Option<u32> {
        if self.state != Mode::Start && !self.state.is_failure() && self.z_header0 != 0 {
            Some(self.check_adler32)
        } else {
            None
        }
    }

    /// Decompress from `in_buf` into `out` starting at `out_pos`, until the
    /// input is exhausted, the output is full, the stream ends, or the
    /// stream turns out to be corrupt.
    ///
    /// Unless [`inflate_flags::USING_NON_WRAPPING_OUTPUT_BUF`] is set, `out`
    /// is a power-of-two ring holding the most recent window of output, and
    /// the caller restarts `out_pos` at 0 after draining it. Back-references
    /// need up to 32 KiB of earlier output to be present.
    ///
    /// Returns the status, the number of input bytes consumed, and the
    /// number of bytes written at `out_pos`. Whole bytes sitting unconsumed
    /// in the bit accumulator are not counted as consumed.
    pub fn decompress(
        &mut self,
        in_buf: &[u8],
        out: &mut [u8],
        out_pos: usize,
        flags: u32,
    ) -> (InflateStatus, usize, usize) {
        let out_buf_size_mask = if flags & USING_NON_WRAPPING_OUTPUT_BUF != 0 {
            usize::MAX
        } else {
            // for a zero-length buffer any write attempt yields HasMoreOutput
            out.len().saturating_sub(1)
        };

        // the wrapping buffer must be a power of two, and the starting
        // position must be inside the buffer
        if (out_buf_size_mask.wrapping_add(1) & out_buf_size_mask) != 0 || out_pos > out.len() {
            return (InflateStatus::BadParam, 0, 0);
        }

        let mut br = BitReader::new(in_buf, self.bit_buf, self.num_bits);
        let mut out_buf = OutputWindow::from_slice_and_pos(out, out_pos);

        let mut state = self.state;
        let mut l = LocalVars {
            dist: self.dist,
            counter: self.counter,
            num_extra: self.num_extra,
        };

        let mut status = 'state_machine: loop {
            match state {
                Start => generate_state!(state, 'state_machine, {
                    br.bit_buf = 0;
                    br.num_bits = 0;
                    l.dist = 0;
                    l.counter = 0;
                    l.num_extra = 0;
                    self.z_header0 = 0;
                    self.z_header1 = 0;
                    self.z_adler32 = ADLER32_INITIAL_VALUE;
                    self.check_adler32 = ADLER32_INITIAL_VALUE;
                    if flags & PARSE_ZLIB_HEADER != 0 {
                        Action::Jump(ReadZlibCmf)
                    } else {
                        Action::Jump(ReadBlockHeader)
                    }
                }),

                ReadZlibCmf => generate_state!(state, 'state_machine, {
                    read_byte(&mut br, flags, |cmf| {
                        self.z_header0 = u32::from(cmf);
                        Action::Jump(ReadZlibFlg)
                    })
                }),

                ReadZlibFlg => generate_state!(state, 'state_machine, {
                    read_byte(&mut br, flags, |flg| {
                        self.z_header1 = u32::from(flg);
                        validate_zlib_header(self.z_header0, self.z_header1, flags, out_buf_size_mask)
                    })
                }),

                ReadBlockHeader => generate_state!(state, 'state_machine, {
                    read_bits(&mut br, 3, flags, |_, bits| {
                        self.finish = (bits & 1) as u32;
                        self.block_type = (bits >> 1) as u32 & 3;
                        match self.block_type {
                            0 => Action::Jump(BlockTypeNoCompression),
                            1 => {
                                start_static_table(self);
                                init_tree(self, &mut l)
                            }
                            2 => {
                                l.counter = 0;
                                Action::Jump(ReadTableSizes)
                            }
                            3 => Action::Jump(BlockTypeUnexpected),
                            _ => unreachable!(),
                        }
                    })
                }),

                // stored block: skip to a byte boundary, then the 4-byte header
                BlockTypeNoCompression => generate_state!(state, 'state_machine, {
                    pad_to_bytes(&mut br, flags, |_| {
                        l.counter = 0;
                        Action::Jump(RawHeader)
                    })
                }),

                RawHeader => generate_state!(state, 'state_machine, {
                    if l.counter < 4 {
                        // the bit accumulator may still hold header bytes
                        if br.num_bits != 0 {
                            read_bits(&mut br, 8, flags, |_, bits| {
                                self.raw_header[l.counter as usize] = bits as u8;
                                l.counter += 1;
                                Action::None
                            })
                        } else {
                            read_byte(&mut br, flags, |byte| {
                                self.raw_header[l.counter as usize] = byte;
                                l.counter += 1;
                                Action::None
                            })
                        }
                    } else {
                        // LEN must be the ones' complement of NLEN
                        let length = u16::from(self.raw_header[0]) | (u16::from(self.raw_header[1]) << 8);
                        let check = u16::from(self.raw_header[2]) | (u16::from(self.raw_header[3]) << 8);
                        let valid = length == !check;
                        l.counter = length.into();

                        if !valid {
                            Action::Jump(BadRawLength)
                        } else if l.counter == 0 {
                            // empty stored block, used for synchronization
                            Action::Jump(BlockDone)
                        } else if br.num_bits != 0 {
                            // drain the accumulator before the bulk copy
                            Action::Jump(RawReadFirstByte)
                        } else {
                            Action::Jump(RawMemcpy1)
                        }
                    }
                }),

                RawReadFirstByte => generate_state!(state, 'state_machine, {
                    read_bits(&mut br, 8, flags, |_, bits| {
                        l.dist = bits as u32;
                        Action::Jump(RawStoreFirstByte)
                    })
                }),

                RawStoreFirstByte => generate_state!(state, 'state_machine, {
                    if out_buf.bytes_left() == 0 {
                        Action::End(InflateStatus::HasMoreOutput)
                    } else {
                        out_buf.write_byte(l.dist as u8);
                        l.counter -= 1;
                        if l.counter == 0 || br.num_bits == 0 {
                            Action::Jump(RawMemcpy1)
                        } else {
                            Action::Jump(RawReadFirstByte)
                        }
                    }
                }),

                RawMemcpy1 => generate_state!(state, 'state_machine, {
                    if l.counter == 0 {
                        Action::Jump(BlockDone)
                    } else if out_buf.bytes_left() == 0 {
                        Action::End(InflateStatus::HasMoreOutput)
                    } else {
                        Action::Jump(RawMemcpy2)
                    }
                }),

                RawMemcpy2 => generate_state!(state, 'state_machine, {
                    if br.bytes_left() > 0 {
                        // stored block lengths top out at 64 KiB so these casts
                        // cannot truncate
                        let space_left = out_buf.bytes_left();
                        let bytes_to_copy = Ord::min(
                            Ord::min(space_left, br.bytes_left()),
                            l.counter as usize,
                        );

                        out_buf.write_slice(&br.iter.as_slice()[..bytes_to_copy]);

                        br.iter.nth(bytes_to_copy - 1);
                        l.counter -= bytes_to_copy as u32;
                        Action::Jump(RawMemcpy1)
                    } else {
                        end_of_input(flags)
                    }
                }),

                // HLIT, HDIST and HCLEN of a dynamic block
                ReadTableSizes => generate_state!(state, 'state_machine, {
                    if l.counter < 3 {
                        let num_bits = [5, 5, 4][l.counter as usize];
                        read_bits(&mut br, num_bits, flags, |_, bits| {
                            self.table_sizes[l.counter as usize] =
                                bits as u32 + u32::from(MIN_TABLE_SIZES[l.counter as usize]);
                            l.counter += 1;
                            Action::None
                        })
                    } else {
                        self.tables[HUFFLEN_TABLE].code_size.fill(0);
                        l.counter = 0;
                        // the RFC allows 286 litlen codes at most, and zlib
                        // rejects more than 30 distance codes
                        if self.table_sizes[LITLEN_TABLE] <= 286 && self.table_sizes[DIST_TABLE] <= 30 {
                            Action::Jump(ReadHufflenTableCodeSize)
                        } else {
                            Action::Jump(BadDistOrLiteralTableLength)
                        }
                    }
                }),

                ReadHufflenTableCodeSize => generate_state!(state, 'state_machine, {
                    if l.counter < self.table_sizes[HUFFLEN_TABLE] {
                        read_bits(&mut br, 3, flags, |_, bits| {
                            // stored in the swizzled order that fronts the
                            // most used values
                            self.tables[HUFFLEN_TABLE]
                                .code_size[HUFFMAN_LENGTH_ORDER[l.counter as usize] as usize] =
                                    bits as u8;
                            l.counter += 1;
                            Action::None
                        })
                    } else {
                        self.table_sizes[HUFFLEN_TABLE] = 19;
                        init_tree(self, &mut l)
                    }
                }),

                ReadLitlenDistTablesCodeSize => generate_state!(state, 'state_machine, {
                    if l.counter < self.table_sizes[LITLEN_TABLE] + self.table_sizes[DIST_TABLE] {
                        decode_huffman_code(
                            self, &mut l, HUFFLEN_TABLE, flags, &mut br,
                            |r, l, symbol| {
                                l.dist = symbol as u32;
                                if l.dist < 16 {
                                    r.len_codes[l.counter as usize] = l.dist as u8;
                                    l.counter += 1;
                                    Action::None
                                } else if l.dist == 16 && l.counter == 0 {
                                    // a repeat code with nothing to repeat
                                    Action::Jump(BadCodeSizeDistPrevLookup)
                                } else {
                                    l.num_extra = [2, 3, 7][l.dist as usize - 16];
                                    Action::Jump(ReadExtraBitsCodeSize)
                                }
                            },
                        )
                    } else if l.counter != self.table_sizes[LITLEN_TABLE] + self.table_sizes[DIST_TABLE] {
                        Action::Jump(BadCodeSizeSum)
                    } else {
                        let litlen_size = self.table_sizes[LITLEN_TABLE] as usize;
                        let dist_size = self.table_sizes[DIST_TABLE] as usize;
                        self.tables[LITLEN_TABLE].code_size[..litlen_size]
                            .copy_from_slice(&self.len_codes[..litlen_size]);
                        self.tables[DIST_TABLE].code_size[..dist_size]
                            .copy_from_slice(&self.len_codes[litlen_size..litlen_size + dist_size]);

                        self.block_type -= 1;
                        init_tree(self, &mut l)
                    }
                }),

                ReadExtraBitsCodeSize => generate_state!(state, 'state_machine, {
                    let num_extra = l.num_extra;
                    read_bits(&mut br, num_extra, flags, |_, mut extra_bits| {
                        extra_bits += [3, 3, 11][(l.dist as usize - 16) & 3];
                        let val = if l.dist == 16 {
                            self.len_codes[l.counter as usize - 1]
                        } else {
                            0
                        };

                        self.len_codes
                            [l.counter as usize..l.counter as usize + extra_bits as usize]
                            .fill(val);
                        l.counter += extra_bits as u32;
                        Action::Jump(ReadLitlenDistTablesCodeSize)
                    })
                }),

                DecodeLitlen => generate_state!(state, 'state_machine, {
                    if br.bytes_left() < 4 || out_buf.bytes_left() < 2 {
                        // too little room for the double-literal path; decode
                        // one symbol with checked reads
                        decode_huffman_code(
                            self, &mut l, LITLEN_TABLE, flags, &mut br,
                            |_r, l, symbol| {
                                l.counter = symbol as u32;
                                Action::Jump(WriteSymbol)
                            },
                        )
                    } else if out_buf.bytes_left() >= 259 && br.bytes_left() >= 14 {
                        let (status, new_state) = decompress_fast(
                            self,
                            &mut br,
                            &mut out_buf,
                            flags,
                            &mut l,
                            out_buf_size_mask,
                        );

                        state = new_state;
                        if status == InflateStatus::Done {
                            Action::Jump(new_state)
                        } else {
                            Action::End(status)
                        }
                    } else {
                        br.fill();

                        if let Some((symbol, code_len)) = self.tables[LITLEN_TABLE].lookup(br.bit_buf) {
                            l.counter = symbol as u32;
                            br.bit_buf >>= code_len;
                            br.num_bits -= code_len;

                            if (l.counter & 256) != 0 {
                                // a length code, not a literal
                                Action::Jump(HuffDecodeOuterLoop1)
                            } else if let Some((symbol, code_len)) =
                                self.tables[LITLEN_TABLE].lookup(br.bit_buf)
                            {
                                br.bit_buf >>= code_len;
                                br.num_bits -= code_len;
                                out_buf.write_byte(l.counter as u8);
                                if (symbol & 256) != 0 {
                                    l.counter = symbol as u32;
                                    Action::Jump(HuffDecodeOuterLoop1)
                                } else {
                                    out_buf.write_byte(symbol as u8);
                                    Action::None
                                }
                            } else {
                                Action::Jump(InvalidCodeLen)
                            }
                        } else {
                            Action::Jump(InvalidCodeLen)
                        }
                    }
                }),

                WriteSymbol => generate_state!(state, 'state_machine, {
                    if l.counter >= 256 {
                        Action::Jump(HuffDecodeOuterLoop1)
                    } else if out_buf.bytes_left() > 0 {
                        out_buf.write_byte(l.counter as u8);
                        Action::Jump(DecodeLitlen)
                    } else {
                        Action::End(InflateStatus::HasMoreOutput)
                    }
                }),

                HuffDecodeOuterLoop1 => generate_state!(state, 'state_machine, {
                    // the top bits may still hold the code length
                    l.counter &= 511;

                    if l.counter == 256 {
                        Action::Jump(BlockDone)
                    } else if l.counter > 285 {
                        Action::Jump(InvalidLitlen)
                    } else {
                        // masked so the padded tables never need a bounds check
                        l.num_extra =
                            u32::from(LENGTH_EXTRA[(l.counter - 257) as usize & BASE_EXTRA_MASK]);
                        l.counter =
                            u32::from(LENGTH_BASE[(l.counter - 257) as usize & BASE_EXTRA_MASK]);
                        if l.num_extra != 0 {
                            Action::Jump(ReadExtraBitsLitlen)
                        } else {
                            Action::Jump(DecodeDistance)
                        }
                    }
                }),

                ReadExtraBitsLitlen => generate_state!(state, 'state_machine, {
                    let num_extra = l.num_extra;
                    read_bits(&mut br, num_extra, flags, |_, extra_bits| {
                        l.counter += extra_bits as u32;
                        Action::Jump(DecodeDistance)
                    })
                }),

                DecodeDistance => generate_state!(state, 'state_machine, {
                    decode_huffman_code(self, &mut l, DIST_TABLE, flags, &mut br, |_r, l, symbol| {
                        if symbol > 29 {
                            return Action::Jump(InvalidDist);
                        }
                        l.num_extra = u32::from(DIST_EXTRA[symbol as usize & BASE_EXTRA_MASK]);
                        l.dist = u32::from(DIST_BASE[symbol as usize & BASE_EXTRA_MASK]);
                        if l.num_extra != 0 {
                            Action::Jump(ReadExtraBitsDistance)
                        } else {
                            Action::Jump(HuffDecodeOuterLoop2)
                        }
                    })
                }),

                ReadExtraBitsDistance => generate_state!(state, 'state_machine, {
                    let num_extra = l.num_extra;
                    read_bits(&mut br, num_extra, flags, |_, extra_bits| {
                        l.dist += extra_bits as u32;
                        Action::Jump(HuffDecodeOuterLoop2)
                    })
                }),

                HuffDecodeOuterLoop2 => generate_state!(state, 'state_machine, {
                    if l.dist as usize > out_buf.position()
                        && (flags & USING_NON_WRAPPING_OUTPUT_BUF != 0)
                    {
                        // the distance reaches before the start of the decoded data
                        Action::Jump(DistanceOutOfBounds)
                    } else {
                        let out_pos = out_buf.position();
                        let source_pos =
                            out_buf.position().wrapping_sub(l.dist as usize) & out_buf_size_mask;

                        let out_len = out_buf.get_ref().len();
                        let match_end_pos = out_buf.position() + l.counter as usize;

                        if match_end_pos > out_len
                            || (source_pos >= out_pos && (source_pos - out_pos) < l.counter as usize)
                        {
                            // not enough space for the whole match, copy what fits
                            if l.counter == 0 {
                                Action::Jump(DecodeLitlen)
                            } else {
                                Action::Jump(WriteLenBytesToEnd)
                            }
                        } else {
                            apply_match(
                                out_buf.get_mut(),
                                out_pos,
                                l.dist as usize,
                                l.counter as usize,
                                out_buf_size_mask,
                            );
                            out_buf.set_position(out_pos + l.counter as usize);
                            Action::Jump(DecodeLitlen)
                        }
                    }
                }),

                WriteLenBytesToEnd => generate_state!(state, 'state_machine, {
                    if out_buf.bytes_left() > 0 {
                        let out_pos = out_buf.position();
                        let source_pos =
                            out_buf.position().wrapping_sub(l.dist as usize) & out_buf_size_mask;

                        let len = Ord::min(out_buf.bytes_left(), l.counter as usize);

                        transfer(out_buf.get_mut(), source_pos, out_pos, len, out_buf_size_mask);

                        out_buf.set_position(out_pos + len);
                        l.counter -= len as u32;
                        if l.counter == 0 {
                            Action::Jump(DecodeLitlen)
                        } else {
                            Action::None
                        }
                    } else {
                        Action::End(InflateStatus::HasMoreOutput)
                    }
                }),

                BlockDone => generate_state!(state, 'state_machine, {
                    if self.finish != 0 {
                        // the padding bits are always present in the
                        // accumulator, so this cannot run out of input
                        let _ = br.try_pad_to_bytes();

                        // hand whole unconsumed bytes back to the caller
                        let in_consumed = in_buf.len() - br.bytes_left();
                        let undo = br.undo_bytes(in_consumed as u32) as usize;
                        br.iter = in_buf[in_consumed - undo..].iter();

                        br.bit_buf &= (1u64 << br.num_bits) - 1;
                        debug_assert_eq!(br.num_bits, 0);

                        if flags & PARSE_ZLIB_HEADER != 0 {
                            l.counter = 0;
                            Action::Jump(ReadAdler32)
                        } else {
                            Action::Jump(DoneForever)
                        }
                    } else {
                        Action::Jump(ReadBlockHeader)
                    }
                }),

                ReadAdler32 => generate_state!(state, 'state_machine, {
                    if l.counter < 4 {
                        if br.num_bits != 0 {
                            read_bits(&mut br, 8, flags, |_, bits| {
                                self.z_adler32 <<= 8;
                                self.z_adler32 |= bits as u32;
                                l.counter += 1;
                                Action::None
                            })
                        } else {
                            read_byte(&mut br, flags, |byte| {
                                self.z_adler32 <<= 8;
                                self.z_adler32 |= u32::from(byte);
                                l.counter += 1;
                                Action::None
                            })
                        }
                    } else {
                        Action::Jump(DoneForever)
                    }
                }),

                DoneForever => break InflateStatus::Done,

                // every failure mode is terminal
                _ => break InflateStatus::Failed,
            };
        };

        // bytes pulled into the accumulator but not decoded are not consumed,
        // except when we stopped specifically to wait for more input
        let in_undo = if status != InflateStatus::NeedsMoreInput
            && status != InflateStatus::FailedCannotMakeProgress
        {
            br.undo_bytes((in_buf.len() - br.bytes_left()) as u32) as usize
        } else {
            0
        };

        // a full output buffer takes precedence over empty input, unless the
        // missing input is the trailer and nothing more will be written
        if status == InflateStatus::NeedsMoreInput
            && out_buf.bytes_left() == 0
            && state != Mode::ReadAdler32
        {
            status = InflateStatus::HasMoreOutput;
        }

        self.state = state;
        self.bit_buf = br.bit_buf & ((1u64 << br.num_bits) - 1);
        self.num_bits = br.num_bits;
        self.dist = l.dist;
        self.counter = l.counter;
        self.num_extra = l.num_extra;

        let need_adler = if (flags & IGNORE_ADLER32) == 0 {
            flags & (PARSE_ZLIB_HEADER | COMPUTE_ADLER32) != 0
        } else {
            false
        };
        if need_adler && status as i32 >= 0 {
            let out_buf_pos = out_buf.position();
            self.check_adler32 =
                crate::adler32(self.check_adler32, &out_buf.get_ref()[out_pos..out_buf_pos]);

            if status == InflateStatus::Done
                && flags & PARSE_ZLIB_HEADER != 0
                && self.check_adler32 != self.z_adler32
            {
                status = InflateStatus::Adler32Mismatch;
            }
        }

        (
            status,
            in_buf.len() - br.bytes_left() - in_undo,
            out_buf.position() - out_pos,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn decompress_once<'o>(
        d: &mut Decompressor,
        input: &[u8],
        output: &'o mut [u8],
        flags: u32,
    ) -> (InflateStatus, &'o [u8]) {
        let (status, _, out_len) = d.decompress(input, output, 0, flags);
        (status, &output[..out_len])
    }

    #[test]
    fn decompress_zlib_stream() {
        let encoded = [
            120u8, 156, 243, 72, 205, 201, 201, 215, 81, 168, 202, 201, 76, 82, 4, 0, 27, 101, 4,
            19,
        ];
        let mut out = [0u8; 32];
        let mut d = Decompressor::new();

        let flags = PARSE_ZLIB_HEADER | USING_NON_WRAPPING_OUTPUT_BUF;
        let (status, data) = decompress_once(&mut d, &encoded, &mut out, flags);
        assert_eq!(status, InflateStatus::Done);
        assert_eq!(data, b"Hello, zlib!");
        assert_eq!(d.adler32(), Some(0x1b650413));
    }

    #[test]
    fn stored_block() {
        let text = b"Hello, zlib!";
        let mut encoded = alloc::vec![1u8, 12, 0, 243, 255];
        encoded.extend_from_slice(text);

        let mut out = [0u8; 32];
        let mut d = Decompressor::new();

        let (status, data) =
            decompress_once(&mut d, &encoded, &mut out, USING_NON_WRAPPING_OUTPUT_BUF);
        assert_eq!(status, InflateStatus::Done);
        assert_eq!(data, text);
    }

    fn check_result(input: &[u8], expected_status: InflateStatus, expected_state: Mode, zlib: bool) {
        let mut r = Decompressor::new();
        let mut output_buffer = [0u8; 1024 * 32];
        let flags = if zlib { PARSE_ZLIB_HEADER } else { 0 } | USING_NON_WRAPPING_OUTPUT_BUF;
        let (status, _, _) = r.decompress(input, &mut output_buffer, 0, flags);
        assert_eq!(status, expected_status);
        assert_eq!(r.state, expected_state);
    }

    #[test]
    fn corrupt_streams_park_in_the_right_mode() {
        const F: InflateStatus = InflateStatus::Failed;
        const OK: InflateStatus = InflateStatus::Done;
        let c = check_result;

        // bad zlib headers: FCHECK, method, window size
        c(&[0x77, 0x85], F, Mode::BadZlibHeader, true);
        c(&[0x88, 0x98], F, Mode::BadZlibHeader, true);
        c(&[0x78, 0x98], F, Mode::BadZlibHeader, true);

        // raw block whose NLEN is not the complement of LEN
        c(&[0, 0, 0, 0, 0], F, Mode::BadRawLength, false);
        // empty final static block
        c(&[3, 0], OK, Mode::DoneForever, false);
        // reserved block type
        c(&[6], F, Mode::BlockTypeUnexpected, false);
        // one-byte stored block
        c(&[1, 1, 0, 0xfe, 0xff, 0], OK, Mode::DoneForever, false);
        // dynamic block with an oversubscribed code-length table
        c(&[4, 0, 0xfe, 0xff], F, Mode::BadTotalSymbols, false);
        // repeat code with no previous length to repeat
        c(&[4, 0, 0x24, 0x49, 0], F, Mode::BadCodeSizeDistPrevLookup, false);
        // static block using a reserved distance code
        c(&[2, 0x7e, 0xff, 0xff], F, Mode::InvalidDist, false);
        // match distance pointing before the start of the output
        c(
            &[0x0c, 0xc0, 0x81, 0, 0, 0, 0, 0, 0x90, 0xff, 0x6b, 0x4, 0],
            F,
            Mode::DistanceOutOfBounds,
            false,
        );
    }

    #[test]
    fn truncated_input_reports_progress_state() {
        // the zlib vector cut short
        let encoded = [120u8, 156, 243, 72, 205, 201];
        let mut out = [0u8; 32];
        let flags = PARSE_ZLIB_HEADER | USING_NON_WRAPPING_OUTPUT_BUF;

        let mut d = Decompressor::new();
        let (status, ..) = d.decompress(&encoded, &mut out, 0, flags | HAS_MORE_INPUT);
        assert_eq!(status, InflateStatus::NeedsMoreInput);

        let mut d = Decompressor::new();
        let (status, ..) = d.decompress(&encoded, &mut out, 0, flags);
        assert_eq!(status, InflateStatus::FailedCannotMakeProgress);
    }

    #[test]
    fn wrong_trailer_is_a_mismatch() {
        let mut encoded = [
            120u8, 156, 243, 72, 205, 201, 201, 215, 81, 168, 202, 201, 76, 82, 4, 0, 27, 101, 4,
            19,
        ];
        *encoded.last_mut().unwrap() ^= 0xFF;

        let mut out = [0u8; 32];
        let mut d = Decompressor::new();
        let flags = PARSE_ZLIB_HEADER | USING_NON_WRAPPING_OUTPUT_BUF;
        let (status, _, out_len) = d.decompress(&encoded, &mut out, 0, flags);
        assert_eq!(status, InflateStatus::Adler32Mismatch);
        // the decoded bytes are still valid
        assert_eq!(&out[..out_len], b"Hello, zlib!");

        let mut d = Decompressor::new();
        let (status, ..) = d.decompress(&encoded, &mut out, 0, flags | IGNORE_ADLER32);
        assert_eq!(status, InflateStatus::Done);
    }

    #[test]
    fn fixed_table_lookup() {
        let mut d = Decompressor::new();
        d.block_type = 1;
        start_static_table(&mut d);
        let mut l = LocalVars {
            dist: 0,
            counter: 0,
            num_extra: 0,
        };
        init_tree(&mut d, &mut l);

        let masked_lookup = |table: &HuffmanTable, bit_buf: u64| {
            let ret = table.lookup(bit_buf).unwrap();
            (ret.0 & 511, ret.1)
        };

        let lt = &d.tables[LITLEN_TABLE];
        assert_eq!(masked_lookup(lt, 0b0000_1100), (0, 8));
        assert_eq!(masked_lookup(lt, 0b1111_1101), (143, 8));
        assert_eq!(masked_lookup(lt, 0b0_0001_0011), (144, 9));
        assert_eq!(masked_lookup(lt, 0b1_1111_1111), (255, 9));
        assert_eq!(masked_lookup(lt, 0b000_0000), (256, 7));
        assert_eq!(masked_lookup(lt, 0b111_0100), (279, 7));
        assert_eq!(masked_lookup(lt, 0b0000_0011), (280, 8));
        assert_eq!(masked_lookup(lt, 0b1110_0011), (287, 8));

        let dt = &d.tables[DIST_TABLE];
        assert_eq!(masked_lookup(dt, 0), (0, 5));
        assert_eq!(masked_lookup(dt, 20), (5, 5));
        assert_eq!(masked_lookup(dt, 0b1_1111), (31, 5));
    }

    #[test]
    fn empty_output_buffer_non_wrapping() {
        let encoded = [
            120u8, 156, 243, 72, 205, 201, 201, 215, 81, 168, 202, 201, 76, 82, 4, 0, 27, 101, 4,
            19,
        ];
        let flags = PARSE_ZLIB_HEADER | COMPUTE_ADLER32 | USING_NON_WRAPPING_OUTPUT_BUF;
        let mut r = Decompressor::new();
        let mut output_buffer: [u8; 0] = [];
        // with no room at all the decompressor asks for output space
        let res = r.decompress(&encoded, &mut output_buffer, 0, flags);
        assert_eq!(res, (InflateStatus::HasMoreOutput, 4, 0));
    }

    #[test]
    fn empty_output_buffer_wrapping() {
        // a raw deflate stream; the zlib window check would reject a
        // zero-size wrapping buffer outright
        let encoded = [
            0x73u8, 0x49, 0x4d, 0xcb, 0x49, 0x2c, 0x49, 0x55, 0x00, 0x11, 0x00,
        ];
        let mut r = Decompressor::new();
        let mut output_buffer: [u8; 0] = [];
        let res = r.decompress(&encoded, &mut output_buffer, 0, COMPUTE_ADLER32);
        assert_eq!(res, (InflateStatus::HasMoreOutput, 2, 0));
    }

    #[test]
    fn non_power_of_two_wrapping_buffer_is_bad_param() {
        let mut r = Decompressor::new();
        let mut output_buffer = [0u8; 12];
        let (status, ..) = r.decompress(&[3, 0], &mut output_buffer, 0, 0);
        assert_eq!(status, InflateStatus::BadParam);

        // so is a starting position outside the buffer
        let mut r = Decompressor::new();
        let mut output_buffer = [0u8; 16];
        let (status, ..) =
            r.decompress(&[3, 0], &mut output_buffer, 17, USING_NON_WRAPPING_OUTPUT_BUF);
        assert_eq!(status, InflateStatus::BadParam);
    }

    #[test]
    fn reset_starts_a_fresh_stream() {
        let encoded = [
            120u8, 156, 243, 72, 205, 201, 201, 215, 81, 168, 202, 201, 76, 82, 4, 0, 27, 101, 4,
            19,
        ];
        let flags = PARSE_ZLIB_HEADER | USING_NON_WRAPPING_OUTPUT_BUF;
        let mut out = [0u8; 32];
        let mut d = Decompressor::new();

        let (status, ..) = d.decompress(&encoded, &mut out, 0, flags);
        assert_eq!(status, InflateStatus::Done);

        d.reset();
        let (status, _, out_len) = d.decompress(&encoded, &mut out, 0, flags);
        assert_eq!(status, InflateStatus::Done);
        assert_eq!(&out[..out_len], b"Hello, zlib!");
    }
}
