#![no_main]
use libfuzzer_sys::fuzz_target;

use miniflate::inflate::{inflate_flags, Decompressor, InflateStatus};

// Random bytes are almost never a valid deflate stream; the interesting part
// is that the state machine never panics and that chunked and whole-input
// decompression agree byte for byte.
fuzz_target!(|source: &[u8]| {
    // the adler check is skipped so a random trailer does not cut the run
    // short of the interesting states
    let flags = inflate_flags::PARSE_ZLIB_HEADER
        | inflate_flags::USING_NON_WRAPPING_OUTPUT_BUF
        | inflate_flags::IGNORE_ADLER32;

    let mut whole = vec![0u8; 1 << 16];
    let mut d = Decompressor::new();
    let (whole_status, _, whole_len) = d.decompress(source, &mut whole, 0, flags);

    let mut chunked = vec![0u8; 1 << 16];
    let mut d = Decompressor::new();
    let mut in_pos = 0;
    let mut out_pos = 0;
    let chunked_status = loop {
        let end = Ord::min(in_pos + 7, source.len());
        let mut flags = flags;
        if end < source.len() {
            flags |= inflate_flags::HAS_MORE_INPUT;
        }

        let (status, in_bytes, out_bytes) =
            d.decompress(&source[in_pos..end], &mut chunked, out_pos, flags);
        in_pos += in_bytes;
        out_pos += out_bytes;

        match status {
            InflateStatus::NeedsMoreInput => continue,
            status => break status,
        }
    };

    if whole_status == InflateStatus::Done {
        assert_eq!(chunked_status, InflateStatus::Done);
        assert_eq!(whole[..whole_len], chunked[..out_pos]);
    }
});
