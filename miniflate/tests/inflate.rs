use miniflate::inflate::{inflate_flags, Decompressor, InflateStatus};

const HELLO_ZLIB: [u8; 20] = [
    120, 156, 243, 72, 205, 201, 201, 215, 81, 168, 202, 201, 76, 82, 4, 0, 27, 101, 4, 19,
];

/// Decompress a complete stream into a growing non-wrapping buffer,
/// presenting the input in `in_chunk`-byte slices.
fn decompress_chunked(
    compressed: &[u8],
    zlib: bool,
    in_chunk: usize,
) -> Result<Vec<u8>, InflateStatus> {
    let mut d = Decompressor::new();
    let mut out = vec![0u8; 64 * 1024];
    let mut out_pos = 0;
    let mut consumed = 0;

    loop {
        let end = Ord::min(consumed + in_chunk, compressed.len());
        let mut flags = inflate_flags::USING_NON_WRAPPING_OUTPUT_BUF;
        if zlib {
            flags |= inflate_flags::PARSE_ZLIB_HEADER;
        }
        if end < compressed.len() {
            flags |= inflate_flags::HAS_MORE_INPUT;
        }

        let (status, in_bytes, out_bytes) =
            d.decompress(&compressed[consumed..end], &mut out, out_pos, flags);
        consumed += in_bytes;
        out_pos += out_bytes;

        match status {
            InflateStatus::Done => {
                out.truncate(out_pos);
                return Ok(out);
            }
            InflateStatus::NeedsMoreInput => continue,
            InflateStatus::HasMoreOutput => {
                let new_len = out.len() * 2;
                out.resize(new_len, 0);
            }
            status => return Err(status),
        }
    }
}

/// Decompress through a 32 KiB wrapping ring, draining it as it fills.
fn decompress_wrapping(compressed: &[u8], zlib: bool) -> Result<Vec<u8>, InflateStatus> {
    let mut d = Decompressor::new();
    let mut ring = vec![0u8; 1 << 15];
    let mut out_pos = 0;
    let mut consumed = 0;
    let mut result = Vec::new();

    let flags = if zlib {
        inflate_flags::PARSE_ZLIB_HEADER
    } else {
        0
    };

    loop {
        let (status, in_bytes, out_bytes) =
            d.decompress(&compressed[consumed..], &mut ring, out_pos, flags);
        consumed += in_bytes;
        result.extend_from_slice(&ring[out_pos..out_pos + out_bytes]);
        out_pos = (out_pos + out_bytes) % ring.len();

        match status {
            InflateStatus::Done => return Ok(result),
            InflateStatus::HasMoreOutput => continue,
            status => return Err(status),
        }
    }
}

#[test]
fn byte_at_a_time_streaming() {
    let whole = decompress_chunked(&HELLO_ZLIB, true, HELLO_ZLIB.len()).unwrap();
    let dribbled = decompress_chunked(&HELLO_ZLIB, true, 1).unwrap();

    assert_eq!(whole, b"Hello, zlib!");
    assert_eq!(whole, dribbled);
}

#[test]
fn wrapping_ring_matches_non_wrapping() {
    let whole = decompress_chunked(&HELLO_ZLIB, true, HELLO_ZLIB.len()).unwrap();
    let ring = decompress_wrapping(&HELLO_ZLIB, true).unwrap();

    assert_eq!(whole, ring);
}

#[test]
fn multiple_stored_blocks_across_call_boundaries() {
    // two stored blocks, the second final; NLEN is the complement of LEN
    let mut stream = vec![0u8, 5, 0, 0xFA, 0xFF];
    stream.extend_from_slice(b"first");
    stream.extend_from_slice(&[1, 8, 0, 0xF7, 0xFF]);
    stream.extend_from_slice(b", second");

    for chunk in [1, 2, 3, stream.len()] {
        let out = decompress_chunked(&stream, false, chunk).unwrap();
        assert_eq!(out, b"first, second", "chunk size {chunk}");
    }
}

#[test]
fn truncated_stream_needs_more_input_only_when_promised() {
    let truncated = &HELLO_ZLIB[..8];
    let mut out = [0u8; 64];

    let mut d = Decompressor::new();
    let (status, ..) = d.decompress(
        truncated,
        &mut out,
        0,
        inflate_flags::PARSE_ZLIB_HEADER
            | inflate_flags::USING_NON_WRAPPING_OUTPUT_BUF
            | inflate_flags::HAS_MORE_INPUT,
    );
    assert_eq!(status, InflateStatus::NeedsMoreInput);

    let mut d = Decompressor::new();
    let (status, ..) = d.decompress(
        truncated,
        &mut out,
        0,
        inflate_flags::PARSE_ZLIB_HEADER | inflate_flags::USING_NON_WRAPPING_OUTPUT_BUF,
    );
    assert_eq!(status, InflateStatus::FailedCannotMakeProgress);
}

#[test]
fn failure_is_sticky() {
    // reserved block type
    let mut d = Decompressor::new();
    let mut out = [0u8; 64];
    let flags = inflate_flags::USING_NON_WRAPPING_OUTPUT_BUF;

    let (status, ..) = d.decompress(&[6], &mut out, 0, flags);
    assert_eq!(status, InflateStatus::Failed);

    // feeding valid data afterwards does not revive the session
    let (status, ..) = d.decompress(&[3, 0], &mut out, 0, flags);
    assert_eq!(status, InflateStatus::Failed);

    // but a reset does
    d.reset();
    let (status, ..) = d.decompress(&[3, 0], &mut out, 0, flags);
    assert_eq!(status, InflateStatus::Done);
}

#[test]
fn rejects_malformed_streams() {
    let cases: &[(&[u8], bool)] = &[
        // reserved block type
        (&[6], false),
        // stored block with mismatched NLEN
        (&[0, 0, 0, 0, 0], false),
        // oversubscribed code-length table
        (&[4, 0, 0xfe, 0xff], false),
        // repeat code with no previous length
        (&[4, 0, 0x24, 0x49, 0], false),
        // reserved distance code
        (&[2, 0x7e, 0xff, 0xff], false),
        // distance before the start of the output
        (&[0x0c, 0xc0, 0x81, 0, 0, 0, 0, 0, 0x90, 0xff, 0x6b, 0x4, 0], false),
        // zlib header with a bad check value
        (&[0x78, 0x98], true),
    ];

    for &(case, zlib) in cases {
        assert_eq!(
            decompress_chunked(case, zlib, case.len()),
            Err(InflateStatus::Failed),
            "{case:?}"
        );
    }
}

#[test]
fn adler_mismatch_still_produces_the_data() {
    let mut corrupted = HELLO_ZLIB;
    *corrupted.last_mut().unwrap() ^= 0x01;

    assert_eq!(
        decompress_chunked(&corrupted, true, corrupted.len()),
        Err(InflateStatus::Adler32Mismatch)
    );

    // with the checksum ignored the stream is accepted
    let mut d = Decompressor::new();
    let mut out = [0u8; 64];
    let (status, _, out_bytes) = d.decompress(
        &corrupted,
        &mut out,
        0,
        inflate_flags::PARSE_ZLIB_HEADER
            | inflate_flags::USING_NON_WRAPPING_OUTPUT_BUF
            | inflate_flags::IGNORE_ADLER32,
    );
    assert_eq!(status, InflateStatus::Done);
    assert_eq!(&out[..out_bytes], b"Hello, zlib!");
}

#[test]
fn trailing_bytes_are_left_unconsumed() {
    let mut stream = HELLO_ZLIB.to_vec();
    stream.extend_from_slice(b"unrelated trailing data");

    let mut d = Decompressor::new();
    let mut out = [0u8; 64];
    let (status, in_bytes, _) = d.decompress(
        &stream,
        &mut out,
        0,
        inflate_flags::PARSE_ZLIB_HEADER | inflate_flags::USING_NON_WRAPPING_OUTPUT_BUF,
    );
    assert_eq!(status, InflateStatus::Done);
    assert_eq!(in_bytes, HELLO_ZLIB.len());
}
