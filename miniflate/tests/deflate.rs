use miniflate::deflate::{CompressionConfig, Compressor, DeflateStatus, Strategy};
use miniflate::{adler32, Flush, ADLER32_INITIAL_VALUE};

/// Drive a compressor to completion, presenting the input in `in_chunk`-byte
/// slices and draining the output through an `out_chunk`-byte buffer.
fn compress_chunked(
    config: CompressionConfig,
    input: &[u8],
    in_chunk: usize,
    out_chunk: usize,
) -> Vec<u8> {
    let mut compressor = Compressor::with_config(config);
    let mut buf = vec![0u8; out_chunk];
    let mut compressed = Vec::new();
    let mut consumed = 0;

    loop {
        let end = Ord::min(consumed + in_chunk, input.len());
        let flush = if consumed == input.len() {
            Flush::Finish
        } else {
            Flush::NoFlush
        };

        let (status, in_bytes, out_bytes) =
            compressor.compress(&input[consumed..end], &mut buf, flush);
        consumed += in_bytes;
        compressed.extend_from_slice(&buf[..out_bytes]);

        match status {
            DeflateStatus::Ok => continue,
            DeflateStatus::Done => break,
            status => panic!("compression failed: {status:?}"),
        }
    }

    compressed
}

fn sample_input() -> Vec<u8> {
    // long enough to trip block flushes and the 32 KiB window, with both
    // highly repetitive and mixed content
    let mut data = Vec::with_capacity(100 * 1024);
    data.extend_from_slice(&[b'a'; 8 * 1024]);
    for i in 0..64 * 1024u32 {
        data.push((i * 7 + (i >> 5)) as u8);
    }
    data.extend_from_slice(b"the quick brown fox jumps over the lazy dog. ".repeat(600).as_slice());
    data
}

#[test]
fn output_is_invariant_to_input_chunking() {
    let data = sample_input();

    for level in [1, 6, 9] {
        let config = CompressionConfig::new(level);
        let whole = compress_chunked(config, &data, data.len(), 4096);
        let byte_wise = compress_chunked(config, &data, 1, 4096);
        let odd = compress_chunked(config, &data, 1023, 97);

        assert_eq!(whole, byte_wise, "level {level}");
        assert_eq!(whole, odd, "level {level}");
    }
}

#[test]
fn zlib_stream_carries_input_checksum() {
    let data = sample_input();
    let mut compressor = Compressor::with_config(CompressionConfig::new(6));

    let mut buf = vec![0u8; 256 * 1024];
    let (status, _, out_bytes) = compressor.compress(&data, &mut buf, Flush::Finish);
    assert_eq!(status, DeflateStatus::Done);

    let expected = adler32(ADLER32_INITIAL_VALUE, &data);
    assert_eq!(compressor.adler32(), expected);

    // the trailer holds the same checksum, big endian
    let trailer: [u8; 4] = buf[out_bytes - 4..out_bytes].try_into().unwrap();
    assert_eq!(u32::from_be_bytes(trailer), expected);
}

#[test]
fn raw_stream_has_no_header_or_trailer() {
    let config = CompressionConfig {
        window_bits: -15,
        ..CompressionConfig::new(6)
    };
    let compressed = compress_chunked(config, b"hello hello hello", 64, 64);

    // no zlib CMF byte in front
    assert_ne!(compressed[0], 0x78);
}

#[test]
fn level_zero_stores_blocks() {
    let data = sample_input();
    let config = CompressionConfig {
        window_bits: -15,
        ..CompressionConfig::new(0)
    };
    let compressed = compress_chunked(config, &data, data.len(), 8192);

    // stored blocks cost 5 bytes of header per block plus the data
    assert!(compressed.len() > data.len());
    assert!(compressed.len() < data.len() + data.len() / 1024 + 64);
}

#[test]
fn higher_levels_do_not_expand_repetitive_input() {
    let data = sample_input();
    let fast = compress_chunked(CompressionConfig::new(1), &data, data.len(), 8192);
    let best = compress_chunked(CompressionConfig::new(9), &data, data.len(), 8192);

    assert!(best.len() <= fast.len());
    assert!(best.len() < data.len() / 2);
}

#[test]
fn strategies_produce_output() {
    let data = sample_input();
    for strategy in [
        Strategy::Default,
        Strategy::Filtered,
        Strategy::HuffmanOnly,
        Strategy::Rle,
        Strategy::Fixed,
    ] {
        let config = CompressionConfig {
            strategy,
            ..CompressionConfig::new(6)
        };
        let compressed = compress_chunked(config, &data, 4096, 4096);
        assert!(!compressed.is_empty(), "{strategy:?}");
    }
}

#[test]
fn finish_drains_through_a_tiny_output_buffer() {
    let data = sample_input();
    let one_shot = compress_chunked(CompressionConfig::new(6), &data, data.len(), 1 << 20);
    let dribbled = compress_chunked(CompressionConfig::new(6), &data, data.len(), 1);

    assert_eq!(one_shot, dribbled);
}

#[test]
fn sync_flush_terminates_on_the_marker() {
    let mut compressor = Compressor::with_config(CompressionConfig {
        window_bits: -15,
        ..CompressionConfig::new(6)
    });
    let mut buf = vec![0u8; 4096];

    let (status, _, out_bytes) = compressor.compress(b"some data", &mut buf, Flush::SyncFlush);
    assert_eq!(status, DeflateStatus::Ok);
    assert_eq!(&buf[out_bytes - 4..out_bytes], &[0x00, 0x00, 0xFF, 0xFF]);

    // the stream is still open for more input
    let (status, ..) = compressor.compress(b"more data", &mut buf, Flush::Finish);
    assert_eq!(status, DeflateStatus::Done);
}
