#![no_main]
use libfuzzer_sys::fuzz_target;

use miniflate::deflate::{CompressionConfig, Compressor, DeflateStatus};
use miniflate::inflate::{inflate_flags, Decompressor, InflateStatus};
use miniflate::Flush;

fuzz_target!(|input: (Vec<u8>, CompressionConfig)| {
    let (data, config) = input;

    let mut compressor = Compressor::with_config(config);
    let mut buf = vec![0u8; 4096];
    let mut compressed = Vec::new();
    let mut consumed = 0;

    loop {
        let (status, in_bytes, out_bytes) =
            compressor.compress(&data[consumed..], &mut buf, Flush::Finish);
        consumed += in_bytes;
        compressed.extend_from_slice(&buf[..out_bytes]);

        match status {
            DeflateStatus::Ok => continue,
            DeflateStatus::Done => break,
            status => panic!("compression failed: {status:?}"),
        }
    }

    let mut d = Decompressor::new();
    let mut out = vec![0u8; Ord::max(data.len(), 1)];
    let mut out_pos = 0;
    let mut in_pos = 0;

    let mut flags = inflate_flags::USING_NON_WRAPPING_OUTPUT_BUF;
    if config.window_bits > 0 {
        flags |= inflate_flags::PARSE_ZLIB_HEADER;
    }

    loop {
        let (status, in_bytes, out_bytes) =
            d.decompress(&compressed[in_pos..], &mut out, out_pos, flags);
        in_pos += in_bytes;
        out_pos += out_bytes;

        match status {
            InflateStatus::Done => break,
            InflateStatus::HasMoreOutput => {
                let new_len = out.len() * 2;
                out.resize(new_len, 0);
            }
            status => panic!("decompression failed: {status:?}"),
        }
    }

    assert_eq!(&out[..out_pos], data.as_slice());
});
