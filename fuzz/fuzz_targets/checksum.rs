#![no_main]

//! the tests provide good coverage, the purpose of this fuzzer is to
//! discover inputs where the unrolled checksum loops diverge.

use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (Vec<u8>, u32)| {
    let (input, start) = input;

    {
        let expected = {
            let mut h = crc32fast::Hasher::new_with_initial(start);
            h.update(&input[..]);
            h.finalize()
        };

        let actual = miniflate::crc32(start, input.as_slice());

        assert_eq!(expected, actual);
    }

    {
        let whole = miniflate::adler32(1, &input);

        // updating in arbitrary chunks must agree with the single pass
        let Some(buf_len) = input.first().copied() else {
            return;
        };
        let buf_size = Ord::max(buf_len, 1) as usize;

        let mut running = 1;
        for chunk in input.chunks(buf_size) {
            running = miniflate::adler32(running, chunk);
        }

        assert_eq!(running, whole);

        let mut running = 0;
        for chunk in input.chunks(buf_size) {
            running = miniflate::crc32(running, chunk);
        }
        assert_eq!(running, miniflate::crc32(0, &input));
    }
});
