use alloc::boxed::Box;

/// Size of the LZ77 sliding dictionary, the maximum back-reference distance.
pub(crate) const LZ_DICT_SIZE: usize = 32 * 1024;
pub(crate) const LZ_DICT_SIZE_MASK: u32 = LZ_DICT_SIZE as u32 - 1;

pub(crate) const MIN_MATCH_LEN: u32 = 3;
pub(crate) const MAX_MATCH_LEN: usize = 258;

/// The dictionary ring mirrors its first `MAX_MATCH_LEN - 1` bytes past the
/// end so the match loops can read across the wrap point without masking every
/// index.
pub(crate) const LZ_DICT_FULL_SIZE: usize = LZ_DICT_SIZE + MAX_MATCH_LEN - 1;

pub(crate) const LZ_HASH_BITS: u32 = 15;
pub(crate) const LZ_HASH_SHIFT: u32 = (LZ_HASH_BITS + 2) / 3;
pub(crate) const LZ_HASH_SIZE: usize = 1 << LZ_HASH_BITS;

/// The backing arrays of the match finder, boxed as one allocation.
pub(crate) struct HashBuffers {
    pub dict: [u8; LZ_DICT_FULL_SIZE],
    /// Head of the chain for each hash value: the most recent position whose
    /// 3-byte sequence hashed there. Position 0 doubles as "no entry".
    pub hash: [u16; LZ_HASH_SIZE],
    /// Per-position link to the previous position with the same hash, forming
    /// an implicit chain through the ring.
    pub next: [u16; LZ_DICT_SIZE],
}

impl Default for HashBuffers {
    fn default() -> Self {
        Self {
            dict: [0; LZ_DICT_FULL_SIZE],
            hash: [0; LZ_HASH_SIZE],
            next: [0; LZ_DICT_SIZE],
        }
    }
}

/// LZ77 sliding window plus the hash chains used to search it.
///
/// Positions are tracked as monotonically increasing `u32` values; the low 15
/// bits index the ring, and chain entries store the low 16 bits so distances
/// can be recovered modulo 64 KiB.
pub(crate) struct Dictionary {
    /// Probe budgets: `[0]` while the best match so far is short, `[1]` once
    /// it reaches 32 bytes and further improvement is less likely.
    pub max_probes: [u32; 2],
    pub b: Box<HashBuffers>,

    /// Start of the data covered by the current LZ code buffer.
    pub code_buf_dict_pos: u32,
    pub lookahead_size: u32,
    pub lookahead_pos: u32,
    /// Bytes of history currently valid behind the lookahead.
    pub size: u32,
}

impl Dictionary {
    pub fn new(flags: u32) -> Self {
        Self {
            max_probes: Self::probes_from_flags(flags),
            b: Box::default(),
            code_buf_dict_pos: 0,
            lookahead_size: 0,
            lookahead_pos: 0,
            size: 0,
        }
    }

    pub fn probes_from_flags(flags: u32) -> [u32; 2] {
        [
            1 + ((flags & 0xFFF) + 2) / 3,
            1 + ((flags & 0xFFF) >> 2),
        ]
    }

    /// Hash of the 3 bytes starting at the (unmasked) position, folded in one
    /// byte at a time.
    pub fn hash_of(&self, b0: u8, b1: u8, b2: u8) -> u32 {
        let h = (u32::from(b0) << (LZ_HASH_SHIFT * 2))
            ^ (u32::from(b1) << LZ_HASH_SHIFT)
            ^ u32::from(b2);
        h & (LZ_HASH_SIZE as u32 - 1)
    }

    /// Push `ins_pos` onto the chain for `hash`.
    pub fn insert_hash(&mut self, hash: u32, ins_pos: u32) {
        self.b.next[(ins_pos & LZ_DICT_SIZE_MASK) as usize] = self.b.hash[hash as usize];
        self.b.hash[hash as usize] = ins_pos as u16;
    }

    /// Walk the hash chain for the current position looking for a longer match
    /// than `(match_dist, match_len)`; returns the best pair found.
    ///
    /// The probe loop only compares the two bytes that would extend the best
    /// match so far; a full byte-wise compare runs when that gate passes.
    pub fn find_match(
        &self,
        lookahead_pos: u32,
        max_dist: u32,
        max_match_len: u32,
        mut match_dist: u32,
        mut match_len: u32,
    ) -> (u32, u32) {
        debug_assert!(max_match_len as usize <= MAX_MATCH_LEN);

        let pos = lookahead_pos & LZ_DICT_SIZE_MASK;
        let mut probe_pos = pos;
        let mut num_probes_left = self.max_probes[(match_len >= 32) as usize];

        if max_match_len <= match_len {
            return (match_dist, match_len);
        }

        let dict = &self.b.dict;
        let mut c0 = dict[(pos + match_len) as usize];
        let mut c1 = dict[(pos + match_len - 1) as usize];

        loop {
            let mut dist = 0;
            'found: loop {
                num_probes_left -= 1;
                if num_probes_left == 0 {
                    return (match_dist, match_len);
                }

                for _ in 0..3 {
                    let next_probe_pos = u32::from(self.b.next[probe_pos as usize]);

                    dist = lookahead_pos.wrapping_sub(next_probe_pos) & 0xFFFF;
                    if next_probe_pos == 0 || dist > max_dist {
                        return (match_dist, match_len);
                    }

                    probe_pos = next_probe_pos & LZ_DICT_SIZE_MASK;
                    if dict[(probe_pos + match_len) as usize] == c0
                        && dict[(probe_pos + match_len - 1) as usize] == c1
                    {
                        break 'found;
                    }
                }
            }

            if dist == 0 {
                return (match_dist, match_len);
            }

            let probe_len = dict[pos as usize..]
                .iter()
                .zip(&dict[probe_pos as usize..])
                .take(max_match_len as usize)
                .take_while(|&(&p, &q)| p == q)
                .count() as u32;

            if probe_len > match_len {
                match_dist = dist;
                match_len = probe_len;
                if probe_len == max_match_len {
                    return (match_dist, match_len);
                }

                c0 = dict[(pos + match_len) as usize];
                c1 = dict[(pos + match_len - 1) as usize];
            }
        }
    }

    /// Forget all history; used by a full flush so the streams on either side
    /// of it decompress independently.
    pub fn reset_hash(&mut self) {
        self.b.hash.fill(0);
        self.b.next.fill(0);
        self.size = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fill(dict: &mut Dictionary, data: &[u8]) {
        // mimic the engine's insert loop: store bytes (mirrored at the end)
        // and chain every position with at least 2 successors
        for (i, &byte) in data.iter().enumerate() {
            dict.b.dict[i] = byte;
            if i < MAX_MATCH_LEN - 1 {
                dict.b.dict[LZ_DICT_SIZE + i] = byte;
            }
        }
        for i in 0..data.len().saturating_sub(2) {
            let hash = dict.hash_of(data[i], data[i + 1], data[i + 2]);
            dict.insert_hash(hash, i as u32);
        }
        dict.size = data.len() as u32;
    }

    #[test]
    fn finds_repeated_run() {
        let mut dict = Dictionary::new(128);
        let data = b"abcdefabcdefabcdef";
        fill(&mut dict, data);

        // search at position 12 for the "abcdef" seen 6 bytes back
        let (dist, len) = dict.find_match(12, 12, 6, 0, MIN_MATCH_LEN - 1);
        assert_eq!(dist, 6);
        assert_eq!(len, 6);
    }

    #[test]
    fn no_match_in_unrelated_data() {
        let mut dict = Dictionary::new(128);
        fill(&mut dict, b"abcdefghijklmnop");

        let (dist, len) = dict.find_match(12, 12, 4, 0, MIN_MATCH_LEN - 1);
        assert_eq!(dist, 0);
        // length is only meaningful once a distance was found
        let _ = len;
    }

    #[test]
    fn probe_budget_shrinks_with_long_match() {
        let d = Dictionary::new(1500);
        assert!(d.max_probes[0] > d.max_probes[1] || d.max_probes[1] >= 1);
        assert_eq!(d.max_probes, [1 + (1500 + 2) / 3, 1 + (1500 >> 2)]);
    }
}
