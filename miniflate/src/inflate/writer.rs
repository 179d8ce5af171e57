/// Cursor over the caller's output buffer.
///
/// The buffer doubles as the back-reference window: matches copy from earlier
/// positions in the same slice, masked when the buffer is used as a wrapping
/// ring.
pub(crate) struct OutputWindow<'a> {
    slice: &'a mut [u8],
    position: usize,
}

impl<'a> OutputWindow<'a> {
    #[inline]
    pub fn from_slice_and_pos(slice: &'a mut [u8], position: usize) -> OutputWindow<'a> {
        OutputWindow { slice, position }
    }

    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// Write a byte at the current position and advance.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.slice[self.position] = byte;
        self.position += 1;
    }

    /// Write a slice at the current position and advance.
    #[inline]
    pub fn write_slice(&mut self, data: &[u8]) {
        self.slice[self.position..self.position + data.len()].copy_from_slice(data);
        self.position += data.len();
    }

    #[inline]
    pub const fn bytes_left(&self) -> usize {
        self.slice.len() - self.position
    }

    #[inline]
    pub const fn get_ref(&self) -> &[u8] {
        self.slice
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut [u8] {
        self.slice
    }
}

/// Copy `match_len` bytes from `source_pos` to `out_pos`, one window-masked
/// byte at a time so overlapping and wrapping copies come out right.
#[inline]
pub(crate) fn transfer(
    out_slice: &mut [u8],
    mut source_pos: usize,
    mut out_pos: usize,
    match_len: usize,
    out_buf_size_mask: usize,
) {
    // a distance-1 match is a run of one value
    if out_buf_size_mask == usize::MAX && source_pos.abs_diff(out_pos) == 1 {
        let init = out_slice[out_pos - 1];
        let end = (match_len >> 2) * 4 + out_pos;

        out_slice[out_pos..end].fill(init);
        out_pos = end;
        source_pos = end - 1;
    } else if out_buf_size_mask == usize::MAX && source_pos.abs_diff(out_pos) >= 4 {
        for _ in 0..match_len >> 2 {
            out_slice.copy_within(source_pos..=source_pos + 3, out_pos);
            source_pos += 4;
            out_pos += 4;
        }
    } else {
        for _ in 0..match_len >> 2 {
            out_slice[out_pos] = out_slice[source_pos & out_buf_size_mask];
            out_slice[out_pos + 1] = out_slice[(source_pos + 1) & out_buf_size_mask];
            out_slice[out_pos + 2] = out_slice[(source_pos + 2) & out_buf_size_mask];
            out_slice[out_pos + 3] = out_slice[(source_pos + 3) & out_buf_size_mask];
            source_pos += 4;
            out_pos += 4;
        }
    }

    match match_len & 3 {
        0 => (),
        1 => out_slice[out_pos] = out_slice[source_pos & out_buf_size_mask],
        2 => {
            out_slice[out_pos] = out_slice[source_pos & out_buf_size_mask];
            out_slice[out_pos + 1] = out_slice[(source_pos + 1) & out_buf_size_mask];
        }
        3 => {
            out_slice[out_pos] = out_slice[source_pos & out_buf_size_mask];
            out_slice[out_pos + 1] = out_slice[(source_pos + 1) & out_buf_size_mask];
            out_slice[out_pos + 2] = out_slice[(source_pos + 2) & out_buf_size_mask];
        }
        _ => unreachable!(),
    }
}

/// Copy a whole match into the window. The caller guarantees `match_len`
/// bytes of space after `out_pos`.
#[inline]
pub(crate) fn apply_match(
    out_slice: &mut [u8],
    out_pos: usize,
    dist: usize,
    match_len: usize,
    out_buf_size_mask: usize,
) {
    debug_assert!(out_pos + match_len <= out_slice.len());

    let source_pos = out_pos.wrapping_sub(dist) & out_buf_size_mask;

    if match_len == 3 {
        out_slice[out_pos] = out_slice[source_pos];
        out_slice[out_pos + 1] = out_slice[(source_pos + 1) & out_buf_size_mask];
        out_slice[out_pos + 2] = out_slice[(source_pos + 2) & out_buf_size_mask];
        return;
    }

    if source_pos >= out_pos && (source_pos - out_pos) < match_len {
        transfer(out_slice, source_pos, out_pos, match_len, out_buf_size_mask);
    } else if match_len <= dist && source_pos + match_len < out_slice.len() {
        // the segments do not intersect and the source does not wrap
        if source_pos < out_pos {
            let (from_slice, to_slice) = out_slice.split_at_mut(out_pos);
            to_slice[..match_len].copy_from_slice(&from_slice[source_pos..source_pos + match_len]);
        } else {
            let (to_slice, from_slice) = out_slice.split_at_mut(source_pos);
            to_slice[out_pos..out_pos + match_len].copy_from_slice(&from_slice[..match_len]);
        }
    } else {
        transfer(out_slice, source_pos, out_pos, match_len, out_buf_size_mask);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn overlapping_match_repeats_pattern() {
        let mut buf = [0u8; 16];
        buf[..3].copy_from_slice(b"abc");

        // distance 3, length 9 repeats "abc" three times
        apply_match(&mut buf, 3, 3, 9, usize::MAX);
        assert_eq!(&buf[..12], b"abcabcabcabc");
    }

    #[test]
    fn distance_one_run() {
        let mut buf = [0u8; 16];
        buf[0] = b'x';

        apply_match(&mut buf, 1, 1, 10, usize::MAX);
        assert_eq!(&buf[..11], b"xxxxxxxxxxx");
    }

    #[test]
    fn wrapping_copy_reads_through_mask() {
        // an 8-byte ring: data written near the end wraps to the start
        let mut buf = [0u8; 8];
        buf[6] = b'h';
        buf[7] = b'i';

        // writing at position 0 with the window wrapped: distance 2 from
        // position 8 (mod 8)
        transfer(&mut buf, 6, 0, 2, 7);
        assert_eq!(&buf[..2], b"hi");
    }

    #[test]
    fn writer_tracks_position() {
        let mut buf = [0u8; 8];
        let mut writer = OutputWindow::from_slice_and_pos(&mut buf, 2);

        writer.write_byte(b'a');
        writer.write_slice(b"bc");
        assert_eq!(writer.position(), 5);
        assert_eq!(writer.bytes_left(), 3);
        assert_eq!(&writer.get_ref()[2..5], b"abc");
    }
}
