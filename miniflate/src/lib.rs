#![doc = core::include_str!("../README.md")]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod adler32;
pub mod crc32;
pub mod deflate;
pub mod inflate;

pub use adler32::adler32;
pub use crc32::crc32;

#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        // eprint!($($arg)*)
    };
}

/// initial adler-32 hash value
pub const ADLER32_INITIAL_VALUE: u32 = 1;
/// initial crc-32 hash value
pub const CRC32_INITIAL_VALUE: u32 = 0;

/// When the compressor is asked to flush, this controls how much of the
/// pending state is forced out and whether the stream is terminated.
///
/// The discriminants leave gaps for the flush modes of the wider zlib
/// interface (partial flush, block flush) that the engine does not accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flush {
    #[default]
    NoFlush = 0,
    SyncFlush = 2,
    FullFlush = 3,
    Finish = 4,
}

impl TryFrom<i32> for Flush {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Flush::NoFlush),
            2 => Ok(Flush::SyncFlush),
            3 => Ok(Flush::FullFlush),
            4 => Ok(Flush::Finish),
            _ => Err(()),
        }
    }
}
