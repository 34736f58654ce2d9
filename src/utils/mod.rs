mod byte_cursor;
pub(crate) mod bytes;
mod hexdump;
mod time;
mod utf16;

pub(crate) use self::byte_cursor::ByteCursor;
pub use self::hexdump::hexdump;
pub(crate) use self::time::timestamp_from_posix_seconds;
pub(crate) use self::utf16::{
    decode_utf16le_z, find_utf16_terminator, utf8_size_z, utf16_size_z, utf16le_units_z,
};
