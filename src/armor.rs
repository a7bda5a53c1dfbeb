//! # Armor module
//!
//! ASCII Armor as specified in RFC 4880, section 6.2. Key rings and messages may be armored,
//! the packet layers never see the difference.

mod reader;
mod writer;

pub use self::reader::{is_armored, BlockType, Dearmor};
pub use self::writer::ArmorWriter;
