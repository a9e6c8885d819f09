// src/core/protocol/mod.rs

pub mod line_codec;
pub use line_codec::{DEFAULT_MAX_LINE_LENGTH, LineCodec};
