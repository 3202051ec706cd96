pub mod conversion;
pub mod export;
pub mod midi_parse;
pub mod staging;
