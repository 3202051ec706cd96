pub mod piano_roll;
pub mod pipeline;
