// src/audio/mod.rs
// Audio Module - delivery strategies and the playback output

mod delivery;
mod output;

pub use delivery::{delivery_for, AudioDelivery, CreatePollDelivery, PollPolicy, StreamingDelivery};
pub use output::{AudioOutput, ClipHandle, ClipOutcome, ClipStopper, OutputError, RodioOutput};
