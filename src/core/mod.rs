pub mod channel;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod normalizer;
pub mod preflight;
pub mod signal;
pub mod state;
pub mod taps;
