//! Platform-agnostic building blocks: seeded shuffling, key/value storage, clocks.

pub mod platform;
pub mod seed;
pub mod storage;
pub mod timing;
