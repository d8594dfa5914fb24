//! Property-based test support for `voice-agc`.
//!
//! Provides frame and configuration generators plus signal helpers for
//! measuring levels of processed audio.
//!
//! # Usage
//!
//! ```ignore
//! use voice_agc_proptest::generators::*;
//! use test_strategy::proptest;
//!
//! #[proptest]
//! fn my_test(frame: MonoFrameI16) {
//!     assert_eq!(frame.samples.len(), frame.sample_rate.frame_size());
//! }
//! ```

pub mod generators;
pub mod signals;

pub use proptest;
pub use test_strategy;
