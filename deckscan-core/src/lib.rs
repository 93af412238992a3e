//! Core routines shared by all `deckscan` crates
//!
//! This crate provides the numeric and geometric building blocks used by the
//! imaging and decoding pipeline:
//!
//! - Q16.16 fixed point arithmetic ([`fixed`])
//! - integer/real 2-D vectors, lines and rectangles ([`geometry`])
//! - a borrowed/owned row-major sample buffer ([`image`])
//! - clipped, sampled lines through an [`image::ImageBuffer`] ([`sample_line`])
//! - a rolling-window array with rolling sum/min/max ([`rolling`])
//! - a little-endian reader/writer for the LUMA diagnostic file format ([`luma_io`])
//!
//! None of these types know about decks, cards or code definitions; they are
//! the same kind of low-level utility a `zune-core` would provide to every
//! decoder in the family.

pub mod edge;
pub mod fixed;
pub mod geometry;
pub mod image;
pub mod luma_io;
pub mod rolling;
pub mod sample_line;

pub use edge::Edge;
pub use fixed::Fixed;
pub use geometry::{IRect, IVec, Line, Vec2};
pub use image::ImageBuffer;
pub use rolling::RollingWindowArray;
pub use sample_line::SampleLine;
