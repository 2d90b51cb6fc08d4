//! Mergeable approximate summary sketches for KetchSQL.
//!
//! Each sketch in this crate is a compact, mutable, mergeable summary of a
//! data stream supporting one approximate-answer capability:
//!
//! - [`QuantilesSketch`]: quantiles, ranks, CDF/PMF over an ordered stream
//! - [`TDigest`]: quantiles over floating-point streams
//! - [`HllSketch`]: distinct counting with fixed-size register arrays
//! - [`ThetaSketch`]: distinct counting with set operations
//!   (union, intersection, difference)
//! - [`FrequentItemsSketch`]: heavy hitters with error intervals
//!
//! Every sketch serializes to an opaque, versioned binary blob
//! (see [`codec`]) and deserializes from the same blob; a sketch
//! reconstructed from its blob answers every query identically to the
//! original.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
#![allow(missing_docs)]

pub mod codec;
pub mod freq;
pub mod hll;
pub mod quantile;
pub mod tdigest;
pub mod theta;

pub use freq::{FrequentItemRow, FrequentItemsSketch};
pub use hll::{HllSketch, HllUnion};
pub use quantile::{QuantileItem, QuantilesSketch};
pub use tdigest::TDigest;
pub use theta::{ThetaSketch, ThetaUnion};
