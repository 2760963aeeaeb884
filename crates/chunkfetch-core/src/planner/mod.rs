//! Range math and chunk planning.
//!
//! Splits a resource of known (or unknown) length into fixed-size byte
//! ranges, computes HTTP Range header bounds, and tracks which ranges have
//! been accepted by the output.

mod bitmap;
mod range;

pub use bitmap::RangeBitmap;
pub use range::{plan_ranges, plan_single, ByteRange};
