//! picopt asset foundation
//!
//! The pieces of the pipeline that deal with bytes on their own, before
//! any optimization policy gets involved:
//!
//! - [`Asset`]: a named, immutable content buffer
//! - [`ContentHash`]: 32-byte Blake3 hash used for content addressing
//! - [`fs`]: async filesystem wrappers used by the cache and the
//!   external-image pass

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod asset;
mod hash;

pub mod fs;

pub use asset::Asset;
pub use hash::{ContentHash, HashError};
