#![forbid(unsafe_code)]
#![doc = "Common error types, alert codes and algorithm identifiers for legatls."]

pub mod alert;
pub mod algorithm;
pub mod error;

pub use alert::*;
pub use algorithm::*;
pub use error::*;
