#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod rate_limiter;
pub use rate_limiter::*;

mod throttle;
pub use throttle::*;

pub mod algorithm;
pub use algorithm::*;

pub mod clock;
pub use clock::*;

pub mod store;
pub use store::*;

#[cfg(feature = "redis")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
pub mod redis;
#[cfg(feature = "redis")]
pub use self::redis::*;

mod error;
pub use error::*;

mod common;
pub use common::*;

#[cfg(test)]
mod tests;
