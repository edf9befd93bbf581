//! Conversion between native column values and their wire bytes.

mod collection;
pub mod literal;
pub mod registry;
mod scalar;

pub use literal::to_literal;
pub use registry::{decode, encode, lookup, Codec, DecodeFn, EncodeFn};
pub use scalar::truncate_to_millis;

#[cfg(test)]
mod tests;
