//! Currency exchange: the conversion engine, the rate-store capability it
//! consumes, and the wire codec for bulk rate transfer.

pub mod codec;
pub mod engine;

pub use codec::{CodecError, Format, RateSheet, UnsupportedFormat};
pub use engine::{ExchangeEngine, ExchangeError, RateStore, Rounding};
