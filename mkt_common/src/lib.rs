mod rupiah;

pub mod helpers;
pub mod op;
mod secret;

pub use rupiah::{Rupiah, RupiahConversionError, IDR_CURRENCY_CODE, MIN_DISCOUNTED_PRICE};
pub use secret::Secret;
