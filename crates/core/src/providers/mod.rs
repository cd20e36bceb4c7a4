pub mod frankfurter;
pub mod registry;
pub mod traits;
#[cfg(not(target_arch = "wasm32"))]
pub mod yahoo_finance;
