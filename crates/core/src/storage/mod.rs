pub mod memory;
pub mod snapshot;
pub mod traits;
