pub mod clock;
pub mod dates;
pub mod floating;
