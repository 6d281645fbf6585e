pub mod filter;
pub mod units;

pub use filter::{FilterOutcome, PressureFilter};
pub use units::{Quantity, UnitSystem};
