pub mod geo;
mod two_factor;

pub use two_factor::generate_two_factor_code;
