mod cedi;

pub mod op;

pub use cedi::{Cedi, CediConversionError, GHC_CURRENCY_CODE, GHC_CURRENCY_CODE_LOWER};
