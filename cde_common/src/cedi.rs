use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const GHC_CURRENCY_CODE: &str = "GHC";
pub const GHC_CURRENCY_CODE_LOWER: &str = "ghc";

/// Number of pesewas in one cedi.
const PESEWAS_PER_CEDI: i64 = 100;

//--------------------------------------       Cedi          ---------------------------------------------------------
/// A monetary amount in Ghana cedis, stored as an integer number of pesewas.
///
/// All wallet balances, order totals and commissions in the engine are `Cedi` values. Using integer pesewas keeps
/// arithmetic exact; in particular, the 80% commission split on a whole-cedi delivery fee never loses a pesewa.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cedi(i64);

op!(binary Cedi, Add, add);
op!(binary Cedi, Sub, sub);
op!(inplace Cedi, SubAssign, sub_assign);
op!(unary Cedi, Neg, neg);

impl Mul<i64> for Cedi {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cedi {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in pesewas: {0}")]
pub struct CediConversionError(String);

impl From<i64> for Cedi {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Cedi {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Cedi {}

impl TryFrom<u64> for Cedi {
    type Error = CediConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CediConversionError(format!("Value {} is too large to convert to Cedi", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Cedi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cedis = self.0 as f64 / PESEWAS_PER_CEDI as f64;
        write!(f, "{GHC_CURRENCY_CODE} {cedis:0.2}")
    }
}

impl Cedi {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn from_cedis(cedis: i64) -> Self {
        Self(cedis * PESEWAS_PER_CEDI)
    }

    pub const fn from_pesewas(pesewas: i64) -> Self {
        Self(pesewas)
    }

    /// Converts a fractional cedi amount, rounding to the nearest pesewa.
    pub fn from_cedis_f64(cedis: f64) -> Self {
        Self((cedis * PESEWAS_PER_CEDI as f64).round() as i64)
    }

    /// Computes an integer percentage of this amount, truncating to whole pesewas.
    pub fn percent(&self, pct: i64) -> Self {
        Self(self.0 * pct / 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}
