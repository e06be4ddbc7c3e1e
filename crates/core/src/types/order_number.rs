//! Human-readable order numbers.

use core::fmt;

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid order number: {0}")]
pub struct OrderNumberError(pub String);

/// Order number shown to customers, e.g. `VGL202610181234`.
///
/// Format: the `VGL` prefix, the UTC placement date as `YYYYMMDD`, then four
/// random digits. The random suffix alone does not guarantee uniqueness; the
/// store checks for collisions and the database enforces a unique index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const PREFIX: &'static str = "VGL";
    const LEN: usize = Self::PREFIX.len() + 8 + 4;

    /// Generate a fresh number for an order placed on `date`.
    pub fn generate<R: Rng + ?Sized>(date: NaiveDate, rng: &mut R) -> Self {
        let suffix: u16 = rng.random_range(0..10_000);
        Self(format!(
            "{}{}{suffix:04}",
            Self::PREFIX,
            date.format("%Y%m%d")
        ))
    }

    /// Parse a number typed by an operator or read back from storage.
    ///
    /// # Errors
    ///
    /// Returns [`OrderNumberError`] unless the input is `VGL` followed by a
    /// valid `YYYYMMDD` date and four digits.
    pub fn parse(s: &str) -> Result<Self, OrderNumberError> {
        let s = s.trim();
        let invalid = || OrderNumberError(s.to_owned());

        let rest = s.strip_prefix(Self::PREFIX).ok_or_else(invalid)?;
        if s.len() != Self::LEN || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let date = rest.get(..8).ok_or_else(invalid)?;
        NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| invalid())?;

        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The placement date encoded in the number.
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        let digits = self.0.get(Self::PREFIX.len()..Self::PREFIX.len() + 8)?;
        NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for OrderNumber {
    type Err = OrderNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OrderNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OrderNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn test_generated_format() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let number = OrderNumber::generate(date(), &mut rng);
            let s = number.as_str();
            assert_eq!(s.len(), 15);
            assert!(s.starts_with("VGL20261018"));
            assert!(s[3..].bytes().all(|b| b.is_ascii_digit()));
            assert_eq!(number.date(), Some(date()));
            assert_eq!(OrderNumber::parse(s).unwrap(), number);
        }
    }

    #[test]
    fn test_small_suffix_is_zero_padded() {
        struct Zero;
        impl rand::RngCore for Zero {
            fn next_u32(&mut self) -> u32 {
                0
            }
            fn next_u64(&mut self) -> u64 {
                0
            }
            fn fill_bytes(&mut self, dst: &mut [u8]) {
                dst.fill(0);
            }
        }

        let number = OrderNumber::generate(date(), &mut Zero);
        assert_eq!(number.as_str(), "VGL202610180000");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "VGL2026101812",
            "ABC202610181234",
            "VGL20261318123X",
            "VGL202613181234",
            "VGL2026101812345",
        ] {
            assert!(OrderNumber::parse(bad).is_err(), "{bad} should fail");
        }
    }
}
