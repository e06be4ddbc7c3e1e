//! Chilean administrative regions accepted for shipping addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// The input did not name one of the sixteen regions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown region: {0}")]
pub struct UnknownRegion(pub String);

/// One of the sixteen regions of Chile, listed north to south.
///
/// Stored and submitted as a short code (`metropolitana`); shown with its
/// official name. Parsing accepts either form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Region {
    AricaParinacota,
    Tarapaca,
    Antofagasta,
    Atacama,
    Coquimbo,
    Valparaiso,
    Metropolitana,
    OHiggins,
    Maule,
    Nuble,
    Biobio,
    Araucania,
    LosRios,
    LosLagos,
    Aysen,
    Magallanes,
}

impl Region {
    pub const ALL: [Self; 16] = [
        Self::AricaParinacota,
        Self::Tarapaca,
        Self::Antofagasta,
        Self::Atacama,
        Self::Coquimbo,
        Self::Valparaiso,
        Self::Metropolitana,
        Self::OHiggins,
        Self::Maule,
        Self::Nuble,
        Self::Biobio,
        Self::Araucania,
        Self::LosRios,
        Self::LosLagos,
        Self::Aysen,
        Self::Magallanes,
    ];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::AricaParinacota => "arica_parinacota",
            Self::Tarapaca => "tarapaca",
            Self::Antofagasta => "antofagasta",
            Self::Atacama => "atacama",
            Self::Coquimbo => "coquimbo",
            Self::Valparaiso => "valparaiso",
            Self::Metropolitana => "metropolitana",
            Self::OHiggins => "ohiggins",
            Self::Maule => "maule",
            Self::Nuble => "nuble",
            Self::Biobio => "biobio",
            Self::Araucania => "araucania",
            Self::LosRios => "los_rios",
            Self::LosLagos => "los_lagos",
            Self::Aysen => "aysen",
            Self::Magallanes => "magallanes",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AricaParinacota => "Región de Arica y Parinacota",
            Self::Tarapaca => "Región de Tarapacá",
            Self::Antofagasta => "Región de Antofagasta",
            Self::Atacama => "Región de Atacama",
            Self::Coquimbo => "Región de Coquimbo",
            Self::Valparaiso => "Región de Valparaíso",
            Self::Metropolitana => "Región Metropolitana",
            Self::OHiggins => "Región del Libertador General Bernardo O'Higgins",
            Self::Maule => "Región del Maule",
            Self::Nuble => "Región de Ñuble",
            Self::Biobio => "Región del Biobío",
            Self::Araucania => "Región de La Araucanía",
            Self::LosRios => "Región de Los Ríos",
            Self::LosLagos => "Región de Los Lagos",
            Self::Aysen => "Región de Aysén",
            Self::Magallanes => "Región de Magallanes",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Region {
    type Err = UnknownRegion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|region| region.code() == s || region.name() == s)
            .ok_or_else(|| UnknownRegion(s.to_owned()))
    }
}

impl TryFrom<String> for Region {
    type Error = UnknownRegion;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Region> for &'static str {
    fn from(region: Region) -> Self {
        region.code()
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Region {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Region {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Region {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.code(), buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_code_or_official_name() {
        assert_eq!("metropolitana".parse::<Region>().unwrap(), Region::Metropolitana);
        assert_eq!(
            "Región de Ñuble".parse::<Region>().unwrap(),
            Region::Nuble
        );
        assert_eq!(
            "Región del Libertador General Bernardo O'Higgins"
                .parse::<Region>()
                .unwrap(),
            Region::OHiggins
        );
    }

    #[test]
    fn test_rejects_unknown_region() {
        let err = "Región de Patagonia".parse::<Region>().unwrap_err();
        assert_eq!(err, UnknownRegion("Región de Patagonia".to_owned()));
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<_> = Region::ALL.iter().map(|r| r.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 16);
    }

    #[test]
    fn test_serde_uses_code() {
        let json = serde_json::to_string(&Region::LosRios).unwrap();
        assert_eq!(json, "\"los_rios\"");
        let back: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Region::LosRios);
    }
}
