use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgHasArrayType, PgTypeInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "pillar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    MentalHealth,
    PhysicalWellness,
    FinancialAssistance,
    LegalAssistance,
}

impl Pillar {
    pub const ALL: [Pillar; 4] = [
        Pillar::MentalHealth,
        Pillar::PhysicalWellness,
        Pillar::FinancialAssistance,
        Pillar::LegalAssistance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Pillar::MentalHealth => "mental_health",
            Pillar::PhysicalWellness => "physical_wellness",
            Pillar::FinancialAssistance => "financial_assistance",
            Pillar::LegalAssistance => "legal_assistance",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Pillar::MentalHealth => "Saúde Mental",
            Pillar::PhysicalWellness => "Bem-Estar Físico",
            Pillar::FinancialAssistance => "Assistência Financeira",
            Pillar::LegalAssistance => "Assistência Jurídica",
        }
    }

    /// Public page slug, e.g. `mental-health`.
    pub fn slug(self) -> String {
        self.as_str().replace('_', "-")
    }
}

impl PgHasArrayType for Pillar {
    fn array_type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("_pillar")
    }
}

impl std::str::FromStr for Pillar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Pillar::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| format!("Unknown pillar: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_use_the_enum_array_type() {
        use sqlx::TypeInfo;
        assert_eq!(Pillar::array_type_info().name(), "_pillar");
    }

    #[test]
    fn parses_slugs_and_snake_case() {
        assert_eq!("mental-health".parse::<Pillar>(), Ok(Pillar::MentalHealth));
        assert_eq!("legal_assistance".parse::<Pillar>(), Ok(Pillar::LegalAssistance));
        assert!("nutrition".parse::<Pillar>().is_err());
    }
}
