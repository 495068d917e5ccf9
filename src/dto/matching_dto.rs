use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::pillar::Pillar;

fn non_negative(weight: &Decimal) -> Result<(), ValidationError> {
    if weight.is_sign_negative() && !weight.is_zero() {
        Err(ValidationError::new("weight").with_message("O peso não pode ser negativo.".into()))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WeightEntry {
    pub prestador_id: Uuid,
    #[validate(custom(function = "non_negative"))]
    pub weight: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetWeightsPayload {
    #[validate(nested)]
    pub weights: Vec<WeightEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingQuery {
    pub pillar: Pillar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderShare {
    pub prestador_id: Uuid,
    pub name: String,
    pub weight: Decimal,
    /// Percentage of the pillar's total weight, two decimals.
    pub share: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResponse {
    pub pillar: Pillar,
    pub total_weight: Decimal,
    pub shares: Vec<ProviderShare>,
}
