use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProviderWeight {
    pub prestador_id: Uuid,
    pub name: String,
    pub weight: Decimal,
}
