use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::PgPool;

use crate::dto::matching_dto::{ProviderShare, SimulationResponse, WeightEntry};
use crate::error::{Error, Result};
use crate::models::matching::ProviderWeight;
use crate::models::pillar::Pillar;

/// Share of each provider in the pillar's total weight, as a percentage with
/// two decimals. A zero total gives every provider 0%.
pub fn simulate_distribution(weights: &[ProviderWeight]) -> (Decimal, Vec<ProviderShare>) {
    let total: Decimal = weights.iter().map(|w| w.weight).sum();
    let hundred = Decimal::ONE_HUNDRED;
    let shares = weights
        .iter()
        .map(|w| {
            let share = if total.is_zero() {
                Decimal::ZERO
            } else {
                (w.weight / total * hundred)
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            };
            ProviderShare {
                prestador_id: w.prestador_id,
                name: w.name.clone(),
                weight: w.weight,
                share,
            }
        })
        .collect();
    (total, shares)
}

/// Admin-maintained weights per pillar. They only feed the simulation view.
#[derive(Clone)]
pub struct MatchingService {
    pool: PgPool,
}

impl MatchingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Providers serving `pillar`, with weight 1 until one is set.
    pub async fn weights(&self, pillar: Pillar) -> Result<Vec<ProviderWeight>> {
        let rows = sqlx::query_as::<_, ProviderWeight>(
            r#"
            SELECT p.id AS prestador_id, p.name, COALESCE(w.weight, 1) AS weight
            FROM prestadores p
            LEFT JOIN provider_matching_weights w
                ON w.prestador_id = p.id AND w.pillar = $1
            WHERE $1 = ANY(p.pillars) AND p.is_active
            ORDER BY p.name
            "#,
        )
        .bind(pillar)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn set_weights(&self, pillar: Pillar, entries: Vec<WeightEntry>) -> Result<Vec<ProviderWeight>> {
        let mut tx = self.pool.begin().await?;
        for entry in &entries {
            let serves = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM prestadores WHERE id = $1 AND $2 = ANY(pillars))",
            )
            .bind(entry.prestador_id)
            .bind(pillar)
            .fetch_one(&mut *tx)
            .await?;
            if !serves {
                return Err(Error::BadRequest(format!(
                    "O prestador {} não atende {}.",
                    entry.prestador_id,
                    pillar.label()
                )));
            }

            sqlx::query(
                r#"
                INSERT INTO provider_matching_weights (prestador_id, pillar, weight)
                VALUES ($1, $2, $3)
                ON CONFLICT (prestador_id, pillar)
                DO UPDATE SET weight = EXCLUDED.weight, updated_at = NOW()
                "#,
            )
            .bind(entry.prestador_id)
            .bind(pillar)
            .bind(entry.weight)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(pillar = pillar.as_str(), updated = entries.len(), "Matching weights saved");
        self.weights(pillar).await
    }

    pub async fn simulate(&self, pillar: Pillar) -> Result<SimulationResponse> {
        let weights = self.weights(pillar).await?;
        let (total_weight, shares) = simulate_distribution(&weights);
        Ok(SimulationResponse {
            pillar,
            total_weight,
            shares,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;
    use uuid::Uuid;

    fn weight(name: &str, w: f64) -> ProviderWeight {
        ProviderWeight {
            prestador_id: Uuid::new_v4(),
            name: name.into(),
            weight: Decimal::from_f64(w).unwrap(),
        }
    }

    #[test]
    fn shares_are_proportional_to_weight() {
        let weights = vec![weight("A", 1.0), weight("B", 1.0), weight("C", 2.0)];
        let (total, shares) = simulate_distribution(&weights);
        assert_eq!(total, Decimal::from(4));
        let pct: Vec<Decimal> = shares.iter().map(|s| s.share).collect();
        assert_eq!(pct, vec![Decimal::from(25), Decimal::from(25), Decimal::from(50)]);
    }

    #[test]
    fn thirds_round_to_two_decimals() {
        let weights = vec![weight("A", 1.0), weight("B", 1.0), weight("C", 1.0)];
        let (_, shares) = simulate_distribution(&weights);
        assert_eq!(shares[0].share, Decimal::new(3333, 2));
    }

    #[test]
    fn zero_total_yields_zero_shares() {
        let weights = vec![weight("A", 0.0), weight("B", 0.0)];
        let (total, shares) = simulate_distribution(&weights);
        assert!(total.is_zero());
        assert!(shares.iter().all(|s| s.share.is_zero()));
    }

    #[test]
    fn empty_pillar_has_no_shares() {
        let (total, shares) = simulate_distribution(&[]);
        assert!(total.is_zero());
        assert!(shares.is_empty());
    }
}
