//! Trust rule repository.

use super::DbError;
use super::models::TrustRuleRecord;
use sqlx::SqlitePool;

/// Repository for trust-check rules.
pub struct TrustRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TrustRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// All rules in evaluation order.
    pub async fn load_all(&self) -> Result<Vec<TrustRuleRecord>, DbError> {
        let rows = sqlx::query_as::<_, (String, String, String, String)>(
            r#"
            SELECT mask, max_connections, require_ident, max_idents_per_host
            FROM trust_rules
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(mask, max_connections, require_ident, max_idents_per_host)| TrustRuleRecord {
                    mask,
                    max_connections,
                    require_ident,
                    max_idents_per_host,
                },
            )
            .collect())
    }

    /// Append a rule after the existing ones.
    pub async fn add(&self, rule: &TrustRuleRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO trust_rules (mask, max_connections, require_ident, max_idents_per_host)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&rule.mask)
        .bind(&rule.max_connections)
        .bind(&rule.require_ident)
        .bind(&rule.max_idents_per_host)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
