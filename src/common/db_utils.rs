// src/common/db_utils.rs

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::common::error::AppError;

// ---
// Helper RLS: A "Chave" para o Banco de Dados
// ---
/// Abre uma transação com `app.tenant_id` definido (as policies de RLS
/// só enxergam as linhas da construtora).
pub(crate) async fn begin_tenant_tx(
    pool: &PgPool,
    construtora_id: Uuid,
) -> Result<Transaction<'static, Postgres>, AppError> {
    // O operador '?' converte automaticamente sqlx::Error -> AppError (DependencyError ou DatabaseError)
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT set_config('app.tenant_id', $1, true)")
        .bind(construtora_id.to_string())
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}

/// Transação para o link público: sem tenant, só o token do cliente.
pub(crate) async fn begin_public_tx(
    pool: &PgPool,
    access_token: &str,
) -> Result<Transaction<'static, Postgres>, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT set_config('app.access_token', $1, true)")
        .bind(access_token)
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}
