use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::StepperProfile, traits::OrderFlowError};

/// Creates a stepper profile. The caller is responsible for creating the matching wallet row in the same
/// transaction; see [`crate::sqlite::db::wallets::insert_wallet`].
pub async fn insert_stepper(user_id: &str, conn: &mut SqliteConnection) -> Result<StepperProfile, OrderFlowError> {
    let stepper = sqlx::query_as::<_, StepperProfile>("INSERT INTO steppers (user_id) VALUES ($1) RETURNING *")
        .bind(user_id)
        .fetch_one(conn)
        .await?;
    debug!("🧑️ Stepper profile #{} created for user {user_id}", stepper.id);
    Ok(stepper)
}

pub async fn stepper_by_id(stepper_id: i64, conn: &mut SqliteConnection) -> Result<Option<StepperProfile>, OrderFlowError> {
    let stepper = sqlx::query_as::<_, StepperProfile>("SELECT * FROM steppers WHERE id = $1")
        .bind(stepper_id)
        .fetch_optional(conn)
        .await?;
    Ok(stepper)
}

pub async fn stepper_by_user_id(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<StepperProfile>, OrderFlowError> {
    let stepper = sqlx::query_as::<_, StepperProfile>("SELECT * FROM steppers WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(stepper)
}

pub async fn set_availability(
    stepper_id: i64,
    available: bool,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    let _ = sqlx::query("UPDATE steppers SET is_available = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(available)
        .bind(stepper_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Recalculates the stepper's rolling average over every stepper rating ever recorded against their orders.
/// Averaging in SQL keeps the update consistent with the rating insert when both run in one transaction.
pub(crate) async fn recalculate_rating(stepper_id: i64, conn: &mut SqliteConnection) -> Result<f64, OrderFlowError> {
    let rating: (f64,) = sqlx::query_as(
        r#"
            UPDATE steppers SET
                rating = COALESCE((
                    SELECT AVG(r.stepper_rating)
                    FROM ratings r INNER JOIN orders o ON r.order_id = o.id
                    WHERE o.stepper_id = $1 AND r.stepper_rating IS NOT NULL
                ), 0),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING rating
        "#,
    )
    .bind(stepper_id)
    .fetch_one(conn)
    .await?;
    debug!("🧑️ Stepper #{stepper_id} rating updated to {:.2}", rating.0);
    Ok(rating.0)
}
