use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::order::{Booking, Order, OrderStatus};
use crate::error::CoreError;

#[derive(Clone)]
pub struct OrdersRepo {
    pub pool: PgPool,
}

fn parse_status(s: &str) -> Result<OrderStatus, CoreError> {
    OrderStatus::parse(s)
        .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("unknown order status {s}")))
}

fn map_order(row: &sqlx::postgres::PgRow) -> Result<Order, CoreError> {
    let status: String = row.get("status");
    Ok(Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        workspace_id: row.get("workspace_id"),
        subtotal: row.get("subtotal"),
        discount: row.get("discount"),
        tax: row.get("tax"),
        total: row.get("total"),
        status: parse_status(&status)?,
        payment_provider: row.get("payment_provider"),
        created_at: row.get("created_at"),
        paid_at: row.get("paid_at"),
        completed_at: row.get("completed_at"),
    })
}

fn map_booking(row: &sqlx::postgres::PgRow) -> Booking {
    Booking {
        id: row.get("id"),
        order_id: row.get("order_id"),
        user_id: row.get("user_id"),
        space_id: row.get("space_id"),
        checkin_at: row.get("checkin_at"),
        checkout_at: row.get("checkout_at"),
        amount: row.get("amount"),
        cancelled: row.get("cancelled"),
        qr_token: row.get("qr_token"),
    }
}

const ORDER_COLUMNS: &str = "id, user_id, workspace_id, subtotal, discount, tax, total, status, payment_provider, created_at, paid_at, completed_at";

impl OrdersRepo {
    pub async fn insert_order_tx(
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, workspace_id, subtotal, discount, tax, total, status, payment_provider, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.workspace_id)
        .bind(order.subtotal)
        .bind(order.discount)
        .bind(order.tax)
        .bind(order.total)
        .bind(order.status.as_str())
        .bind(&order.payment_provider)
        .bind(order.created_at)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn insert_booking_tx(
        tx: &mut Transaction<'_, Postgres>,
        booking: &Booking,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, order_id, user_id, space_id, checkin_at, checkout_at, amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(booking.id)
        .bind(booking.order_id)
        .bind(booking.user_id)
        .bind(booking.space_id)
        .bind(booking.checkin_at)
        .bind(booking.checkout_at)
        .bind(booking.amount)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn find_order(&self, id: Uuid) -> Result<Option<Order>, CoreError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_order).transpose()
    }

    pub async fn find_order_for_update_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Order>, CoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(tx.as_mut())
        .await?;
        row.as_ref().map(map_order).transpose()
    }

    pub async fn update_status_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<(), CoreError> {
        let now = Utc::now();
        match status {
            OrderStatus::Paid => {
                sqlx::query("UPDATE orders SET status = $2, paid_at = $3 WHERE id = $1")
                    .bind(id)
                    .bind(status.as_str())
                    .bind(now)
                    .execute(tx.as_mut())
                    .await?;
            }
            OrderStatus::Completed => {
                sqlx::query("UPDATE orders SET status = $2, completed_at = $3 WHERE id = $1")
                    .bind(id)
                    .bind(status.as_str())
                    .bind(now)
                    .execute(tx.as_mut())
                    .await?;
            }
            _ => {
                sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
                    .bind(id)
                    .bind(status.as_str())
                    .execute(tx.as_mut())
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, CoreError> {
        let row = sqlx::query("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(map_booking))
    }

    pub async fn bookings_for_order(&self, order_id: Uuid) -> Result<Vec<Booking>, CoreError> {
        let rows = sqlx::query("SELECT * FROM bookings WHERE order_id = $1 ORDER BY checkin_at")
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(map_booking).collect())
    }

    pub async fn mark_booking_cancelled_tx(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE bookings SET cancelled = true WHERE id = $1")
            .bind(booking_id)
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }

    /// Issues the check-in token only once per booking.
    pub async fn set_booking_qr_if_absent(
        &self,
        booking_id: Uuid,
        token: &str,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET qr_token = $2 WHERE id = $1 AND qr_token IS NULL",
        )
        .bind(booking_id)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
