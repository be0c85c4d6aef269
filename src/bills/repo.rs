use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::bills::{
    dto::BillInput,
    repo_types::{Bill, BillRow},
};

const BILL_COLUMNS: &str = r#"
    id, user_id, name, category, total_amount, min_due_amount, due_date,
    is_paid, is_recurring, upi_id, payment_url, consumer_number, biller_id,
    document_key, created_at
"#;

/// All bills of a user, earliest due date first.
pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Bill>> {
    let rows = sqlx::query_as::<_, BillRow>(&format!(
        "SELECT {BILL_COLUMNS} FROM bills WHERE user_id = $1 ORDER BY due_date ASC, created_at ASC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list bills by user")?;
    Ok(rows.into_iter().map(Bill::from).collect())
}

pub async fn get(db: &PgPool, user_id: Uuid, bill_id: Uuid) -> anyhow::Result<Option<Bill>> {
    let row = sqlx::query_as::<_, BillRow>(&format!(
        "SELECT {BILL_COLUMNS} FROM bills WHERE id = $1 AND user_id = $2"
    ))
    .bind(bill_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("get bill")?;
    Ok(row.map(Bill::from))
}

pub async fn insert(db: &PgPool, user_id: Uuid, input: &BillInput) -> anyhow::Result<Bill> {
    let row = sqlx::query_as::<_, BillRow>(&format!(
        r#"
        INSERT INTO bills (id, user_id, name, category, total_amount, min_due_amount, due_date,
                           is_paid, is_recurring, upi_id, payment_url, consumer_number, biller_id,
                           document_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {BILL_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(input.name.trim())
    .bind(input.category.as_str())
    .bind(input.total_amount)
    .bind(input.min_due_amount)
    .bind(input.due_date)
    .bind(input.is_paid)
    .bind(input.is_recurring)
    .bind(&input.payment.upi_id)
    .bind(&input.payment.payment_url)
    .bind(&input.payment.consumer_number)
    .bind(&input.payment.biller_id)
    .bind(&input.document_key)
    .fetch_one(db)
    .await
    .context("insert bill")?;
    Ok(row.into())
}

pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    bill_id: Uuid,
    input: &BillInput,
) -> anyhow::Result<Option<Bill>> {
    let row = sqlx::query_as::<_, BillRow>(&format!(
        r#"
        UPDATE bills
           SET name = $3, category = $4, total_amount = $5, min_due_amount = $6, due_date = $7,
               is_paid = $8, is_recurring = $9, upi_id = $10, payment_url = $11,
               consumer_number = $12, biller_id = $13, document_key = COALESCE($14, document_key)
         WHERE id = $1 AND user_id = $2
        RETURNING {BILL_COLUMNS}
        "#
    ))
    .bind(bill_id)
    .bind(user_id)
    .bind(input.name.trim())
    .bind(input.category.as_str())
    .bind(input.total_amount)
    .bind(input.min_due_amount)
    .bind(input.due_date)
    .bind(input.is_paid)
    .bind(input.is_recurring)
    .bind(&input.payment.upi_id)
    .bind(&input.payment.payment_url)
    .bind(&input.payment.consumer_number)
    .bind(&input.payment.biller_id)
    .bind(&input.document_key)
    .fetch_optional(db)
    .await
    .context("update bill")?;
    Ok(row.map(Bill::from))
}

/// Returns false when nothing matched.
pub async fn delete(db: &PgPool, user_id: Uuid, bill_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM bills WHERE id = $1 AND user_id = $2")
        .bind(bill_id)
        .bind(user_id)
        .execute(db)
        .await
        .context("delete bill")?;
    Ok(res.rows_affected() > 0)
}

/// Reads and row-locks a bill for the rest of the transaction.
pub async fn get_for_update_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    bill_id: Uuid,
) -> anyhow::Result<Option<Bill>> {
    let row = sqlx::query_as::<_, BillRow>(&format!(
        "SELECT {BILL_COLUMNS} FROM bills WHERE id = $1 AND user_id = $2 FOR UPDATE"
    ))
    .bind(bill_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .context("lock bill")?;
    Ok(row.map(Bill::from))
}

pub async fn set_paid_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    bill_id: Uuid,
    is_paid: bool,
) -> anyhow::Result<Bill> {
    let row = sqlx::query_as::<_, BillRow>(&format!(
        "UPDATE bills SET is_paid = $3 WHERE id = $1 AND user_id = $2 RETURNING {BILL_COLUMNS}"
    ))
    .bind(bill_id)
    .bind(user_id)
    .bind(is_paid)
    .fetch_one(&mut **tx)
    .await
    .context("set bill paid flag")?;
    Ok(row.into())
}

/// Inserts an already-built bill (used for recurring successors).
pub async fn insert_bill_tx(tx: &mut Transaction<'_, Postgres>, bill: &Bill) -> anyhow::Result<Bill> {
    let row = sqlx::query_as::<_, BillRow>(&format!(
        r#"
        INSERT INTO bills (id, user_id, name, category, total_amount, min_due_amount, due_date,
                           is_paid, is_recurring, upi_id, payment_url, consumer_number, biller_id,
                           document_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {BILL_COLUMNS}
        "#
    ))
    .bind(bill.id)
    .bind(bill.user_id)
    .bind(&bill.name)
    .bind(bill.category.as_str())
    .bind(bill.total_amount)
    .bind(bill.min_due_amount)
    .bind(bill.due_date)
    .bind(bill.is_paid)
    .bind(bill.is_recurring)
    .bind(&bill.payment.upi_id)
    .bind(&bill.payment.payment_url)
    .bind(&bill.payment.consumer_number)
    .bind(&bill.payment.biller_id)
    .bind(&bill.document_key)
    .fetch_one(&mut **tx)
    .await
    .context("insert successor bill")?;
    Ok(row.into())
}
