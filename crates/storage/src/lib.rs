use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::str::FromStr;
use uuid::Uuid;

use shared::{
    domain::{BoardConfig, Card, CardId, ColumnId, ProcessId},
    protocol::{CardPatch, NewCard},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id                 TEXT PRIMARY KEY,
                column_id          TEXT NOT NULL,
                title              TEXT NOT NULL,
                assignee           TEXT,
                machine            TEXT,
                due_date           TEXT,
                process_ids        TEXT NOT NULL DEFAULT '[]',
                quantity_per_robot INTEGER,
                quantity_to_make   INTEGER,
                created_at         TEXT NOT NULL,
                updated_at         TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure cards table exists")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS board_config (
                id           INTEGER PRIMARY KEY CHECK (id = 1),
                columns_json TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure board_config table exists")?;

        Ok(())
    }

    pub async fn list_cards(&self) -> Result<Vec<Card>> {
        let rows = sqlx::query("SELECT * FROM cards ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(card_from_row).collect()
    }

    pub async fn get_card(&self, card_id: CardId) -> Result<Option<Card>> {
        let row = sqlx::query("SELECT * FROM cards WHERE id = ?")
            .bind(card_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(card_from_row).transpose()
    }

    pub async fn insert_card(&self, new_card: &NewCard) -> Result<Card> {
        let now = Utc::now();
        let card = Card {
            id: CardId::new(),
            column_id: new_card.column_id.clone(),
            title: new_card.title.clone(),
            assignee: new_card.assignee.clone(),
            machine: new_card.machine.clone(),
            due_date: new_card.due_date,
            process_ids: new_card.process_ids.clone(),
            quantity_per_robot: new_card.quantity_per_robot,
            quantity_to_make: new_card.quantity_to_make,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO cards (
                id, column_id, title, assignee, machine, due_date,
                process_ids, quantity_per_robot, quantity_to_make,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(card.id.to_string())
        .bind(card.column_id.as_str())
        .bind(&card.title)
        .bind(&card.assignee)
        .bind(&card.machine)
        .bind(card.due_date)
        .bind(serde_json::to_string(&card.process_ids)?)
        .bind(card.quantity_per_robot.map(i64::from))
        .bind(card.quantity_to_make.map(i64::from))
        .bind(card.created_at)
        .bind(card.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(card)
    }

    /// Apply a partial update, returning the updated card or `None` when
    /// it does not exist.
    pub async fn patch_card(&self, card_id: CardId, patch: &CardPatch) -> Result<Option<Card>> {
        let Some(mut card) = self.get_card(card_id).await? else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            card.title = title.clone();
        }
        if let Some(column_id) = &patch.column_id {
            card.column_id = column_id.clone();
        }
        if let Some(assignee) = &patch.assignee {
            card.assignee = Some(assignee.clone());
        }
        if let Some(machine) = &patch.machine {
            card.machine = Some(machine.clone());
        }
        if let Some(due_date) = &patch.due_date {
            card.due_date = Some(*due_date);
        }
        if let Some(process_ids) = &patch.process_ids {
            card.process_ids = process_ids.clone();
        }
        if let Some(quantity) = patch.quantity_per_robot {
            card.quantity_per_robot = Some(quantity);
        }
        if let Some(quantity) = patch.quantity_to_make {
            card.quantity_to_make = Some(quantity);
        }
        card.updated_at = Utc::now();
        self.write_card(&card).await?;
        Ok(Some(card))
    }

    pub async fn set_card_column(
        &self,
        card_id: CardId,
        column_id: &ColumnId,
    ) -> Result<Option<Card>> {
        let Some(mut card) = self.get_card(card_id).await? else {
            return Ok(None);
        };
        card.column_id = column_id.clone();
        card.updated_at = Utc::now();
        self.write_card(&card).await?;
        Ok(Some(card))
    }

    pub async fn set_assignee(
        &self,
        card_id: CardId,
        assignee: Option<String>,
    ) -> Result<Option<Card>> {
        let Some(mut card) = self.get_card(card_id).await? else {
            return Ok(None);
        };
        card.assignee = assignee;
        card.updated_at = Utc::now();
        self.write_card(&card).await?;
        Ok(Some(card))
    }

    pub async fn delete_card(&self, card_id: CardId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(card_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn write_card(&self, card: &Card) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE cards SET
                column_id = ?, title = ?, assignee = ?, machine = ?,
                due_date = ?, process_ids = ?, quantity_per_robot = ?,
                quantity_to_make = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(card.column_id.as_str())
        .bind(&card.title)
        .bind(&card.assignee)
        .bind(&card.machine)
        .bind(card.due_date)
        .bind(serde_json::to_string(&card.process_ids)?)
        .bind(card.quantity_per_robot.map(i64::from))
        .bind(card.quantity_to_make.map(i64::from))
        .bind(card.updated_at)
        .bind(card.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_config(&self) -> Result<Option<BoardConfig>> {
        let row = sqlx::query("SELECT columns_json FROM board_config WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let json: String = row.try_get("columns_json")?;
        let config = serde_json::from_str(&json).context("invalid board config in database")?;
        Ok(Some(config))
    }

    pub async fn save_config(&self, config: &BoardConfig) -> Result<()> {
        let json = serde_json::to_string(config)?;
        sqlx::query(
            "INSERT INTO board_config (id, columns_json) VALUES (1, ?)
             ON CONFLICT(id) DO UPDATE SET columns_json = excluded.columns_json",
        )
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn card_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Card> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id).context("invalid card id in database")?;
    let process_ids: String = row.try_get("process_ids")?;
    let process_ids: Vec<ProcessId> =
        serde_json::from_str(&process_ids).context("invalid process ids in database")?;
    let column_id: String = row.try_get("column_id")?;
    let due_date: Option<DateTime<Utc>> = row.try_get("due_date")?;
    Ok(Card {
        id: CardId(id),
        column_id: ColumnId(column_id),
        title: row.try_get("title")?,
        assignee: row.try_get("assignee")?,
        machine: row.try_get("machine")?,
        due_date,
        process_ids,
        quantity_per_robot: row
            .try_get::<Option<i64>, _>("quantity_per_robot")?
            .map(|v| v as u32),
        quantity_to_make: row
            .try_get::<Option<i64>, _>("quantity_to_make")?
            .map(|v| v as u32),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
