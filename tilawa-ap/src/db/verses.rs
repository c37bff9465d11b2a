//! Verse text queries
//!
//! Read side of the verse table the reader UI renders next to the player.

use crate::error::Result;
use serde::Serialize;
use sqlx::{FromRow, Pool, Sqlite};

/// One verse row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Verse {
    pub id: i64,
    pub surah_id: i64,
    pub number_in_surah: i64,
    pub text: String,
    pub translation: Option<String>,
}

/// All verses of a surah in reading order
pub async fn list_verses(db: &Pool<Sqlite>, surah: u16) -> Result<Vec<Verse>> {
    let verses = sqlx::query_as::<_, Verse>(
        r#"
        SELECT id, surah_id, number_in_surah, text, translation
        FROM verses
        WHERE surah_id = ?
        ORDER BY number_in_surah
        "#,
    )
    .bind(i64::from(surah))
    .fetch_all(db)
    .await?;

    Ok(verses)
}

/// Number of stored verses for a surah
pub async fn count_verses(db: &Pool<Sqlite>, surah: u16) -> Result<u16> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verses WHERE surah_id = ?")
        .bind(i64::from(surah))
        .fetch_one(db)
        .await?;

    Ok(u16::try_from(count).unwrap_or(u16::MAX))
}

/// Insert or replace one verse
pub async fn upsert_verse(
    db: &Pool<Sqlite>,
    surah: u16,
    number_in_surah: u16,
    text: &str,
    translation: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO verses (surah_id, number_in_surah, text, translation)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(surah_id, number_in_surah)
        DO UPDATE SET text = excluded.text, translation = excluded.translation
        "#,
    )
    .bind(i64::from(surah))
    .bind(i64::from(number_in_surah))
    .bind(text)
    .bind(translation)
    .execute(db)
    .await?;

    Ok(())
}
