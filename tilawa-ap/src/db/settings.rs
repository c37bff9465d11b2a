//! Settings database access
//!
//! Read/write settings from the settings table (key-value store).

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tilawa_common::SurahContext;

const AUTOPLAY_ENABLED: &str = "autoplay_enabled";
const LAST_SURAH: &str = "last_surah";

/// Autoplay setting; `false` when absent
pub async fn get_autoplay_enabled(db: &Pool<Sqlite>) -> Result<bool> {
    Ok(get_setting::<bool>(db, AUTOPLAY_ENABLED).await?.unwrap_or(false))
}

pub async fn set_autoplay_enabled(db: &Pool<Sqlite>, enabled: bool) -> Result<()> {
    set_setting(db, AUTOPLAY_ENABLED, enabled).await
}

/// Surah of the last reading session, if it names a real surah
pub async fn get_last_surah(db: &Pool<Sqlite>) -> Result<Option<SurahContext>> {
    match get_setting::<u16>(db, LAST_SURAH).await? {
        Some(surah) => Ok(SurahContext::for_surah(surah).ok()),
        None => Ok(None),
    }
}

pub async fn set_last_surah(db: &Pool<Sqlite>, surah: u16) -> Result<()> {
    set_setting(db, LAST_SURAH, surah).await
}

/// Generic setting getter
///
/// Returns `None` if the key is absent, an error if the value does not parse.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}
