//! Load ingredient and tag fixtures into the database.
//!
//! Usage:
//!   import-data ingredients data/ingredients.json
//!   import-data tags data/tags.json
//!
//! Rows that already exist are skipped. Reads `DATABASE_URL` (and `.env`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use diesel::prelude::*;
use foodgram_server::api::ingredients::create::CreateIngredientRequest;
use foodgram_server::api::tags::create::CreateTagRequest;
use foodgram_server::config::Config;
use foodgram_server::db::create_pool;
use foodgram_server::models::{NewIngredient, NewTag};
use foodgram_server::schema::{ingredients, tags};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "import-data", about = "Load ingredient and tag fixtures")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import `[{"name", "measurement_unit"}]`
    Ingredients { file: PathBuf },
    /// Import `[{"name", "color", "slug"}]`
    Tags { file: PathBuf },
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Keep the rows that pass `validate`, logging the ones that don't.
fn valid_rows<T, R, E: std::fmt::Debug>(rows: Vec<T>, validate: impl Fn(&T) -> Result<R, E>) -> Vec<R> {
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| match validate(row) {
            Ok(valid) => Some(valid),
            Err(errors) => {
                tracing::warn!(index, ?errors, "skipping invalid row");
                None
            }
        })
        .collect()
}

/// Postgres accepts at most 65535 bind parameters per statement.
const MAX_BIND_PARAMS: usize = 65_535;
/// Rows per multi-row insert; each ingredient binds two parameters.
const INGREDIENT_BATCH: usize = 5_000;

fn import_ingredients(conn: &mut PgConnection, rows: &[NewIngredient]) -> QueryResult<usize> {
    let mut inserted = 0;
    for batch in rows.chunks(INGREDIENT_BATCH) {
        inserted += diesel::insert_into(ingredients::table)
            .values(batch)
            .on_conflict_do_nothing()
            .execute(conn)?;
    }
    Ok(inserted)
}

fn import_tags(conn: &mut PgConnection, rows: &[NewTag]) -> QueryResult<usize> {
    // Each row on its own so a conflict on one unique column skips only that row
    let mut inserted = 0;
    for row in rows {
        inserted += diesel::insert_into(tags::table)
            .values(row)
            .on_conflict_do_nothing()
            .execute(conn)?;
    }
    Ok(inserted)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let pool = create_pool(&config.database_url, 1).context("failed to set up the database")?;
    let mut conn = pool.get()?;

    let (kind, total, inserted) = match cli.command {
        Command::Ingredients { file } => {
            let rows: Vec<CreateIngredientRequest> = read_rows(&file)?;
            let total = rows.len();
            let valid = valid_rows(rows, CreateIngredientRequest::validate);
            let inserted = conn.transaction(|conn| import_ingredients(conn, &valid))?;
            ("ingredients", total, inserted)
        }
        Command::Tags { file } => {
            let rows: Vec<CreateTagRequest> = read_rows(&file)?;
            let total = rows.len();
            let valid = valid_rows(rows, CreateTagRequest::validate);
            let inserted = conn.transaction(|conn| import_tags(conn, &valid))?;
            ("tags", total, inserted)
        }
    };

    tracing::info!(kind, total, inserted, skipped = total - inserted, "import finished");
    println!("Imported {} of {} {}", inserted, total, kind);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingredient_batches_fit_in_one_statement() {
        assert!(INGREDIENT_BATCH * 2 <= MAX_BIND_PARAMS);
    }

    #[test]
    fn invalid_rows_are_skipped() {
        let rows = vec![
            CreateIngredientRequest {
                name: Some("flour".to_string()),
                measurement_unit: Some("g".to_string()),
            },
            CreateIngredientRequest {
                name: Some(" ".to_string()),
                measurement_unit: Some("g".to_string()),
            },
        ];

        let valid = valid_rows(rows, CreateIngredientRequest::validate);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].name, "flour");
    }
}
