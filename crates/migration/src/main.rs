use sea_orm::Database;
use sea_orm_migration::prelude::*;

const USAGE: &str = "Usage: migration [up|down [STEPS]|fresh|refresh|reset|status]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut args = std::env::args().skip(1);
    let cmd = args.next().unwrap_or_else(|| "up".to_string());

    let db_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:./inkwell.db?mode=rwc".to_string());
    let db = Database::connect(&db_url).await?;

    match cmd.as_str() {
        "up" => migration::Migrator::up(&db, None).await?,
        "down" => {
            let steps = match args.next().map(|raw| raw.parse::<u32>()) {
                None => Some(1),
                Some(Ok(steps)) => Some(steps),
                Some(Err(_)) => {
                    eprintln!("{USAGE}");
                    std::process::exit(2);
                }
            };
            migration::Migrator::down(&db, steps).await?
        }
        "fresh" => migration::Migrator::fresh(&db).await?,
        "refresh" => migration::Migrator::refresh(&db).await?,
        "reset" => migration::Migrator::reset(&db).await?,
        "status" => migration::Migrator::status(&db).await?,
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}
