use sea_orm::DatabaseConnection;

use crate::ResultEngine;

mod categories;
mod executor;
mod posts;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// An early return (`?` or `return Err(..)`) drops the transaction before it
/// is committed, which rolls it back as well.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point of the category engine.
///
/// The engine holds no state besides the connection: every operation reads a
/// fresh snapshot inside its own transaction.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`, failing when the database cannot be reached.
    pub async fn build(self) -> ResultEngine<Engine> {
        self.database.ping().await?;
        Ok(Engine {
            database: self.database,
        })
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;

    use super::*;
    use crate::EngineError;

    #[tokio::test]
    async fn build_requires_a_reachable_database() {
        let err = Engine::builder().build().await.unwrap_err();
        assert!(matches!(err, EngineError::Database(_)));

        let db = Database::connect("sqlite::memory:").await.unwrap();
        assert!(Engine::builder().database(db).build().await.is_ok());
    }
}
