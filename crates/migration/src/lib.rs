pub use sea_orm_migration::prelude::*;

mod m20261019_000001_taxonomy;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20261019_000001_taxonomy::Migration)]
    }
}
