use std::{error::Error, path::PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{CategoryOrder, CategoryParam, Engine, EngineError, PostParam, PostStatus};
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use serde::Serialize;

mod settings;

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "inkwell")]
#[command(about = "Manage blog categories and keep password protection consistent")]
struct Cli {
    /// Database connection string, overrides the `database` setting.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Category(Category),
    Post(Post),
}

#[derive(Args, Debug)]
struct Category {
    #[command(subcommand)]
    command: CategoryCommand,
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    Create(CategoryFields),
    /// Update one category; omitted fields keep their current value.
    Update {
        #[arg(long)]
        id: i32,
        #[command(flatten)]
        fields: CategoryFields,
    },
    /// Update many categories from a JSON array of category parameters.
    UpdateBatch {
        #[arg(long)]
        file: PathBuf,
    },
    Delete {
        #[arg(long)]
        id: i32,
    },
    Get {
        #[arg(long, conflicts_with = "slug", required_unless_present = "slug")]
        id: Option<i32>,
        #[arg(long)]
        slug: Option<String>,
    },
    List {
        #[arg(long, value_enum, default_value_t = Order::Priority)]
        order: Order,
        #[arg(long)]
        with_post_count: bool,
    },
    Tree {
        /// Include category passwords in the output.
        #[arg(long)]
        fill_password: bool,
    },
    /// Every descendant of a category, `0` for all.
    Children {
        #[arg(long, default_value_t = 0)]
        parent_id: i32,
    },
}

#[derive(Args, Debug)]
struct CategoryFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    slug: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    thumbnail: Option<String>,
    /// Pass an empty string to remove the password.
    #[arg(long)]
    password: Option<String>,
    #[arg(long)]
    parent_id: Option<i32>,
    #[arg(long)]
    priority: Option<i32>,
}

impl CategoryFields {
    fn apply(self, mut param: CategoryParam) -> CategoryParam {
        if let Some(name) = self.name {
            param.name = name;
        }
        if let Some(slug) = self.slug {
            param.slug = slug;
        }
        if let Some(description) = self.description {
            param.description = description;
        }
        if let Some(thumbnail) = self.thumbnail {
            param.thumbnail = thumbnail;
        }
        if let Some(password) = self.password {
            param.password = password;
        }
        if let Some(parent_id) = self.parent_id {
            param.parent_id = parent_id;
        }
        if let Some(priority) = self.priority {
            param.priority = priority;
        }
        param
    }
}

#[derive(Args, Debug)]
struct Post {
    #[command(subcommand)]
    command: PostCommand,
}

#[derive(Subcommand, Debug)]
enum PostCommand {
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        slug: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long, value_enum, default_value_t = Status::Published)]
        status: Status,
        /// Category id, repeat for several.
        #[arg(long = "category")]
        categories: Vec<i32>,
    },
    Get {
        #[arg(long)]
        id: i32,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Order {
    Priority,
    Name,
    Id,
}

impl From<Order> for CategoryOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Priority => CategoryOrder::Priority,
            Order::Name => CategoryOrder::Name,
            Order::Id => CategoryOrder::Id,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Status {
    Published,
    Draft,
    Recycle,
}

impl From<Status> for PostStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Published => PostStatus::Published,
            Status::Draft => PostStatus::Draft,
            Status::Recycle => PostStatus::Recycle,
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<(), BoxError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect_db(database_url: &str) -> Result<DatabaseConnection, BoxError> {
    let db = sea_orm::Database::connect(database_url).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

async fn run_category(engine: &Engine, command: CategoryCommand) -> Result<(), BoxError> {
    match command {
        CategoryCommand::Create(fields) => {
            let category = engine
                .create_category(&fields.apply(CategoryParam::default()))
                .await?;
            print_json(&category)
        }
        CategoryCommand::Update { id, fields } => {
            let current = engine.category(id).await?;
            let param = fields.apply(CategoryParam {
                id,
                name: current.name,
                slug: current.slug,
                description: current.description,
                thumbnail: current.thumbnail,
                password: current.password,
                parent_id: current.parent_id,
                priority: current.priority,
            });
            print_json(&engine.update_category(&param).await?)
        }
        CategoryCommand::UpdateBatch { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let params: Vec<CategoryParam> = serde_json::from_str(&raw)?;
            print_json(&engine.update_categories(&params).await?)
        }
        CategoryCommand::Delete { id } => {
            engine.delete_category(id).await?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
        CategoryCommand::Get { id: Some(id), .. } => print_json(&engine.category(id).await?),
        CategoryCommand::Get { slug, .. } => {
            let slug = slug.unwrap_or_default();
            print_json(&engine.category_by_slug(&slug).await?)
        }
        CategoryCommand::List {
            order,
            with_post_count: true,
        } => print_json(&engine.list_categories_with_post_count(order.into()).await?),
        CategoryCommand::List { order, .. } => {
            print_json(&engine.list_categories(order.into()).await?)
        }
        CategoryCommand::Tree { fill_password } => {
            print_json(&engine.category_tree(fill_password).await?)
        }
        CategoryCommand::Children { parent_id } => {
            print_json(&engine.child_categories(parent_id).await?)
        }
    }
}

async fn run_post(engine: &Engine, command: PostCommand) -> Result<(), BoxError> {
    match command {
        PostCommand::Create {
            title,
            slug,
            password,
            status,
            categories,
        } => {
            let post = engine
                .create_post(&PostParam {
                    title,
                    slug,
                    password,
                    status: status.into(),
                    category_ids: categories,
                })
                .await?;
            print_json(&post)
        }
        PostCommand::Get { id } => {
            let post = engine.post(id).await?;
            let category_ids = engine.post_category_ids(id).await?;
            print_json(&serde_json::json!({ "post": post, "category_ids": category_ids }))
        }
    }
}

async fn run(cli: Cli, settings: settings::Settings) -> Result<(), BoxError> {
    let url = cli
        .database_url
        .unwrap_or_else(|| settings.database.url());
    let db = connect_db(&url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Category(Category { command }) => run_category(&engine, command).await,
        Command::Post(Post { command }) => run_post(&engine, command).await,
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(format!(
            "inkwell={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    if let Err(err) = run(cli, settings).await {
        tracing::error!("{err}");
        let bad_input = err
            .downcast_ref::<EngineError>()
            .is_some_and(EngineError::is_bad_input);
        std::process::exit(if bad_input { 2 } else { 1 });
    }

    Ok(())
}
