//! Data access for the category engine.
//!
//! Every function runs on the transaction handed in by the caller, so a
//! mutation made of several calls commits or rolls back as one. No tree logic
//! lives here.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, QuerySelect,
    prelude::*,
    sea_query::{Expr, OnConflict, Query},
};

use crate::{
    Category, CategoryType, EngineError, Post, PostStatus, ResultEngine, categories,
    post_categories, posts,
};

/// A category row that has not been inserted yet.
pub(crate) struct NewCategory {
    pub(crate) parent_id: i32,
    pub(crate) name: String,
    pub(crate) slug: String,
    pub(crate) description: String,
    pub(crate) thumbnail: String,
    pub(crate) password: String,
    pub(crate) category_type: CategoryType,
    pub(crate) priority: i32,
}

pub(crate) struct NewPost {
    pub(crate) title: String,
    pub(crate) slug: String,
    pub(crate) password: String,
    pub(crate) status: PostStatus,
}

/// Eligible posts linked to a set of categories, with all their links.
pub(crate) struct LoadedPosts {
    pub(crate) posts: HashMap<i32, Post>,
    pub(crate) links: HashMap<i32, Vec<i32>>,
}

fn expect_rows(rows_affected: u64, expected: usize, what: &str) -> ResultEngine<()> {
    if rows_affected != expected as u64 {
        return Err(EngineError::Conflict(format!(
            "{what} affected {rows_affected} rows, expected {expected}"
        )));
    }
    Ok(())
}

fn to_categories(models: Vec<categories::Model>) -> ResultEngine<Vec<Category>> {
    models.into_iter().map(Category::try_from).collect()
}

pub(crate) async fn load_all_categories(db: &DatabaseTransaction) -> ResultEngine<Vec<Category>> {
    to_categories(categories::Entity::find().all(db).await?)
}

pub(crate) async fn categories_by_ids(
    db: &DatabaseTransaction,
    ids: &[i32],
) -> ResultEngine<Vec<Category>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    to_categories(
        categories::Entity::find()
            .filter(categories::Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?,
    )
}

pub(crate) async fn find_category(
    db: &DatabaseTransaction,
    id: i32,
) -> ResultEngine<Option<Category>> {
    categories::Entity::find_by_id(id)
        .one(db)
        .await?
        .map(Category::try_from)
        .transpose()
}

pub(crate) async fn find_category_by_slug(
    db: &DatabaseTransaction,
    slug: &str,
) -> ResultEngine<Option<Category>> {
    categories::Entity::find()
        .filter(categories::Column::Slug.eq(slug))
        .one(db)
        .await?
        .map(Category::try_from)
        .transpose()
}

pub(crate) async fn count_categories(db: &DatabaseTransaction) -> ResultEngine<u64> {
    Ok(categories::Entity::find().count(db).await?)
}

pub(crate) async fn name_taken(db: &DatabaseTransaction, name: &str) -> ResultEngine<bool> {
    let count = categories::Entity::find()
        .filter(categories::Column::Name.eq(name))
        .count(db)
        .await?;
    Ok(count > 0)
}

pub(crate) async fn slug_taken(db: &DatabaseTransaction, slug: &str) -> ResultEngine<bool> {
    let count = categories::Entity::find()
        .filter(categories::Column::Slug.eq(slug))
        .count(db)
        .await?;
    Ok(count > 0)
}

pub(crate) async fn any_intimate(db: &DatabaseTransaction, ids: &[i32]) -> ResultEngine<bool> {
    if ids.is_empty() {
        return Ok(false);
    }
    let count = categories::Entity::find()
        .filter(categories::Column::Id.is_in(ids.iter().copied()))
        .filter(categories::Column::Kind.eq(CategoryType::Intimate.as_i32()))
        .count(db)
        .await?;
    Ok(count > 0)
}

pub(crate) async fn insert_category(
    db: &DatabaseTransaction,
    new: NewCategory,
    now: DateTime<Utc>,
) -> ResultEngine<Category> {
    let active = categories::ActiveModel {
        id: ActiveValue::NotSet,
        parent_id: ActiveValue::Set(new.parent_id),
        name: ActiveValue::Set(new.name),
        slug: ActiveValue::Set(new.slug),
        description: ActiveValue::Set(new.description),
        thumbnail: ActiveValue::Set(new.thumbnail),
        password: ActiveValue::Set(new.password),
        kind: ActiveValue::Set(new.category_type.as_i32()),
        priority: ActiveValue::Set(new.priority),
        create_time: ActiveValue::Set(now),
        update_time: ActiveValue::NotSet,
    };
    Category::try_from(active.insert(db).await?)
}

/// Overwrite every column of an existing row but `id` and `create_time`.
pub(crate) async fn update_category_row(
    db: &DatabaseTransaction,
    category: &Category,
) -> ResultEngine<()> {
    let mut active = categories::ActiveModel::from(category);
    active.id = ActiveValue::NotSet;
    active.create_time = ActiveValue::NotSet;

    let result = categories::Entity::update_many()
        .set(active)
        .filter(categories::Column::Id.eq(category.id))
        .exec(db)
        .await?;
    expect_rows(result.rows_affected, 1, "category update")
}

/// Write many existing rows in one statement, leaving `create_time` alone.
pub(crate) async fn upsert_category_rows(
    db: &DatabaseTransaction,
    rows: &[Category],
) -> ResultEngine<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let models = rows.iter().map(categories::ActiveModel::from);
    categories::Entity::insert_many(models)
        .on_conflict(
            OnConflict::column(categories::Column::Id)
                .update_columns([
                    categories::Column::ParentId,
                    categories::Column::Name,
                    categories::Column::Slug,
                    categories::Column::Description,
                    categories::Column::Thumbnail,
                    categories::Column::Password,
                    categories::Column::Kind,
                    categories::Column::Priority,
                    categories::Column::UpdateTime,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

pub(crate) async fn batch_set_category_type(
    db: &DatabaseTransaction,
    ids: &[i32],
    category_type: CategoryType,
) -> ResultEngine<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let result = categories::Entity::update_many()
        .col_expr(categories::Column::Kind, Expr::value(category_type.as_i32()))
        .filter(categories::Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    expect_rows(result.rows_affected, ids.len(), "category type update")
}

pub(crate) async fn reparent_categories(
    db: &DatabaseTransaction,
    ids: &[i32],
    new_parent: i32,
) -> ResultEngine<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let result = categories::Entity::update_many()
        .col_expr(categories::Column::ParentId, Expr::value(new_parent))
        .filter(categories::Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    expect_rows(result.rows_affected, ids.len(), "category reparent")
}

pub(crate) async fn delete_category(db: &DatabaseTransaction, id: i32) -> ResultEngine<()> {
    let result = categories::Entity::delete_by_id(id).exec(db).await?;
    expect_rows(result.rows_affected, 1, "category delete")
}

/// Eligible posts (no own password, neither Draft nor Recycle) linked to any
/// of `category_ids`, together with every category each of them is linked to.
pub(crate) async fn load_eligible_posts_for_categories(
    db: &DatabaseTransaction,
    category_ids: &[i32],
) -> ResultEngine<LoadedPosts> {
    let mut loaded = LoadedPosts {
        posts: HashMap::new(),
        links: HashMap::new(),
    };
    if category_ids.is_empty() {
        return Ok(loaded);
    }

    let linked = Query::select()
        .column(post_categories::Column::PostId)
        .from(post_categories::Entity)
        .and_where(post_categories::Column::CategoryId.is_in(category_ids.iter().copied()))
        .to_owned();
    let models = posts::Entity::find()
        .filter(posts::Column::Password.eq(""))
        .filter(
            posts::Column::Status
                .is_not_in([PostStatus::Draft.as_i32(), PostStatus::Recycle.as_i32()]),
        )
        .filter(posts::Column::Id.in_subquery(linked))
        .all(db)
        .await?;
    if models.is_empty() {
        return Ok(loaded);
    }

    for model in models {
        let post = Post::try_from(model)?;
        loaded.posts.insert(post.id, post);
    }
    let rows = post_categories::Entity::find()
        .filter(post_categories::Column::PostId.is_in(loaded.posts.keys().copied()))
        .all(db)
        .await?;
    for row in rows {
        loaded
            .links
            .entry(row.post_id)
            .or_default()
            .push(row.category_id);
    }
    Ok(loaded)
}

/// Set `status` on `ids`, never touching drafts.
pub(crate) async fn batch_set_post_status(
    db: &DatabaseTransaction,
    ids: &[i32],
    status: PostStatus,
    now: DateTime<Utc>,
) -> ResultEngine<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let result = posts::Entity::update_many()
        .col_expr(posts::Column::Status, Expr::value(status.as_i32()))
        .col_expr(posts::Column::UpdateTime, Expr::value(now))
        .filter(posts::Column::Id.is_in(ids.iter().copied()))
        .filter(posts::Column::Status.ne(PostStatus::Draft.as_i32()))
        .exec(db)
        .await?;
    expect_rows(result.rows_affected, ids.len(), "post status update")
}

/// Move every post linked *only* to `from` over to `to`, then drop all links
/// to `from`. Without a `to` those posts end up uncategorized.
///
/// Returns the ids of the posts that were linked only to `from`.
pub(crate) async fn reassign_post_category(
    db: &DatabaseTransaction,
    from: i32,
    to: Option<i32>,
) -> ResultEngine<Vec<i32>> {
    let post_ids: Vec<i32> = post_categories::Entity::find()
        .filter(post_categories::Column::CategoryId.eq(from))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.post_id)
        .collect();
    if post_ids.is_empty() {
        return Ok(Vec::new());
    }

    let with_other_links: Vec<i32> = post_categories::Entity::find()
        .filter(post_categories::Column::PostId.is_in(post_ids.iter().copied()))
        .filter(post_categories::Column::CategoryId.ne(from))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.post_id)
        .collect();
    let mut orphans: Vec<i32> = post_ids
        .into_iter()
        .filter(|id| !with_other_links.contains(id))
        .collect();
    orphans.sort_unstable();
    orphans.dedup();

    if let Some(to) = to
        && !orphans.is_empty()
    {
        let rows = orphans.iter().map(|&post_id| post_categories::ActiveModel {
            id: ActiveValue::NotSet,
            post_id: ActiveValue::Set(post_id),
            category_id: ActiveValue::Set(to),
        });
        post_categories::Entity::insert_many(rows)
            .exec_without_returning(db)
            .await?;
    }

    post_categories::Entity::delete_many()
        .filter(post_categories::Column::CategoryId.eq(from))
        .exec(db)
        .await?;
    Ok(orphans)
}

/// Number of posts linked to each category that has any.
pub(crate) async fn post_counts(db: &DatabaseTransaction) -> ResultEngine<HashMap<i32, u64>> {
    let rows: Vec<(i32, i64)> = post_categories::Entity::find()
        .select_only()
        .column(post_categories::Column::CategoryId)
        .column_as(post_categories::Column::PostId.count(), "post_count")
        .group_by(post_categories::Column::CategoryId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(category_id, count)| (category_id, u64::try_from(count).unwrap_or_default()))
        .collect())
}

pub(crate) async fn insert_post(
    db: &DatabaseTransaction,
    new: NewPost,
    now: DateTime<Utc>,
) -> ResultEngine<Post> {
    let active = posts::ActiveModel {
        id: ActiveValue::NotSet,
        title: ActiveValue::Set(new.title),
        slug: ActiveValue::Set(new.slug),
        password: ActiveValue::Set(new.password),
        status: ActiveValue::Set(new.status.as_i32()),
        create_time: ActiveValue::Set(now),
        update_time: ActiveValue::NotSet,
    };
    Post::try_from(active.insert(db).await?)
}

pub(crate) async fn find_post(db: &DatabaseTransaction, id: i32) -> ResultEngine<Option<Post>> {
    posts::Entity::find_by_id(id)
        .one(db)
        .await?
        .map(Post::try_from)
        .transpose()
}

pub(crate) async fn link_post(
    db: &DatabaseTransaction,
    post_id: i32,
    category_ids: &[i32],
) -> ResultEngine<()> {
    if category_ids.is_empty() {
        return Ok(());
    }
    let rows = category_ids
        .iter()
        .map(|&category_id| post_categories::ActiveModel {
            id: ActiveValue::NotSet,
            post_id: ActiveValue::Set(post_id),
            category_id: ActiveValue::Set(category_id),
        });
    post_categories::Entity::insert_many(rows)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

pub(crate) async fn post_category_ids(
    db: &DatabaseTransaction,
    post_id: i32,
) -> ResultEngine<Vec<i32>> {
    let mut ids: Vec<i32> = post_categories::Entity::find()
        .filter(post_categories::Column::PostId.eq(post_id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.category_id)
        .collect();
    ids.sort_unstable();
    Ok(ids)
}
