use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::TransactionTrait;

use crate::{
    EngineError, Post, PostParam, PostStatus, ResultEngine, store,
    store::NewPost,
    util::{normalize_password, slug_or_name},
};

use super::{Engine, with_tx};

impl Engine {
    /// Create a post filed under `category_ids`.
    ///
    /// Drafts and recycled posts keep their status. Any other post is
    /// Intimate when it has its own password or one of its categories is
    /// Intimate, Published otherwise.
    pub async fn create_post(&self, param: &PostParam) -> ResultEngine<Post> {
        let title = param.title.trim().to_string();
        if title.is_empty() {
            return Err(EngineError::InvalidPost(
                "post title must not be empty".to_string(),
            ));
        }
        let slug = slug_or_name(&param.slug, &title);
        let password = normalize_password(&param.password);
        let category_ids: Vec<i32> = param
            .category_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let now = Utc::now();

        let post = with_tx!(self, |db_tx| {
            let known = store::categories_by_ids(&db_tx, &category_ids).await?;
            if known.len() != category_ids.len() {
                return Err(EngineError::KeyNotFound(
                    "Category was not found".to_string(),
                ));
            }

            let status = match param.status {
                PostStatus::Draft | PostStatus::Recycle => param.status,
                _ if !password.is_empty() || known.iter().any(|c| c.is_intimate()) => {
                    PostStatus::Intimate
                }
                _ => PostStatus::Published,
            };

            let new = NewPost {
                title,
                slug,
                password,
                status,
            };
            let post = store::insert_post(&db_tx, new, now).await?;
            store::link_post(&db_tx, post.id, &category_ids).await?;
            Ok::<_, EngineError>(post)
        })?;

        tracing::info!(post_id = post.id, status = %post.status, "post created");
        Ok(post)
    }

    pub async fn post(&self, post_id: i32) -> ResultEngine<Post> {
        with_tx!(self, |db_tx| {
            store::find_post(&db_tx, post_id)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("Post was not found".to_string()))
        })
    }

    /// Ids of the categories a post is filed under, ascending.
    pub async fn post_category_ids(&self, post_id: i32) -> ResultEngine<Vec<i32>> {
        with_tx!(self, |db_tx| store::post_category_ids(&db_tx, post_id).await)
    }
}
