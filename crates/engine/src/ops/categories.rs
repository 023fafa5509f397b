use std::collections::HashSet;

use chrono::Utc;
use sea_orm::TransactionTrait;

use crate::{
    Category, CategoryNode, CategoryOrder, CategoryParam, CategoryType, CategoryWithPostCount,
    EngineError, ResultEngine, store,
    store::NewCategory,
    tree::TreeIndex,
    util::{normalize_password, normalize_required_name, slug_or_name},
};

use super::{Engine, with_tx};

fn sort_categories(categories: &mut [Category], order: CategoryOrder) {
    match order {
        CategoryOrder::Priority => {
            categories.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)))
        }
        CategoryOrder::Name => categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id))),
        CategoryOrder::Id => categories.sort_by_key(|category| category.id),
    }
}

fn build_node(
    tree: &TreeIndex,
    category: &Category,
    fill_password: bool,
    visited: &mut HashSet<i32>,
) -> CategoryNode {
    visited.insert(category.id);
    let mut children: Vec<Category> = tree
        .children_of(category.id)
        .iter()
        .filter(|id| !visited.contains(*id))
        .filter_map(|id| tree.get(*id).cloned())
        .collect();
    sort_categories(&mut children, CategoryOrder::Priority);

    let mut category = category.clone();
    if !fill_password {
        category.password.clear();
    }
    CategoryNode {
        category,
        children: children
            .iter()
            .map(|child| build_node(tree, child, fill_password, visited))
            .collect(),
    }
}

impl Engine {
    /// Create a category.
    ///
    /// The new category is Intimate when it has a password of its own or its
    /// parent is Intimate. It has no posts yet, so nothing else changes.
    pub async fn create_category(&self, param: &CategoryParam) -> ResultEngine<Category> {
        let name = normalize_required_name(&param.name, "category")?;
        let slug = slug_or_name(&param.slug, &name);
        let password = normalize_password(&param.password);
        let now = Utc::now();

        let category = with_tx!(self, |db_tx| {
            if store::name_taken(&db_tx, &name).await? {
                return Err(EngineError::ExistingKey(name));
            }
            if store::slug_taken(&db_tx, &slug).await? {
                return Err(EngineError::ExistingKey(slug));
            }

            let parent_type = if param.parent_id > 0 {
                let parent = store::find_category(&db_tx, param.parent_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::KeyNotFound("Parent Category was not found".to_string())
                    })?;
                Some(parent.category_type)
            } else {
                None
            };

            let new = NewCategory {
                parent_id: param.parent_id.max(0),
                name,
                slug,
                description: param.description.clone(),
                thumbnail: param.thumbnail.clone(),
                category_type: CategoryType::from_password(&password).inherit(parent_type),
                password,
                priority: param.priority,
            };
            store::insert_category(&db_tx, new, now).await
        })?;

        tracing::info!(category_id = category.id, "category created");
        Ok(category)
    }

    /// Update one category, propagating a type change to its subtree and to
    /// the posts filed under it.
    pub async fn update_category(&self, param: &CategoryParam) -> ResultEngine<Category> {
        let now = Utc::now();
        let category = with_tx!(self, |db_tx| self.execute_update(&db_tx, param, now).await)
            .inspect_err(|err| {
                if err.is_conflict() {
                    tracing::warn!(category_id = param.id, "category update aborted: {err}");
                }
            })?;

        tracing::info!(category_id = category.id, "category updated");
        Ok(category)
    }

    /// Update many categories at once, then re-derive every category type and
    /// the status of every affected post.
    ///
    /// Categories are returned in the order of `params`.
    pub async fn update_categories(
        &self,
        params: &[CategoryParam],
    ) -> ResultEngine<Vec<Category>> {
        if params.is_empty() {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let categories = with_tx!(self, |db_tx| {
            self.execute_update_batch(&db_tx, params, now).await
        })
        .inspect_err(|err| {
            if err.is_conflict() {
                tracing::warn!(count = params.len(), "category batch update aborted: {err}");
            }
        })?;

        tracing::info!(count = categories.len(), "categories updated");
        Ok(categories)
    }

    /// Delete a category.
    ///
    /// Its children move up to its parent (or become roots) and posts filed
    /// only under it move to the parent (or lose their category).
    pub async fn delete_category(&self, category_id: i32) -> ResultEngine<()> {
        let now = Utc::now();
        with_tx!(self, |db_tx| {
            self.execute_delete(&db_tx, category_id, now).await
        })
        .inspect_err(|err| {
            if err.is_conflict() {
                tracing::warn!(category_id, "category delete aborted: {err}");
            }
        })?;

        tracing::info!(category_id, "category deleted");
        Ok(())
    }

    pub async fn category(&self, category_id: i32) -> ResultEngine<Category> {
        with_tx!(self, |db_tx| {
            store::find_category(&db_tx, category_id)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("Category was not found".to_string()))
        })
    }

    pub async fn category_by_slug(&self, slug: &str) -> ResultEngine<Category> {
        with_tx!(self, |db_tx| {
            store::find_category_by_slug(&db_tx, slug)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("Category was not found".to_string()))
        })
    }

    pub async fn list_categories(&self, order: CategoryOrder) -> ResultEngine<Vec<Category>> {
        let mut categories = with_tx!(self, |db_tx| store::load_all_categories(&db_tx).await)?;
        sort_categories(&mut categories, order);
        Ok(categories)
    }

    /// Categories with the given ids; unknown ids are skipped.
    pub async fn categories_by_ids(&self, ids: &[i32]) -> ResultEngine<Vec<Category>> {
        let mut categories =
            with_tx!(self, |db_tx| store::categories_by_ids(&db_tx, ids).await)?;
        sort_categories(&mut categories, CategoryOrder::Id);
        Ok(categories)
    }

    pub async fn list_categories_with_post_count(
        &self,
        order: CategoryOrder,
    ) -> ResultEngine<Vec<CategoryWithPostCount>> {
        let (mut categories, counts) = with_tx!(self, |db_tx| {
            let categories = store::load_all_categories(&db_tx).await?;
            let counts = store::post_counts(&db_tx).await?;
            Ok::<_, EngineError>((categories, counts))
        })?;
        sort_categories(&mut categories, order);

        Ok(categories
            .into_iter()
            .map(|category| {
                let post_count = counts.get(&category.id).copied().unwrap_or_default();
                CategoryWithPostCount {
                    category,
                    post_count,
                }
            })
            .collect())
    }

    /// Every category nested under its parent, roots first.
    ///
    /// Passwords are blanked unless `fill_password` is set. A category whose
    /// parent does not exist is listed as a root.
    pub async fn category_tree(&self, fill_password: bool) -> ResultEngine<Vec<CategoryNode>> {
        let tree = TreeIndex::new(with_tx!(self, |db_tx| {
            store::load_all_categories(&db_tx).await
        })?);

        let mut roots: Vec<Category> = tree
            .categories()
            .filter(|category| category.parent_id <= 0 || !tree.contains(category.parent_id))
            .cloned()
            .collect();
        sort_categories(&mut roots, CategoryOrder::Priority);

        let mut visited = HashSet::new();
        Ok(roots
            .iter()
            .map(|root| build_node(&tree, root, fill_password, &mut visited))
            .collect())
    }

    /// Every descendant of `parent_id`, breadth first. `0` lists all categories.
    pub async fn child_categories(&self, parent_id: i32) -> ResultEngine<Vec<Category>> {
        let tree = TreeIndex::new(with_tx!(self, |db_tx| {
            store::load_all_categories(&db_tx).await
        })?);
        Ok(tree.descendants_of(parent_id).into_iter().cloned().collect())
    }

    /// Whether any of the given categories is Intimate.
    pub async fn is_categories_intimate(&self, ids: &[i32]) -> ResultEngine<bool> {
        if ids.is_empty() {
            return Ok(false);
        }
        with_tx!(self, |db_tx| store::any_intimate(&db_tx, ids).await)
    }

    pub async fn count_categories(&self) -> ResultEngine<u64> {
        with_tx!(self, |db_tx| store::count_categories(&db_tx).await)
    }
}
