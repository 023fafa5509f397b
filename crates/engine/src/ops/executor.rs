//! Category mutations that have to keep types and post statuses consistent.
//!
//! Each mutation goes through the same stages on one transaction:
//! load a [`Snapshot`], write the row change, re-derive category types,
//! re-derive post statuses. The caller commits; any error drops the
//! transaction and nothing of the propagation becomes visible.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseTransaction;

use crate::{
    Category, CategoryParam, CategoryType, EngineError, PostStatus, ResultEngine, propagation,
    propagation::TypeAssignment,
    snapshot::Snapshot,
    store,
    tree::TreeIndex,
    util::{normalize_password, normalize_required_name, slug_or_name},
    visibility,
};

use super::Engine;

fn category_not_found() -> EngineError {
    EngineError::KeyNotFound("Category was not found".to_string())
}

fn parent_not_found() -> EngineError {
    EngineError::KeyNotFound("Parent Category was not found".to_string())
}

/// Row produced by applying `param` on top of `current`.
///
/// The type is provisional: it only accounts for the own password and the
/// given parent type.
fn updated_row(
    current: &Category,
    param: &CategoryParam,
    parent_type: Option<CategoryType>,
    now: DateTime<Utc>,
) -> ResultEngine<Category> {
    let name = normalize_required_name(&param.name, "category")?;
    let password = normalize_password(&param.password);
    Ok(Category {
        id: current.id,
        parent_id: param.parent_id.max(0),
        slug: slug_or_name(&param.slug, &name),
        name,
        description: param.description.clone(),
        thumbnail: param.thumbnail.clone(),
        category_type: CategoryType::from_password(&password).inherit(parent_type),
        password,
        priority: param.priority,
        create_time: current.create_time,
        update_time: Some(now),
    })
}

impl Engine {
    /// Load every category and the eligible posts of the categories in scope.
    ///
    /// `roots` limits the posts to those linked to the given categories or
    /// any of their descendants; `None` loads the posts of every category.
    pub(super) async fn prepare_snapshot(
        &self,
        db_tx: &DatabaseTransaction,
        roots: Option<&[i32]>,
    ) -> ResultEngine<Snapshot> {
        let tree = TreeIndex::new(store::load_all_categories(db_tx).await?);

        let scope: Vec<i32> = match roots {
            None => tree.ids().collect(),
            Some(roots) => {
                let mut scope: HashSet<i32> = roots.iter().copied().collect();
                for &root in roots {
                    scope.extend(tree.descendant_ids(root));
                }
                scope.into_iter().collect()
            }
        };
        let loaded = store::load_eligible_posts_for_categories(db_tx, &scope).await?;

        tracing::debug!(
            categories = tree.len(),
            scope = scope.len(),
            posts = loaded.posts.len(),
            "snapshot prepared"
        );
        Ok(Snapshot {
            tree,
            posts: loaded.posts,
            links: loaded.links,
        })
    }

    /// Persist the part of `assignment` that differs from the snapshot, then
    /// record it in the snapshot.
    async fn persist_types(
        &self,
        db_tx: &DatabaseTransaction,
        snapshot: &mut Snapshot,
        assignment: &TypeAssignment,
    ) -> ResultEngine<()> {
        let changes = assignment.changes(&snapshot.tree);
        tracing::debug!(
            in_scope = assignment.len(),
            to_intimate = changes.to_intimate.len(),
            to_normal = changes.to_normal.len(),
            "category types propagated"
        );

        store::batch_set_category_type(db_tx, &changes.to_intimate, CategoryType::Intimate)
            .await?;
        store::batch_set_category_type(db_tx, &changes.to_normal, CategoryType::Normal).await?;
        changes.apply(&mut snapshot.tree);
        Ok(())
    }

    /// Re-derive the types below `root_id`, whose own type is `root_type`.
    pub(super) async fn propagate_subtree(
        &self,
        db_tx: &DatabaseTransaction,
        snapshot: &mut Snapshot,
        root_id: i32,
        root_type: CategoryType,
    ) -> ResultEngine<()> {
        let assignment = propagation::refresh_subtree(&snapshot.tree, root_id, root_type);
        self.persist_types(db_tx, snapshot, &assignment).await
    }

    pub(super) async fn propagate_whole_tree(
        &self,
        db_tx: &DatabaseTransaction,
        snapshot: &mut Snapshot,
    ) -> ResultEngine<()> {
        let assignment = propagation::refresh_whole_tree(&snapshot.tree);
        self.persist_types(db_tx, snapshot, &assignment).await
    }

    /// Bring the status of the loaded posts in line with the snapshot types.
    pub(super) async fn synchronize_posts(
        &self,
        db_tx: &DatabaseTransaction,
        snapshot: &mut Snapshot,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let changes = visibility::synchronize(&snapshot.tree, &snapshot.posts, &snapshot.links);
        tracing::debug!(
            to_intimate = changes.to_intimate.len(),
            to_published = changes.to_published.len(),
            "post statuses synchronized"
        );

        store::batch_set_post_status(db_tx, &changes.to_intimate, PostStatus::Intimate, now)
            .await?;
        store::batch_set_post_status(db_tx, &changes.to_published, PostStatus::Published, now)
            .await?;
        changes.apply(&mut snapshot.posts);
        Ok(())
    }

    /// Type of the parent a category is about to be attached to.
    ///
    /// Rejects unknown parents and parents that would close a cycle.
    fn resolve_new_parent(
        tree: &TreeIndex,
        category_id: i32,
        parent_id: i32,
    ) -> ResultEngine<Option<CategoryType>> {
        if parent_id <= 0 {
            return Ok(None);
        }
        let parent = tree.get(parent_id).ok_or_else(parent_not_found)?;
        if parent_id == category_id {
            return Err(EngineError::InvalidCategory(
                "category cannot be its own parent".to_string(),
            ));
        }
        if tree.is_descendant(category_id, parent_id) {
            return Err(EngineError::InvalidCategory(
                "category cannot be moved under one of its descendants".to_string(),
            ));
        }
        Ok(Some(parent.category_type))
    }

    pub(super) async fn execute_update(
        &self,
        db_tx: &DatabaseTransaction,
        param: &CategoryParam,
        now: DateTime<Utc>,
    ) -> ResultEngine<Category> {
        let mut snapshot = self.prepare_snapshot(db_tx, Some(&[param.id])).await?;
        let current = snapshot
            .tree
            .get(param.id)
            .cloned()
            .ok_or_else(category_not_found)?;
        let parent_type = Self::resolve_new_parent(&snapshot.tree, param.id, param.parent_id)?;

        let updated = updated_row(&current, param, parent_type, now)?;
        store::update_category_row(db_tx, &updated).await?;

        if current.category_type != updated.category_type {
            snapshot.tree.set_type(updated.id, updated.category_type);
            self.propagate_subtree(db_tx, &mut snapshot, updated.id, updated.category_type)
                .await?;
            self.synchronize_posts(db_tx, &mut snapshot, now).await?;
        }
        Ok(updated)
    }

    pub(super) async fn execute_update_batch(
        &self,
        db_tx: &DatabaseTransaction,
        params: &[CategoryParam],
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<Category>> {
        let current = TreeIndex::new(store::load_all_categories(db_tx).await?);

        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(params.len());
        for param in params {
            if !seen.insert(param.id) {
                return Err(EngineError::InvalidCategory(format!(
                    "category {} listed more than once",
                    param.id
                )));
            }
            let existing = current.get(param.id).ok_or_else(category_not_found)?;
            rows.push(updated_row(existing, param, None, now)?);
        }

        // Validate the hierarchy as it will look once every row is written.
        let prospective = TreeIndex::new(
            current
                .categories()
                .filter(|category| !seen.contains(&category.id))
                .cloned()
                .chain(rows.iter().cloned()),
        );
        for row in &rows {
            if row.parent_id > 0 && !prospective.contains(row.parent_id) {
                return Err(parent_not_found());
            }
        }
        if let Some(id) = prospective.find_cycle() {
            return Err(EngineError::InvalidCategory(format!(
                "category {id} would become its own ancestor"
            )));
        }

        store::upsert_category_rows(db_tx, &rows).await?;

        let mut snapshot = self.prepare_snapshot(db_tx, None).await?;
        self.propagate_whole_tree(db_tx, &mut snapshot).await?;
        self.synchronize_posts(db_tx, &mut snapshot, now).await?;

        params
            .iter()
            .map(|param| snapshot.tree.get(param.id).cloned().ok_or_else(category_not_found))
            .collect()
    }

    pub(super) async fn execute_delete(
        &self,
        db_tx: &DatabaseTransaction,
        category_id: i32,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let mut snapshot = self.prepare_snapshot(db_tx, Some(&[category_id])).await?;
        let current = snapshot
            .tree
            .get(category_id)
            .cloned()
            .ok_or_else(category_not_found)?;
        let parent = snapshot.tree.parent_of(category_id).cloned();

        // Children only inherited Intimate from the deleted category when
        // nothing above it was Intimate too.
        let parent_is_normal = parent.as_ref().is_none_or(|parent| !parent.is_intimate());
        if current.is_intimate() && parent_is_normal {
            self.propagate_subtree(db_tx, &mut snapshot, category_id, CategoryType::Normal)
                .await?;
        }

        let new_parent = parent.as_ref().map(|parent| parent.id);
        let relinked = store::reassign_post_category(db_tx, category_id, new_parent).await?;
        snapshot.unlink_category(category_id, new_parent);

        let children = snapshot.tree.remove(category_id, new_parent.unwrap_or(0));
        store::reparent_categories(db_tx, &children, new_parent.unwrap_or(0)).await?;
        store::delete_category(db_tx, category_id).await?;
        tracing::debug!(
            category_id,
            relinked_posts = relinked.len(),
            reparented = children.len(),
            "category detached"
        );

        self.synchronize_posts(db_tx, &mut snapshot, now).await
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{ConnectionTrait, Database, TransactionTrait};

    use super::*;
    use crate::{CategoryParam, PostParam};
    use migration::MigratorTrait;

    async fn engine() -> Engine {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        Engine::builder().database(db).build().await.unwrap()
    }

    fn param(name: &str, parent_id: i32, password: &str) -> CategoryParam {
        CategoryParam {
            name: name.to_string(),
            password: password.to_string(),
            parent_id,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rolled_back_propagation_is_not_observable() {
        let engine = engine().await;
        let diary = engine.create_category(&param("Diary", 0, "")).await.unwrap();
        let travel = engine
            .create_category(&param("Travel", diary.id, ""))
            .await
            .unwrap();
        let post = engine
            .create_post(&PostParam {
                title: "Lisbon".to_string(),
                status: PostStatus::Published,
                category_ids: vec![travel.id],
                ..Default::default()
            })
            .await
            .unwrap();

        let db_tx = engine.database.begin().await.unwrap();
        let mut snapshot = engine
            .prepare_snapshot(&db_tx, Some(&[diary.id]))
            .await
            .unwrap();
        assert!(snapshot.posts.contains_key(&post.id));
        engine
            .propagate_subtree(&db_tx, &mut snapshot, diary.id, CategoryType::Intimate)
            .await
            .unwrap();
        assert_eq!(
            snapshot.tree.type_of(travel.id),
            Some(CategoryType::Intimate)
        );
        // Fail before post synchronization.
        db_tx.rollback().await.unwrap();

        let travel = engine.category(travel.id).await.unwrap();
        assert_eq!(travel.category_type, CategoryType::Normal);
        let post = engine.post(post.id).await.unwrap();
        assert_eq!(post.status, PostStatus::Published);
    }

    #[tokio::test]
    async fn snapshot_scope_follows_descendants() {
        let engine = engine().await;
        let root = engine.create_category(&param("Root", 0, "")).await.unwrap();
        let child = engine
            .create_category(&param("Child", root.id, ""))
            .await
            .unwrap();
        let other = engine.create_category(&param("Other", 0, "")).await.unwrap();
        let below = engine
            .create_post(&PostParam {
                title: "Below".to_string(),
                status: PostStatus::Published,
                category_ids: vec![child.id],
                ..Default::default()
            })
            .await
            .unwrap();
        let elsewhere = engine
            .create_post(&PostParam {
                title: "Elsewhere".to_string(),
                status: PostStatus::Published,
                category_ids: vec![other.id],
                ..Default::default()
            })
            .await
            .unwrap();
        let draft = engine
            .create_post(&PostParam {
                title: "Draft".to_string(),
                status: PostStatus::Draft,
                category_ids: vec![child.id],
                ..Default::default()
            })
            .await
            .unwrap();

        let db_tx = engine.database.begin().await.unwrap();
        let scoped = engine
            .prepare_snapshot(&db_tx, Some(&[root.id]))
            .await
            .unwrap();
        assert!(scoped.posts.contains_key(&below.id));
        assert!(!scoped.posts.contains_key(&elsewhere.id));
        assert!(!scoped.posts.contains_key(&draft.id));
        assert_eq!(scoped.links[&below.id], vec![child.id]);

        let everything = engine.prepare_snapshot(&db_tx, None).await.unwrap();
        assert!(everything.posts.contains_key(&elsewhere.id));
        assert_eq!(everything.tree.len(), 3);
        db_tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn vanished_descendant_aborts_with_conflict() {
        let engine = engine().await;
        let diary = engine.create_category(&param("Diary", 0, "")).await.unwrap();
        let travel = engine
            .create_category(&param("Travel", diary.id, ""))
            .await
            .unwrap();
        let drafts = engine
            .create_category(&param("Drafts", diary.id, ""))
            .await
            .unwrap();
        let post = engine
            .create_post(&PostParam {
                title: "Lisbon".to_string(),
                status: PostStatus::Published,
                category_ids: vec![travel.id],
                ..Default::default()
            })
            .await
            .unwrap();

        let db_tx = engine.database.begin().await.unwrap();
        let mut snapshot = engine
            .prepare_snapshot(&db_tx, Some(&[diary.id]))
            .await
            .unwrap();
        // Another writer removes a row the snapshot still knows about.
        db_tx
            .execute_unprepared(&format!("DELETE FROM categories WHERE id = {}", drafts.id))
            .await
            .unwrap();

        let err = engine
            .propagate_subtree(&db_tx, &mut snapshot, diary.id, CategoryType::Intimate)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(matches!(err, EngineError::Conflict(_)));
        db_tx.rollback().await.unwrap();

        for id in [diary.id, travel.id, drafts.id] {
            let category = engine.category(id).await.unwrap();
            assert_eq!(category.category_type, CategoryType::Normal);
        }
        let post = engine.post(post.id).await.unwrap();
        assert_eq!(post.status, PostStatus::Published);
    }
}
