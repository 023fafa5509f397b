//! Post status derived from category types.
//!
//! An eligible post (no own password, neither Draft nor Recycle) is Intimate
//! iff at least one of its categories is Intimate, Published otherwise.

use std::collections::HashMap;

use crate::{Post, PostStatus, tree::TreeIndex};

/// Posts whose status has to flip.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusChanges {
    pub to_intimate: Vec<i32>,
    pub to_published: Vec<i32>,
}

impl StatusChanges {
    pub fn is_empty(&self) -> bool {
        self.to_intimate.is_empty() && self.to_published.is_empty()
    }

    /// Record the new statuses in the loaded posts.
    pub fn apply(&self, posts: &mut HashMap<i32, Post>) {
        for id in &self.to_intimate {
            if let Some(post) = posts.get_mut(id) {
                post.status = PostStatus::Intimate;
            }
        }
        for id in &self.to_published {
            if let Some(post) = posts.get_mut(id) {
                post.status = PostStatus::Published;
            }
        }
    }
}

/// Compare each loaded post against the types in `tree`.
///
/// `links` maps a post id to its category ids. Category ids missing from the
/// tree (for example a category removed in this very operation) count as
/// Normal. Posts that are not eligible are skipped even if they were loaded.
pub fn synchronize(
    tree: &TreeIndex,
    posts: &HashMap<i32, Post>,
    links: &HashMap<i32, Vec<i32>>,
) -> StatusChanges {
    let mut changes = StatusChanges::default();

    for (id, post) in posts {
        if !post.is_eligible() {
            continue;
        }
        let needs_intimate = links.get(id).is_some_and(|category_ids| {
            category_ids
                .iter()
                .any(|category_id| tree.type_of(*category_id).is_some_and(|t| t.is_intimate()))
        });

        match (needs_intimate, post.status) {
            (true, PostStatus::Intimate) | (false, PostStatus::Published) => {}
            (true, _) => changes.to_intimate.push(*id),
            (false, PostStatus::Intimate) => changes.to_published.push(*id),
            (false, _) => {}
        }
    }

    changes.to_intimate.sort_unstable();
    changes.to_published.sort_unstable();
    changes
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{CategoryType, tree::tests::category};

    fn post(id: i32, password: &str, status: PostStatus) -> Post {
        Post {
            id,
            title: format!("post-{id}"),
            slug: format!("post-{id}"),
            password: password.to_string(),
            status,
            create_time: Utc.timestamp_opt(0, 0).unwrap(),
            update_time: None,
        }
    }

    fn tree() -> TreeIndex {
        let mut tree = TreeIndex::new([category(1, 0, "secret"), category(2, 0, "")]);
        tree.set_type(1, CategoryType::Intimate);
        tree
    }

    #[test]
    fn any_intimate_category_wins() {
        let posts = HashMap::from([
            (10, post(10, "", PostStatus::Published)),
            (11, post(11, "", PostStatus::Published)),
            (12, post(12, "", PostStatus::Intimate)),
            (13, post(13, "", PostStatus::Intimate)),
        ]);
        let links = HashMap::from([
            (10, vec![1, 2]),
            (11, vec![2]),
            (12, vec![2]),
            (13, vec![1]),
        ]);
        let changes = synchronize(&tree(), &posts, &links);
        assert_eq!(changes.to_intimate, vec![10]);
        assert_eq!(changes.to_published, vec![12]);
    }

    #[test]
    fn ineligible_posts_are_never_touched() {
        let posts = HashMap::from([
            (20, post(20, "own", PostStatus::Intimate)),
            (21, post(21, "", PostStatus::Draft)),
            (22, post(22, "", PostStatus::Recycle)),
        ]);
        let links = HashMap::from([(20, vec![2]), (21, vec![1]), (22, vec![1])]);
        assert!(synchronize(&tree(), &posts, &links).is_empty());
    }

    #[test]
    fn unknown_or_missing_categories_count_as_normal() {
        let posts = HashMap::from([
            (30, post(30, "", PostStatus::Intimate)),
            (31, post(31, "", PostStatus::Intimate)),
        ]);
        let links = HashMap::from([(30, vec![99])]);
        let changes = synchronize(&tree(), &posts, &links);
        assert_eq!(changes.to_published, vec![30, 31]);
    }

    #[test]
    fn apply_updates_loaded_posts() {
        let mut posts = HashMap::from([(40, post(40, "", PostStatus::Published))]);
        let links = HashMap::from([(40, vec![1])]);
        let changes = synchronize(&tree(), &posts, &links);
        changes.apply(&mut posts);
        assert_eq!(posts[&40].status, PostStatus::Intimate);
        assert!(synchronize(&tree(), &posts, &links).is_empty());
    }
}
