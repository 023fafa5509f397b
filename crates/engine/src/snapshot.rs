//! The state one mutation works on.
//!
//! Loaded once at the start of a transaction, threaded through tree index,
//! type propagation and post synchronization, then dropped after commit.

use std::collections::HashMap;

use crate::{Post, tree::TreeIndex};

#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub tree: TreeIndex,
    /// Eligible posts linked to the categories in scope, by id.
    pub posts: HashMap<i32, Post>,
    /// Category ids of each loaded post.
    pub links: HashMap<i32, Vec<i32>>,
}

impl Snapshot {
    /// Forget `category_id` on every loaded post; posts left without any
    /// category get `fallback` instead, when given.
    pub fn unlink_category(&mut self, category_id: i32, fallback: Option<i32>) {
        for category_ids in self.links.values_mut() {
            if !category_ids.contains(&category_id) {
                continue;
            }
            category_ids.retain(|&id| id != category_id);
            if category_ids.is_empty()
                && let Some(parent) = fallback
            {
                category_ids.push(parent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlink_falls_back_only_for_orphans() {
        let mut snapshot = Snapshot {
            links: HashMap::from([(1, vec![5]), (2, vec![5, 6]), (3, vec![6])]),
            ..Default::default()
        };
        snapshot.unlink_category(5, Some(9));
        assert_eq!(snapshot.links[&1], vec![9]);
        assert_eq!(snapshot.links[&2], vec![6]);
        assert_eq!(snapshot.links[&3], vec![6]);

        snapshot.unlink_category(6, None);
        assert!(snapshot.links[&2].is_empty());
    }
}
