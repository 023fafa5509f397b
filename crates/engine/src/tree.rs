//! In-memory index over the flat `categories` table.
//!
//! The store keeps the hierarchy as rows with a `parent_id` pointer. Every
//! mutation rebuilds a [`TreeIndex`] from a fresh read instead of keeping a
//! live tree between calls.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{Category, CategoryType};

/// Arena-style index: categories by id plus an adjacency list keyed by parent.
#[derive(Clone, Debug, Default)]
pub struct TreeIndex {
    by_id: HashMap<i32, Category>,
    children_of: HashMap<i32, Vec<i32>>,
}

impl TreeIndex {
    pub fn new(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut index = Self::default();
        for category in categories {
            index
                .children_of
                .entry(category.parent_id)
                .or_default()
                .push(category.id);
            index.by_id.insert(category.id, category);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn contains(&self, id: i32) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn get(&self, id: i32) -> Option<&Category> {
        self.by_id.get(&id)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.by_id.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.by_id.keys().copied()
    }

    /// Type currently recorded for `id`, if the category is known.
    pub fn type_of(&self, id: i32) -> Option<CategoryType> {
        self.by_id.get(&id).map(|category| category.category_type)
    }

    pub fn set_type(&mut self, id: i32, category_type: CategoryType) {
        if let Some(category) = self.by_id.get_mut(&id) {
            category.category_type = category_type;
        }
    }

    /// Parent of `id`, when its `parent_id` resolves to a known category.
    pub fn parent_of(&self, id: i32) -> Option<&Category> {
        let parent_id = self.by_id.get(&id)?.parent_id;
        if parent_id <= 0 {
            return None;
        }
        self.by_id.get(&parent_id)
    }

    /// Direct children of `parent_id` (`0` lists the roots).
    pub fn children_of(&self, parent_id: i32) -> &[i32] {
        self.children_of
            .get(&parent_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Ids of every descendant of `root_id`, breadth first, each exactly once.
    ///
    /// `root_id` itself is never part of the result, even when malformed data
    /// loops back to it. Nodes are marked visited when dequeued, so a node
    /// reachable from several parents is still returned once.
    pub fn descendant_ids(&self, root_id: i32) -> Vec<i32> {
        let mut visited = HashSet::from([root_id]);
        let mut queue: VecDeque<i32> = self.children_of(root_id).iter().copied().collect();
        let mut out = Vec::with_capacity(queue.len());

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            out.push(id);
            queue.extend(self.children_of(id).iter().copied());
        }
        out
    }

    /// Same as [`TreeIndex::descendant_ids`], resolved to categories.
    pub fn descendants_of(&self, root_id: i32) -> Vec<&Category> {
        self.descendant_ids(root_id)
            .into_iter()
            .filter_map(|id| self.by_id.get(&id))
            .collect()
    }

    /// Whether `candidate` sits somewhere below `ancestor`.
    pub fn is_descendant(&self, ancestor: i32, candidate: i32) -> bool {
        self.descendant_ids(ancestor).contains(&candidate)
    }

    /// First category found on a `parent_id` cycle, if any.
    pub fn find_cycle(&self) -> Option<i32> {
        let mut safe: HashSet<i32> = HashSet::new();
        for &start in self.by_id.keys() {
            let mut path = HashSet::new();
            let mut current = start;
            loop {
                if safe.contains(&current) {
                    break;
                }
                if !path.insert(current) {
                    return Some(current);
                }
                match self.by_id.get(&current) {
                    Some(category) if category.parent_id > 0 => current = category.parent_id,
                    _ => break,
                }
            }
            safe.extend(path);
        }
        None
    }

    /// Drop `id` from the index, moving its direct children under `new_parent`.
    ///
    /// Returns the ids of the moved children.
    pub fn remove(&mut self, id: i32, new_parent: i32) -> Vec<i32> {
        let Some(removed) = self.by_id.remove(&id) else {
            return Vec::new();
        };
        if let Some(siblings) = self.children_of.get_mut(&removed.parent_id) {
            siblings.retain(|&sibling| sibling != id);
        }

        let children = self.children_of.remove(&id).unwrap_or_default();
        for child in &children {
            if let Some(category) = self.by_id.get_mut(child) {
                category.parent_id = new_parent;
            }
        }
        self.children_of
            .entry(new_parent)
            .or_default()
            .extend(children.iter().copied());
        children
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    pub(crate) fn category(id: i32, parent_id: i32, password: &str) -> Category {
        Category {
            id,
            parent_id,
            name: format!("category-{id}"),
            slug: format!("category-{id}"),
            description: String::new(),
            thumbnail: String::new(),
            password: password.to_string(),
            category_type: CategoryType::from_password(password),
            priority: 0,
            create_time: Utc.timestamp_opt(0, 0).unwrap(),
            update_time: None,
        }
    }

    //   1
    //   ├── 2
    //   │   └── 4
    //   │       └── 5
    //   └── 3
    //   6
    fn sample() -> TreeIndex {
        TreeIndex::new([
            category(1, 0, ""),
            category(2, 1, ""),
            category(3, 1, ""),
            category(4, 2, ""),
            category(5, 4, ""),
            category(6, 0, ""),
        ])
    }

    fn sorted(mut ids: Vec<i32>) -> Vec<i32> {
        ids.sort_unstable();
        ids
    }

    #[test]
    fn descendants_are_complete_and_unique() {
        let tree = sample();
        assert_eq!(sorted(tree.descendant_ids(1)), vec![2, 3, 4, 5]);
        assert_eq!(tree.descendant_ids(4), vec![5]);
        assert!(tree.descendant_ids(5).is_empty());
        assert!(tree.descendant_ids(6).is_empty());
        assert_eq!(sorted(tree.descendant_ids(0)), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn descendants_are_breadth_first() {
        let tree = sample();
        let order = tree.descendant_ids(1);
        let position = |id| order.iter().position(|&x| x == id).unwrap();
        assert!(position(2) < position(4));
        assert!(position(3) < position(4));
        assert!(position(4) < position(5));
    }

    #[test]
    fn unknown_root_has_no_descendants() {
        assert!(sample().descendant_ids(42).is_empty());
    }

    #[test]
    fn cycles_terminate() {
        let tree = TreeIndex::new([category(1, 3, ""), category(2, 1, ""), category(3, 2, "")]);
        assert_eq!(sorted(tree.descendant_ids(1)), vec![2, 3]);
        assert!(tree.find_cycle().is_some());
        assert!(sample().find_cycle().is_none());
    }

    #[test]
    fn parent_resolution() {
        let tree = TreeIndex::new([category(1, 0, ""), category(2, 1, ""), category(3, 99, "")]);
        assert_eq!(tree.parent_of(2).map(|c| c.id), Some(1));
        assert!(tree.parent_of(1).is_none());
        assert!(tree.parent_of(3).is_none());
        assert!(tree.is_descendant(1, 2));
        assert!(!tree.is_descendant(2, 1));
    }

    #[test]
    fn remove_reparents_children() {
        let mut tree = sample();
        let moved = tree.remove(2, 1);
        assert_eq!(moved, vec![4]);
        assert!(!tree.contains(2));
        assert_eq!(tree.get(4).unwrap().parent_id, 1);
        assert_eq!(sorted(tree.descendant_ids(1)), vec![3, 4, 5]);
    }
}
