//! Re-derivation of category types after a change.
//!
//! A category is Intimate iff it, or any ancestor up to the root, carries a
//! non-empty password. The functions here only compute; persisting the result
//! is up to the caller (see `ops::executor`).

use std::collections::BTreeSet;

use crate::{CategoryType, tree::TreeIndex};

/// Target type of every category a refresh looked at.
///
/// `intimate` and `normal` are disjoint and together cover exactly the
/// categories in scope of the refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeAssignment {
    pub intimate: BTreeSet<i32>,
    pub normal: BTreeSet<i32>,
}

/// Subset of a [`TypeAssignment`] that differs from what is recorded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeChanges {
    pub to_intimate: Vec<i32>,
    pub to_normal: Vec<i32>,
}

impl TypeAssignment {
    pub fn len(&self) -> usize {
        self.intimate.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intimate.is_empty() && self.normal.is_empty()
    }

    pub fn type_of(&self, id: i32) -> Option<CategoryType> {
        if self.intimate.contains(&id) {
            Some(CategoryType::Intimate)
        } else if self.normal.contains(&id) {
            Some(CategoryType::Normal)
        } else {
            None
        }
    }

    /// Keep only the categories whose recorded type has to change.
    pub fn changes(&self, tree: &TreeIndex) -> TypeChanges {
        let differs = |id: &&i32, wanted: CategoryType| tree.type_of(**id) != Some(wanted);
        TypeChanges {
            to_intimate: self
                .intimate
                .iter()
                .filter(|id| differs(id, CategoryType::Intimate))
                .copied()
                .collect(),
            to_normal: self
                .normal
                .iter()
                .filter(|id| differs(id, CategoryType::Normal))
                .copied()
                .collect(),
        }
    }
}

impl TypeChanges {
    pub fn is_empty(&self) -> bool {
        self.to_intimate.is_empty() && self.to_normal.is_empty()
    }

    /// Record the new types in the snapshot.
    pub fn apply(&self, tree: &mut TreeIndex) {
        for &id in &self.to_intimate {
            tree.set_type(id, CategoryType::Intimate);
        }
        for &id in &self.to_normal {
            tree.set_type(id, CategoryType::Normal);
        }
    }
}

/// Types for every descendant of `root_id`, given the (already decided) type
/// of `root_id` itself.
///
/// Ancestors and unrelated branches are out of scope: their type does not
/// depend on anything below them.
pub fn refresh_subtree(tree: &TreeIndex, root_id: i32, root_type: CategoryType) -> TypeAssignment {
    let descendants = tree.descendant_ids(root_id);
    let mut intimate = BTreeSet::new();

    for &id in &descendants {
        if root_type.is_intimate() {
            intimate.insert(id);
            continue;
        }
        let has_password = tree.get(id).is_some_and(|category| category.has_password());
        if has_password {
            intimate.insert(id);
            intimate.extend(tree.descendant_ids(id));
        }
    }

    let normal = descendants
        .into_iter()
        .filter(|id| !intimate.contains(id))
        .collect();
    TypeAssignment { intimate, normal }
}

/// Types for every category, from scratch.
pub fn refresh_whole_tree(tree: &TreeIndex) -> TypeAssignment {
    let mut intimate = BTreeSet::new();
    for category in tree.categories() {
        if category.has_password() {
            intimate.insert(category.id);
            intimate.extend(tree.descendant_ids(category.id));
        }
    }

    let normal = tree.ids().filter(|id| !intimate.contains(id)).collect();
    TypeAssignment { intimate, normal }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::category;

    fn with_type(mut tree: TreeIndex, assignment: &TypeAssignment) -> TreeIndex {
        assignment.changes(&tree).apply(&mut tree);
        tree
    }

    /// Reference semantics: Intimate iff the category or an ancestor has a
    /// password.
    fn expected_type(tree: &TreeIndex, id: i32) -> CategoryType {
        let mut current = tree.get(id);
        while let Some(category) = current {
            if category.has_password() {
                return CategoryType::Intimate;
            }
            current = tree.parent_of(category.id);
        }
        CategoryType::Normal
    }

    //   1 "diary"
    //   └── 2 "travel"
    //       ├── 3
    //       └── 4 (password "x")
    //           └── 5
    //   6
    //   └── 7
    fn blog(diary_password: &str) -> TreeIndex {
        TreeIndex::new([
            category(1, 0, diary_password),
            category(2, 1, ""),
            category(3, 2, ""),
            category(4, 2, "x"),
            category(5, 4, ""),
            category(6, 0, ""),
            category(7, 6, ""),
        ])
    }

    #[test]
    fn intimate_root_covers_whole_subtree() {
        let tree = blog("secret");
        let assignment = refresh_subtree(&tree, 1, CategoryType::Intimate);
        assert_eq!(assignment.intimate, BTreeSet::from([2, 3, 4, 5]));
        assert!(assignment.normal.is_empty());
    }

    #[test]
    fn own_password_reasserts_intimate_below_normal_root() {
        let tree = blog("");
        let assignment = refresh_subtree(&tree, 1, CategoryType::Normal);
        assert_eq!(assignment.intimate, BTreeSet::from([4, 5]));
        assert_eq!(assignment.normal, BTreeSet::from([2, 3]));
    }

    #[test]
    fn partitions_are_disjoint_and_exhaustive() {
        let tree = blog("");
        let assignment = refresh_subtree(&tree, 1, CategoryType::Normal);
        assert!(assignment.intimate.is_disjoint(&assignment.normal));
        assert_eq!(assignment.len(), tree.descendant_ids(1).len());
        assert_eq!(assignment.type_of(6), None);
    }

    #[test]
    fn ancestors_and_other_branches_untouched() {
        let tree = blog("");
        let assignment = refresh_subtree(&tree, 2, CategoryType::Normal);
        assert_eq!(assignment.type_of(1), None);
        assert_eq!(assignment.type_of(2), None);
        assert_eq!(assignment.type_of(7), None);
    }

    #[test]
    fn refresh_is_idempotent() {
        let tree = blog("secret");
        let tree = with_type(tree, &refresh_whole_tree(&blog("secret")));
        let again = refresh_subtree(&tree, 1, CategoryType::Intimate);
        assert!(again.changes(&tree).is_empty());
        assert!(refresh_whole_tree(&tree).changes(&tree).is_empty());
    }

    #[test]
    fn whole_tree_matches_reference() {
        let tree = TreeIndex::new([
            category(1, 0, "a"),
            category(2, 1, ""),
            category(3, 0, ""),
            category(4, 3, ""),
            category(5, 4, "b"),
            category(6, 5, ""),
            category(7, 0, "c"),
            category(8, 0, ""),
        ]);
        let assignment = refresh_whole_tree(&tree);
        for id in tree.ids() {
            assert_eq!(assignment.type_of(id), Some(expected_type(&tree, id)), "{id}");
        }
        assert_eq!(assignment.intimate, BTreeSet::from([1, 2, 5, 6, 7]));
        assert_eq!(assignment.normal, BTreeSet::from([3, 4, 8]));
    }

    #[test]
    fn changes_only_report_differences() {
        let mut tree = blog("");
        tree.set_type(2, CategoryType::Intimate);
        tree.set_type(3, CategoryType::Intimate);
        let changes = refresh_subtree(&tree, 1, CategoryType::Normal).changes(&tree);
        // 4 and 5: 4 already Intimate through its password, 5 still Normal.
        assert_eq!(changes.to_intimate, vec![5]);
        assert_eq!(changes.to_normal, vec![2, 3]);

        changes.apply(&mut tree);
        assert_eq!(tree.type_of(2), Some(CategoryType::Normal));
        assert_eq!(tree.type_of(5), Some(CategoryType::Intimate));
    }
}
