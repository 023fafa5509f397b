//! Category hierarchy engine.
//!
//! Keeps a tree of blog categories and the posts filed under them consistent
//! with respect to password protection:
//!
//! - a category is [`CategoryType::Intimate`] iff it or one of its ancestors
//!   has a password;
//! - a post without a password of its own, that is neither a draft nor in the
//!   recycle bin, is [`PostStatus::Intimate`] iff at least one of its
//!   categories is Intimate, [`PostStatus::Published`] otherwise.
//!
//! Every mutation of [`Engine`] re-establishes both rules inside a single
//! database transaction.

pub use categories::{
    Category, CategoryNode, CategoryOrder, CategoryParam, CategoryType, CategoryWithPostCount,
};
pub use error::EngineError;
pub use ops::{Engine, EngineBuilder};
pub use posts::{Post, PostParam, PostStatus};
pub use propagation::{TypeAssignment, TypeChanges, refresh_subtree, refresh_whole_tree};
pub use snapshot::Snapshot;
pub use tree::TreeIndex;
pub use visibility::{StatusChanges, synchronize};

mod categories;
mod error;
mod ops;
mod post_categories;
mod posts;
mod propagation;
mod snapshot;
mod store;
mod tree;
mod util;
mod visibility;

type ResultEngine<T> = Result<T, EngineError>;
