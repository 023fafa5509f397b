//! Categories: the hierarchy posts are filed under.
//!
//! A category is either [`CategoryType::Normal`] or [`CategoryType::Intimate`].
//! The type is derived (own password or an Intimate parent) but persisted so
//! reads never have to walk the hierarchy.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Visibility class of a category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CategoryType {
    #[default]
    Normal,
    /// Password protected, either directly or through an ancestor.
    Intimate,
}

impl CategoryType {
    /// Value stored in the `type` column.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Normal => 0,
            Self::Intimate => 1,
        }
    }

    #[must_use]
    pub const fn is_intimate(self) -> bool {
        matches!(self, Self::Intimate)
    }

    /// Type implied by a category's own password alone.
    #[must_use]
    pub fn from_password(password: &str) -> Self {
        if password.is_empty() {
            Self::Normal
        } else {
            Self::Intimate
        }
    }

    /// Combine the type implied by the own password with the parent's type.
    #[must_use]
    pub fn inherit(self, parent: Option<CategoryType>) -> Self {
        match parent {
            Some(Self::Intimate) => Self::Intimate,
            _ => self,
        }
    }
}

impl core::fmt::Display for CategoryType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Normal => f.write_str("NORMAL"),
            Self::Intimate => f.write_str("INTIMATE"),
        }
    }
}

impl TryFrom<i32> for CategoryType {
    type Error = EngineError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Intimate),
            other => Err(EngineError::InvalidCategory(format!(
                "unknown category type: {other}"
            ))),
        }
    }
}

/// A category as seen by callers of the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i32,
    /// `0` for root categories.
    pub parent_id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub thumbnail: String,
    /// Empty when the category is not protected by itself.
    pub password: String,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    pub priority: i32,
    pub create_time: DateTime<Utc>,
    pub update_time: Option<DateTime<Utc>>,
}

impl Category {
    #[must_use]
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    #[must_use]
    pub fn is_intimate(&self) -> bool {
        self.category_type.is_intimate()
    }
}

/// Fields accepted when creating or updating a category.
///
/// `id` is ignored on creation. A non-positive `parent_id` means root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryParam {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub thumbnail: String,
    pub password: String,
    pub parent_id: i32,
    pub priority: i32,
}

/// Category nested with its children, as returned by `Engine::category_tree`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryWithPostCount {
    #[serde(flatten)]
    pub category: Category,
    pub post_count: u64,
}

/// Sort key for category listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryOrder {
    #[default]
    Priority,
    Name,
    Id,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub parent_id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub thumbnail: String,
    pub password: String,
    #[sea_orm(column_name = "type")]
    pub kind: i32,
    pub priority: i32,
    pub create_time: DateTimeUtc,
    pub update_time: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::post_categories::Entity")]
    PostCategories,
}

impl Related<super::post_categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostCategories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Category {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            parent_id: model.parent_id,
            name: model.name,
            slug: model.slug,
            description: model.description,
            thumbnail: model.thumbnail,
            password: model.password,
            category_type: CategoryType::try_from(model.kind)?,
            priority: model.priority,
            create_time: model.create_time,
            update_time: model.update_time,
        })
    }
}

impl From<&Category> for ActiveModel {
    fn from(value: &Category) -> Self {
        Self {
            id: ActiveValue::Set(value.id),
            parent_id: ActiveValue::Set(value.parent_id),
            name: ActiveValue::Set(value.name.clone()),
            slug: ActiveValue::Set(value.slug.clone()),
            description: ActiveValue::Set(value.description.clone()),
            thumbnail: ActiveValue::Set(value.thumbnail.clone()),
            password: ActiveValue::Set(value.password.clone()),
            kind: ActiveValue::Set(value.category_type.as_i32()),
            priority: ActiveValue::Set(value.priority),
            create_time: ActiveValue::Set(value.create_time),
            update_time: ActiveValue::Set(value.update_time),
        }
    }
}
