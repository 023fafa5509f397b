//! Posts and their visibility status.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PostStatus {
    Published,
    #[default]
    Draft,
    Recycle,
    /// Only visible with a password, the post's own or one of its categories'.
    Intimate,
}

impl PostStatus {
    /// Value stored in the `status` column.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Published => 0,
            Self::Draft => 1,
            Self::Recycle => 2,
            Self::Intimate => 3,
        }
    }
}

impl core::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Published => "PUBLISHED",
            Self::Draft => "DRAFT",
            Self::Recycle => "RECYCLE",
            Self::Intimate => "INTIMATE",
        };
        f.write_str(name)
    }
}

impl TryFrom<i32> for PostStatus {
    type Error = EngineError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Published),
            1 => Ok(Self::Draft),
            2 => Ok(Self::Recycle),
            3 => Ok(Self::Intimate),
            other => Err(EngineError::InvalidPost(format!(
                "unknown post status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub password: String,
    pub status: PostStatus,
    pub create_time: DateTime<Utc>,
    pub update_time: Option<DateTime<Utc>>,
}

impl Post {
    /// Whether the status of this post is fully derived from its categories.
    ///
    /// Posts with their own password stay Intimate whatever their categories
    /// say; drafts and recycled posts are never touched.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.password.is_empty()
            && !matches!(self.status, PostStatus::Draft | PostStatus::Recycle)
    }
}

/// Fields accepted when creating a post.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostParam {
    pub title: String,
    pub slug: String,
    pub password: String,
    pub status: PostStatus,
    pub category_ids: Vec<i32>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub password: String,
    pub status: i32,
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

impl TryFrom<Model> for Post {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            title: model.title,
            slug: model.slug,
            password: model.password,
            status: PostStatus::try_from(model.status)?,
            create_time: model.create_time,
            update_time: model.update_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn post(password: &str, status: PostStatus) -> Post {
        Post {
            id: 1,
            title: "Hello".to_string(),
            slug: "hello".to_string(),
            password: password.to_string(),
            status,
            create_time: Utc.timestamp_opt(0, 0).unwrap(),
            update_time: None,
        }
    }

    #[test]
    fn eligibility() {
        assert!(post("", PostStatus::Published).is_eligible());
        assert!(post("", PostStatus::Intimate).is_eligible());
        assert!(!post("", PostStatus::Draft).is_eligible());
        assert!(!post("", PostStatus::Recycle).is_eligible());
        assert!(!post("pw", PostStatus::Intimate).is_eligible());
    }

    #[test]
    fn stored_status_values() {
        for status in [
            PostStatus::Published,
            PostStatus::Draft,
            PostStatus::Recycle,
            PostStatus::Intimate,
        ] {
            assert_eq!(PostStatus::try_from(status.as_i32()).unwrap(), status);
        }
        assert!(PostStatus::try_from(-1).is_err());
    }
}
