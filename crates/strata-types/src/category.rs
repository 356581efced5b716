use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AddressError;

/// Top-level partition of an owner's configuration.
///
/// Built-in categories have a fixed primary-key arity. Custom categories are
/// declared by their owner together with an arity, which the store tracks;
/// the category value itself only carries the name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Category {
    /// Process-wide settings of the owner. No primary keys.
    Global,
    /// Keyed by guild id.
    Guild,
    /// Keyed by channel id.
    Channel,
    /// Keyed by role id.
    Role,
    /// Keyed by user id.
    User,
    /// Keyed by guild id, then user id.
    Member,
    /// Owner-defined category.
    Custom(String),
}

impl Category {
    /// All categories with a fixed arity, in storage order.
    pub const BUILTIN: [Category; 6] = [
        Category::Global,
        Category::Guild,
        Category::Channel,
        Category::Role,
        Category::User,
        Category::Member,
    ];

    /// Build a custom category, rejecting names reserved by built-ins.
    pub fn custom(name: impl Into<String>) -> Result<Self, AddressError> {
        let name = name.into();
        if name.is_empty() || Self::builtin_from_name(&name).is_some() {
            return Err(AddressError::InvalidCategoryName(name));
        }
        Ok(Category::Custom(name))
    }

    /// Parse a stored category name. Unknown names become custom categories.
    pub fn from_name(name: &str) -> Result<Self, AddressError> {
        match Self::builtin_from_name(name) {
            Some(category) => Ok(category),
            None => Self::custom(name),
        }
    }

    fn builtin_from_name(name: &str) -> Option<Self> {
        Self::BUILTIN.into_iter().find(|c| c.name() == name)
    }

    /// Name used as the storage segment for this category.
    pub fn name(&self) -> &str {
        match self {
            Category::Global => "GLOBAL",
            Category::Guild => "GUILD",
            Category::Channel => "TEXTCHANNEL",
            Category::Role => "ROLE",
            Category::User => "USER",
            Category::Member => "MEMBER",
            Category::Custom(name) => name,
        }
    }

    /// Fixed arity of a built-in category, `None` for custom ones.
    pub fn builtin_arity(&self) -> Option<usize> {
        match self {
            Category::Global => Some(0),
            Category::Guild | Category::Channel | Category::Role | Category::User => Some(1),
            Category::Member => Some(2),
            Category::Custom(_) => None,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Category::Custom(_))
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Category({})", self.name())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.name().to_string()
    }
}

impl TryFrom<String> for Category {
    type Error = AddressError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Category::from_name(&name)
    }
}
