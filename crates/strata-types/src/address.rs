use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::AddressError;

/// Location of a node in an owner's configuration tree.
///
/// An address is made of five parts: the owner namespace, the owner instance
/// id, the [`Category`], the primary keys selecting an entity inside the
/// category, and the nested path of field names below that entity. The
/// category's primary-key arity travels with the address so partial
/// addresses (fewer keys than the arity) can be recognised.
///
/// Addresses are immutable value objects. Equality and hashing cover the five
/// parts only, so two independently built addresses for the same node are
/// interchangeable as map keys.
#[derive(Clone, Serialize, Deserialize)]
pub struct PathAddress {
    owner_namespace: String,
    owner_instance_id: String,
    category: Category,
    primary_keys: Vec<String>,
    nested_path: Vec<String>,
    primary_key_arity: usize,
}

impl PathAddress {
    /// Build a root address with no nested path.
    ///
    /// Fails if more primary keys are supplied than the category takes.
    pub fn new(
        owner_namespace: impl Into<String>,
        owner_instance_id: impl Into<String>,
        category: Category,
        primary_keys: Vec<String>,
        primary_key_arity: usize,
    ) -> Result<Self, AddressError> {
        if primary_keys.len() > primary_key_arity {
            return Err(AddressError::ArityExceeded {
                category: category.name().to_string(),
                arity: primary_key_arity,
                given: primary_keys.len(),
            });
        }
        Ok(Self {
            owner_namespace: owner_namespace.into(),
            owner_instance_id: owner_instance_id.into(),
            category,
            primary_keys,
            nested_path: Vec::new(),
            primary_key_arity,
        })
    }

    /// Address of the field `key` directly below this node.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut child = self.clone();
        child.nested_path.push(key.into());
        child
    }

    /// Address of a node several levels below this one.
    pub fn child_path<I, S>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut child = self.clone();
        child.nested_path.extend(keys.into_iter().map(Into::into));
        child
    }

    pub fn owner_namespace(&self) -> &str {
        &self.owner_namespace
    }

    pub fn owner_instance_id(&self) -> &str {
        &self.owner_instance_id
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn nested_path(&self) -> &[String] {
        &self.nested_path
    }

    pub fn primary_key_arity(&self) -> usize {
        self.primary_key_arity
    }

    /// Returns `true` if every primary key of the category is present.
    pub fn is_complete(&self) -> bool {
        self.primary_keys.len() == self.primary_key_arity
    }

    /// Storage path of this node: namespace, instance id, category name,
    /// primary keys, then the nested path.
    pub fn segments(&self) -> Vec<&str> {
        let mut segments = Vec::with_capacity(3 + self.primary_keys.len() + self.nested_path.len());
        segments.push(self.owner_namespace.as_str());
        segments.push(self.owner_instance_id.as_str());
        segments.push(self.category.name());
        segments.extend(self.primary_keys.iter().map(String::as_str));
        segments.extend(self.nested_path.iter().map(String::as_str));
        segments
    }
}

impl PartialEq for PathAddress {
    fn eq(&self, other: &Self) -> bool {
        self.owner_namespace == other.owner_namespace
            && self.owner_instance_id == other.owner_instance_id
            && self.category == other.category
            && self.primary_keys == other.primary_keys
            && self.nested_path == other.nested_path
    }
}

impl Eq for PathAddress {}

impl Hash for PathAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner_namespace.hash(state);
        self.owner_instance_id.hash(state);
        self.category.hash(state);
        self.primary_keys.hash(state);
        self.nested_path.hash(state);
    }
}

impl fmt::Debug for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathAddress({self})")
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments().join("/"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn guild(id: &str) -> PathAddress {
        PathAddress::new("Mod", "4961522000", Category::Guild, vec![id.into()], 1).unwrap()
    }

    #[test]
    fn too_many_primary_keys_rejected() {
        let err = PathAddress::new("Mod", "1", Category::Guild, vec!["1".into(), "2".into()], 1)
            .unwrap_err();
        assert_eq!(
            err,
            AddressError::ArityExceeded {
                category: "GUILD".into(),
                arity: 1,
                given: 2
            }
        );
    }

    #[test]
    fn partial_address_allowed() {
        let addr = PathAddress::new("Mod", "1", Category::Member, vec!["10".into()], 2).unwrap();
        assert!(!addr.is_complete());
        assert_eq!(addr.primary_keys(), ["10"]);
    }

    #[test]
    fn child_does_not_mutate_receiver() {
        let root = guild("10");
        let child = root.child("mute_role");
        assert!(root.nested_path().is_empty());
        assert_eq!(child.nested_path(), ["mute_role"]);
        let deeper = child.child_path(["a", "b"]);
        assert_eq!(deeper.nested_path(), ["mute_role", "a", "b"]);
    }

    #[test]
    fn structural_equality_and_hash() {
        let a = guild("10").child("x");
        let b = guild("10").child("x");
        assert_eq!(a, b);

        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
        assert_ne!(guild("10").child("x"), guild("11").child("x"));
        assert_ne!(guild("10").child("x"), guild("10").child("y"));
    }

    #[test]
    fn equality_ignores_arity() {
        let a = PathAddress::new("C", "1", Category::Custom("t".into()), vec![], 1).unwrap();
        let b = PathAddress::new("C", "1", Category::Custom("t".into()), vec![], 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn segments_and_display() {
        let addr = guild("10").child("flags");
        assert_eq!(addr.segments(), ["Mod", "4961522000", "GUILD", "10", "flags"]);
        assert_eq!(addr.to_string(), "Mod/4961522000/GUILD/10/flags");
    }
}
