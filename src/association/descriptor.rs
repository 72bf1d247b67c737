use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// The owner attribute holds a single associated key
    One,
    /// The owner attribute holds an array of associated keys
    Many,
}

/// Binds an owner resource attribute to the keys of an associated resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationDescriptor {
    /// Resource holding the denormalized key(s)
    pub owner: String,
    /// Resource whose lifecycle drives the fix-up
    pub associated: String,
    pub cardinality: Cardinality,
    /// Owner attribute holding the associated key(s), e.g. `addressId`
    pub key: String,
    /// Associated attribute naming its owner, e.g. `userId`
    pub foreign_key: String,
    /// Remove the owner instead of clearing its key when the associated
    /// entity is destroyed
    #[serde(default)]
    pub dependent: bool,
}

impl AssociationDescriptor {
    /// `owner` holds one key of `associated` in `{associated}Id`
    pub fn has_one(owner: &str, associated: &str) -> Self {
        Self {
            owner: owner.to_string(),
            associated: associated.to_string(),
            cardinality: Cardinality::One,
            key: format!("{}Id", singular(associated)),
            foreign_key: format!("{}Id", singular(owner)),
            dependent: false,
        }
    }

    /// `owner` holds many keys of `associated` in `{associated}Ids`
    pub fn has_many(owner: &str, associated: &str) -> Self {
        Self {
            cardinality: Cardinality::Many,
            key: format!("{}Ids", singular(associated)),
            ..Self::has_one(owner, associated)
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = foreign_key.into();
        self
    }

    pub fn dependent(mut self) -> Self {
        self.dependent = true;
        self
    }
}

/// Naive English singular of a resource name
fn singular(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies") {
        format!("{}y", stem)
    } else if let Some(stem) = name.strip_suffix("sses") {
        format!("{}ss", stem)
    } else if let Some(stem) = name.strip_suffix('s') {
        stem.to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_attribute_names() {
        let one = AssociationDescriptor::has_one("users", "addresses");
        assert_eq!(one.key, "addressId");
        assert_eq!(one.foreign_key, "userId");
        assert_eq!(one.cardinality, Cardinality::One);

        let many = AssociationDescriptor::has_many("categories", "posts");
        assert_eq!(many.key, "postIds");
        assert_eq!(many.foreign_key, "categoryId");
        assert_eq!(many.cardinality, Cardinality::Many);
    }

    #[test]
    fn test_overrides() {
        let descriptor = AssociationDescriptor::has_one("users", "addresses")
            .with_key("homeAddress")
            .with_foreign_key("residentId")
            .dependent();

        assert_eq!(descriptor.key, "homeAddress");
        assert_eq!(descriptor.foreign_key, "residentId");
        assert!(descriptor.dependent);
    }

    #[test]
    fn test_singular() {
        assert_eq!(singular("users"), "user");
        assert_eq!(singular("addresses"), "address");
        assert_eq!(singular("companies"), "company");
        assert_eq!(singular("staff"), "staff");
    }
}
