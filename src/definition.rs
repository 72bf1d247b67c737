use serde_json::Value;

use crate::{
    config::SyncConfig,
    endpoint::UrlTemplate,
    error::Result,
    key::{derive_key, key_of_value, Key, KeyBy, Params},
    state::Values,
    transport::Method,
};

/// Static description of one resource type
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDefinition {
    pub name: String,
    pub url: UrlTemplate,
    pub key_by: KeyBy,
    pub update_method: Method,
}

impl ResourceDefinition {
    pub fn new(name: impl Into<String>, url: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            url: UrlTemplate::parse(url)?,
            key_by: KeyBy::default(),
            update_method: Method::Put,
        })
    }

    /// Definition inheriting the store-wide defaults of `config`. The URL is
    /// prefixed with `config.base_url`.
    pub fn from_config(name: impl Into<String>, url: &str, config: &SyncConfig) -> Result<Self> {
        let prefix = config.base_url.trim_end_matches('/');
        let full = if prefix.is_empty() || url.starts_with(prefix) {
            url.to_string()
        } else {
            format!("{}{}", prefix, url)
        };

        Ok(Self {
            name: name.into(),
            url: UrlTemplate::parse(&full)?,
            key_by: config.key_by.clone(),
            update_method: config.update_method,
        })
    }

    pub fn with_key_by(mut self, key_by: impl Into<KeyBy>) -> Self {
        self.key_by = key_by.into();
        self
    }

    pub fn with_update_method(mut self, method: Method) -> Self {
        self.update_method = method;
        self
    }

    /// Key of the entity addressed by `params`
    pub fn item_key(&self, params: &Params) -> Key {
        derive_key(params, Some(&self.key_by))
    }

    /// Key of the list addressed by `params`. Path parameters do not take
    /// part.
    pub fn list_key(&self, params: &Params) -> Key {
        derive_key(&params.without(&self.url.path_params()), None)
    }

    /// Endpoint of a single entity
    pub fn item_endpoint(&self, params: &Params) -> Result<String> {
        self.url.resolve(&params.to_map(&self.key_by), false)
    }

    /// Endpoint of a list, with non-path parameters as the query string
    pub fn list_endpoint(&self, params: &Params) -> Result<String> {
        self.url.resolve(&params.to_map(&self.key_by), true)
    }

    /// Collection endpoint a create is posted to. Identity attributes are
    /// dropped; the remote assigns them.
    pub fn create_endpoint(&self, params: &Params) -> Result<String> {
        let mut map = params.to_map(&self.key_by);
        for attribute in self.identity_attributes() {
            map.remove(attribute);
        }
        self.url.resolve(&map, false)
    }

    fn identity_attributes(&self) -> &[String] {
        match &self.key_by {
            KeyBy::Attribute(attribute) => std::slice::from_ref(attribute),
            KeyBy::Composite(attributes) => attributes,
        }
    }

    /// Value other resources store to reference the entity at `key`. The raw
    /// identity attribute is preferred so owners keep the remote's type.
    pub fn identity_value(&self, values: &Values, key: &str) -> Value {
        if let KeyBy::Attribute(attribute) = &self.key_by {
            if let Some(value) = values.get(attribute) {
                if !value.is_null() && key_of_value(value) == key {
                    return value.clone();
                }
            }
        }
        Value::String(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Params {
        Params::from(value)
    }

    #[test]
    fn test_list_key_ignores_path_params() {
        let posts = ResourceDefinition::new("posts", "/users/:userId/posts/:id").unwrap();

        assert_eq!(posts.list_key(&params(json!({"userId": 1}))), "");
        assert_eq!(
            posts.list_key(&params(json!({"userId": 1, "page": 2}))),
            "page=2"
        );
        assert_eq!(
            posts
                .list_endpoint(&params(json!({"userId": 1, "page": 2})))
                .unwrap(),
            "/users/1/posts?page=2"
        );
    }

    #[test]
    fn test_item_key_and_endpoint() {
        let users = ResourceDefinition::new("users", "/users/:id").unwrap();

        assert_eq!(users.item_key(&Params::from(5_i64)), "5");
        assert_eq!(users.item_key(&params(json!({"id": 5, "x": 1}))), "5");
        assert_eq!(users.item_endpoint(&Params::from(5_i64)).unwrap(), "/users/5");
        assert_eq!(
            users.create_endpoint(&Params::from("1700000000000")).unwrap(),
            "/users"
        );
    }

    #[test]
    fn test_missing_path_param_is_an_error() {
        let posts = ResourceDefinition::new("posts", "/users/:userId/posts/:id").unwrap();
        assert!(posts.item_endpoint(&Params::from(3_i64)).is_err());
    }

    #[test]
    fn test_from_config_prefixes_base_url() {
        let config = SyncConfig {
            base_url: "https://api.example.com/".to_string(),
            update_method: Method::Patch,
            ..SyncConfig::default()
        };
        let users = ResourceDefinition::from_config("users", "/users/:id", &config).unwrap();

        assert_eq!(users.url.as_str(), "https://api.example.com/users/:id");
        assert_eq!(users.update_method, Method::Patch);
    }

    #[test]
    fn test_identity_value_keeps_remote_type() {
        let users = ResourceDefinition::new("users", "/users/:id").unwrap();
        let values: Values = serde_json::from_value(json!({"id": 7})).unwrap();

        assert_eq!(users.identity_value(&values, "7"), json!(7));
        assert_eq!(users.identity_value(&values, "temp"), json!("temp"));
    }
}
