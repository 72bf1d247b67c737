use serde_json::Value;

use crate::{
    error::{Error, Result},
    key::key_of_value,
    state::Values,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Parsed endpoint template such as `/users/:userId/posts/:id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();

        for part in template.split('/') {
            match part.strip_prefix(':') {
                Some("") => {
                    return Err(Error::InvalidTemplate {
                        template: template.to_string(),
                        reason: "empty parameter name".to_string(),
                    })
                }
                Some(name) => segments.push(Segment::Param(name.to_string())),
                None => segments.push(Segment::Literal(part.to_string())),
            }
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of the parameters consumed by the path
    pub fn path_params(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Param(name) => Some(name.clone()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute path parameters. With `query`, parameters not used by the
    /// path are appended as a sorted query string.
    ///
    /// A trailing parameter may be absent (collection endpoints such as
    /// `/users/:id` resolved without an id); any other missing parameter is
    /// an error.
    pub fn resolve(&self, params: &Values, query: bool) -> Result<String> {
        let mut parts = Vec::with_capacity(self.segments.len());
        let last = self.segments.len().saturating_sub(1);

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => parts.push(text.clone()),
                Segment::Param(name) => match params.get(name).filter(|v| !v.is_null()) {
                    Some(value) => {
                        parts.push(urlencoding::encode(&key_of_value(value)).into_owned())
                    }
                    None if index == last => {}
                    None => {
                        return Err(Error::MissingPathParam {
                            template: self.source.clone(),
                            param: name.clone(),
                        })
                    }
                },
            }
        }

        let mut path = parts.join("/");
        if path.is_empty() {
            path.push('/');
        }

        if !query {
            return Ok(path);
        }

        let consumed = self.path_params();
        let mut pairs: Vec<(&String, &Value)> = params
            .iter()
            .filter(|(name, value)| !consumed.contains(name) && !value.is_null())
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        if pairs.is_empty() {
            return Ok(path);
        }

        let query = pairs
            .into_iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(name),
                    urlencoding::encode(&key_of_value(value))
                )
            })
            .collect::<Vec<_>>()
            .join("&");

        Ok(format!("{}?{}", path, query))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn values(value: Value) -> Values {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_path_params() {
        let template = UrlTemplate::parse("/users/:userId/posts/:id").unwrap();
        assert_eq!(template.path_params(), vec!["userId", "id"]);
    }

    #[test]
    fn test_resolve_item() {
        let template = UrlTemplate::parse("/users/:id").unwrap();
        let url = template
            .resolve(&values(json!({"id": 7, "expand": true})), false)
            .unwrap();
        assert_eq!(url, "/users/7");
    }

    #[test]
    fn test_resolve_collection_with_query() {
        let template = UrlTemplate::parse("/users/:userId/posts/:id").unwrap();
        let url = template
            .resolve(&values(json!({"userId": 1, "q": "a b", "page": 2})), true)
            .unwrap();
        assert_eq!(url, "/users/1/posts?page=2&q=a%20b");
    }

    #[test]
    fn test_missing_inner_param_is_error() {
        let template = UrlTemplate::parse("/users/:userId/posts/:id").unwrap();
        let err = template.resolve(&values(json!({"id": 3})), false).unwrap_err();
        assert!(matches!(err, Error::MissingPathParam { ref param, .. } if param == "userId"));
    }

    #[test]
    fn test_invalid_template() {
        assert!(UrlTemplate::parse("/users/:").is_err());
    }
}
