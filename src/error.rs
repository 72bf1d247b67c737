use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("URL template '{template}' is missing a value for ':{param}'")]
    MissingPathParam { template: String, param: String },

    #[error("Invalid URL template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("Unknown resource '{0}'")]
    UnknownResource(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
