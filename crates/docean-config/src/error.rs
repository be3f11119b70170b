use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error(
        "no API token configured\n\n\
        Set one of the following environment variables:\n  \
        - DIGITALOCEAN_TOKEN\n  \
        - DIGITALOCEAN_ACCESS_TOKEN\n\
        or pass a token explicitly"
    )]
    MissingToken,

    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("invalid URL {url:?} for {name}: must start with http:// or https://")]
    InvalidUrl { name: String, url: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
