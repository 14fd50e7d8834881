use thiserror::Error;

#[derive(Debug, Error)]
pub enum CerveauError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("process error: {0}")]
    Process(String),
    #[error("terminal error: {0}")]
    Terminal(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("missing {0}; export a GitHub token first")]
    MissingToken(String),
}
