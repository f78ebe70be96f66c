use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Allocation(#[from] allocation::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] envconfig::Error),

    #[error("failed to read discovery input: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse discovery input: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
