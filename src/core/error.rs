use thiserror::Error;

#[derive(Error, Debug)]
pub enum PilotError {
    #[error("generation failed: {0}")]
    Generation(#[from] crate::llm::client::GenerationError),

    #[error("host fault: {0}")]
    Host(#[from] crate::host::HostFault),

    #[error("command queue is full")]
    QueueOverflow,

    #[error("pipeline is shut down")]
    PipelineClosed,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PilotError>;
