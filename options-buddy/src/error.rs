use thiserror::Error;

/// Conditions that make a probe run pointless, as opposed to a single probe getting lost.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("unable to resolve destination `{host}`")]
    DestinationResolution {
        host: String,
        source: std::io::Error,
    },

    #[error("destination `{host}` did not resolve to any address")]
    NoAddress { host: String },

    #[error("unable to resolve the local name `{host}`, pass --local-ip to skip the lookup")]
    LocalResolution { host: String },
}
