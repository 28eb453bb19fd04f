use crate::config::ConfigError;

/// Anything that stops the firmware from coming up or keeps it from serving.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[cfg(target_os = "espidf")]
    #[error(transparent)]
    Esp(#[from] esp_idf_sys::EspError),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[cfg(target_os = "espidf")]
    #[error("gave up on Wi-Fi after {attempts} attempts")]
    LinkGaveUp { attempts: u32 },
}
