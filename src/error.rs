use thiserror::Error;

#[derive(Debug, Error)]
pub enum HotPairsError {
    #[error("Token not found: {0}")]
    TokenNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Unknown package: {0}")]
    UnknownPackage(String),

    #[error("Invalid unit price for {0}")]
    InvalidPrice(String),

    #[error("Delivery error: {0}")]
    DeliveryError(String),

    #[error("Could not read review ticket: {0}")]
    ReviewParseError(String),

    #[error("Order {0} is already activated or being activated")]
    OrderAlreadyClaimed(String),

    #[error("Token monitor unavailable: {0}")]
    MonitorUnavailable(String),
}
