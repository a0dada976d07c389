use std::fmt;

// === ConfigError ===

/// Errors raised while resolving startup configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required environment variable is not set.
    MissingVar(String),
    /// The backend address is not an http(s) URL.
    InvalidUrl(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingVar(name) => {
                write!(f, "Missing required environment variable: {}", name)
            }
            ConfigError::InvalidUrl(url) => write!(f, "Invalid backend URL: {}", url),
        }
    }
}

impl std::error::Error for ConfigError {}

// === AuthError ===

/// Errors related to session and identity operations.
#[derive(Debug)]
pub enum AuthError {
    /// A network error occurred while talking to the identity endpoint.
    Network(String),
    /// The identity endpoint refused the request.
    Rejected(u16, String),
    /// The access token could not be decoded.
    InvalidToken(String),
    /// Reading or writing the persisted session failed.
    Storage(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Network(msg) => write!(f, "Auth network error: {}", msg),
            AuthError::Rejected(status, msg) => {
                write!(f, "Auth request rejected ({}): {}", status, msg)
            }
            AuthError::InvalidToken(msg) => write!(f, "Invalid access token: {}", msg),
            AuthError::Storage(msg) => write!(f, "Session storage error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

// === StoreError ===

/// Errors related to the hosted bookmark store.
#[derive(Debug)]
pub enum StoreError {
    /// A network error occurred while talking to the store.
    Network(String),
    /// The store refused the request.
    Rejected(u16, String),
    /// The store's response body could not be decoded.
    Decode(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Network(msg) => write!(f, "Store network error: {}", msg),
            StoreError::Rejected(status, msg) => {
                write!(f, "Store request rejected ({}): {}", status, msg)
            }
            StoreError::Decode(msg) => write!(f, "Store response decode error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// === FeedError ===

/// Errors related to the change-feed subscription.
#[derive(Debug)]
pub enum FeedError {
    /// The feed connection could not be established.
    Connect(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Connect(msg) => write!(f, "Change feed connect error: {}", msg),
        }
    }
}

impl std::error::Error for FeedError {}
