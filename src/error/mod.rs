//! Error module for the naming index
//!
//! This module defines the error types and codes used throughout the index core,
//! the event bus and the fuzzy subscribe request boundary.

use thiserror::Error;
use std::fmt;

/// Error code, grouped by category in the high byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Request errors (0x0001-0x00FF)
    InvalidParam = 0x0001,
    MalformedPattern = 0x0002,
    UnsupportedRequestType = 0x0003,

    // Index errors (0x0101-0x01FF)
    HandlerFailed = 0x0101,
    UnexpectedEvent = 0x0102,

    // Bus errors (0x0201-0x02FF)
    EventBusFull = 0x0201,
    EventBusClosed = 0x0202,

    // System errors (0x0301-0x03FF)
    InternalServerError = 0x0301,
    ConfigInvalid = 0x0302,
}

impl ErrorCode {
    /// Get the error code as a u16
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the error code category
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() >> 8 {
            0x00 => ErrorCategory::Request,
            0x01 => ErrorCategory::Index,
            0x02 => ErrorCategory::Bus,
            0x03 => ErrorCategory::System,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Try to convert a u16 to an ErrorCode
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0x0001 => Some(Self::InvalidParam),
            0x0002 => Some(Self::MalformedPattern),
            0x0003 => Some(Self::UnsupportedRequestType),
            0x0101 => Some(Self::HandlerFailed),
            0x0102 => Some(Self::UnexpectedEvent),
            0x0201 => Some(Self::EventBusFull),
            0x0202 => Some(Self::EventBusClosed),
            0x0301 => Some(Self::InternalServerError),
            0x0302 => Some(Self::ConfigInvalid),
            _ => None,
        }
    }

    /// Get a human-readable description of the error code
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidParam => "Invalid request parameter",
            Self::MalformedPattern => "Malformed fuzzy subscribe pattern",
            Self::UnsupportedRequestType => "Unsupported request type",
            Self::HandlerFailed => "Event handler failed",
            Self::UnexpectedEvent => "Event delivered to a handler that does not accept it",
            Self::EventBusFull => "Event bus queue is full",
            Self::EventBusClosed => "Event bus is shut down",
            Self::InternalServerError => "Unexpected server error",
            Self::ConfigInvalid => "Invalid configuration",
        }
    }

    /// Whether a caller sent something we refuse to process
    pub fn is_invalid_param(&self) -> bool {
        self.category() == ErrorCategory::Request
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidParam => "INVALID_PARAM",
            Self::MalformedPattern => "MALFORMED_PATTERN",
            Self::UnsupportedRequestType => "UNSUPPORTED_REQUEST_TYPE",
            Self::HandlerFailed => "HANDLER_FAILED",
            Self::UnexpectedEvent => "UNEXPECTED_EVENT",
            Self::EventBusFull => "EVENT_BUS_FULL",
            Self::EventBusClosed => "EVENT_BUS_CLOSED",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::ConfigInvalid => "CONFIG_INVALID",
        };
        write!(f, "{} (0x{:04X})", name, self.as_u16())
    }
}

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Request,
    Index,
    Bus,
    System,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "Request"),
            Self::Index => write!(f, "Index"),
            Self::Bus => write!(f, "Bus"),
            Self::System => write!(f, "System"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Main error type for the naming index
#[derive(Error, Debug)]
pub enum NamingError {
    #[error("{code}: {message}")]
    Standard {
        code: ErrorCode,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Other(String),
}

impl NamingError {
    /// Create a new standard error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Standard {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for the invalid-parameter errors raised at the request boundary
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParam, message)
    }

    /// Get the error code if this is a standard error
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Standard { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::Standard { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }
}

/// Result type alias for naming index operations
pub type Result<T> = std::result::Result<T, NamingError>;

impl From<String> for NamingError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

impl From<&str> for NamingError {
    fn from(message: &str) -> Self {
        Self::Other(message.to_string())
    }
}
