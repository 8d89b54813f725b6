use std::fmt;

/// Custom error types for Print Check.
///
/// The extractor and the anomaly detector are total and never produce
/// errors. Everything here belongs to the layer that feeds them: opening
/// program files, talking to the printer API and reading configuration.

/// Main error type for Print Check operations.
#[derive(Debug)]
pub enum PrintCheckError {
    /// Errors related to reading toolpath program files.
    Program(ProgramError),

    /// Errors related to the printer control API.
    Printer(PrinterError),

    /// Configuration and setup errors.
    Config(ConfigError),
}

/// Errors raised while producing the line source for the extractor.
#[derive(Debug)]
pub enum ProgramError {
    /// The program file does not exist.
    MissingFile { path: String },

    /// The program file exists but could not be opened or read.
    ReadFailed { path: String, reason: String },
}

/// Errors specific to the printer API.
#[derive(Debug)]
pub enum PrinterError {
    /// Failed to connect to printer API.
    ConnectionFailed { api_url: String, reason: String },

    /// Printer API returned an error response.
    ApiError {
        endpoint: String,
        status: u16,
        message: String,
    },
}

/// Errors related to configuration and application setup.
#[derive(Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    MissingEnvVar { var_name: String },

    /// Invalid configuration values provided.
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl fmt::Display for PrintCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrintCheckError::Program(e) => write!(f, "Program error: {}", e),
            PrintCheckError::Printer(e) => write!(f, "Printer error: {}", e),
            PrintCheckError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::MissingFile { path } => {
                write!(f, "File not found: {}", path)
            }
            ProgramError::ReadFailed { path, reason } => {
                write!(f, "Failed to read program '{}': {}", path, reason)
            }
        }
    }
}

impl fmt::Display for PrinterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrinterError::ConnectionFailed { api_url, reason } => {
                write!(
                    f,
                    "Failed to connect to printer at '{}': {}",
                    api_url, reason
                )
            }
            PrinterError::ApiError {
                endpoint,
                status,
                message,
            } => {
                write!(
                    f,
                    "Printer API error at '{}' (HTTP {}): {}",
                    endpoint, status, message
                )
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnvVar { var_name } => {
                write!(f, "Required environment variable '{}' is not set", var_name)
            }
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for field '{}': {}",
                    value, field, reason
                )
            }
        }
    }
}

impl std::error::Error for PrintCheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PrintCheckError::Program(e) => Some(e),
            PrintCheckError::Printer(e) => Some(e),
            PrintCheckError::Config(e) => Some(e),
        }
    }
}

impl std::error::Error for ProgramError {}
impl std::error::Error for PrinterError {}
impl std::error::Error for ConfigError {}

impl From<ProgramError> for PrintCheckError {
    fn from(err: ProgramError) -> Self {
        PrintCheckError::Program(err)
    }
}

impl From<PrinterError> for PrintCheckError {
    fn from(err: PrinterError) -> Self {
        PrintCheckError::Printer(err)
    }
}

impl From<ConfigError> for PrintCheckError {
    fn from(err: ConfigError) -> Self {
        PrintCheckError::Config(err)
    }
}
