//! CLI error handling with user-friendly messages.

use std::fmt;
use std::io;
use std::process;

use gitpulse::error::Error;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to build a component of the stack
    Setup(Error),
    /// Failed to bind the listen address
    Bind { address: String, error: io::Error },
    /// HTTP server terminated with an error
    Serve(io::Error),
}

impl CliError {
    /// Exit the process with an error message and a non-zero code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Setup(Error::Internal(_)) = self {
            eprintln!();
            eprintln!("If the persistent store failed to open, check that the");
            eprintln!("--db-path directory is writable and not used by another");
            eprintln!("gitpulse instance.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Setup(e) => write!(f, "Failed to set up the service: {}", e),
            CliError::Bind { address, error } => {
                write!(f, "Failed to bind '{}': {}", address, error)
            }
            CliError::Serve(e) => write!(f, "HTTP server error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Setup(e) => Some(e),
            CliError::Bind { error, .. } => Some(error),
            CliError::Serve(e) => Some(e),
        }
    }
}
