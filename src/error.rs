// error.rs
//
// Error taxonomy for the sample. Remote failures are classified from what the
// Azure CLI prints on stderr so that the pipeline can tell "nothing there"
// apart from genuine failures.

use crate::azuresir::system::InvalidDefinition;
use crate::pipelines::Step;
use std::fmt;
use std::io;
use thiserror::Error;

pub type CloudResult<T> = std::result::Result<T, CloudError>;

/// Coarse category of a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Transient,
    Failed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CloudError {
    /// The CLI binary could not be started at all
    #[error("could not run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("request rejected: {0}")]
    Validation(String),

    #[error("transient failure, the operation may succeed later: {0}")]
    Transient(String),

    #[error("unexpected output from `{command}`")]
    Parse {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    /// Injected by the simulated control plane
    #[error("simulated failure of {0}")]
    Simulated(String),
}

const NOT_FOUND_MARKERS: &[&str] = &["ResourceNotFound", "ResourceGroupNotFound", "could not be found"];
const TRANSIENT_MARKERS: &[&str] = &["TooManyRequests", "RetryableError", "ServerTimeout", "ServiceUnavailable", "InternalServerError", "AnotherOperationInProgress"];
const VALIDATION_MARKERS: &[&str] = &["InvalidParameter", "BadRequest", "ValidationError", "InvalidTemplate", "InvalidResourceName"];

impl CloudError {
    /// Turns a failed CLI invocation into the matching error class
    pub fn from_cli_failure(command: &str, code: i32, stderr: &str) -> Self {
        let stderr = stderr.trim().to_string();
        let contains_any = |markers: &[&str]| markers.iter().any(|m| stderr.contains(m));

        if contains_any(NOT_FOUND_MARKERS) {
            CloudError::NotFound(stderr)
        } else if contains_any(TRANSIENT_MARKERS) {
            CloudError::Transient(stderr)
        } else if contains_any(VALIDATION_MARKERS) {
            CloudError::Validation(stderr)
        } else {
            CloudError::CommandFailed { command: command.to_string(), code, stderr }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CloudError::NotFound(_) => ErrorKind::NotFound,
            CloudError::Validation(_) => ErrorKind::Validation,
            CloudError::Transient(_) => ErrorKind::Transient,
            CloudError::Spawn { .. } | CloudError::CommandFailed { .. } | CloudError::Parse { .. } | CloudError::Simulated(_) => ErrorKind::Failed,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("config file {path} is not valid YAML for this sample")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("could not read credentials file {path}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("credentials file is missing field '{0}'")]
    MissingField(&'static str),

    #[error("credentials file is neither JSON nor a properties file")]
    Format(#[from] serde_json::Error),

    #[error("could not log in to Azure")]
    Login(#[source] CloudError),
}

/// Why the provisioning part of the workflow stopped
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("step '{step}' failed")]
    Step {
        step: Step,
        #[source]
        source: CloudError,
    },

    /// The control plane answered something the step did not ask for
    #[error("step '{step}' left the VM in an unexpected state: {message}")]
    Unexpected {
        step: Step,
        message: String,
    },

    #[error("step '{step}' has an invalid definition")]
    Invalid {
        step: Step,
        #[source]
        source: InvalidDefinition,
    },

    #[error("could not wait for confirmation")]
    Confirmation(#[source] io::Error),
}

impl PipelineError {
    pub fn step(&self) -> Option<Step> {
        match self {
            PipelineError::Step { step, .. } | PipelineError::Unexpected { step, .. } | PipelineError::Invalid { step, .. } => Some(*step),
            PipelineError::Confirmation(_) => None,
        }
    }
}
