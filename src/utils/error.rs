use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Failed to load WSDL from {uri}: {message}")]
    WsdlParse { uri: String, message: String },

    #[error("No such operation: {name}")]
    NoSuchOperation { name: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} returned by {url}")]
    HttpStatus { status: u16, url: String },

    #[error("SOAP fault [{code}]: {message}")]
    SoapFault { code: String, message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Wsdl,
    Dispatch,
    Transport,
    Protocol,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ProxyError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn wsdl(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WsdlParse {
            uri: uri.into(),
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument { .. } => ErrorCategory::Input,
            Self::WsdlParse { .. } => ErrorCategory::Wsdl,
            Self::NoSuchOperation { .. } => ErrorCategory::Dispatch,
            Self::Transport(_) | Self::HttpStatus { .. } => ErrorCategory::Transport,
            Self::SoapFault { .. } | Self::Protocol { .. } | Self::Xml(_) => {
                ErrorCategory::Protocol
            }
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 遠端暫時性問題，重試可能成功
            ErrorCategory::Transport => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 給 CLI 使用者看的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InvalidArgument { message } => format!("The WSDL address is not valid: {}", message),
            Self::WsdlParse { uri, .. } => format!("Could not read a WSDL document from {}", uri),
            Self::NoSuchOperation { name } => {
                format!("The service does not offer an operation named '{}'", name)
            }
            Self::Transport(e) if e.is_timeout() => "The service did not answer in time".to_string(),
            Self::Transport(_) => "Could not reach the service".to_string(),
            Self::HttpStatus { status, .. } => format!("The service answered with HTTP {}", status),
            Self::SoapFault { message, .. } => format!("The service reported a fault: {}", message),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Pass an absolute http:// or https:// URL",
            ErrorCategory::Wsdl => "Check that the URL serves a WSDL 1.1 document (often ends with ?wsdl)",
            ErrorCategory::Dispatch => "Run with --list to see the operations the service exposes",
            ErrorCategory::Transport => "Check network access and consider a longer --timeout",
            ErrorCategory::Protocol => "Run with --debug to inspect the raw SOAP exchange",
            ErrorCategory::Configuration => "Fix the configuration file and try again",
            ErrorCategory::System => "Check file permissions and available resources",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
