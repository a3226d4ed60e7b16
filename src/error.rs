use thiserror::Error;

/// Status codes sent back to a client whose request could not be served.
///
/// The `Display` output is the exact wire string, so handlers simply
/// return one of these and the protocol writes `err.to_string()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DncError {
    #[error("200 ERR_ALREADYCONNECTED")]
    AlreadyConnected,
    #[error("201 ERR_NOTCONNECTED")]
    NotConnected,
    #[error("202 ERR_BADSTATUS")]
    BadStatus,
    #[error("203 ERR_NOTENOUGHARGS")]
    NotEnoughArgs,
    #[error("204 ERR_NICKNAMENOTEXIST{}", trailing_names(.0))]
    NicknameNotExist(Vec<String>),
    #[error("205 ERR_NICKNAMEINUSE")]
    NicknameInUse,
    #[error("206 ERR_INVALIDNICKNAME")]
    InvalidNickname,
    #[error("207 ERR_WHISPERNOTALLOWED")]
    WhisperNotAllowed,
    #[error("208 ERR_BADANSWER")]
    BadAnswer,
    #[error("209 ERR_FILEIDNOTEXIST")]
    FileIdNotExist,
    #[error("298 ERR_MALFORMEDREQUEST")]
    MalformedRequest,
    /// The detail is logged, never sent.
    #[error("299 ERR_INTERNALERROR")]
    Internal(String),
}

fn trailing_names(names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!(" {}", names.join(" "))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no client is named {0}")]
    NotFound(String),
    #[error("nickname {0} is already taken")]
    AlreadyTaken(String),
}

impl From<RegistryError> for DncError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => DncError::NicknameNotExist(Vec::new()),
            RegistryError::AlreadyTaken(_) => DncError::NicknameInUse,
        }
    }
}

/// Failures that stop the process before or while serving.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("the config file does not exist: {0}")]
    MissingConfig(String),
    #[error("unable to initialise logging: {0}")]
    Logger(#[from] log::SetLoggerError),
}
