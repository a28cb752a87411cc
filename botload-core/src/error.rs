pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`chatId` must not be blank")]
    BlankChatId,

    #[error("`messageText` must not be blank")]
    BlankMessageText,

    #[error("`threadCount` must be a positive integer")]
    InvalidThreadCount,

    #[error("`threadCount` must not exceed {max}")]
    ThreadCountTooLarge { max: u32 },

    #[error("`requestsPerThread` must be a positive integer")]
    InvalidRequestsPerWorker,

    #[error("`botUrl` must not be blank (pass it in the request or configure a default bot url)")]
    BlankBaseUrl,

    #[error("`apiMethod` must not be blank")]
    BlankApiMethod,

    #[error("invalid target url `{url}`: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("failed to encode request payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("no async runtime available to run the test: {0}")]
    NoRuntime(String),
}

impl Error {
    /// Errors caused by a malformed test definition, reported before any run starts.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::BlankChatId
                | Self::BlankMessageText
                | Self::InvalidThreadCount
                | Self::ThreadCountTooLarge { .. }
                | Self::InvalidRequestsPerWorker
                | Self::BlankBaseUrl
                | Self::BlankApiMethod
        )
    }
}
