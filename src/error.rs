/// Errors an event handler can return to steer the processor.
#[derive(Debug)]
pub enum EventHandlerError {
    /// Retry the current event after the event retry delay.
    EventRetryError(anyhow::Error),
    /// Retry the whole block after the block retry delay.
    BlockRetryError(anyhow::Error),
    /// Stop the stream.
    UnrecoverableError(anyhow::Error),
}

/// Errors a block handler can return to steer the processor.
#[derive(Debug)]
pub enum BlockHandlerError {
    BlockRetryError(anyhow::Error),
    UnrecoverableError(anyhow::Error),
}

#[derive(Debug)]
pub enum BlockProcessorError {
    UnrecoverableError(anyhow::Error),
}

impl From<EventHandlerError> for BlockHandlerError {
    fn from(error: EventHandlerError) -> Self {
        match error {
            // Event retries are resolved inside the event processor,
            // one that escapes it is treated as a block retry.
            EventHandlerError::EventRetryError(e)
            | EventHandlerError::BlockRetryError(e) => {
                BlockHandlerError::BlockRetryError(e)
            }
            EventHandlerError::UnrecoverableError(e) => {
                BlockHandlerError::UnrecoverableError(e)
            }
        }
    }
}

impl std::fmt::Display for BlockProcessorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockProcessorError::UnrecoverableError(e) => {
                write!(f, "unrecoverable error: {e:#}")
            }
        }
    }
}

impl std::error::Error for BlockProcessorError {}
