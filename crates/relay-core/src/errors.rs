/// Failure to hand an outbound event to a connection.
///
/// Delivery is best effort: callers log these and move on.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,
    #[error("send queue full")]
    QueueFull,
    #[error("failed to encode event: {0}")]
    Encode(String),
}

impl SendError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::QueueFull => "queue_full",
            Self::Encode(_) => "encode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        assert_eq!(SendError::Closed.error_kind(), "closed");
        assert_eq!(SendError::QueueFull.error_kind(), "queue_full");
        assert_eq!(SendError::Encode("x".into()).error_kind(), "encode");
    }

    #[test]
    fn display_messages() {
        assert_eq!(SendError::Closed.to_string(), "connection closed");
        assert_eq!(
            SendError::Encode("bad utf8".into()).to_string(),
            "failed to encode event: bad utf8"
        );
    }
}
