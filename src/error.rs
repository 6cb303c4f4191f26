use thiserror::Error;

/// Structural failure in the dump. Fatal: the reader stops at the first one.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML at byte {offset}")]
    Xml {
        offset: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("invalid UTF-8 inside <{element}> at byte {offset}")]
    Encoding { offset: u64, element: &'static str },

    #[error("invalid namespace id {value:?} at byte {offset}")]
    Namespace { offset: u64, value: String },

    #[error("input ended at byte {offset} inside an open <{element}> element")]
    Truncated { offset: u64, element: &'static str },

    #[error("<{element}> at byte {offset} opened before the previous one was closed")]
    Unclosed { offset: u64, element: &'static str },
}

impl ParseError {
    /// Byte offset into the (decompressed) stream where the problem was detected.
    pub fn offset(&self) -> u64 {
        match self {
            ParseError::Xml { offset, .. }
            | ParseError::Encoding { offset, .. }
            | ParseError::Namespace { offset, .. }
            | ParseError::Truncated { offset, .. }
            | ParseError::Unclosed { offset, .. } => *offset,
        }
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write output")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize record {title:?}")]
    Serialize {
        title: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("writer was already finished")]
    Finished,
}

/// Why a run ended in `Failed`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("pipeline task did not complete")]
    Task(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_reported_for_every_variant() {
        let truncated = ParseError::Truncated {
            offset: 42,
            element: "page",
        };
        assert_eq!(truncated.offset(), 42);

        let ns = ParseError::Namespace {
            offset: 7,
            value: "abc".to_string(),
        };
        assert_eq!(ns.offset(), 7);
        assert!(ns.to_string().contains("\"abc\""));
    }

    #[test]
    fn parse_error_converts_into_pipeline_error() {
        let err: PipelineError = ParseError::Encoding {
            offset: 3,
            element: "text",
        }
        .into();
        assert!(matches!(err, PipelineError::Parse(_)));
        assert!(err.to_string().contains("byte 3"));
    }
}
