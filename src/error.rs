use thiserror::Error;

#[derive(Debug, Error)]
pub enum GmlError {
    #[error("XML read error at position {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("text content is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("element <{0}> is not closed before end of document")]
    UnclosedElement(String),

    #[error("document has no root element")]
    NoRootElement,

    #[error("second top-level element <{0}> after the root element")]
    MultipleRootElements(String),

    #[error("text outside the root element: '{0}'")]
    TextOutsideRoot(String),

    #[error("invalid coordinate '{token}': {reason}")]
    InvalidCoordinate { token: String, reason: String },
}

pub type Result<T> = std::result::Result<T, GmlError>;
