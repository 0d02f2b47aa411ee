//! Error type for marshalling operations.

/// Unified error type for the strict marshall/unmarshall paths.
///
/// Every failure crossing the service boundary is one of these variants;
/// raw I/O or codec-internal errors are folded into [`Codec`](Self::Codec)
/// with their cause chain rendered into the message. The lenient reload
/// path never surfaces this type to callers; failures there are logged
/// and suppressed.
#[derive(Debug, thiserror::Error)]
pub enum MarshallingError {
    /// The wire data was produced by a different encoding backend.
    #[error("Wire format mismatch: expected '{expected}', found '{found}'")]
    FormatMismatch { expected: String, found: String },
    /// No process definition was bound to the unmarshalling context.
    #[error("No process definition bound to the unmarshalling context")]
    MissingDefinition,
    /// The marshalled state was created from a different process definition.
    #[error("Definition mismatch: data was marshalled from process '{found}', attempted to bind '{expected}'")]
    DefinitionMismatch { expected: String, found: String },
    /// Reload was handed bytes belonging to a different instance.
    #[error("Data belongs to instance '{found}', cannot reload instance '{expected}'")]
    InstanceMismatch { expected: String, found: String },
    /// No registered writer accepted a node instance.
    #[error("No registered writer accepts node instance '{node_id}' of kind '{kind}'")]
    UnsupportedNodeKind { node_id: String, kind: String },
    /// No registered reader accepted a persisted node kind.
    #[error("No registered reader accepts node kind '{kind}'")]
    UnknownNodeKind { kind: String },
    /// No registered strategy accepted a variable value.
    #[error("No registered strategy accepts the value of variable '{0}'")]
    UnsupportedVariable(String),
    /// The strategy recorded in the wire data is not registered.
    #[error("Unknown marshalling strategy '{strategy}' for variable '{variable}'")]
    UnknownStrategy { strategy: String, variable: String },
    /// Encoding or decoding failure from the underlying stream or a codec.
    #[error("Codec error: {0}")]
    Codec(String),
}

impl MarshallingError {
    /// Fold a codec-internal failure into the domain error, keeping the
    /// full cause chain in the message.
    pub(crate) fn codec(err: anyhow::Error) -> Self {
        MarshallingError::Codec(format!("{err:#}"))
    }
}
