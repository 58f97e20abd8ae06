//! Errors raised while adapting sources to contracts and while operating
//! on adapted instances through their shims.

/// Adaptation and shim errors.
///
/// Reads degrade to zero values instead of failing, so most of these
/// surface from writes, calls, and contract resolution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdaptError {
    /// No property with this name is reachable on the source
    #[error("property '{property}' was not found on {source}")]
    PropertyNotFound {
        /// Runtime type of the source that was searched
        // Declared raw so thiserror does not infer it as the Error::source()
        // cause (String: !std::error::Error); same field name as `source`.
        r#source: String,
        /// Requested property name
        property: String,
    },

    /// No method with this name is reachable on the source
    #[error("method '{method}' was not found on {source}")]
    MethodNotFound {
        /// Runtime type of the source that was searched
        r#source: String,
        /// Requested method name
        method: String,
    },

    /// Backing-store access named a slot the contract does not declare
    #[error("no backing slot for '{property}' on contract {contract}")]
    BackingFieldNotFound {
        /// Contract owning the backing store
        contract: String,
        /// Requested slot name
        property: String,
    },

    /// Write to a property without a writable storage location
    #[error("property '{property}' on {source} is read-only")]
    ReadOnlyProperty {
        /// Declaring contract or source type
        r#source: String,
        /// Property name
        property: String,
    },

    /// Read from a property without a readable storage location
    #[error("property '{property}' on {source} is write-only")]
    WriteOnlyProperty {
        /// Declaring contract or source type
        r#source: String,
        /// Property name
        property: String,
    },

    /// Fuzzy call with the wrong number of arguments
    #[error("{provided} parameters were provided for method {qualified} but it requires {required} parameters")]
    ParameterCountMismatch {
        /// Arguments supplied by the caller
        provided: usize,
        /// Parameters the method declares
        required: usize,
        /// `Type.method` the call resolved to
        qualified: String,
    },

    /// Fuzzy argument reordering needs pairwise-distinct parameter types
    #[error("arguments for method {qualified} cannot be reordered to match its parameter types")]
    UnresolveableParameterOrder {
        /// `Type.method` the call resolved to
        qualified: String,
    },

    /// Contract flattening found two incompatible members with one name
    #[error("contract {contract} declares conflicting signatures for member '{member}'")]
    AmbiguousContract {
        /// Contract whose extension graph was flattened
        contract: String,
        /// Colliding member name
        member: String,
    },

    /// Write needed a conversion no registered converter provides
    #[error("no converter from {from} to {to} for property '{property}'")]
    NoConverter {
        /// Runtime type of the written value
        from: String,
        /// Declared storage type
        to: String,
        /// Property being written
        property: String,
    },

    /// The contract itself cannot be synthesized
    #[error("contract {contract} is invalid: {reason}")]
    InvalidContract {
        /// Offending contract
        contract: String,
        /// Why synthesis refused it
        reason: String,
    },

    /// The source cannot satisfy the contract
    #[error("{source} cannot be adapted to contract {contract}")]
    NotAdaptable {
        /// Runtime type of the rejected source
        r#source: String,
        /// Target contract
        contract: String,
    },

    /// A resolved method invoker reported a failure
    #[error("method {method} failed: {message}")]
    MethodFailed {
        /// `Type.method` that was invoked
        method: String,
        /// Failure detail from the invoker
        message: String,
    },
}

/// Convenience alias for adaptation results.
pub type AdaptResult<T> = Result<T, AdaptError>;
