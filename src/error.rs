use thiserror::Error;

use crate::ir::NodeId;

macro_rules! invariant_error {
    // Single string version
    ($node:expr, $access:expr, $msg:expr) => {
        crate::Error::InvariantViolation {
            node: $node,
            access: $access.to_string(),
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($node:expr, $access:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::InvariantViolation {
            node: $node,
            access: $access.to_string(),
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! graph_error {
    ($msg:expr) => {
        crate::Error::GraphError($msg.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::GraphError(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Failing to prove that a frame access can stay virtual is *not* an error: the rewrite rules
/// report it as [`Rewrite::Bailout`](crate::virt::Rewrite::Bailout) and fall back to
/// deoptimization. The variants here describe malformed input IR or misuse of the graph API,
/// and abort the compilation of the affected unit.
///
/// # Error Categories
///
/// - [`Error::InvariantViolation`] - The IR handed to a rewrite rule breaks a structural
///   invariant (e.g. a tag store and a data store disagree on their entry count)
/// - [`Error::GraphError`] - A graph operation was attempted on a dead node or would leave
///   dangling edges
///
/// # Examples
///
/// ```rust
/// use framevirt::Error;
///
/// fn report(err: &Error) -> String {
///     match err {
///         Error::InvariantViolation { node, access, message, .. } => {
///             format!("{node} ({access}): {message}")
///         }
///         Error::GraphError(message) => message.clone(),
///     }
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The IR violates an invariant that the rewrite rules rely on.
    ///
    /// This indicates a malformed upstream graph rather than a failed optimization proof and is
    /// fatal for the compilation unit it occurs in.
    ///
    /// # Fields
    ///
    /// * `node` - The offending node
    /// * `access` - Description of the frame access being rewritten
    /// * `message` - What was violated
    /// * `file` - Source file where the violation was detected
    /// * `line` - Source line where the violation was detected
    #[error("Invariant violation at {node} [{access}] - {file}:{line}: {message}")]
    InvariantViolation {
        /// The node whose rewrite detected the violation
        node: NodeId,
        /// Human readable description of the access
        access: String,
        /// The message to be printed for the violation
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Graph structure error.
    ///
    /// Raised when removing a node that still has usages, or when an operation refers to a node
    /// that has already been removed from the graph.
    #[error("{0}")]
    GraphError(String),
}
