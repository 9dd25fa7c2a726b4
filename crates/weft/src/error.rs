//! Error types for template rendering.

use thiserror::Error;

/// Errors produced while rendering a template.
///
/// Any of these aborts the render immediately; output already written to
/// the sink is not rolled back. Break/continue/exit are not errors — they
/// are control-flow signals consumed inside the renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No template registered under the requested name.
    #[error("template not found: {0:?}")]
    TemplateNotFound(String),

    /// A print expression produced no value (missing variable, or a
    /// modifier chain ended on an empty value).
    #[error("empty argument in print expression")]
    EmptyArg,

    /// A comparison with no dynamic operand.
    #[error("senseless condition: no dynamic operand")]
    SenselessCond,

    /// A modifier name with no registry entry.
    #[error("unknown modifier: {0:?}")]
    UnknownModifier(String),

    /// A condition helper name with no registry entry.
    #[error("unknown condition helper: {0:?}")]
    UnknownCondFn(String),

    /// An `as KIND` binding kind with no registry entry.
    #[error("unknown binding kind: {0:?}")]
    UnknownKind(String),

    /// A modifier invoked with too few arguments.
    #[error("modifier {name:?} needs {need} argument(s), got {got}")]
    ModArgs {
        name: &'static str,
        need: usize,
        got: usize,
    },

    /// A value could not be coerced to the requested kind.
    #[error("cannot convert value to {0}")]
    Conversion(&'static str),

    /// A sequence- or mapping-shaped value reached a print expression.
    #[error("value is not printable as text")]
    Unprintable,

    /// A break, continue or else node outside its construct.
    #[error("control node outside its construct")]
    StrayCtl,

    /// The output sink failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;
