//! All error-related types. Load-time problems (malformed documents and
//! failed validation) are [CompileError]s; problems during execution are
//! [RuntimeError]s. Both indicate a flaw in the user's program, _not_ an
//! internal bug. Internal invariant violations always panic.

use crate::util::{self, Span};
use serde::Serialize;
use std::fmt::{self, Debug, Display, Formatter};
use thiserror::Error;

/// A trait for any error that originates in a source document. These errors
/// rely on having the source present in order to display themselves.
pub trait SourceError: 'static + Send + Sync + Debug + Serialize {
    /// A simple type label for this error, e.g. `"Parse"` or `"Runtime"`.
    fn type_label(&self) -> &'static str;

    /// Format this error into a simple message. `spanned_src` is the slice
    /// of the source that corresponds to this error's [Span]; the caller
    /// provides it so that messages can quote the offending text.
    fn fmt_msg(&self, f: &mut Formatter<'_>, spanned_src: &str) -> fmt::Result;
}

/// An error that occurs while loading a program, either because the document
/// is malformed or because a reference inside it doesn't resolve. A failed
/// load never exposes a partial program.
#[derive(Clone, Debug, Serialize)]
pub enum CompileError {
    /// The document itself is not well-formed
    Syntax { detail: String },
    /// A required element is missing
    MissingElement { expected: &'static str },
    /// A required attribute is missing from an element
    MissingAttribute { attribute: &'static str },
    /// An instruction carries the wrong number of `S-Variable` children
    WrongVariableCount { found: usize },
    /// The `type` attribute is neither `basic` nor `synthetic`
    InvalidInstructionType { found: String },
    /// The operation name is not recognized for its declared type
    UnknownOp { name: String },
    /// A variable name doesn't match `y`/`x{n}`/`z{n}`
    InvalidVariable,
    /// A constant argument is not an integer
    InvalidInteger,
    /// A line tries to define the reserved `EXIT` label
    ReservedLabel,
    /// A `functionArguments` expression doesn't parse
    InvalidArgumentExpression { detail: String },
    /// An operation is missing one of its required arguments
    MissingArgument { argument: &'static str },
    /// A jump references a label that is defined nowhere in its sequence
    InvalidLabel,
    /// A `QUOTE` references a function that is neither user-defined nor
    /// built-in
    UnknownFunction,
}

impl SourceError for CompileError {
    fn type_label(&self) -> &'static str {
        match self {
            Self::MissingArgument { .. }
            | Self::InvalidLabel
            | Self::UnknownFunction => "Validation",
            _ => "Parse",
        }
    }

    fn fmt_msg(&self, f: &mut Formatter<'_>, spanned_src: &str) -> fmt::Result {
        match self {
            Self::Syntax { detail } => write!(f, "Malformed document: {}", detail),
            Self::MissingElement { expected } => {
                write!(f, "Missing required element `{}`", expected)
            }
            Self::MissingAttribute { attribute } => {
                write!(f, "Missing required attribute `{}`", attribute)
            }
            Self::WrongVariableCount { found } => write!(
                f,
                "Expected exactly 1 `S-Variable` child, found {}",
                found
            ),
            Self::InvalidInstructionType { found } => write!(
                f,
                "Instruction type must be `basic` or `synthetic`, found `{}`",
                found
            ),
            Self::UnknownOp { name } => {
                write!(f, "Unknown operation `{}`", name)
            }
            Self::InvalidVariable => {
                write!(f, "Invalid variable name in `{}`", spanned_src)
            }
            Self::InvalidInteger => {
                write!(f, "Invalid integer constant in `{}`", spanned_src)
            }
            Self::ReservedLabel => {
                write!(f, "`EXIT` is reserved and cannot label a line")
            }
            Self::InvalidArgumentExpression { detail } => {
                write!(f, "Invalid function arguments: {}", detail)
            }
            Self::MissingArgument { argument } => {
                write!(f, "Missing required argument `{}`", argument)
            }
            Self::InvalidLabel => {
                write!(f, "Jump to undefined label in `{}`", spanned_src)
            }
            Self::UnknownFunction => {
                write!(f, "Reference to undefined function in `{}`", spanned_src)
            }
        }
    }
}

/// An error that occurs during execution. The offending instruction's
/// position is attached by the wrapping layer; the partial frame stays
/// observable on the [Machine](crate::Machine) for inspection.
#[derive(Clone, Debug, Serialize)]
pub enum RuntimeError {
    /// Execution attempted after the cycle budget was exhausted
    CycleLimitExceeded { limit: u64 },
    /// Function dispatch nested deeper than the recursion guard allows
    CallDepthExceeded { limit: usize },
    /// A debug session attempted more forward steps than its ceiling
    StepLimitExceeded { limit: u32 },
    /// Dispatch reached a function that no longer resolves (the validator
    /// rejects this at load time; hitting it at runtime is defensive)
    UnknownFunction { name: String },
    /// A variable lookup missed the frame (defensive; frames pre-seed every
    /// referenced variable)
    InvalidVariable { name: String },
}

impl SourceError for RuntimeError {
    fn type_label(&self) -> &'static str {
        "Runtime"
    }

    fn fmt_msg(&self, f: &mut Formatter<'_>, spanned_src: &str) -> fmt::Result {
        match self {
            Self::CycleLimitExceeded { limit } => write!(
                f,
                "Cycle budget of {} exhausted, cannot execute `{}`",
                limit, spanned_src
            ),
            Self::CallDepthExceeded { limit } => write!(
                f,
                "Function calls nested deeper than {} levels",
                limit
            ),
            Self::StepLimitExceeded { limit } => write!(
                f,
                "Debug session exceeded its ceiling of {} steps",
                limit
            ),
            Self::UnknownFunction { name } => {
                write!(f, "Unknown function `{}`", name)
            }
            Self::InvalidVariable { name } => {
                write!(f, "Unknown variable `{}`", name)
            }
        }
    }
}

/// A wrapper around a [SourceError] that holds the [Span] of the source that
/// caused the error, plus the offending chunk of source itself. This type can
/// be formatted on its own, without any external data.
#[derive(Clone, Debug, Error, Serialize)]
pub struct SourceErrorWrapper<E: SourceError> {
    error: E,
    span: Span,
    spanned_source: String,
}

impl<E: SourceError> SourceErrorWrapper<E> {
    pub fn new(error: E, span: Span, src: &str) -> Self {
        Self {
            error,
            span,
            spanned_source: span.get_source_slice(src).into(),
        }
    }

    pub fn error(&self) -> &E {
        &self.error
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

impl<E: SourceError> Display for SourceErrorWrapper<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error at {}:{}: ",
            self.error.type_label(),
            self.span.start_line,
            self.span.start_col,
        )?;
        self.error.fmt_msg(f, &self.spanned_source)?;
        Ok(())
    }
}

/// A collection of errors together with the source document they refer to,
/// so each error can be rendered with its associated source text.
#[derive(Clone, Debug, Error, Serialize)]
pub struct WithSource<E: SourceError> {
    errors: Vec<SourceErrorWrapper<E>>,
    #[serde(skip)]
    source_code: String,
}

impl<E: SourceError> WithSource<E> {
    /// Wrap a collection of errors with their source code.
    pub(crate) fn new(
        errors: impl IntoIterator<Item = SourceErrorWrapper<E>>,
        source: String,
    ) -> Self {
        Self {
            errors: errors.into_iter().collect(),
            source_code: source,
        }
    }

    /// Get a reference to the errors wrapped by this type.
    pub fn errors(&self) -> &[SourceErrorWrapper<E>] {
        &self.errors
    }
}

impl<E: SourceError> Display for WithSource<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Write each error, separated by a newline
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }

            write!(f, "{}", error)?;
            if f.alternate() {
                util::fmt_src_highlights(f, &error.span, &self.source_code)?;
            }
        }
        Ok(())
    }
}
