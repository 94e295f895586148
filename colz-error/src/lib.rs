//! Error handling for the colz crates.
//!
//! Every fallible operation returns a [`ColzResult`]. The error kinds mirror the failure
//! classes of a columnar table: broken invariants, bad arguments, unbound expression
//! variables, writes against read-only storage and on-disk conflicts.

// Aliased so thiserror does not treat these fields as nightly-only `provide` backtraces.
use std::backtrace::Backtrace as StdBacktrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{env, fmt, io};

pub use ext::*;

mod ext;

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

#[allow(clippy::fallible_impl_from)]
impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    #[allow(clippy::panic)]
    fn from(msg: T) -> Self {
        if env::var("COLZ_PANIC_ON_ERR").as_deref().unwrap_or("") == "1" {
            panic!("{}\nBacktrace:\n{}", msg.into(), StdBacktrace::capture());
        } else {
            Self(msg.into())
        }
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type for colz.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum ColzError {
    /// A structural invariant would be broken: column lengths disagree, a column name is
    /// duplicated or unknown, or a position is invalid.
    #[error("{0}\nBacktrace:\n{1}")]
    InvariantViolation(ErrString, StdBacktrace),
    /// An argument was rejected before anything was mutated.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, StdBacktrace),
    /// An index is out of bounds.
    #[error("index {0} out of bounds from {1} to {2}\nBacktrace:\n{3}")]
    OutOfBounds(usize, usize, usize, StdBacktrace),
    /// An expression references a name that resolves to nothing.
    #[error("{0}\nBacktrace:\n{1}")]
    UnboundVariable(ErrString, StdBacktrace),
    /// A mutation was attempted on storage opened read-only.
    #[error("{0}\nBacktrace:\n{1}")]
    ModeViolation(ErrString, StdBacktrace),
    /// Creating or copying persisted data would clobber an existing directory.
    #[error("{0}\nBacktrace:\n{1}")]
    PersistenceConflict(ErrString, StdBacktrace),
    /// Two types that were expected to be compatible were not.
    #[error("expected type: {0} but instead got {1}\nBacktrace:\n{2}")]
    MismatchedTypes(ErrString, ErrString, StdBacktrace),
    /// An expression could not be tokenized or parsed.
    #[error("{0}\nBacktrace:\n{1}")]
    ExpressionError(ErrString, StdBacktrace),
    /// Metadata read back from disk is malformed.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidSerde(ErrString, StdBacktrace),
    /// A wrapper for other errors, carrying additional context.
    #[error("{0}: {1}")]
    Context(ErrString, #[source] Box<ColzError>),
    /// A wrapper for IO errors.
    #[error(transparent)]
    IOError(#[from] io::Error),
    /// A wrapper for JSON (de)serialization errors.
    #[cfg(feature = "serde")]
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

impl ColzError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        ColzError::Context(msg.into(), Box::new(self))
    }

    /// Strips [`ColzError::Context`] wrappers and returns the innermost error.
    pub fn root_cause(&self) -> &ColzError {
        match self {
            ColzError::Context(_, inner) => inner.root_cause(),
            other => other,
        }
    }
}

impl Debug for ColzError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A type alias for Results that return [`ColzError`]s as their error type.
pub type ColzResult<T> = Result<T, ColzError>;

/// A convenient macro for creating a [`ColzError`].
#[macro_export]
macro_rules! colz_err {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use($crate::ColzError::OutOfBounds(
            $idx,
            $start,
            $stop,
            Backtrace::capture(),
        ))
    }};
    (MismatchedTypes: $expected:expr, $actual:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use($crate::ColzError::MismatchedTypes(
            $expected.to_string().into(),
            $actual.to_string().into(),
            Backtrace::capture(),
        ))
    }};
    (Context: $msg:literal, $err:expr) => {{
        $crate::__private::must_use($crate::ColzError::Context($msg.into(), Box::new($err)))
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use($crate::ColzError::$variant(
            format!($fmt, $($arg),*).into(),
            Backtrace::capture(),
        ))
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::colz_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning a [`ColzError`].
#[macro_export]
macro_rules! colz_bail {
    ($($tt:tt)+) => {
        return Err($crate::colz_err!($($tt)+))
    };
}

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[must_use]
    pub const fn must_use(err: crate::ColzError) -> crate::ColzError {
        err
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fails(kind: &str) -> ColzResult<()> {
        match kind {
            "mode" => colz_bail!(ModeViolation: "column is read-only"),
            "oob" => colz_bail!(OutOfBounds: 7, 0, 5),
            _ => colz_bail!("bad argument {kind}"),
        }
    }

    #[test]
    fn bail_selects_variant() {
        assert!(matches!(
            fails("mode").unwrap_err(),
            ColzError::ModeViolation(..)
        ));
        assert!(matches!(
            fails("oob").unwrap_err(),
            ColzError::OutOfBounds(7, 0, 5, _)
        ));
        assert!(matches!(
            fails("other").unwrap_err(),
            ColzError::InvalidArgument(..)
        ));
    }

    #[test]
    fn context_keeps_root_cause() {
        let err = colz_err!(UnboundVariable: "name 'x' is not defined")
            .with_context("evaluating 'x + 1'");
        assert!(err.to_string().starts_with("evaluating 'x + 1': name 'x'"));
        assert!(matches!(err.root_cause(), ColzError::UnboundVariable(..)));
    }

    #[test]
    fn io_errors_convert() {
        let err: ColzError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, ColzError::IOError(_)));
    }
}
