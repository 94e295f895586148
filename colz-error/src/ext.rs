use crate::{ColzError, ColzResult, ErrString};

/// Context and flattening for fallible results.
pub trait ResultExt<T> {
    /// Convert the error into a [`ColzError`] wrapped with the message built by `msg`.
    ///
    /// The message is only built when there is an error.
    fn context<M, F>(self, msg: F) -> ColzResult<T>
    where
        M: Into<ErrString>,
        F: FnOnce() -> M;
}

impl<T, E: Into<ColzError>> ResultExt<T> for Result<T, E> {
    fn context<M, F>(self, msg: F) -> ColzResult<T>
    where
        M: Into<ErrString>,
        F: FnOnce() -> M,
    {
        self.map_err(|err| err.into().with_context(msg()))
    }
}

/// Collapse a fallible step applied to the value of another fallible step.
pub trait Unnest<T> {
    fn unnest(self) -> ColzResult<T>;
}

impl<T> Unnest<T> for ColzResult<ColzResult<T>> {
    fn unnest(self) -> ColzResult<T> {
        self.and_then(|inner| inner)
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use super::*;
    use crate::colz_err;

    #[test]
    fn context_wraps_converted_errors() {
        let read: Result<(), io::Error> = Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = read.context(|| "reading 'meta/sizes'").unwrap_err();
        assert!(err.to_string().starts_with("reading 'meta/sizes': gone"));
        assert!(matches!(err.root_cause(), ColzError::IOError(_)));
    }

    #[test]
    fn unnest_keeps_either_error() {
        let ok: ColzResult<ColzResult<u8>> = Ok(Ok(3));
        assert_eq!(ok.unnest().unwrap(), 3);

        let inner: ColzResult<ColzResult<u8>> = Ok(Err(colz_err!(ModeViolation: "read-only")));
        assert!(matches!(inner.unnest(), Err(ColzError::ModeViolation(..))));

        let outer: ColzResult<ColzResult<u8>> = Err(colz_err!("bad"));
        assert!(matches!(outer.unnest(), Err(ColzError::InvalidArgument(..))));
    }
}
