//! Utility macros for error handling.

/// Creates a [`crate::error::TrestleError`] from an error kind and
/// description, with an optional dynamic detail string.
///
/// # Examples
/// ```rust,no_run
/// use trestle::error::ErrorKind;
/// use trestle::trestle_error;
///
/// let error = trestle_error!(ErrorKind::InvalidConfig, "sample limit must be non-zero");
///
/// let error = trestle_error!(
///     ErrorKind::SchemaMismatch,
///     "column counts disagree",
///     format!("source has {} columns, target has {}", 3, 2)
/// );
/// ```
#[macro_export]
macro_rules! trestle_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::TrestleError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::TrestleError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates and returns a [`crate::error::TrestleError`] from the current
/// function.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::trestle_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::trestle_error!($kind, $desc, $detail))
    };
}
