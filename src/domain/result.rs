//! Result type alias for Sowtrack

use super::errors::SowtrackError;

/// Result type alias for Sowtrack operations
///
/// # Examples
///
/// ```
/// use sowtrack::domain::result::Result;
/// use sowtrack::domain::errors::SowtrackError;
///
/// fn failing_function() -> Result<()> {
///     Err(SowtrackError::Validation("limit must be positive".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, SowtrackError>;
