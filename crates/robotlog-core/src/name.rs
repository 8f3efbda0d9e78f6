//! Robot name validation for the write path.

/// Reasons a robot name is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// The name is empty.
    #[error("robot name must not be empty")]
    Empty,
}

/// Check that `name` can identify a robot.
///
/// Names are otherwise opaque: no trimming, no case folding.
pub const fn validate_robot_name(name: &str) -> Result<&str, NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    Ok(name)
}
