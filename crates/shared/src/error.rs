use thiserror::Error;

/// Input rejected before anything is submitted to the signer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("ingredient `{field}` value {value} exceeds the maximum of {max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },
}
