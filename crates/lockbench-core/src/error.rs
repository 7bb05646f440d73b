use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Generation errors
    #[error("PIN length must be between {min} and {max}, got {length}")]
    InvalidLength {
        length: usize,
        min: usize,
        max: usize,
    },

    #[error("Could not generate a valid PIN of length {length} after {attempts} attempts")]
    GenerationExhausted { length: usize, attempts: usize },

    #[error("Invalid type '{0}'. Choose from 'repeating' or 'sequential'")]
    UnknownKind(String),

    // DUT state errors
    #[error("Invalid PIN digit: {0:?}")]
    InvalidDigit(char),
}

pub type Result<T> = std::result::Result<T, Error>;
