use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("AES key size is invalid, must be 16, 24, or 32 bytes")]
    KeySizeInvalid,

    #[error("IV is missing or invalid for this operation")]
    IvMissingOrInvalid,

    #[error("AEAD open failed, wrong key or corrupted data")]
    AeadInvalid,

    #[error("authentication failed, HMAC tag does not match")]
    AuthenticationFailed,

    #[error("authentication key must differ from the encryption key")]
    AuthenticationKeyReused,

    #[error("invalid length specified for the operation")]
    InvalidLength,

    #[error("system RNG failure: {0}")]
    Rng(#[from] rand::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
