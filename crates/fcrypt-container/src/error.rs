use thiserror::Error;

pub type ContainerResult<T> = Result<T, ContainerError>;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("invalid container header")]
    InvalidHeader,

    #[error("unsupported container version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("unsupported payload encryption algorithm {0}")]
    UnsupportedPayloadAlgorithm(u16),

    #[error("unsupported slot key algorithm {0}")]
    UnsupportedSlotAlgorithm(u16),

    #[error("container has no usable key slots")]
    EmptySlotContent,

    #[error("container has more than 255 key slots")]
    TooManySlots,

    #[error("wrapped slot content exceeds 65535 bytes")]
    SlotContentTooLarge,

    #[error("serialised header exceeds its 4096-byte region")]
    HeaderTooLarge,

    #[error("the root key is currently sealed")]
    RootKeySealed,

    #[error("the root key is already unsealed")]
    RootKeyAlreadyUnsealed,

    #[error("the root key could not be unsealed with the given key")]
    RootKeyUnsealFailed,

    #[error("a slot for this algorithm and key already exists")]
    SlotDuplicated,

    #[error("slot cannot be removed: it is the last one or the index does not match a live slot")]
    InvalidRemove,

    #[error("no key slots are configured")]
    NoSlots,

    #[error(transparent)]
    Crypto(#[from] fcrypt_crypto::CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
