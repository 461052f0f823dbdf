use thiserror::Error;

use super::bitset::BitSetError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("BitSet error: {0}")]
    BitSet(#[source] BitSetError),

    #[error("Protocol mismatch")]
    ProtocolMismatch,

    #[error("Not contains")]
    NotContains,

    #[error("No releasable address")]
    NoReleasableAddress,

    #[error("CIDR too large: {0}")]
    CIDRTooLarge(u8),

    #[error("Full")]
    Full,

    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("Allocator unavailable: {0}")]
    Unavailable(String),

    #[error("failed to get lock")]
    FailedToGetLock,
}
