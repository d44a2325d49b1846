/// Errors that can occur during shadow storage operations.
///
/// A failed checksum is not an error: record reads report it as `false`
/// and leave recovery to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShadowError {
    /// Address or length exceeds the address space.
    #[error("address or length exceeds address space bounds")]
    OutOfBounds,
    /// Operation attempted with zero length.
    #[error("operation attempted with zero length")]
    ZeroLength,
    /// Buffer length differs from the record's payload length.
    #[error("buffer length does not match record length")]
    LengthMismatch,
    /// Startup line or coordinate slot index outside the layout.
    #[error("record index outside the storage layout")]
    InvalidRecord,
    /// The mirror buffer could not be allocated.
    #[error("mirror buffer could not be allocated")]
    Unavailable,
    /// The shadow is already installed on this backend.
    #[error("shadow storage is already installed")]
    AlreadyShadowed,
    /// Text does not fit into a stored line.
    #[error("line exceeds stored line capacity")]
    LineTooLong,
}
