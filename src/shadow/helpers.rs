//! Address range arithmetic shared by the mirror and the registry.

use crate::shadow::ShadowError;

/// Calculates the byte offset range for an address and length.
///
/// Returns `(start_offset, end_offset)` where end is exclusive,
/// or an error if the range does not fit into `size` bytes.
///
/// # Errors
/// * [`ShadowError::ZeroLength`] - if `len` is 0
/// * [`ShadowError::OutOfBounds`] - if the range exceeds `size`
///
/// # Example
/// ```
/// use eeprom_shadow::shadow::helpers::range_span;
///
/// assert_eq!(range_span(8, 4, 16), Ok((8, 12)));
/// assert!(range_span(14, 4, 16).is_err());
/// ```
pub fn range_span(addr: u32, len: usize, size: usize) -> Result<(usize, usize), ShadowError> {
    if len == 0 {
        return Err(ShadowError::ZeroLength);
    }

    let offset = addr as usize;
    let end = offset.checked_add(len).ok_or(ShadowError::OutOfBounds)?;

    if end > size {
        return Err(ShadowError::OutOfBounds);
    }

    Ok((offset, end))
}

#[test]
fn range_span_edge_cases() {
    // Zero length
    assert_eq!(range_span(0, 0, 16), Err(ShadowError::ZeroLength));

    // Out of bounds
    assert_eq!(range_span(15, 2, 16), Err(ShadowError::OutOfBounds));
    assert_eq!(range_span(u32::MAX, usize::MAX, 16), Err(ShadowError::OutOfBounds));

    // Last byte of the space
    assert_eq!(range_span(15, 1, 16), Ok((15, 16)));

    // Whole space
    assert_eq!(range_span(0, 16, 16), Ok((0, 16)));
}
