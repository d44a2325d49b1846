use super::macros::impl_write_primitives;

/// Write-only view over a record payload being encoded.
pub struct WOSlice<'a>(&'a mut [u8]);

impl<'a> WOSlice<'a> {
    /// Creates a new write-only slice wrapper.
    #[inline]
    pub fn new(slice: &'a mut [u8]) -> Self {
        Self(slice)
    }

    impl_write_primitives!(u16, f32);
}
