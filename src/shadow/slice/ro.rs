use super::macros::impl_read_primitives;

/// Read-only view over a record payload.
pub struct ROSlice<'a>(&'a [u8]);

impl<'a> ROSlice<'a> {
    /// Creates a new read-only slice wrapper.
    #[inline]
    pub fn new(slice: &'a [u8]) -> Self {
        Self(slice)
    }

    impl_read_primitives!(u16, f32);
}
