/// Generates little-endian read methods for the given primitive types.
macro_rules! impl_read_primitives {
    ($($type:ty),* $(,)?) => {
        /// Reads a `u8` at the given offset.
        ///
        /// # Panics
        /// Panics if `offset` is past the end of the slice.
        #[inline]
        pub fn read_u8_at(&self, offset: usize) -> u8 {
            self.0[offset]
        }

        $(
            paste::paste! {
                #[doc = concat!("Reads a little-endian `", stringify!($type), "` at the given offset.")]
                ///
                /// # Panics
                /// Panics if the value does not fit at `offset`.
                #[inline]
                pub fn [<read_ $type _le_at>](&self, offset: usize) -> $type {
                    const SIZE: usize = core::mem::size_of::<$type>();
                    let mut bytes = [0u8; SIZE];
                    bytes.copy_from_slice(&self.0[offset..offset + SIZE]);
                    <$type>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

/// Generates little-endian write methods for the given primitive types.
macro_rules! impl_write_primitives {
    ($($type:ty),* $(,)?) => {
        /// Writes a `u8` at the given offset.
        ///
        /// # Panics
        /// Panics if `offset` is past the end of the slice.
        #[inline]
        pub fn write_u8_at(&mut self, offset: usize, value: u8) {
            self.0[offset] = value;
        }

        $(
            paste::paste! {
                #[doc = concat!("Writes a little-endian `", stringify!($type), "` at the given offset.")]
                ///
                /// # Panics
                /// Panics if the value does not fit at `offset`.
                #[inline]
                pub fn [<write_ $type _le_at>](&mut self, offset: usize, value: $type) {
                    const SIZE: usize = core::mem::size_of::<$type>();
                    self.0[offset..offset + SIZE].copy_from_slice(&value.to_le_bytes());
                }
            }
        )*
    };
}

pub(crate) use impl_read_primitives;
pub(crate) use impl_write_primitives;
