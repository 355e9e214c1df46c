pub mod ioctl;
#[cfg(test)]
pub mod mock;
mod syscall;

pub use syscall::{Sys, Syscall};

/// Fixed-width little-endian scalar as it appears in kbase ioctl arguments
/// and in the memory shared with the driver.
pub trait Le: Copy {
    const SIZE: usize;

    fn read(buf: &[u8]) -> Self;
    fn write(self, buf: &mut [u8]);
}

macro_rules! le {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Le for $ty {
                const SIZE: usize = size_of::<$ty>();

                fn read(buf: &[u8]) -> Self {
                    let mut bytes = [0; size_of::<$ty>()];
                    bytes.copy_from_slice(&buf[..size_of::<$ty>()]);
                    <$ty>::from_le_bytes(bytes)
                }

                fn write(self, buf: &mut [u8]) {
                    buf[..size_of::<$ty>()].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}
le!(u8, u16, u32, u64, i32);

// Reads the value at the cursor, then offsets the cursor by the size of the value.
#[inline]
pub fn get<T: Le>(buf: &[u8], cursor: &mut usize) -> T {
    let val = T::read(&buf[*cursor..]);
    *cursor += T::SIZE;
    val
}

#[inline]
pub fn get_at<T: Le>(buf: &[u8], offset: usize) -> T {
    T::read(&buf[offset..])
}

// Writes the value at the cursor, then offsets the cursor by the size of the value.
#[inline]
pub fn put<T: Le>(buf: &mut [u8], cursor: &mut usize, val: T) {
    val.write(&mut buf[*cursor..]);
    *cursor += T::SIZE;
}

/// A kernel ABI structure with an explicit byte layout.
///
/// Layouts are packed and little-endian, `encode` and `decode` always see a
/// buffer of exactly `SIZE` bytes.
pub trait Wire: Sized {
    const SIZE: usize;

    fn encode(&self, buf: &mut [u8]);
    fn decode(buf: &[u8]) -> Self;
}
