//! Fixed-width key and value encoding for tree pages.

use crate::common::{PageId, RecordId};

/// A type that can be stored in a tree page.
///
/// Every value occupies exactly `ENCODED_LEN` bytes, which keeps node
/// entries at a fixed stride and lets slot lookups stay O(1). Encodings are
/// little-endian.
///
/// The ordering used by the tree is the type's `Ord`, not the byte order of
/// the encoding, so signed integers need no special treatment.
pub trait Storable: Sized {
    const ENCODED_LEN: usize;

    /// Write `self` into `buf[..ENCODED_LEN]`.
    fn encode(&self, buf: &mut [u8]);

    /// Read a value back from `buf[..ENCODED_LEN]`.
    fn decode(buf: &[u8]) -> Self;
}

macro_rules! impl_storable_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Storable for $ty {
                const ENCODED_LEN: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn encode(&self, buf: &mut [u8]) {
                    buf[..Self::ENCODED_LEN].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode(buf: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&buf[..Self::ENCODED_LEN]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_storable_int!(u32, u64, i32, i64);

impl Storable for PageId {
    const ENCODED_LEN: usize = 4;

    #[inline]
    fn encode(&self, buf: &mut [u8]) {
        self.0.encode(buf);
    }

    #[inline]
    fn decode(buf: &[u8]) -> Self {
        PageId(u32::decode(buf))
    }
}

impl Storable for RecordId {
    const ENCODED_LEN: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        self.page_id.encode(&mut buf[..4]);
        self.slot.encode(&mut buf[4..8]);
    }

    fn decode(buf: &[u8]) -> Self {
        RecordId {
            page_id: PageId::decode(&buf[..4]),
            slot: u32::decode(&buf[4..8]),
        }
    }
}
