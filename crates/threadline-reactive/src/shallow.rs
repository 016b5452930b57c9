use std::sync::Arc;

/// Shallow equality: same fields, with `Arc` fields compared by pointer and
/// scalar fields by value.
///
/// This stands in for fine-grained dependency tracking. A derived value is
/// "unchanged" when every field still points at the same allocation, which
/// is cheap to check and never looks inside shared data.
pub trait ShallowEq {
    fn shallow_eq(&self, other: &Self) -> bool;
}

impl<T: ShallowEq + ?Sized> ShallowEq for Arc<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other) || (**self).shallow_eq(&**other)
    }
}

impl<T: ShallowEq> ShallowEq for Option<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.shallow_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

macro_rules! shallow_by_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ShallowEq for $ty {
                fn shallow_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

shallow_by_value!(bool, u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, char, String, &'static str);
