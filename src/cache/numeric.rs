//! Numeric Mutation Module
//!
//! Increment/decrement over the supported numeric representations. A store
//! may hold a primitive directly (`Store<u32>`) or a [`Number`] when one
//! cache mixes counters of different kinds; the stored representation is
//! resolved at call time.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::cache::Store;
use crate::error::{CacheError, Result};

// == Number ==
/// A numeric value of one of the supported representations.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Number {
    Isize(isize),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Usize(usize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

/// Mutable view of a stored numeric value.
#[doc(hidden)]
pub enum NumberMut<'a> {
    Isize(&'a mut isize),
    I8(&'a mut i8),
    I16(&'a mut i16),
    I32(&'a mut i32),
    I64(&'a mut i64),
    Usize(&'a mut usize),
    U8(&'a mut u8),
    U16(&'a mut u16),
    U32(&'a mut u32),
    U64(&'a mut u64),
    F32(&'a mut f32),
    F64(&'a mut f64),
}

impl Number {
    fn as_number_mut(&mut self) -> NumberMut<'_> {
        match self {
            Number::Isize(v) => NumberMut::Isize(v),
            Number::I8(v) => NumberMut::I8(v),
            Number::I16(v) => NumberMut::I16(v),
            Number::I32(v) => NumberMut::I32(v),
            Number::I64(v) => NumberMut::I64(v),
            Number::Usize(v) => NumberMut::Usize(v),
            Number::U8(v) => NumberMut::U8(v),
            Number::U16(v) => NumberMut::U16(v),
            Number::U32(v) => NumberMut::U32(v),
            Number::U64(v) => NumberMut::U64(v),
            Number::F32(v) => NumberMut::F32(v),
            Number::F64(v) => NumberMut::F64(v),
        }
    }
}

/// Resolves the numeric representation of a stored value, if it has one.
fn numeric_mut<T: Any>(value: &mut T) -> Option<NumberMut<'_>> {
    let value = value as &mut dyn Any;
    if value.is::<Number>() {
        return value.downcast_mut::<Number>().map(Number::as_number_mut);
    }

    macro_rules! try_primitive {
        ($($ty:ty => $variant:ident),* $(,)?) => {
            $(
                if value.is::<$ty>() {
                    return value.downcast_mut::<$ty>().map(NumberMut::$variant);
                }
            )*
        };
    }

    try_primitive! {
        isize => Isize, i8 => I8, i16 => I16, i32 => I32, i64 => I64,
        usize => Usize, u8 => U8, u16 => U16, u32 => U32, u64 => U64,
        f32 => F32, f64 => F64,
    }
    None
}

mod sealed {
    pub trait Sealed {}
}

// == Primitive ==
/// A numeric representation that typed increments can target.
///
/// Integer arithmetic wraps on overflow.
pub trait Primitive: sealed::Sealed + Copy + Any {
    /// Type name reported in [`CacheError::TypeMismatch`]
    const NAME: &'static str;

    #[doc(hidden)]
    fn select(slot: NumberMut<'_>) -> Option<&mut Self>;

    fn add_delta(self, delta: Self) -> Self;

    fn sub_delta(self, delta: Self) -> Self;
}

macro_rules! impl_primitive {
    (int: $($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl_primitive!(@select $ty => $variant);
            impl Primitive for $ty {
                const NAME: &'static str = stringify!($ty);

                fn select(slot: NumberMut<'_>) -> Option<&mut Self> {
                    match slot {
                        NumberMut::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn add_delta(self, delta: Self) -> Self {
                    self.wrapping_add(delta)
                }

                fn sub_delta(self, delta: Self) -> Self {
                    self.wrapping_sub(delta)
                }
            }
        )*
    };
    (float: $($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl_primitive!(@select $ty => $variant);
            impl Primitive for $ty {
                const NAME: &'static str = stringify!($ty);

                fn select(slot: NumberMut<'_>) -> Option<&mut Self> {
                    match slot {
                        NumberMut::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn add_delta(self, delta: Self) -> Self {
                    self + delta
                }

                fn sub_delta(self, delta: Self) -> Self {
                    self - delta
                }
            }
        )*
    };
    (@select $ty:ident => $variant:ident) => {
        impl sealed::Sealed for $ty {}

        impl From<$ty> for Number {
            fn from(value: $ty) -> Self {
                Number::$variant(value)
            }
        }
    };
}

impl_primitive!(int:
    isize => Isize, i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    usize => Usize, u8 => U8, u16 => U16, u32 => U32, u64 => U64,
);
impl_primitive!(float: f32 => F32, f64 => F64);

const ANY_NUMBER: &str = "an integer or float";
const ANY_FLOAT: &str = "f32 or f64";

/// Adds a wide delta to any representation. The `as` casts truncate to the
/// stored width, so an out-of-range delta wraps like the arithmetic does.
fn add_wide(slot: NumberMut<'_>, delta: i64) {
    match slot {
        NumberMut::Isize(v) => *v = v.wrapping_add(delta as isize),
        NumberMut::I8(v) => *v = v.wrapping_add(delta as i8),
        NumberMut::I16(v) => *v = v.wrapping_add(delta as i16),
        NumberMut::I32(v) => *v = v.wrapping_add(delta as i32),
        NumberMut::I64(v) => *v = v.wrapping_add(delta),
        NumberMut::Usize(v) => *v = v.wrapping_add(delta as usize),
        NumberMut::U8(v) => *v = v.wrapping_add(delta as u8),
        NumberMut::U16(v) => *v = v.wrapping_add(delta as u16),
        NumberMut::U32(v) => *v = v.wrapping_add(delta as u32),
        NumberMut::U64(v) => *v = v.wrapping_add(delta as u64),
        NumberMut::F32(v) => *v += delta as f32,
        NumberMut::F64(v) => *v += delta as f64,
    }
}

/// Subtracts directly; negating the delta is not representable for unsigned kinds.
fn sub_wide(slot: NumberMut<'_>, delta: i64) {
    match slot {
        NumberMut::Isize(v) => *v = v.wrapping_sub(delta as isize),
        NumberMut::I8(v) => *v = v.wrapping_sub(delta as i8),
        NumberMut::I16(v) => *v = v.wrapping_sub(delta as i16),
        NumberMut::I32(v) => *v = v.wrapping_sub(delta as i32),
        NumberMut::I64(v) => *v = v.wrapping_sub(delta),
        NumberMut::Usize(v) => *v = v.wrapping_sub(delta as usize),
        NumberMut::U8(v) => *v = v.wrapping_sub(delta as u8),
        NumberMut::U16(v) => *v = v.wrapping_sub(delta as u16),
        NumberMut::U32(v) => *v = v.wrapping_sub(delta as u32),
        NumberMut::U64(v) => *v = v.wrapping_sub(delta as u64),
        NumberMut::F32(v) => *v -= delta as f32,
        NumberMut::F64(v) => *v -= delta as f64,
    }
}

fn float_mut<'a>(slot: NumberMut<'a>, key: &str) -> Result<FloatMut<'a>> {
    match slot {
        NumberMut::F32(v) => Ok(FloatMut::F32(v)),
        NumberMut::F64(v) => Ok(FloatMut::F64(v)),
        _ => Err(mismatch(key, ANY_FLOAT)),
    }
}

enum FloatMut<'a> {
    F32(&'a mut f32),
    F64(&'a mut f64),
}

fn mismatch(key: &str, expected: &'static str) -> CacheError {
    CacheError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

/// Generates the named typed increment/decrement wrappers.
macro_rules! typed_ops {
    ($($ty:ident: $inc:ident, $dec:ident;)*) => {
        $(
            #[doc = concat!("Adds `delta` to a stored `", stringify!($ty), "` and returns the new value.")]
            pub fn $inc(&self, key: &str, delta: $ty) -> Result<$ty> {
                self.increment_by(key, delta)
            }

            #[doc = concat!("Subtracts `delta` from a stored `", stringify!($ty), "` and returns the new value.")]
            pub fn $dec(&self, key: &str, delta: $ty) -> Result<$ty> {
                self.decrement_by(key, delta)
            }
        )*
    };
}

impl<T: Any> Store<T> {
    // == Generic Increment ==
    /// Adds `delta` to a stored number of any supported representation.
    ///
    /// The delta is narrowed to the stored width without overflow checks.
    /// Use a typed method such as [`Store::increment_i64`] to get the new value.
    ///
    /// # Errors
    /// - `NotFound` if the key is absent or expired
    /// - `TypeMismatch` if the stored value is not numeric
    pub fn increment(&self, key: &str, delta: i64) -> Result<()> {
        self.with_live_entry(key, |entry| {
            let slot = numeric_mut(&mut entry.value).ok_or_else(|| mismatch(key, ANY_NUMBER))?;
            add_wide(slot, delta);
            Ok(())
        })
    }

    /// Subtracts `delta` from a stored number of any supported representation.
    pub fn decrement(&self, key: &str, delta: i64) -> Result<()> {
        self.with_live_entry(key, |entry| {
            let slot = numeric_mut(&mut entry.value).ok_or_else(|| mismatch(key, ANY_NUMBER))?;
            sub_wide(slot, delta);
            Ok(())
        })
    }

    /// Adds `delta` to a stored `f32` or `f64`.
    pub fn increment_float(&self, key: &str, delta: f64) -> Result<()> {
        self.with_live_entry(key, |entry| {
            let slot = numeric_mut(&mut entry.value).ok_or_else(|| mismatch(key, ANY_FLOAT))?;
            match float_mut(slot, key)? {
                FloatMut::F32(v) => *v += delta as f32,
                FloatMut::F64(v) => *v += delta,
            }
            Ok(())
        })
    }

    /// Subtracts `delta` from a stored `f32` or `f64`.
    pub fn decrement_float(&self, key: &str, delta: f64) -> Result<()> {
        self.with_live_entry(key, |entry| {
            let slot = numeric_mut(&mut entry.value).ok_or_else(|| mismatch(key, ANY_FLOAT))?;
            match float_mut(slot, key)? {
                FloatMut::F32(v) => *v -= delta as f32,
                FloatMut::F64(v) => *v -= delta,
            }
            Ok(())
        })
    }

    // == Typed Increment ==
    /// Adds `delta` to a stored value of exactly type `N` and returns the new value.
    pub fn increment_by<N: Primitive>(&self, key: &str, delta: N) -> Result<N> {
        self.update_primitive(key, |current: N| current.add_delta(delta))
    }

    /// Subtracts `delta` from a stored value of exactly type `N` and returns the new value.
    pub fn decrement_by<N: Primitive>(&self, key: &str, delta: N) -> Result<N> {
        self.update_primitive(key, |current: N| current.sub_delta(delta))
    }

    fn update_primitive<N, F>(&self, key: &str, f: F) -> Result<N>
    where
        N: Primitive,
        F: FnOnce(N) -> N,
    {
        self.with_live_entry(key, |entry| {
            let slot = numeric_mut(&mut entry.value)
                .and_then(N::select)
                .ok_or_else(|| mismatch(key, N::NAME))?;
            *slot = f(*slot);
            Ok(*slot)
        })
    }

    typed_ops! {
        isize: increment_isize, decrement_isize;
        i8: increment_i8, decrement_i8;
        i16: increment_i16, decrement_i16;
        i32: increment_i32, decrement_i32;
        i64: increment_i64, decrement_i64;
        usize: increment_usize, decrement_usize;
        u8: increment_u8, decrement_u8;
        u16: increment_u16, decrement_u16;
        u32: increment_u32, decrement_u32;
        u64: increment_u64, decrement_u64;
        f32: increment_f32, decrement_f32;
        f64: increment_f64, decrement_f64;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Expiration;
    use std::thread::sleep;
    use std::time::Duration;

    fn store_with<T>(key: &str, value: T) -> Store<T> {
        let store = Store::new(Duration::ZERO);
        store.set(key, value, Expiration::Never);
        store
    }

    #[test]
    fn test_increment_preserves_expiration() {
        let store = Store::new(Duration::ZERO);
        store.set("x", 10i64, Duration::from_secs(60).into());
        let (_, before) = store.get_with_expiration("x").unwrap();

        store.increment("x", 5).unwrap();

        let (value, after) = store.get_with_expiration("x").unwrap();
        assert_eq!(value, 15);
        assert_eq!(before, after);
    }

    #[test]
    fn test_generic_increment_every_primitive() {
        macro_rules! check {
            ($($ty:ty),*) => {
                $(
                    let store = store_with("n", 10 as $ty);
                    store.increment("n", 5).unwrap();
                    assert_eq!(store.get("n"), Some(15 as $ty));
                    store.decrement("n", 3).unwrap();
                    assert_eq!(store.get("n"), Some(12 as $ty));
                )*
            };
        }
        check!(isize, i8, i16, i32, i64, usize, u8, u16, u32, u64, f32, f64);
    }

    #[test]
    fn test_generic_increment_on_number_variant() {
        let store = store_with("n", Number::U16(7));

        store.increment("n", 3).unwrap();
        assert_eq!(store.get("n"), Some(Number::U16(10)));

        store.decrement("n", 4).unwrap();
        assert_eq!(store.get("n"), Some(Number::U16(6)));
    }

    #[test]
    fn test_generic_unsigned_decrement_wraps() {
        let store = store_with("n", 1u8);
        store.decrement("n", 2).unwrap();
        assert_eq!(store.get("n"), Some(u8::MAX));
    }

    #[test]
    fn test_generic_delta_is_narrowed() {
        // 257 truncates to 1 in a u8
        let store = store_with("n", 1u8);
        store.increment("n", 257).unwrap();
        assert_eq!(store.get("n"), Some(2u8));
    }

    #[test]
    fn test_increment_non_numeric_is_mismatch() {
        let store = store_with("s", "text".to_string());

        let result = store.increment("s", 1);

        assert!(matches!(result, Err(CacheError::TypeMismatch { ref key, .. }) if key == "s"));
        assert_eq!(store.get("s").as_deref(), Some("text"));
    }

    #[test]
    fn test_increment_missing_or_expired_is_not_found() {
        let store: Store<i64> = Store::new(Duration::ZERO);
        assert!(matches!(store.increment("x", 1), Err(CacheError::NotFound(_))));

        store.set("x", 1, Duration::from_millis(20).into());
        sleep(Duration::from_millis(40));

        assert!(matches!(store.increment_i64("x", 1), Err(CacheError::NotFound(_))));
        assert!(matches!(store.decrement("x", 1), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_increment_float() {
        let store = store_with("f", 1.5f32);
        store.increment_float("f", 1.0).unwrap();
        store.decrement_float("f", 0.25).unwrap();
        assert_eq!(store.get("f"), Some(2.25f32));

        let store = store_with("f", Number::F64(0.5));
        store.increment_float("f", 2.0).unwrap();
        assert_eq!(store.get("f"), Some(Number::F64(2.5)));
    }

    #[test]
    fn test_increment_float_on_integer_is_mismatch() {
        let store = store_with("n", 3i32);
        let result = store.increment_float("n", 1.0);
        assert!(matches!(
            result,
            Err(CacheError::TypeMismatch { expected: "f32 or f64", .. })
        ));
        assert_eq!(store.get("n"), Some(3));
    }

    #[test]
    fn test_typed_increment_returns_new_value() {
        let store = store_with("n", 40i32);
        assert_eq!(store.increment_i32("n", 2).unwrap(), 42);
        assert_eq!(store.decrement_i32("n", 50).unwrap(), -8);
    }

    #[test]
    fn test_typed_unsigned_decrement_subtracts_directly() {
        let store = store_with("n", 5u64);
        assert_eq!(store.decrement_u64("n", 2).unwrap(), 3);
        assert_eq!(store.decrement_u64("n", 4).unwrap(), u64::MAX);
    }

    #[test]
    fn test_typed_increment_wraps() {
        let store = store_with("n", i8::MAX);
        assert_eq!(store.increment_i8("n", 1).unwrap(), i8::MIN);
    }

    #[test]
    fn test_typed_mismatch_names_expected_type() {
        let store = store_with("n", 1.0f64);

        let result = store.increment_i32("n", 1);

        assert!(matches!(result, Err(CacheError::TypeMismatch { expected: "i32", .. })));
        assert_eq!(store.get("n"), Some(1.0));
    }

    #[test]
    fn test_typed_ops_on_mixed_numbers() {
        let store = Store::new(Duration::ZERO);
        store.set("hits", Number::U32(9), Expiration::Never);
        store.set("ratio", Number::F64(0.5), Expiration::Never);

        assert_eq!(store.increment_u32("hits", 1).unwrap(), 10);
        assert_eq!(store.increment_f64("ratio", 0.25).unwrap(), 0.75);
        assert!(matches!(
            store.increment_u64("hits", 1),
            Err(CacheError::TypeMismatch { expected: "u64", .. })
        ));
    }

    #[test]
    fn test_every_typed_wrapper() {
        let store = store_with("n", Number::Isize(0));
        assert_eq!(store.increment_isize("n", 2).unwrap(), 2);
        assert_eq!(store.decrement_isize("n", 3).unwrap(), -1);

        macro_rules! check {
            ($($variant:ident($ty:ty): $inc:ident, $dec:ident;)*) => {
                $(
                    let store = store_with("n", Number::$variant(10 as $ty));
                    assert_eq!(store.$inc("n", 4 as $ty).unwrap(), 14 as $ty);
                    assert_eq!(store.$dec("n", 6 as $ty).unwrap(), 8 as $ty);
                )*
            };
        }
        check! {
            I8(i8): increment_i8, decrement_i8;
            I16(i16): increment_i16, decrement_i16;
            I64(i64): increment_i64, decrement_i64;
            Usize(usize): increment_usize, decrement_usize;
            U8(u8): increment_u8, decrement_u8;
            U16(u16): increment_u16, decrement_u16;
            F32(f32): increment_f32, decrement_f32;
        }
    }

    #[test]
    fn test_number_from_primitive() {
        assert_eq!(Number::from(3u8), Number::U8(3));
        assert_eq!(Number::from(-1i64), Number::I64(-1));
        assert_eq!(Number::from(0.5f32), Number::F32(0.5));
    }
}
