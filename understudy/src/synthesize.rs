// vim: tw=80
//! Default results for calls that match no expectation.

use cfg_if::cfg_if;

/// Types for which the engine can synthesize a result when an invocation
/// matches no expectation: numeric types yield zero, `bool` yields `false`,
/// `Option` yields `None`, `String` yields the empty string, and user value
/// types yield their default-constructed instance.
///
/// On stable compilers this is exactly the set of `Default` types, enforced
/// at compile time.  With the **nightly** feature the trait is specialized
/// over all types, and a call that needs a default for a non-`Default` type
/// panics instead: a return type with no usable default is a configuration
/// error, not a silent fallback.
pub trait Synthesize {
    fn synthesize() -> Self;
}

cfg_if! {
    if #[cfg(feature = "nightly")] {
        impl<T> Synthesize for T {
            default fn synthesize() -> T {
                panic!("{} cannot be synthesized; it has no default value",
                       std::any::type_name::<T>());
            }
        }

        impl<T: Default> Synthesize for T {
            fn synthesize() -> T {
                T::default()
            }
        }
    } else {
        impl<T: Default> Synthesize for T {
            fn synthesize() -> T {
                T::default()
            }
        }
    }
}

#[cfg(test)]
mod t {
    use super::*;

    #[test]
    fn zero_false_empty_none() {
        assert_eq!(0i32, i32::synthesize());
        assert_eq!(0u64, u64::synthesize());
        assert!(!bool::synthesize());
        assert_eq!(String::new(), String::synthesize());
        assert_eq!(None, Option::<u32>::synthesize());
    }

    #[test]
    fn default_constructed_value_type() {
        #[derive(Debug, PartialEq)]
        struct Boat {
            speed: i32,
        }
        impl Default for Boat {
            fn default() -> Self {
                Boat { speed: 11 }
            }
        }
        assert_eq!(Boat { speed: 11 }, Boat::synthesize());
    }
}
