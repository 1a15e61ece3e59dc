// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![no_std]

//! Provides the [`open_enum`] macro.

/// Declares an enum-like type for protocol fields whose on-the-wire values
/// are not guaranteed to stay within the declared set.
///
/// Matching a Rust `enum` against a value a device invented after the
/// standard was written is undefined behavior when the value arrives via a
/// byte-level cast. This macro instead declares a `#[repr(transparent)]`
/// newtype over the storage integer with one associated constant per
/// variant, so unknown values round-trip untouched and can still be
/// compared, hashed, and printed.
///
/// Implements `Copy`, `Clone`, `Debug`, `Eq`, `PartialEq`, `Hash`, `Ord`,
/// and `PartialOrd`. `Debug` prints the variant name when the value is a
/// known one and the raw integer otherwise.
///
/// # Example
///
/// ```
/// # #[macro_use] extern crate open_enum; fn main() {
/// use open_enum::open_enum;
/// open_enum! {
///     pub enum LogAddress: u8 {
///         DIRECTORY = 0x00,
///         SELF_TEST = 0x07,
///     }
/// }
///
/// assert_eq!(LogAddress::SELF_TEST.0, 0x07);
/// let vendor = LogAddress(0xA6); // not declared, still representable
/// assert_ne!(vendor, LogAddress::DIRECTORY);
/// # }
/// ```
#[macro_export]
macro_rules! open_enum {
    (
        $(#[$a:meta])*
        $v:vis enum $name:ident : $storage:ty {
            $(#![$implattr:meta])*
            $(
                $(#[$vattr:meta])*
                $variant:ident = $value:expr,
            )*
        }
    ) => {
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        #[repr(transparent)]
        $(#[$a])*
        $v struct $name(pub $storage);
        $(#[$implattr])*
        impl $name {
            $(
                $(#[$vattr])*
                pub const $variant: $name = $name($value);
            )*
        }
        impl ::core::fmt::Debug for $name {
            fn fmt(&self, fmt: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                #![allow(unreachable_patterns)]
                let s = match *self {
                    $( Self::$variant => stringify!($variant), )*
                    _ => {
                        return ::core::fmt::Debug::fmt(&self.0, fmt);
                    }
                };
                fmt.pad(s)
            }
        }
    }
}
