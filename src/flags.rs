//! Per-descriptor configuration flag sets.
//!
//! Each device family gets its own newtype so a controller flag can never be
//! handed to an actuator.  `union` is `const` so flag sets can be combined in
//! `static` descriptor tables.

macro_rules! device_flags {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$fmeta:meta])* $flag:ident = $bit:expr ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(u16);

        impl $name {
            pub const EMPTY: Self = Self(0);
            $( $(#[$fmeta])* pub const $flag: Self = Self($bit); )*

            pub const fn bits(self) -> u16 {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// Explicit `LOG` wins, then explicit `NOLOG`, then the default.
            pub const fn is_logged(self, by_default: bool) -> bool {
                if self.contains(Self::LOG) {
                    true
                } else if self.contains(Self::NOLOG) {
                    false
                } else {
                    by_default
                }
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }
    };
}

pub(crate) use device_flags;
