//! Implements the standard arithmetic traits for single-field tuple newtypes.
//!
//! `op!(binary Money, Add, add)` expands to an `impl Add for Money` that forwards to the inner type, and similarly
//! for `inplace` (e.g. `SubAssign`) and `unary` (e.g. `Neg`) operators.

#[macro_export]
macro_rules! op {
    (binary $type:ident, $trait:ident, $fn:ident) => {
        impl std::ops::$trait for $type {
            type Output = Self;

            fn $fn(self, rhs: Self) -> Self::Output {
                Self(std::ops::$trait::$fn(self.0, rhs.0))
            }
        }
    };
    (inplace $type:ident, $trait:ident, $fn:ident) => {
        impl std::ops::$trait for $type {
            fn $fn(&mut self, rhs: Self) {
                std::ops::$trait::$fn(&mut self.0, rhs.0)
            }
        }
    };
    (unary $type:ident, $trait:ident, $fn:ident) => {
        impl std::ops::$trait for $type {
            type Output = Self;

            fn $fn(self) -> Self::Output {
                Self(std::ops::$trait::$fn(self.0))
            }
        }
    };
}
