//! Marker traits for types that can be stored in a tensor.

use std::{
    fmt,
    ops::{Add, Div, Mul, Sub},
};

/// Tensor elements.
pub trait Elem: 'static + Clone + fmt::Debug {}

impl Elem for bool {}
impl Elem for f32 {}
impl Elem for f64 {}
impl Elem for i32 {}

/// Numeric tensor elements.
pub trait Num:
    Elem
    + PartialEq
    + PartialOrd
    + num::Zero
    + num::One
    + Add<Self, Output = Self>
    + Sub<Self, Output = Self>
    + Mul<Self, Output = Self>
    + Div<Self, Output = Self>
{
}

impl Num for f32 {}
impl Num for f64 {}
impl Num for i32 {}

/// Floating-point tensor elements.
pub trait Float: Num + num::Float {}

impl Float for f32 {}
impl Float for f64 {}
