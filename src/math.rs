use std::{fmt::{Debug, Display}, marker::PhantomData, time::Duration};
use serde::{Deserialize, Serialize};
use crate::constants::{KM_PER_GM, SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE};

/// Double precision 3D vector, dimensionless
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DVec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64
}

impl DVec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> DVec3 {
        DVec3 { x, y, z }
    }

    pub const fn zero() -> DVec3 {
        DVec3::new(0.0, 0.0, 0.0)
    }

    fn map(self, f: impl Fn(f64) -> f64) -> DVec3 {
        DVec3::new(f(self.x), f(self.y), f(self.z))
    }

    fn zip(self, rhs: DVec3, f: impl Fn(f64, f64) -> f64) -> DVec3 {
        DVec3::new(f(self.x, rhs.x), f(self.y, rhs.y), f(self.z, rhs.z))
    }

    pub fn dot(&self, rhs: &Self) -> f64 {
        let p = self.zip(*rhs, |a, b| a * b);
        p.x + p.y + p.z
    }

    pub fn magnitude_squared(&self) -> f64 {
        self.dot(self)
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude_squared().sqrt()
    }

    /// Unit vector pointing the same way. The zero vector has no direction and yields NaN components
    pub fn normalize(&self) -> Self {
        *self / self.magnitude()
    }

    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.z].iter().all(|c| c.is_finite())
    }
}

impl From<[f64; 3]> for DVec3 {
    fn from([x, y, z]: [f64; 3]) -> DVec3 {
        DVec3::new(x, y, z)
    }
}

impl std::ops::Index<usize> for DVec3 {
    type Output = f64;
    fn index(&self, axis: usize) -> &f64 {
        match axis {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("axis {} out of range for DVec3", axis)
        }
    }
}

macro_rules! dvec3_ops {
    ($($op:ident::$method:ident, $assign:ident::$assign_method:ident, $sym:tt;)+) => {$(
        impl std::ops::$op for DVec3 {
            type Output = DVec3;
            fn $method(self, rhs: DVec3) -> DVec3 {
                self.zip(rhs, |a, b| a $sym b)
            }
        }

        impl std::ops::$assign for DVec3 {
            fn $assign_method(&mut self, rhs: DVec3) {
                *self = self.zip(rhs, |a, b| a $sym b)
            }
        }
    )+};
}

dvec3_ops! {
    Add::add, AddAssign::add_assign, +;
    Sub::sub, SubAssign::sub_assign, -;
}

impl std::ops::Neg for DVec3 {
    type Output = DVec3;
    fn neg(self) -> DVec3 {
        self.map(|c| -c)
    }
}

impl std::ops::Mul<f64> for DVec3 {
    type Output = DVec3;
    fn mul(self, k: f64) -> DVec3 {
        self.map(|c| c * k)
    }
}

impl std::ops::Mul<DVec3> for f64 {
    type Output = DVec3;
    fn mul(self, v: DVec3) -> DVec3 {
        v * self
    }
}

impl std::ops::Div<f64> for DVec3 {
    type Output = DVec3;
    fn div(self, k: f64) -> DVec3 {
        self.map(|c| c / k)
    }
}

/// Column-major 3x3 matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DMatrix3 {
    c0: DVec3,
    c1: DVec3,
    c2: DVec3,
}

impl DMatrix3 {
    pub const fn from_columns(c0: DVec3, c1: DVec3, c2: DVec3) -> Self {
        DMatrix3 { c0, c1, c2 }
    }

    pub const fn identity() -> Self {
        DMatrix3 {
            c0: DVec3::new(1.0, 0.0, 0.0),
            c1: DVec3::new(0.0, 1.0, 0.0),
            c2: DVec3::new(0.0, 0.0, 1.0),
        }
    }

    /// Counter-clockwise rotation of `angle` radians about the z axis
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        DMatrix3 {
            c0: DVec3::new(c, s, 0.0),
            c1: DVec3::new(-s, c, 0.0),
            c2: DVec3::new(0.0, 0.0, 1.0),
        }
    }

    /// Counter-clockwise rotation of `angle` radians about the x axis
    pub fn rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        DMatrix3 {
            c0: DVec3::new(1.0, 0.0, 0.0),
            c1: DVec3::new(0.0, c, s),
            c2: DVec3::new(0.0, -s, c),
        }
    }

    pub fn row(&self, index: usize) -> DVec3 {
        DVec3::new(self.c0[index], self.c1[index], self.c2[index])
    }

    pub fn transpose(&self) -> Self {
        DMatrix3 { c0: self.row(0), c1: self.row(1), c2: self.row(2) }
    }
}

impl std::ops::Index<usize> for DMatrix3 {
    type Output = DVec3;
    fn index(&self, index: usize) -> &Self::Output {
        match index {
            0 => &self.c0,
            1 => &self.c1,
            2 => &self.c2,
            _ => panic!("DMatrix3::index out of bounds")
        }
    }
}

impl std::ops::Mul<DVec3> for DMatrix3 {
    type Output = DVec3;
    fn mul(self, rhs: DVec3) -> DVec3 {
        self.c0 * rhs.x + self.c1 * rhs.y + self.c2 * rhs.z
    }
}

impl std::ops::Mul for DMatrix3 {
    type Output = DMatrix3;
    fn mul(self, rhs: DMatrix3) -> DMatrix3 {
        DMatrix3 { c0: self * rhs.c0, c1: self * rhs.c1, c2: self * rhs.c2 }
    }
}

/// A scalar tagged with the unit it is expressed in
///
/// The engine works in gigametres, kilometres per second, yottagrams and seconds. Quantities of
/// the same kind add and subtract, scale by plain numbers, and divide into a dimensionless ratio.
/// Mixing kinds goes through the explicit conversions below
pub trait Quantity: Copy + Default + PartialOrd + Debug + Send + Sync + 'static {
    const SYMBOL: &'static str;
    fn new(value: f64) -> Self;
    fn value(self) -> f64;
}

macro_rules! quantity {
    ($(#[$attr:meta])* $name:ident, $symbol:expr) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl Quantity for $name {
            const SYMBOL: &'static str = $symbol;
            fn new(value: f64) -> Self { $name(value) }
            fn value(self) -> f64 { self.0 }
        }

        impl $name {
            pub fn abs(self) -> Self { $name(self.0.abs()) }
            pub fn is_finite(self) -> bool { self.0.is_finite() }
            pub fn min(self, rhs: Self) -> Self { $name(self.0.min(rhs.0)) }
            pub fn max(self, rhs: Self) -> Self { $name(self.0.max(rhs.0)) }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                Display::fmt(&self.0, f)?;
                write!(f, " {}", $symbol)
            }
        }

        impl std::ops::Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self { $name(self.0 + rhs.0) }
        }

        impl std::ops::AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) { self.0 += rhs.0 }
        }

        impl std::ops::Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self { $name(self.0 - rhs.0) }
        }

        impl std::ops::SubAssign for $name {
            fn sub_assign(&mut self, rhs: Self) { self.0 -= rhs.0 }
        }

        impl std::ops::Neg for $name {
            type Output = Self;
            fn neg(self) -> Self { $name(-self.0) }
        }

        impl std::ops::Mul<f64> for $name {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self { $name(self.0 * rhs) }
        }

        impl std::ops::Mul<$name> for f64 {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name { $name(self * rhs.0) }
        }

        impl std::ops::Div<f64> for $name {
            type Output = Self;
            fn div(self, rhs: f64) -> Self { $name(self.0 / rhs) }
        }

        impl std::ops::Div for $name {
            type Output = f64;
            fn div(self, rhs: Self) -> f64 { self.0 / rhs.0 }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold($name(0.0), |acc, q| acc + q)
            }
        }
    };
}

quantity!(
    /// Distance in gigametres
    Length, "Gm"
);
quantity!(
    /// Speed in kilometres per second
    Speed, "km/s"
);
quantity!(
    /// Acceleration in kilometres per second squared
    Acceleration, "km/s^2"
);
quantity!(
    /// Mass in yottagrams (10^21 kg)
    Mass, "Yg"
);
quantity!(
    /// Duration in seconds
    Time, "s"
);
quantity!(
    /// Rate in hertz
    Frequency, "Hz"
);

impl Length {
    pub const fn gigametres(value: f64) -> Self { Length(value) }
}

impl Speed {
    pub const fn km_per_s(value: f64) -> Self { Speed(value) }
}

impl Mass {
    pub const fn yottagrams(value: f64) -> Self { Mass(value) }
}

impl Time {
    pub const fn seconds(value: f64) -> Self { Time(value) }
    pub fn minutes(value: f64) -> Self { Time(value * SECONDS_PER_MINUTE) }
    pub fn hours(value: f64) -> Self { Time(value * SECONDS_PER_HOUR) }
    pub fn days(value: f64) -> Self { Time(value * SECONDS_PER_DAY) }

    pub fn as_days(self) -> f64 {
        self.0 / SECONDS_PER_DAY
    }

    /// Wall-clock duration of the same length. Negative and non-finite times clamp to zero
    pub fn as_duration(self) -> Duration {
        if self.0.is_finite() && self.0 > 0.0 {
            Duration::from_secs_f64(self.0)
        } else {
            Duration::from_secs(0)
        }
    }
}

impl std::convert::From<Duration> for Time {
    fn from(duration: Duration) -> Self {
        Time(duration.as_secs_f64())
    }
}

impl Frequency {
    pub const fn hertz(value: f64) -> Self { Frequency(value) }

    /// Time between two ticks, `None` for a zero rate
    pub fn period(self) -> Option<Time> {
        if self.0 > 0.0 {
            Some(Time(1.0 / self.0))
        } else {
            None
        }
    }
}

// km/s * s = km
impl std::ops::Mul<Time> for Speed {
    type Output = Length;
    fn mul(self, rhs: Time) -> Length {
        Length(self.0 * rhs.0 / KM_PER_GM)
    }
}

impl std::ops::Mul<Time> for Acceleration {
    type Output = Speed;
    fn mul(self, rhs: Time) -> Speed {
        Speed(self.0 * rhs.0)
    }
}

/// 3D vector whose components all carry the unit `Q`
pub struct Vector3<Q> {
    raw: DVec3,
    _unit: PhantomData<Q>,
}

pub type Position = Vector3<Length>;
pub type Velocity = Vector3<Speed>;
pub type AccelerationVector = Vector3<Acceleration>;

impl<Q: Quantity> Vector3<Q> {
    pub fn new(x: Q, y: Q, z: Q) -> Self {
        Self::from_raw(DVec3::new(x.value(), y.value(), z.value()))
    }

    pub const fn from_raw(raw: DVec3) -> Self {
        Vector3 { raw, _unit: PhantomData }
    }

    pub const fn zero() -> Self {
        Self::from_raw(DVec3::zero())
    }

    /// A vector of magnitude `magnitude` pointing along `direction`, which should be a unit vector
    pub fn along(direction: DVec3, magnitude: Q) -> Self {
        Self::from_raw(direction * magnitude.value())
    }

    pub fn raw(&self) -> DVec3 {
        self.raw
    }

    pub fn x(&self) -> Q { Q::new(self.raw.x) }
    pub fn y(&self) -> Q { Q::new(self.raw.y) }
    pub fn z(&self) -> Q { Q::new(self.raw.z) }

    /// Dot product in the squared unit of `Q`
    pub fn dot(&self, rhs: &Self) -> f64 {
        self.raw.dot(&rhs.raw)
    }

    pub fn norm(&self) -> Q {
        Q::new(self.raw.magnitude())
    }

    /// Squared norm in the squared unit of `Q`
    pub fn norm_squared(&self) -> f64 {
        self.raw.magnitude_squared()
    }

    pub fn normalize(&self) -> DVec3 {
        self.raw.normalize()
    }

    pub fn distance_to(&self, rhs: &Self) -> Q {
        (*self - *rhs).norm()
    }

    pub fn rotated(&self, matrix: &DMatrix3) -> Self {
        Self::from_raw(*matrix * self.raw)
    }

    pub fn is_finite(&self) -> bool {
        self.raw.is_finite()
    }
}

impl<Q> Clone for Vector3<Q> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Q> Copy for Vector3<Q> {}

impl<Q> PartialEq for Vector3<Q> {
    fn eq(&self, rhs: &Self) -> bool {
        self.raw == rhs.raw
    }
}

impl<Q: Quantity> Default for Vector3<Q> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<Q: Quantity> Debug for Vector3<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, {:?}, {:?}) {}", self.raw.x, self.raw.y, self.raw.z, Q::SYMBOL)
    }
}

impl<Q: Quantity> Display for Vector3<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3}) {}", self.raw.x, self.raw.y, self.raw.z, Q::SYMBOL)
    }
}

impl<Q: Quantity> std::convert::From<[Q; 3]> for Vector3<Q> {
    fn from(array: [Q; 3]) -> Self {
        Self::new(array[0], array[1], array[2])
    }
}

impl<Q: Quantity> std::ops::Add for Vector3<Q> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::from_raw(self.raw + rhs.raw)
    }
}

impl<Q: Quantity> std::ops::AddAssign for Vector3<Q> {
    fn add_assign(&mut self, rhs: Self) {
        self.raw += rhs.raw
    }
}

impl<Q: Quantity> std::ops::Sub for Vector3<Q> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::from_raw(self.raw - rhs.raw)
    }
}

impl<Q: Quantity> std::ops::SubAssign for Vector3<Q> {
    fn sub_assign(&mut self, rhs: Self) {
        self.raw -= rhs.raw
    }
}

impl<Q: Quantity> std::ops::Neg for Vector3<Q> {
    type Output = Self;
    fn neg(self) -> Self {
        Self::from_raw(-self.raw)
    }
}

impl<Q: Quantity> std::ops::Mul<f64> for Vector3<Q> {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::from_raw(self.raw * rhs)
    }
}

impl<Q: Quantity> std::ops::Mul<Vector3<Q>> for f64 {
    type Output = Vector3<Q>;
    fn mul(self, rhs: Vector3<Q>) -> Vector3<Q> {
        Vector3::from_raw(rhs.raw * self)
    }
}

impl<Q: Quantity> std::ops::Div<f64> for Vector3<Q> {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self::from_raw(self.raw / rhs)
    }
}

impl std::ops::Mul<Time> for Velocity {
    type Output = Position;
    fn mul(self, rhs: Time) -> Position {
        Position::from_raw(self.raw * (rhs.0 / KM_PER_GM))
    }
}

impl std::ops::Mul<Time> for AccelerationVector {
    type Output = Velocity;
    fn mul(self, rhs: Time) -> Velocity {
        Velocity::from_raw(self.raw * rhs.0)
    }
}
