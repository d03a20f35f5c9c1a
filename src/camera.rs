use std::f64::consts::TAU;
use crate::{math::*, physics::center_of_mass, store::{Entity, Store, StoreError}};

/// Rule that places the camera origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Follow {
    /// Mass-weighted centroid of every massive body, plus `offset`
    CenterOfMass { offset: Position },
    /// The constant point `offset`
    Fixed { offset: Position },
    /// Position of `entity`, plus `offset`
    Target { entity: Entity, offset: Position },
}

impl Default for Follow {
    fn default() -> Self {
        Follow::CenterOfMass { offset: Position::zero() }
    }
}

impl Follow {
    pub fn target(entity: Entity) -> Self {
        Follow::Target { entity, offset: Position::zero() }
    }

    pub fn center_of_mass() -> Self {
        Follow::CenterOfMass { offset: Position::zero() }
    }

    pub fn offset(&self) -> Position {
        match self {
            Follow::CenterOfMass { offset } => *offset,
            Follow::Fixed { offset } => *offset,
            Follow::Target { offset, .. } => *offset,
        }
    }

    /// Moves the origin by `displacement` without changing what is followed
    pub fn pan(&mut self, displacement: Position) {
        match self {
            Follow::CenterOfMass { offset } | Follow::Fixed { offset } | Follow::Target { offset, .. } => {
                *offset += displacement
            }
        }
    }

    /// Stops following, pinning the origin where it currently is
    pub fn released(&self, store: &Store) -> Result<Follow, StoreError> {
        Ok(Follow::Fixed { offset: absolute_position(store, self)? })
    }
}

/// Resolves `follow` to a point in space against the current contents of `store`
pub fn absolute_position(store: &Store, follow: &Follow) -> Result<Position, StoreError> {
    match follow {
        Follow::CenterOfMass { offset } => Ok(center_of_mass(store) + *offset),
        Follow::Fixed { offset } => Ok(*offset),
        Follow::Target { entity, offset } => Ok(*store.get::<Position>(*entity)? + *offset),
    }
}

/// View orientation as two angles in 256ths of a full turn
///
/// Counters wrap around, 255 + 1 is a full turn back to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rotation {
    pub z_axis: u8,
    pub x_axis: u8,
}

impl Rotation {
    pub const STEPS: f64 = 256.0;

    pub const fn new(z_axis: u8, x_axis: u8) -> Self {
        Rotation { z_axis, x_axis }
    }

    pub fn z_angle(&self) -> f64 {
        self.z_axis as f64 * TAU / Self::STEPS
    }

    pub fn x_angle(&self) -> f64 {
        self.x_axis as f64 * TAU / Self::STEPS
    }

    /// Rotation about z followed by rotation about x
    pub fn matrix(&self) -> DMatrix3 {
        DMatrix3::rotation_x(self.x_angle()) * DMatrix3::rotation_z(self.z_angle())
    }

    /// Undoes `matrix`
    pub fn reversed_matrix(&self) -> DMatrix3 {
        DMatrix3::rotation_z(-self.z_angle()) * DMatrix3::rotation_x(-self.x_angle())
    }
}

impl std::ops::Add for Rotation {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Rotation { z_axis: self.z_axis.wrapping_add(rhs.z_axis), x_axis: self.x_axis.wrapping_add(rhs.x_axis) }
    }
}

impl std::ops::AddAssign for Rotation {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs
    }
}

impl std::ops::Sub for Rotation {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl std::ops::Neg for Rotation {
    type Output = Self;
    fn neg(self) -> Self {
        Rotation { z_axis: self.z_axis.wrapping_neg(), x_axis: self.x_axis.wrapping_neg() }
    }
}

/// Radius of the visible region, held inside `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRadius {
    value: Length,
    min: Length,
    max: Length,
}

impl ViewRadius {
    pub fn new(value: Length, min: Length, max: Length) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let mut radius = ViewRadius { value: min, min, max };
        radius.set(value);
        radius
    }

    pub fn get(&self) -> Length {
        self.value
    }

    pub fn min(&self) -> Length {
        self.min
    }

    pub fn max(&self) -> Length {
        self.max
    }

    /// Sets the radius, clamped into range. Non-finite values are ignored
    pub fn set(&mut self, value: Length) -> Length {
        if value.is_finite() {
            self.value = value.max(self.min).min(self.max);
        }
        self.value
    }

    pub fn zoom(&mut self, delta: Length) -> Length {
        self.set(self.value + delta)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::components::Body;
    use approx::assert_relative_eq;

    fn at(x: f64, y: f64) -> Position {
        Position::new(Length(x), Length(y), Length(0.0))
    }

    #[test]
    fn test_rotation_wraps() {
        let mut r = Rotation::new(250, 3);
        r += Rotation::new(10, 0);
        assert_eq!(r, Rotation::new(4, 3));

        r = r - Rotation::new(0, 5);
        assert_eq!(r, Rotation::new(4, 254));

        assert_eq!(-Rotation::new(1, 0), Rotation::new(255, 0));
        assert_eq!(-Rotation::new(0, 128), Rotation::new(0, 128));
        assert_eq!(Rotation::new(64, 0) + -Rotation::new(64, 0), Rotation::default());

        assert_relative_eq!(Rotation::new(64, 128).z_angle(), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(Rotation::new(64, 128).x_angle(), std::f64::consts::PI);
    }

    #[test]
    fn test_rotation_matrices() {
        let r = Rotation::new(37, 201);
        let v = DVec3::new(3.0, -1.0, 2.0);
        let back = r.reversed_matrix() * (r.matrix() * v);
        assert_relative_eq!(back.x, v.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-12);
        assert_relative_eq!(back.z, v.z, epsilon = 1e-12);

        // a quarter turn about z moves x onto y
        let turned = Rotation::new(64, 0).matrix() * DVec3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(turned.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_view_radius_clamps() {
        let mut radius = ViewRadius::new(Length(50.0), Length(10.0), Length(100.0));
        assert_eq!(radius.zoom(Length(-10.0)), Length(40.0));
        assert_eq!(radius.zoom(Length(-100.0)), Length(10.0));
        assert_eq!(radius.zoom(Length(1000.0)), Length(100.0));
        assert_eq!(radius.set(Length(f64::NAN)), Length(100.0));

        let swapped = ViewRadius::new(Length(500.0), Length(100.0), Length(1.0));
        assert_eq!((swapped.min(), swapped.max(), swapped.get()), (Length(1.0), Length(100.0), Length(100.0)));
    }

    #[test]
    fn test_follow_positions() {
        let mut store = Store::new();
        let heavy = Body::new("heavy").with_mass(Mass(3.0)).with_position(at(0.0, 0.0)).spawn(&mut store).unwrap();
        let light = Body::new("light").with_mass(Mass(1.0)).with_position(at(4.0, 0.0)).spawn(&mut store).unwrap();

        let com = absolute_position(&store, &Follow::center_of_mass()).unwrap();
        assert_relative_eq!(com.x().value(), 1.0);

        let mut follow = Follow::target(light);
        follow.pan(at(0.0, 2.0));
        assert_eq!(absolute_position(&store, &follow).unwrap(), at(4.0, 2.0));

        // releasing keeps the origin in place even as the target moves on
        let released = follow.released(&store).unwrap();
        *store.get_mut::<Position>(light).unwrap() = at(9.0, 9.0);
        assert_eq!(absolute_position(&store, &released).unwrap(), at(4.0, 2.0));
        assert_eq!(released.offset(), at(4.0, 2.0));

        store.destroy(heavy).unwrap();
        assert_eq!(absolute_position(&store, &Follow::target(heavy)), Err(StoreError::InvalidEntity(heavy)));
    }
}
