//! Force & Integration Engine
//!
//! One step reads every position from a single snapshot of the store, computes all updates in
//! parallel, and only then writes them back. No body ever sees another body's updated state within
//! the same step.

use rayon::prelude::*;
use tracing::trace;
use crate::{constants::*, math::*, store::{Entity, Store, StoreError}};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhysicsError {
    #[error("bodies {body} and {other} are {distance} Gm apart, gravity is singular")]
    DegenerateGeometry { body: Entity, other: Entity, distance: f64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A massive body as seen by the force pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attractor {
    pub entity: Entity,
    pub position: Position,
    pub mass: Mass,
}

/// A computed but not yet applied integration result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Update {
    pub entity: Entity,
    pub position: Position,
    pub velocity: Velocity,
}

/// Snapshot of every body with a position and a mass
pub fn massive_bodies(store: &Store) -> Vec<Attractor> {
    store.query::<(Position, Mass)>()
        .iter()
        .map(|(entity, (position, mass))| Attractor { entity, position: *position, mass: *mass })
        .collect()
}

/// Gravitational acceleration at `r` on `body`, summed over every attractor except `body` itself
pub fn acceleration(body: Entity, r: Position, field: &[Attractor]) -> Result<AccelerationVector, PhysicsError> {
    let mut a = AccelerationVector::zero();

    for other in field.iter().filter(|other| other.entity != body) {
        let offset = r - other.position; // Gm
        let d2 = offset.norm_squared(); // Gm^2

        if !(d2 > 0.0) || !d2.is_finite() {
            return Err(PhysicsError::DegenerateGeometry { body, other: other.entity, distance: d2.sqrt() });
        }

        // a = -G m / d^2, along the line toward the other body
        let magnitude = Acceleration(G * other.mass.value() / d2);
        a -= AccelerationVector::along(offset.normalize(), magnitude);
    }

    Ok(a)
}

/// Euler-Richardson step: advance half a step to sample the midpoint acceleration and velocity,
/// then take the full step with those midpoint rates
pub fn euler_richardson(body: Entity, r0: Position, v0: Velocity, dt: Time, field: &[Attractor]) -> Result<Update, PhysicsError> {
    let half = dt * 0.5;

    let a0 = acceleration(body, r0, field)?;
    let v_mid = v0 + a0 * half;
    let r_mid = r0 + v0 * half;

    let a_mid = acceleration(body, r_mid, field)?;

    Ok(Update {
        entity: body,
        position: r0 + v_mid * dt,
        velocity: v0 + a_mid * dt,
    })
}

/// Updates of one step, held back until `commit`
#[derive(Debug, Clone, Default)]
pub struct StepBuffer {
    updates: Vec<Update>,
}

impl StepBuffer {
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Update> {
        self.updates.iter()
    }

    /// Writes every buffered update into `store`, returns the number of bodies moved
    pub fn commit(self, store: &mut Store) -> Result<usize, PhysicsError> {
        for update in self.updates.iter() {
            let (position, velocity) = store.fetch_mut::<(Position, Velocity)>(update.entity)?;
            *position = update.position;
            *velocity = update.velocity;
        }
        Ok(self.updates.len())
    }
}

/// Everything one step reads, copied out of the store
///
/// Once captured the store is no longer needed, so the force pass runs without any borrow of it.
#[derive(Debug, Clone, Default)]
pub struct StepInput {
    field: Vec<Attractor>,
    movers: Vec<(Entity, Position, Velocity)>,
}

impl StepInput {
    pub fn capture(store: &Store) -> Self {
        let movers = store.query::<(Position, Velocity, Mass)>()
            .iter()
            .map(|(entity, (position, velocity, _))| (entity, *position, *velocity))
            .collect();

        StepInput { field: massive_bodies(store), movers }
    }

    /// Number of movable bodies
    pub fn len(&self) -> usize {
        self.movers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movers.is_empty()
    }

    /// Computes one step of size `dt` for every captured movable body
    ///
    /// Bodies are processed in parallel, each worker producing its own update, and rayon merges
    /// the results in body order.
    pub fn compute(&self, dt: Time) -> Result<StepBuffer, PhysicsError> {
        let field = &self.field;
        let updates = self.movers.par_iter()
            .map(|&(entity, position, velocity)| euler_richardson(entity, position, velocity, dt, field))
            .collect::<Result<Vec<Update>, PhysicsError>>()?;

        trace!(bodies = updates.len(), attractors = field.len(), dt = dt.value(), "computed step");
        Ok(StepBuffer { updates })
    }
}

/// Computes one step of size `dt` for every movable body without touching the store
pub fn compute_step(store: &Store, dt: Time) -> Result<StepBuffer, PhysicsError> {
    StepInput::capture(store).compute(dt)
}

/// Computes and commits one step on a store the caller owns exclusively
pub fn advance(store: &mut Store, dt: Time) -> Result<usize, PhysicsError> {
    compute_step(store, dt)?.commit(store)
}

pub fn total_mass(store: &Store) -> Mass {
    store.query::<(Mass,)>().iter().map(|(_, (mass,))| *mass).sum()
}

/// Mass-weighted mean position of every massive body, the origin when there is no mass
pub fn center_of_mass(store: &Store) -> Position {
    let mut weighted = DVec3::zero();
    let mut total = 0.0;

    for (_, (position, mass)) in store.query::<(Position, Mass)>().iter() {
        weighted += position.raw() * mass.value();
        total += mass.value();
    }

    if total > 0.0 {
        Position::from_raw(weighted / total)
    } else {
        Position::zero()
    }
}

/// Total kinetic energy of the movable bodies, J
pub fn kinetic_energy(store: &Store) -> f64 {
    let mut sum = 0.0;
    for (_, (velocity, mass)) in store.query::<(Velocity, Mass)>().iter() {
        let m = mass.value() * KG_PER_YG; // kg
        let v2 = velocity.norm_squared() * M_PER_KM * M_PER_KM; // m^2/s^2
        sum += (m / 2.0) * v2;
    }
    sum
}

/// Total gravitational potential energy over every pair of massive bodies, J
pub fn potential_energy(store: &Store) -> f64 {
    let field = massive_bodies(store);
    let mut sum = 0.0;

    for (i, body) in field.iter().enumerate() {
        for other in field[i + 1..].iter() {
            let r = body.position.distance_to(&other.position).value() * M_PER_GM; // m
            let m1 = body.mass.value() * KG_PER_YG;
            let m2 = other.mass.value() * KG_PER_YG;
            sum += -(G_SI * m1 * m2) / r;
        }
    }
    sum
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::components::Body;
    use approx::assert_relative_eq;

    fn at(x: f64, y: f64) -> Position {
        Position::new(Length(x), Length(y), Length(0.0))
    }

    fn moving(vx: f64, vy: f64) -> Velocity {
        Velocity::new(Speed(vx), Speed(vy), Speed(0.0))
    }

    #[test]
    fn test_pairwise_symmetry() {
        let mut store = Store::new();
        let (m1, m2, d) = (2.0, 5.0, 3.0);
        let a = Body::new("a").with_mass(Mass(m1)).with_position(at(0.0, 0.0)).spawn(&mut store).unwrap();
        let b = Body::new("b").with_mass(Mass(m2)).with_position(at(d, 0.0)).spawn(&mut store).unwrap();

        let field = massive_bodies(&store);
        let a1 = acceleration(a, at(0.0, 0.0), &field).unwrap();
        let a2 = acceleration(b, at(d, 0.0), &field).unwrap();

        assert_relative_eq!(a1.norm().value(), G * m2 / (d * d), max_relative = 1e-12);
        assert_relative_eq!(a2.norm().value(), G * m1 / (d * d), max_relative = 1e-12);

        // along the connecting line, pointing at each other
        assert!(a1.x().value() > 0.0);
        assert!(a2.x().value() < 0.0);
        assert_relative_eq!(a1.y().value(), 0.0);
        assert_relative_eq!(a2.y().value(), 0.0);
        assert_relative_eq!(a1.x().value() * m1, -a2.x().value() * m2, max_relative = 1e-12);
    }

    #[test]
    fn test_self_exclusion() {
        let mut store = Store::new();
        let lone = Body::new("lone")
            .with_mass(Mass(10.0))
            .with_position(at(1.0, 2.0))
            .with_velocity(moving(0.5, 0.0))
            .spawn(&mut store)
            .unwrap();

        let field = massive_bodies(&store);
        assert_eq!(acceleration(lone, at(1.0, 2.0), &field).unwrap(), AccelerationVector::zero());

        // with no force the body coasts
        let dt = Time::seconds(1000.0);
        advance(&mut store, dt).unwrap();
        assert_eq!(*store.get::<Velocity>(lone).unwrap(), moving(0.5, 0.0));
        assert_relative_eq!(store.get::<Position>(lone).unwrap().x().value(), 1.0 + 0.5 * 1000.0 / KM_PER_GM);
    }

    #[test]
    fn test_coincident_bodies_are_fatal() {
        let mut store = Store::new();
        Body::new("a").with_mass(Mass(1.0)).with_velocity(moving(0.0, 0.0)).spawn(&mut store).unwrap();
        Body::new("b").with_mass(Mass(1.0)).spawn(&mut store).unwrap();

        match advance(&mut store, Time::seconds(1.0)) {
            Err(PhysicsError::DegenerateGeometry { distance, .. }) => assert_eq!(distance, 0.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_synchronous_update() {
        let mut store = Store::new();
        let bodies = [
            Body::new("a").with_mass(Mass(300.0)).with_position(at(0.0, 0.0)).with_velocity(moving(0.0, 0.1)),
            Body::new("b").with_mass(Mass(20.0)).with_position(at(4.0, 0.0)).with_velocity(moving(0.0, -1.0)),
            Body::new("c").with_mass(Mass(5.0)).with_position(at(0.0, 6.0)).with_velocity(moving(2.0, 0.0)),
            Body::new("fixed").with_mass(Mass(50.0)).with_position(at(-5.0, -5.0)),
        ];
        let entities: Vec<Entity> = bodies.iter().map(|b| b.spawn(&mut store).unwrap()).collect();

        // every expected update is computed from the initial snapshot
        let dt = Time::hours(1.0);
        let field = massive_bodies(&store);
        let expected: Vec<Update> = bodies[..3].iter().zip(entities.iter())
            .map(|(body, entity)| euler_richardson(*entity, body.position(), body.velocity().unwrap(), dt, &field).unwrap())
            .collect();

        let buffer = compute_step(&store, dt).unwrap();
        assert_eq!(buffer.len(), 3);
        // nothing moved before the commit
        assert_eq!(*store.get::<Position>(entities[1]).unwrap(), at(4.0, 0.0));

        assert_eq!(buffer.commit(&mut store).unwrap(), 3);
        for update in expected.iter() {
            assert_eq!(*store.get::<Position>(update.entity).unwrap(), update.position);
            assert_eq!(*store.get::<Velocity>(update.entity).unwrap(), update.velocity);
        }
        assert_eq!(*store.get::<Position>(entities[3]).unwrap(), at(-5.0, -5.0));
    }

    #[test]
    fn test_captured_input_outlives_store_changes() {
        let mut store = Store::new();
        let sun = Body::new("sun").with_mass(Mass(1000.0)).spawn(&mut store).unwrap();
        let planet = Body::new("planet")
            .with_mass(Mass(1.0))
            .with_position(at(10.0, 0.0))
            .with_velocity(moving(0.0, 1.0))
            .spawn(&mut store)
            .unwrap();

        let dt = Time::hours(6.0);
        let expected = compute_step(&store, dt).unwrap();
        let input = StepInput::capture(&store);
        assert_eq!(input.len(), 1);

        // the capture holds no borrow, so the store can change before the pass runs
        *store.get_mut::<Position>(sun).unwrap() = at(-50.0, 0.0);
        *store.get_mut::<Position>(planet).unwrap() = at(0.0, 30.0);

        let buffer = input.compute(dt).unwrap();
        let updates: Vec<Update> = buffer.iter().copied().collect();
        assert_eq!(updates, expected.iter().copied().collect::<Vec<_>>());
        assert!(StepInput::capture(&Store::new()).is_empty());
    }

    #[test]
    fn test_energy_and_mass() {
        let mut store = Store::new();
        Body::new("a").with_mass(Mass(1.0)).with_position(at(0.0, 0.0)).with_velocity(moving(1.0, 0.0)).spawn(&mut store).unwrap();
        Body::new("b").with_mass(Mass(3.0)).with_position(at(2.0, 0.0)).spawn(&mut store).unwrap();

        assert_eq!(total_mass(&store), Mass(4.0));
        assert_relative_eq!(kinetic_energy(&store), 0.5 * 1e21 * 1e6, max_relative = 1e-12);
        assert_relative_eq!(potential_energy(&store), -G_SI * 1e21 * 3e21 / 2e9, max_relative = 1e-12);
        assert_relative_eq!(center_of_mass(&store).x().value(), 1.5);

        assert_eq!(center_of_mass(&Store::new()), Position::zero());
    }
}
