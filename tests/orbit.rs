extern crate gsim;
use std::f64::consts::PI;
use approx::assert_relative_eq;
use gsim::components::Body;
use gsim::constants::*;
use gsim::math::*;
use gsim::physics;
use gsim::store::{Entity, Store};

const HEAVY: f64 = 1000.0; // Yg
const LIGHT: f64 = 1.0; // Yg
const SEPARATION: f64 = 10.0; // Gm
const STEPS: usize = 1000;

/// Circular two-body orbit around the barycentre, returns (heavy, light, period)
fn binary(store: &mut Store) -> (Entity, Entity, Time) {
    let total = HEAVY + LIGHT;
    // v^2 = G M / r, with r taken in km
    let v_rel = (G * total * KM_PER_GM / SEPARATION).sqrt();
    let period = Time::seconds(2.0 * PI * SEPARATION * KM_PER_GM / v_rel);

    let heavy = Body::new("heavy")
        .with_mass(Mass(HEAVY))
        .with_position(Position::new(Length(-LIGHT / total * SEPARATION), Length(0.0), Length(0.0)))
        .with_velocity(Velocity::new(Speed(0.0), Speed(-LIGHT / total * v_rel), Speed(0.0)))
        .spawn(store)
        .unwrap();
    let light = Body::new("light")
        .with_mass(Mass(LIGHT))
        .with_position(Position::new(Length(HEAVY / total * SEPARATION), Length(0.0), Length(0.0)))
        .with_velocity(Velocity::new(Speed(0.0), Speed(HEAVY / total * v_rel), Speed(0.0)))
        .spawn(store)
        .unwrap();

    (heavy, light, period)
}

fn relative(store: &Store, heavy: Entity, light: Entity) -> Position {
    *store.get::<Position>(light).unwrap() - *store.get::<Position>(heavy).unwrap()
}

fn total_energy(store: &Store) -> f64 {
    physics::kinetic_energy(store) + physics::potential_energy(store)
}

#[test]
fn circular_orbit_closes() {
    let mut store = Store::new();
    let (heavy, light, period) = binary(&mut store);
    let dt = period / STEPS as f64;
    let start = relative(&store, heavy, light);

    for step in 1..=STEPS {
        physics::advance(&mut store, dt).unwrap();

        let r = relative(&store, heavy, light);
        assert_relative_eq!(r.norm().value(), SEPARATION, max_relative = 1e-3);

        if step == STEPS / 2 {
            // opposite side after half a period
            assert!((r + start).norm().value() < 0.05);
        }
    }

    let end = relative(&store, heavy, light);
    assert!((end - start).norm().value() < 0.05, "did not return: {}", end);
}

#[test]
fn barycentre_and_energy_are_kept() {
    let mut store = Store::new();
    let (_, _, period) = binary(&mut store);
    let dt = period / STEPS as f64;
    let e0 = total_energy(&store);
    assert!(e0 < 0.0);

    for _ in 0..STEPS {
        physics::advance(&mut store, dt).unwrap();
        assert!(physics::center_of_mass(&store).norm().value() < 1e-3);
    }

    assert_relative_eq!(total_energy(&store), e0, max_relative = 1e-3);
    assert_eq!(physics::total_mass(&store), Mass(HEAVY + LIGHT));
}

#[test]
fn barycentre_drifts_with_the_system() {
    let mut store = Store::new();
    let (heavy, light, period) = binary(&mut store);
    let boost = Velocity::new(Speed(0.3), Speed(0.0), Speed(0.1));
    for entity in [heavy, light] {
        *store.get_mut::<Velocity>(entity).unwrap() += boost;
    }

    let dt = period / STEPS as f64;
    let com0 = physics::center_of_mass(&store);
    let mut elapsed = Time(0.0);

    for _ in 0..STEPS {
        physics::advance(&mut store, dt).unwrap();
        elapsed += dt;

        let expected = com0 + boost * elapsed;
        assert!((physics::center_of_mass(&store) - expected).norm().value() < 1e-3);
    }

    // hundreds of Gm away from where it started
    assert!((physics::center_of_mass(&store) - com0).norm().value() > 100.0);
    assert_relative_eq!(relative(&store, heavy, light).norm().value(), SEPARATION, max_relative = 1e-3);
}

#[test]
fn fixed_attractor_stays_put() {
    let mut store = Store::new();
    let sun = Body::new("Sun").with_mass(Mass(SOL_MASS)).spawn(&mut store).unwrap();
    let earth = Body::new("Earth")
        .with_mass(Mass(EARTH_MASS))
        .with_position(Position::new(Length(EARTH_DIST_TO_SOL), Length(0.0), Length(0.0)))
        .with_velocity(Velocity::new(Speed(0.0), Speed(EARTH_SOL_ORBIT_VEL), Speed(0.0)))
        .spawn(&mut store)
        .unwrap();

    // a quarter year in 10 minute steps
    let steps = (365.25 / 4.0 * SECONDS_PER_DAY / DT_MAX) as usize;
    for _ in 0..steps {
        assert_eq!(physics::advance(&mut store, Time::seconds(DT_MAX)).unwrap(), 1);
    }

    assert_eq!(*store.get::<Position>(sun).unwrap(), Position::zero());
    let p = *store.get::<Position>(earth).unwrap();
    assert_relative_eq!(p.norm().value(), EARTH_DIST_TO_SOL, max_relative = 0.02);
    // a quarter turn counterclockwise
    assert!(p.y().value() > 0.95 * EARTH_DIST_TO_SOL);
    assert!(p.x().value().abs() < 0.1 * EARTH_DIST_TO_SOL);
}
