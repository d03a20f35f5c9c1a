use std::fmt::Write;
use crate::{context::BodySnapshot, math::Quantity, physics, store::Store};

const TABLE_WIDTH: usize = 113;

/// Scales `n` into the range of an SI prefix, returns the scaled value and the prefix
pub fn format_si_value(n: f64) -> (f64, &'static str) {
    if n == 0.0 {
        return (0.0, "")
    } else if n.is_nan() {
        return (f64::NAN, "")
    } else if n.is_infinite() {
        return (n, "")
    }

    match n.abs() {
        x if x < 1e-6 => (n * 1e9, "n"),
        x if x < 1e-3 => (n * 1e6, "u"),
        x if x < 1.0 => (n * 1e3, "m"),
        x if x < 1e3 => (n, ""),
        x if x < 1e6 => (n / 1e3, "K"),
        x if x < 1e9 => (n / 1e6, "M"),
        x if x < 1e12 => (n / 1e9, "G"),
        x if x < 1e15 => (n / 1e12, "T"),
        x if x < 1e18 => (n / 1e15, "P"),
        x if x < 1e21 => (n / 1e18, "E"),
        x if x < 1e24 => (n / 1e21, "Z"),
        _ => (n / 1e24, "Y"),
    }
}

fn divisor(out: &mut String) {
    let _ = writeln!(out, "|{:-^width$}|", "", width = TABLE_WIDTH);
}

/// Terminal table of `bodies`, headed by the day number when one is given
///
/// ```text
/// |-------------------------------------------------------------------------------------------------------------------|
/// |Obj name  |        mass        |                position                |                velocity                |
/// ```
pub fn dump_table(bodies: &[BodySnapshot], day: Option<u32>) -> String {
    let mut out = String::new();

    if let Some(day) = day {
        divisor(&mut out);
        let _ = writeln!(out, "|{:^width$}|", format!("DAY {}", day), width = TABLE_WIDTH);
    }
    divisor(&mut out);
    let _ = writeln!(out, "|{:<10}|{:^20}|{:^40}|{:^40}|", "Obj name", "mass", "position", "velocity");
    divisor(&mut out);

    for body in bodies.iter() {
        let velocity = body.velocity.map_or_else(|| "fixed".to_string(), |v| v.to_string());
        let _ = writeln!(
            out,
            "|{:<10}|{:^20}|{:^40}|{:^40}|",
            body.tag,
            body.mass.to_string(),
            body.position.to_string(),
            velocity
        );
    }
    divisor(&mut out);
    out
}

/// One line of system energy, per unit of total mass
pub fn energy_summary(store: &Store) -> String {
    let kinetic = physics::kinetic_energy(store);
    let potential = physics::potential_energy(store);
    let mass = physics::total_mass(store).value() * crate::constants::KG_PER_YG;

    if !(mass > 0.0) {
        return "System Total Energy: no mass".to_string()
    }

    let (e, ep) = format_si_value((kinetic + potential) / mass);
    let (k, kp) = format_si_value(kinetic / mass);
    let (p, pp) = format_si_value(potential / mass);
    format!("System Total Energy: {:+09.04}{}J/kg (KIN={:+09.04}{}J/kg, POT={:+09.04}{}J/kg)", e, ep, k, kp, p, pp)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{components::Body, math::*};
    use approx::assert_relative_eq;

    #[test]
    fn test_format_si_value() {
        assert_eq!(format_si_value(0.0), (0.0, ""));
        assert_eq!(format_si_value(12.5), (12.5, ""));

        let (v, p) = format_si_value(-4.2e7);
        assert_relative_eq!(v, -42.0, max_relative = 1e-12);
        assert_eq!(p, "M");

        let (v, p) = format_si_value(3.0e-4);
        assert_relative_eq!(v, 300.0, max_relative = 1e-12);
        assert_eq!(p, "u");

        let (v, p) = format_si_value(5.0e30);
        assert_relative_eq!(v, 5.0e6, max_relative = 1e-12);
        assert_eq!(p, "Y");

        assert!(format_si_value(f64::NAN).0.is_nan());
        assert_eq!(format_si_value(f64::NEG_INFINITY), (f64::NEG_INFINITY, ""));
    }

    #[test]
    fn test_dump_table() {
        let mut store = Store::new();
        let earth = Body::new("Earth")
            .with_mass(Mass(5972.0))
            .with_position(Position::new(Length(149.6), Length(0.0), Length(0.0)))
            .with_velocity(Velocity::new(Speed(0.0), Speed(29.78), Speed(0.0)));
        let sun = Body::new("Sun").with_mass(Mass(1989000000.0));
        let entities = [sun.spawn(&mut store).unwrap(), earth.spawn(&mut store).unwrap()];

        let bodies = vec![
            BodySnapshot { entity: entities[0], tag: sun.tag().clone(), mass: sun.mass(), position: sun.position(), velocity: None },
            BodySnapshot { entity: entities[1], tag: earth.tag().clone(), mass: earth.mass(), position: earth.position(), velocity: earth.velocity() },
        ];

        let table = dump_table(&bodies, Some(42));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 8);
        assert!(lines.iter().all(|line| line.chars().count() == TABLE_WIDTH + 2));
        assert!(lines[1].contains("DAY 42"));
        assert!(lines[3].starts_with("|Obj name  |"));
        assert!(lines[5].starts_with("|Sun       |"));
        assert!(lines[5].contains("fixed"));
        assert!(lines[6].contains("(149.600, 0.000, 0.000) Gm"));
        assert!(lines[6].contains("(0.000, 29.780, 0.000) km/s"));

        assert_eq!(dump_table(&[], None).lines().count(), 4);
    }

    #[test]
    fn test_energy_summary() {
        assert!(energy_summary(&Store::new()).contains("no mass"));

        let mut store = Store::new();
        Body::new("a").with_mass(Mass(1.0)).with_velocity(Velocity::new(Speed(1.0), Speed(0.0), Speed(0.0))).spawn(&mut store).unwrap();
        Body::new("b").with_mass(Mass(1.0)).with_position(Position::new(Length(1.0), Length(0.0), Length(0.0))).spawn(&mut store).unwrap();
        assert!(energy_summary(&store).starts_with("System Total Energy: "));
    }
}
