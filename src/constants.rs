pub const G_SI: f64 = 0.0000000000667408; // m^3 kg^-1 s^-2

pub const KG_PER_YG: f64 = 1000000000000000000000.0;
pub const M_PER_GM: f64 = 1000000000.0;
pub const M_PER_KM: f64 = 1000.0;
pub const KM_PER_GM: f64 = M_PER_GM / M_PER_KM;

/// Gravitational constant in engine units, km s^-2 Gm^2 Yg^-1
///
/// Multiplying by a mass in Yg and dividing by a squared distance in Gm^2 gives an acceleration in
/// km/s^2. Numerically it equals the SI value because the three conversion factors cancel
pub const G: f64 = G_SI * KG_PER_YG / (M_PER_GM * M_PER_GM) / M_PER_KM;

pub const SECONDS_PER_MINUTE: f64 = 60.0;
pub const SECONDS_PER_HOUR: f64 = 60.0 * SECONDS_PER_MINUTE;
pub const SECONDS_PER_DAY: f64 = 24.0 * SECONDS_PER_HOUR;

/// Largest integration sub-step, seconds
pub const DT_MAX: f64 = 10.0 * SECONDS_PER_MINUTE;

/// Wall-clock length of one scheduler tick, seconds
pub const TICK: f64 = 0.001;

pub const SOL_MASS: f64 = 1989000000.0; // Yg
pub const EARTH_MASS: f64 = 5972.0; // Yg
pub const EARTH_DIST_TO_SOL: f64 = 149.6; // Gm
pub const EARTH_SOL_ORBIT_VEL: f64 = 29.78; // km/s
