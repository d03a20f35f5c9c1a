//! Real-Time Scheduler
//!
//! Ties simulated time to wall-clock time. Every wall-clock tick must advance the simulation by
//! `Δt`, but a single integration step may not exceed `dt_max`. With `η = Δt / dt_max` the scheduler
//! takes `n = floor(η) + 1` sub-steps of `τ = dt_max·η / n = Δt / n` per tick, so `n·τ = Δt` and `τ < dt_max`.

use std::time::{Duration, Instant};
use tracing::{debug, info, trace};
use crate::{
    components::Trail,
    config::RunParams,
    context::{Context, Status},
    math::*,
    physics::PhysicsError,
    store::Entity,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid simulation rate: {0} days per second")]
    InvalidRate(f64),
    #[error("invalid step size: {0}")]
    InvalidStep(Time),
    #[error("invalid day range {first}..={last}")]
    InvalidDays { first: u32, last: u32 },
    #[error(transparent)]
    Physics(#[from] PhysicsError),
}

/// Sub-step layout for one wall-clock tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepPlan {
    /// Simulated time per tick, Δt
    pub per_tick: Time,
    /// Δt / dt_max
    pub ratio: f64,
    pub n_steps: u32,
    /// Size of each sub-step, τ
    pub timestep: Time,
}

impl StepPlan {
    pub fn new(days_per_second: f64, dt_max: Time, tick: Time) -> Result<StepPlan, SimulationError> {
        if !(days_per_second > 0.0) || !days_per_second.is_finite() {
            return Err(SimulationError::InvalidRate(days_per_second));
        }
        if !(dt_max.value() > 0.0) || !dt_max.is_finite() {
            return Err(SimulationError::InvalidStep(dt_max));
        }
        if !(tick.value() > 0.0) || !tick.is_finite() {
            return Err(SimulationError::InvalidStep(tick));
        }

        let per_tick = Time::days(days_per_second * tick.value());
        let ratio = per_tick / dt_max;
        let n = ratio.floor() + 1.0;

        if n > u32::MAX as f64 {
            return Err(SimulationError::InvalidRate(days_per_second));
        }

        Ok(StepPlan {
            per_tick,
            ratio,
            n_steps: n as u32,
            timestep: per_tick / n,
        })
    }
}

/// Statistics of a finished run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Days fully simulated
    pub days: u32,
    pub steps: u64,
    pub simulated: Time,
    /// The run ended on a stop request rather than by running out of days
    pub cancelled: bool,
}

/// Sleeps toward absolute deadlines spaced `budget` apart, so rounding in individual sleeps does
/// not accumulate. When the loop falls more than `MAX_LAG` budgets behind, the missed deadlines are
/// dropped and pacing restarts from now.
#[derive(Debug)]
struct Pacer {
    budget: Duration,
    next: Instant,
}

impl Pacer {
    const MAX_LAG: u32 = 100;

    fn new(budget: Duration) -> Self {
        Pacer { budget, next: Instant::now() + budget }
    }

    fn wait(&mut self) {
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
        } else if now - self.next > self.budget * Self::MAX_LAG {
            trace!(behind = ?(now - self.next), "pacer fell behind, resynchronising");
            self.next = now;
        }
        self.next += self.budget;
    }
}

/// Stops the context on every exit path, including unwinding
struct StopOnDrop<'a>(&'a Context);

impl<'a> Drop for StopOnDrop<'a> {
    fn drop(&mut self) {
        self.0.request_stop();
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    plan: StepPlan,
    first_day: u32,
    last_day: u32,
    tick: Duration,
    paced: bool,
}

impl Scheduler {
    pub fn new(params: &RunParams) -> Result<Scheduler, SimulationError> {
        if params.first_day > params.last_day {
            return Err(SimulationError::InvalidDays { first: params.first_day, last: params.last_day });
        }

        let plan = StepPlan::new(params.days_per_second, params.max_timestep, params.tick)?;

        Ok(Scheduler {
            plan,
            first_day: params.first_day,
            last_day: params.last_day,
            tick: params.tick.as_duration(),
            paced: params.paced,
        })
    }

    pub fn plan(&self) -> StepPlan {
        self.plan
    }

    /// Runs every sub-step back to back without sleeping
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Simulates days `first_day..=last_day`, blocking until they are done or a stop is requested
    ///
    /// The context is always stopped when this returns.
    pub fn run(&self, ctx: &Context) -> Result<RunSummary, SimulationError> {
        let _stop = StopOnDrop(ctx);

        let plan = self.plan;
        info!(
            per_tick = %plan.per_tick,
            ratio = plan.ratio,
            timestep = %plan.timestep,
            n_steps = plan.n_steps,
            paced = self.paced,
            "simulation plan"
        );

        let mut summary = RunSummary { days: 0, steps: 0, simulated: Time(0.0), cancelled: false };

        if let Err(status) = ctx.start() {
            info!(?status, "simulation stopped before it started");
            summary.cancelled = true;
            return Ok(summary);
        }

        let day_length = Time::days(1.0);
        let mut accumulator = day_length;
        let mut pacer = Pacer::new(self.tick / plan.n_steps);

        for day in self.first_day..=self.last_day {
            accumulator -= day_length;

            loop {
                for _ in 0..plan.n_steps {
                    if ctx.status() == Status::Stopped {
                        info!(day, steps = summary.steps, "simulation stopped");
                        summary.cancelled = true;
                        return Ok(summary);
                    }

                    ctx.advance(plan.timestep)?;
                    accumulator += plan.timestep;
                    summary.steps += 1;
                    summary.simulated += plan.timestep;

                    if self.paced {
                        pacer.wait();
                    }
                }

                if accumulator >= day_length {
                    break;
                }
            }

            let trails = close_day(ctx, day)?;
            summary.days += 1;
            debug!(day, trails, elapsed_days = summary.simulated.as_days(), "day complete");
        }

        info!(days = summary.days, steps = summary.steps, "simulation finished");
        Ok(summary)
    }
}

/// Pushes every trailed body's position into its trail and publishes `day`, under one exclusive guard
fn close_day(ctx: &Context, day: u32) -> Result<usize, PhysicsError> {
    let mut guard = ctx.write();
    let state = &mut *guard;

    let pending: Vec<(Entity, Position)> = state.store.query::<(Position, Trail)>()
        .iter()
        .map(|(entity, (position, _))| (entity, *position))
        .collect();

    for (entity, position) in pending.iter() {
        state.store.get_mut::<Trail>(*entity)?.push(*position);
    }

    state.day = day;
    Ok(pending.len())
}

/// Runs the default schedule at `days_per_second`, see `Scheduler::run`
pub fn run_simulation(ctx: &Context, days_per_second: f64) -> Result<RunSummary, SimulationError> {
    let params = RunParams { days_per_second, ..RunParams::default() };
    Scheduler::new(&params)?.run(ctx)
}
