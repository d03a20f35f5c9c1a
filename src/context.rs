//! Shared Context
//!
//! Everything the simulation and its observers share sits behind one reader/writer lock. The run
//! status lives outside of it in an atomic so it can be polled without contending for the lock.
//!
//! Lock usage:
//! - the scheduler copies each step's input under a short shared guard, runs the force pass with no
//!   guard held, then commits under an exclusive guard
//! - camera, rotation and zoom changes take the exclusive guard
//! - readers take the shared guard and see only fully committed steps

use std::{sync::{atomic::{AtomicU8, Ordering}, RwLock, RwLockReadGuard, RwLockWriteGuard}, time::Duration};
use tracing::{info, warn};
use crate::{
    camera::{absolute_position, Follow, Rotation, ViewRadius},
    components::{Body, Color, PixelRadius, Tag, Trail},
    math::*,
    physics::{PhysicsError, StepInput},
    store::{Entity, Store, StoreError},
};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The store is still being populated
    Starting = 0,
    Running = 1,
    /// Terminal, every thread should wind down
    Stopped = 2,
}

impl Status {
    fn from_u8(raw: u8) -> Status {
        match raw {
            0 => Status::Starting,
            1 => Status::Running,
            _ => Status::Stopped,
        }
    }
}

/// `Status` cell that only ever moves forward: starting, running, stopped
#[derive(Debug)]
pub struct AtomicStatus(AtomicU8);

impl Default for AtomicStatus {
    fn default() -> Self {
        AtomicStatus(AtomicU8::new(Status::Starting as u8))
    }
}

impl AtomicStatus {
    pub fn load(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Starting to running. Fails if the status already moved on
    pub fn start(&self) -> Result<(), Status> {
        self.0
            .compare_exchange(Status::Starting as u8, Status::Running as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(Status::from_u8)
    }

    /// Moves to stopped from any state, returns the previous status
    pub fn stop(&self) -> Status {
        Status::from_u8(self.0.swap(Status::Stopped as u8, Ordering::AcqRel))
    }
}

/// Everything guarded by the context lock
#[derive(Debug)]
pub struct State {
    /// Only the integrator writes body state, see `Context::write`
    pub(crate) store: Store,
    pub follow: Follow,
    pub rotation: Rotation,
    pub view_radius: ViewRadius,
    /// Last completed simulated day
    pub day: u32,
    /// Simulated time since the run began
    pub elapsed: Time,
}

impl State {
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn origin(&self) -> Result<Position, StoreError> {
        absolute_position(&self.store, &self.follow)
    }

    /// Every named body with a position and a mass, in store order
    pub fn bodies(&self) -> Vec<BodySnapshot> {
        let store = &self.store;
        store.query::<(Tag, Position, Mass)>()
            .iter()
            .map(|(entity, (tag, position, mass))| BodySnapshot {
                entity,
                tag: tag.clone(),
                mass: *mass,
                position: *position,
                velocity: store.get::<Velocity>(entity).ok().copied(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodySnapshot {
    pub entity: Entity,
    pub tag: Tag,
    pub mass: Mass,
    pub position: Position,
    /// `None` for bodies that are massive but never move
    pub velocity: Option<Velocity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderBody {
    pub body: BodySnapshot,
    pub color: Color,
    pub pixel_radius: PixelRadius,
    /// Newest first
    pub trail: Vec<Position>,
}

/// Everything a renderer needs for one frame, read under a single shared guard
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub day: u32,
    pub elapsed: Time,
    pub origin: Position,
    pub rotation: Rotation,
    pub view_radius: Length,
    pub bodies: Vec<RenderBody>,
}

impl Frame {
    /// `position` relative to the camera origin, in the rotated view frame
    pub fn view_position(&self, position: Position) -> Position {
        (position - self.origin).rotated(&self.rotation.matrix())
    }
}

#[derive(Debug)]
pub struct Context {
    status: AtomicStatus,
    state: RwLock<State>,
}

impl Default for State {
    fn default() -> Self {
        State {
            store: Store::new(),
            follow: Follow::default(),
            rotation: Rotation::default(),
            view_radius: ViewRadius::new(Length(1.0), Length(0.0), Length(f64::MAX)),
            day: 0,
            elapsed: Time(0.0),
        }
    }
}

/// Spawns `bodies` into a fresh store and wraps it in a context that is still starting
pub fn create_context(bodies: &[Body], view_radius: ViewRadius) -> Result<Context, StoreError> {
    let mut store = Store::new();
    for body in bodies.iter() {
        body.spawn(&mut store)?;
    }

    info!(bodies = store.len(), view_radius = %view_radius.get(), "created context");
    Ok(Context::new(store, view_radius))
}

impl Context {
    pub fn new(store: Store, view_radius: ViewRadius) -> Self {
        Context {
            status: AtomicStatus::default(),
            state: RwLock::new(State {
                store,
                view_radius,
                ..State::default()
            }),
        }
    }

    pub fn status(&self) -> Status {
        self.status.load()
    }

    pub fn is_stopped(&self) -> bool {
        self.status() == Status::Stopped
    }

    pub fn start(&self) -> Result<(), Status> {
        self.status.start()
    }

    /// Asks every thread to stop, returns the previous status
    pub fn request_stop(&self) -> Status {
        let previous = self.status.stop();
        if previous != Status::Stopped {
            info!(?previous, "stop requested");
        }
        previous
    }

    /// Blocks until the status leaves `Starting`, returns the status it moved to
    pub fn wait_until_running(&self) -> Status {
        loop {
            match self.status() {
                Status::Starting => std::thread::sleep(Duration::from_micros(100)),
                status => return status,
            }
        }
    }

    /// Shared guard over the whole state
    ///
    /// A writer that panicked poisons the lock. The state it left behind is still a committed step
    /// so the guard is recovered.
    pub fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| {
            warn!("context lock poisoned, recovering shared guard");
            poisoned.into_inner()
        })
    }

    /// Exclusive guard over the whole state
    ///
    /// The integrator commits a step computed from positions read earlier, so body state is not
    /// writable through this guard outside of the crate. The camera and view fields are.
    pub fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| {
            warn!("context lock poisoned, recovering exclusive guard");
            poisoned.into_inner()
        })
    }

    /// One integration step
    ///
    /// The input is copied under a shared guard, the force pass runs with no guard held and the
    /// result is committed under the exclusive guard.
    pub fn advance(&self, dt: Time) -> Result<usize, PhysicsError> {
        // the shared guard is a temporary and is released at the end of this statement
        let input = StepInput::capture(&self.read().store);
        let buffer = input.compute(dt)?;

        let mut state = self.write();
        let moved = buffer.commit(&mut state.store)?;
        state.elapsed += dt;
        Ok(moved)
    }

    pub fn bodies(&self) -> Vec<BodySnapshot> {
        self.read().bodies()
    }

    pub fn trail(&self, entity: Entity) -> Result<Vec<Position>, StoreError> {
        Ok(self.read().store.get::<Trail>(entity)?.to_vec())
    }

    pub fn day(&self) -> u32 {
        self.read().day
    }

    pub fn elapsed(&self) -> Time {
        self.read().elapsed
    }

    pub fn follow(&self) -> Follow {
        self.read().follow
    }

    pub fn rotation(&self) -> Rotation {
        self.read().rotation
    }

    pub fn view_radius(&self) -> ViewRadius {
        self.read().view_radius
    }

    pub fn origin(&self) -> Result<Position, StoreError> {
        self.read().origin()
    }

    pub fn snapshot(&self) -> Result<Frame, StoreError> {
        let state = self.read();

        let bodies = state.bodies()
            .into_iter()
            .map(|body| {
                let store = &state.store;
                RenderBody {
                    color: store.get::<Color>(body.entity).copied().unwrap_or_default(),
                    pixel_radius: store.get::<PixelRadius>(body.entity).copied().unwrap_or_default(),
                    trail: store.get::<Trail>(body.entity).map(Trail::to_vec).unwrap_or_default(),
                    body,
                }
            })
            .collect();

        Ok(Frame {
            day: state.day,
            elapsed: state.elapsed,
            origin: state.origin()?,
            rotation: state.rotation,
            view_radius: state.view_radius.get(),
            bodies,
        })
    }

    /// Replaces the follow policy. A target must exist and have a position
    pub fn set_follow(&self, follow: Follow) -> Result<(), StoreError> {
        let mut state = self.write();
        if let Follow::Target { entity, .. } = follow {
            state.store.get::<Position>(entity)?;
        }
        state.follow = follow;
        Ok(())
    }

    pub fn follow_target(&self, entity: Entity) -> Result<(), StoreError> {
        self.set_follow(Follow::target(entity))
    }

    pub fn follow_center_of_mass(&self) {
        self.write().follow = Follow::center_of_mass();
    }

    /// Stops following and pins the origin at its current position, which is returned
    pub fn release_follow(&self) -> Result<Position, StoreError> {
        let mut state = self.write();
        let released = state.follow.released(&state.store)?;
        state.follow = released;
        Ok(released.offset())
    }

    pub fn pan(&self, displacement: Position) {
        self.write().follow.pan(displacement);
    }

    pub fn rotate(&self, delta: Rotation) -> Rotation {
        let mut state = self.write();
        state.rotation += delta;
        state.rotation
    }

    pub fn zoom(&self, delta: Length) -> Length {
        self.write().view_radius.zoom(delta)
    }

    pub fn set_view_radius(&self, radius: Length) -> Length {
        self.write().view_radius.set(radius)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    fn at(x: f64, y: f64) -> Position {
        Position::new(Length(x), Length(y), Length(0.0))
    }

    fn sample() -> Context {
        let bodies = [
            Body::new("Sun").with_mass(Mass(1000.0)),
            Body::new("Planet")
                .with_mass(Mass(1.0))
                .with_position(at(10.0, 0.0))
                .with_velocity(Velocity::new(Speed(0.0), Speed(1.0), Speed(0.0)))
                .with_trail(3)
                .with_color(Color::from_rgb(0x0000FF)),
        ];
        create_context(&bodies, ViewRadius::new(Length(20.0), Length(1.0), Length(100.0))).unwrap()
    }

    #[test]
    fn test_status_monotonic() {
        let status = AtomicStatus::default();
        assert_eq!(status.load(), Status::Starting);
        assert_eq!(status.start(), Ok(()));
        assert_eq!(status.load(), Status::Running);
        assert_eq!(status.start(), Err(Status::Running));

        assert_eq!(status.stop(), Status::Running);
        assert_eq!(status.stop(), Status::Stopped);
        assert_eq!(status.start(), Err(Status::Stopped));
        assert_eq!(status.load(), Status::Stopped);

        // stopping before the run began is also final
        let early = AtomicStatus::default();
        early.stop();
        assert_eq!(early.start(), Err(Status::Stopped));
    }

    #[test]
    fn test_create_context_rejects_negative_mass() {
        let bodies = [
            Body::new("Sun").with_mass(Mass(-1000.0)),
            Body::new("Planet").with_mass(Mass(1.0)).with_position(at(10.0, 0.0)).with_velocity(Velocity::zero()),
        ];
        let radius = ViewRadius::new(Length(20.0), Length(1.0), Length(100.0));
        assert!(matches!(
            create_context(&bodies, radius),
            Err(StoreError::InvalidBody { ref tag, .. }) if tag == "Sun"
        ));
    }

    #[test]
    fn test_wait_until_running() {
        let ctx = Arc::new(sample());
        let waiter = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || ctx.wait_until_running())
        };

        std::thread::sleep(Duration::from_millis(5));
        ctx.start().unwrap();
        assert_eq!(waiter.join().unwrap(), Status::Running);
    }

    #[test]
    fn test_snapshot() {
        let ctx = sample();
        let bodies = ctx.bodies();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0].tag.as_str(), "Sun");
        assert_eq!(bodies[0].velocity, None);
        assert!(bodies[1].velocity.is_some());

        let planet = bodies[1].entity;
        assert_eq!(ctx.trail(planet).unwrap(), vec![at(10.0, 0.0); 3]);
        assert!(ctx.trail(bodies[0].entity).is_err());

        ctx.set_follow(Follow::Fixed { offset: at(10.0, 0.0) }).unwrap();
        let frame = ctx.snapshot().unwrap();
        assert_eq!(frame.bodies.len(), 2);
        assert_eq!(frame.bodies[1].color, Color::from_rgb(0x0000FF));
        assert_eq!(frame.bodies[0].color, Color::WHITE);
        assert_eq!(frame.view_radius, Length(20.0));
        assert_eq!(frame.view_position(at(10.0, 0.0)), Position::zero());
    }

    #[test]
    fn test_camera_mutations() {
        let ctx = sample();
        let planet = ctx.bodies()[1].entity;

        ctx.follow_target(planet).unwrap();
        ctx.pan(at(0.0, 1.0));
        assert_eq!(ctx.origin().unwrap(), at(10.0, 1.0));

        ctx.advance(Time::hours(1.0)).unwrap();
        assert_ne!(ctx.origin().unwrap(), at(10.0, 1.0));

        let pinned = ctx.release_follow().unwrap();
        ctx.advance(Time::hours(1.0)).unwrap();
        assert_eq!(ctx.origin().unwrap(), pinned);
        assert_eq!(ctx.elapsed(), Time::hours(2.0));

        assert_eq!(ctx.zoom(Length(-50.0)), Length(1.0));
        assert_eq!(ctx.set_view_radius(Length(30.0)), Length(30.0));
        assert_eq!(ctx.rotate(-Rotation::new(1, 2)), Rotation::new(255, 254));

        let ghost = {
            let mut state = ctx.write();
            let entity = state.store.create();
            state.store.destroy(entity).unwrap();
            entity
        };
        assert_eq!(ctx.follow_target(ghost), Err(StoreError::InvalidEntity(ghost)));
        assert_eq!(ctx.follow(), Follow::Fixed { offset: pinned });
    }

    #[test]
    fn test_poisoned_lock_recovers() {
        let ctx = Arc::new(sample());
        let writer = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || {
                let _guard = ctx.write();
                panic!("writer died");
            })
        };
        assert!(writer.join().is_err());

        assert_eq!(ctx.bodies().len(), 2);
        assert_eq!(ctx.zoom(Length(1.0)), Length(21.0));
    }

    #[test]
    fn test_force_pass_runs_unlocked() {
        // a crowd of movers on a grid, so the force pass dominates the step
        let bodies: Vec<Body> = (0..1600)
            .map(|i| {
                Body::new("dust")
                    .with_mass(Mass(1.0))
                    .with_position(at((i % 40) as f64, (i / 40) as f64))
                    .with_velocity(Velocity::zero())
            })
            .collect();
        let ctx = Arc::new(create_context(&bodies, ViewRadius::new(Length(20.0), Length(1.0), Length(100.0))).unwrap());
        let started = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let stepper = {
            let (ctx, started) = (Arc::clone(&ctx), Arc::clone(&started));
            std::thread::spawn(move || {
                started.store(true, Ordering::Release);
                let begin = std::time::Instant::now();
                ctx.advance(Time::hours(1.0)).unwrap();
                begin.elapsed()
            })
        };

        while !started.load(Ordering::Acquire) {
            std::thread::yield_now();
        }
        std::thread::sleep(Duration::from_millis(2));

        let begin = std::time::Instant::now();
        assert_eq!(ctx.zoom(Length(5.0)), Length(25.0));
        ctx.rotate(Rotation::new(1, 0));
        let blocked = begin.elapsed();

        let step = stepper.join().unwrap();
        assert!(blocked < step / 2, "camera blocked {:?} during a {:?} step", blocked, step);

        // camera changes made mid step survive the commit
        assert_eq!(ctx.view_radius().get(), Length(25.0));
        assert_eq!(ctx.rotation(), Rotation::new(1, 0));
        assert_eq!(ctx.elapsed(), Time::hours(1.0));
    }

    #[test]
    fn test_concurrent_readers() {
        let ctx = Arc::new(sample());
        ctx.start().unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || {
                    let mut frames = 0;
                    while !ctx.is_stopped() {
                        let frame = ctx.snapshot().unwrap();
                        // a trail is only ever pushed whole, so its length never changes
                        assert_eq!(frame.bodies[1].trail.len(), 3);
                        frames += 1;
                    }
                    frames
                })
            })
            .collect();

        for _ in 0..200 {
            ctx.advance(Time::minutes(10.0)).unwrap();
        }
        ctx.request_stop();

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(ctx.elapsed(), Time::minutes(2000.0));
    }
}
