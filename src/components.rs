use std::{collections::VecDeque, fmt::Display};
use crate::{math::*, store::{Entity, Store, StoreError}};

/// Display name of a body, fixed at creation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub String);

impl Tag {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

/// Render hint, 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color { r: 0xFF, g: 0xFF, b: 0xFF };

    /// From a packed `0xRRGGBB` value, higher bits are ignored
    pub fn from_rgb(rgb: u32) -> Self {
        Color {
            r: ((rgb >> 16) & 0xFF) as u8,
            g: ((rgb >> 8) & 0xFF) as u8,
            b: (rgb & 0xFF) as u8,
        }
    }

    pub fn to_rgb(&self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | (self.b as u32)
    }
}

impl Default for Color {
    fn default() -> Self { Color::WHITE }
}

/// Render hint, on-screen radius in pixels
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct PixelRadius(pub f32);

impl Default for PixelRadius {
    fn default() -> Self { PixelRadius(1.0) }
}

/// Fixed-capacity history of past positions, newest first
///
/// Pushing into a full trail evicts the oldest position, so the length never exceeds the capacity
/// chosen at creation and never shrinks.
#[derive(Debug, Clone, PartialEq)]
pub struct Trail {
    points: VecDeque<Position>,
    capacity: usize,
}

impl Trail {
    /// Empty trail that grows until it holds `capacity` positions
    pub fn new(capacity: usize) -> Self {
        Trail {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Full trail where every entry is `origin`
    pub fn filled(capacity: usize, origin: Position) -> Self {
        Trail {
            points: std::iter::repeat(origin).take(capacity).collect(),
            capacity,
        }
    }

    /// Records `position` as the newest entry, returns the evicted oldest one if the trail was full
    pub fn push(&mut self, position: Position) -> Option<Position> {
        if self.capacity == 0 {
            return None
        }

        let evicted = if self.points.len() == self.capacity {
            self.points.pop_back()
        } else {
            None
        };

        self.points.push_front(position);
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn newest(&self) -> Option<&Position> {
        self.points.front()
    }

    pub fn oldest(&self) -> Option<&Position> {
        self.points.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Position> + ExactSizeIterator + '_ {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<Position> {
        self.points.iter().copied().collect()
    }
}

/// Initial description of a body, spawned into a `Store`
///
/// A body always has a position and a mass, so it is massive. Only bodies given a velocity are
/// movable and get advanced by the integrator.
#[derive(Debug, Clone)]
pub struct Body {
    tag: Tag,
    mass: Mass,
    position: Position,
    velocity: Option<Velocity>,
    trail_capacity: usize,
    color: Option<Color>,
    pixel_radius: Option<PixelRadius>,
}

impl Body {
    pub fn new(tag: &str) -> Self {
        Body {
            tag: Tag(String::from(tag)),
            mass: Mass(0.0),
            position: Position::zero(),
            velocity: None,
            trail_capacity: 0,
            color: None,
            pixel_radius: None,
        }
    }

    pub fn with_mass(mut self, mass: Mass) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_velocity(mut self, velocity: Velocity) -> Self {
        self.velocity = Some(velocity);
        self
    }

    /// Tracks the last `capacity` daily positions, zero disables the trail
    pub fn with_trail(mut self, capacity: usize) -> Self {
        self.trail_capacity = capacity;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_pixel_radius(mut self, radius: PixelRadius) -> Self {
        self.pixel_radius = Some(radius);
        self
    }

    /// Shifts this body's position and velocity into `parent`'s frame of reference
    ///
    /// A body without a velocity of its own rides along with a moving parent.
    pub fn relative_to(mut self, parent: &Body) -> Self {
        self.position += parent.position;
        self.velocity = match (self.velocity, parent.velocity) {
            (Some(velocity), Some(parent_velocity)) => Some(velocity + parent_velocity),
            (None, parent_velocity) => parent_velocity,
            (velocity, None) => velocity,
        };
        self
    }

    pub fn tag(&self) -> &Tag { &self.tag }
    pub fn mass(&self) -> Mass { self.mass }
    pub fn position(&self) -> Position { self.position }
    pub fn velocity(&self) -> Option<Velocity> { self.velocity }
    pub fn trail_capacity(&self) -> usize { self.trail_capacity }

    /// Rejects bodies the integrator cannot advance. A negative mass would repel
    pub fn validate(&self) -> Result<(), StoreError> {
        let invalid = |reason| Err(StoreError::InvalidBody { tag: self.tag.0.clone(), reason });

        if !(self.mass.value() >= 0.0) || !self.mass.value().is_finite() {
            return invalid("has a negative or non-finite mass");
        }
        if !self.position.is_finite() {
            return invalid("has a non-finite position");
        }
        if self.velocity.map_or(false, |v| !v.is_finite()) {
            return invalid("has a non-finite velocity");
        }
        Ok(())
    }

    /// Creates the entity and attaches every component this body describes
    ///
    /// Nothing is created for an invalid body.
    pub fn spawn(&self, store: &mut Store) -> Result<Entity, StoreError> {
        self.validate()?;
        let entity = store.create();

        store.attach(entity, self.tag.clone())?;
        store.attach(entity, self.position)?;
        store.attach(entity, self.mass)?;

        if let Some(velocity) = self.velocity {
            store.attach(entity, velocity)?;
        }
        if self.trail_capacity > 0 {
            store.attach(entity, Trail::filled(self.trail_capacity, self.position))?;
        }
        if let Some(color) = self.color {
            store.attach(entity, color)?;
        }
        if let Some(radius) = self.pixel_radius {
            store.attach(entity, radius)?;
        }

        Ok(entity)
    }
}
