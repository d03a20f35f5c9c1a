//! Entity Store
//!
//! Column-oriented component storage. Each component type lives in its own `SparseSet` keyed by
//! entity index, and every entity handle carries the generation of its slot so handles to destroyed
//! entities are detected instead of silently aliasing a newer entity.

use std::{any::{type_name, Any, TypeId}, collections::HashMap, fmt::{Debug, Display}, marker::PhantomData};
use crate::collections::{SparseSet, UnsafeAnyExt};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("entity {0} does not exist")]
    InvalidEntity(Entity),
    #[error("entity {entity} has no `{component}` component")]
    MissingComponent { entity: Entity, component: &'static str },
    #[error("component `{0}` was requested more than once")]
    AliasedComponent(&'static str),
    #[error("body `{tag}` {reason}")]
    InvalidBody { tag: String, reason: &'static str },
}

pub trait Component: Debug + Send + Sync + 'static {}
impl<T> Component for T where T: Debug + Send + Sync + 'static {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

trait ErasedSet: Send + Sync {
    fn remove_key(&mut self, key: usize) -> bool;
    fn keys(&self) -> &[usize];
    fn as_any(&self) -> &(dyn Any + Send + Sync);
    fn as_any_mut(&mut self) -> &mut (dyn Any + Send + Sync);
}

impl<T: Component> ErasedSet for SparseSet<T> {
    fn remove_key(&mut self, key: usize) -> bool {
        self.remove(key).is_some()
    }

    fn keys(&self) -> &[usize] {
        SparseSet::keys(self)
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn as_any_mut(&mut self) -> &mut (dyn Any + Send + Sync) {
        self
    }
}

struct ComponentSet {
    name: &'static str,
    set: Box<dyn ErasedSet>,
}

impl ComponentSet {
    fn new<T: Component>() -> Self {
        ComponentSet {
            name: type_name::<T>(),
            set: Box::new(SparseSet::<T>::new()),
        }
    }

    fn len(&self) -> usize {
        self.set.keys().len()
    }

    // Safety: the caller guarantees the set was created by `ComponentSet::new::<T>`. The store upholds
    // this by keying every set with the `TypeId` of its component
    unsafe fn raw_set_unchecked<T: Component>(&self) -> &SparseSet<T> {
        UnsafeAnyExt::downcast_ref_unchecked::<SparseSet<T>>(self.set.as_any())
    }

    unsafe fn raw_set_mut_unchecked<T: Component>(&mut self) -> &mut SparseSet<T> {
        UnsafeAnyExt::downcast_mut_unchecked::<SparseSet<T>>(self.set.as_any_mut())
    }
}

impl Debug for ComponentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSet").field("name", &self.name).field("len", &self.len()).finish()
    }
}

#[derive(Debug, Default)]
pub struct Store {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,
    sets: HashMap<TypeId, ComponentSet>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// New entity handle with no components attached
    pub fn create(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            self.alive[index as usize] = true;
            return Entity { index, generation: self.generations[index as usize] }
        }

        let index = self.generations.len() as u32;
        self.generations.push(0);
        self.alive.push(true);
        Entity { index, generation: 0 }
    }

    /// Removes every component of `entity` and retires the handle
    pub fn destroy(&mut self, entity: Entity) -> Result<(), StoreError> {
        let index = self.index_of(entity)?;

        for set in self.sets.values_mut() {
            set.set.remove_key(index);
        }

        self.alive[index] = false;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free.push(entity.index);
        Ok(())
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.index_of(entity).is_ok()
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.alive.iter().filter(|alive| **alive).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive.iter().enumerate().filter(|(_, alive)| **alive).map(move |(index, _)| Entity {
            index: index as u32,
            generation: self.generations[index],
        })
    }

    /// Attaches `component` to `entity`, returning the component it replaced
    pub fn attach<T: Component>(&mut self, entity: Entity, component: T) -> Result<Option<T>, StoreError> {
        let index = self.index_of(entity)?;
        let set = self.sets.entry(TypeId::of::<T>()).or_insert_with(ComponentSet::new::<T>);

        // Safety: keyed by TypeId::of::<T>()
        let set = unsafe { set.raw_set_mut_unchecked::<T>() };
        Ok(set.insert_with(index, component))
    }

    /// Detaches and returns the `T` component of `entity`
    pub fn detach<T: Component>(&mut self, entity: Entity) -> Result<T, StoreError> {
        let index = self.index_of(entity)?;
        self.set_mut::<T>()
            .and_then(|set| set.remove(index))
            .ok_or(StoreError::MissingComponent { entity, component: type_name::<T>() })
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        match (self.index_of(entity), self.set::<T>()) {
            (Ok(index), Some(set)) => set.contains(index),
            _ => false,
        }
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T, StoreError> {
        let index = self.index_of(entity)?;
        self.set::<T>()
            .and_then(|set| set.get(index))
            .ok_or(StoreError::MissingComponent { entity, component: type_name::<T>() })
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, StoreError> {
        let index = self.index_of(entity)?;
        self.set_mut::<T>()
            .and_then(|set| set.get_mut(index))
            .ok_or(StoreError::MissingComponent { entity, component: type_name::<T>() })
    }

    /// Shared references to several components of one entity, e.g. `fetch::<(Position, Mass)>(e)`
    pub fn fetch<Q: Fetch>(&self, entity: Entity) -> Result<Q::Item<'_>, StoreError> {
        Q::fetch_entity(self, entity)
    }

    /// Mutable references to several distinct components of one entity
    pub fn fetch_mut<Q: FetchMut>(&mut self, entity: Entity) -> Result<Q::Item<'_>, StoreError> {
        Q::fetch_entity_mut(self, entity)
    }

    /// Lazy sequence of every entity holding all of `Q`'s components
    ///
    /// Iteration is driven by the least populated of the requested sets, in that set's packed order.
    /// The returned `Query` can be iterated any number of times
    pub fn query<Q: Fetch>(&self) -> Query<'_, Q> {
        let mut driver: Option<&[usize]> = None;

        for id in Q::type_ids() {
            let keys = match self.sets.get(&id) {
                Some(set) => set.set.keys(),
                None => &[],
            };

            if driver.map_or(true, |current| keys.len() < current.len()) {
                driver = Some(keys);
            }
        }

        Query {
            store: self,
            keys: driver.unwrap_or(&[]),
            _fetch: PhantomData,
        }
    }

    fn index_of(&self, entity: Entity) -> Result<usize, StoreError> {
        let index = entity.index as usize;
        match (self.alive.get(index), self.generations.get(index)) {
            (Some(true), Some(generation)) if *generation == entity.generation => Ok(index),
            _ => Err(StoreError::InvalidEntity(entity)),
        }
    }

    fn entity_at(&self, index: usize) -> Entity {
        Entity { index: index as u32, generation: self.generations[index] }
    }

    fn set<T: Component>(&self) -> Option<&SparseSet<T>> {
        // Safety: keyed by TypeId::of::<T>()
        self.sets.get(&TypeId::of::<T>()).map(|set| unsafe { set.raw_set_unchecked::<T>() })
    }

    fn set_mut<T: Component>(&mut self) -> Option<&mut SparseSet<T>> {
        // Safety: keyed by TypeId::of::<T>()
        self.sets.get_mut(&TypeId::of::<T>()).map(|set| unsafe { set.raw_set_mut_unchecked::<T>() })
    }
}

/// A tuple of component types that can be read together
pub trait Fetch: 'static {
    type Item<'a>;

    fn type_ids() -> Vec<TypeId>;
    fn fetch_index(store: &Store, index: usize) -> Option<Self::Item<'_>>;
    fn fetch_entity(store: &Store, entity: Entity) -> Result<Self::Item<'_>, StoreError>;
}

/// A tuple of distinct component types that can be written together
pub trait FetchMut: 'static {
    type Item<'a>;

    fn fetch_entity_mut(store: &mut Store, entity: Entity) -> Result<Self::Item<'_>, StoreError>;
}

macro_rules! impl_fetch {
    ($(($t:ident, $slot:ident)),+) => {
        impl<$($t: Component),+> Fetch for ($($t,)+) {
            type Item<'a> = ($(&'a $t,)+);

            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$t>()),+]
            }

            fn fetch_index(store: &Store, index: usize) -> Option<Self::Item<'_>> {
                Some(($(store.set::<$t>()?.get(index)?,)+))
            }

            fn fetch_entity(store: &Store, entity: Entity) -> Result<Self::Item<'_>, StoreError> {
                Ok(($(store.get::<$t>(entity)?,)+))
            }
        }

        impl<$($t: Component),+> FetchMut for ($($t,)+) {
            type Item<'a> = ($(&'a mut $t,)+);

            fn fetch_entity_mut(store: &mut Store, entity: Entity) -> Result<Self::Item<'_>, StoreError> {
                let index = store.index_of(entity)?;

                let ids = [$(TypeId::of::<$t>()),+];
                let names = [$(type_name::<$t>()),+];
                for i in 0..ids.len() {
                    if ids[..i].contains(&ids[i]) {
                        return Err(StoreError::AliasedComponent(names[i]));
                    }
                }

                // each set is handed out at most once, so the borrows are disjoint
                $(let mut $slot: Option<&mut SparseSet<$t>> = None;)+
                for (id, set) in store.sets.iter_mut() {
                    $(
                        if *id == TypeId::of::<$t>() {
                            // Safety: keyed by TypeId::of::<$t>()
                            $slot = Some(unsafe { set.raw_set_mut_unchecked::<$t>() });
                            continue;
                        }
                    )+
                }

                Ok(($(
                    $slot.and_then(|set| set.get_mut(index))
                        .ok_or(StoreError::MissingComponent { entity, component: type_name::<$t>() })?,
                )+))
            }
        }
    };
}

impl_fetch!((A, a));
impl_fetch!((A, a), (B, b));
impl_fetch!((A, a), (B, b), (C, c));
impl_fetch!((A, a), (B, b), (C, c), (D, d));
impl_fetch!((A, a), (B, b), (C, c), (D, d), (E, e));
impl_fetch!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f));

pub struct Query<'a, Q: Fetch> {
    store: &'a Store,
    keys: &'a [usize],
    _fetch: PhantomData<fn() -> Q>,
}

impl<'a, Q: Fetch> Query<'a, Q> {
    pub fn iter(&self) -> QueryIter<'a, Q> {
        QueryIter {
            store: self.store,
            keys: self.keys.iter(),
            _fetch: PhantomData,
        }
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + 'a {
        self.iter().map(|(entity, _)| entity)
    }
}

impl<'q, 'a, Q: Fetch> IntoIterator for &'q Query<'a, Q> {
    type Item = (Entity, Q::Item<'a>);
    type IntoIter = QueryIter<'a, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct QueryIter<'a, Q: Fetch> {
    store: &'a Store,
    keys: std::slice::Iter<'a, usize>,
    _fetch: PhantomData<fn() -> Q>,
}

impl<'a, Q: Fetch> Iterator for QueryIter<'a, Q> {
    type Item = (Entity, Q::Item<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        for &index in self.keys.by_ref() {
            if let Some(item) = Q::fetch_index(self.store, index) {
                return Some((self.store.entity_at(index), item));
            }
        }
        None
    }
}
