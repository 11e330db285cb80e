//! Ordered in-memory rider store.
//!
//! Order is meaningful: after a recalculation it is the result order, and
//! ties in the next sort fall back to it.
use crate::rider::{Bib, DnfCode, Rider};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RiderRegistry {
    riders: Vec<Rider>,
}

impl RiderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.riders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.riders.is_empty()
    }

    pub fn position(&self, bib: &Bib) -> Option<usize> {
        self.riders.iter().position(|r| &r.bib == bib)
    }

    pub fn contains(&self, bib: &Bib) -> bool {
        self.position(bib).is_some()
    }

    pub fn get(&self, bib: &Bib) -> Option<&Rider> {
        self.riders.iter().find(|r| &r.bib == bib)
    }

    pub fn get_mut(&mut self, bib: &Bib) -> Option<&mut Rider> {
        self.riders.iter_mut().find(|r| &r.bib == bib)
    }

    /// Appends a rider; returns `false` if the bib is already registered.
    pub fn add(&mut self, rider: Rider) -> bool {
        if self.contains(&rider.bib) {
            return false;
        }
        self.riders.push(rider);
        true
    }

    pub fn remove(&mut self, bib: &Bib) -> Option<Rider> {
        let idx = self.position(bib)?;
        Some(self.riders.remove(idx))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rider> {
        self.riders.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Rider> {
        self.riders.iter_mut()
    }

    pub fn as_slice(&self) -> &[Rider] {
        &self.riders
    }

    /// Stable sort by `key`, ties keep the current order.
    pub fn sort_by_cached_key<K: Ord>(&mut self, key: impl FnMut(&Rider) -> K) {
        self.riders.sort_by_cached_key(key);
    }

    /// Registered bibs in model order.
    pub fn startlist(&self) -> Vec<Bib> {
        self.riders.iter().map(|r| r.bib.clone()).collect()
    }

    /// Riders who took the start: not marked dns, or still in the race.
    pub fn starters(&self) -> Vec<Bib> {
        self.riders
            .iter()
            .filter(|r| r.comment != Some(DnfCode::Dns) || r.in_race)
            .map(|r| r.bib.clone())
            .collect()
    }
}

impl<'a> IntoIterator for &'a RiderRegistry {
    type Item = &'a Rider;
    type IntoIter = std::slice::Iter<'a, Rider>;

    fn into_iter(self) -> Self::IntoIter {
        self.riders.iter()
    }
}
