//! Place lists: ordered groups of bibs where a group is a dead heat.
//!
//! Text form separates groups with whitespace and joins dead-heated riders
//! with `-`, so `"1 2 3-4"` places 1 and 2 alone and 3 and 4 together.
use std::fmt;

use crate::rider::Bib;

/// Bib used to hold a place for a rider not yet identified.
pub const PLACEHOLDER: &str = "x";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaceList {
    groups: Vec<Vec<Bib>>,
}

impl PlaceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses place text, tolerating spaces around the dead-heat joiner.
    pub fn parse(text: &str) -> Self {
        let mut joined = String::with_capacity(text.len());
        let mut pending_space = false;
        for c in text.trim().chars() {
            if c.is_whitespace() {
                pending_space = true;
                continue;
            }
            if c == '-' {
                while joined.ends_with(' ') {
                    joined.pop();
                }
                joined.push('-');
                pending_space = false;
                continue;
            }
            if pending_space && !joined.is_empty() && !joined.ends_with('-') {
                joined.push(' ');
            }
            pending_space = false;
            joined.push(c);
        }

        let groups = joined
            .split(' ')
            .map(|group| {
                group
                    .split('-')
                    .filter(|bib| !bib.is_empty())
                    .map(Bib::new)
                    .collect::<Vec<_>>()
            })
            .filter(|group| !group.is_empty())
            .collect();
        Self { groups }
    }

    pub fn from_groups(groups: Vec<Vec<Bib>>) -> Self {
        Self {
            groups: groups.into_iter().filter(|g| !g.is_empty()).collect(),
        }
    }

    pub fn groups(&self) -> &[Vec<Bib>] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every bib in order, dead heats flattened.
    pub fn bibs(&self) -> impl Iterator<Item = &Bib> {
        self.groups.iter().flatten()
    }

    pub fn contains(&self, bib: &Bib) -> bool {
        self.bibs().any(|b| b == bib)
    }

    /// Bibs listed more than once, placeholders excepted.
    pub fn duplicates(&self) -> Vec<Bib> {
        let mut seen: Vec<&Bib> = Vec::new();
        let mut dupes = Vec::new();
        for bib in self.bibs().filter(|b| !b.is_placeholder()) {
            if seen.contains(&bib) {
                if !dupes.contains(bib) {
                    dupes.push(bib.clone());
                }
            } else {
                seen.push(bib);
            }
        }
        dupes
    }

    /// Removes `bib` everywhere it appears, dropping emptied groups.
    pub fn remove(&mut self, bib: &Bib) -> bool {
        let before = self.bibs().count();
        for group in &mut self.groups {
            group.retain(|b| b != bib);
        }
        self.groups.retain(|g| !g.is_empty());
        before != self.bibs().count()
    }

    /// Exchanges the positions of two bibs. Both must be present.
    pub fn swap(&mut self, first: &Bib, second: &Bib) -> bool {
        if first == second || !self.contains(first) || !self.contains(second) {
            return false;
        }
        for bib in self.groups.iter_mut().flatten() {
            if bib == first {
                *bib = second.clone();
            } else if bib == second {
                *bib = first.clone();
            }
        }
        true
    }

    /// Keeps only bibs matching `keep`, preserving dead-heat groups.
    pub fn filtered(&self, mut keep: impl FnMut(&Bib) -> bool) -> Self {
        let groups = self
            .groups
            .iter()
            .map(|group| group.iter().filter(|b| keep(b)).cloned().collect())
            .collect();
        Self::from_groups(groups)
    }
}

impl fmt::Display for PlaceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, group) in self.groups.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            for (pos, bib) in group.iter().enumerate() {
                if pos > 0 {
                    f.write_str("-")?;
                }
                f.write_str(bib.as_str())?;
            }
        }
        Ok(())
    }
}

impl From<Vec<Bib>> for PlaceList {
    fn from(bibs: Vec<Bib>) -> Self {
        Self::from_groups(bibs.into_iter().map(|b| vec![b]).collect())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for PlaceList {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for PlaceList {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bib(text: &str) -> Bib {
        Bib::new(text)
    }

    #[test]
    fn parse_normalises_dead_heat_spacing() {
        let places = PlaceList::parse("  1 2   3 - 4 5-6 ");
        assert_eq!(places.to_string(), "1 2 3-4 5-6");
        assert_eq!(places.groups().len(), 4);
        assert_eq!(places.groups()[2], vec![bib("3"), bib("4")]);
    }

    #[test]
    fn duplicates_ignore_placeholders() {
        let places = PlaceList::parse("1 x 2 x 1-3");
        assert_eq!(places.duplicates(), vec![bib("1")]);
    }

    #[test]
    fn remove_drops_empty_groups() {
        let mut places = PlaceList::parse("1 2-3 4");
        assert!(places.remove(&bib("1")));
        assert!(places.remove(&bib("3")));
        assert!(!places.remove(&bib("9")));
        assert_eq!(places.to_string(), "2 4");
    }

    #[test]
    fn swap_exchanges_positions_across_groups() {
        let mut places = PlaceList::parse("1 2-3 4");
        assert!(places.swap(&bib("1"), &bib("3")));
        assert_eq!(places.to_string(), "3 2-1 4");
        assert!(!places.swap(&bib("1"), &bib("7")));
    }

    #[test]
    fn filtered_keeps_group_shape() {
        let places = PlaceList::parse("1 2-3 4-5");
        let odd = places.filtered(|b| b.as_str().parse::<u32>().is_ok_and(|n| n % 2 == 1));
        assert_eq!(odd.to_string(), "1 3 5");
    }
}
