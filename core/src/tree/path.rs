//! Absolute addresses of items.
//!
//! A [`Path`] is the sequence of ids leading from the workspace root to an
//! item. Paths are immutable and cheap to clone; extending one shares the
//! prefix until it is written to.

use super::ids::{Id, Names};
use core::fmt;
use ecow::EcoVec;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Path(EcoVec<Id>);

impl Path {
    /// The workspace root.
    pub fn root() -> Self {
        Path(EcoVec::new())
    }

    pub fn from_ids(ids: &[Id]) -> Self {
        Path(ids.iter().copied().collect())
    }

    pub fn ids(&self) -> &[Id] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<Id> {
        self.0.last().copied()
    }

    pub fn child(&self, id: Id) -> Path {
        let mut ids = self.0.clone();
        ids.push(id);
        Path(ids)
    }

    pub fn parent(&self) -> Option<Path> {
        let (_, rest) = self.0.split_last()?;
        Some(Path::from_ids(rest))
    }

    pub fn prefix(&self, len: usize) -> Path {
        Path::from_ids(&self.0[..len.min(self.len())])
    }

    /// Proper prefix test: `self` is a strict ancestor of `other`.
    pub fn contains(&self, other: &Path) -> bool {
        self.len() < other.len() && other.0.starts_with(&self.0)
    }

    pub fn contains_or_equals(&self, other: &Path) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Either path contains the other.
    pub fn overlaps(&self, other: &Path) -> bool {
        self.contains_or_equals(other) || other.contains_or_equals(self)
    }

    /// Proper prefix test that only descends through values, never into metadata.
    pub fn contains_data(&self, other: &Path) -> bool {
        self.contains(other) && !other.0[self.len()..].iter().any(|id| id.is_meta())
    }

    pub fn common_prefix_len(&self, other: &Path) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Ids of `self` below the ancestor `base`.
    pub fn suffix_after(&self, base: &Path) -> Option<&[Id]> {
        base.contains_or_equals(self).then(|| &self.0[base.len()..])
    }

    /// Index just past the last metadata step, or zero if there is none.
    pub fn value_world_start(&self) -> usize {
        self.0
            .iter()
            .rposition(|id| id.is_meta())
            .map_or(0, |index| index + 1)
    }

    pub fn in_metadata(&self) -> bool {
        self.0.iter().any(|id| id.is_meta())
    }

    pub fn join(&self, ids: &[Id]) -> Path {
        let mut path = self.0.clone();
        path.extend_from_slice(ids);
        Path(path)
    }

    /// Rewrites a path under a copy of the subtree at `translation.from`.
    ///
    /// Paths inside (or equal to) the source move under the destination;
    /// anything else is returned unchanged.
    pub fn translate(&self, translation: &Translation) -> Path {
        match self.suffix_after(&translation.from) {
            Some(rest) => translation.to.join(rest),
            None => self.clone(),
        }
    }

    pub fn display<'a>(&'a self, names: &'a Names) -> PathDisplay<'a> {
        PathDisplay { path: self, names }
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path{:?}", self.0.as_slice())
    }
}

/// Source and destination of a subtree copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub from: Path,
    pub to: Path,
}

impl Translation {
    pub fn new(from: Path, to: Path) -> Self {
        Translation { from, to }
    }
}

pub struct PathDisplay<'a> {
    path: &'a Path,
    names: &'a Names,
}

impl fmt::Display for PathDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return f.write_str("/");
        }
        for (index, id) in self.path.ids().iter().enumerate() {
            let separator = if index == 0 { "/" } else { "." };
            write!(f, "{}{}", separator, self.names.display(*id))?;
        }
        Ok(())
    }
}
