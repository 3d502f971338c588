//! Copy provenance of container values.
//!
//! Every block and array value carries a [`ValueId`]. Copying a value mints a
//! new id whose source is the original; mutating a value mints an id with no
//! source, which breaks the chain on purpose.

/// Handle of a container value in the provenance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(u32);

impl ValueId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default, Clone)]
pub struct Provenance {
    sources: Vec<Option<ValueId>>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for a value created from scratch or by mutation.
    pub fn fresh(&mut self) -> ValueId {
        let vid = ValueId(self.sources.len() as u32);
        self.sources.push(None);
        vid
    }

    /// Id for an unmodified copy of `source`.
    pub fn copied_from(&mut self, source: ValueId) -> ValueId {
        let vid = ValueId(self.sources.len() as u32);
        self.sources.push(Some(source));
        vid
    }

    pub(crate) fn len(&self) -> usize {
        self.sources.len()
    }

    /// Forgets every id minted after the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.sources.truncate(len);
    }

    pub fn source(&self, vid: ValueId) -> Option<ValueId> {
        self.sources.get(vid.0 as usize).copied().flatten()
    }

    /// Walks at most `max_depth` source links from `vid` looking for `ancestor`.
    pub fn is_copy_of(&self, vid: ValueId, ancestor: ValueId, max_depth: usize) -> bool {
        let mut current = vid;
        for _ in 0..=max_depth {
            if current == ancestor {
                return true;
            }
            match self.source(current) {
                Some(source) => current = source,
                None => return false,
            }
        }
        false
    }
}
