use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// Mesh generations a cached quantity was derived from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GenerationKey {
    pub topology: u64,
    pub geometry: u64,
    pub coupling: u64,
}

#[derive(Debug)]
struct Entry {
    key: GenerationKey,
    data: Rc<dyn Any>,
}

/// A cache of type-erased derived quantities, each stamped with the generations it was
/// computed from.
///
/// An entry is recomputed whenever it is requested with a key that differs from the stored
/// one, so invalidation never relies on explicit notifications. At most one entry per type
/// is kept.
#[derive(Debug, Default)]
pub struct GenerationCache {
    entries: RefCell<Vec<Entry>>,
}

impl GenerationCache {
    pub fn get_or_compute<D, F>(&self, key: GenerationKey, compute: F) -> Rc<D>
    where
        D: 'static,
        F: FnOnce() -> D,
    {
        // Lookups of the same type tend to repeat, so search from the most recent entry
        let existing_idx = self
            .entries
            .borrow()
            .iter()
            .rposition(|entry| entry.data.is::<D>());

        if let Some(idx) = existing_idx {
            let entries = self.entries.borrow();
            if entries[idx].key == key {
                return Rc::clone(&entries[idx].data)
                    .downcast()
                    .expect("Internal error: Downcasting can by definition not fail");
            }
        }

        // The borrow is released while computing, so that `compute` may itself use the cache
        let data = Rc::new(compute());
        let mut entries = self.entries.borrow_mut();
        let entry = Entry {
            key,
            data: Rc::clone(&data) as Rc<dyn Any>,
        };
        match entries.iter().rposition(|entry| entry.data.is::<D>()) {
            Some(idx) => entries[idx] = entry,
            None => entries.push(entry),
        }
        data
    }

    /// Fallible variant of [`get_or_compute`](Self::get_or_compute). Failures are not cached.
    pub fn try_get_or_compute<D, E, F>(&self, key: GenerationKey, compute: F) -> Result<Rc<D>, E>
    where
        D: 'static,
        F: FnOnce() -> Result<D, E>,
    {
        if let Some(data) = self.lookup::<D>(key) {
            return Ok(data);
        }
        let data = compute()?;
        Ok(self.get_or_compute(key, || data))
    }

    fn lookup<D: 'static>(&self, key: GenerationKey) -> Option<Rc<D>> {
        let entries = self.entries.borrow();
        entries
            .iter()
            .rev()
            .find(|entry| entry.data.is::<D>() && entry.key == key)
            .map(|entry| {
                Rc::clone(&entry.data)
                    .downcast()
                    .expect("Internal error: Downcasting can by definition not fail")
            })
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
