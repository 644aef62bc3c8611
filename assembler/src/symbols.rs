use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Instruction arguments are 16 bits wide, so no table may grow past this.
pub const MAX_ENTRIES: usize = 1 << 16;

/// Which of the four tables an argument indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Constants,
    Names,
    Varnames,
    Freevars,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TableKind::Constants => "constants",
            TableKind::Names => "names",
            TableKind::Varnames => "varnames",
            TableKind::Freevars => "freevars",
        })
    }
}

/// An ordered, duplicate-free table with constant-time reverse lookup.
///
/// Entries keep their insertion index forever; the table only ever grows
/// (rollback of a failed assembly call aside).
#[derive(Debug, Clone)]
pub struct SymbolTable<T> {
    items: Vec<T>,
    index: HashMap<T, usize>,
}

impl<T> Default for SymbolTable<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> SymbolTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, value: &T) -> Option<usize> {
        self.index.get(value).copied()
    }

    /// Index of `value`, appending it if absent.
    ///
    /// Returns `None` if the value is new and the table is already full.
    pub fn find_or_insert(&mut self, value: T) -> Option<u16> {
        if let Some(idx) = self.find(&value) {
            return u16::try_from(idx).ok();
        }
        let idx = self.items.len();
        if idx >= MAX_ENTRIES {
            return None;
        }
        self.index.insert(value.clone(), idx);
        self.items.push(value);
        u16::try_from(idx).ok()
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.items.get(idx)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= MAX_ENTRIES
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Drop every entry at or past `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        for item in self.items.drain(len.min(self.items.len())..) {
            self.index.remove(&item);
        }
    }
}

/// Duplicates keep the index of their first occurrence.
impl<T: Eq + Hash + Clone> FromIterator<T> for SymbolTable<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = Self::new();
        for value in iter {
            if table.find(&value).is_none() {
                table.index.insert(value.clone(), table.items.len());
                table.items.push(value);
            }
        }
        table
    }
}

impl<'a, T> IntoIterator for &'a SymbolTable<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
