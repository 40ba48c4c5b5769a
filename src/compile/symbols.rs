use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::Address;
use std::collections::{HashMap, HashSet};

/// The accumulator.
pub const ACC: Address = 0;
/// Shift amount for doubling; holds `1` whenever a `SHIFT` reads it.
pub const ONE: Address = 1;
/// First cell handed out to declarations and scratch values.
pub const FIRST_FREE: Address = 2;
/// Arrays must end below this address so that the cells allocated after
/// them still have room.
pub const ADDRESS_LIMIT: Address = 1 << 62;

/// Storage of a declared array `name(lower:upper)`.
///
/// `header` is the cell just before the elements; the prologue writes
/// `base - lower` into it so that element `i` lives at `p[header] + i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayBounds {
    pub lower: i64,
    pub upper: i64,
    pub header: Address,
}

impl ArrayBounds {
    pub fn base(&self) -> Address {
        self.header + 1
    }

    pub fn contains(&self, index: i64) -> bool {
        (self.lower..=self.upper).contains(&index)
    }

    /// Address of element `index`, which must be in bounds.
    pub fn element(&self, index: i64) -> Address {
        self.base() + (index - self.lower)
    }

    /// Value stored in the header cell.
    pub fn offset(&self) -> i64 {
        self.base() - self.lower
    }

    pub fn len(&self) -> i64 {
        self.upper - self.lower + 1
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    /// Line of the declaration.
    pub line: usize,
    /// Scalar cell, or the header cell for arrays.
    pub offset: Address,
    /// Scalars: assigned at least once. Arrays: written through a variable
    /// index, so any element may hold a value.
    pub initialized: bool,
    pub iterator: bool,
    pub array: Option<ArrayBounds>,
    initialized_elements: HashSet<i64>,
}

impl Symbol {
    fn new(name: &str, line: usize, offset: Address) -> Self {
        Symbol {
            name: name.to_string(),
            line,
            offset,
            initialized: false,
            iterator: false,
            array: None,
            initialized_elements: HashSet::new(),
        }
    }

    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    /// Whether a read of element `index` is known to see a written value.
    pub fn is_element_initialized(&self, index: i64) -> bool {
        self.initialized || self.initialized_elements.contains(&index)
    }

    /// Whether any element of the array was ever written.
    pub fn has_initialized_elements(&self) -> bool {
        self.initialized || !self.initialized_elements.is_empty()
    }
}

/// Saved initialization flags, restored when a statement is thrown away.
#[derive(Debug, Clone)]
pub struct Initialization(HashMap<String, (bool, HashSet<i64>)>);

/// Names in scope and the memory cursor.
///
/// Offsets are handed out monotonically and never reclaimed, not even when
/// an iterator leaves scope.
#[derive(Debug)]
pub struct Symbols {
    symbols: HashMap<String, Symbol>,
    offset: Address,
    /// One bookkeeping cell per counted-loop nesting depth.
    control: Vec<Address>,
}

impl Default for Symbols {
    fn default() -> Self {
        Self::new()
    }
}

impl Symbols {
    pub fn new() -> Self {
        Symbols {
            symbols: HashMap::new(),
            offset: FIRST_FREE,
            control: Vec::new(),
        }
    }

    /// Next free memory cell.
    pub fn offset(&self) -> Address {
        self.offset
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    fn bump(&mut self, cells: i64) -> Address {
        let offset = self.offset;
        self.offset += cells;
        offset
    }

    fn insert(&mut self, name: &str, line: usize, cells: i64) -> Result<&mut Symbol, CompileError> {
        if let Some(first) = self.symbols.get(name) {
            return Err(CompileError::DuplicateDeclaration {
                name: name.to_string(),
                first_line: first.line,
                line,
            });
        }
        let offset = self.bump(cells);
        Ok(self
            .symbols
            .entry(name.to_string())
            .or_insert_with(|| Symbol::new(name, line, offset)))
    }

    /// Declares a scalar and returns its cell.
    pub fn declare(&mut self, name: &str, line: usize) -> Result<Address, CompileError> {
        self.insert(name, line, 1).map(|symbol| symbol.offset)
    }

    /// Declares `name(lower:upper)`: a header cell followed by the elements.
    pub fn declare_array(
        &mut self,
        name: &str,
        lower: i64,
        upper: i64,
        line: usize,
    ) -> Result<ArrayBounds, CompileError> {
        if lower > upper {
            return Err(CompileError::InvalidArrayRange {
                name: name.to_string(),
                lower,
                upper,
                line,
            });
        }
        // Header cell plus elements; the header value `base - lower` must
        // be representable too.
        let header = self.offset;
        let cells = upper
            .checked_sub(lower)
            .and_then(|span| span.checked_add(2))
            .filter(|&cells| {
                header
                    .checked_add(cells)
                    .is_some_and(|end| end <= ADDRESS_LIMIT)
            })
            .filter(|_| (header + 1).checked_sub(lower).is_some());
        let Some(cells) = cells else {
            return Err(CompileError::ArrayTooLarge {
                name: name.to_string(),
                lower,
                upper,
                line,
            });
        };

        let symbol = self.insert(name, line, cells)?;
        let bounds = ArrayBounds {
            lower,
            upper,
            header: symbol.offset,
        };
        symbol.array = Some(bounds);
        Ok(bounds)
    }

    /// Declares a counted-loop iterator. It starts out initialized and
    /// read-only.
    pub fn declare_iterator(&mut self, name: &str, line: usize) -> Result<Address, CompileError> {
        let symbol = self.insert(name, line, 1)?;
        symbol.initialized = true;
        symbol.iterator = true;
        Ok(symbol.offset)
    }

    /// Takes `name` out of scope. Its cell is not reused.
    pub fn remove(&mut self, name: &str) -> Option<Symbol> {
        self.symbols.remove(name)
    }

    pub fn is_iterator(&self, name: &str) -> bool {
        self.symbols.get(name).is_some_and(|s| s.iterator)
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.symbols.get(name).is_some_and(|s| s.initialized)
    }

    /// Marks a scalar as assigned, or a whole array as possibly written.
    ///
    /// Returns false if `name` was never declared.
    pub fn set_initialized(&mut self, name: &str) -> bool {
        match self.symbols.get_mut(name) {
            Some(symbol) => {
                symbol.initialized = true;
                true
            }
            None => false,
        }
    }

    pub fn set_element_initialized(&mut self, name: &str, index: i64) -> bool {
        match self.symbols.get_mut(name) {
            Some(symbol) => {
                symbol.initialized_elements.insert(index);
                true
            }
            None => false,
        }
    }

    pub fn initialization(&self) -> Initialization {
        Initialization(
            self.symbols
                .iter()
                .map(|(name, s)| (name.clone(), (s.initialized, s.initialized_elements.clone())))
                .collect(),
        )
    }

    /// Puts back the flags of every symbol that was in scope when `saved`
    /// was taken. Symbols declared since then are left alone.
    pub fn restore_initialization(&mut self, saved: Initialization) {
        for (name, (initialized, elements)) in saved.0 {
            if let Some(symbol) = self.symbols.get_mut(&name) {
                symbol.initialized = initialized;
                symbol.initialized_elements = elements;
            }
        }
    }

    /// Reserves one bookkeeping cell per counted-loop nesting level.
    pub fn alloc_for_control(&mut self, depth: usize) {
        for _ in 0..depth {
            let cell = self.bump(1);
            self.control.push(cell);
        }
    }

    /// Bookkeeping cell of the counted loop at nesting `depth` (0-based).
    pub fn control_slot(&self, depth: usize) -> Option<Address> {
        self.control.get(depth).copied()
    }

    /// A fresh cell for an intermediate value.
    pub fn alloc_scratch(&mut self) -> Address {
        self.bump(1)
    }
}
