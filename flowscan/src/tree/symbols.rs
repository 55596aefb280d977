use compact_str::CompactString;
use serde::Serialize;

/// Identity of one local variable or parameter within one function scope.
///
/// Symbols are compared by id, never by name: two variables with the same
/// textual name in different scopes are distinct symbols. The external
/// resolver (scoping, shadowing, closures) hands out the ids; this crate
/// only stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(pub u32);

impl SymbolId {
    #[inline]
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Storage class of a symbol, as resolved by the external symbol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolKind {
    /// Function or method parameter.
    Parameter,
    /// Ordinary local variable.
    Local,
    /// Statically-scoped local (`static $x;`). Keeps its value across
    /// calls, so a read before the first in-function write can be fine.
    Static,
    /// Imported global (`global $x;`). Written from outside the function.
    Global,
}

/// One variable in the symbol table of a [`FunctionBody`](super::FunctionBody).
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Textual name, for reporting only.
    pub name: CompactString,
    /// Storage class.
    pub kind: SymbolKind,
}

impl Symbol {
    /// True for the storage classes excluded from dead-store reporting.
    #[must_use]
    pub fn outlives_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Static | SymbolKind::Global)
    }
}

/// Classification of one symbol occurrence at one tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariableUsage {
    /// The current value is read.
    Read,
    /// A new value is stored, the old one is not read.
    Write,
    /// Compound assignment, pre/post increment: read then write.
    ReadWrite,
}

/// One resolved symbol occurrence on a tree node.
///
/// Occurrences are stored in source evaluation order (right-hand side reads
/// before the left-hand side write of an assignment); the backward liveness
/// transfer walks them in reverse.
#[derive(Debug, Clone, Copy)]
pub struct VarOccurrence {
    /// The symbol occurring here.
    pub symbol: SymbolId,
    /// How the occurrence touches the symbol.
    pub usage: VariableUsage,
    /// Set by the adapter on writes of recognized trivial literals
    /// (`null`, `0`, `''`, empty array) that are not worth a dead-store
    /// finding.
    pub trivial: bool,
}

impl VarOccurrence {
    /// A plain occurrence with the `trivial` flag cleared.
    #[must_use]
    pub fn new(symbol: SymbolId, usage: VariableUsage) -> Self {
        Self {
            symbol,
            usage,
            trivial: false,
        }
    }

    /// True when the occurrence stores a value into the symbol.
    #[must_use]
    pub fn writes(&self) -> bool {
        matches!(self.usage, VariableUsage::Write | VariableUsage::ReadWrite)
    }

    /// True when the occurrence observes the current value of the symbol.
    #[must_use]
    pub fn reads(&self) -> bool {
        matches!(self.usage, VariableUsage::Read | VariableUsage::ReadWrite)
    }
}
