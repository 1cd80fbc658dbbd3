//! Symbol tables and the parse-time scope stack
//!
//! A `SymbolTable` is a flat, insertion-ordered list of symbols. Lookup
//! is a linear scan by token value equality, which is plenty for the
//! symbol counts this language sees. `add` is an upsert: updating an
//! existing symbol preserves its id and the line it was first declared
//! on, while overwriting state, type, and value.
//!
//! The `ScopeStack` mirrors `{...}` nesting during parsing and function
//! calls during interpretation. Depth 0 is the module scope. A shadow
//! slot, when occupied, overrides *all* reads and writes — that is how
//! struct fields and function parameters get their own namespace while
//! the surrounding code is being parsed.

use crate::token::Token;
use crate::types::Type;
use crate::value::Value;

/// How far along a symbol's declaration has come.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeclarationState {
    #[default]
    None,
    /// Name reserved while its definition is still being parsed.
    Uninitialized,
    /// Declared with a type, but carrying no value yet.
    Declared,
    /// Fully defined; the interpreter may read its value.
    Defined,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Symbol {
    /// Stable id, assigned once at first insertion.
    pub id: usize,
    pub declaration_state: DeclarationState,
    pub token: Token,
    pub value: Value,
    /// Frozen at first insertion; later upserts keep it.
    pub declared_on_line: usize,
    /// Sub-table for struct fields or function parameters. This is the
    /// table the parser pushes into the shadow slot.
    pub fields: SymbolTable,
}

impl Symbol {
    pub fn new(token: Token, ty: Type, state: DeclarationState) -> Self {
        Symbol {
            id: 0,
            declaration_state: state,
            declared_on_line: token.line,
            token,
            value: Value {
                ty,
                ..Value::default()
            },
            fields: SymbolTable::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.token.lexeme
    }

    /// The symbol's static type (the type slot of its value).
    pub fn ty(&self) -> &Type {
        &self.value.ty
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    next_id: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Upsert by token value equality. Returns a clone of the stored
    /// symbol, the way callers want to keep working with it.
    pub fn add(&mut self, mut symbol: Symbol) -> Symbol {
        if let Some(existing) = self
            .symbols
            .iter_mut()
            .find(|s| s.token.values_match(&symbol.token))
        {
            existing.declaration_state = symbol.declaration_state;
            existing.value = symbol.value;
            existing.token = symbol.token;
            if !symbol.fields.is_empty() {
                existing.fields = symbol.fields;
            }
            return existing.clone();
        }

        symbol.id = self.next_id;
        self.next_id += 1;
        symbol.declared_on_line = symbol.token.line;
        self.symbols.push(symbol);
        self.symbols.last().expect("just pushed").clone()
    }

    pub fn retrieve(&self, token: &Token) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.token.values_match(token))
    }

    pub fn retrieve_mut(&mut self, token: &Token) -> Option<&mut Symbol> {
        self.symbols
            .iter_mut()
            .find(|s| s.token.values_match(token))
    }

    /// Lookup by bare name, ignoring token kind. The interpreter and the
    /// harness resolve `check` this way.
    pub fn retrieve_by_name(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.token.lexeme == name)
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.retrieve(token).is_some()
    }

    pub fn set_value(&mut self, token: &Token, value: Value) -> bool {
        match self.retrieve_mut(token) {
            Some(s) => {
                s.value = value;
                true
            }
            None => false,
        }
    }

    pub fn set_value_type(&mut self, token: &Token, ty: Type) -> bool {
        match self.retrieve_mut(token) {
            Some(s) => {
                s.value.ty = ty;
                true
            }
            None => false,
        }
    }

    pub fn set_declaration_state(&mut self, token: &Token, state: DeclarationState) -> bool {
        match self.retrieve_mut(token) {
            Some(s) => {
                s.declaration_state = state;
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}

/// Depth-indexed stack of symbol tables plus the shadow override slot.
#[derive(Debug, Default)]
pub struct ScopeStack {
    tables: Vec<SymbolTable>,
    shadow: Option<SymbolTable>,
}

impl ScopeStack {
    /// A fresh stack whose depth-0 table is the module scope.
    pub fn new() -> Self {
        ScopeStack {
            tables: vec![SymbolTable::new()],
            shadow: None,
        }
    }

    /// Rebuild a stack around an existing module table. The interpreter
    /// does this to inherit the values the type checker left behind.
    pub fn with_module_table(module: SymbolTable) -> Self {
        ScopeStack {
            tables: vec![module],
            shadow: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.tables.len() - 1
    }

    pub fn begin(&mut self) {
        self.tables.push(SymbolTable::new());
    }

    /// Close the innermost scope and hand its table back.
    pub fn end(&mut self) -> SymbolTable {
        debug_assert!(self.tables.len() > 1, "cannot end the module scope");
        self.tables.pop().unwrap_or_default()
    }

    /// Route all reads and writes to `table` until `take_shadow`.
    pub fn push_shadow(&mut self, table: SymbolTable) {
        self.shadow = Some(table);
    }

    pub fn take_shadow(&mut self) -> SymbolTable {
        self.shadow.take().unwrap_or_default()
    }

    pub fn is_shadowed(&self) -> bool {
        self.shadow.is_some()
    }

    /// The table every operation currently lands in: the shadow when one
    /// is set, otherwise the innermost scope.
    pub fn current(&self) -> &SymbolTable {
        match &self.shadow {
            Some(t) => t,
            None => self.tables.last().expect("module scope always exists"),
        }
    }

    pub fn current_mut(&mut self) -> &mut SymbolTable {
        match &mut self.shadow {
            Some(t) => t,
            None => self.tables.last_mut().expect("module scope always exists"),
        }
    }

    pub fn module(&self) -> &SymbolTable {
        &self.tables[0]
    }

    pub fn module_mut(&mut self) -> &mut SymbolTable {
        &mut self.tables[0]
    }

    /// Move the module table out, consuming the stack.
    pub fn into_module(mut self) -> SymbolTable {
        self.tables.drain(..).next().unwrap_or_default()
    }

    /// Walk from the innermost scope out to the module scope. The shadow
    /// slot is deliberately not consulted here.
    pub fn exists_in_outer_scope(&self, token: &Token) -> Option<&Symbol> {
        self.tables.iter().rev().find_map(|t| t.retrieve(token))
    }

    /// Mutable lookup across the open scopes, innermost first.
    pub fn resolve_mut(&mut self, token: &Token) -> Option<&mut Symbol> {
        self.tables
            .iter_mut()
            .rev()
            .find_map(|t| t.retrieve_mut(token))
    }
}
