// File: src/symbol_table.rs
//
// Scoped symbol table for the code generator.
// A stack of per-scope identifier maps implements lexical shadowing:
// declarations go into the innermost scope, lookups walk innermost to
// outermost and the first hit wins. Index 0 is the permanent global scope,
// seeded with the language keywords; it is never popped.
//
// Every declaration gets a generated output name built by suffixing the
// declaration scope depth, so a shadowing declaration never collides with
// an outer declaration of the same source name.

use crate::ast::Type;
use crate::lexer::KEYWORDS;
use ahash::AHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Keyword,
    Variable,
    Function,
}

/// Parameter and return types recorded for call-site checking
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub params: Vec<Type>,
    pub ret: Type,
}

/// Per-identifier record. For functions, ty is the call's result type and
/// signature carries the full parameter list.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolData {
    pub kind: SymbolKind,
    pub ty: Type,
    pub gen_name: String,
    pub signature: Option<FunctionSignature>,
}

type ScopeTable = AHashMap<String, SymbolData>;

/// The scope stack
pub struct SymbolTable {
    scopes: Vec<ScopeTable>,
}

impl SymbolTable {
    /// A fresh table holding only the seeded global scope
    pub fn new() -> Self {
        let mut globals = ScopeTable::new();
        for name in KEYWORDS.keys() {
            globals.insert(
                (*name).to_string(),
                SymbolData {
                    kind: SymbolKind::Keyword,
                    ty: Type::None,
                    gen_name: (*name).to_string(),
                    signature: None,
                },
            );
        }
        Self { scopes: vec![globals] }
    }

    /// Current depth: 0 is the global scope
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(ScopeTable::new());
    }

    /// Pop the innermost scope. The global scope must never be popped.
    pub fn exit_scope(&mut self) {
        assert!(self.scopes.len() > 1, "the global scope is never popped");
        self.scopes.pop();
    }

    /// Declare a variable in the innermost scope. Returns false and leaves
    /// the table unchanged if the name already exists in that exact scope;
    /// a name that exists only in an outer scope is shadowed.
    pub fn declare(&mut self, name: &str, ty: Type) -> bool {
        let gen_name = format!("{}_{}", name, self.depth());
        self.insert(
            name,
            SymbolData {
                kind: SymbolKind::Variable,
                ty,
                gen_name,
                signature: None,
            },
        )
    }

    /// Declare a function with its signature in the innermost scope
    pub fn declare_function(&mut self, name: &str, params: Vec<Type>, ret: Type) -> bool {
        let gen_name = format!("{}_{}", name, self.depth());
        self.insert(
            name,
            SymbolData {
                kind: SymbolKind::Function,
                ty: ret,
                gen_name,
                signature: Some(FunctionSignature { params, ret }),
            },
        )
    }

    fn insert(&mut self, name: &str, data: SymbolData) -> bool {
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => unreachable!("the global scope always exists"),
        };
        if scope.contains_key(name) {
            return false;
        }
        scope.insert(name.to_string(), data);
        true
    }

    /// Look a name up innermost to outermost; the first hit wins
    pub fn find(&self, name: &str) -> Option<&SymbolData> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}
