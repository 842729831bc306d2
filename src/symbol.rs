//! Symbol metadata (spec.md §6, grounded in
//! `original_source/include/matching/symbol.h`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: u32,
    pub name: String,
}

impl Symbol {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Symbol {
            id,
            name: name.into(),
        }
    }
}
