use std::{collections::HashMap, hash::Hash};

use cranelift_entity::{entity_impl, EntityRef, PrimaryMap};
use serde::{Serialize, Serializer};

use crate::{ast::ClassPart, RcString};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LiteralIndex(u32);
entity_impl! { LiteralIndex }

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ClassIndex(u32);
entity_impl! { ClassIndex }

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ExpectationIndex(u32);
entity_impl! { ExpectationIndex }

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FunctionIndex(u32);
entity_impl! { FunctionIndex }

#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassConst {
    pub parts: Vec<ClassPart>,
    pub inverted: bool,
    pub ignore_case: bool,
}

/// What the parser reports as expected when a match fails.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expectation {
    Literal {
        value: RcString,
        #[serde(rename = "ignoreCase")]
        ignore_case: bool,
    },
    Class {
        value: Vec<ClassPart>,
        inverted: bool,
        #[serde(rename = "ignoreCase")]
        ignore_case: bool,
    },
    Rule {
        value: RcString,
    },
    Any,
}

/// A semantic action or predicate, called with the labeled values in scope.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct FunctionConst {
    pub predicate: bool,
    pub params: Vec<RcString>,
    pub body: RcString,
}

/// Append-only list which hands out the existing index for a value equal to one already added.
#[derive(Clone, Debug)]
pub struct ConstPool<K: EntityRef, V> {
    values: PrimaryMap<K, V>,
    lookup: HashMap<V, K>,
}

impl<K: EntityRef, V> Default for ConstPool<K, V> {
    fn default() -> Self {
        Self {
            values: PrimaryMap::new(),
            lookup: HashMap::new(),
        }
    }
}

impl<K: EntityRef, V: Clone + Eq + Hash> ConstPool<K, V> {
    pub fn add(&mut self, value: V) -> K {
        if let Some(&index) = self.lookup.get(&value) {
            return index;
        }
        let index = self.values.push(value.clone());
        self.lookup.insert(value, index);
        index
    }
}

impl<K: EntityRef, V> ConstPool<K, V> {
    pub fn get(&self, index: K) -> Option<&V> {
        self.values.get(index)
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.values.iter()
    }
}

impl<K: EntityRef, V: Serialize> Serialize for ConstPool<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values.values())
    }
}

/// The tables shared by the bytecode of all rules in a grammar.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Constants {
    pub literals: ConstPool<LiteralIndex, RcString>,
    pub classes: ConstPool<ClassIndex, ClassConst>,
    pub expectations: ConstPool<ExpectationIndex, Expectation>,
    pub functions: ConstPool<FunctionIndex, FunctionConst>,
}
