//! Deterministic collection aliases.
//!
//! Every stage of the pipeline iterates these maps during construction and
//! while printing diagnostics, so insertion-ordered collections are used
//! throughout. Reruns on the same grammar must number states identically.

use std::hash::BuildHasherDefault;

pub type Map<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<rustc_hash::FxHasher>>;
pub type Set<T> = indexmap::IndexSet<T, BuildHasherDefault<rustc_hash::FxHasher>>;
