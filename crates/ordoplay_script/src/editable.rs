// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editable-pin capability for nodes with a dynamic pin family.
//!
//! Dynamic pins are named `{prefix}_{index}` and always trail the node's
//! fixed pins. Kinds only adjust their configuration here; the owning
//! [`Node`](crate::node::Node) reallocates its pins afterwards and the
//! [`Graph`](crate::graph::Graph) remaps connection indices.

use crate::pin::Pin;

/// Nodes whose pin count can be changed by the user
pub trait EditablePins {
    /// Prefix shared by every pin of the dynamic family
    fn pin_prefix(&self) -> &str;

    /// Whether another pin may be appended
    fn can_add_dynamic_pin(&self) -> bool;

    /// Grow the configuration by one dynamic pin
    fn add_dynamic_pin(&mut self);

    /// Whether `pin` may be removed
    fn can_remove_dynamic_pin(&self, pin: &Pin) -> bool;

    /// Shrink the configuration by one dynamic pin
    fn remove_dynamic_pin(&mut self, pin: &Pin);
}

/// Build the name of the dynamic pin at `index`
pub fn dynamic_pin_name(prefix: &str, index: usize) -> String {
    format!("{prefix}_{index}")
}

/// Parse the index out of a dynamic pin name
pub fn dynamic_pin_index(prefix: &str, name: &str) -> Option<usize> {
    name.strip_prefix(prefix)?.strip_prefix('_')?.parse().ok()
}
