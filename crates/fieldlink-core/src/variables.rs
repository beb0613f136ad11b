// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Named variable maps and their precomputed read plans.
//!
//! A variable map binds symbolic names to addresses. Variables are grouped
//! by area and every area carries the windows produced by the
//! [`RangeCoalescer`], so a read of the whole map costs one device round
//! trip per window.
//!
//! ```text
//! VariableRegistry
//!   ├── None (default map)
//!   │     ├── hr  : {speed: hr.w2, temp: hr.r10}   windows [(2, 10, 10)]
//!   │     └── co  : {run: co.x0.0}                 windows [(0, 0, 1)]
//!   └── "alarms"
//!         └── ...
//! ```
//!
//! Maps are stored behind `Arc` and replaced on update, so a reader never
//! holds the registry lock across device I/O.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::address::{Address, AddressGrammar};
use crate::codec::ValueCodec;
use crate::error::{PlcError, PlcResult};
use crate::plan::{RangeCoalescer, ReadWindow};
use crate::types::Value;

/// Decoded values of a map read, keyed by variable name.
///
/// A value is `None` when its bytes could not be decoded.
pub type VariableValues = BTreeMap<String, Option<Value>>;

/// Parses a `name -> address` table with `grammar`.
///
/// # Errors
///
/// The first unparsable address, as [`PlcError::InvalidAddress`] naming the
/// variable.
pub fn parse_table<I, K, V>(grammar: &AddressGrammar, table: I) -> PlcResult<Vec<(String, Address)>>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: AsRef<str>,
{
    table
        .into_iter()
        .map(|(name, text)| {
            let name = name.into();
            let text = text.as_ref();
            grammar
                .parse(text)
                .map(|address| (name.clone(), address))
                .map_err(|e| PlcError::invalid_address(text, format!("variable '{name}': {e}")))
        })
        .collect()
}

// =============================================================================
// AreaVariables
// =============================================================================

/// Variables of one area plus their read windows.
#[derive(Debug, Clone, Default)]
pub struct AreaVariables {
    variables: BTreeMap<String, Address>,
    windows: Vec<ReadWindow>,
}

impl AreaVariables {
    /// Returns the read windows, ordered by position.
    pub fn windows(&self) -> &[ReadWindow] {
        &self.windows
    }

    /// Iterates over `(name, address)` pairs.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &Address)> {
        self.variables.iter().map(|(name, address)| (name.as_str(), address))
    }

    /// Number of variables in the area.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Returns `true` if the area has no variables.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Decodes the members of `window` from `data`, the bytes read for it.
    ///
    /// A member whose bytes fall outside `data` decodes to `None`.
    pub fn decode_window(
        &self,
        codec: &ValueCodec,
        window: &ReadWindow,
        data: &[u8],
    ) -> Vec<(String, Option<Value>)> {
        let bytes_per_register = codec.catalog().bytes_per_register();
        self.variables()
            .filter(|(_, address)| window.contains(address.position))
            .map(|(name, address)| {
                let start = (address.position - window.min) as usize * bytes_per_register;
                let width = codec.width(address.data_type);
                let value = data
                    .get(start..start + width)
                    .and_then(|bytes| codec.decode(bytes, address.data_type, address.bit_index()));
                (name.to_string(), value)
            })
            .collect()
    }

    fn replan(&mut self, coalescer: &RangeCoalescer) {
        self.windows = coalescer.plan(
            self.variables
                .values()
                .map(|address| (address.position, address.data_type)),
        );
    }
}

// =============================================================================
// VariableMap
// =============================================================================

/// A named set of variables grouped by area.
#[derive(Debug, Clone, Default)]
pub struct VariableMap {
    areas: BTreeMap<String, AreaVariables>,
}

impl VariableMap {
    /// Builds a map from parsed entries.
    pub fn from_entries(entries: Vec<(String, Address)>, coalescer: &RangeCoalescer) -> Self {
        let mut map = Self::default();
        map.merge(entries, coalescer);
        map
    }

    /// Union-merges `entries` into this map.
    ///
    /// A name that is already mapped moves to its new address. Plans of the
    /// touched areas are recomputed.
    pub fn merge(&mut self, entries: Vec<(String, Address)>, coalescer: &RangeCoalescer) {
        for (name, address) in entries {
            for area in self.areas.values_mut() {
                area.variables.remove(&name);
            }
            self.areas
                .entry(address.area.clone())
                .or_default()
                .variables
                .insert(name, address);
        }

        self.areas.retain(|_, area| !area.is_empty());
        for area in self.areas.values_mut() {
            area.replan(coalescer);
        }
    }

    /// Iterates over `(area, variables)` pairs.
    pub fn areas(&self) -> impl Iterator<Item = (&str, &AreaVariables)> {
        self.areas.iter().map(|(area, vars)| (area.as_str(), vars))
    }

    /// Looks up a variable by name.
    pub fn get(&self, name: &str) -> Option<&Address> {
        self.areas.values().find_map(|area| area.variables.get(name))
    }

    /// Total number of variables.
    pub fn len(&self) -> usize {
        self.areas.values().map(AreaVariables::len).sum()
    }

    /// Returns `true` if the map has no variables.
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Total number of read windows over all areas.
    pub fn window_count(&self) -> usize {
        self.areas.values().map(|area| area.windows.len()).sum()
    }
}

// =============================================================================
// VariableRegistry
// =============================================================================

/// Per-client collection of variable maps. `None` names the default map.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    maps: RwLock<HashMap<Option<String>, Arc<VariableMap>>>,
}

impl VariableRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `entries` into the map `name`, creating it when absent.
    pub fn register(&self, name: Option<&str>, entries: Vec<(String, Address)>, coalescer: &RangeCoalescer) {
        let key = name.map(str::to_string);
        let mut maps = self.maps.write();
        let mut map = maps.get(&key).map(|m| m.as_ref().clone()).unwrap_or_default();
        map.merge(entries, coalescer);

        tracing::debug!(
            map = name.unwrap_or("default"),
            variables = map.len(),
            windows = map.window_count(),
            "Variable map updated"
        );
        maps.insert(key, Arc::new(map));
    }

    /// Returns the map `name`.
    ///
    /// # Errors
    ///
    /// [`PlcError::UnknownMap`] when nothing was registered under `name`.
    pub fn get(&self, name: Option<&str>) -> PlcResult<Arc<VariableMap>> {
        self.maps
            .read()
            .get(&name.map(str::to_string))
            .cloned()
            .ok_or_else(|| PlcError::unknown_map(name.unwrap_or("default")))
    }

    /// Returns the registered map names.
    pub fn names(&self) -> Vec<Option<String>> {
        self.maps.read().keys().cloned().collect()
    }

    /// Drops every map.
    pub fn clear(&self) {
        self.maps.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeCatalog;
    use crate::codec::CodecSettings;
    use crate::types::DataType;

    fn coalescer() -> RangeCoalescer {
        RangeCoalescer::new(TypeCatalog::MODBUS, 123)
    }

    #[test]
    fn test_parse_table_names_variable() {
        let grammar = AddressGrammar::modbus();
        let err = parse_table(&grammar, [("speed", "w2"), ("broken", "zz.w1")]).unwrap_err();
        assert!(matches!(err, PlcError::InvalidAddress { .. }));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_union_merge() {
        let grammar = AddressGrammar::modbus();
        let registry = VariableRegistry::new();
        registry.register(None, parse_table(&grammar, [("a", "w0"), ("b", "co.x1")]).unwrap(), &coalescer());
        registry.register(None, parse_table(&grammar, [("c", "w5")]).unwrap(), &coalescer());

        let map = registry.get(None).unwrap();
        assert_eq!(map.len(), 3);
        let (_, hr) = map.areas().find(|(area, _)| *area == "hr").unwrap();
        assert_eq!(hr.windows(), &[ReadWindow { min: 0, max: 5, count: 6 }]);
    }

    #[test]
    fn test_remap_moves_variable() {
        let grammar = AddressGrammar::modbus();
        let mut map = VariableMap::from_entries(parse_table(&grammar, [("a", "co.x1")]).unwrap(), &coalescer());
        map.merge(parse_table(&grammar, [("a", "w7")]).unwrap(), &coalescer());
        assert_eq!(map.len(), 1);
        assert_eq!(map.areas().count(), 1);
        assert_eq!(map.get("a").unwrap().position, 7);
    }

    #[test]
    fn test_unknown_map() {
        let registry = VariableRegistry::new();
        assert!(matches!(registry.get(Some("nope")), Err(PlcError::UnknownMap { .. })));
    }

    #[test]
    fn test_decode_window_offsets() {
        let grammar = AddressGrammar::modbus();
        let map = VariableMap::from_entries(
            parse_table(&grammar, [("a", "w10"), ("b", "x11.1"), ("c", "r12")]).unwrap(),
            &coalescer(),
        );
        let (_, hr) = map.areas().next().unwrap();
        let window = hr.windows()[0];
        assert_eq!(window, ReadWindow { min: 10, max: 12, count: 4 });

        let codec = ValueCodec::new(CodecSettings::default(), TypeCatalog::MODBUS);
        let data = [0x00, 0x2A, 0x00, 0x02, 0x42, 0x48, 0x00, 0x00];
        let values: BTreeMap<_, _> = hr.decode_window(&codec, &window, &data).into_iter().collect();
        assert_eq!(values["a"], Some(Value::UInt16(42)));
        assert_eq!(values["b"], Some(Value::Bool(true)));
        assert_eq!(values["c"], Some(Value::Float32(50.0)));

        let short: BTreeMap<_, _> = hr.decode_window(&codec, &window, &data[..4]).into_iter().collect();
        assert_eq!(short["a"], Some(Value::UInt16(42)));
        assert_eq!(short["c"], None);
        assert_eq!(DataType::Float32, map.get("c").unwrap().data_type);
    }
}
