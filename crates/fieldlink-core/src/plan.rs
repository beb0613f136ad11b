// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Range coalescing: turn scattered register positions into as few
//! contiguous reads as the device's request-size limit allows.
//!
//! ```text
//! positions:  0 1 ............................ 200      max_registers = 100
//!             └┬┘                              │
//! windows:  (0, 1, 2)                    (200, 200, 1)
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::TypeCatalog;
use crate::types::DataType;

/// One contiguous read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReadWindow {
    /// First register of the window.
    pub min: u32,
    /// Position of the last member starting in the window.
    pub max: u32,
    /// Registers to read, covering every member's full footprint.
    pub count: u32,
}

impl ReadWindow {
    /// Returns `true` if `position` starts inside this window.
    pub fn contains(&self, position: u32) -> bool {
        (self.min..=self.max).contains(&position)
    }

    /// First register after the window.
    pub fn end(&self) -> u32 {
        self.min.saturating_add(self.count)
    }
}

/// Plans coalesced reads for one device layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeCoalescer {
    catalog: TypeCatalog,
    max_registers: u32,
}

impl RangeCoalescer {
    /// Creates a coalescer. A zero limit is treated as one register.
    pub fn new(catalog: TypeCatalog, max_registers: u32) -> Self {
        Self {
            catalog,
            max_registers: max_registers.max(1),
        }
    }

    /// Returns the per-request register limit.
    pub fn max_registers(&self) -> u32 {
        self.max_registers
    }

    /// Computes the read windows for a set of `(position, type)` pairs.
    ///
    /// Windows are ordered by position and every position belongs to exactly
    /// one of them. No window reads more than `max_registers` registers unless
    /// a single member is wider than that on its own. The registers read by
    /// neighbouring windows may overlap when a wide member closes a window.
    pub fn plan<I>(&self, members: I) -> Vec<ReadWindow>
    where
        I: IntoIterator<Item = (u32, DataType)>,
    {
        // widest footprint per position
        let mut footprints: BTreeMap<u32, u32> = BTreeMap::new();
        for (position, data_type) in members {
            let footprint = self.catalog.footprint(data_type);
            footprints
                .entry(position)
                .and_modify(|fp| *fp = (*fp).max(footprint))
                .or_insert(footprint);
        }

        let mut windows = Vec::new();
        let mut current: Option<ReadWindow> = None;

        for (position, footprint) in footprints {
            let end = u64::from(position) + u64::from(footprint);
            if let Some(window) = current.as_mut() {
                if end <= u64::from(window.min) + u64::from(self.max_registers) {
                    window.max = position;
                    window.count = window.count.max((end - u64::from(window.min)) as u32);
                    continue;
                }
                windows.push(*window);
            }
            current = Some(ReadWindow {
                min: position,
                max: position,
                count: footprint,
            });
        }

        windows.extend(current);
        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16s(positions: &[u32]) -> Vec<(u32, DataType)> {
        positions.iter().map(|p| (*p, DataType::UnsignedInt16)).collect()
    }

    #[test]
    fn test_scenario_two_windows() {
        let coalescer = RangeCoalescer::new(TypeCatalog::MODBUS, 100);
        let windows = coalescer.plan(u16s(&[0, 1, 200]));
        assert_eq!(
            windows,
            vec![
                ReadWindow { min: 0, max: 1, count: 2 },
                ReadWindow { min: 200, max: 200, count: 1 },
            ]
        );
    }

    #[test]
    fn test_single_window_when_span_fits() {
        let coalescer = RangeCoalescer::new(TypeCatalog::MODBUS, 123);
        let windows = coalescer.plan(vec![(0, DataType::UnsignedInt16), (10, DataType::Float64)]);
        assert_eq!(windows, vec![ReadWindow { min: 0, max: 10, count: 14 }]);
    }

    #[test]
    fn test_wide_member_closes_window() {
        let coalescer = RangeCoalescer::new(TypeCatalog::SIEMENS, 10);
        // float64 at 4 needs registers 4..12, past the 0..10 limit
        let windows = coalescer.plan(vec![(0, DataType::Byte), (4, DataType::Float64)]);
        assert_eq!(
            windows,
            vec![
                ReadWindow { min: 0, max: 0, count: 1 },
                ReadWindow { min: 4, max: 4, count: 8 },
            ]
        );
    }

    #[test]
    fn test_earlier_wide_member_extends_count() {
        let coalescer = RangeCoalescer::new(TypeCatalog::SIEMENS, 100);
        let windows = coalescer.plan(vec![(0, DataType::Float64), (2, DataType::Byte)]);
        assert_eq!(windows, vec![ReadWindow { min: 0, max: 2, count: 8 }]);
    }

    #[test]
    fn test_duplicate_positions_keep_widest() {
        let coalescer = RangeCoalescer::new(TypeCatalog::MODBUS, 123);
        let windows = coalescer.plan(vec![(5, DataType::Boolean), (5, DataType::UnsignedInt32)]);
        assert_eq!(windows, vec![ReadWindow { min: 5, max: 5, count: 2 }]);
    }

    #[test]
    fn test_empty_plan() {
        let coalescer = RangeCoalescer::new(TypeCatalog::MODBUS, 123);
        assert!(coalescer.plan(Vec::new()).is_empty());
    }

    #[test]
    fn test_plan_invariants() {
        let types = DataType::ALL;
        let coalescer = RangeCoalescer::new(TypeCatalog::MODBUS, 16);
        let mut seed: u32 = 12345;
        for _ in 0..50 {
            let mut members = Vec::new();
            for _ in 0..40 {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
                let position = (seed >> 8) % 500;
                let data_type = types[(seed % types.len() as u32) as usize];
                members.push((position, data_type));
            }
            let windows = coalescer.plan(members.clone());

            for (position, _) in &members {
                assert_eq!(windows.iter().filter(|w| w.contains(*position)).count(), 1);
            }
            for pair in windows.windows(2) {
                assert!(pair[0].max < pair[1].min);
            }
            for window in &windows {
                assert!(window.count <= coalescer.max_registers());
            }
        }
    }
}
