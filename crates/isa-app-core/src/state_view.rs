// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pure projection of a simulator snapshot into display-ready rows.

use isa_session_proto::SimulatorState;

/// Bytes of memory shown.
pub const MEMORY_WINDOW: usize = 256;
/// Bytes per memory row.
pub const MEMORY_ROW_BYTES: usize = 16;

/// One register line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRow {
    /// `R0`, `R1`, ...
    pub name: String,
    /// Raw value.
    pub value: i64,
    /// Zero-padded hex, e.g. `0x0005`.
    pub hex: String,
}

/// One flag cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagCell {
    /// `Z`, `N` or `C`.
    pub name: &'static str,
    /// Whether the flag is set.
    pub set: bool,
}

/// Sixteen bytes of memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRow {
    /// Address of the first byte.
    pub address: usize,
    /// Address label, e.g. `0x0010`.
    pub label: String,
    /// Byte values; addresses past the snapshot read as zero.
    pub bytes: [u8; MEMORY_ROW_BYTES],
}

impl MemoryRow {
    /// Bytes as two-digit upper-case hex.
    pub fn hex_bytes(&self) -> Vec<String> {
        self.bytes.iter().map(|b| format!("{b:02X}")).collect()
    }
}

/// Everything a front end needs to render the machine state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayModel {
    /// False for the placeholder produced when no snapshot is held.
    pub has_state: bool,
    /// Register file.
    pub registers: Vec<RegisterRow>,
    /// Flags in `Z`, `N`, `C` order.
    pub flags: Vec<FlagCell>,
    /// Program counter.
    pub pc: i64,
    /// Program counter as zero-padded hex.
    pub pc_hex: String,
    /// Cycles elapsed.
    pub cycle_count: u64,
    /// Instructions retired.
    pub instruction_count: u64,
    /// Whether the machine halted.
    pub halted: bool,
    /// First [`MEMORY_WINDOW`] bytes in rows of [`MEMORY_ROW_BYTES`].
    pub memory: Vec<MemoryRow>,
}

impl DisplayModel {
    /// Look up a flag by name.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.iter().find(|f| f.name == name).map(|f| f.set)
    }
}

/// Project `state` for display. `None` yields the empty placeholder.
pub fn project(state: Option<&SimulatorState>) -> DisplayModel {
    let Some(state) = state else {
        return DisplayModel::default();
    };

    let registers = state
        .registers
        .iter()
        .enumerate()
        .map(|(i, &value)| RegisterRow {
            name: format!("R{i}"),
            value,
            hex: hex_word(value),
        })
        .collect();

    let flags = vec![
        FlagCell {
            name: "Z",
            set: state.flags.z,
        },
        FlagCell {
            name: "N",
            set: state.flags.n,
        },
        FlagCell {
            name: "C",
            set: state.flags.c,
        },
    ];

    let shown = state.memory.len().min(MEMORY_WINDOW);
    let memory = (0..shown)
        .step_by(MEMORY_ROW_BYTES)
        .map(|address| {
            let mut bytes = [0u8; MEMORY_ROW_BYTES];
            for (offset, slot) in bytes.iter_mut().enumerate() {
                *slot = state.memory.get(address + offset).copied().unwrap_or(0);
            }
            MemoryRow {
                address,
                label: format!("0x{address:04X}"),
                bytes,
            }
        })
        .collect();

    DisplayModel {
        has_state: true,
        registers,
        flags,
        pc: state.pc,
        pc_hex: hex_word(state.pc),
        cycle_count: state.cycle_count,
        instruction_count: state.instruction_count,
        halted: state.halted,
        memory,
    }
}

fn hex_word(value: i64) -> String {
    if value < 0 {
        format!("-0x{:04X}", value.unsigned_abs())
    } else {
        format!("0x{value:04X}")
    }
}
