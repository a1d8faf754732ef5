//! General data containers with little to no behavior of their own: the
//! execution knobs, the result of a run, and the entries of the in-memory
//! run history.

use crate::ast::{LangValue, VarRef};
use crate::consts::MAX_CYCLE_COUNT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The knobs a program executes under. Needed at runtime only; parsing and
/// expansion are unaffected by it.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineSpec {
    /// Maximum number of cycles a single frame may consume before the run is
    /// aborted. Callee frames get a fresh budget of the same size.
    pub max_cycles: u64,
    /// Whether `DECREASE` (and the built-in `Minus`) may produce negative
    /// values. The default saturates at zero, which is the model the macro
    /// expansions and the cost table are derived under.
    pub allow_negative: bool,
}

// Useful for tests and prototyping
impl Default for MachineSpec {
    fn default() -> Self {
        Self {
            max_cycles: MAX_CYCLE_COUNT,
            allow_negative: false,
        }
    }
}

/// The observable outcome of one program run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunResult {
    /// Final value of the output variable `y`
    pub y_value: LangValue,
    /// Final snapshot of every touched variable, in display order (`y`,
    /// inputs, work variables)
    pub variables: BTreeMap<VarRef, LangValue>,
    /// Total cycles consumed by the main frame
    pub cycles: u64,
}

/// One completed run, as recorded by [Emulator::run](crate::Emulator::run).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// 1-based run counter
    pub run_no: usize,
    /// Expansion depth the program ran at
    pub depth: u32,
    /// The inputs the run was given
    pub inputs: Vec<LangValue>,
    /// Final value of `y`
    pub y_value: LangValue,
    /// Total cycles consumed
    pub cycles: u64,
}
