//! The step debugger. A [DebugContext] wraps a suspended [Machine] together
//! with a stack of frame snapshots, one per step taken, so execution can
//! move backward as well as forward. There are no coroutines involved;
//! both step operations are ordinary state transitions on the context.

use crate::{
    ast::{LangValue, VarRef},
    consts::DEBUG_STEP_LIMIT,
    error::RuntimeError,
    machine::{Frame, Machine},
};
use std::collections::BTreeMap;

/// A live, suspended execution. Build one with
/// [Emulator::init_debug](crate::Emulator::init_debug).
#[derive(Clone, Debug)]
pub struct DebugContext {
    machine: Machine,
    /// Snapshots preceding each step; the bottom entry is the initial frame
    history: Vec<Frame>,
    /// Forward steps taken, counted against [DEBUG_STEP_LIMIT]
    steps: u32,
    /// Command text of the most recently executed instruction
    last_instruction: Option<String>,
}

impl DebugContext {
    pub(crate) fn new(machine: Machine) -> Self {
        let initial = machine.frame().clone();
        Self {
            machine,
            history: vec![initial],
            steps: 0,
            last_instruction: None,
        }
    }

    /// Execute exactly one instruction. Returns whether a step was taken;
    /// stepping a finished context is a no-op, not an error. A step that
    /// hits a runtime error still counts (and can be stepped back out of).
    /// Sessions are capped at [DEBUG_STEP_LIMIT] steps to catch pathological
    /// loops under manual stepping.
    pub fn step_forward(&mut self) -> bool {
        if self.machine.terminated() {
            return false;
        }
        if self.steps >= DEBUG_STEP_LIMIT {
            self.machine.fail(RuntimeError::StepLimitExceeded {
                limit: DEBUG_STEP_LIMIT,
            });
            return false;
        }

        let snapshot = self.machine.frame().clone();
        let text = self
            .machine
            .program()
            .body
            .instructions
            .get(self.machine.program_counter())
            .map(|instruction| instruction.kind.to_string());
        let stepped = match self.machine.execute_next() {
            Ok(executed) => executed,
            // The error is stored on the machine; the step still happened
            Err(_) => true,
        };
        if stepped {
            self.history.push(snapshot);
            self.steps += 1;
            self.last_instruction = text;
        }
        stepped
    }

    /// Restore the frame from before the most recent step. Returns whether a
    /// step back occurred; at the history root there is nothing to undo and
    /// the context is unchanged.
    pub fn step_backward(&mut self) -> bool {
        if self.history.len() <= 1 {
            return false;
        }
        let frame = self.history.pop().unwrap();
        self.machine.restore_frame(frame);
        self.steps = self.steps.saturating_sub(1);
        self.last_instruction = None;
        true
    }

    /// All variables and their current values.
    pub fn variables(&self) -> &BTreeMap<VarRef, LangValue> {
        self.machine.variables()
    }

    /// The index of the next instruction to execute.
    pub fn program_counter(&self) -> usize {
        self.machine.program_counter()
    }

    /// Cycles consumed so far.
    pub fn cycle_count(&self) -> u64 {
        self.machine.cycle_count()
    }

    /// Whether execution can no longer move forward (normal termination or
    /// runtime error).
    pub fn finished(&self) -> bool {
        self.machine.terminated()
    }

    /// Command text of the most recently executed instruction, if the last
    /// mutation was a forward step.
    pub fn last_instruction(&self) -> Option<&str> {
        self.last_instruction.as_deref()
    }

    /// The underlying machine, for error and result inspection.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }
}
