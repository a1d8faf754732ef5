//! The interpreter. A [Machine] is a steppable program executor: it holds
//! the current [Frame] (variables, program counter, cycle counter) and
//! advances one instruction at a time, so the same type backs both
//! run-to-completion execution and the debug controller.
//!
//! Function calls dispatched by `QUOTE` run through [run_body], which drives
//! a fresh frame over the callee's instruction sequence with its own cycle
//! budget. Callee cycles never flow into the caller's counter; from the
//! caller's perspective a call is an atomic instruction with its static
//! cost.

use crate::{
    ast::{
        exec::{Body, Program},
        BasicOp, Instruction, InstructionKind, LangValue, SyntheticOp,
        VarRef,
    },
    debug,
    dispatch,
    error::{RuntimeError, SourceErrorWrapper, WithSource},
    models::{MachineSpec, RunResult},
    util::Span,
};
use std::{collections::BTreeMap, iter, rc::Rc};

/// The transient state of one execution: the variable map, the program
/// counter, and the cycle counter. Frames are cheap to clone, which is what
/// the debug controller's snapshot stack relies on.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    variables: BTreeMap<VarRef, LangValue>,
    pc: usize,
    cycles: u64,
}

impl Frame {
    /// Build the initial frame for a sequence: provided inputs bound to
    /// `x{1..}`, every other referenced input defaulted to 0, all work
    /// variables up to the sequence's maximum pre-initialized to 0, and `y`
    /// initialized to 0.
    pub(crate) fn new(body: &Body, inputs: &[LangValue]) -> Self {
        let mut variables = BTreeMap::new();
        variables.insert(VarRef::Output, 0);
        for &n in &body.input_vars {
            variables.insert(VarRef::Input(n), 0);
        }
        for (i, &value) in inputs.iter().enumerate() {
            variables.insert(VarRef::Input(i as u32 + 1), value);
        }
        for n in 1..=body.max_work_var_index {
            variables.insert(VarRef::Work(n), 0);
        }
        Self {
            variables,
            pc: 0,
            cycles: 0,
        }
    }

    /// The value of a variable. Anything never touched reads as 0, matching
    /// the "missing inputs default to 0" rule.
    pub fn get(&self, var: VarRef) -> LangValue {
        self.variables.get(&var).copied().unwrap_or(0)
    }

    /// Strict lookup, for places where a miss indicates a resolution bug.
    pub(crate) fn lookup(&self, var: VarRef) -> Option<LangValue> {
        self.variables.get(&var).copied()
    }

    pub(crate) fn set(&mut self, var: VarRef, value: LangValue) {
        self.variables.insert(var, value);
    }

    /// All variables and their current values, in display order.
    pub fn variables(&self) -> &BTreeMap<VarRef, LangValue> {
        &self.variables
    }

    /// The index of the next instruction to execute.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Cycles consumed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

/// Execute one instruction against a frame, updating the program counter and
/// cycle counter. `call_depth` tracks nested function dispatch.
fn execute_instruction(
    instruction: &Instruction,
    body: &Body,
    frame: &mut Frame,
    program: &Program,
    spec: &MachineSpec,
    call_depth: usize,
) -> Result<(), RuntimeError> {
    frame.cycles += instruction.cost;

    // Execute, collecting the label to jump to if the instruction wants one
    let mut jump: Option<&str> = None;
    match &instruction.kind {
        InstructionKind::Basic {
            op,
            target,
            jump_label,
        } => match op {
            BasicOp::Increase => frame.set(*target, frame.get(*target) + 1),
            BasicOp::Decrease => {
                let value = frame.get(*target) - 1;
                frame.set(
                    *target,
                    if spec.allow_negative { value } else { value.max(0) },
                );
            }
            BasicOp::Neutral => {}
            BasicOp::JumpNotZero => {
                if frame.get(*target) != 0 {
                    jump = jump_label.as_deref();
                }
            }
        },
        InstructionKind::Synthetic { op, target } => match op {
            SyntheticOp::ZeroVariable => frame.set(*target, 0),
            SyntheticOp::Assignment { source } => {
                let value = source.map(|src| frame.get(src)).unwrap_or(0);
                frame.set(*target, value);
            }
            SyntheticOp::ConstantAssignment { value } => {
                frame.set(*target, *value)
            }
            SyntheticOp::GotoLabel { label } => jump = Some(label.as_str()),
            SyntheticOp::JumpZero { label } => {
                if frame.get(*target) == 0 {
                    jump = Some(label.as_str());
                }
            }
            SyntheticOp::JumpEqualConstant { value, label } => {
                if frame.get(*target) == *value {
                    jump = Some(label.as_str());
                }
            }
            SyntheticOp::JumpEqualVariable { other, label } => {
                if frame.get(*target) == frame.get(*other) {
                    jump = Some(label.as_str());
                }
            }
            SyntheticOp::Quote { function, args } => {
                let values = dispatch::evaluate_terms(
                    &args.terms,
                    frame,
                    program,
                    spec,
                    call_depth,
                )?;
                let result = dispatch::call(
                    function, &values, program, spec, call_depth,
                )?;
                frame.set(*target, result);
            }
        },
    }

    frame.pc = match jump {
        Some(label) => body.jump_target(label, frame.pc + 1),
        None => frame.pc + 1,
    };
    Ok(())
}

/// Run an instruction sequence to completion on a fresh frame and return the
/// final value of `y`. This is how function calls execute: isolated frame,
/// own cycle budget.
pub(crate) fn run_body(
    body: &Body,
    program: &Program,
    spec: &MachineSpec,
    inputs: &[LangValue],
    call_depth: usize,
) -> Result<LangValue, RuntimeError> {
    let mut frame = Frame::new(body, inputs);
    while frame.pc < body.instructions.len() {
        if frame.cycles >= spec.max_cycles {
            return Err(RuntimeError::CycleLimitExceeded {
                limit: spec.max_cycles,
            });
        }
        let instruction = &body.instructions[frame.pc];
        execute_instruction(
            instruction,
            body,
            &mut frame,
            program,
            spec,
            call_depth,
        )?;
    }
    Ok(frame.get(VarRef::Output))
}

/// A steppable program executor. Maintains the current state of the program;
/// execution can be progressed one instruction at a time. Once a runtime
/// error occurs the machine is terminated, but the partial frame stays
/// observable for diagnostics.
#[derive(Clone, Debug)]
pub struct Machine {
    // Static data
    spec: MachineSpec,
    source: String,
    program: Rc<Program>,

    // Runtime state
    frame: Frame,
    /// A runtime error, if one has occurred. Once set, the machine has
    /// terminated and can no longer execute.
    error: Option<WithSource<RuntimeError>>,
}

impl Machine {
    /// Creates a new machine over a resolved program, ready to be executed.
    pub fn new(
        program: Rc<Program>,
        spec: MachineSpec,
        inputs: &[LangValue],
        source: String,
    ) -> Self {
        let frame = Frame::new(&program.body, inputs);
        Self {
            spec,
            source,
            program,
            frame,
            error: None,
        }
    }

    /// Internal step function. The return value is the same as
    /// [Self::execute_next], except the error still needs to be wrapped with
    /// its source position.
    fn execute_next_inner(&mut self) -> Result<bool, (RuntimeError, Span)> {
        // We've previously hit an error, prevent further execution
        if self.error.is_some() {
            return Ok(false);
        }

        let instruction =
            match self.program.body.instructions.get(self.frame.pc) {
                Some(instruction) => instruction,
                // Out of instructions to execute, just give up
                None => return Ok(false),
            };
        let span = instruction.span;

        // Budget check happens on every dispatch
        if self.frame.cycles >= self.spec.max_cycles {
            return Err((
                RuntimeError::CycleLimitExceeded {
                    limit: self.spec.max_cycles,
                },
                span,
            ));
        }

        execute_instruction(
            instruction,
            &self.program.body,
            &mut self.frame,
            &self.program,
            &self.spec,
            0,
        )
        .map_err(|error| (error, span))?;
        debug!(println!(
            "Executed #{}\n\tState: {:?}",
            self.frame.pc, self.frame
        ));
        Ok(true)
    }

    /// Executes the next instruction in the program.
    ///
    /// # Returns
    /// - `Ok(true)` if the instruction executed normally
    /// - `Ok(false)` if nothing executed because the program has already
    ///   terminated
    /// - `Err(error)` if an error occurred, positioned at the offending
    ///   instruction
    pub fn execute_next(&mut self) -> Result<bool, &WithSource<RuntimeError>> {
        match self.execute_next_inner() {
            Ok(executed) => Ok(executed),
            Err((error, span)) => {
                // Store the error in self, then return a ref to it
                self.error = Some(WithSource::new(
                    iter::once(SourceErrorWrapper::new(
                        error,
                        span,
                        &self.source,
                    )),
                    self.source.clone(),
                ));
                Err(self.error.as_ref().unwrap())
            }
        }
    }

    /// Executes this machine until termination (or error), and returns the
    /// run result.
    pub fn execute_all(
        &mut self,
    ) -> Result<RunResult, &WithSource<RuntimeError>> {
        // We can't return the error directly from the loop because of borrow
        // checker limitations, so check self.error afterwards instead
        while !self.terminated() {
            if self.execute_next().is_err() {
                break;
            }
        }

        match &self.error {
            None => Ok(self.result()),
            Some(error) => Err(error),
        }
    }

    /// The observable outcome of the run so far: `y`, the full variable
    /// snapshot, and the cycle count. Callable at any time, including after
    /// a runtime error (yielding the partial frame).
    pub fn result(&self) -> RunResult {
        RunResult {
            y_value: self.frame.get(VarRef::Output),
            variables: self.frame.variables.clone(),
            cycles: self.frame.cycles,
        }
    }

    /// Get a reference to the program being executed.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Get the index of the next instruction to be executed.
    pub fn program_counter(&self) -> usize {
        self.frame.pc
    }

    /// Get the number of cycles consumed so far.
    pub fn cycle_count(&self) -> u64 {
        self.frame.cycles
    }

    /// The current value of the output variable.
    pub fn y_value(&self) -> LangValue {
        self.frame.get(VarRef::Output)
    }

    /// All variables and their current values.
    pub fn variables(&self) -> &BTreeMap<VarRef, LangValue> {
        self.frame.variables()
    }

    /// Checks if this machine has finished executing, either by running past
    /// the last instruction or by runtime error.
    pub fn terminated(&self) -> bool {
        self.frame.pc >= self.program.body.instructions.len()
            || self.error.is_some()
    }

    /// Get the runtime error that halted execution, if one has occurred.
    pub fn error(&self) -> Option<&WithSource<RuntimeError>> {
        self.error.as_ref()
    }

    pub(crate) fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Replace the current frame, clearing any stored error. Used by the
    /// debug controller to step backward.
    pub(crate) fn restore_frame(&mut self, frame: Frame) {
        self.frame = frame;
        self.error = None;
    }

    /// Record a runtime error originating outside instruction execution
    /// (e.g. the debug step ceiling), terminating the machine.
    pub(crate) fn fail(&mut self, error: RuntimeError) {
        let span = self
            .program
            .body
            .instructions
            .get(self.frame.pc)
            .map(|instruction| instruction.span)
            .unwrap_or_default();
        self.error = Some(WithSource::new(
            iter::once(SourceErrorWrapper::new(error, span, &self.source)),
            self.source.clone(),
        ));
    }
}
