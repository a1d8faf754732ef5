use crate::ast::{BasicOp, InstructionKind, SyntheticOp};

/// The maximum number of cycles that a program can run for before being
/// killed. Programs that take exactly this number of cycles terminate
/// normally; the next instruction *after* hitting the threshold triggers a
/// runtime error. This isn't a strategic restriction on users, just a
/// mechanism to prevent programs from running forever.
pub const MAX_CYCLE_COUNT: u64 = 1_000_000;

/// Ceiling on the number of forward steps a single debug session may take.
pub const DEBUG_STEP_LIMIT: u32 = 1_000;

/// Ceiling on nested function dispatch. Callee frames carry fresh cycle
/// budgets, so unbounded recursion can't be caught by the cycle counter.
pub const MAX_CALL_DEPTH: usize = 64;

/// The distinguished label meaning "past the last instruction".
pub const EXIT_LABEL: &str = "EXIT";
/// The prefix of allocatable labels (`L1`, `L2`, ...).
pub const LABEL_TAG: &str = "L";

// Document element and attribute names.
pub(crate) const EL_PROGRAM: &str = "S-Program";
pub(crate) const EL_INSTRUCTIONS: &str = "S-Instructions";
pub(crate) const EL_INSTRUCTION: &str = "S-Instruction";
pub(crate) const EL_VARIABLE: &str = "S-Variable";
pub(crate) const EL_LABEL: &str = "S-Label";
pub(crate) const EL_ARGUMENTS: &str = "S-Instruction-Arguments";
pub(crate) const EL_ARGUMENT: &str = "S-Instruction-Argument";
pub(crate) const EL_FUNCTION: &str = "S-Function";
pub(crate) const ATTR_NAME: &str = "name";
pub(crate) const ATTR_TYPE: &str = "type";
pub(crate) const ATTR_VALUE: &str = "value";
pub(crate) const ATTR_USER_STRING: &str = "user-string";

// Instruction argument keys, keyed by operation.
pub(crate) const ARG_JNZ_LABEL: &str = "JNZLabel";
pub(crate) const ARG_GOTO_LABEL: &str = "gotoLabel";
pub(crate) const ARG_JZ_LABEL: &str = "JZLabel";
pub(crate) const ARG_JEC_LABEL: &str = "JEConstantLabel";
pub(crate) const ARG_JEV_LABEL: &str = "JEVariableLabel";
pub(crate) const ARG_CONSTANT: &str = "constantValue";
pub(crate) const ARG_VARIABLE_NAME: &str = "variableName";
pub(crate) const ARG_ASSIGNED_VARIABLE: &str = "assignedVariable";
pub(crate) const ARG_FUNCTION_NAME: &str = "functionName";
pub(crate) const ARG_FUNCTION_ARGS: &str = "functionArguments";

/// The static cycle cost of an instruction. Costs are fixed at AST
/// construction: synthetic costs are the totals their expansions consume, so
/// consuming them atomically at depth 0 keeps cycle counts equal across
/// expansion levels.
pub(crate) fn cost_of(kind: &InstructionKind) -> u64 {
    match kind {
        InstructionKind::Basic { op, .. } => match op {
            BasicOp::Increase | BasicOp::Decrease | BasicOp::Neutral => 1,
            BasicOp::JumpNotZero => 2,
        },
        InstructionKind::Synthetic { op, .. } => match op {
            SyntheticOp::ZeroVariable => 17,
            SyntheticOp::Assignment { .. } => 17,
            SyntheticOp::ConstantAssignment { value } => {
                17 + clamp_constant(*value) + 1
            }
            SyntheticOp::GotoLabel { .. } => 3,
            SyntheticOp::JumpZero { .. } => 6,
            SyntheticOp::JumpEqualConstant { value, .. } => {
                17 + clamp_constant(*value) + 2 + 3 + 1
            }
            SyntheticOp::JumpEqualVariable { .. } => 49,
            SyntheticOp::Quote { .. } => 1,
        },
    }
}

/// Constants contribute their magnitude to the cost model; negative
/// constants contribute nothing.
fn clamp_constant(value: i64) -> u64 {
    if value > 0 {
        value as u64
    } else {
        0
    }
}
