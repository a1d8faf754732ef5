//! All the types that can appear in the S-language program model. There is no
//! real functionality implemented here, just the types themselves, their
//! display forms, and small traversal helpers used by the resolver and
//! validator.
//!
//! Programs exist in two shapes: [source::Program] is what the parser
//! produces, and [exec::Program] is the resolved form that the interpreter
//! and expander consume. The [Instruction] type is shared between both.

use crate::{
    consts::{cost_of, EXIT_LABEL},
    util::Span,
};
use serde::{Serialize, Serializer};
use std::fmt::{self, Display, Formatter};

/// The type of every value in the language. Values are conceptually
/// non-negative; they are stored signed because `DECREASE` below zero is
/// configurable (see [crate::MachineSpec]).
pub type LangValue = i64;

/// A named jump target. Labels are canonicalized to uppercase at parse time.
pub type Label = String;

/// A reference to one of the machine's variables. There are three families:
/// inputs (`x1`, `x2`, ...), work variables (`z1`, `z2`, ...), and the single
/// output variable `y`.
///
/// The `Ord` impl gives the display order used for snapshots: `y` first, then
/// inputs by index, then work variables by index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VarRef {
    /// The output variable `y`
    Output,
    /// An input variable `x{n}`, `n >= 1`
    Input(u32),
    /// A work variable `z{n}`, `n >= 1`
    Work(u32),
}

impl VarRef {
    /// Parse a variable name. Names are case-insensitive; indexes start at 1
    /// and must not carry leading zeroes.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        if lower == "y" {
            return Some(Self::Output);
        }
        let mut chars = lower.chars();
        let tag = chars.next()?;
        let digits = chars.as_str();
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let index: u32 = digits.parse().ok()?;
        match tag {
            'x' => Some(Self::Input(index)),
            'z' => Some(Self::Work(index)),
            _ => None,
        }
    }
}

impl Display for VarRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output => write!(f, "y"),
            Self::Input(n) => write!(f, "x{}", n),
            Self::Work(n) => write!(f, "z{}", n),
        }
    }
}

// Serialized as the canonical name, so variable maps come out as plain
// string-keyed objects.
impl Serialize for VarRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// One of the four primitive operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BasicOp {
    Increase,
    Decrease,
    JumpNotZero,
    Neutral,
}

impl BasicOp {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "INCREASE" => Some(Self::Increase),
            "DECREASE" => Some(Self::Decrease),
            "JUMP_NOT_ZERO" => Some(Self::JumpNotZero),
            "NEUTRAL" => Some(Self::Neutral),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Increase => "INCREASE",
            Self::Decrease => "DECREASE",
            Self::JumpNotZero => "JUMP_NOT_ZERO",
            Self::Neutral => "NEUTRAL",
        }
    }
}

/// A synthetic (macro) operation, together with its typed arguments. Each of
/// these is expressible as a sequence of basics; see [crate::expand].
#[derive(Clone, Debug, PartialEq)]
pub enum SyntheticOp {
    /// `v <- 0`
    ZeroVariable,
    /// `v <- src`; an absent source is equivalent to a zero source
    Assignment { source: Option<VarRef> },
    /// `v <- k`
    ConstantAssignment { value: LangValue },
    /// Unconditional jump
    GotoLabel { label: Label },
    /// Jump if `v == 0`
    JumpZero { label: Label },
    /// Jump if `v == k`
    JumpEqualConstant { value: LangValue, label: Label },
    /// Jump if `v == u`
    JumpEqualVariable { other: VarRef, label: Label },
    /// Function composition: `v <- f(args...)`
    Quote { function: String, args: CallArgs },
}

impl SyntheticOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ZeroVariable => "ZERO_VARIABLE",
            Self::Assignment { .. } => "ASSIGNMENT",
            Self::ConstantAssignment { .. } => "CONSTANT_ASSIGNMENT",
            Self::GotoLabel { .. } => "GOTO_LABEL",
            Self::JumpZero { .. } => "JUMP_ZERO",
            Self::JumpEqualConstant { .. } => "JUMP_EQUAL_CONSTANT",
            Self::JumpEqualVariable { .. } => "JUMP_EQUAL_VARIABLE",
            Self::Quote { .. } => "QUOTE",
        }
    }
}

/// The arguments of a `QUOTE` call: the raw text as it appeared in the
/// document, and the parsed term tree.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct CallArgs {
    pub text: String,
    pub terms: Vec<ArgTerm>,
}

/// One term of a function-argument expression. Leaves are variable
/// references; internal nodes are nested calls.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgTerm {
    Var(VarRef),
    Call { function: String, args: Vec<ArgTerm> },
}

impl ArgTerm {
    /// Collect every variable referenced anywhere in this term.
    pub(crate) fn collect_vars(&self, out: &mut Vec<VarRef>) {
        match self {
            Self::Var(var) => out.push(*var),
            Self::Call { args, .. } => {
                for arg in args {
                    arg.collect_vars(out);
                }
            }
        }
    }

    /// Collect every function name referenced anywhere in this term.
    pub(crate) fn collect_functions<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Self::Call { function, args } = self {
            out.push(function);
            for arg in args {
                arg.collect_functions(out);
            }
        }
    }
}

/// The two shapes an instruction can take. Everything the interpreter and
/// expander do is a pattern match over this type.
#[derive(Clone, Debug, PartialEq)]
pub enum InstructionKind {
    Basic {
        op: BasicOp,
        target: VarRef,
        /// Only present for `JUMP_NOT_ZERO`
        jump_label: Option<Label>,
    },
    Synthetic {
        op: SyntheticOp,
        target: VarRef,
    },
}

impl InstructionKind {
    /// The variable this instruction operates on.
    pub fn target(&self) -> VarRef {
        match self {
            Self::Basic { target, .. } | Self::Synthetic { target, .. } => {
                *target
            }
        }
    }

    pub fn is_basic(&self) -> bool {
        matches!(self, Self::Basic { .. })
    }

    /// The label this instruction may jump to, if it is any kind of jump.
    pub fn jump_target(&self) -> Option<&Label> {
        match self {
            Self::Basic {
                op: BasicOp::JumpNotZero,
                jump_label,
                ..
            } => jump_label.as_ref(),
            Self::Basic { .. } => None,
            Self::Synthetic { op, .. } => match op {
                SyntheticOp::GotoLabel { label }
                | SyntheticOp::JumpZero { label }
                | SyntheticOp::JumpEqualConstant { label, .. }
                | SyntheticOp::JumpEqualVariable { label, .. } => Some(label),
                _ => None,
            },
        }
    }
}

// The human-readable command text, e.g. `y <- y + 1` or
// `IF x1 != 0 GOTO L2`. This is the form used in program listings.
impl Display for InstructionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic {
                op,
                target,
                jump_label,
            } => match op {
                BasicOp::Increase => {
                    write!(f, "{} <- {} + 1", target, target)
                }
                BasicOp::Decrease => {
                    write!(f, "{} <- {} - 1", target, target)
                }
                BasicOp::Neutral => write!(f, "{} <- {}", target, target),
                BasicOp::JumpNotZero => write!(
                    f,
                    "IF {} != 0 GOTO {}",
                    target,
                    jump_label.as_deref().unwrap_or(EXIT_LABEL),
                ),
            },
            Self::Synthetic { op, target } => match op {
                SyntheticOp::ZeroVariable => write!(f, "{} <- 0", target),
                SyntheticOp::Assignment { source: Some(src) } => {
                    write!(f, "{} <- {}", target, src)
                }
                SyntheticOp::Assignment { source: None } => {
                    write!(f, "{} <- 0", target)
                }
                SyntheticOp::ConstantAssignment { value } => {
                    write!(f, "{} <- {}", target, value)
                }
                SyntheticOp::GotoLabel { label } => write!(f, "GOTO {}", label),
                SyntheticOp::JumpZero { label } => {
                    write!(f, "IF {} = 0 GOTO {}", target, label)
                }
                SyntheticOp::JumpEqualConstant { value, label } => {
                    write!(f, "IF {} = {} GOTO {}", target, value, label)
                }
                SyntheticOp::JumpEqualVariable { other, label } => {
                    write!(f, "IF {} = {} GOTO {}", target, other, label)
                }
                SyntheticOp::Quote { function, args } => {
                    if args.text.trim().is_empty() {
                        write!(f, "{} <- ({})", target, function)
                    } else {
                        write!(f, "{} <- ({},{})", target, function, args.text)
                    }
                }
            },
        }
    }
}

/// One line of a program: the operation itself plus the metadata every line
/// carries (defining label, 1-based index, static cost, expansion ancestry,
/// and the location of the defining element in the source document).
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub kind: InstructionKind,
    /// Defining label, if this line carries one
    pub label: Option<Label>,
    /// 1-based index of the line within its sequence
    pub index: usize,
    /// Static cycle cost, fixed at construction
    pub cost: u64,
    /// At depth 1, the 1-based index of the synthetic line this one was
    /// expanded from
    pub origin: Option<usize>,
    pub span: Span,
}

impl Instruction {
    /// Construct a parsed instruction, stamping its static cost.
    pub(crate) fn new(
        kind: InstructionKind,
        label: Option<Label>,
        index: usize,
        span: Span,
    ) -> Self {
        let cost = cost_of(&kind);
        Self {
            kind,
            label,
            index,
            cost,
            origin: None,
            span,
        }
    }
}

/// Types unique to the parsed, unresolved program.
pub mod source {
    use super::*;

    /// A parsed program, straight out of the document reader. Labels are not
    /// yet mapped to indexes and no derived statistics exist yet.
    #[derive(Clone, Debug, PartialEq)]
    pub struct Program {
        pub name: String,
        pub body: Vec<Instruction>,
        pub functions: Vec<Function>,
    }

    /// A parsed sub-program.
    #[derive(Clone, Debug, PartialEq)]
    pub struct Function {
        pub name: String,
        pub user_string: String,
        pub body: Vec<Instruction>,
    }
}

/// Types unique to the resolved program, ready for execution and expansion.
pub mod exec {
    use super::*;
    use std::collections::HashMap;

    /// An instruction sequence with its derived data: the label map, the
    /// maximum label/work-variable indexes (used by the expander's fresh
    /// allocators), and the input variables it references.
    #[derive(Clone, Debug, PartialEq)]
    pub struct Body {
        pub instructions: Vec<Instruction>,
        /// Earliest instruction index for each defined label
        pub label_map: HashMap<Label, usize>,
        /// Highest `n` over all `L{n}` labels defined or referenced
        pub max_label_index: u32,
        /// Highest `n` over all `z{n}` referenced anywhere in the sequence
        pub max_work_var_index: u32,
        /// Sorted indexes of all `x{n}` referenced anywhere in the sequence
        pub input_vars: Vec<u32>,
    }

    impl Body {
        /// Resolve a jump label to an instruction index. `EXIT` means "past
        /// the last instruction"; an unknown label (impossible after
        /// validation) falls through to `fallback`.
        pub fn jump_target(&self, label: &str, fallback: usize) -> usize {
            if label == EXIT_LABEL {
                self.instructions.len()
            } else {
                self.label_map.get(label).copied().unwrap_or(fallback)
            }
        }

        /// Whether any instruction in this sequence is synthetic.
        pub fn has_synthetic(&self) -> bool {
            self.instructions.iter().any(|i| !i.kind.is_basic())
        }

        /// Whether any instruction in this sequence is a `QUOTE`.
        pub fn has_quote(&self) -> bool {
            self.instructions.iter().any(|i| {
                matches!(
                    &i.kind,
                    InstructionKind::Synthetic {
                        op: SyntheticOp::Quote { .. },
                        ..
                    }
                )
            })
        }
    }

    /// A fully resolved program. Immutable once built; the interpreter and
    /// expander consume it by reference.
    #[derive(Clone, Debug, PartialEq)]
    pub struct Program {
        pub name: String,
        pub body: Body,
        pub functions: Vec<Function>,
        /// Uppercased function name -> index into `functions`
        pub(crate) function_index: HashMap<String, usize>,
    }

    impl Program {
        /// Look up a user-defined function by name (case-insensitive).
        pub fn function(&self, name: &str) -> Option<&Function> {
            self.function_index
                .get(&name.to_uppercase())
                .map(|&i| &self.functions[i])
        }
    }

    /// A resolved sub-program. Functions share the variable naming scheme
    /// with the main program but execute in isolated frames.
    #[derive(Clone, Debug, PartialEq)]
    pub struct Function {
        pub name: String,
        pub user_string: String,
        pub body: Body,
    }
}
