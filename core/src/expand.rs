//! One-level macro expansion: rewrites every synthetic instruction in a
//! program's main sequence into an observably-equivalent run of basic
//! instructions. Fresh labels are drawn from `L{max_label_index + 1}, ...`
//! and fresh work variables from `z{max_work_var_index + 1}, ...`; every
//! emitted line records the 1-based index of the synthetic line it came
//! from.
//!
//! Cost placement: the originating synthetic's full static cost is stamped
//! on the *first* emitted line of each group and zero on the rest. The
//! recipes guarantee that first line executes exactly once per activation
//! (internal loops only ever target later lines), so a program consumes
//! identical cycle totals at depth 0 and depth 1.
//!
//! The recipes assume the default saturate-at-zero semantics of `DECREASE`;
//! running an expanded program with negatives enabled is unsupported.

use crate::{
    ast::{
        exec::Program, BasicOp, Instruction, InstructionKind, Label,
        SyntheticOp, VarRef,
    },
    consts::LABEL_TAG,
    resolve,
    util::Span,
};

/// The deepest level a program can be expanded to: 1 when the main sequence
/// has synthetics to rewrite, 0 otherwise. A `QUOTE` anywhere in the main
/// sequence pins the program at 0: no sound one-level rewriting of function
/// composition exists, so such programs only run at depth 0.
pub fn max_expansion_depth(program: &Program) -> u32 {
    if program.body.has_quote() || !program.body.has_synthetic() {
        0
    } else {
        1
    }
}

/// Expand a program to the given depth. The depth is clamped to
/// [max_expansion_depth], so a program that cannot be expanded passes
/// through unchanged. Expansion is idempotent: basic instructions survive
/// with their labels and costs intact.
pub fn expand(program: &Program, depth: u32) -> Program {
    let depth = depth.min(max_expansion_depth(program));
    if depth == 0 {
        return program.clone();
    }

    let body = &program.body;
    let mut alloc =
        Allocator::new(body.max_label_index, body.max_work_var_index);
    let mut lines: Vec<Instruction> = Vec::new();
    for instruction in &body.instructions {
        if instruction.kind.is_basic() {
            lines.push(instruction.clone());
        } else {
            lines.extend(expand_synthetic(instruction, &mut alloc).lines);
        }
    }
    for (i, line) in lines.iter_mut().enumerate() {
        line.index = i + 1;
    }

    Program {
        name: program.name.clone(),
        body: resolve::resolve_body(lines),
        functions: program.functions.clone(),
        function_index: program.function_index.clone(),
    }
}

/// Allocates fresh labels and work variables for the whole expansion pass.
struct Allocator {
    next_label: u32,
    next_var: u32,
}

impl Allocator {
    fn new(max_label_index: u32, max_work_var_index: u32) -> Self {
        Self {
            next_label: max_label_index + 1,
            next_var: max_work_var_index + 1,
        }
    }

    fn fresh_label(&mut self) -> Label {
        let label = format!("{}{}", LABEL_TAG, self.next_label);
        self.next_label += 1;
        label
    }

    fn fresh_var(&mut self) -> VarRef {
        let var = VarRef::Work(self.next_var);
        self.next_var += 1;
        var
    }
}

/// The lines emitted for one synthetic instruction, along with exactly how
/// many fresh labels and work variables the rewrite consumed (so callers can
/// advance global allocators).
struct Expansion {
    lines: Vec<Instruction>,
    labels_used: u32,
    vars_used: u32,
}

/// Rewrite a single synthetic instruction into basics.
fn expand_synthetic(
    instruction: &Instruction,
    alloc: &mut Allocator,
) -> Expansion {
    let (op, target) = match &instruction.kind {
        InstructionKind::Synthetic { op, target } => (op, *target),
        InstructionKind::Basic { .. } => {
            panic!("cannot expand a basic instruction")
        }
    };
    let defining = instruction.label.clone();
    let mut e = Emitter::new(instruction, alloc);

    match op {
        // v <- 0: drain v down to zero. The drain executes its DECREASE at
        // least once, which is a no-op at zero under saturation.
        SyntheticOp::ZeroVariable
        | SyntheticOp::Assignment { source: None } => {
            e.push(defining, BasicOp::Neutral, target, None);
            e.drain(target);
        }

        // Self-assignment is the identity
        SyntheticOp::Assignment { source: Some(source) }
            if *source == target =>
        {
            e.push(defining, BasicOp::Neutral, target, None);
        }

        // v <- src: drain v, then move src into v and a counter, then move
        // the counter back into src. Leaves src unchanged.
        SyntheticOp::Assignment { source: Some(source) } => {
            e.push(defining, BasicOp::Neutral, target, None);
            e.drain(target);
            let temp = e.fresh_var();
            let flag = e.fresh_var();
            e.copy(target, *source, temp, flag);
        }

        // v <- k: drain v, then k increments, then a trailing neutral
        SyntheticOp::ConstantAssignment { value } => {
            e.push(defining, BasicOp::Neutral, target, None);
            e.drain(target);
            for _ in 0..(*value).max(0) {
                e.push(None, BasicOp::Increase, target, None);
            }
            e.push(None, BasicOp::Neutral, target, None);
        }

        // GOTO L: a flag variable that is always nonzero after the
        // increment, so the conditional jump always fires
        SyntheticOp::GotoLabel { label } => {
            let flag = e.fresh_var();
            e.push(defining, BasicOp::Increase, flag, None);
            e.push(None, BasicOp::JumpNotZero, flag, Some(label.clone()));
        }

        // IF v = 0 GOTO L: invert JUMP_NOT_ZERO around an unconditional goto
        SyntheticOp::JumpZero { label } => {
            let skip = e.fresh_label();
            let flag = e.fresh_var();
            e.push(defining, BasicOp::JumpNotZero, target, Some(skip.clone()));
            e.goto(flag, label);
            e.push(Some(skip), BasicOp::Neutral, target, None);
        }

        // IF v = k GOTO L: build the constant k in a fresh variable, copy v
        // non-destructively, and compare with the synchronized-decrement
        // loop. (Draining a copy by k decrements and testing for zero would
        // wrongly report v < k as equal under saturation.)
        SyntheticOp::JumpEqualConstant { value, label } => {
            e.push(defining, BasicOp::Neutral, target, None);
            let t2 = e.fresh_var();
            e.drain(t2);
            for _ in 0..(*value).max(0) {
                e.push(None, BasicOp::Increase, t2, None);
            }
            let t1 = e.fresh_var();
            let temp = e.fresh_var();
            let flag = e.fresh_var();
            e.drain(t1);
            e.copy(t1, target, temp, flag);
            e.equality(t1, t2, label, target, flag);
        }

        // A variable always equals itself
        SyntheticOp::JumpEqualVariable { other, label }
            if *other == target =>
        {
            let flag = e.fresh_var();
            e.push(defining, BasicOp::Increase, flag, None);
            e.push(None, BasicOp::JumpNotZero, flag, Some(label.clone()));
        }

        // IF v = u GOTO L: copy both sides, then the synchronized-decrement
        // loop; whichever copy reaches zero first decides the comparison
        SyntheticOp::JumpEqualVariable { other, label } => {
            e.push(defining, BasicOp::Neutral, target, None);
            let t1 = e.fresh_var();
            let t2 = e.fresh_var();
            let temp = e.fresh_var();
            let flag = e.fresh_var();
            e.drain(t1);
            e.copy(t1, target, temp, flag);
            e.drain(t2);
            e.copy(t2, *other, temp, flag);
            e.equality(t1, t2, label, target, flag);
        }

        // max_expansion_depth pins QUOTE-bearing programs at depth 0, so the
        // expansion loop can never reach one
        SyntheticOp::Quote { .. } => {
            panic!("programs containing QUOTE are never expanded")
        }
    }

    e.finish()
}

/// Emits the lines of one expansion group: stamps the group's cost on the
/// first line, its origin on every line, and counts allocator draws.
struct Emitter<'a> {
    alloc: &'a mut Allocator,
    lines: Vec<Instruction>,
    origin: usize,
    span: Span,
    cost: u64,
    labels_used: u32,
    vars_used: u32,
}

impl<'a> Emitter<'a> {
    fn new(instruction: &Instruction, alloc: &'a mut Allocator) -> Self {
        Self {
            alloc,
            lines: Vec::new(),
            origin: instruction.index,
            span: instruction.span,
            cost: instruction.cost,
            labels_used: 0,
            vars_used: 0,
        }
    }

    fn fresh_label(&mut self) -> Label {
        self.labels_used += 1;
        self.alloc.fresh_label()
    }

    fn fresh_var(&mut self) -> VarRef {
        self.vars_used += 1;
        self.alloc.fresh_var()
    }

    fn push(
        &mut self,
        label: Option<Label>,
        op: BasicOp,
        target: VarRef,
        jump_label: Option<Label>,
    ) {
        let cost = if self.lines.is_empty() { self.cost } else { 0 };
        self.lines.push(Instruction {
            kind: InstructionKind::Basic {
                op,
                target,
                jump_label,
            },
            label,
            index: 0,
            cost,
            origin: Some(self.origin),
            span: self.span,
        });
    }

    /// Drain a variable to zero: `L: v <- v - 1; IF v != 0 GOTO L`.
    fn drain(&mut self, var: VarRef) {
        let again = self.fresh_label();
        self.push(Some(again.clone()), BasicOp::Decrease, var, None);
        self.push(None, BasicOp::JumpNotZero, var, Some(again));
    }

    /// Unconditional jump: increment a flag variable, then jump on it.
    fn goto(&mut self, flag: VarRef, label: &str) {
        self.push(None, BasicOp::Increase, flag, None);
        self.push(
            None,
            BasicOp::JumpNotZero,
            flag,
            Some(label.to_string()),
        );
    }

    /// Non-destructive copy `dest <- src`, assuming `dest` and `temp` are
    /// zero on entry. Moves `src` into both `dest` and `temp`, then moves
    /// `temp` back into `src`; `temp` ends at zero.
    fn copy(&mut self, dest: VarRef, src: VarRef, temp: VarRef, flag: VarRef) {
        let body = self.fresh_label();
        let restore = self.fresh_label();
        let end = self.fresh_label();
        self.push(None, BasicOp::JumpNotZero, src, Some(body.clone()));
        self.goto(flag, &end);
        self.push(Some(body.clone()), BasicOp::Decrease, src, None);
        self.push(None, BasicOp::Increase, dest, None);
        self.push(None, BasicOp::Increase, temp, None);
        self.push(None, BasicOp::JumpNotZero, src, Some(body));
        self.push(Some(restore.clone()), BasicOp::Decrease, temp, None);
        self.push(None, BasicOp::Increase, src, None);
        self.push(None, BasicOp::JumpNotZero, temp, Some(restore));
        self.push(Some(end), BasicOp::Neutral, dest, None);
    }

    /// Synchronized-decrement equality: destroys `t1` and `t2`, jumping to
    /// `equal_dest` when they hold equal values and falling through to a
    /// trailing neutral otherwise.
    fn equality(
        &mut self,
        t1: VarRef,
        t2: VarRef,
        equal_dest: &str,
        trailing: VarRef,
        flag: VarRef,
    ) {
        let compare = self.fresh_label();
        let nonzero = self.fresh_label();
        let degrade = self.fresh_label();
        let not_equal = self.fresh_label();
        self.push(
            Some(compare.clone()),
            BasicOp::JumpNotZero,
            t1,
            Some(nonzero.clone()),
        );
        self.push(None, BasicOp::JumpNotZero, t2, Some(not_equal.clone()));
        self.goto(flag, equal_dest);
        self.push(Some(nonzero), BasicOp::JumpNotZero, t2, Some(degrade.clone()));
        self.goto(flag, &not_equal);
        self.push(Some(degrade), BasicOp::Decrease, t1, None);
        self.push(None, BasicOp::Decrease, t2, None);
        self.goto(flag, &compare);
        self.push(Some(not_equal), BasicOp::Neutral, trailing, None);
    }

    fn finish(self) -> Expansion {
        Expansion {
            lines: self.lines,
            labels_used: self.labels_used,
            vars_used: self.vars_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(op: SyntheticOp, target: VarRef) -> Instruction {
        let mut instruction = Instruction::new(
            InstructionKind::Synthetic { op, target },
            None,
            7,
            Span::default(),
        );
        instruction.label = Some("A".into());
        instruction
    }

    /// Render emitted lines as (label, command, cost) for terse assertions
    fn render(expansion: &Expansion) -> Vec<(Option<&str>, String, u64)> {
        expansion
            .lines
            .iter()
            .map(|line| {
                (line.label.as_deref(), line.kind.to_string(), line.cost)
            })
            .collect()
    }

    #[test]
    fn test_goto_expansion() {
        let mut alloc = Allocator::new(2, 3);
        let expansion = expand_synthetic(
            &synthetic(
                SyntheticOp::GotoLabel { label: "L1".into() },
                VarRef::Output,
            ),
            &mut alloc,
        );
        assert_eq!(
            render(&expansion),
            vec![
                (Some("A"), "z4 <- z4 + 1".to_string(), 3),
                (None, "IF z4 != 0 GOTO L1".to_string(), 0),
            ]
        );
        assert_eq!(expansion.labels_used, 0);
        assert_eq!(expansion.vars_used, 1);
    }

    #[test]
    fn test_zero_expansion() {
        let mut alloc = Allocator::new(0, 0);
        let expansion = expand_synthetic(
            &synthetic(SyntheticOp::ZeroVariable, VarRef::Input(1)),
            &mut alloc,
        );
        assert_eq!(
            render(&expansion),
            vec![
                (Some("A"), "x1 <- x1".to_string(), 17),
                (Some("L1"), "x1 <- x1 - 1".to_string(), 0),
                (None, "IF x1 != 0 GOTO L1".to_string(), 0),
            ]
        );
        assert_eq!(expansion.labels_used, 1);
        assert_eq!(expansion.vars_used, 0);
    }

    #[test]
    fn test_constant_expansion_counts_increments() {
        let mut alloc = Allocator::new(0, 0);
        let expansion = expand_synthetic(
            &synthetic(
                SyntheticOp::ConstantAssignment { value: 3 },
                VarRef::Output,
            ),
            &mut alloc,
        );
        // header + drain(2) + 3 increments + trailing neutral
        assert_eq!(expansion.lines.len(), 7);
        // full 17 + 3 + 1 on the first line, zero on the rest
        assert_eq!(expansion.lines[0].cost, 21);
        assert!(expansion.lines[1..].iter().all(|line| line.cost == 0));
        // every line remembers the synthetic it came from
        assert!(expansion
            .lines
            .iter()
            .all(|line| line.origin == Some(7)));
    }

    #[test]
    fn test_counters_match_allocator_draws() {
        let mut alloc = Allocator::new(5, 2);
        let expansion = expand_synthetic(
            &synthetic(
                SyntheticOp::JumpEqualVariable {
                    other: VarRef::Input(1),
                    label: "EXIT".into(),
                },
                VarRef::Output,
            ),
            &mut alloc,
        );
        // Exactness lets callers advance global allocators
        assert_eq!(alloc.next_label, 5 + 1 + expansion.labels_used);
        assert_eq!(alloc.next_var, 2 + 1 + expansion.vars_used);
    }

    #[test]
    fn test_self_comparison_is_unconditional() {
        let mut alloc = Allocator::new(0, 0);
        let expansion = expand_synthetic(
            &synthetic(
                SyntheticOp::JumpEqualVariable {
                    other: VarRef::Output,
                    label: "L1".into(),
                },
                VarRef::Output,
            ),
            &mut alloc,
        );
        assert_eq!(
            render(&expansion),
            vec![
                (Some("A"), "z1 <- z1 + 1".to_string(), 49),
                (None, "IF z1 != 0 GOTO L1".to_string(), 0),
            ]
        );
    }
}
