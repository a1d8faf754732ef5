//! Core implementation of the S-language emulator. The main usage of this
//! crate is to load an S-Program document and execute it: loading runs the
//! parse → validate → resolve pipeline and yields an [Emulator], which can
//! run the program (at expansion depth 0 or 1), render listings, start debug
//! sessions, and record a run history.
//!
//! ```
//! use semu::Emulator;
//!
//! let source = r#"
//! <S-Program name="successor">
//!   <S-Instructions>
//!     <S-Instruction type="basic" name="INCREASE">
//!       <S-Variable>y</S-Variable>
//!     </S-Instruction>
//!   </S-Instructions>
//! </S-Program>
//! "#;
//!
//! let mut emulator = Emulator::load(source.into()).unwrap();
//! let result = emulator.run(&[], 0).unwrap();
//! assert_eq!(result.y_value, 1);
//! assert_eq!(result.cycles, 1);
//! ```

#![deny(clippy::all)]

pub mod ast;
mod args;
mod consts;
mod debug;
mod dispatch;
mod display;
pub mod error;
mod expand;
mod machine;
mod models;
mod parse;
mod resolve;
mod util;
mod validate;
mod xml;

pub use consts::{DEBUG_STEP_LIMIT, EXIT_LABEL, MAX_CALL_DEPTH, MAX_CYCLE_COUNT};
pub use debug::DebugContext;
pub use display::listing;
pub use expand::{expand, max_expansion_depth};
pub use machine::{Frame, Machine};
pub use models::*;
pub use util::Span;

use crate::{
    ast::{exec, LangValue},
    error::{CompileError, RuntimeError, WithSource},
};
use std::{fmt::Debug, rc::Rc};

/// Struct used to load a program. `T` represents the current shape of the
/// program: it starts as `()`, becomes a parsed AST, and ends resolved. The
/// fields are deliberately private so a loader can only be driven through
/// the proper pipeline stages.
#[derive(Debug)]
pub struct Loader<T: Debug> {
    source: String,
    ast: T,
}

impl Loader<()> {
    /// Load a source document into a resolved program. Any structural or
    /// reference problem fails the whole load; no partial program is ever
    /// exposed.
    pub fn load(
        source: String,
    ) -> Result<exec::Program, WithSource<CompileError>> {
        Ok(Self { source, ast: () }
            .debug()
            .parse()?
            .debug()
            .validate()?
            .debug()
            .resolve()
            .debug()
            .ast)
    }
}

impl<T: Debug> Loader<T> {
    /// Print out the current state of the loader, if debug mode is enabled.
    /// Takes in self and returns the same value, so that this can be used
    /// in the pipeline chain.
    fn debug(self) -> Self {
        debug!(println!("{:?}", &self));
        self
    }
}

/// A loaded program plus everything needed to work with it: execution knobs,
/// display, expansion, debugging, and an in-memory history of completed
/// runs. Each emulator is an independent value; there is no process-wide
/// state anywhere in this crate.
#[derive(Debug)]
pub struct Emulator {
    program: Rc<exec::Program>,
    source: String,
    spec: MachineSpec,
    history: Vec<HistoryEntry>,
}

impl Emulator {
    /// Parse, validate and resolve a source document.
    pub fn load(source: String) -> Result<Self, WithSource<CompileError>> {
        let program = Loader::load(source.clone())?;
        Ok(Self {
            program: Rc::new(program),
            source,
            spec: MachineSpec::default(),
            history: Vec::new(),
        })
    }

    /// Replace the default execution knobs.
    pub fn with_spec(mut self, spec: MachineSpec) -> Self {
        self.spec = spec;
        self
    }

    /// The loaded program, at depth 0.
    pub fn program(&self) -> &exec::Program {
        &self.program
    }

    /// The deepest expansion level this program supports (0 or 1).
    pub fn max_expansion_depth(&self) -> u32 {
        expand::max_expansion_depth(&self.program)
    }

    /// The program expanded to the given depth (clamped to the maximum).
    pub fn expand(&self, depth: u32) -> exec::Program {
        expand::expand(&self.program, depth)
    }

    /// Render a listing of the program at the given depth.
    pub fn display(&self, depth: u32) -> String {
        display::listing(&self.program_at(depth))
    }

    /// Execute the program on the given inputs at the given depth, recording
    /// a history entry on success. On a runtime error the partial frame is
    /// inspectable through a [Machine] built with [Self::machine].
    pub fn run(
        &mut self,
        inputs: &[LangValue],
        depth: u32,
    ) -> Result<RunResult, WithSource<RuntimeError>> {
        let depth = depth.min(self.max_expansion_depth());
        let mut machine = self.machine(inputs, depth);
        let result = machine.execute_all().map_err(Clone::clone)?;
        self.history.push(HistoryEntry {
            run_no: self.history.len() + 1,
            depth,
            inputs: inputs.to_vec(),
            y_value: result.y_value,
            cycles: result.cycles,
        });
        Ok(result)
    }

    /// Allocate a steppable machine for the program at the given depth.
    pub fn machine(&self, inputs: &[LangValue], depth: u32) -> Machine {
        Machine::new(
            self.program_at(depth),
            self.spec,
            inputs,
            self.source.clone(),
        )
    }

    /// Start a debug session over the program at the given depth.
    pub fn init_debug(
        &self,
        inputs: &[LangValue],
        depth: u32,
    ) -> DebugContext {
        DebugContext::new(self.machine(inputs, depth))
    }

    /// Completed runs, oldest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// The program at a depth: the shared value for depth 0, a freshly
    /// expanded one otherwise.
    fn program_at(&self, depth: u32) -> Rc<exec::Program> {
        if depth.min(self.max_expansion_depth()) == 0 {
            Rc::clone(&self.program)
        } else {
            Rc::new(expand::expand(&self.program, depth))
        }
    }
}
