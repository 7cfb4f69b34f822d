//! The `BitLang` session: translator, macros, tape and callbacks behind one handle.

use std::path::Path;

use tracing::debug;

use crate::engine::{Engine, StepControl, execute};
use crate::error::BitLangError;
use crate::io::{ConstantInput, FnInput, FnOutput, InputSource, NullSink, OutputSink};
use crate::macros::MacroTable;
use crate::program::Program;
use crate::tape::{DEFAULT_MEMORY_SIZE, Tape};
use crate::translate::{CommandTable, Translator};

/// Summary of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Instructions in the canonical program.
    pub ops: usize,
    /// Instructions executed, counting every loop iteration.
    pub steps: usize,
}

/// A BitLang interpreter session.
///
/// The session owns:
/// - the friendly-name command table (fixed at construction),
/// - the macro table,
/// - the memory tape and its cursor, which persist across [`run`](Self::run)
///   calls until [`reset_memory`](Self::reset_memory),
/// - the output and input callbacks.
///
/// Without an output callback output is discarded; without an input callback
/// every input instruction reads 0.
pub struct BitLang {
    translator: Translator,
    macros: MacroTable,
    tape: Tape,
    output: Option<Box<dyn OutputSink + Send>>,
    input: Option<Box<dyn InputSource + Send>>,
    control: Option<StepControl>,
}

impl BitLang {
    /// A session with the default command table and 1000 cells.
    pub fn new() -> Self {
        Self::from_parts(CommandTable::default(), Tape::default())
    }

    /// A session with the default command table and a custom memory size.
    pub fn with_memory(memory_size: usize) -> Result<Self, BitLangError> {
        Ok(Self::from_parts(CommandTable::default(), Tape::new(memory_size)?))
    }

    pub fn builder() -> BitLangBuilder {
        BitLangBuilder::default()
    }

    fn from_parts(commands: CommandTable, tape: Tape) -> Self {
        Self {
            translator: Translator::new(commands),
            macros: MacroTable::new(),
            tape,
            output: None,
            input: None,
            control: None,
        }
    }

    /// Route output bytes to `f`.
    pub fn set_output<F>(&mut self, f: F)
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.output = Some(Box::new(FnOutput(f)));
    }

    /// Read input values from `f`.
    pub fn set_input<F>(&mut self, f: F)
    where
        F: FnMut() -> i32 + Send + 'static,
    {
        self.input = Some(Box::new(FnInput(f)));
    }

    pub fn set_output_sink(&mut self, sink: impl OutputSink + Send + 'static) {
        self.output = Some(Box::new(sink));
    }

    pub fn set_input_source(&mut self, source: impl InputSource + Send + 'static) {
        self.input = Some(Box::new(source));
    }

    /// Install or clear the step limit / cancel flag used by later runs.
    pub fn set_step_control(&mut self, control: Option<StepControl>) {
        self.control = control;
    }

    pub fn define_macro(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), BitLangError> {
        let name = name.into();
        self.translator.check_macro_name(&name)?;
        self.macros.define(name, source)
    }

    /// Define macros from `NAME=source` lines. Returns how many were defined.
    pub fn load_macros(&mut self, text: &str) -> Result<usize, BitLangError> {
        let mut staged = MacroTable::new();
        let count = staged.load_str(text)?;
        self.merge_macros(&staged)?;
        Ok(count)
    }

    pub fn load_macros_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize, BitLangError> {
        let mut staged = MacroTable::new();
        let count = staged.load_file(path)?;
        self.merge_macros(&staged)?;
        Ok(count)
    }

    fn merge_macros(&mut self, staged: &MacroTable) -> Result<(), BitLangError> {
        for (name, source) in staged.iter() {
            self.define_macro(name, source)?;
        }
        Ok(())
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn commands(&self) -> &CommandTable {
        self.translator.commands()
    }

    /// Friendly source to canonical text, with macros expanded.
    pub fn translate(&self, source: &str) -> Result<String, BitLangError> {
        self.translator.translate(source, &self.macros)
    }

    /// Translate and resolve loops without running anything.
    pub fn compile(&self, source: &str) -> Result<Program, BitLangError> {
        Program::parse(&self.translate(source)?)
    }

    /// Translate and execute `source` with the configured callbacks.
    pub fn run(&mut self, source: &str) -> Result<RunReport, BitLangError> {
        let program = self.compile(source)?;

        let mut null_sink = NullSink;
        let mut zero_input = ConstantInput(0);
        let output: &mut dyn OutputSink = match self.output.as_mut() {
            Some(sink) => &mut **sink,
            None => &mut null_sink,
        };
        let input: &mut dyn InputSource = match self.input.as_mut() {
            Some(source) => &mut **source,
            None => &mut zero_input,
        };

        Self::execute_program(&program, &mut self.tape, output, input, self.control.as_ref())
    }

    /// Translate and execute `source` with borrowed callbacks, ignoring the
    /// configured ones.
    pub fn run_with_io(
        &mut self,
        source: &str,
        output: &mut dyn OutputSink,
        input: &mut dyn InputSource,
    ) -> Result<RunReport, BitLangError> {
        let program = self.compile(source)?;
        Self::execute_program(&program, &mut self.tape, output, input, self.control.as_ref())
    }

    fn execute_program(
        program: &Program,
        tape: &mut Tape,
        output: &mut dyn OutputSink,
        input: &mut dyn InputSource,
        control: Option<&StepControl>,
    ) -> Result<RunReport, BitLangError> {
        debug!(ops = program.len(), cursor = tape.cursor(), "run started");
        match execute(program, tape, output, input, control) {
            Ok(steps) => {
                debug!(steps, cursor = tape.cursor(), "run halted");
                Ok(RunReport {
                    ops: program.len(),
                    steps,
                })
            }
            Err(err) => {
                debug!(error = %err, cursor = tape.cursor(), "run faulted");
                Err(err)
            }
        }
    }

    /// An engine over this session's tape, for stepping through `program`
    /// one instruction at a time.
    pub fn engine<'a>(
        &'a mut self,
        program: &'a Program,
        output: &'a mut dyn OutputSink,
        input: &'a mut dyn InputSource,
    ) -> Engine<'a> {
        Engine::new(program, &mut self.tape, output, input).with_control(self.control.as_ref())
    }

    /// Cell value at `index`; indices outside the tape read as 0.
    pub fn get_memory(&self, index: usize) -> u8 {
        self.tape.get(index).unwrap_or(0)
    }

    pub fn reset_memory(&mut self) {
        self.tape.reset();
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }
}

impl Default for BitLang {
    fn default() -> Self {
        Self::new()
    }
}

/// Construction parameters for a [`BitLang`] session.
#[derive(Debug, Clone)]
pub struct BitLangBuilder {
    memory_size: usize,
    commands: CommandTable,
    control: Option<StepControl>,
}

impl Default for BitLangBuilder {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            commands: CommandTable::default(),
            control: None,
        }
    }
}

impl BitLangBuilder {
    pub fn memory_size(mut self, cells: usize) -> Self {
        self.memory_size = cells;
        self
    }

    pub fn commands(mut self, commands: CommandTable) -> Self {
        self.commands = commands;
        self
    }

    pub fn step_control(mut self, control: StepControl) -> Self {
        self.control = Some(control);
        self
    }

    pub fn build(self) -> Result<BitLang, BitLangError> {
        let mut session = BitLang::from_parts(self.commands, Tape::new(self.memory_size)?);
        session.control = self.control;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Op;
    use std::sync::{Arc, Mutex};

    #[test]
    fn tape_persists_across_runs() {
        let mut bl = BitLang::new();
        bl.run("ON ON").unwrap();
        bl.run("ON RIGHT ON").unwrap();
        assert_eq!(bl.get_memory(0), 3);
        assert_eq!(bl.get_memory(1), 1);
        assert_eq!(bl.tape().cursor(), 1);
    }

    #[test]
    fn reset_memory_clears_state() {
        let mut bl = BitLang::with_memory(4).unwrap();
        bl.run("ON RIGHT ON").unwrap();
        bl.reset_memory();
        assert_eq!(bl.tape().cursor(), 0);
        assert_eq!(bl.get_memory(1), 0);
    }

    #[test]
    fn get_memory_outside_tape_reads_zero() {
        let bl = BitLang::with_memory(2).unwrap();
        assert_eq!(bl.get_memory(1000), 0);
    }

    #[test]
    fn closures_receive_io() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut bl = BitLang::new();
        bl.set_output(move |b| sink.lock().unwrap().push(b));
        bl.set_input(|| 65);
        bl.run("INPUT OUTPUT ON OUTPUT").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![65, 66]);
    }

    #[test]
    fn missing_callbacks_default_to_silence_and_zero() {
        let mut bl = BitLang::new();
        bl.run("ON ON INPUT OUTPUT").unwrap();
        assert_eq!(bl.get_memory(0), 0);
    }

    #[test]
    fn run_reports_ops_and_steps() {
        let mut bl = BitLang::new();
        let report = bl.run("ON ON LOOP_START OFF LOOP_END").unwrap();
        assert_eq!(report.ops, 5);
        // two increments, '[', then two rounds of '-' ']'
        assert_eq!(report.steps, 7);
    }

    #[test]
    fn builder_applies_commands_and_size() {
        let commands = CommandTable::empty()
            .with("inc", Op::Increment)
            .with("fwd", Op::MoveRight);
        let mut bl = BitLang::builder()
            .memory_size(2)
            .commands(commands)
            .build()
            .unwrap();
        bl.run("inc fwd inc inc").unwrap();
        assert_eq!(bl.get_memory(0), 1);
        assert_eq!(bl.get_memory(1), 2);
        assert_eq!(bl.tape().len(), 2);
        assert!(matches!(bl.run("fwd"), Err(BitLangError::OutOfBounds { .. })));
    }

    #[test]
    fn builder_rejects_zero_memory() {
        assert!(matches!(
            BitLang::builder().memory_size(0).build(),
            Err(BitLangError::InvalidMemorySize)
        ));
    }

    #[test]
    fn define_macro_rejects_names_that_rewrite_to_instructions() {
        let mut bl = BitLang::new();
        assert!(matches!(
            bl.define_macro("ONOFF", "RIGHT"),
            Err(BitLangError::ReservedMacroName { .. })
        ));
        assert!(bl.macros().is_empty());
    }

    #[test]
    fn load_macros_defines_each_line() {
        let mut bl = BitLang::new();
        let n = bl.load_macros("DOUBLE=ON ON\nQUAD=DOUBLE DOUBLE\n").unwrap();
        assert_eq!(n, 2);
        bl.run("QUAD").unwrap();
        assert_eq!(bl.get_memory(0), 4);
    }

    #[test]
    fn step_control_applies_to_runs() {
        let mut bl = BitLang::builder()
            .step_control(StepControl::with_max_steps(10))
            .build()
            .unwrap();
        let err = bl.run("ON LOOP_START LOOP_END").unwrap_err();
        assert!(matches!(err, BitLangError::StepLimitExceeded { limit: 10 }));
        bl.set_step_control(None);
        bl.reset_memory();
        assert!(bl.run("ON ON").is_ok());
    }

    #[test]
    fn stepping_engine_shares_session_tape() {
        let mut bl = BitLang::with_memory(3).unwrap();
        let program = bl.compile("ON RIGHT").unwrap();
        let mut sink = NullSink;
        let mut input = ConstantInput(0);
        {
            let mut engine = bl.engine(&program, &mut sink, &mut input);
            while engine.step().unwrap().is_some() {}
        }
        assert_eq!(bl.get_memory(0), 1);
        assert_eq!(bl.tape().cursor(), 1);
    }
}
