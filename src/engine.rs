//! The instruction-pointer driven run loop.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::error::BitLangError;
use crate::io::{InputSource, OutputSink};
use crate::program::{Op, Program};
use crate::tape::Tape;

/// Controls for cooperative cancellation and step limiting.
#[derive(Debug, Clone, Default)]
pub struct StepControl {
    pub max_steps: Option<usize>,
    pub cancel_flag: Arc<AtomicBool>,
}

impl StepControl {
    pub fn new(max_steps: Option<usize>, cancel_flag: Arc<AtomicBool>) -> Self {
        Self { max_steps, cancel_flag }
    }

    /// A step limit with a fresh, never-set cancel flag.
    pub fn with_max_steps(max_steps: usize) -> Self {
        Self::new(Some(max_steps), Arc::new(AtomicBool::new(false)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    /// The instruction pointer ran off the end of the program.
    Halted,
    Faulted,
}

/// What a single executed instruction looked like before it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub index: usize,
    pub ip: usize,
    pub op: Op,
    pub cursor: usize,
    pub cell: u8,
}

/// Executes one [`Program`] against a borrowed tape and callbacks.
pub struct Engine<'a> {
    program: &'a Program,
    tape: &'a mut Tape,
    output: &'a mut dyn OutputSink,
    input: &'a mut dyn InputSource,
    control: Option<&'a StepControl>,
    ip: usize,
    steps: usize,
    state: EngineState,
}

impl<'a> Engine<'a> {
    pub fn new(
        program: &'a Program,
        tape: &'a mut Tape,
        output: &'a mut dyn OutputSink,
        input: &'a mut dyn InputSource,
    ) -> Self {
        let state = if program.is_empty() {
            EngineState::Halted
        } else {
            EngineState::Running
        };
        Self {
            program,
            tape,
            output,
            input,
            control: None,
            ip: 0,
            steps: 0,
            state,
        }
    }

    pub fn with_control(mut self, control: Option<&'a StepControl>) -> Self {
        self.control = control;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    /// Instructions executed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn tape(&self) -> &Tape {
        self.tape
    }

    /// Run until the program halts or faults.
    pub fn run(&mut self) -> Result<usize, BitLangError> {
        while self.step()?.is_some() {}
        Ok(self.steps)
    }

    /// Execute one instruction. Returns `Ok(None)` once halted.
    pub fn step(&mut self) -> Result<Option<Step>, BitLangError> {
        if self.state != EngineState::Running {
            return Ok(None);
        }
        match self.execute_one() {
            Ok(step) => {
                if self.ip >= self.program.len() {
                    self.state = EngineState::Halted;
                }
                Ok(Some(step))
            }
            Err(err) => {
                self.state = EngineState::Faulted;
                Err(err)
            }
        }
    }

    fn execute_one(&mut self) -> Result<Step, BitLangError> {
        // Cooperative cancellation check and step counting
        if let Some(ctrl) = self.control {
            if ctrl.cancel_flag.load(Ordering::Relaxed) {
                return Err(BitLangError::Canceled);
            }
            if let Some(max) = ctrl.max_steps {
                if self.steps >= max {
                    return Err(BitLangError::StepLimitExceeded { limit: max });
                }
            }
        }

        let ip = self.ip;
        let op = self.program.ops()[ip];
        let step = Step {
            index: self.steps,
            ip,
            op,
            cursor: self.tape.cursor(),
            cell: self.tape.read(),
        };

        let mut next = ip + 1;
        match op {
            Op::Increment => {
                self.tape.increment();
            }
            Op::Decrement => {
                self.tape.decrement();
            }
            Op::MoveRight => {
                self.tape.move_right().map_err(|_| self.out_of_bounds(op))?;
            }
            Op::MoveLeft => {
                self.tape.move_left().map_err(|_| self.out_of_bounds(op))?;
            }
            Op::Output => {
                self.output
                    .emit(self.tape.read())
                    .map_err(|source| BitLangError::Callback { ip, source })?;
            }
            Op::Input => {
                let value = self
                    .input
                    .read()
                    .map_err(|source| BitLangError::Callback { ip, source })?;
                self.tape.write(value);
            }
            Op::LoopStart => {
                if self.tape.read() == 0 {
                    next = self.partner(ip) + 1;
                }
            }
            Op::LoopEnd => {
                if self.tape.read() != 0 {
                    next = self.partner(ip) + 1;
                }
            }
        }

        self.steps += 1;
        self.ip = next;
        Ok(step)
    }

    fn partner(&self, ip: usize) -> usize {
        // Every bracket is resolved when the Program is built.
        self.program.jumps().partner(ip).unwrap_or(ip)
    }

    fn out_of_bounds(&self, op: Op) -> BitLangError {
        BitLangError::OutOfBounds {
            ip: self.ip,
            cursor: self.tape.cursor(),
            op,
        }
    }
}

/// Run `program` to completion, returning the number of executed steps.
pub fn execute(
    program: &Program,
    tape: &mut Tape,
    output: &mut dyn OutputSink,
    input: &mut dyn InputSource,
    control: Option<&StepControl>,
) -> Result<usize, BitLangError> {
    Engine::new(program, tape, output, input)
        .with_control(control)
        .run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallbackError;
    use crate::io::{ByteInput, ConstantInput, NullSink};

    fn run_on(code: &str, size: usize) -> (Result<usize, BitLangError>, Tape, Vec<u8>) {
        let program = Program::parse(code).unwrap();
        let mut tape = Tape::new(size).unwrap();
        let mut out: Vec<u8> = Vec::new();
        let res = execute(&program, &mut tape, &mut out, &mut ConstantInput(0), None);
        (res, tape, out)
    }

    #[test]
    fn empty_program_halts_immediately() {
        let program = Program::parse("").unwrap();
        let mut tape = Tape::new(4).unwrap();
        let mut out: Vec<u8> = Vec::new();
        let mut input = ConstantInput(0);
        let mut engine = Engine::new(&program, &mut tape, &mut out, &mut input);
        assert_eq!(engine.state(), EngineState::Halted);
        assert_eq!(engine.run().unwrap(), 0);
        assert!(out.is_empty());
        assert_eq!(tape, Tape::new(4).unwrap());
    }

    #[test]
    fn empty_loop_on_zero_cell_is_ok() {
        let (res, _, _) = run_on("[]", 10);
        assert_eq!(res.unwrap(), 1);
    }

    #[test]
    fn simple_program_without_io_runs_ok() {
        let (res, tape, _) = run_on("+++[-]", 10);
        assert!(res.is_ok());
        assert_eq!(tape.read(), 0);
    }

    #[test]
    fn transfer_loop_moves_value() {
        let (res, tape, _) = run_on("+++[->+<]>", 5);
        assert!(res.is_ok());
        assert_eq!(tape.get(0), Some(0));
        assert_eq!(tape.get(1), Some(3));
        assert_eq!(tape.cursor(), 1);
    }

    #[test]
    fn loop_skips_body_when_cell_is_zero() {
        let (res, tape, out) = run_on("[+.]+", 2);
        assert!(res.is_ok());
        assert!(out.is_empty());
        assert_eq!(tape.read(), 1);
    }

    #[test]
    fn output_order_matches_execution_order() {
        let (res, _, out) = run_on("+.+.+.", 1);
        assert!(res.is_ok());
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn left_pointer_out_of_bounds_faults_without_mutation() {
        let program = Program::parse("++<").unwrap();
        let mut tape = Tape::new(3).unwrap();
        let mut sink = NullSink;
        let mut input = ConstantInput(0);
        let mut engine = Engine::new(&program, &mut tape, &mut sink, &mut input);
        let err = engine.run().unwrap_err();
        assert!(matches!(err, BitLangError::OutOfBounds { ip: 2, cursor: 0, op: Op::MoveLeft }));
        assert_eq!(engine.state(), EngineState::Faulted);
        assert_eq!(engine.tape().get(0), Some(2));
        assert_eq!(engine.tape().cursor(), 0);
    }

    #[test]
    fn right_pointer_out_of_bounds_errors() {
        // With 3 cells (0..=2), the 3rd '>' attempts to move beyond index 2.
        let (res, tape, _) = run_on(">>>", 3);
        assert!(matches!(res, Err(BitLangError::OutOfBounds { ip: 2, cursor: 2, op: Op::MoveRight })));
        assert_eq!(tape.cursor(), 2);
    }

    #[test]
    fn input_value_is_stored_and_echoed() {
        let program = Program::parse(",.").unwrap();
        let mut tape = Tape::new(1).unwrap();
        let mut out: Vec<u8> = Vec::new();
        execute(&program, &mut tape, &mut out, &mut ConstantInput(65), None).unwrap();
        assert_eq!(out, vec![65]);
    }

    #[test]
    fn input_wraps_mod_256() {
        let program = Program::parse(",").unwrap();
        let mut tape = Tape::new(1).unwrap();
        execute(&program, &mut tape, &mut NullSink, &mut ConstantInput(257), None).unwrap();
        assert_eq!(tape.read(), 1);
    }

    #[test]
    fn echo_until_eof() {
        let program = Program::parse(",[.,]").unwrap();
        let mut tape = Tape::new(1).unwrap();
        let mut out: Vec<u8> = Vec::new();
        let mut input = ByteInput::new(b"hi".to_vec());
        execute(&program, &mut tape, &mut out, &mut input, None).unwrap();
        assert_eq!(out, b"hi");
    }

    struct FailingSink;

    impl OutputSink for FailingSink {
        fn emit(&mut self, _byte: u8) -> Result<(), CallbackError> {
            Err(CallbackError::Aborted)
        }
    }

    #[test]
    fn callback_failure_aborts_and_keeps_tape() {
        let program = Program::parse("++.+").unwrap();
        let mut tape = Tape::new(1).unwrap();
        let res = execute(&program, &mut tape, &mut FailingSink, &mut ConstantInput(0), None);
        assert!(matches!(
            res,
            Err(BitLangError::Callback { ip: 2, source: CallbackError::Aborted })
        ));
        assert_eq!(tape.read(), 2);
    }

    #[test]
    fn step_limit_stops_infinite_loop() {
        let program = Program::parse("+[]").unwrap();
        let mut tape = Tape::new(1).unwrap();
        let ctrl = StepControl::with_max_steps(50);
        let res = execute(&program, &mut tape, &mut NullSink, &mut ConstantInput(0), Some(&ctrl));
        assert!(matches!(res, Err(BitLangError::StepLimitExceeded { limit: 50 })));
    }

    #[test]
    fn cancel_flag_stops_before_next_instruction() {
        let program = Program::parse("+++").unwrap();
        let mut tape = Tape::new(1).unwrap();
        let ctrl = StepControl::new(None, Arc::new(AtomicBool::new(true)));
        let res = execute(&program, &mut tape, &mut NullSink, &mut ConstantInput(0), Some(&ctrl));
        assert!(matches!(res, Err(BitLangError::Canceled)));
        assert_eq!(tape.read(), 0);
    }

    #[test]
    fn stepping_reports_state_before_each_instruction() {
        let program = Program::parse("+>").unwrap();
        let mut tape = Tape::new(2).unwrap();
        let mut sink = NullSink;
        let mut input = ConstantInput(0);
        let mut engine = Engine::new(&program, &mut tape, &mut sink, &mut input);

        let first = engine.step().unwrap().unwrap();
        assert_eq!((first.ip, first.op, first.cursor, first.cell), (0, Op::Increment, 0, 0));
        let second = engine.step().unwrap().unwrap();
        assert_eq!((second.index, second.op, second.cell), (1, Op::MoveRight, 1));
        assert_eq!(engine.state(), EngineState::Halted);
        assert!(engine.step().unwrap().is_none());
        assert_eq!(engine.tape().cursor(), 1);
    }
}
