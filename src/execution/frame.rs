use crate::jvm::{BinaryName, Error, MethodDescriptor, RefType, StackType};
use crate::util::Width;
use std::collections::HashSet;
use std::fmt;

/// Id of a [`StackValue`] inside one [`MethodTrace`]
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ValueId(usize);

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("v{}", self.0))
    }
}

/// Id of a [`Step`] inside one [`MethodTrace`]
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct StepId(usize);

impl fmt::Debug for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("s{}", self.0))
    }
}

/// One symbolic operand-stack value: which step produced it and the type it carries
///
/// Values are owned by the trace and shared by id; when control flow forks, both paths may end up
/// consuming the same value.
#[derive(Clone, Debug)]
pub struct StackValue {
    pub producer: StepId,
    pub ty: StackType,
}

/// How a step came to execute
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum StepKind {
    /// Ordinary execution of the instruction at the step's pc
    Normal,

    /// Entry into an exception handler forked off the instruction at the step's pc
    ExceptionEntry,
}

/// One executed interpretation step of one instruction along one path
///
/// An instruction reached along several forked paths gets one step per path.
#[derive(Clone, Debug)]
pub struct Step {
    pub pc: u16,
    pub kind: StepKind,

    /// Values this step consumed from the operand stack, in pop order
    pub pops: Vec<ValueId>,

    /// Values this step produced onto the operand stack, in push order
    pub pushes: Vec<ValueId>,
}

/// The def-use trace of one method: every interpretation step across every forked path, and
/// every symbolic stack value those steps produced
#[derive(Debug)]
pub struct MethodTrace {
    steps: Vec<Step>,
    values: Vec<StackValue>,
}

impl MethodTrace {
    pub(crate) fn new() -> MethodTrace {
        MethodTrace {
            steps: vec![],
            values: vec![],
        }
    }

    pub(crate) fn begin_step(&mut self, pc: u16, kind: StepKind) -> StepId {
        let id = StepId(self.steps.len());
        self.steps.push(Step {
            pc,
            kind,
            pops: vec![],
            pushes: vec![],
        });
        id
    }

    pub(crate) fn record_pop(&mut self, step: StepId, value: ValueId) {
        self.steps[step.0].pops.push(value);
    }

    /// Create a fresh value produced by `step` and record the push
    pub(crate) fn produce(&mut self, step: StepId, ty: StackType) -> ValueId {
        let id = ValueId(self.values.len());
        self.values.push(StackValue {
            producer: step,
            ty,
        });
        self.steps[step.0].pushes.push(id);
        id
    }

    pub fn step(&self, id: StepId) -> &Step {
        &self.steps[id.0]
    }

    pub fn value(&self, id: ValueId) -> &StackValue {
        &self.values[id.0]
    }

    /// All steps, in the order they executed
    pub fn steps(&self) -> impl Iterator<Item = (StepId, &Step)> + '_ {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| (StepId(index), step))
    }

    /// All steps recorded for the instruction at `pc` (one per path that reached it)
    pub fn steps_at(&self, pc: u16) -> impl Iterator<Item = &Step> + '_ {
        self.steps.iter().filter(move |step| step.pc == pc)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }
}

/// One abstract-interpretation state along one control path
///
/// Forking clones the whole frame; two paths never share mutable state (they do share the
/// already-produced values of the trace, by id).
#[derive(Clone)]
pub(crate) struct Frame {
    pub pc: u16,

    /// Operand stack of value ids, bottom first
    pub stack: Vec<ValueId>,

    /// Type view of the local variables; wide types occupy their slot and leave the next one
    /// `None`
    pub locals: Vec<Option<StackType>>,

    /// Pcs this path has already interpreted; a revisit ends the path
    pub visited: HashSet<u16>,
}

impl Frame {
    /// Frame at method entry: empty stack, locals seeded from the receiver and parameter types
    pub(crate) fn entry(
        descriptor: &MethodDescriptor,
        this_class: Option<&BinaryName>,
        max_locals: u16,
    ) -> Frame {
        let mut locals: Vec<Option<StackType>> = vec![None; max_locals as usize];
        let mut slot = 0;

        let mut assign = |locals: &mut Vec<Option<StackType>>, ty: StackType| {
            let width = ty.width();
            if locals.len() < slot + width {
                locals.resize(slot + width, None);
            }
            locals[slot] = Some(ty);
            slot += width;
        };

        if let Some(class) = this_class {
            assign(
                &mut locals,
                StackType::Reference(Some(RefType::Object(class.clone()))),
            );
        }
        for parameter in &descriptor.parameters {
            assign(&mut locals, parameter.stack_type());
        }

        Frame {
            pc: 0,
            stack: vec![],
            locals,
            visited: HashSet::new(),
        }
    }

    /// Duplicate this frame into an independent path
    pub(crate) fn fork(&self) -> Frame {
        self.clone()
    }

    /// Pop the top of the operand stack; an empty stack is a fatal interpretation error
    pub(crate) fn pop(&mut self, pc: u16) -> Result<ValueId, Error> {
        self.stack.pop().ok_or(Error::StackUnderflow { pc })
    }

    pub(crate) fn push(&mut self, value: ValueId) {
        self.stack.push(value);
    }

    /// Type currently held by a local slot, when one is known
    pub(crate) fn local(&self, index: u16) -> Option<&StackType> {
        self.locals.get(index as usize).and_then(|slot| slot.as_ref())
    }

    /// Overwrite a local slot (and, for wide types, shadow the one after it)
    pub(crate) fn set_local(&mut self, index: u16, ty: StackType, pc: u16) -> Result<(), Error> {
        let index = index as usize;
        let width = ty.width();
        if index + width > self.locals.len() {
            return Err(Error::LocalOutOfRange {
                index: index as u16,
                pc,
            });
        }
        self.locals[index] = Some(ty);
        if width == 2 {
            self.locals[index + 1] = None;
        }
        Ok(())
    }
}
