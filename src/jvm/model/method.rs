use super::class::MethodId;
use crate::jvm::access_flags::MethodAccessFlags;
use crate::jvm::code::InstructionSequence;
use crate::jvm::descriptors::{MethodDescriptor, RefType};
use crate::jvm::names::UnqualifiedName;

/// One method under analysis
pub struct Method {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
    pub access_flags: MethodAccessFlags,

    /// Decoded body, absent for `abstract` and `native` methods
    pub code: Option<Code>,

    /// Call sites in this method, by callee and pc of the invoking instruction
    ///
    /// Populated by the call-graph pass; two calls to the same method from different pcs are two
    /// entries.
    pub calls_to: Vec<CallSite>,

    /// Call sites elsewhere that invoke this method, by caller and pc inside the caller
    pub called_from: Vec<CallSite>,
}

impl Method {
    pub fn new(
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
        access_flags: MethodAccessFlags,
    ) -> Method {
        Method {
            name,
            descriptor,
            access_flags,
            code: None,
            calls_to: vec![],
            called_from: vec![],
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Record an outgoing call edge from the instruction at `site_pc` to `target`
    pub fn add_call_to(&mut self, site_pc: u16, target: MethodId) {
        self.calls_to.push(CallSite {
            method: target,
            pc: site_pc,
        });
    }

    /// Record an incoming call edge from the instruction at `site_pc` inside `caller`
    pub fn add_called_from(&mut self, caller: MethodId, site_pc: u16) {
        self.called_from.push(CallSite {
            method: caller,
            pc: site_pc,
        });
    }
}

/// One endpoint of a call-graph edge: the method at the far end, and the pc of the call-site
/// instruction (always a pc in the *calling* method's code)
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CallSite {
    pub method: MethodId,
    pub pc: u16,
}

/// Decoded body of a method
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,

    /// Instruction sequence, addressed by pc
    pub instructions: InstructionSequence,

    pub exception_table: Vec<ExceptionHandler>,
}

/// A protected pc range and where its handler starts
#[derive(Clone, Debug)]
pub struct ExceptionHandler {
    /// Start of the protected range (inclusive)
    pub start_pc: u16,

    /// End of the protected range (exclusive)
    pub end_pc: u16,

    /// First instruction of the handler
    pub handler_pc: u16,

    /// Exception class caught by this handler, `None` for a catch-all
    pub catch_type: Option<RefType>,
}

impl ExceptionHandler {
    /// Is the instruction at `pc` protected by this handler?
    pub fn covers(&self, pc: u16) -> bool {
        self.start_pc <= pc && pc < self.end_pc
    }
}
