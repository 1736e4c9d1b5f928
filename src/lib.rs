//! Symbolic execution and call-graph core for deobfuscating JVM class files
//!
//! Obfuscators scramble the structure a human (or a later rewriting pass) needs: which value
//! feeds which instruction, who calls whom, which parameters are actually used. This crate
//! rebuilds that structure from decoded class files:
//!
//!   - [`execution::execute_method`] abstractly interprets a method, simulating every control
//!     path - including a conservative fork into every covering exception handler - on a
//!     symbolic operand stack, and hands back the def-use trace of stack pushes to their
//!     consuming pops
//!   - [`analysis::build_call_graph`] resolves every invoke site against the loaded class group
//!     and records the caller/callee edges that renaming and pruning passes navigate
//!   - [`jvm::code::Instruction::remove_parameter`] is the call-site primitive a dead-argument
//!     elimination driver applies across all call sites of a method
//!
//! Parsing class files into the [`jvm::model`] types, writing them back out, and deciding what to
//! rename or delete are all jobs of the surrounding toolchain; this crate only consumes the
//! in-memory model and mutates it (new pool entries, rewritten operands, call edges).
//!
//! ### Example
//!
//! A class group with `a/A.foo()` calling `b/B.bar(I)V`:
//!
//! ```
//! use deshade::analysis;
//! use deshade::jvm::code::{Instruction, InstructionSequence};
//! use deshade::jvm::model::{ClassFile, ClassGroup, Code, Method, MethodId};
//! use deshade::jvm::{
//!     ClassAccessFlags, MethodAccessFlags, MethodDescriptor, MethodRef, Name, ParseDescriptor,
//!     RefType, UnqualifiedName,
//! };
//! use deshade::jvm::BinaryName;
//!
//! # fn main() -> Result<(), deshade::jvm::Error> {
//! let mut group = ClassGroup::new();
//!
//! let mut b = ClassFile::new(
//!     BinaryName::from_string("b/B".to_string()).unwrap(),
//!     Some(BinaryName::OBJECT),
//!     ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//! );
//! b.add_method(Method::new(
//!     UnqualifiedName::from_string("bar".to_string()).unwrap(),
//!     MethodDescriptor::parse("(I)V")?,
//!     MethodAccessFlags::PUBLIC,
//! ));
//! let b_id = group.add_class(b);
//!
//! let mut a = ClassFile::new(
//!     BinaryName::from_string("a/A".to_string()).unwrap(),
//!     Some(BinaryName::OBJECT),
//!     ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//! );
//! let mut foo = Method::new(
//!     UnqualifiedName::from_string("foo".to_string()).unwrap(),
//!     MethodDescriptor::parse("()V")?,
//!     MethodAccessFlags::PUBLIC,
//! );
//! foo.code = Some(Code {
//!     max_stack: 2,
//!     max_locals: 1,
//!     instructions: vec![
//!         Instruction::ALoad0,
//!         Instruction::IConst0,
//!         Instruction::InvokeVirtual(MethodRef {
//!             class: RefType::Object(BinaryName::from_string("b/B".to_string()).unwrap()),
//!             name: UnqualifiedName::from_string("bar".to_string()).unwrap(),
//!             descriptor: MethodDescriptor::parse("(I)V")?,
//!         }),
//!         Instruction::Return,
//!     ]
//!     .into_iter()
//!     .collect::<InstructionSequence>(),
//!     exception_table: vec![],
//! });
//! let foo_index = a.add_method(foo);
//! let a_id = group.add_class(a);
//!
//! analysis::build_call_graph(&mut group);
//!
//! let foo = group.method(MethodId { class: a_id, index: foo_index });
//! assert_eq!(foo.calls_to.len(), 1);
//! assert_eq!(foo.calls_to[0].method, MethodId { class: b_id, index: 0 });
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod execution;
pub mod jvm;
pub mod util;
