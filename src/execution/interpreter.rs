use super::frame::{Frame, MethodTrace, StepId, StepKind, ValueId};
use super::settings::Settings;
use crate::jvm::code::{Instruction, WideInsn};
use crate::jvm::model::{ClassFile, ClassGroup, Code, Method, MethodId};
use crate::jvm::{
    BinaryName, Error, FieldType, PoolEntry, RefType, RenderDescriptor, StackType,
};
use crate::util::Width;

/// Where control goes after a step
enum Flow {
    /// Fall through to the next instruction
    Advance,

    /// Unconditional jump
    Jump(u16),

    /// Conditional branch: fork a path at the target, fall through on this one
    Branch(u16),

    /// Switch: fork a path at every target, this path is done
    Switch(Vec<u16>),

    /// `jsr`: fork a path at the subroutine with a return address pushed, fall through here
    Subroutine(u16),

    /// Path is done (return, throw, `ret`)
    End,
}

/// Interpret every path through one method and collect the def-use trace
///
/// The walk starts one frame at the method entry and forks it at conditional branches, at
/// switches, and - for every instruction inside a protected range - into the covering exception
/// handlers. Each path ends at a return/throw, or as soon as it revisits a pc it already
/// executed, so every acyclic path is interpreted exactly once.
///
/// Malformed bytecode (stack underflow, branches to non-boundaries, bad local indices) fails the
/// whole method with an [`Error::InMethod`] identifying it; the caller decides whether that sinks
/// the run or just this method.
pub fn execute_method(
    group: &ClassGroup,
    id: MethodId,
    settings: &Settings,
) -> Result<MethodTrace, Error> {
    let class = group.class(id.class);
    let method = group.method(id);
    interpret(class, method, settings).map_err(|source| Error::InMethod {
        class: class.name.clone(),
        method: method.name.clone(),
        descriptor: method.descriptor.render(),
        source: Box::new(source),
    })
}

fn interpret(class: &ClassFile, method: &Method, settings: &Settings) -> Result<MethodTrace, Error> {
    let mut trace = MethodTrace::new();
    let code = match &method.code {
        Some(code) => code,
        None => {
            log::debug!(
                "skipping bodyless method {:?}.{:?}",
                class.name,
                method.name
            );
            return Ok(trace);
        }
    };
    log::trace!("interpreting {:?}.{:?}", class.name, method.name);

    let this_class = if method.is_static() {
        None
    } else {
        Some(&class.name)
    };
    let mut worklist = vec![Frame::entry(&method.descriptor, this_class, code.max_locals)];
    let mut steps_taken = 0usize;

    while let Some(mut frame) = worklist.pop() {
        loop {
            // Each path interprets any pc at most once
            if !frame.visited.insert(frame.pc) {
                break;
            }
            steps_taken += 1;
            if steps_taken > settings.step_budget {
                return Err(Error::StepBudgetExceeded {
                    budget: settings.step_budget,
                });
            }

            let pc = frame.pc;
            let insn = match code.instructions.get(pc) {
                Some(insn) => insn,
                None => return Err(Error::InvalidBranchTarget { pc, target: pc }),
            };
            let width = insn.width() as u16;

            let step = trace.begin_step(pc, StepKind::Normal);
            let (pushes, flow) = step_instruction(insn, &mut frame, step, &mut trace, pc)?;

            // Every covered instruction forks into its handlers, whether or not it can throw
            for handler in &code.exception_table {
                if handler.covers(pc) {
                    ensure_target(code, pc, handler.handler_pc)?;
                    let mut fork = frame.fork();
                    fork.stack.clear();
                    let fork_step = trace.begin_step(pc, StepKind::ExceptionEntry);
                    let thrown = trace.produce(
                        fork_step,
                        StackType::Reference(Some(RefType::Object(
                            settings.synthetic_throwable.clone(),
                        ))),
                    );
                    fork.push(thrown);
                    fork.pc = handler.handler_pc;
                    worklist.push(fork);
                }
            }

            for ty in pushes {
                let value = trace.produce(step, ty);
                frame.push(value);
            }

            match flow {
                Flow::Advance => {
                    frame.pc = advance(code, pc, width)?;
                }
                Flow::Jump(target) => {
                    ensure_target(code, pc, target)?;
                    frame.pc = target;
                }
                Flow::Branch(target) => {
                    ensure_target(code, pc, target)?;
                    let mut fork = frame.fork();
                    fork.pc = target;
                    worklist.push(fork);
                    frame.pc = advance(code, pc, width)?;
                }
                Flow::Switch(targets) => {
                    for target in targets {
                        ensure_target(code, pc, target)?;
                        let mut fork = frame.fork();
                        fork.pc = target;
                        worklist.push(fork);
                    }
                    break;
                }
                Flow::Subroutine(target) => {
                    ensure_target(code, pc, target)?;
                    let mut fork = frame.fork();
                    let return_address = trace.produce(step, StackType::Reference(None));
                    fork.push(return_address);
                    fork.pc = target;
                    worklist.push(fork);
                    frame.pc = advance(code, pc, width)?;
                }
                Flow::End => break,
            }
        }
    }

    Ok(trace)
}

/// Pc of the next instruction when falling through
fn advance(code: &Code, pc: u16, width: u16) -> Result<u16, Error> {
    let next = pc as u32 + width as u32;
    if next >= code.instructions.code_len() as u32 {
        Err(Error::CodeFallsThrough { pc })
    } else {
        Ok(next as u16)
    }
}

/// Check that a jump target is an instruction boundary
fn ensure_target(code: &Code, pc: u16, target: u16) -> Result<(), Error> {
    if code.instructions.get(target).is_some() {
        Ok(())
    } else {
        Err(Error::InvalidBranchTarget { pc, target })
    }
}

/// Absolute pc of a relative branch offset
fn branch_target(pc: u16, offset: i32) -> Result<u16, Error> {
    let target = pc as i32 + offset;
    if (0..=i32::from(u16::MAX)).contains(&target) {
        Ok(target as u16)
    } else {
        Err(Error::InvalidBranchTarget {
            pc,
            target: target.clamp(0, i32::from(u16::MAX)) as u16,
        })
    }
}

fn pop(
    frame: &mut Frame,
    trace: &mut MethodTrace,
    step: StepId,
    pc: u16,
) -> Result<ValueId, Error> {
    let value = frame.pop(pc)?;
    trace.record_pop(step, value);
    Ok(value)
}

/// Pop and return the popped value's type
fn pop_ty(
    frame: &mut Frame,
    trace: &mut MethodTrace,
    step: StepId,
    pc: u16,
) -> Result<StackType, Error> {
    let value = pop(frame, trace, step, pc)?;
    Ok(trace.value(value).ty.clone())
}

/// Pop a value that must be of width 1 (the dup/swap family picks its form by width)
fn pop_w1(
    frame: &mut Frame,
    trace: &mut MethodTrace,
    step: StepId,
    pc: u16,
) -> Result<StackType, Error> {
    let ty = pop_ty(frame, trace, step, pc)?;
    match ty.width() {
        1 => Ok(ty),
        width => Err(Error::InvalidWidth { width, pc }),
    }
}

/// Stack type a loadable constant pushes
fn loaded_constant_type(entry: &PoolEntry, pc: u16) -> Result<StackType, Error> {
    match entry {
        PoolEntry::Integer(_) => Ok(StackType::Int),
        PoolEntry::Float(_) => Ok(StackType::Float),
        PoolEntry::Long(_) => Ok(StackType::Long),
        PoolEntry::Double(_) => Ok(StackType::Double),
        PoolEntry::String(_) => Ok(StackType::Reference(Some(RefType::Object(
            BinaryName::STRING,
        )))),
        PoolEntry::Class(_) => Ok(StackType::Reference(Some(RefType::Object(
            BinaryName::CLASS,
        )))),
        _ => Err(Error::NotLoadableConstant { pc }),
    }
}

/// Type an `aload` pushes: whatever reference the local holds, if the frame knows it
fn loaded_reference(frame: &Frame, index: u16) -> StackType {
    match frame.local(index) {
        Some(StackType::Reference(class)) => StackType::Reference(class.clone()),
        _ => StackType::Reference(None),
    }
}

/// Pop a value and write its type into a local slot
fn store_local(
    frame: &mut Frame,
    trace: &mut MethodTrace,
    step: StepId,
    pc: u16,
    index: u16,
) -> Result<(), Error> {
    let ty = pop_ty(frame, trace, step, pc)?;
    frame.set_local(index, ty, pc)
}

/// Apply one instruction's stack effect: pop its operands (recording them on `step`) and report
/// what it pushes plus where control goes. The returned pushes are applied by the caller *after*
/// exception forking, matching the order in which handler paths are split off.
fn step_instruction(
    insn: &Instruction,
    frame: &mut Frame,
    step: StepId,
    trace: &mut MethodTrace,
    pc: u16,
) -> Result<(Vec<StackType>, Flow), Error> {
    use Instruction::*;

    let effect = match insn {
        Nop | IInc(_, _) | Wide(WideInsn::IInc(_, _)) => (vec![], Flow::Advance),

        AConstNull => (vec![StackType::Reference(None)], Flow::Advance),
        IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 | BiPush(_)
        | SiPush(_) => (vec![StackType::Int], Flow::Advance),
        LConst0 | LConst1 => (vec![StackType::Long], Flow::Advance),
        FConst0 | FConst1 | FConst2 => (vec![StackType::Float], Flow::Advance),
        DConst0 | DConst1 => (vec![StackType::Double], Flow::Advance),

        Ldc(entry) | LdcW(entry) | Ldc2W(entry) => {
            (vec![loaded_constant_type(entry, pc)?], Flow::Advance)
        }

        ILoad(_) | ILoad0 | ILoad1 | ILoad2 | ILoad3 | Wide(WideInsn::ILoad(_)) => {
            (vec![StackType::Int], Flow::Advance)
        }
        LLoad(_) | LLoad0 | LLoad1 | LLoad2 | LLoad3 | Wide(WideInsn::LLoad(_)) => {
            (vec![StackType::Long], Flow::Advance)
        }
        FLoad(_) | FLoad0 | FLoad1 | FLoad2 | FLoad3 | Wide(WideInsn::FLoad(_)) => {
            (vec![StackType::Float], Flow::Advance)
        }
        DLoad(_) | DLoad0 | DLoad1 | DLoad2 | DLoad3 | Wide(WideInsn::DLoad(_)) => {
            (vec![StackType::Double], Flow::Advance)
        }
        ALoad(index) => (vec![loaded_reference(frame, *index as u16)], Flow::Advance),
        ALoad0 => (vec![loaded_reference(frame, 0)], Flow::Advance),
        ALoad1 => (vec![loaded_reference(frame, 1)], Flow::Advance),
        ALoad2 => (vec![loaded_reference(frame, 2)], Flow::Advance),
        ALoad3 => (vec![loaded_reference(frame, 3)], Flow::Advance),
        Wide(WideInsn::ALoad(index)) => (vec![loaded_reference(frame, *index)], Flow::Advance),

        IALoad | BALoad | CALoad | SALoad => {
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            (vec![StackType::Int], Flow::Advance)
        }
        LALoad => {
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            (vec![StackType::Long], Flow::Advance)
        }
        FALoad => {
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            (vec![StackType::Float], Flow::Advance)
        }
        DALoad => {
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            (vec![StackType::Double], Flow::Advance)
        }
        AALoad => {
            pop(frame, trace, step, pc)?;
            let array = pop(frame, trace, step, pc)?;
            let element = match &trace.value(array).ty {
                StackType::Reference(Some(ref_type)) => ref_type
                    .element_type()
                    .map(|field_type| field_type.stack_type())
                    .unwrap_or(StackType::Reference(None)),
                _ => StackType::Reference(None),
            };
            (vec![element], Flow::Advance)
        }

        IStore(index) | LStore(index) | FStore(index) | DStore(index) | AStore(index) => {
            store_local(frame, trace, step, pc, *index as u16)?;
            (vec![], Flow::Advance)
        }
        IStore0 | LStore0 | FStore0 | DStore0 | AStore0 => {
            store_local(frame, trace, step, pc, 0)?;
            (vec![], Flow::Advance)
        }
        IStore1 | LStore1 | FStore1 | DStore1 | AStore1 => {
            store_local(frame, trace, step, pc, 1)?;
            (vec![], Flow::Advance)
        }
        IStore2 | LStore2 | FStore2 | DStore2 | AStore2 => {
            store_local(frame, trace, step, pc, 2)?;
            (vec![], Flow::Advance)
        }
        IStore3 | LStore3 | FStore3 | DStore3 | AStore3 => {
            store_local(frame, trace, step, pc, 3)?;
            (vec![], Flow::Advance)
        }
        Wide(
            WideInsn::IStore(index)
            | WideInsn::LStore(index)
            | WideInsn::FStore(index)
            | WideInsn::DStore(index)
            | WideInsn::AStore(index),
        ) => {
            store_local(frame, trace, step, pc, *index)?;
            (vec![], Flow::Advance)
        }

        IAStore | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore | SAStore => {
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            (vec![], Flow::Advance)
        }

        Pop => {
            pop(frame, trace, step, pc)?;
            (vec![], Flow::Advance)
        }
        Pop2 => {
            let ty = pop_ty(frame, trace, step, pc)?;
            if ty.width() == 1 {
                pop(frame, trace, step, pc)?;
            }
            (vec![], Flow::Advance)
        }
        Dup => {
            let ty = pop_w1(frame, trace, step, pc)?;
            (vec![ty.clone(), ty], Flow::Advance)
        }
        DupX1 => {
            let ty1 = pop_w1(frame, trace, step, pc)?;
            let ty2 = pop_w1(frame, trace, step, pc)?;
            (vec![ty1.clone(), ty2, ty1], Flow::Advance)
        }
        DupX2 => {
            let ty1 = pop_w1(frame, trace, step, pc)?;
            let ty2 = pop_ty(frame, trace, step, pc)?;
            match ty2.width() {
                1 => {
                    let ty3 = pop_w1(frame, trace, step, pc)?;
                    (vec![ty1.clone(), ty3, ty2, ty1], Flow::Advance)
                }
                _ => (vec![ty1.clone(), ty2, ty1], Flow::Advance),
            }
        }
        Dup2 => {
            let ty1 = pop_ty(frame, trace, step, pc)?;
            match ty1.width() {
                1 => {
                    let ty2 = pop_w1(frame, trace, step, pc)?;
                    (vec![ty2.clone(), ty1.clone(), ty2, ty1], Flow::Advance)
                }
                _ => (vec![ty1.clone(), ty1], Flow::Advance),
            }
        }
        Dup2X1 => {
            let ty1 = pop_ty(frame, trace, step, pc)?;
            let ty2 = pop_w1(frame, trace, step, pc)?;
            match ty1.width() {
                1 => {
                    let ty3 = pop_w1(frame, trace, step, pc)?;
                    (
                        vec![ty2.clone(), ty1.clone(), ty3, ty2, ty1],
                        Flow::Advance,
                    )
                }
                _ => (vec![ty1.clone(), ty2, ty1], Flow::Advance),
            }
        }
        Dup2X2 => {
            let ty1 = pop_ty(frame, trace, step, pc)?;
            match ty1.width() {
                1 => {
                    let ty2 = pop_w1(frame, trace, step, pc)?;
                    let ty3 = pop_ty(frame, trace, step, pc)?;
                    match ty3.width() {
                        1 => {
                            let ty4 = pop_w1(frame, trace, step, pc)?;
                            (
                                vec![ty2.clone(), ty1.clone(), ty4, ty3, ty2, ty1],
                                Flow::Advance,
                            )
                        }
                        _ => (
                            vec![ty2.clone(), ty1.clone(), ty3, ty2, ty1],
                            Flow::Advance,
                        ),
                    }
                }
                _ => {
                    let ty2 = pop_ty(frame, trace, step, pc)?;
                    match ty2.width() {
                        1 => {
                            let ty3 = pop_w1(frame, trace, step, pc)?;
                            (vec![ty1.clone(), ty3, ty2, ty1], Flow::Advance)
                        }
                        _ => (vec![ty1.clone(), ty2, ty1], Flow::Advance),
                    }
                }
            }
        }
        Swap => {
            let ty1 = pop_w1(frame, trace, step, pc)?;
            let ty2 = pop_w1(frame, trace, step, pc)?;
            (vec![ty1, ty2], Flow::Advance)
        }

        IAdd | ISub | IMul | IDiv | IRem | IAnd | IOr | IXor | IShl | IShr | IUShr => {
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            (vec![StackType::Int], Flow::Advance)
        }
        LAdd | LSub | LMul | LDiv | LRem | LAnd | LOr | LXor | LShl | LShr | LUShr => {
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            (vec![StackType::Long], Flow::Advance)
        }
        FAdd | FSub | FMul | FDiv | FRem => {
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            (vec![StackType::Float], Flow::Advance)
        }
        DAdd | DSub | DMul | DDiv | DRem => {
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            (vec![StackType::Double], Flow::Advance)
        }

        INeg | I2B | I2C | I2S | L2I | F2I | D2I => {
            pop(frame, trace, step, pc)?;
            (vec![StackType::Int], Flow::Advance)
        }
        LNeg | I2L | F2L | D2L => {
            pop(frame, trace, step, pc)?;
            (vec![StackType::Long], Flow::Advance)
        }
        FNeg | I2F | L2F | D2F => {
            pop(frame, trace, step, pc)?;
            (vec![StackType::Float], Flow::Advance)
        }
        DNeg | I2D | L2D | F2D => {
            pop(frame, trace, step, pc)?;
            (vec![StackType::Double], Flow::Advance)
        }

        LCmp | FCmpL | FCmpG | DCmpL | DCmpG => {
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            (vec![StackType::Int], Flow::Advance)
        }

        IfEq(offset) | IfNe(offset) | IfLt(offset) | IfGe(offset) | IfGt(offset)
        | IfLe(offset) | IfNull(offset) | IfNonNull(offset) => {
            pop(frame, trace, step, pc)?;
            (vec![], Flow::Branch(branch_target(pc, *offset as i32)?))
        }
        IfICmpEq(offset) | IfICmpNe(offset) | IfICmpLt(offset) | IfICmpGe(offset)
        | IfICmpGt(offset) | IfICmpLe(offset) | IfACmpEq(offset) | IfACmpNe(offset) => {
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            (vec![], Flow::Branch(branch_target(pc, *offset as i32)?))
        }

        Goto(offset) => (vec![], Flow::Jump(branch_target(pc, *offset as i32)?)),
        GotoW(offset) => (vec![], Flow::Jump(branch_target(pc, *offset)?)),
        Jsr(offset) => (vec![], Flow::Subroutine(branch_target(pc, *offset as i32)?)),
        JsrW(offset) => (vec![], Flow::Subroutine(branch_target(pc, *offset)?)),
        Ret(_) | Wide(WideInsn::Ret(_)) => (vec![], Flow::End),

        TableSwitch(table) => {
            pop(frame, trace, step, pc)?;
            let mut targets = vec![branch_target(pc, table.default_offset)?];
            for offset in &table.jump_offsets {
                targets.push(branch_target(pc, *offset)?);
            }
            (vec![], Flow::Switch(targets))
        }
        LookupSwitch(lookup) => {
            pop(frame, trace, step, pc)?;
            let mut targets = vec![branch_target(pc, lookup.default_offset)?];
            for (_, offset) in &lookup.pairs {
                targets.push(branch_target(pc, *offset)?);
            }
            (vec![], Flow::Switch(targets))
        }

        IReturn | LReturn | FReturn | DReturn | AReturn => {
            pop(frame, trace, step, pc)?;
            (vec![], Flow::End)
        }
        Return => (vec![], Flow::End),

        GetStatic(field) => (vec![field.descriptor.stack_type()], Flow::Advance),
        GetField(field) => {
            pop(frame, trace, step, pc)?;
            (vec![field.descriptor.stack_type()], Flow::Advance)
        }
        PutStatic(_) => {
            pop(frame, trace, step, pc)?;
            (vec![], Flow::Advance)
        }
        PutField(_) => {
            pop(frame, trace, step, pc)?;
            pop(frame, trace, step, pc)?;
            (vec![], Flow::Advance)
        }

        InvokeVirtual(method) | InvokeSpecial(method) | InvokeInterface(method) => {
            // Arguments come off in reverse declaration order, the receiver last of all
            for _ in 0..method.descriptor.parameters.len() {
                pop(frame, trace, step, pc)?;
            }
            pop(frame, trace, step, pc)?;

            let pushes = match &method.descriptor.return_type {
                Some(return_type) => vec![return_type.stack_type()],
                None => vec![],
            };
            (pushes, Flow::Advance)
        }
        InvokeStatic(method) => {
            for _ in 0..method.descriptor.parameters.len() {
                pop(frame, trace, step, pc)?;
            }
            let pushes = match &method.descriptor.return_type {
                Some(return_type) => vec![return_type.stack_type()],
                None => vec![],
            };
            (pushes, Flow::Advance)
        }

        New(class) => (
            vec![StackType::Reference(Some(class.clone()))],
            Flow::Advance,
        ),
        NewArray(base_type) => {
            pop(frame, trace, step, pc)?;
            (
                vec![StackType::Reference(Some(RefType::array(FieldType::Base(
                    *base_type,
                ))))],
                Flow::Advance,
            )
        }
        ANewArray(class) => {
            pop(frame, trace, step, pc)?;
            (
                vec![StackType::Reference(Some(RefType::array(FieldType::Ref(
                    class.clone(),
                ))))],
                Flow::Advance,
            )
        }
        MultiANewArray(class, dimensions) => {
            for _ in 0..*dimensions {
                pop(frame, trace, step, pc)?;
            }
            (
                vec![StackType::Reference(Some(class.clone()))],
                Flow::Advance,
            )
        }
        ArrayLength => {
            pop(frame, trace, step, pc)?;
            (vec![StackType::Int], Flow::Advance)
        }

        AThrow => {
            pop(frame, trace, step, pc)?;
            (vec![], Flow::End)
        }
        CheckCast(class) => {
            pop(frame, trace, step, pc)?;
            (
                vec![StackType::Reference(Some(class.clone()))],
                Flow::Advance,
            )
        }
        InstanceOf(_) => {
            pop(frame, trace, step, pc)?;
            (vec![StackType::Int], Flow::Advance)
        }
        MonitorEnter | MonitorExit => {
            pop(frame, trace, step, pc)?;
            (vec![], Flow::Advance)
        }
    };

    Ok(effect)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::execution::StepKind;
    use crate::jvm::code::InstructionSequence;
    use crate::jvm::model::{ClassFile, ExceptionHandler, Method};
    use crate::jvm::{
        ClassAccessFlags, MethodAccessFlags, MethodDescriptor, ParseDescriptor,
        UnqualifiedName,
    };
    use crate::jvm::Name;

    fn single_method_group(
        descriptor: &str,
        access_flags: MethodAccessFlags,
        instructions: Vec<Instruction>,
        exception_table: Vec<ExceptionHandler>,
    ) -> (ClassGroup, MethodId) {
        let mut class = ClassFile::new(
            BinaryName::from_string("test/Subject".to_string()).unwrap(),
            Some(BinaryName::OBJECT),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        );
        let mut method = Method::new(
            UnqualifiedName::from_string("probe".to_string()).unwrap(),
            MethodDescriptor::parse(descriptor).unwrap(),
            access_flags,
        );
        method.code = Some(Code {
            max_stack: 8,
            max_locals: 8,
            instructions: instructions.into_iter().collect::<InstructionSequence>(),
            exception_table,
        });
        let index = class.add_method(method);

        let mut group = ClassGroup::new();
        let class_id = group.add_class(class);
        (
            group,
            MethodId {
                class: class_id,
                index,
            },
        )
    }

    #[test]
    fn straight_line_stack_balance() {
        use Instruction::*;

        let (group, id) = single_method_group(
            "()I",
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![IConst1, IConst2, IAdd, IReturn],
            vec![],
        );
        let trace = execute_method(&group, id, &Settings::default()).unwrap();

        assert_eq!(trace.step_count(), 4);

        // Net depth change across the fragment equals the sum of each step's pushes - pops
        let net: isize = trace
            .steps()
            .map(|(_, step)| step.pushes.len() as isize - step.pops.len() as isize)
            .sum();
        assert_eq!(net, 0);

        // The iadd consumed exactly the two constants and produced the returned value
        let iadd = trace.steps_at(2).next().unwrap();
        assert_eq!(iadd.pops.len(), 2);
        assert_eq!(iadd.pushes.len(), 1);
        assert_eq!(trace.value(iadd.pushes[0]).ty, StackType::Int);
    }

    #[test]
    fn popping_an_empty_stack_is_fatal() {
        use Instruction::*;

        let (group, id) = single_method_group(
            "()V",
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![Pop, Return],
            vec![],
        );
        let error = execute_method(&group, id, &Settings::default()).unwrap_err();

        match error {
            Error::InMethod {
                class,
                method,
                source,
                ..
            } => {
                assert_eq!(class.as_str(), "test/Subject");
                assert_eq!(method.as_str(), "probe");
                assert!(matches!(*source, Error::StackUnderflow { pc: 0 }));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn protected_instructions_fork_into_their_handler() {
        use Instruction::*;

        // 0: iconst_0, 1: ireturn, 2: astore_1, 3: return
        // Only pc 0 is protected.
        let (group, id) = single_method_group(
            "()I",
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![IConst0, IReturn, AStore1, Return],
            vec![ExceptionHandler {
                start_pc: 0,
                end_pc: 1,
                handler_pc: 2,
                catch_type: None,
            }],
        );
        let trace = execute_method(&group, id, &Settings::default()).unwrap();

        // Exactly one fork step, attributed to the protected instruction
        let forks: Vec<_> = trace
            .steps()
            .filter(|(_, step)| step.kind == StepKind::ExceptionEntry)
            .collect();
        assert_eq!(forks.len(), 1);
        let (_, fork) = forks[0];
        assert_eq!(fork.pc, 0);
        assert_eq!(fork.pops.len(), 0);
        assert_eq!(fork.pushes.len(), 1);
        assert_eq!(
            trace.value(fork.pushes[0]).ty,
            StackType::Reference(Some(RefType::Object(BinaryName::EXCEPTION)))
        );

        // The handler path ran: its astore consumed the synthetic throwable
        let astore = trace.steps_at(2).next().unwrap();
        assert_eq!(astore.kind, StepKind::Normal);
        assert_eq!(astore.pops, fork.pushes);

        // The instruction at pc 1 is outside [0, 1) and forked nothing
        assert!(trace
            .steps_at(1)
            .all(|step| step.kind == StepKind::Normal));
    }

    #[test]
    fn conditional_branches_explore_both_paths() {
        use Instruction::*;

        // 0: iload_0, 1: ifeq +5 (-> 6), 4: iconst_1, 5: ireturn, 6: iconst_0, 7: ireturn
        let (group, id) = single_method_group(
            "(I)I",
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![
                ILoad0,
                IfEq(5),
                IConst1,
                IReturn,
                IConst0,
                IReturn,
            ],
            vec![],
        );
        let trace = execute_method(&group, id, &Settings::default()).unwrap();

        assert_eq!(trace.steps_at(4).count(), 1);
        assert_eq!(trace.steps_at(6).count(), 1);
        // Both paths end in their own return
        assert_eq!(trace.steps_at(5).count() + trace.steps_at(7).count(), 2);
    }

    #[test]
    fn loops_terminate_through_the_revisit_guard() {
        use Instruction::*;

        // 0: iconst_0, 1: istore_1, 2: iinc 1 1, 5: goto -3 (-> 2)
        let (group, id) = single_method_group(
            "()V",
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![IConst0, IStore1, IInc(1, 1), Goto(-3)],
            vec![],
        );
        let trace = execute_method(&group, id, &Settings::default()).unwrap();

        // The loop body executed once and the walk stopped at the revisit
        assert_eq!(trace.steps_at(2).count(), 1);
        assert_eq!(trace.steps_at(5).count(), 1);
    }

    #[test]
    fn wide_and_dup_forms() {
        use Instruction::*;

        // 0: lconst_0, 1: dup2, 2: wide lstore 4, 6: lstore_0, 7: return
        let (group, id) = single_method_group(
            "()V",
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![
                LConst0,
                Dup2,
                Wide(WideInsn::LStore(4)),
                LStore0,
                Return,
            ],
            vec![],
        );
        let trace = execute_method(&group, id, &Settings::default()).unwrap();

        // dup2 on a long is form 2: one pop, two pushes
        let dup2 = trace.steps_at(1).next().unwrap();
        assert_eq!(dup2.pops.len(), 1);
        assert_eq!(dup2.pushes.len(), 2);
        assert!(dup2
            .pushes
            .iter()
            .all(|value| trace.value(*value).ty == StackType::Long));
    }
}
