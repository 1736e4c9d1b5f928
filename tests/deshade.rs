//! End-to-end scenarios: decode, interpretation, call graph, and call-site rewriting working
//! against one class group, the way the surrounding deobfuscation driver uses them.

use deshade::analysis;
use deshade::execution::{self, Settings, StepKind};
use deshade::jvm::code::{Instruction, InstructionSequence};
use deshade::jvm::model::{CallSite, ClassFile, ClassGroup, Code, Method, MethodId};
use deshade::jvm::{
    BinaryName, ClassAccessFlags, MethodAccessFlags, MethodDescriptor, MethodRef, Name,
    ParseDescriptor, PoolEntry, RefType, StackType, UnqualifiedName,
};

fn class_name(name: &str) -> BinaryName {
    BinaryName::from_string(name.to_string()).unwrap()
}

fn member_name(name: &str) -> UnqualifiedName {
    UnqualifiedName::from_string(name.to_string()).unwrap()
}

fn descriptor(text: &str) -> MethodDescriptor {
    MethodDescriptor::parse(text).unwrap()
}

fn bar_ref() -> MethodRef {
    MethodRef {
        class: RefType::Object(class_name("b/B")),
        name: member_name("bar"),
        descriptor: descriptor("(I)V"),
    }
}

/// `a/A.foo()V` whose body is decoded from raw bytes: `aload_0; iconst_0; invokevirtual
/// b/B.bar(I)V; return`, plus a `b/B` declaring `bar(I)V`.
fn two_class_group() -> (ClassGroup, MethodId, MethodId) {
    let mut group = ClassGroup::new();

    let mut b = ClassFile::new(
        class_name("b/B"),
        Some(BinaryName::OBJECT),
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
    );
    let bar_index = b.add_method(Method::new(
        member_name("bar"),
        descriptor("(I)V"),
        MethodAccessFlags::PUBLIC,
    ));
    let b_id = group.add_class(b);

    let mut a = ClassFile::new(
        class_name("a/A"),
        Some(BinaryName::OBJECT),
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
    );
    let bar_pool_index = a
        .pool
        .intern(PoolEntry::MethodRef {
            method: bar_ref(),
            is_interface: false,
        })
        .unwrap();

    let code_bytes = [
        0x2a, // 0: aload_0
        0x03, // 1: iconst_0
        0xb6,
        (bar_pool_index.0 >> 8) as u8,
        bar_pool_index.0 as u8, // 2: invokevirtual b/B.bar(I)V
        0xb1, // 5: return
    ];
    let instructions = InstructionSequence::parse(&code_bytes, &a.pool).unwrap();

    let mut foo = Method::new(member_name("foo"), descriptor("()V"), MethodAccessFlags::PUBLIC);
    foo.code = Some(Code {
        max_stack: 2,
        max_locals: 1,
        instructions,
        exception_table: vec![],
    });
    let foo_index = a.add_method(foo);
    let a_id = group.add_class(a);

    (
        group,
        MethodId {
            class: a_id,
            index: foo_index,
        },
        MethodId {
            class: b_id,
            index: bar_index,
        },
    )
}

#[test]
fn call_graph_records_the_edge_in_both_directions() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut group, foo_id, bar_id) = two_class_group();

    analysis::build_call_graph(&mut group);

    let foo = group.method(foo_id);
    assert_eq!(
        foo.calls_to,
        vec![CallSite {
            method: bar_id,
            pc: 2
        }]
    );
    assert!(foo.called_from.is_empty());

    let bar = group.method(bar_id);
    assert_eq!(
        bar.called_from,
        vec![CallSite {
            method: foo_id,
            pc: 2
        }]
    );
    assert!(bar.calls_to.is_empty());
}

#[test]
fn interpreting_the_caller_wires_arguments_to_the_invoke() {
    let (group, foo_id, _) = two_class_group();

    let trace = execution::execute_method(&group, foo_id, &Settings::default()).unwrap();

    // The invoke consumed the argument first and the receiver last
    let invoke = trace.steps_at(2).next().unwrap();
    assert_eq!(invoke.pops.len(), 2);
    assert_eq!(trace.value(invoke.pops[0]).ty, StackType::Int);
    assert_eq!(
        trace.value(invoke.pops[1]).ty,
        StackType::Reference(Some(RefType::Object(class_name("a/A"))))
    );
    // Void return: nothing produced
    assert!(invoke.pushes.is_empty());
}

#[test]
fn remove_parameter_rewrites_the_call_site_and_only_it() {
    let (mut group, foo_id, _) = two_class_group();

    let original_entry = PoolEntry::MethodRef {
        method: bar_ref(),
        is_interface: false,
    };
    let original_index = group
        .class_mut(foo_id.class)
        .pool
        .intern(original_entry.clone())
        .unwrap();
    let pool_len_before = group.class(foo_id.class).pool.len();

    {
        let class = group.class_mut(foo_id.class);
        let (methods, pool) = (&mut class.methods, &mut class.pool);
        let invoke = methods[foo_id.index]
            .code
            .as_mut()
            .unwrap()
            .instructions
            .get_mut(2)
            .unwrap();
        invoke.remove_parameter(0, pool).unwrap();
    }

    // The call site now references bar()V on the same class
    let class = group.class(foo_id.class);
    let invoke = class.methods[foo_id.index]
        .code
        .as_ref()
        .unwrap()
        .instructions
        .get(2)
        .unwrap();
    let rebound = invoke.invoked_method().unwrap();
    assert_eq!(rebound.class, RefType::Object(class_name("b/B")));
    assert_eq!(rebound.name, member_name("bar"));
    assert_eq!(rebound.descriptor, descriptor("()V"));

    // Exactly one new pool entry; the old one is untouched and still interns to its old index
    assert_eq!(class.pool.len(), pool_len_before + 1);
    let class = group.class_mut(foo_id.class);
    assert_eq!(class.pool.intern(original_entry).unwrap(), original_index);
}

#[test]
fn invoking_a_two_argument_method_consumes_three_values_and_pushes_the_result() {
    let mut group = ClassGroup::new();

    let mut c = ClassFile::new(
        class_name("c/C"),
        Some(BinaryName::OBJECT),
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
    );
    let mut probe = Method::new(
        member_name("probe"),
        descriptor("()V"),
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
    );
    // receiver below the arguments, result popped off before returning
    probe.code = Some(Code {
        max_stack: 4,
        max_locals: 0,
        instructions: vec![
            Instruction::AConstNull, // 0: receiver
            Instruction::IConst1,    // 1: arg1
            Instruction::IConst2,    // 2: arg2
            Instruction::InvokeVirtual(MethodRef {
                class: RefType::Object(class_name("c/C")),
                name: member_name("m"),
                descriptor: descriptor("(II)J"),
            }), // 3
            Instruction::Pop2, // 6
            Instruction::Return, // 7
        ]
        .into_iter()
        .collect::<InstructionSequence>(),
        exception_table: vec![],
    });
    let probe_index = c.add_method(probe);
    let c_id = group.add_class(c);

    let trace = execution::execute_method(
        &group,
        MethodId {
            class: c_id,
            index: probe_index,
        },
        &Settings::default(),
    )
    .unwrap();

    let invoke = trace.steps_at(3).next().unwrap();
    assert_eq!(invoke.pops.len(), 3);
    assert_eq!(invoke.pushes.len(), 1);
    assert_eq!(trace.value(invoke.pushes[0]).ty, StackType::Long);

    // The walk stayed balanced: the pop2 afterwards consumed exactly the long
    let pop2 = trace.steps_at(6).next().unwrap();
    assert_eq!(pop2.pops, invoke.pushes);
}

#[test]
fn exception_forks_reach_the_handler_with_one_synthetic_value() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut group, foo_id, _) = two_class_group();

    // Protect just the invoke at pc 2, handled at the return (pc 5)
    group.method_mut(foo_id).code.as_mut().unwrap().exception_table.push(
        deshade::jvm::model::ExceptionHandler {
            start_pc: 2,
            end_pc: 5,
            handler_pc: 5,
            catch_type: None,
        },
    );

    let trace = execution::execute_method(&group, foo_id, &Settings::default()).unwrap();

    let forks: Vec<_> = trace
        .steps()
        .filter(|(_, step)| step.kind == StepKind::ExceptionEntry)
        .collect();
    assert_eq!(forks.len(), 1);
    let (_, fork) = forks[0];
    assert_eq!(fork.pc, 2);
    assert_eq!(fork.pushes.len(), 1);
    assert_eq!(
        trace.value(fork.pushes[0]).ty,
        StackType::Reference(Some(RefType::Object(BinaryName::EXCEPTION)))
    );

    // The handler ran on both the normal path and the forked one
    assert_eq!(trace.steps_at(5).count(), 2);
}

#[test]
fn call_graph_construction_is_deterministic() {
    let (mut first, foo_id, _) = two_class_group();
    let (mut second, _, _) = two_class_group();

    analysis::build_call_graph(&mut first);
    analysis::build_call_graph(&mut second);

    assert_eq!(
        first.method(foo_id).calls_to,
        second.method(foo_id).calls_to
    );
    assert_eq!(
        first.method(foo_id).called_from,
        second.method(foo_id).called_from
    );
}
