use crate::jvm::model::{ClassGroup, ClassId, MethodId};
use crate::jvm::{MethodDescriptor, MethodRef, RefType, UnqualifiedName};
use std::collections::HashSet;

/// Build the interprocedural call graph of a class group
///
/// For every invoke instruction of every method, the referenced method is resolved by exact
/// name-and-type match on its statically named class. Classes outside the group and methods the
/// named class doesn't declare resolve to nothing and contribute no edge - external library
/// calls and interface/abstract targets land here, and that is the expected outcome, not a
/// failure.
///
/// Each resolved call becomes one edge `(caller, callee, call-site pc)`, recorded on the caller's
/// outgoing set and the callee's incoming set. Edges the group already has are skipped, so
/// running the pass twice leaves exactly the edge set of running it once. Resolution itself is
/// read-only and the edge sets are only touched in a commit sweep afterwards, so a fixed group
/// always produces the same edges no matter how the pass is scheduled.
pub fn build_call_graph(group: &mut ClassGroup) {
    let mut edges: Vec<(MethodId, MethodId, u16)> = vec![];

    for (class_id, class) in group.classes() {
        for (index, method) in class.methods.iter().enumerate() {
            let code = match &method.code {
                Some(code) => code,
                None => continue,
            };
            let source = MethodId {
                class: class_id,
                index,
            };
            for (pc, insn) in code.instructions.iter() {
                if let Some(method_ref) = insn.invoked_method() {
                    match resolve_exact(group, method_ref) {
                        Some(target) => edges.push((source, target, pc)),
                        None => log::trace!(
                            "call site {:?}@{} does not resolve inside the group",
                            source,
                            pc
                        ),
                    }
                }
            }
        }
    }
    log::debug!("resolved {} call edges", edges.len());

    // Commit in a separate sweep; skipping known edges makes re-running the pass harmless
    for (source, target, pc) in edges {
        let known = group
            .method(source)
            .calls_to
            .iter()
            .any(|site| site.method == target && site.pc == pc);
        if known {
            continue;
        }
        group.method_mut(source).add_call_to(pc, target);
        group.method_mut(target).add_called_from(source, pc);
    }
}

/// Resolve a method reference against exactly the class it names
fn resolve_exact(group: &ClassGroup, method_ref: &MethodRef) -> Option<MethodId> {
    let class_name = match &method_ref.class {
        RefType::Object(name) => name,
        // Array receivers only ever dispatch to java/lang/Object methods, outside any group
        _ => return None,
    };
    let class_id = group.find_class(class_name)?;
    let index = group
        .class(class_id)
        .find_method(&method_ref.name, &method_ref.descriptor)?;
    Some(MethodId {
        class: class_id,
        index,
    })
}

/// Resolve a virtual dispatch from the receiver's static type
///
/// Walks the receiver class and then its superclass chain for an exact name-and-type match,
/// stopping quietly at the first parent outside the group. The walk is iterative with a
/// visited-set guard, so a corrupted circular hierarchy cannot hang it. This refines
/// [`build_call_graph`]'s per-site resolution when receiver stack types are available; anything
/// fancier than a superclass walk (interface defaults, multiple candidates) stays unresolved.
pub fn find_virtual_method(
    group: &ClassGroup,
    receiver: &RefType,
    name: &UnqualifiedName,
    descriptor: &MethodDescriptor,
) -> Option<MethodId> {
    let receiver_name = match receiver {
        RefType::Object(class_name) => class_name,
        _ => return None,
    };

    let mut seen: HashSet<ClassId> = HashSet::new();
    let mut current = group.find_class(receiver_name);
    while let Some(class_id) = current {
        if !seen.insert(class_id) {
            break;
        }
        if let Some(index) = group.class(class_id).find_method(name, descriptor) {
            return Some(MethodId {
                class: class_id,
                index,
            });
        }
        current = group.parent_of(class_id);
    }
    None
}
