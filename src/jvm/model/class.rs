use super::method::Method;
use crate::jvm::access_flags::{ClassAccessFlags, FieldAccessFlags};
use crate::jvm::descriptors::{FieldType, MethodDescriptor};
use crate::jvm::names::{BinaryName, UnqualifiedName};
use crate::jvm::pool::ConstantPool;
use std::collections::HashMap;
use std::fmt;

/// Opaque id of a class inside one [`ClassGroup`]
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ClassId(pub(crate) usize);

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("c{}", self.0))
    }
}

/// Id of a method: its class plus its position in that class's method list
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct MethodId {
    pub class: ClassId,
    pub index: usize,
}

impl fmt::Debug for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:?}.m{}", self.class, self.index))
    }
}

/// The whole universe of classes one analysis run can resolve against
///
/// The group is deliberately allowed to be incomplete: classes from external libraries simply are
/// not members, and every resolution against them quietly comes back `None`.
pub struct ClassGroup {
    classes: Vec<ClassFile>,
    by_name: HashMap<BinaryName, ClassId>,
}

impl ClassGroup {
    /// New empty group
    pub fn new() -> ClassGroup {
        ClassGroup {
            classes: vec![],
            by_name: HashMap::new(),
        }
    }

    /// Add a class to the group
    pub fn add_class(&mut self, class: ClassFile) -> ClassId {
        let id = ClassId(self.classes.len());
        self.by_name.insert(class.name.clone(), id);
        self.classes.push(class);
        id
    }

    /// Look a class up by its binary name
    ///
    /// `None` means the class is outside the group (an external library class, typically) - that
    /// is an expected outcome, not an error.
    pub fn find_class(&self, name: &BinaryName) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn class(&self, id: ClassId) -> &ClassFile {
        &self.classes[id.0]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassFile {
        &mut self.classes[id.0]
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.classes[id.class.0].methods[id.index]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut Method {
        &mut self.classes[id.class.0].methods[id.index]
    }

    /// Superclass of `id`, when the superclass is itself a member of the group
    pub fn parent_of(&self, id: ClassId) -> Option<ClassId> {
        let parent_name = self.class(id).superclass.as_ref()?;
        self.find_class(parent_name)
    }

    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &ClassFile)> + '_ {
        self.classes
            .iter()
            .enumerate()
            .map(|(index, class)| (ClassId(index), class))
    }
}

impl Default for ClassGroup {
    fn default() -> ClassGroup {
        ClassGroup::new()
    }
}

/// One class under analysis
pub struct ClassFile {
    /// Binary name of the class
    pub name: BinaryName,

    /// Name of the superclass
    ///
    /// `None` only for `java/lang/Object`; the named class may or may not be a member of the
    /// enclosing group.
    pub superclass: Option<BinaryName>,

    pub access_flags: ClassAccessFlags,

    /// Constant pool scoped to this class
    pub pool: ConstantPool,

    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
}

impl ClassFile {
    pub fn new(
        name: BinaryName,
        superclass: Option<BinaryName>,
        access_flags: ClassAccessFlags,
    ) -> ClassFile {
        ClassFile {
            name,
            superclass,
            access_flags,
            pool: ConstantPool::new(),
            fields: vec![],
            methods: vec![],
        }
    }

    /// Find the method declared *on this class* with the given name and descriptor
    ///
    /// Superclasses are not consulted; that is what
    /// [`find_virtual_method`](crate::analysis::find_virtual_method) is for.
    pub fn find_method(
        &self,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor,
    ) -> Option<usize> {
        self.methods
            .iter()
            .position(|method| &method.name == name && &method.descriptor == descriptor)
    }

    pub fn add_method(&mut self, method: Method) -> usize {
        self.methods.push(method);
        self.methods.len() - 1
    }
}

impl fmt::Debug for ClassFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "ClassFile({:?}, {} methods)",
            self.name,
            self.methods.len()
        ))
    }
}

/// Field declared by a class
#[derive(Debug)]
pub struct Field {
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
    pub access_flags: FieldAccessFlags,
}
