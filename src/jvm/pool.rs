use super::descriptors::{FieldType, MethodDescriptor, RefType};
use super::errors::Error;
use super::names::UnqualifiedName;
use crate::util::{Offset, OffsetResult, OffsetVec, Width};
use std::fmt;

/// Index of an entry in a class file constant pool
///
/// Indexing starts at 1, and `Long`/`Double` entries occupy two slots.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct PoolIndex(pub u16);

impl fmt::Debug for PoolIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("#{}", self.0))
    }
}

/// Typed reference to a method on some (possibly external) class
///
/// Invoke instructions resolve their pool index into one of these when they are decoded, so
/// everything downstream works with names and descriptors instead of raw indices. The class is a
/// [`RefType`] because methods can be invoked on array types too (`clone`, notably).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodRef {
    pub class: RefType,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
}

/// Typed reference to a field on some (possibly external) class
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FieldRef {
    pub class: RefType,
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
}

/// One constant pool record
///
/// Entries are self-contained values: a method reference carries its class name and descriptor
/// directly rather than chaining through other indices. Rewrites therefore never edit an entry in
/// place - they intern a fresh entry and rebind the referencing instruction, so any other
/// instruction still pointing at the old entry keeps its meaning.
#[derive(Clone, Debug)]
pub enum PoolEntry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(RefType),
    NameAndType {
        name: UnqualifiedName,
        descriptor: String,
    },
    FieldRef(FieldRef),
    MethodRef {
        method: MethodRef,
        is_interface: bool,
    },
}

impl PoolEntry {
    /// Tag of this entry's kind, for error reporting
    pub fn kind(&self) -> &'static str {
        match self {
            PoolEntry::Utf8(_) => "Utf8",
            PoolEntry::Integer(_) => "Integer",
            PoolEntry::Float(_) => "Float",
            PoolEntry::Long(_) => "Long",
            PoolEntry::Double(_) => "Double",
            PoolEntry::String(_) => "String",
            PoolEntry::Class(_) => "Class",
            PoolEntry::NameAndType { .. } => "NameAndType",
            PoolEntry::FieldRef(_) => "FieldRef",
            PoolEntry::MethodRef { .. } => "MethodRef",
        }
    }
}

/// Structural equality; `Float`/`Double` compare by bit pattern so that interning stays total
/// (NaN payloads included)
impl PartialEq for PoolEntry {
    fn eq(&self, other: &PoolEntry) -> bool {
        match (self, other) {
            (PoolEntry::Utf8(s1), PoolEntry::Utf8(s2)) => s1 == s2,
            (PoolEntry::Integer(i1), PoolEntry::Integer(i2)) => i1 == i2,
            (PoolEntry::Float(f1), PoolEntry::Float(f2)) => f1.to_bits() == f2.to_bits(),
            (PoolEntry::Long(l1), PoolEntry::Long(l2)) => l1 == l2,
            (PoolEntry::Double(d1), PoolEntry::Double(d2)) => d1.to_bits() == d2.to_bits(),
            (PoolEntry::String(s1), PoolEntry::String(s2)) => s1 == s2,
            (PoolEntry::Class(c1), PoolEntry::Class(c2)) => c1 == c2,
            (
                PoolEntry::NameAndType {
                    name: n1,
                    descriptor: d1,
                },
                PoolEntry::NameAndType {
                    name: n2,
                    descriptor: d2,
                },
            ) => n1 == n2 && d1 == d2,
            (PoolEntry::FieldRef(f1), PoolEntry::FieldRef(f2)) => f1 == f2,
            (
                PoolEntry::MethodRef {
                    method: m1,
                    is_interface: i1,
                },
                PoolEntry::MethodRef {
                    method: m2,
                    is_interface: i2,
                },
            ) => m1 == m2 && i1 == i2,
            _ => false,
        }
    }
}

impl Eq for PoolEntry {}

/// Almost all constants have width 1, except for `Long` and `Double`. Quoting the spec:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
/// >
/// > In retrospect, making 8-byte constants take two constant pool entries was a poor choice.
impl Width for PoolEntry {
    fn width(&self) -> usize {
        match self {
            PoolEntry::Long(_) | PoolEntry::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Constant pool of one class file
///
/// The pool is append only: [`ConstantPool::intern`] returns the index of an existing
/// structurally equal entry when there is one, so repeated rewriting never grows the pool with
/// duplicates.
pub struct ConstantPool {
    entries: OffsetVec<PoolEntry>,
}

impl ConstantPool {
    /// Make a fresh empty constant pool
    pub fn new() -> ConstantPool {
        ConstantPool {
            entries: OffsetVec::new_starting_at(Offset(1)),
        }
    }

    /// Number of slots the pool occupies (one more than the largest valid index)
    pub fn width(&self) -> u16 {
        self.entries.offset_len().0 as u16
    }

    /// Number of entries in the pool
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolIndex, &PoolEntry)> + '_ {
        self.entries
            .iter()
            .map(|(off, _, entry)| (PoolIndex(off.0 as u16), entry))
    }

    /// Fetch the entry at an index
    pub fn lookup(&self, index: PoolIndex) -> Result<&PoolEntry, Error> {
        match self.entries.get_offset(Offset(index.0 as usize)) {
            OffsetResult::Ok(_, entry) => Ok(entry),
            OffsetResult::InvalidOffset(_) => Err(Error::PoolIndexUnusable { index: index.0 }),
            OffsetResult::TooLarge => Err(Error::PoolIndexOutOfRange {
                index: index.0,
                width: self.width(),
            }),
        }
    }

    /// Fetch the method reference at an index
    pub fn lookup_method_ref(&self, index: PoolIndex) -> Result<&MethodRef, Error> {
        match self.lookup(index)? {
            PoolEntry::MethodRef { method, .. } => Ok(method),
            other => Err(Error::UnexpectedPoolEntry {
                index: index.0,
                expected: "MethodRef",
                found: other.kind(),
            }),
        }
    }

    /// Fetch the field reference at an index
    pub fn lookup_field_ref(&self, index: PoolIndex) -> Result<&FieldRef, Error> {
        match self.lookup(index)? {
            PoolEntry::FieldRef(field) => Ok(field),
            other => Err(Error::UnexpectedPoolEntry {
                index: index.0,
                expected: "FieldRef",
                found: other.kind(),
            }),
        }
    }

    /// Fetch the class reference at an index
    pub fn lookup_class(&self, index: PoolIndex) -> Result<&RefType, Error> {
        match self.lookup(index)? {
            PoolEntry::Class(class) => Ok(class),
            other => Err(Error::UnexpectedPoolEntry {
                index: index.0,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }

    /// Fetch an entry that `ldc`/`ldc_w` (`wide` false) or `ldc2_w` (`wide` true) may load
    pub fn lookup_loadable(&self, index: PoolIndex, wide: bool) -> Result<&PoolEntry, Error> {
        let entry = self.lookup(index)?;
        let loadable = match entry {
            PoolEntry::Integer(_)
            | PoolEntry::Float(_)
            | PoolEntry::String(_)
            | PoolEntry::Class(_) => !wide,
            PoolEntry::Long(_) | PoolEntry::Double(_) => wide,
            _ => false,
        };
        if loadable {
            Ok(entry)
        } else {
            Err(Error::UnexpectedPoolEntry {
                index: index.0,
                expected: if wide {
                    "wide loadable constant"
                } else {
                    "loadable constant"
                },
                found: entry.kind(),
            })
        }
    }

    /// Get the index of an entry, interning it if it is not already in the pool
    ///
    /// Interning is referentially transparent: calling this twice with structurally equal values
    /// yields the same index and grows the pool at most once.
    pub fn intern(&mut self, entry: PoolEntry) -> Result<PoolIndex, Error> {
        for (index, existing) in self.iter() {
            if existing == &entry {
                return Ok(index);
            }
        }

        let offset = self.entries.offset_len().0;
        if offset + entry.width() > u16::MAX as usize + 1 {
            return Err(Error::PoolOverflow);
        }
        Ok(PoolIndex(self.entries.push(entry).0 as u16))
    }
}

impl Default for ConstantPool {
    fn default() -> ConstantPool {
        ConstantPool::new()
    }
}

impl fmt::Debug for ConstantPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entries.fmt(f)
    }
}
