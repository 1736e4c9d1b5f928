use super::insn::Instruction;
use crate::jvm::errors::Error;
use crate::jvm::pool::ConstantPool;
use crate::util::{Offset, OffsetVec};
use byteorder::WriteBytesExt;
use std::io::Cursor;

/// The decoded instructions of one method body, addressed by pc
///
/// The pc of an instruction is the sum of the encoded lengths of everything before it, exactly as
/// in the encoded code array; instructions can be rewritten in place (their operands swapped) but
/// never relocated.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InstructionSequence {
    insns: OffsetVec<Instruction>,
}

impl InstructionSequence {
    /// Decode a whole code array
    pub fn parse(bytes: &[u8], pool: &ConstantPool) -> Result<InstructionSequence, Error> {
        let mut insns: OffsetVec<Instruction> = OffsetVec::new();
        let mut reader = Cursor::new(bytes);

        while (reader.position() as usize) < bytes.len() {
            let pc = reader.position() as u16;
            let insn = Instruction::parse(&mut reader, pc, pool).map_err(|error| match error {
                Error::Io(_) => Error::TruncatedCode { pc },
                other => other,
            })?;
            insns.push(insn);
        }

        Ok(InstructionSequence { insns })
    }

    /// Reencode the whole sequence, re-interning referenced pool entries
    pub fn serialize<W: WriteBytesExt>(
        &self,
        writer: &mut W,
        pool: &mut ConstantPool,
    ) -> Result<(), Error> {
        for (_, _, insn) in self.insns.iter() {
            insn.serialize(writer, pool)?;
        }
        Ok(())
    }

    /// The instruction starting exactly at `pc`
    pub fn get(&self, pc: u16) -> Option<&Instruction> {
        self.insns.get_offset(Offset(pc as usize)).ok()
    }

    /// Mutable access to the instruction starting exactly at `pc`
    ///
    /// Rewrites through this reference must not change the instruction's encoded length.
    pub fn get_mut(&mut self, pc: u16) -> Option<&mut Instruction> {
        self.insns.get_offset_mut(Offset(pc as usize))
    }

    /// Iterate instructions in pc order
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Instruction)> + '_ {
        self.insns.iter().map(|(off, _, insn)| (off.0 as u16, insn))
    }

    pub fn len(&self) -> usize {
        self.insns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    /// Total encoded length of the sequence (one past the last valid pc)
    pub fn code_len(&self) -> u16 {
        self.insns.offset_len().0 as u16
    }
}

impl FromIterator<Instruction> for InstructionSequence {
    fn from_iter<A: IntoIterator<Item = Instruction>>(insns: A) -> InstructionSequence {
        InstructionSequence {
            insns: insns.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::descriptors::{MethodDescriptor, ParseDescriptor, RefType};
    use crate::jvm::names::{BinaryName, Name, UnqualifiedName};
    use crate::jvm::pool::{MethodRef, PoolEntry};

    #[test]
    fn parse_assigns_pcs_by_encoded_length() {
        let mut pool = ConstantPool::new();
        let index = pool
            .intern(PoolEntry::MethodRef {
                method: MethodRef {
                    class: RefType::Object(BinaryName::from_string("a/B".to_string()).unwrap()),
                    name: UnqualifiedName::from_string("f".to_string()).unwrap(),
                    descriptor: MethodDescriptor::parse("()V").unwrap(),
                },
                is_interface: false,
            })
            .unwrap();

        let bytes = [
            0x2a, // 0: aload_0
            0x10, 0x07, // 1: bipush 7
            0xb6, 0x00, index.0 as u8, // 3: invokevirtual
            0xb1, // 6: return
        ];
        let sequence = InstructionSequence::parse(&bytes, &pool).unwrap();

        let pcs: Vec<u16> = sequence.iter().map(|(pc, _)| pc).collect();
        assert_eq!(pcs, vec![0, 1, 3, 6]);
        assert_eq!(sequence.code_len(), 7);

        assert_eq!(sequence.get(3), Some(&Instruction::InvokeVirtual(MethodRef {
            class: RefType::Object(BinaryName::from_string("a/B".to_string()).unwrap()),
            name: UnqualifiedName::from_string("f".to_string()).unwrap(),
            descriptor: MethodDescriptor::parse("()V").unwrap(),
        })));
        assert_eq!(sequence.get(4), None);

        let mut reencoded = vec![];
        sequence.serialize(&mut reencoded, &mut pool).unwrap();
        assert_eq!(reencoded, bytes);
    }

    #[test]
    fn truncated_code_is_reported_with_its_pc() {
        let pool = ConstantPool::new();

        // sipush missing its second operand byte
        let bytes = [0x00, 0x11, 0x01];
        assert!(matches!(
            InstructionSequence::parse(&bytes, &pool),
            Err(Error::TruncatedCode { pc: 1 })
        ));
    }
}
