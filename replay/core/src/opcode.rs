//! Instruction words consumed by the replay executor.
//!
//! Every instruction is a 32-bit word: the opcode in the top 6 bits and a
//! 26-bit payload below it. Instructions that carry a typed value split the
//! payload into a 6-bit [`ValueType`] and a 20-bit value.

use crate::codec::{CodecError, Decoder, Encoder};
use crate::layout::MemoryLayout;

use std::fmt;
use std::io::{Read, Write};

const PAYLOAD_BITS: u32 = 26;
const VALUE_BITS: u32 = 20;
const TYPE_BITS: u32 = 6;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Bool,
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    F32,
    F64,
    AbsolutePointer,
    ConstantPointer,
    VolatilePointer,
    Void,
}

impl ValueType {
    const ALL: [ValueType; 15] = [
        ValueType::Bool,
        ValueType::S8,
        ValueType::U8,
        ValueType::S16,
        ValueType::U16,
        ValueType::S32,
        ValueType::U32,
        ValueType::S64,
        ValueType::U64,
        ValueType::F32,
        ValueType::F64,
        ValueType::AbsolutePointer,
        ValueType::ConstantPointer,
        ValueType::VolatilePointer,
        ValueType::Void,
    ];

    fn from_code(code: u32) -> Result<Self, OpcodeError> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(OpcodeError::UnknownValueType(code))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    Call { push_return: bool, api: u8, function: u16 },
    PushI { ty: ValueType, value: u32 },
    LoadC { ty: ValueType, address: u32 },
    LoadV { ty: ValueType, address: u32 },
    Load { ty: ValueType },
    Pop { count: u32 },
    StoreV { address: u32 },
    Store,
    Resource { id: u32 },
    Post,
    Copy { count: u32 },
    Clone { index: u32 },
    Strcpy { max_count: u32 },
    Extend { value: u32 },
    Add { delta: u32 },
    Label { value: u32 },
    SwitchThread { index: u32 },
    JumpLabel { label: u32 },
    JumpNZ { label: u32 },
    JumpZ { label: u32 },
    Notification { id: u32 },
    Wait { id: u32 },
    /// Followed by `data.len()` raw words.
    InlineResource { data: Vec<u32> },
}

#[derive(thiserror::Error, Debug)]
pub enum OpcodeError {
    #[error("{opcode} payload {value:#x} does not fit in {bits} bits")]
    PayloadTooLarge {
        opcode: &'static str,
        value: u64,
        bits: u32,
    },

    #[error("unknown opcode {0}")]
    UnknownOpcode(u32),

    #[error("unknown value type {0}")]
    UnknownValueType(u32),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

fn field(opcode: &'static str, value: u64, bits: u32) -> Result<u32, OpcodeError> {
    if value >> bits != 0 {
        return Err(OpcodeError::PayloadTooLarge {
            opcode,
            value,
            bits,
        });
    }
    Ok(value as u32)
}

fn typed(opcode: &'static str, ty: ValueType, value: u32) -> Result<u32, OpcodeError> {
    Ok((ty as u32) << VALUE_BITS | field(opcode, value.into(), VALUE_BITS)?)
}

fn split_typed(payload: u32) -> Result<(ValueType, u32), OpcodeError> {
    let ty = ValueType::from_code(payload >> VALUE_BITS & ((1 << TYPE_BITS) - 1))?;
    Ok((ty, payload & ((1 << VALUE_BITS) - 1)))
}

impl Opcode {
    pub fn code(&self) -> u32 {
        match self {
            Opcode::Call { .. } => 0,
            Opcode::PushI { .. } => 1,
            Opcode::LoadC { .. } => 2,
            Opcode::LoadV { .. } => 3,
            Opcode::Load { .. } => 4,
            Opcode::Pop { .. } => 5,
            Opcode::StoreV { .. } => 6,
            Opcode::Store => 7,
            Opcode::Resource { .. } => 8,
            Opcode::Post => 9,
            Opcode::Copy { .. } => 10,
            Opcode::Clone { .. } => 11,
            Opcode::Strcpy { .. } => 12,
            Opcode::Extend { .. } => 13,
            Opcode::Add { .. } => 14,
            Opcode::Label { .. } => 15,
            Opcode::SwitchThread { .. } => 16,
            Opcode::JumpLabel { .. } => 17,
            Opcode::JumpNZ { .. } => 18,
            Opcode::JumpZ { .. } => 19,
            Opcode::Notification { .. } => 20,
            Opcode::Wait { .. } => 21,
            Opcode::InlineResource { .. } => 22,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Call { .. } => "Call",
            Opcode::PushI { .. } => "PushI",
            Opcode::LoadC { .. } => "LoadC",
            Opcode::LoadV { .. } => "LoadV",
            Opcode::Load { .. } => "Load",
            Opcode::Pop { .. } => "Pop",
            Opcode::StoreV { .. } => "StoreV",
            Opcode::Store => "Store",
            Opcode::Resource { .. } => "Resource",
            Opcode::Post => "Post",
            Opcode::Copy { .. } => "Copy",
            Opcode::Clone { .. } => "Clone",
            Opcode::Strcpy { .. } => "Strcpy",
            Opcode::Extend { .. } => "Extend",
            Opcode::Add { .. } => "Add",
            Opcode::Label { .. } => "Label",
            Opcode::SwitchThread { .. } => "SwitchThread",
            Opcode::JumpLabel { .. } => "JumpLabel",
            Opcode::JumpNZ { .. } => "JumpNZ",
            Opcode::JumpZ { .. } => "JumpZ",
            Opcode::Notification { .. } => "Notification",
            Opcode::Wait { .. } => "Wait",
            Opcode::InlineResource { .. } => "InlineResource",
        }
    }

    fn payload(&self) -> Result<u32, OpcodeError> {
        let name = self.name();
        let plain = |v: u32| field(name, v.into(), PAYLOAD_BITS);
        match self {
            Opcode::Call {
                push_return,
                api,
                function,
            } => Ok((*push_return as u32) << 24
                | field(name, (*api).into(), 4)? << 16
                | u32::from(*function)),
            Opcode::PushI { ty, value } => typed(name, *ty, *value),
            Opcode::LoadC { ty, address } | Opcode::LoadV { ty, address } => {
                typed(name, *ty, *address)
            }
            Opcode::Load { ty } => Ok((*ty as u32) << VALUE_BITS),
            Opcode::Store | Opcode::Post => Ok(0),
            Opcode::InlineResource { data } => field(name, data.len() as u64, PAYLOAD_BITS),
            Opcode::Pop { count } | Opcode::Copy { count } => plain(*count),
            Opcode::StoreV { address } => plain(*address),
            Opcode::Resource { id } | Opcode::Notification { id } | Opcode::Wait { id } => {
                plain(*id)
            }
            Opcode::Clone { index } | Opcode::SwitchThread { index } => plain(*index),
            Opcode::Strcpy { max_count } => plain(*max_count),
            Opcode::Extend { value } | Opcode::Label { value } => plain(*value),
            Opcode::Add { delta } => plain(*delta),
            Opcode::JumpLabel { label } | Opcode::JumpNZ { label } | Opcode::JumpZ { label } => {
                plain(*label)
            }
        }
    }

    /// Packs the instruction word without any trailing data.
    pub fn word(&self) -> Result<u32, OpcodeError> {
        Ok(self.code() << PAYLOAD_BITS | self.payload()?)
    }

    pub fn encode<W: Write>(&self, e: &mut Encoder<W>) -> Result<(), OpcodeError> {
        e.u32(self.word()?)?;
        if let Opcode::InlineResource { data } = self {
            for w in data {
                e.u32(*w)?;
            }
        }
        Ok(())
    }

    pub fn decode<R: Read>(d: &mut Decoder<R>) -> Result<Self, OpcodeError> {
        let word = d.u32()?;
        let payload = word & ((1 << PAYLOAD_BITS) - 1);
        Ok(match word >> PAYLOAD_BITS {
            0 => Opcode::Call {
                push_return: payload >> 24 & 1 == 1,
                api: (payload >> 16 & 0xf) as u8,
                function: payload as u16,
            },
            1 => {
                let (ty, value) = split_typed(payload)?;
                Opcode::PushI { ty, value }
            }
            2 => {
                let (ty, address) = split_typed(payload)?;
                Opcode::LoadC { ty, address }
            }
            3 => {
                let (ty, address) = split_typed(payload)?;
                Opcode::LoadV { ty, address }
            }
            4 => Opcode::Load {
                ty: split_typed(payload)?.0,
            },
            5 => Opcode::Pop { count: payload },
            6 => Opcode::StoreV { address: payload },
            7 => Opcode::Store,
            8 => Opcode::Resource { id: payload },
            9 => Opcode::Post,
            10 => Opcode::Copy { count: payload },
            11 => Opcode::Clone { index: payload },
            12 => Opcode::Strcpy { max_count: payload },
            13 => Opcode::Extend { value: payload },
            14 => Opcode::Add { delta: payload },
            15 => Opcode::Label { value: payload },
            16 => Opcode::SwitchThread { index: payload },
            17 => Opcode::JumpLabel { label: payload },
            18 => Opcode::JumpNZ { label: payload },
            19 => Opcode::JumpZ { label: payload },
            20 => Opcode::Notification { id: payload },
            21 => Opcode::Wait { id: payload },
            22 => Opcode::InlineResource {
                data: (0..payload).map(|_| d.u32()).collect::<Result<_, _>>()?,
            },
            other => return Err(OpcodeError::UnknownOpcode(other)),
        })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Call {
                push_return,
                api,
                function,
            } => write!(f, "Call(api: {api}, function: {function}, push_return: {push_return})"),
            Opcode::PushI { ty, value } => write!(f, "PushI({ty:?}, {value:#x})"),
            Opcode::LoadC { ty, address } | Opcode::LoadV { ty, address } => {
                write!(f, "{}({ty:?}, {address:#x})", self.name())
            }
            Opcode::Load { ty } => write!(f, "Load({ty:?})"),
            Opcode::Store | Opcode::Post => f.write_str(self.name()),
            Opcode::InlineResource { data } => write!(f, "InlineResource({} words)", data.len()),
            _ => write!(f, "{}({:#x})", self.name(), self.payload().unwrap_or_default()),
        }
    }
}

/// Decodes every instruction in `bytes`.
pub fn disassemble(bytes: &[u8], layout: MemoryLayout) -> Result<Vec<Opcode>, OpcodeError> {
    let mut d = Decoder::new(bytes, layout);
    let mut out = Vec::new();
    while d.offset() < bytes.len() as u64 {
        out.push(Opcode::decode(&mut d)?);
    }
    Ok(out)
}

/// Encodes `ops` into a byte stream.
pub fn assemble(ops: &[Opcode], layout: MemoryLayout) -> Result<Vec<u8>, OpcodeError> {
    let mut e = Encoder::new(Vec::new(), layout);
    for op in ops {
        op.encode(&mut e)?;
    }
    Ok(e.into_inner())
}
