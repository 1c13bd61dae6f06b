//! Minimal JVM class-file model: parsing, in-place rewriting, and serialization.
//!
//! This is not a general bytecode toolkit. It models exactly what the
//! instrumentation engine needs: the constant pool (all JVMS tags, so any
//! valid class round-trips), the method table, and attributes kept as raw
//! bytes except where entry injection has to edit them (`Code` and the
//! pc-bearing attributes nested inside it).

pub mod descriptor;
pub mod pool;

use thiserror::Error;

pub use descriptor::{parse_method_descriptor, MethodDescriptor, ParamType};
pub use pool::{ConstantPool, CpEntry};

/// Class-file magic number.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Error type for class-file parsing and rewriting.
#[derive(Debug, Error)]
pub enum ClassError {
    /// Input ended before a structure was fully read.
    #[error("Class file truncated at offset {offset} while reading {what}")]
    Truncated { offset: usize, what: &'static str },

    /// The file does not start with `0xCAFEBABE`.
    #[error("Bad class file magic 0x{found:08X}")]
    BadMagic { found: u32 },

    /// A constant pool entry carries a tag we do not recognize.
    #[error("Unknown constant pool tag {tag} at index {index}")]
    UnknownPoolTag { tag: u8, index: u16 },

    /// Structurally invalid content (bad index, bad descriptor, bad frame).
    #[error("Malformed class file: {0}")]
    Malformed(String),

    /// The constant pool cannot hold any more entries.
    #[error("Constant pool overflow (more than 65534 slots)")]
    PoolOverflow,

    /// A method body would exceed the format's pc range after rewriting.
    #[error("Method body too large after injection ({0} bytes)")]
    CodeTooLarge(usize),
}

/// Convenience result type for class-file operations.
pub type ClassResult<T> = Result<T, ClassError>;

/// Big-endian cursor over a class-file byte slice.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(crate) fn take(&mut self, n: usize, what: &'static str) -> ClassResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(ClassError::Truncated { offset: self.pos, what });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self, what: &'static str) -> ClassResult<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub(crate) fn u16(&mut self, what: &'static str) -> ClassResult<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self, what: &'static str) -> ClassResult<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Push helpers mirroring `Reader` for serialization.
pub(crate) fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// One attribute, name plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

/// One field or method entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

/// A parsed class file.
///
/// Everything outside the constant pool and the tables we rewrite is carried
/// verbatim, so `parse` followed by `to_bytes` is lossless.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    /// Parse a class file from raw bytes.
    pub fn parse(bytes: &[u8]) -> ClassResult<Self> {
        let mut r = Reader::new(bytes);

        let magic = r.u32("magic")?;
        if magic != MAGIC {
            return Err(ClassError::BadMagic { found: magic });
        }
        let minor_version = r.u16("minor_version")?;
        let major_version = r.u16("major_version")?;

        let pool = ConstantPool::parse(&mut r)?;

        let access_flags = r.u16("access_flags")?;
        let this_class = r.u16("this_class")?;
        let super_class = r.u16("super_class")?;

        let interface_count = r.u16("interfaces_count")?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(r.u16("interface")?);
        }

        let fields = parse_members(&mut r, "field")?;
        let methods = parse_members(&mut r, "method")?;
        let attributes = parse_attributes(&mut r)?;

        Ok(Self {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Internal (slash-separated) name of this class from `this_class`.
    pub fn class_name(&self) -> ClassResult<&str> {
        self.pool.class_name(self.this_class)
    }

    /// Serialize back to class-file bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_u32(&mut out, MAGIC);
        put_u16(&mut out, self.minor_version);
        put_u16(&mut out, self.major_version);

        self.pool.write(&mut out);

        put_u16(&mut out, self.access_flags);
        put_u16(&mut out, self.this_class);
        put_u16(&mut out, self.super_class);

        put_u16(&mut out, self.interfaces.len() as u16);
        for idx in &self.interfaces {
            put_u16(&mut out, *idx);
        }

        write_members(&mut out, &self.fields);
        write_members(&mut out, &self.methods);
        write_attributes(&mut out, &self.attributes);

        out
    }
}

fn parse_members(r: &mut Reader<'_>, what: &'static str) -> ClassResult<Vec<MemberInfo>> {
    let count = r.u16(what)?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = r.u16(what)?;
        let name_index = r.u16(what)?;
        let descriptor_index = r.u16(what)?;
        let attributes = parse_attributes(r)?;
        members.push(MemberInfo { access_flags, name_index, descriptor_index, attributes });
    }
    Ok(members)
}

pub(crate) fn parse_attributes(r: &mut Reader<'_>) -> ClassResult<Vec<AttributeInfo>> {
    let count = r.u16("attributes_count")?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = r.u16("attribute_name_index")?;
        let length = r.u32("attribute_length")? as usize;
        let info = r.take(length, "attribute_info")?.to_vec();
        attributes.push(AttributeInfo { name_index, info });
    }
    Ok(attributes)
}

fn write_members(out: &mut Vec<u8>, members: &[MemberInfo]) {
    put_u16(out, members.len() as u16);
    for member in members {
        put_u16(out, member.access_flags);
        put_u16(out, member.name_index);
        put_u16(out, member.descriptor_index);
        write_attributes(out, &member.attributes);
    }
}

pub(crate) fn write_attributes(out: &mut Vec<u8>, attributes: &[AttributeInfo]) {
    put_u16(out, attributes.len() as u16);
    for attr in attributes {
        put_u16(out, attr.name_index);
        put_u32(out, attr.info.len() as u32);
        out.extend_from_slice(&attr.info);
    }
}
