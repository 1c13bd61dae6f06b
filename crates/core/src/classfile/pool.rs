//! Constant pool parsing, serialization, and interning.
//!
//! The pool is kept close to the wire format: Utf8 payloads stay as raw
//! (modified UTF-8) bytes, float/double payloads stay as raw bits, so a
//! parse/write cycle is byte-identical. The `ensure_*` helpers intern new
//! entries for the instrumentation engine, deduplicating against existing
//! ones.

use super::{put_u16, put_u32, ClassError, ClassResult, Reader};

/// One constant pool entry. Variants mirror JVMS §4.4.
#[derive(Debug, Clone, PartialEq)]
pub enum CpEntry {
    /// Tag 1. Raw modified-UTF-8 payload.
    Utf8(Vec<u8>),
    /// Tag 3.
    Integer(i32),
    /// Tag 4. Raw bit pattern.
    Float(u32),
    /// Tag 5. Occupies two slots.
    Long(i64),
    /// Tag 6. Raw bit pattern, occupies two slots.
    Double(u64),
    /// Tag 7.
    Class(u16),
    /// Tag 8.
    String(u16),
    /// Tag 9.
    FieldRef { class: u16, name_and_type: u16 },
    /// Tag 10.
    MethodRef { class: u16, name_and_type: u16 },
    /// Tag 11.
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    /// Tag 12.
    NameAndType { name: u16, descriptor: u16 },
    /// Tag 15.
    MethodHandle { kind: u8, reference: u16 },
    /// Tag 16.
    MethodType(u16),
    /// Tag 17.
    Dynamic { bootstrap: u16, name_and_type: u16 },
    /// Tag 18.
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    /// Tag 19.
    Module(u16),
    /// Tag 20.
    Package(u16),
}

impl CpEntry {
    /// True for entries that occupy two pool slots (Long/Double).
    fn is_wide(&self) -> bool {
        matches!(self, CpEntry::Long(_) | CpEntry::Double(_))
    }
}

/// The constant pool. Slot 0 is always vacant; the slot after a Long or
/// Double entry is a phantom, represented as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    slots: Vec<Option<CpEntry>>,
}

impl Default for ConstantPool {
    /// An empty pool still carries the vacant slot 0.
    fn default() -> Self {
        Self { slots: vec![None] }
    }
}

impl ConstantPool {
    pub(crate) fn parse(r: &mut Reader<'_>) -> ClassResult<Self> {
        let count = r.u16("constant_pool_count")?;
        let mut slots: Vec<Option<CpEntry>> = Vec::with_capacity(count as usize);
        slots.push(None);

        let mut index: u16 = 1;
        while index < count {
            let tag = r.u8("constant_pool_tag")?;
            let entry = match tag {
                1 => {
                    let len = r.u16("utf8_length")? as usize;
                    CpEntry::Utf8(r.take(len, "utf8_bytes")?.to_vec())
                }
                3 => CpEntry::Integer(r.u32("integer")? as i32),
                4 => CpEntry::Float(r.u32("float")?),
                5 => {
                    let hi = r.u32("long")? as u64;
                    let lo = r.u32("long")? as u64;
                    CpEntry::Long(((hi << 32) | lo) as i64)
                }
                6 => {
                    let hi = r.u32("double")? as u64;
                    let lo = r.u32("double")? as u64;
                    CpEntry::Double((hi << 32) | lo)
                }
                7 => CpEntry::Class(r.u16("class_name_index")?),
                8 => CpEntry::String(r.u16("string_index")?),
                9 => CpEntry::FieldRef {
                    class: r.u16("fieldref_class")?,
                    name_and_type: r.u16("fieldref_nat")?,
                },
                10 => CpEntry::MethodRef {
                    class: r.u16("methodref_class")?,
                    name_and_type: r.u16("methodref_nat")?,
                },
                11 => CpEntry::InterfaceMethodRef {
                    class: r.u16("interfacemethodref_class")?,
                    name_and_type: r.u16("interfacemethodref_nat")?,
                },
                12 => CpEntry::NameAndType {
                    name: r.u16("nameandtype_name")?,
                    descriptor: r.u16("nameandtype_descriptor")?,
                },
                15 => CpEntry::MethodHandle {
                    kind: r.u8("methodhandle_kind")?,
                    reference: r.u16("methodhandle_reference")?,
                },
                16 => CpEntry::MethodType(r.u16("methodtype_descriptor")?),
                17 => CpEntry::Dynamic {
                    bootstrap: r.u16("dynamic_bootstrap")?,
                    name_and_type: r.u16("dynamic_nat")?,
                },
                18 => CpEntry::InvokeDynamic {
                    bootstrap: r.u16("invokedynamic_bootstrap")?,
                    name_and_type: r.u16("invokedynamic_nat")?,
                },
                19 => CpEntry::Module(r.u16("module_name_index")?),
                20 => CpEntry::Package(r.u16("package_name_index")?),
                other => return Err(ClassError::UnknownPoolTag { tag: other, index }),
            };

            let wide = entry.is_wide();
            slots.push(Some(entry));
            index += 1;
            if wide {
                slots.push(None);
                index += 1;
            }
        }

        Ok(Self { slots })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        put_u16(out, self.slots.len() as u16);
        for entry in self.slots.iter().flatten() {
            match entry {
                CpEntry::Utf8(bytes) => {
                    out.push(1);
                    put_u16(out, bytes.len() as u16);
                    out.extend_from_slice(bytes);
                }
                CpEntry::Integer(v) => {
                    out.push(3);
                    put_u32(out, *v as u32);
                }
                CpEntry::Float(bits) => {
                    out.push(4);
                    put_u32(out, *bits);
                }
                CpEntry::Long(v) => {
                    out.push(5);
                    put_u32(out, ((*v as u64) >> 32) as u32);
                    put_u32(out, *v as u32);
                }
                CpEntry::Double(bits) => {
                    out.push(6);
                    put_u32(out, (bits >> 32) as u32);
                    put_u32(out, *bits as u32);
                }
                CpEntry::Class(idx) => {
                    out.push(7);
                    put_u16(out, *idx);
                }
                CpEntry::String(idx) => {
                    out.push(8);
                    put_u16(out, *idx);
                }
                CpEntry::FieldRef { class, name_and_type } => {
                    out.push(9);
                    put_u16(out, *class);
                    put_u16(out, *name_and_type);
                }
                CpEntry::MethodRef { class, name_and_type } => {
                    out.push(10);
                    put_u16(out, *class);
                    put_u16(out, *name_and_type);
                }
                CpEntry::InterfaceMethodRef { class, name_and_type } => {
                    out.push(11);
                    put_u16(out, *class);
                    put_u16(out, *name_and_type);
                }
                CpEntry::NameAndType { name, descriptor } => {
                    out.push(12);
                    put_u16(out, *name);
                    put_u16(out, *descriptor);
                }
                CpEntry::MethodHandle { kind, reference } => {
                    out.push(15);
                    out.push(*kind);
                    put_u16(out, *reference);
                }
                CpEntry::MethodType(idx) => {
                    out.push(16);
                    put_u16(out, *idx);
                }
                CpEntry::Dynamic { bootstrap, name_and_type } => {
                    out.push(17);
                    put_u16(out, *bootstrap);
                    put_u16(out, *name_and_type);
                }
                CpEntry::InvokeDynamic { bootstrap, name_and_type } => {
                    out.push(18);
                    put_u16(out, *bootstrap);
                    put_u16(out, *name_and_type);
                }
                CpEntry::Module(idx) => {
                    out.push(19);
                    put_u16(out, *idx);
                }
                CpEntry::Package(idx) => {
                    out.push(20);
                    put_u16(out, *idx);
                }
            }
        }
    }

    /// Number of slots including the vacant slot 0 (the wire-format count).
    pub fn count(&self) -> u16 {
        self.slots.len() as u16
    }

    /// Look up an entry by 1-based index.
    pub fn get(&self, index: u16) -> ClassResult<&CpEntry> {
        self.slots
            .get(index as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| ClassError::Malformed(format!("invalid constant pool index {index}")))
    }

    /// Decode a Utf8 entry as a string slice.
    pub fn utf8(&self, index: u16) -> ClassResult<&str> {
        match self.get(index)? {
            CpEntry::Utf8(bytes) => std::str::from_utf8(bytes).map_err(|_| {
                ClassError::Malformed(format!("constant pool Utf8 entry {index} is not UTF-8"))
            }),
            _ => Err(ClassError::Malformed(format!("constant pool entry {index} is not Utf8"))),
        }
    }

    /// Resolve a Class entry to its internal name.
    pub fn class_name(&self, index: u16) -> ClassResult<&str> {
        match self.get(index)? {
            CpEntry::Class(name_index) => self.utf8(*name_index),
            _ => Err(ClassError::Malformed(format!("constant pool entry {index} is not a Class"))),
        }
    }

    fn find(&self, entry: &CpEntry) -> Option<u16> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref() == Some(entry))
            .map(|pos| pos as u16)
    }

    fn push(&mut self, entry: CpEntry) -> ClassResult<u16> {
        let wide = entry.is_wide();
        let needed = if wide { 2 } else { 1 };
        if self.slots.len() + needed > u16::MAX as usize {
            return Err(ClassError::PoolOverflow);
        }
        let index = self.slots.len() as u16;
        self.slots.push(Some(entry));
        if wide {
            self.slots.push(None);
        }
        Ok(index)
    }

    fn ensure(&mut self, entry: CpEntry) -> ClassResult<u16> {
        match self.find(&entry) {
            Some(index) => Ok(index),
            None => self.push(entry),
        }
    }

    /// Intern a Utf8 entry.
    pub fn ensure_utf8(&mut self, value: &str) -> ClassResult<u16> {
        if value.len() > u16::MAX as usize {
            return Err(ClassError::Malformed("Utf8 constant longer than 65535 bytes".into()));
        }
        self.ensure(CpEntry::Utf8(value.as_bytes().to_vec()))
    }

    /// Intern a Class entry for an internal name.
    pub fn ensure_class(&mut self, name: &str) -> ClassResult<u16> {
        let name_index = self.ensure_utf8(name)?;
        self.ensure(CpEntry::Class(name_index))
    }

    /// Intern a String entry for a literal.
    pub fn ensure_string(&mut self, value: &str) -> ClassResult<u16> {
        let value_index = self.ensure_utf8(value)?;
        self.ensure(CpEntry::String(value_index))
    }

    /// Intern a NameAndType entry.
    pub fn ensure_name_and_type(&mut self, name: &str, descriptor: &str) -> ClassResult<u16> {
        let name_index = self.ensure_utf8(name)?;
        let descriptor_index = self.ensure_utf8(descriptor)?;
        self.ensure(CpEntry::NameAndType { name: name_index, descriptor: descriptor_index })
    }

    /// Intern a MethodRef entry for `class.name(descriptor)`.
    pub fn ensure_method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> ClassResult<u16> {
        let class_index = self.ensure_class(class)?;
        let nat_index = self.ensure_name_and_type(name, descriptor)?;
        self.ensure(CpEntry::MethodRef { class: class_index, name_and_type: nat_index })
    }
}
