//! Test support: synthesizes minimal, valid class files.
//!
//! Kept as a regular module (not `#[cfg(test)]`) so integration tests and
//! downstream crates' tests can build fixtures without a Java toolchain.

use crate::classfile::{AttributeInfo, ClassFile, ClassResult, ConstantPool, MemberInfo};

const ACC_PUBLIC: u16 = 0x0001;
const ACC_STATIC: u16 = 0x0008;
const ACC_SUPER: u16 = 0x0020;

struct MethodFixture {
    name: String,
    descriptor: String,
    access_flags: u16,
}

/// Builder for a small class file with empty (`return`) method bodies.
pub struct ClassBuilder {
    name: String,
    methods: Vec<MethodFixture>,
}

impl ClassBuilder {
    /// Start a class with the given internal (slash-separated) name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), methods: Vec::new() }
    }

    /// Add a public instance method with a `return`-only body.
    pub fn method(mut self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.methods.push(MethodFixture {
            name: name.into(),
            descriptor: descriptor.into(),
            access_flags: ACC_PUBLIC,
        });
        self
    }

    /// Add a public static method with a `return`-only body.
    pub fn static_method(
        mut self,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        self.methods.push(MethodFixture {
            name: name.into(),
            descriptor: descriptor.into(),
            access_flags: ACC_PUBLIC | ACC_STATIC,
        });
        self
    }

    /// Serialize the class to bytes.
    pub fn build(self) -> ClassResult<Vec<u8>> {
        let mut pool = ConstantPool::default();
        let this_class = pool.ensure_class(&self.name)?;
        let super_class = pool.ensure_class("java/lang/Object")?;
        let code_name = pool.ensure_utf8("Code")?;

        let mut methods = Vec::with_capacity(self.methods.len());
        for fixture in &self.methods {
            let name_index = pool.ensure_utf8(&fixture.name)?;
            let descriptor_index = pool.ensure_utf8(&fixture.descriptor)?;

            // Code attribute: max_stack 0, generous max_locals, one return.
            let mut info = Vec::new();
            info.extend_from_slice(&0u16.to_be_bytes()); // max_stack
            info.extend_from_slice(&8u16.to_be_bytes()); // max_locals
            info.extend_from_slice(&1u32.to_be_bytes()); // code_length
            info.push(0xB1); // return
            info.extend_from_slice(&0u16.to_be_bytes()); // exception_table_length
            info.extend_from_slice(&0u16.to_be_bytes()); // attributes_count

            methods.push(MemberInfo {
                access_flags: fixture.access_flags,
                name_index,
                descriptor_index,
                attributes: vec![AttributeInfo { name_index: code_name, info }],
            });
        }

        let class = ClassFile {
            minor_version: 0,
            major_version: 52, // Java 8
            pool,
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods,
            attributes: Vec::new(),
        };
        Ok(class.to_bytes())
    }
}
