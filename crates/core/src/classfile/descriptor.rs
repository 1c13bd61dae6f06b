//! Method descriptor parsing.
//!
//! A descriptor such as `(I[Ljava/lang/String;D)V` is reduced to an ordered
//! list of parameter type tags. The instrumentation engine only needs enough
//! of the type to pick a load opcode and a boxing conversion, so arrays and
//! object types collapse into a single `Reference` tag.

use super::{ClassError, ClassResult};

/// Parameter type tag derived from one descriptor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Object or array type; passed through unboxed.
    Reference,
}

impl ParamType {
    /// True for primitive tags that need a boxing conversion.
    pub fn is_primitive(self) -> bool {
        !matches!(self, ParamType::Reference)
    }

    /// True for category-2 values (two operand stack words).
    pub fn is_wide(self) -> bool {
        matches!(self, ParamType::Long | ParamType::Double)
    }

    /// Opcode that loads a value of this type from a local slot.
    pub fn load_opcode(self) -> u8 {
        match self {
            ParamType::Boolean
            | ParamType::Byte
            | ParamType::Char
            | ParamType::Short
            | ParamType::Int => 0x15, // iload
            ParamType::Long => 0x16,  // lload
            ParamType::Float => 0x17, // fload
            ParamType::Double => 0x18, // dload
            ParamType::Reference => 0x19, // aload
        }
    }

    /// Boxing conversion for a primitive: `(wrapper class, method, descriptor)`.
    pub fn boxing(self) -> Option<(&'static str, &'static str, &'static str)> {
        let (class, descriptor) = match self {
            ParamType::Boolean => ("java/lang/Boolean", "(Z)Ljava/lang/Boolean;"),
            ParamType::Byte => ("java/lang/Byte", "(B)Ljava/lang/Byte;"),
            ParamType::Char => ("java/lang/Character", "(C)Ljava/lang/Character;"),
            ParamType::Short => ("java/lang/Short", "(S)Ljava/lang/Short;"),
            ParamType::Int => ("java/lang/Integer", "(I)Ljava/lang/Integer;"),
            ParamType::Long => ("java/lang/Long", "(J)Ljava/lang/Long;"),
            ParamType::Float => ("java/lang/Float", "(F)Ljava/lang/Float;"),
            ParamType::Double => ("java/lang/Double", "(D)Ljava/lang/Double;"),
            ParamType::Reference => return None,
        };
        Some((class, "valueOf", descriptor))
    }
}

/// Parameter list of one method descriptor, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodDescriptor {
    pub params: Vec<ParamType>,
}

/// Parse a method descriptor into its parameter tags.
///
/// The return type is required to be present but is otherwise ignored.
pub fn parse_method_descriptor(descriptor: &str) -> ClassResult<MethodDescriptor> {
    let bytes = descriptor.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Err(malformed(descriptor));
    }

    let mut params = Vec::new();
    let mut pos = 1;
    loop {
        match bytes.get(pos) {
            None => return Err(malformed(descriptor)),
            Some(b')') => {
                pos += 1;
                break;
            }
            Some(_) => {
                let (param, next) = parse_field_type(descriptor, pos)?;
                params.push(param);
                pos = next;
            }
        }
    }

    // Return type: one remaining field type or `V`.
    if pos >= bytes.len() {
        return Err(malformed(descriptor));
    }
    if bytes[pos] != b'V' {
        let (_, next) = parse_field_type(descriptor, pos)?;
        pos = next;
        if pos != bytes.len() {
            return Err(malformed(descriptor));
        }
    } else if pos + 1 != bytes.len() {
        return Err(malformed(descriptor));
    }

    Ok(MethodDescriptor { params })
}

/// Parse one field type starting at `pos`, returning the tag and the offset
/// just past it.
fn parse_field_type(descriptor: &str, mut pos: usize) -> ClassResult<(ParamType, usize)> {
    let bytes = descriptor.as_bytes();

    // Array dimensions reduce to a reference regardless of element type.
    let mut is_array = false;
    while bytes.get(pos) == Some(&b'[') {
        is_array = true;
        pos += 1;
    }

    let tag = match bytes.get(pos) {
        Some(b'Z') => ParamType::Boolean,
        Some(b'B') => ParamType::Byte,
        Some(b'C') => ParamType::Char,
        Some(b'S') => ParamType::Short,
        Some(b'I') => ParamType::Int,
        Some(b'J') => ParamType::Long,
        Some(b'F') => ParamType::Float,
        Some(b'D') => ParamType::Double,
        Some(b'L') => {
            let end = bytes[pos..]
                .iter()
                .position(|&b| b == b';')
                .ok_or_else(|| malformed(descriptor))?;
            return Ok((ParamType::Reference, pos + end + 1));
        }
        _ => return Err(malformed(descriptor)),
    };

    let tag = if is_array { ParamType::Reference } else { tag };
    Ok((tag, pos + 1))
}

fn malformed(descriptor: &str) -> ClassError {
    ClassError::Malformed(format!("invalid method descriptor `{descriptor}`"))
}
