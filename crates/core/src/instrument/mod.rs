//! Method-entry instrumentation engine.
//!
//! For every instance method with a body, injects code at the entry point
//! that reloads each declared parameter, boxes primitives, and reports the
//! value to a monitoring entry point. Classes whose name carries the nested
//! marker (`$`) use the single-argument monitor; all others use the
//! two-argument monitor and pass their own dotted name as a string literal.
//!
//! The rest of the method is untouched: the injected sequence runs
//! unconditionally before the original body, whatever that body later does.

mod code;

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::classfile::{
    parse_method_descriptor, ClassFile, ClassResult, ConstantPool, MemberInfo, ParamType,
};
use crate::pipeline::{PipelineError, PipelineResult, UnitTransform};

/// Marker character identifying nested/synthetic classes.
pub const NESTED_MARKER: char = '$';

/// Descriptor of the single-argument monitor entry point.
pub const MONITOR_DESC_PLAIN: &str = "(Ljava/lang/Object;)V";
/// Descriptor of the two-argument monitor entry point (value, class name).
pub const MONITOR_DESC_NAMED: &str = "(Ljava/lang/Object;Ljava/lang/String;)V";

const ACC_STATIC: u16 = 0x0008;

const OP_LDC: u8 = 0x12;
const OP_LDC_W: u8 = 0x13;
const OP_INVOKESTATIC: u8 = 0xB8;

/// Static method hosting the two monitor entry points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSpec {
    /// Internal (slash-separated) name of the monitor class.
    pub class: String,
    /// Method name; both overloads share it.
    pub method: String,
}

impl Default for MonitorSpec {
    fn default() -> Self {
        Self { class: "com/classweave/runtime/Monitor".to_string(), method: "enter".to_string() }
    }
}

/// The entry-monitor transform: one concrete `UnitTransform`.
#[derive(Debug, Clone, Default)]
pub struct EntryInstrumenter {
    monitor: MonitorSpec,
}

impl EntryInstrumenter {
    pub fn new(monitor: MonitorSpec) -> Self {
        Self { monitor }
    }
}

impl UnitTransform for EntryInstrumenter {
    fn name(&self) -> &'static str {
        "entry-monitor"
    }

    fn transform(
        &self,
        unit_name: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> PipelineResult<()> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        let rewritten = instrument_class(&bytes, &self.monitor)
            .map_err(|source| PipelineError::Rewrite { unit: unit_name.to_string(), source })?;
        output.write_all(&rewritten)?;
        Ok(())
    }
}

/// Rewrite one class so every instance method body reports its parameters at
/// entry. Methods without a body (abstract, native), static methods, and
/// zero-parameter methods come through unchanged.
pub fn instrument_class(bytes: &[u8], monitor: &MonitorSpec) -> ClassResult<Vec<u8>> {
    let mut class = ClassFile::parse(bytes)?;

    let class_name = class.class_name()?.to_string();
    // The cue is a property of the unit, computed once, not per method.
    let nested = class_name.contains(NESTED_MARKER);
    let dotted_name = class_name.replace('/', ".");

    let mut methods = std::mem::take(&mut class.methods);
    for method in &mut methods {
        instrument_method(&mut class.pool, method, monitor, nested, &dotted_name)?;
    }
    class.methods = methods;

    Ok(class.to_bytes())
}

fn instrument_method(
    pool: &mut ConstantPool,
    method: &mut MemberInfo,
    monitor: &MonitorSpec,
    nested: bool,
    dotted_name: &str,
) -> ClassResult<()> {
    // Slot 0 is the receiver; a static method has no receiver to skip over.
    if method.access_flags & ACC_STATIC != 0 {
        return Ok(());
    }

    let descriptor = pool.utf8(method.descriptor_index)?.to_string();
    let params = parse_method_descriptor(&descriptor)?.params;
    if params.is_empty() {
        return Ok(());
    }

    let code_at = match find_code_attribute(pool, method)? {
        Some(index) => index,
        None => return Ok(()),
    };

    let (inject, operand_words) = emit_entry_code(pool, &params, monitor, nested, dotted_name)?;
    let patched =
        code::prepend_entry_code(&method.attributes[code_at].info, &inject, operand_words, pool)?;
    method.attributes[code_at].info = patched;
    Ok(())
}

fn find_code_attribute(pool: &ConstantPool, method: &MemberInfo) -> ClassResult<Option<usize>> {
    for (index, attr) in method.attributes.iter().enumerate() {
        if pool.utf8(attr.name_index)? == "Code" {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

/// Emit the injected instruction sequence and the operand stack depth it
/// needs. One load/box/monitor group per parameter, in declaration order.
fn emit_entry_code(
    pool: &mut ConstantPool,
    params: &[ParamType],
    monitor: &MonitorSpec,
    nested: bool,
    dotted_name: &str,
) -> ClassResult<(Vec<u8>, u16)> {
    let monitor_desc = if nested { MONITOR_DESC_PLAIN } else { MONITOR_DESC_NAMED };
    let monitor_ref = pool.ensure_method_ref(&monitor.class, &monitor.method, monitor_desc)?;
    let name_const = if nested { None } else { Some(pool.ensure_string(dotted_name)?) };

    let mut out = Vec::new();
    for (position, param) in params.iter().enumerate() {
        let slot = position + 1;
        if slot > u8::MAX as usize {
            return Err(crate::classfile::ClassError::Malformed(format!(
                "parameter slot {slot} out of range"
            )));
        }

        out.push(param.load_opcode());
        out.push(slot as u8);

        if let Some((box_class, box_method, box_desc)) = param.boxing() {
            let box_ref = pool.ensure_method_ref(box_class, box_method, box_desc)?;
            out.push(OP_INVOKESTATIC);
            out.extend_from_slice(&box_ref.to_be_bytes());
        }

        if let Some(name_const) = name_const {
            if name_const <= u8::MAX as u16 {
                out.push(OP_LDC);
                out.push(name_const as u8);
            } else {
                out.push(OP_LDC_W);
                out.extend_from_slice(&name_const.to_be_bytes());
            }
        }

        out.push(OP_INVOKESTATIC);
        out.extend_from_slice(&monitor_ref.to_be_bytes());
    }

    let value_words: u16 = if params.iter().any(|p| p.is_wide()) { 2 } else { 1 };
    let operand_words = value_words + u16::from(!nested);
    Ok((out, operand_words))
}
