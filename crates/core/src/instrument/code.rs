//! Code attribute surgery: prepend instructions to a method body.
//!
//! Prepending `k` bytes shifts every absolute pc in the attribute by `k`.
//! Relative branch offsets inside the original body are unaffected, but the
//! exception table, the StackMapTable (first frame delta and any
//! `Uninitialized` offsets), and the debug tables all carry absolute pcs and
//! must be rewritten. Compressed stack-map frame forms are promoted to their
//! extended forms when a shifted delta no longer fits.

use crate::classfile::{
    parse_attributes, put_u16, put_u32, write_attributes, AttributeInfo, ClassError, ClassResult,
    ConstantPool, Reader,
};

/// Hard pc ceiling: every pc-bearing table stores pcs as u16.
const MAX_CODE_LEN: usize = u16::MAX as usize;

/// Rewrite a `Code` attribute payload so that `inject` executes before the
/// original body. `operand_words` is the stack depth the injected sequence
/// needs; `max_stack` is raised to at least that.
pub(crate) fn prepend_entry_code(
    attr: &[u8],
    inject: &[u8],
    operand_words: u16,
    pool: &ConstantPool,
) -> ClassResult<Vec<u8>> {
    let mut r = Reader::new(attr);

    let max_stack = r.u16("max_stack")?;
    let max_locals = r.u16("max_locals")?;
    let code_len = r.u32("code_length")? as usize;
    let code = r.take(code_len, "code")?;

    let k = inject.len();
    if code_len + k > MAX_CODE_LEN {
        return Err(ClassError::CodeTooLarge(code_len + k));
    }
    let shift = k as u16;

    let mut out = Vec::with_capacity(attr.len() + k);
    put_u16(&mut out, max_stack.max(operand_words));
    put_u16(&mut out, max_locals);
    put_u32(&mut out, (code_len + k) as u32);
    out.extend_from_slice(inject);
    out.extend_from_slice(code);

    let exception_count = r.u16("exception_table_length")?;
    put_u16(&mut out, exception_count);
    for _ in 0..exception_count {
        let start_pc = r.u16("exception_start_pc")?;
        let end_pc = r.u16("exception_end_pc")?;
        let handler_pc = r.u16("exception_handler_pc")?;
        let catch_type = r.u16("exception_catch_type")?;
        put_u16(&mut out, shifted(start_pc, shift)?);
        put_u16(&mut out, shifted(end_pc, shift)?);
        put_u16(&mut out, shifted(handler_pc, shift)?);
        put_u16(&mut out, catch_type);
    }

    let nested = parse_attributes(&mut r)?;
    let mut rewritten = Vec::with_capacity(nested.len());
    for attr in nested {
        let info = match pool.utf8(attr.name_index)? {
            "StackMapTable" => shift_stack_map(&attr.info, shift)?,
            "LineNumberTable" => shift_pc_pairs(&attr.info, shift)?,
            "LocalVariableTable" | "LocalVariableTypeTable" => {
                shift_local_variables(&attr.info, shift)?
            }
            _ => attr.info,
        };
        rewritten.push(AttributeInfo { name_index: attr.name_index, info });
    }
    write_attributes(&mut out, &rewritten);

    Ok(out)
}

fn shifted(pc: u16, shift: u16) -> ClassResult<u16> {
    pc.checked_add(shift)
        .ok_or_else(|| ClassError::Malformed(format!("pc {pc} overflows after shift by {shift}")))
}

/// Shift a StackMapTable payload. Only the first frame's delta moves (later
/// deltas are relative to the previous frame); `Uninitialized` verification
/// entries carry absolute offsets and are shifted in every frame.
fn shift_stack_map(info: &[u8], shift: u16) -> ClassResult<Vec<u8>> {
    let mut r = Reader::new(info);
    let count = r.u16("stack_map_entries")?;

    let mut out = Vec::with_capacity(info.len() + 4);
    put_u16(&mut out, count);

    for i in 0..count {
        let first = i == 0;
        let tag = r.u8("stack_map_frame_type")?;
        match tag {
            // same_frame
            0..=63 => {
                if first {
                    let delta = shifted(tag as u16, shift)?;
                    if delta <= 63 {
                        out.push(delta as u8);
                    } else {
                        out.push(251); // same_frame_extended
                        put_u16(&mut out, delta);
                    }
                } else {
                    out.push(tag);
                }
            }
            // same_locals_1_stack_item_frame
            64..=127 => {
                if first {
                    let delta = shifted((tag - 64) as u16, shift)?;
                    if delta <= 63 {
                        out.push(64 + delta as u8);
                    } else {
                        out.push(247); // same_locals_1_stack_item_frame_extended
                        put_u16(&mut out, delta);
                    }
                } else {
                    out.push(tag);
                }
                copy_verification_type(&mut r, &mut out, shift)?;
            }
            // same_locals_1_stack_item_frame_extended
            247 => {
                let delta = r.u16("frame_offset_delta")?;
                out.push(247);
                put_u16(&mut out, if first { shifted(delta, shift)? } else { delta });
                copy_verification_type(&mut r, &mut out, shift)?;
            }
            // chop_frame, same_frame_extended
            248..=251 => {
                let delta = r.u16("frame_offset_delta")?;
                out.push(tag);
                put_u16(&mut out, if first { shifted(delta, shift)? } else { delta });
            }
            // append_frame
            252..=254 => {
                let delta = r.u16("frame_offset_delta")?;
                out.push(tag);
                put_u16(&mut out, if first { shifted(delta, shift)? } else { delta });
                for _ in 0..(tag - 251) {
                    copy_verification_type(&mut r, &mut out, shift)?;
                }
            }
            // full_frame
            255 => {
                let delta = r.u16("frame_offset_delta")?;
                out.push(255);
                put_u16(&mut out, if first { shifted(delta, shift)? } else { delta });
                let locals = r.u16("full_frame_locals")?;
                put_u16(&mut out, locals);
                for _ in 0..locals {
                    copy_verification_type(&mut r, &mut out, shift)?;
                }
                let stack = r.u16("full_frame_stack")?;
                put_u16(&mut out, stack);
                for _ in 0..stack {
                    copy_verification_type(&mut r, &mut out, shift)?;
                }
            }
            other => {
                return Err(ClassError::Malformed(format!(
                    "reserved stack map frame type {other}"
                )))
            }
        }
    }

    Ok(out)
}

/// Copy one verification_type_info, shifting `Uninitialized` offsets.
fn copy_verification_type(
    r: &mut Reader<'_>,
    out: &mut Vec<u8>,
    shift: u16,
) -> ClassResult<()> {
    let tag = r.u8("verification_type_tag")?;
    out.push(tag);
    match tag {
        // Top, Integer, Float, Double, Long, Null, UninitializedThis
        0..=6 => {}
        // Object: constant pool index, not a pc
        7 => put_u16(out, r.u16("verification_type_cpool_index")?),
        // Uninitialized: offset of the `new` instruction
        8 => put_u16(out, shifted(r.u16("verification_type_offset")?, shift)?),
        other => {
            return Err(ClassError::Malformed(format!("unknown verification type tag {other}")))
        }
    }
    Ok(())
}

/// Shift a LineNumberTable payload (pairs of `start_pc`, `line_number`).
fn shift_pc_pairs(info: &[u8], shift: u16) -> ClassResult<Vec<u8>> {
    let mut r = Reader::new(info);
    let count = r.u16("line_number_entries")?;

    let mut out = Vec::with_capacity(info.len());
    put_u16(&mut out, count);
    for _ in 0..count {
        let start_pc = r.u16("line_number_start_pc")?;
        let line = r.u16("line_number")?;
        put_u16(&mut out, shifted(start_pc, shift)?);
        put_u16(&mut out, line);
    }
    Ok(out)
}

/// Shift a LocalVariable(Type)Table payload. Entries are ten bytes; only
/// `start_pc` moves, the covered length stays the same.
fn shift_local_variables(info: &[u8], shift: u16) -> ClassResult<Vec<u8>> {
    let mut r = Reader::new(info);
    let count = r.u16("local_variable_entries")?;

    let mut out = Vec::with_capacity(info.len());
    put_u16(&mut out, count);
    for _ in 0..count {
        let start_pc = r.u16("local_variable_start_pc")?;
        put_u16(&mut out, shifted(start_pc, shift)?);
        let rest = r.take(8, "local_variable_entry")?;
        out.extend_from_slice(rest);
    }
    Ok(out)
}
