//! Callback-driven traversal.
//!
//! A [`Visitor`] is a set of optional hooks, one per element type plus
//! `before`/`after`/`corrupt`, and [`visit_all`] drives one over a
//! structural cursor. Returning [`ControlFlow::Break`] from any hook halts
//! the traversal successfully; corruption fires
//! [`Visitor::visit_corrupt`] with the offending element's byte offset and
//! then surfaces as the error return.
//!
//! String-shaped values (keys excepted) reach their hooks as raw bytes:
//! the wire format does not promise valid UTF-8, and the policy of what to
//! do about that belongs to the visitor — the validator rejects, the JSON
//! renderer substitutes.

use std::ops::ControlFlow;

use crate::{
    array::Array,
    document::Document,
    error::Result,
    iter::{Element, Elements},
    oid::ObjectId,
    spec::{BinarySubtype, ElementType},
    value::Timestamp,
};

/// Per-type callbacks over a document traversal. Every method defaults to
/// "keep going".
#[allow(unused_variables)]
pub trait Visitor {
    /// Called before each element's typed hook.
    fn visit_before(&mut self, element: &Element<'_>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called after each element's typed hook.
    fn visit_after(&mut self, element: &Element<'_>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called once if the traversal hits corruption, with the byte offset
    /// of the offending element.
    fn visit_corrupt(&mut self, offset: usize) {}

    fn visit_double(&mut self, value: f64) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_utf8(&mut self, value: &[u8]) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_document(&mut self, value: &Document) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_array(&mut self, value: &Array) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_binary(&mut self, subtype: BinarySubtype, bytes: &[u8]) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_undefined(&mut self) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_oid(&mut self, value: &ObjectId) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_bool(&mut self, value: bool) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Milliseconds since the Unix epoch.
    fn visit_date_time(&mut self, millis: i64) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_null(&mut self) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_regex(&mut self, pattern: &[u8], options: &[u8]) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_dbpointer(&mut self, namespace: &[u8], id: &ObjectId) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_code(&mut self, code: &[u8]) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_symbol(&mut self, value: &[u8]) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_code_with_scope(&mut self, code: &[u8], scope: &Document) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_int32(&mut self, value: i32) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_timestamp(&mut self, value: Timestamp) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_int64(&mut self, value: i64) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_max_key(&mut self) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_min_key(&mut self) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Drives `visitor` over every element `elements` yields.
///
/// Returns `Ok` when the cursor is exhausted or a hook breaks out;
/// corruption (including values whose framing decodes but whose contents
/// cannot, such as a bad legacy binary prefix) reports through
/// [`Visitor::visit_corrupt`] and then returns the error.
pub fn visit_all<V: Visitor + ?Sized>(
    elements: &mut Elements<'_>,
    visitor: &mut V,
) -> Result<()> {
    for element in elements {
        let element = match element {
            Ok(element) => element,
            Err(e) => {
                visitor.visit_corrupt(e.offset.unwrap_or(0));
                return Err(e);
            }
        };

        if visitor.visit_before(&element).is_break() {
            return Ok(());
        }

        let flow = match dispatch(visitor, &element) {
            Ok(flow) => flow,
            Err(e) => {
                visitor.visit_corrupt(e.offset.unwrap_or(element.offset()));
                return Err(e);
            }
        };
        if flow.is_break() {
            return Ok(());
        }

        if visitor.visit_after(&element).is_break() {
            return Ok(());
        }
    }
    Ok(())
}

fn dispatch<V: Visitor + ?Sized>(visitor: &mut V, element: &Element<'_>) -> Result<ControlFlow<()>> {
    Ok(match element.element_type() {
        ElementType::Double => visitor.visit_double(element.f64_value()),
        ElementType::String => visitor.visit_utf8(element.utf8_raw()),
        ElementType::EmbeddedDocument => visitor.visit_document(element.document_value()),
        ElementType::Array => visitor.visit_array(element.array_value()),
        ElementType::Binary => {
            let (subtype, bytes) = element.binary_raw()?;
            visitor.visit_binary(subtype, bytes)
        }
        ElementType::Undefined => visitor.visit_undefined(),
        ElementType::ObjectId => visitor.visit_oid(&element.oid_value()),
        ElementType::Boolean => visitor.visit_bool(element.bool_raw()),
        ElementType::DateTime => visitor.visit_date_time(element.i64_value()),
        ElementType::Null => visitor.visit_null(),
        ElementType::RegularExpression => {
            let (pattern, options) = element.regex_raw();
            visitor.visit_regex(pattern, options)
        }
        ElementType::DbPointer => {
            let (namespace, id) = element.dbpointer_raw();
            visitor.visit_dbpointer(namespace, &id)
        }
        ElementType::JavaScriptCode => visitor.visit_code(element.utf8_raw()),
        ElementType::Symbol => visitor.visit_symbol(element.utf8_raw()),
        ElementType::JavaScriptCodeWithScope => {
            let (code, scope) = element.code_with_scope_raw()?;
            visitor.visit_code_with_scope(code, scope)
        }
        ElementType::Int32 => visitor.visit_int32(element.i32_value()),
        ElementType::Timestamp => visitor.visit_timestamp(element.timestamp_value()),
        ElementType::Int64 => visitor.visit_int64(element.i64_value()),
        ElementType::MaxKey => visitor.visit_max_key(),
        ElementType::MinKey => visitor.visit_min_key(),
    })
}
