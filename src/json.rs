//! Extended JSON rendering.
//!
//! Produces the legacy extended-JSON dialect: non-JSON types become
//! wrapper objects with `$`-prefixed keys, documents render as
//! `{ "k" : v }` and arrays as `[ v ]`. Code-with-scope renders as the
//! bare code string, scope omitted, for compatibility with the reference
//! renderer of this format.
//!
//! Keys and string values that are not valid UTF-8 are rendered lossily;
//! structural corruption aborts rendering with an error.

use std::fmt::Write;
use std::ops::ControlFlow;

use crate::{
    array::Array,
    document::Document,
    error::{Error, Result},
    iter::Element,
    oid::ObjectId,
    spec::BinarySubtype,
    value::Timestamp,
    visitor::{visit_all, Visitor},
};

pub(crate) fn document_to_json(doc: &Document) -> Result<String> {
    if doc.is_empty() {
        return Ok("{}".to_string());
    }

    let mut emitter = JsonEmitter {
        out: String::from("{ "),
        keys: true,
        count: 0,
        failure: None,
    };
    visit_all(&mut doc.elements(), &mut emitter)?;
    if let Some(e) = emitter.failure {
        return Err(e);
    }
    emitter.out.push_str(" }");
    Ok(emitter.out)
}

struct JsonEmitter {
    out: String,

    /// Whether keys are emitted: true inside documents, false inside
    /// arrays.
    keys: bool,
    count: usize,

    /// Error from a nested traversal, carried out through the hook's
    /// `ControlFlow` return.
    failure: Option<Error>,
}

impl JsonEmitter {
    /// Appends `bytes` as JSON string contents, escaping quotes,
    /// backslashes and control characters. Invalid UTF-8 degrades to
    /// replacement characters.
    fn push_escaped(&mut self, bytes: &[u8]) {
        for c in String::from_utf8_lossy(bytes).chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\u{8}' => self.out.push_str("\\b"),
                '\u{c}' => self.out.push_str("\\f"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                c if (c as u32) < 0x20 => {
                    // write! to a String cannot fail
                    write!(self.out, "\\u{:04x}", c as u32).unwrap();
                }
                c => self.out.push(c),
            }
        }
    }

    /// The reference renderer appends these fields verbatim, so this does
    /// too.
    fn push_raw(&mut self, bytes: &[u8]) {
        self.out.push_str(&String::from_utf8_lossy(bytes));
    }

    fn push_quoted_raw(&mut self, bytes: &[u8]) {
        self.out.push('"');
        self.push_raw(bytes);
        self.out.push('"');
    }

    /// Renders a nested document or array into `self.out`, saving and
    /// restoring the per-level state.
    fn nested(&mut self, doc: &Document, keys: bool) -> ControlFlow<()> {
        let (open, close) = if keys { ("{ ", " }") } else { ("[ ", " ]") };
        let saved_keys = self.keys;
        let saved_count = self.count;
        self.keys = keys;
        self.count = 0;
        self.out.push_str(open);
        let result = visit_all(&mut doc.elements(), self);
        self.keys = saved_keys;
        self.count = saved_count;
        match result {
            Ok(()) => {
                self.out.push_str(close);
                ControlFlow::Continue(())
            }
            Err(e) => {
                if self.failure.is_none() {
                    self.failure = Some(e);
                }
                ControlFlow::Break(())
            }
        }
    }
}

impl Visitor for JsonEmitter {
    fn visit_before(&mut self, element: &Element<'_>) -> ControlFlow<()> {
        if self.count > 0 {
            self.out.push_str(", ");
        }
        if self.keys {
            self.out.push('"');
            self.push_escaped(element.key_bytes());
            self.out.push_str("\" : ");
        }
        self.count += 1;
        ControlFlow::Continue(())
    }

    fn visit_double(&mut self, value: f64) -> ControlFlow<()> {
        write!(self.out, "{value:.6}").unwrap();
        ControlFlow::Continue(())
    }

    fn visit_utf8(&mut self, value: &[u8]) -> ControlFlow<()> {
        self.out.push('"');
        self.push_escaped(value);
        self.out.push('"');
        ControlFlow::Continue(())
    }

    fn visit_document(&mut self, value: &Document) -> ControlFlow<()> {
        self.nested(value, true)
    }

    fn visit_array(&mut self, value: &Array) -> ControlFlow<()> {
        self.nested(value.as_document(), false)
    }

    fn visit_binary(&mut self, subtype: BinarySubtype, bytes: &[u8]) -> ControlFlow<()> {
        let b64 = crate::base64::encode(bytes);
        write!(
            self.out,
            "{{ \"$type\" : \"{}\", \"$binary\" : \"{b64}\" }}",
            hex::encode([u8::from(subtype)])
        )
        .unwrap();
        ControlFlow::Continue(())
    }

    fn visit_undefined(&mut self) -> ControlFlow<()> {
        self.out.push_str("{ \"$undefined\" : true }");
        ControlFlow::Continue(())
    }

    fn visit_oid(&mut self, value: &ObjectId) -> ControlFlow<()> {
        write!(self.out, "{{ \"$oid\" : \"{}\" }}", value.to_hex()).unwrap();
        ControlFlow::Continue(())
    }

    fn visit_bool(&mut self, value: bool) -> ControlFlow<()> {
        self.out.push_str(if value { "true" } else { "false" });
        ControlFlow::Continue(())
    }

    fn visit_date_time(&mut self, millis: i64) -> ControlFlow<()> {
        write!(self.out, "{{ \"$date\" : {millis} }}").unwrap();
        ControlFlow::Continue(())
    }

    fn visit_null(&mut self) -> ControlFlow<()> {
        self.out.push_str("null");
        ControlFlow::Continue(())
    }

    fn visit_regex(&mut self, pattern: &[u8], options: &[u8]) -> ControlFlow<()> {
        self.out.push_str("{ \"$regex\" : ");
        self.push_quoted_raw(pattern);
        self.out.push_str(", \"$options\" : ");
        self.push_quoted_raw(options);
        self.out.push_str(" }");
        ControlFlow::Continue(())
    }

    fn visit_dbpointer(&mut self, namespace: &[u8], id: &ObjectId) -> ControlFlow<()> {
        self.out.push_str("{ \"$ref\" : ");
        self.push_quoted_raw(namespace);
        write!(self.out, ", \"$id\" : \"{}\" }}", id.to_hex()).unwrap();
        ControlFlow::Continue(())
    }

    fn visit_code(&mut self, code: &[u8]) -> ControlFlow<()> {
        self.push_quoted_raw(code);
        ControlFlow::Continue(())
    }

    fn visit_symbol(&mut self, value: &[u8]) -> ControlFlow<()> {
        self.push_quoted_raw(value);
        ControlFlow::Continue(())
    }

    fn visit_code_with_scope(&mut self, code: &[u8], _scope: &Document) -> ControlFlow<()> {
        self.push_quoted_raw(code);
        ControlFlow::Continue(())
    }

    fn visit_int32(&mut self, value: i32) -> ControlFlow<()> {
        write!(self.out, "{value}").unwrap();
        ControlFlow::Continue(())
    }

    fn visit_timestamp(&mut self, value: Timestamp) -> ControlFlow<()> {
        write!(
            self.out,
            "{{ \"$timestamp\" : {{ \"t\": {}, \"i\": {} }} }}",
            value.time, value.increment
        )
        .unwrap();
        ControlFlow::Continue(())
    }

    fn visit_int64(&mut self, value: i64) -> ControlFlow<()> {
        write!(self.out, "{value}").unwrap();
        ControlFlow::Continue(())
    }

    fn visit_max_key(&mut self) -> ControlFlow<()> {
        self.out.push_str("{ \"$maxKey\" : 1 }");
        ControlFlow::Continue(())
    }

    fn visit_min_key(&mut self) -> ControlFlow<()> {
        self.out.push_str("{ \"$minKey\" : 1 }");
        ControlFlow::Continue(())
    }
}
