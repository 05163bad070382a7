//! Document validation.
//!
//! Validation walks every element of every nested document, checking the
//! structure that [`crate::iter::Elements`] enforces plus whatever the
//! options enable. The first failure wins and carries the absolute byte
//! offset of the offending element within the document being validated.

use std::ops::ControlFlow;

use crate::{
    array::Array,
    document::Document,
    error::{Error, Result},
    iter::Element,
    visitor::{visit_all, Visitor},
};

/// What [`Document::validate`] should check beyond structure.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Require every key, string, symbol, code and regex component to be
    /// valid UTF-8.
    pub utf8: bool,

    /// With `utf8`, permit strings that contain an embedded NUL.
    pub utf8_allow_null: bool,

    /// Reject keys whose first byte is `'$'`.
    pub dollar_keys: bool,

    /// Reject keys containing `'.'`.
    pub dot_keys: bool,
}

impl ValidateOptions {
    pub fn new() -> ValidateOptions {
        ValidateOptions::default()
    }
}

pub(crate) fn validate(doc: &Document, options: ValidateOptions) -> Result<()> {
    let mut validator = Validator {
        options,
        base: 0,
        current: 0,
        value_offset: 0,
        failure: None,
    };
    match visit_all(&mut doc.elements(), &mut validator) {
        Ok(()) => match validator.failure {
            Some(e) => Err(e),
            None => Ok(()),
        },
        // structural corruption at the top level; the offset is already
        // relative to `doc`
        Err(e) => Err(e),
    }
}

fn utf8_valid(bytes: &[u8], allow_null: bool) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(_) => allow_null || !bytes.contains(&0),
        Err(_) => false,
    }
}

struct Validator {
    options: ValidateOptions,

    /// Offset of the document being walked within the document validation
    /// started from.
    base: usize,

    /// Offset of the element currently being visited, within the current
    /// document.
    current: usize,
    value_offset: usize,

    failure: Option<Error>,
}

impl Validator {
    fn fail(&mut self, e: Error) -> ControlFlow<()> {
        self.failure = Some(e.with_offset(self.base + self.current));
        ControlFlow::Break(())
    }

    fn check_text(&mut self, bytes: &[u8]) -> ControlFlow<()> {
        if self.options.utf8 && !utf8_valid(bytes, self.options.utf8_allow_null) {
            return self.fail(Error::utf8_encoding());
        }
        ControlFlow::Continue(())
    }

    fn recurse(&mut self, doc: &Document) -> ControlFlow<()> {
        let mut child = Validator {
            options: self.options,
            base: self.base + self.value_offset,
            current: 0,
            value_offset: 0,
            failure: None,
        };
        match visit_all(&mut doc.elements(), &mut child) {
            Ok(()) => match child.failure {
                Some(e) => {
                    // already absolute; carry it up as-is
                    self.failure = Some(e);
                    ControlFlow::Break(())
                }
                None => ControlFlow::Continue(()),
            },
            Err(e) => {
                let inner = e.offset.unwrap_or(0);
                self.failure = Some(e.with_offset(child.base + inner));
                ControlFlow::Break(())
            }
        }
    }
}

impl Visitor for Validator {
    fn visit_before(&mut self, element: &Element<'_>) -> ControlFlow<()> {
        self.current = element.offset();
        self.value_offset = element.value_offset();

        let key = element.key_bytes();
        if self.options.dollar_keys && key.first() == Some(&b'$') {
            return self.fail(Error::illegal_key(format!(
                "key {:?} starts with '$'",
                String::from_utf8_lossy(key)
            )));
        }
        if self.options.dot_keys && key.contains(&b'.') {
            return self.fail(Error::illegal_key(format!(
                "key {:?} contains '.'",
                String::from_utf8_lossy(key)
            )));
        }
        if self.options.utf8 && !utf8_valid(key, false) {
            return self.fail(Error::utf8_encoding());
        }
        ControlFlow::Continue(())
    }

    fn visit_utf8(&mut self, value: &[u8]) -> ControlFlow<()> {
        self.check_text(value)
    }

    fn visit_code(&mut self, code: &[u8]) -> ControlFlow<()> {
        self.check_text(code)
    }

    fn visit_symbol(&mut self, value: &[u8]) -> ControlFlow<()> {
        self.check_text(value)
    }

    fn visit_regex(&mut self, pattern: &[u8], options: &[u8]) -> ControlFlow<()> {
        if self.check_text(pattern).is_break() {
            return ControlFlow::Break(());
        }
        self.check_text(options)
    }

    fn visit_document(&mut self, value: &Document) -> ControlFlow<()> {
        self.recurse(value)
    }

    fn visit_array(&mut self, value: &Array) -> ControlFlow<()> {
        self.recurse(value.as_document())
    }

    fn visit_code_with_scope(&mut self, code: &[u8], scope: &Document) -> ControlFlow<()> {
        if self.check_text(code).is_break() {
            return ControlFlow::Break(());
        }
        // the scope document sits 8 bytes past the element value: the
        // outer and code length prefixes plus the code text itself
        let scope_base = self.value_offset + 8 + code.len() + 1;
        let saved = self.value_offset;
        self.value_offset = scope_base;
        let flow = self.recurse(scope);
        self.value_offset = saved;
        flow
    }
}
