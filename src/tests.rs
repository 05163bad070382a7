use crate::{
    cstr::cstr,
    error::ErrorKind,
    spec::{BinarySubtype, ElementType},
    validate::ValidateOptions,
    value::{Timestamp, ValueRef},
    ArrayBuf, Document, DocumentBuf, DocumentWriter, ObjectId,
};

fn oid() -> ObjectId {
    ObjectId::from_bytes([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12])
}

mod building {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document() {
        let doc = DocumentBuf::new();
        assert_eq!(doc.as_bytes(), &[5, 0, 0, 0, 0]);
        assert_eq!(doc.len(), 5);
        assert!(doc.is_empty());
        assert_eq!(doc.count_fields(), 0);
    }

    #[test]
    fn one_int32() {
        let mut doc = DocumentBuf::new();
        doc.append_int32(cstr!("a"), 1).unwrap();
        assert_eq!(
            doc.as_bytes(),
            &[0x0C, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0],
        );
        assert_eq!(doc.count_fields(), 1);
    }

    #[test]
    fn utf8_layout_counts_the_terminator() {
        let mut doc = DocumentBuf::new();
        doc.append_utf8(cstr!("hi"), "y'all").unwrap();
        assert_eq!(
            doc.as_bytes(),
            b"\x13\x00\x00\x00\x02hi\x00\x06\x00\x00\x00y'all\x00\x00",
        );
    }

    #[test]
    fn every_scalar_type_round_trips() {
        let mut doc = DocumentBuf::new();
        doc.append_double(cstr!("d"), 2.5).unwrap();
        doc.append_utf8(cstr!("s"), "text").unwrap();
        doc.append_binary(cstr!("bin"), BinarySubtype::Generic, &[1, 2, 3])
            .unwrap();
        doc.append_undefined(cstr!("u")).unwrap();
        doc.append_oid(cstr!("o"), &oid()).unwrap();
        doc.append_bool(cstr!("b"), true).unwrap();
        doc.append_datetime(cstr!("dt"), -473385600000).unwrap();
        doc.append_null(cstr!("n")).unwrap();
        doc.append_regex(cstr!("re"), cstr!("^a.*b$"), cstr!("i"))
            .unwrap();
        doc.append_dbpointer(cstr!("dbp"), "db.coll", &oid()).unwrap();
        doc.append_code(cstr!("c"), "function() {}").unwrap();
        doc.append_symbol(cstr!("sym"), "sigil").unwrap();
        doc.append_int32(cstr!("i32"), -7).unwrap();
        doc.append_timestamp(
            cstr!("ts"),
            Timestamp {
                time: 3542578,
                increment: 7,
            },
        )
        .unwrap();
        doc.append_int64(cstr!("i64"), i64::MIN).unwrap();
        doc.append_maxkey(cstr!("max")).unwrap();
        doc.append_minkey(cstr!("min")).unwrap();

        assert_eq!(doc.get_f64("d").unwrap(), 2.5);
        assert_eq!(doc.get_str("s").unwrap(), "text");
        let bin = doc.get_binary("bin").unwrap();
        assert_eq!(bin.subtype, BinarySubtype::Generic);
        assert_eq!(bin.bytes, &[1, 2, 3]);
        assert_eq!(doc.get_object_id("o").unwrap(), oid());
        assert!(doc.get_bool("b").unwrap());
        assert_eq!(doc.get_datetime("dt").unwrap(), -473385600000);
        let re = doc.get_regex("re").unwrap();
        assert_eq!(re.pattern, "^a.*b$");
        assert_eq!(re.options, "i");
        assert_eq!(doc.get_i32("i32").unwrap(), -7);
        let ts = doc.get_timestamp("ts").unwrap();
        assert_eq!(ts.time, 3542578);
        assert_eq!(ts.increment, 7);
        assert_eq!(doc.get_i64("i64").unwrap(), i64::MIN);
        assert_eq!(doc.count_fields(), 17);

        // the buffer must still parse end to end
        doc.validate(ValidateOptions::new()).unwrap();
    }

    #[test]
    fn timestamp_packs_seconds_into_the_high_half() {
        let mut doc = DocumentBuf::new();
        doc.append_timestamp(
            cstr!("ts"),
            Timestamp {
                time: 1,
                increment: 2,
            },
        )
        .unwrap();
        let element = doc.elements().next().unwrap().unwrap();
        assert_eq!(element.value_bytes(), &[2, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn from_bytes_round_trips() {
        let mut doc = DocumentBuf::new();
        doc.append_utf8(cstr!("k"), "v").unwrap();
        doc.append_int64(cstr!("n"), 42).unwrap();

        let copy = DocumentBuf::from_bytes(doc.as_bytes().to_vec()).unwrap();
        assert_eq!(copy, doc);
        assert_eq!(copy.into_vec(), doc.as_bytes());
    }

    #[test]
    fn from_bytes_rejects_bad_framing() {
        // too short
        assert!(DocumentBuf::from_bytes(vec![5, 0, 0]).is_err());
        // length prefix disagrees with the buffer
        assert!(DocumentBuf::from_bytes(vec![6, 0, 0, 0, 0]).is_err());
        // missing terminator
        assert!(DocumentBuf::from_bytes(vec![5, 0, 0, 0, 1]).is_err());
    }

    #[test]
    fn growth_past_the_inline_buffer_preserves_content() {
        let mut doc = DocumentBuf::new();
        for i in 0..40 {
            let key = crate::CString::try_from(format!("key{i}")).unwrap();
            doc.append_int32(key.as_ref(), i).unwrap();
        }
        assert!(doc.len() > crate::INLINE_CAPACITY);
        assert_eq!(doc.count_fields(), 40);
        assert_eq!(doc.get_i32("key0").unwrap(), 0);
        assert_eq!(doc.get_i32("key39").unwrap(), 39);
        doc.validate(ValidateOptions::new()).unwrap();
    }

    #[test]
    fn with_capacity_pre_grows() {
        let mut doc = DocumentBuf::with_capacity(4096).unwrap();
        doc.append_int32(cstr!("a"), 1).unwrap();
        assert_eq!(doc.get_i32("a").unwrap(), 1);
    }

    #[test]
    fn append_document_copies_whole_value() {
        let mut inner = DocumentBuf::new();
        inner.append_int32(cstr!("x"), 42).unwrap();

        let mut doc = DocumentBuf::new();
        doc.append_document(cstr!("sub"), &inner).unwrap();
        assert_eq!(doc.get_document("sub").unwrap().get_i32("x").unwrap(), 42);
    }

    #[test]
    fn code_with_empty_scope_degrades_to_code() {
        let mut doc = DocumentBuf::new();
        doc.append_code_with_scope(cstr!("c"), "run()", &DocumentBuf::new())
            .unwrap();
        let element = doc.elements().next().unwrap().unwrap();
        assert_eq!(element.element_type(), ElementType::JavaScriptCode);
    }

    #[test]
    fn code_with_scope_round_trips() {
        let mut scope = DocumentBuf::new();
        scope.append_int32(cstr!("x"), 1).unwrap();

        let mut doc = DocumentBuf::new();
        doc.append_code_with_scope(cstr!("c"), "run(x)", &scope)
            .unwrap();

        let value = doc.get("c").unwrap().unwrap();
        let cws = value.as_javascript_with_scope().unwrap();
        assert_eq!(cws.code, "run(x)");
        assert_eq!(cws.scope.get_i32("x").unwrap(), 1);
    }

    #[test]
    fn array_buf_generates_index_keys() {
        let mut array = ArrayBuf::new();
        array.push(ValueRef::Int32(10)).unwrap();
        array.push(ValueRef::String("two")).unwrap();
        assert_eq!(array.count(), 2);

        let keys: Vec<String> = array
            .as_array()
            .as_document()
            .iter()
            .map(|r| r.unwrap().0.to_string())
            .collect();
        assert_eq!(keys, ["0", "1"]);
        assert_eq!(array.as_array().get(0).unwrap().unwrap().as_i32(), Some(10));
    }
}

mod nesting {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_document_layout() {
        let mut doc = DocumentBuf::new();
        doc.begin_document(cstr!("sub")).unwrap();
        doc.append_int32(cstr!("x"), 42).unwrap();
        doc.end_document().unwrap();

        // root: prefix + (tag + "sub\0" + child) + terminator
        // child: prefix + (tag + "x\0" + int32) + terminator = 12
        assert_eq!(doc.len(), 22);
        assert_eq!(&doc.as_bytes()[..4], &[22, 0, 0, 0]);
        // the child's length prefix sits where its element value starts
        assert_eq!(&doc.as_bytes()[9..13], &[12, 0, 0, 0]);

        let element = doc.elements().next().unwrap().unwrap();
        assert_eq!(element.element_type(), ElementType::EmbeddedDocument);
        let sub = doc.get_document("sub").unwrap();
        assert_eq!(sub.get_i32("x").unwrap(), 42);
    }

    #[test]
    fn lengths_are_correct_between_appends() {
        let mut doc = DocumentBuf::new();
        doc.begin_document(cstr!("a")).unwrap();
        doc.begin_document(cstr!("b")).unwrap();

        // with two frames still open, the buffer must already parse
        let view = Document::from_bytes(doc.as_bytes()).unwrap();
        view.validate(ValidateOptions::new()).unwrap();

        doc.append_int32(cstr!("x"), 1).unwrap();
        let view = Document::from_bytes(doc.as_bytes()).unwrap();
        view.validate(ValidateOptions::new()).unwrap();
        assert_eq!(
            view.get_document("a")
                .unwrap()
                .get_document("b")
                .unwrap()
                .get_i32("x")
                .unwrap(),
            1,
        );

        doc.end_document().unwrap();
        doc.end_document().unwrap();
        assert_eq!(doc.open_frames(), 0);
    }

    #[test]
    fn appends_after_end_go_to_the_parent() {
        let mut doc = DocumentBuf::new();
        doc.begin_document(cstr!("sub")).unwrap();
        doc.append_int32(cstr!("inner"), 1).unwrap();
        doc.end_document().unwrap();
        doc.append_int32(cstr!("outer"), 2).unwrap();

        assert_eq!(doc.count_fields(), 2);
        assert_eq!(doc.get_document("sub").unwrap().count_fields(), 1);
        assert_eq!(doc.get_i32("outer").unwrap(), 2);
    }

    #[test]
    fn arrays_nest_like_documents() {
        let mut doc = DocumentBuf::new();
        doc.begin_array(cstr!("values")).unwrap();
        doc.append_int32(cstr!("0"), 1).unwrap();
        doc.append_utf8(cstr!("1"), "two").unwrap();
        doc.begin_document(cstr!("2")).unwrap();
        doc.append_bool(cstr!("deep"), true).unwrap();
        doc.end_document().unwrap();
        doc.end_array().unwrap();

        let array = doc.get_array("values").unwrap();
        assert_eq!(array.count(), 3);
        assert_eq!(array.get(1).unwrap().unwrap().as_str(), Some("two"));
        let third = array.get(2).unwrap().unwrap().as_document().unwrap();
        assert!(third.get_bool("deep").unwrap());
    }

    #[test]
    fn mismatched_end_calls_error() {
        let mut doc = DocumentBuf::new();
        assert!(matches!(
            doc.end_document().unwrap_err().kind,
            ErrorKind::InvalidState { .. },
        ));

        doc.begin_array(cstr!("a")).unwrap();
        assert!(matches!(
            doc.end_document().unwrap_err().kind,
            ErrorKind::InvalidState { .. },
        ));
        doc.end_array().unwrap();

        doc.begin_document(cstr!("d")).unwrap();
        assert!(doc.end_array().is_err());
        doc.end_document().unwrap();

        // the failed calls must not have disturbed the buffer
        doc.validate(ValidateOptions::new()).unwrap();
    }

    #[test]
    fn deep_nesting_keeps_every_ancestor_stamped() {
        let mut doc = DocumentBuf::new();
        for _ in 0..10 {
            doc.begin_document(cstr!("d")).unwrap();
        }
        doc.append_int32(cstr!("x"), 9).unwrap();
        for _ in 0..10 {
            doc.end_document().unwrap();
        }

        let mut view: &Document = &doc;
        for _ in 0..10 {
            view = view.get_document("d").unwrap();
        }
        assert_eq!(view.get_i32("x").unwrap(), 9);
        doc.validate(ValidateOptions::new()).unwrap();
    }
}

mod static_views {
    use super::*;

    #[test]
    fn from_bytes_checks_framing() {
        let data = [5u8, 0, 0, 0, 0];
        assert!(Document::from_bytes(&data[..3]).is_err());
        let doc = Document::from_bytes(&data).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn views_borrow_without_copying() {
        let mut buf = DocumentBuf::new();
        buf.append_utf8(cstr!("k"), "value").unwrap();
        let bytes = buf.as_bytes().to_vec();

        let doc = Document::from_bytes(&bytes).unwrap();
        let s = doc.get_str("k").unwrap();
        assert_eq!(s.as_ptr(), bytes[11..].as_ptr());
    }

    #[test]
    fn to_owned_round_trips() {
        let mut buf = DocumentBuf::new();
        buf.append_int32(cstr!("n"), 3).unwrap();
        let view: &Document = &buf;
        assert_eq!(view.to_owned(), buf);
    }
}

mod iteration {
    use super::*;

    #[test]
    fn yields_pairs_in_append_order() {
        let mut doc = DocumentBuf::new();
        doc.append_utf8(cstr!("apples"), "oranges").unwrap();
        doc.append_utf8(cstr!("peanut butter"), "chocolate").unwrap();
        doc.append_int32(cstr!("count"), 2).unwrap();

        let mut iter = doc.iter();
        let (key, value) = iter.next().unwrap().unwrap();
        assert_eq!(key, "apples");
        assert_eq!(value.as_str(), Some("oranges"));
        let (key, value) = iter.next().unwrap().unwrap();
        assert_eq!(key, "peanut butter");
        assert_eq!(value.as_str(), Some("chocolate"));
        let (key, value) = iter.next().unwrap().unwrap();
        assert_eq!(key, "count");
        assert_eq!(value.as_i32(), Some(2));
        assert!(iter.next().is_none());
    }

    #[test]
    fn oversized_string_length_is_corrupt() {
        let data: [u8; 12] = [12, 0, 0, 0, 0x02, b'a', 0, 99, 0, 0, 0, 0];
        let doc = Document::from_bytes(&data).unwrap();

        let mut elements = doc.elements();
        let err = elements.next().unwrap().unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(err.offset, Some(4));
        // the cursor is poisoned
        assert!(elements.next().is_none());
        assert_eq!(doc.count_fields(), 0);
    }

    #[test]
    fn unknown_type_tag_is_corrupt() {
        let data: [u8; 8] = [8, 0, 0, 0, 0x20, b'a', 0, 0];
        let doc = Document::from_bytes(&data).unwrap();
        let err = doc.elements().next().unwrap().unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(err.offset, Some(4));
    }

    #[test]
    fn unterminated_key_is_corrupt() {
        let data: [u8; 7] = [7, 0, 0, 0, 0x10, b'a', 0];
        let doc = Document::from_bytes(&data).unwrap();
        let err = doc.elements().next().unwrap().unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn iteration_restarts_from_a_fresh_cursor() {
        let mut doc = DocumentBuf::new();
        doc.append_int32(cstr!("a"), 1).unwrap();

        assert_eq!(doc.elements().count(), 1);
        assert_eq!(doc.elements().count(), 1);
    }

    #[test]
    fn strict_bool_decode_rejects_other_bytes() {
        let data: [u8; 9] = [9, 0, 0, 0, 0x08, b'b', 0, 7, 0];
        let doc = Document::from_bytes(&data).unwrap();
        // structurally fine
        let element = doc.elements().next().unwrap().unwrap();
        assert_eq!(element.element_type(), ElementType::Boolean);
        // but the typed decode is strict
        assert!(element.value().is_err());
    }

    #[test]
    fn invalid_utf8_is_not_structural_corruption() {
        let data: [u8; 14] = [14, 0, 0, 0, 0x02, b'k', 0, 2, 0, 0, 0, 0xFF, 0, 0];
        let doc = Document::from_bytes(&data).unwrap();

        // the structural walk sees one element
        assert_eq!(doc.count_fields(), 1);
        // the decoded walk reports the encoding error
        let err = doc.iter().next().unwrap().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Utf8Encoding));
    }

    #[test]
    fn old_binary_inner_length_is_checked() {
        let mut doc = DocumentBuf::new();
        doc.append_binary(cstr!("b"), BinarySubtype::BinaryOld, &[2, 0, 0, 0, b'h', b'i'])
            .unwrap();
        let bin = doc.get_binary("b").unwrap();
        assert_eq!(bin.bytes, b"hi");

        let mut doc = DocumentBuf::new();
        doc.append_binary(cstr!("b"), BinarySubtype::BinaryOld, &[9, 0, 0, 0, b'h', b'i'])
            .unwrap();
        assert!(doc.get_binary("b").is_err());
    }

    #[test]
    fn get_element_locates_without_decoding() {
        let mut doc = DocumentBuf::new();
        doc.append_int32(cstr!("a"), 1).unwrap();
        doc.append_utf8(cstr!("b"), "x").unwrap();

        let element = doc.get_element("b").unwrap().unwrap();
        assert_eq!(element.element_type(), ElementType::String);
        assert_eq!(element.offset(), 11);
        assert_eq!(element.key().unwrap(), "b");
        assert!(doc.get_element("zzz").unwrap().is_none());
    }

    #[test]
    fn getters_distinguish_missing_from_mistyped() {
        let mut doc = DocumentBuf::new();
        doc.append_int32(cstr!("n"), 1).unwrap();

        let err = doc.get_str("missing").unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::ValueAccess {
                kind: crate::ValueAccessErrorKind::NotPresent,
            },
        ));

        let err = doc.get_str("n").unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::ValueAccess {
                kind: crate::ValueAccessErrorKind::UnexpectedType { .. },
            },
        ));
        assert_eq!(err.key.as_deref(), Some("n"));
    }
}

mod visiting {
    use super::*;
    use crate::visitor::{visit_all, Visitor};
    use std::ops::ControlFlow;

    #[derive(Default)]
    struct Collector {
        keys: Vec<String>,
        ints: Vec<i32>,
        corrupt_at: Option<usize>,
    }

    impl Visitor for Collector {
        fn visit_before(&mut self, element: &crate::Element<'_>) -> ControlFlow<()> {
            self.keys.push(String::from_utf8_lossy(element.key_bytes()).into_owned());
            ControlFlow::Continue(())
        }

        fn visit_int32(&mut self, value: i32) -> ControlFlow<()> {
            self.ints.push(value);
            ControlFlow::Continue(())
        }

        fn visit_corrupt(&mut self, offset: usize) {
            self.corrupt_at = Some(offset);
        }
    }

    #[test]
    fn callbacks_fire_per_element() {
        let mut doc = DocumentBuf::new();
        doc.append_int32(cstr!("a"), 1).unwrap();
        doc.append_utf8(cstr!("b"), "two").unwrap();
        doc.append_int32(cstr!("c"), 3).unwrap();

        let mut collector = Collector::default();
        visit_all(&mut doc.elements(), &mut collector).unwrap();
        assert_eq!(collector.keys, ["a", "b", "c"]);
        assert_eq!(collector.ints, [1, 3]);
        assert_eq!(collector.corrupt_at, None);
    }

    #[test]
    fn breaking_from_before_halts_successfully() {
        struct StopAfterOne(usize);
        impl Visitor for StopAfterOne {
            fn visit_before(&mut self, _: &crate::Element<'_>) -> ControlFlow<()> {
                if self.0 == 0 {
                    ControlFlow::Break(())
                } else {
                    self.0 -= 1;
                    ControlFlow::Continue(())
                }
            }
        }

        let mut doc = DocumentBuf::new();
        doc.append_int32(cstr!("a"), 1).unwrap();
        doc.append_int32(cstr!("b"), 2).unwrap();

        visit_all(&mut doc.elements(), &mut StopAfterOne(1)).unwrap();
    }

    #[test]
    fn corrupt_hook_reports_the_offending_offset() {
        let data: [u8; 12] = [12, 0, 0, 0, 0x02, b'a', 0, 99, 0, 0, 0, 0];
        let doc = Document::from_bytes(&data).unwrap();

        let mut collector = Collector::default();
        let err = visit_all(&mut doc.elements(), &mut collector).unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(collector.corrupt_at, Some(4));
    }

    #[test]
    fn lenient_bool_dispatch_matches_raw_reads() {
        let data: [u8; 9] = [9, 0, 0, 0, 0x08, b'b', 0, 7, 0];
        let doc = Document::from_bytes(&data).unwrap();

        struct Bools(Vec<bool>);
        impl Visitor for Bools {
            fn visit_bool(&mut self, value: bool) -> ControlFlow<()> {
                self.0.push(value);
                ControlFlow::Continue(())
            }
        }
        let mut bools = Bools(Vec::new());
        visit_all(&mut doc.elements(), &mut bools).unwrap();
        assert_eq!(bools.0, [true]);
    }
}

mod validation {
    use super::*;

    #[test]
    fn default_flags_accept_dollar_and_dot_keys() {
        let mut doc = DocumentBuf::new();
        doc.append_int32(cstr!("$where"), 1).unwrap();
        doc.append_int32(cstr!("a.b"), 2).unwrap();
        doc.validate(ValidateOptions::new()).unwrap();
    }

    #[test]
    fn dollar_keys_flag_reports_the_element_offset() {
        let mut doc = DocumentBuf::new();
        doc.append_int32(cstr!("fine"), 0).unwrap();
        doc.append_int32(cstr!("$where"), 1).unwrap();

        let err = doc
            .validate(ValidateOptions {
                dollar_keys: true,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IllegalKey { .. }));
        // the second element starts after prefix + (tag + "fine\0" + i32)
        assert_eq!(err.offset, Some(14));
    }

    #[test]
    fn dot_keys_flag_rejects_dotted_keys() {
        let mut doc = DocumentBuf::new();
        doc.append_int32(cstr!("a.b"), 1).unwrap();
        let err = doc
            .validate(ValidateOptions {
                dot_keys: true,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IllegalKey { .. }));
        assert_eq!(err.offset, Some(4));
    }

    #[test]
    fn nested_failures_report_absolute_offsets() {
        let mut doc = DocumentBuf::new();
        doc.begin_document(cstr!("sub")).unwrap();
        doc.append_int32(cstr!("$bad"), 1).unwrap();
        doc.end_document().unwrap();

        let err = doc
            .validate(ValidateOptions {
                dollar_keys: true,
                ..Default::default()
            })
            .unwrap_err();
        // child content begins at 9 (after prefix, tag and "sub\0"); the
        // offending element is the child's first, at child offset 4
        assert_eq!(err.offset, Some(13));
    }

    #[test]
    fn utf8_flag_checks_string_values() {
        let data: [u8; 14] = [14, 0, 0, 0, 0x02, b'k', 0, 2, 0, 0, 0, 0xFF, 0, 0];
        let doc = Document::from_bytes(&data).unwrap();

        doc.validate(ValidateOptions::new()).unwrap();
        let err = doc
            .validate(ValidateOptions {
                utf8: true,
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.offset, Some(4));
    }

    #[test]
    fn utf8_allow_null_admits_embedded_nuls() {
        let mut doc = DocumentBuf::new();
        doc.append_utf8(cstr!("k"), "a\0b").unwrap();

        let strict = ValidateOptions {
            utf8: true,
            ..Default::default()
        };
        assert!(doc.validate(strict).is_err());

        let relaxed = ValidateOptions {
            utf8: true,
            utf8_allow_null: true,
            ..Default::default()
        };
        doc.validate(relaxed).unwrap();
    }

    #[test]
    fn structural_corruption_fails_validation() {
        let data: [u8; 12] = [12, 0, 0, 0, 0x02, b'a', 0, 99, 0, 0, 0, 0];
        let doc = Document::from_bytes(&data).unwrap();
        let err = doc.validate(ValidateOptions::new()).unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(err.offset, Some(4));
    }

    #[test]
    fn corruption_inside_a_sub_document_is_found() {
        // hand-build { "sub": <doc whose element overruns> }
        let inner: [u8; 12] = [12, 0, 0, 0, 0x02, b'a', 0, 99, 0, 0, 0, 0];
        let mut data = vec![0u8; 0];
        data.extend_from_slice(&[22, 0, 0, 0]);
        data.extend_from_slice(&[0x03, b's', b'u', b'b', 0]);
        data.extend_from_slice(&inner);
        data.push(0);
        let doc = Document::from_bytes(&data).unwrap();

        let err = doc.validate(ValidateOptions::new()).unwrap_err();
        // inner element offset 4, inner document based at 9
        assert_eq!(err.offset, Some(13));
    }
}

mod json {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_shortcut() {
        assert_eq!(DocumentBuf::new().to_json().unwrap(), "{}");
    }

    #[test]
    fn scalar_forms() {
        let mut doc = DocumentBuf::new();
        doc.append_int32(cstr!("a"), 1).unwrap();
        assert_eq!(doc.to_json().unwrap(), r#"{ "a" : 1 }"#);

        let mut doc = DocumentBuf::new();
        doc.append_double(cstr!("d"), 2.5).unwrap();
        assert_eq!(doc.to_json().unwrap(), r#"{ "d" : 2.500000 }"#);

        let mut doc = DocumentBuf::new();
        doc.append_utf8(cstr!("s"), "hi").unwrap();
        doc.append_bool(cstr!("t"), true).unwrap();
        doc.append_null(cstr!("n")).unwrap();
        doc.append_int64(cstr!("big"), -9).unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            r#"{ "s" : "hi", "t" : true, "n" : null, "big" : -9 }"#,
        );
    }

    #[test]
    fn wrapper_object_forms() {
        let mut doc = DocumentBuf::new();
        doc.append_oid(cstr!("o"), &oid()).unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            r#"{ "o" : { "$oid" : "0102030405060708090a0b0c" } }"#,
        );

        let mut doc = DocumentBuf::new();
        doc.append_binary(cstr!("b"), BinarySubtype::Md5, &[1, 2, 3])
            .unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            r#"{ "b" : { "$type" : "05", "$binary" : "AQID" } }"#,
        );

        let mut doc = DocumentBuf::new();
        doc.append_datetime(cstr!("when"), 1234).unwrap();
        doc.append_undefined(cstr!("u")).unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            r#"{ "when" : { "$date" : 1234 }, "u" : { "$undefined" : true } }"#,
        );

        let mut doc = DocumentBuf::new();
        doc.append_regex(cstr!("re"), cstr!("^a"), cstr!("i")).unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            r#"{ "re" : { "$regex" : "^a", "$options" : "i" } }"#,
        );

        let mut doc = DocumentBuf::new();
        doc.append_timestamp(
            cstr!("ts"),
            Timestamp {
                time: 3,
                increment: 4,
            },
        )
        .unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            r#"{ "ts" : { "$timestamp" : { "t": 3, "i": 4 } } }"#,
        );

        let mut doc = DocumentBuf::new();
        doc.append_dbpointer(cstr!("p"), "db.coll", &oid()).unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            r#"{ "p" : { "$ref" : "db.coll", "$id" : "0102030405060708090a0b0c" } }"#,
        );

        let mut doc = DocumentBuf::new();
        doc.append_minkey(cstr!("lo")).unwrap();
        doc.append_maxkey(cstr!("hi")).unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            r#"{ "lo" : { "$minKey" : 1 }, "hi" : { "$maxKey" : 1 } }"#,
        );
    }

    #[test]
    fn code_renders_as_a_bare_string_with_or_without_scope() {
        let mut scope = DocumentBuf::new();
        scope.append_int32(cstr!("x"), 1).unwrap();

        let mut doc = DocumentBuf::new();
        doc.append_code(cstr!("c"), "run()").unwrap();
        doc.append_code_with_scope(cstr!("cs"), "run(x)", &scope)
            .unwrap();
        doc.append_symbol(cstr!("sym"), "sigil").unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            r#"{ "c" : "run()", "cs" : "run(x)", "sym" : "sigil" }"#,
        );
    }

    #[test]
    fn nested_documents_and_arrays() {
        let mut doc = DocumentBuf::new();
        doc.begin_document(cstr!("sub")).unwrap();
        doc.append_int32(cstr!("x"), 42).unwrap();
        doc.end_document().unwrap();
        doc.begin_array(cstr!("arr")).unwrap();
        doc.append_int32(cstr!("0"), 1).unwrap();
        doc.append_utf8(cstr!("1"), "two").unwrap();
        doc.end_array().unwrap();

        assert_eq!(
            doc.to_json().unwrap(),
            r#"{ "sub" : { "x" : 42 }, "arr" : [ 1, "two" ] }"#,
        );
    }

    #[test]
    fn empty_nested_containers() {
        let mut doc = DocumentBuf::new();
        doc.begin_document(cstr!("d")).unwrap();
        doc.end_document().unwrap();
        doc.begin_array(cstr!("a")).unwrap();
        doc.end_array().unwrap();
        assert_eq!(doc.to_json().unwrap(), r#"{ "d" : {  }, "a" : [  ] }"#);
    }

    #[test]
    fn strings_are_escaped() {
        let mut doc = DocumentBuf::new();
        doc.append_utf8(cstr!("quote\"key"), "line\nbreak\t\"quoted\"")
            .unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            "{ \"quote\\\"key\" : \"line\\nbreak\\t\\\"quoted\\\"\" }",
        );
    }

    #[test]
    fn control_characters_use_unicode_escapes() {
        let mut doc = DocumentBuf::new();
        doc.append_utf8(cstr!("k"), "\u{1}").unwrap();
        assert_eq!(doc.to_json().unwrap(), r#"{ "k" : "\u0001" }"#);
    }

    #[test]
    fn corrupt_documents_do_not_render() {
        let data: [u8; 12] = [12, 0, 0, 0, 0x02, b'a', 0, 99, 0, 0, 0, 0];
        let doc = Document::from_bytes(&data).unwrap();
        assert!(doc.to_json().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn renderer_output_is_parseable_for_plain_types() {
        let mut doc = DocumentBuf::new();
        doc.append_utf8(cstr!("s"), "hi").unwrap();
        doc.append_int32(cstr!("i"), 3).unwrap();
        doc.begin_array(cstr!("a")).unwrap();
        doc.append_bool(cstr!("0"), false).unwrap();
        doc.end_array().unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(parsed["s"], "hi");
        assert_eq!(parsed["i"], 3);
        assert_eq!(parsed["a"][0], false);
    }
}

mod ordering {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn shorter_documents_sort_first() {
        let mut small = DocumentBuf::new();
        small.append_int32(cstr!("zz"), 9).unwrap();
        let mut large = DocumentBuf::new();
        large.append_utf8(cstr!("aa"), "a long string value").unwrap();

        assert!(small.len() < large.len());
        assert_eq!(small.compare(&large), Ordering::Less);
        assert_eq!(large.compare(&small), Ordering::Greater);
    }

    #[test]
    fn equal_lengths_fall_back_to_byte_order() {
        let mut a = DocumentBuf::new();
        a.append_int32(cstr!("k"), 1).unwrap();
        let mut b = DocumentBuf::new();
        b.append_int32(cstr!("k"), 2).unwrap();

        assert_eq!(a.len(), b.len());
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(a.compare(&a), Ordering::Equal);
    }

    #[test]
    fn equality_is_byte_equality() {
        let mut a = DocumentBuf::new();
        a.append_int32(cstr!("x"), 1).unwrap();
        a.append_int32(cstr!("y"), 2).unwrap();

        let mut b = DocumentBuf::new();
        b.append_int32(cstr!("y"), 2).unwrap();
        b.append_int32(cstr!("x"), 1).unwrap();

        // same fields, different order: not equal
        assert_ne!(a, b);
        assert_eq!(a, DocumentBuf::from_bytes(a.as_bytes().to_vec()).unwrap());
    }
}

mod writer {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn documents_pack_back_to_back() {
        let mut writer = DocumentWriter::new();

        let mut doc = writer.begin_document().unwrap();
        doc.append_int32(cstr!("seq"), 1).unwrap();
        doc.finish().unwrap();

        let mut doc = writer.begin_document().unwrap();
        doc.append_int32(cstr!("seq"), 2).unwrap();
        doc.append_utf8(cstr!("tag"), "second").unwrap();
        doc.finish().unwrap();

        let docs: Vec<_> = writer.documents().map(|d| d.unwrap()).collect();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].get_i32("seq").unwrap(), 1);
        assert_eq!(docs[1].get_i32("seq").unwrap(), 2);
        assert_eq!(docs[1].get_str("tag").unwrap(), "second");

        // windows are adjacent: total equals the sum of the parts
        let total: usize = docs.iter().map(|d| d.len()).sum();
        assert_eq!(writer.as_bytes().len(), total);
    }

    #[test]
    fn dropping_a_builder_abandons_the_document() {
        let mut writer = DocumentWriter::new();

        let mut doc = writer.begin_document().unwrap();
        doc.append_int32(cstr!("junk"), 1).unwrap();
        drop(doc);
        assert_eq!(writer.as_bytes().len(), 0);

        let mut doc = writer.begin_document().unwrap();
        doc.append_int32(cstr!("kept"), 2).unwrap();
        doc.finish().unwrap();

        let docs: Vec<_> = writer.documents().map(|d| d.unwrap()).collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_i32("kept").unwrap(), 2);
    }

    #[test]
    fn finish_rejects_open_frames() {
        let mut writer = DocumentWriter::new();
        let mut doc = writer.begin_document().unwrap();
        doc.begin_document(cstr!("open")).unwrap();
        let err = doc.finish().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidState { .. }));
    }

    #[test]
    fn nested_documents_work_in_writer_slots() {
        let mut writer = DocumentWriter::with_capacity(256);
        let mut doc = writer.begin_document().unwrap();
        doc.begin_document(cstr!("sub")).unwrap();
        doc.append_utf8(cstr!("deep"), "yes").unwrap();
        doc.end_document().unwrap();
        doc.finish().unwrap();

        let docs: Vec<_> = writer.documents().map(|d| d.unwrap()).collect();
        assert_eq!(
            docs[0].get_document("sub").unwrap().get_str("deep").unwrap(),
            "yes",
        );
    }

    #[test]
    fn into_vec_trims_scratch_space() {
        let mut writer = DocumentWriter::with_capacity(1024);
        let mut doc = writer.begin_document().unwrap();
        doc.append_int32(cstr!("a"), 1).unwrap();
        doc.finish().unwrap();

        let bytes = writer.into_vec();
        assert_eq!(bytes.len(), 12);
        Document::from_bytes(&bytes).unwrap();
    }
}

#[cfg(feature = "serde")]
mod serde_integration {
    use super::*;

    #[test]
    fn documents_serialize_as_maps() {
        let mut doc = DocumentBuf::new();
        doc.append_utf8(cstr!("name"), "ahab").unwrap();
        doc.append_int32(cstr!("voyages"), 4).unwrap();
        doc.begin_array(cstr!("ships")).unwrap();
        doc.append_utf8(cstr!("0"), "pequod").unwrap();
        doc.end_array().unwrap();

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "name": "ahab",
                "voyages": 4,
                "ships": ["pequod"],
            }),
        );
    }

    #[test]
    fn extended_types_serialize_as_wrapper_maps() {
        let mut doc = DocumentBuf::new();
        doc.append_oid(cstr!("id"), &oid()).unwrap();
        doc.append_datetime(cstr!("at"), 99).unwrap();

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": { "$oid": "0102030405060708090a0b0c" },
                "at": { "$date": 99 },
            }),
        );
    }
}

mod props {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Scalar {
        Double(f64),
        Text(String),
        Bool(bool),
        Int32(i32),
        Int64(i64),
        Null,
    }

    fn arbitrary_scalar() -> impl Strategy<Value = Scalar> {
        prop_oneof![
            any::<f64>().prop_map(Scalar::Double),
            any::<String>().prop_map(Scalar::Text),
            any::<bool>().prop_map(Scalar::Bool),
            any::<i32>().prop_map(Scalar::Int32),
            any::<i64>().prop_map(Scalar::Int64),
            Just(Scalar::Null),
        ]
    }

    fn arbitrary_fields() -> impl Strategy<Value = Vec<(String, Scalar)>> {
        prop::collection::vec(("[a-zA-Z][a-zA-Z0-9_]{0,11}", arbitrary_scalar()), 0..24)
    }

    fn append(doc: &mut DocumentBuf, key: &str, scalar: &Scalar) {
        let key = crate::CString::try_from(key).unwrap();
        let key = key.as_ref();
        match scalar {
            Scalar::Double(v) => doc.append_double(key, *v).unwrap(),
            Scalar::Text(v) => doc.append_utf8(key, v).unwrap(),
            Scalar::Bool(v) => doc.append_bool(key, *v).unwrap(),
            Scalar::Int32(v) => doc.append_int32(key, *v).unwrap(),
            Scalar::Int64(v) => doc.append_int64(key, *v).unwrap(),
            Scalar::Null => doc.append_null(key).unwrap(),
        }
    }

    fn assert_framing(doc: &DocumentBuf) {
        let bytes = doc.as_bytes();
        let prefix = i32::from_le_bytes(bytes[..4].try_into().unwrap());
        assert_eq!(prefix as usize, doc.len());
        assert_eq!(bytes[bytes.len() - 1], 0);
    }

    proptest! {
        #[test]
        fn framing_holds_after_every_append(fields in arbitrary_fields()) {
            let mut doc = DocumentBuf::new();
            for (key, scalar) in &fields {
                append(&mut doc, key, scalar);
                assert_framing(&doc);
            }
            prop_assert_eq!(doc.count_fields(), fields.len());
            doc.validate(ValidateOptions::new()).unwrap();
        }

        #[test]
        fn byte_round_trip_is_identity(fields in arbitrary_fields()) {
            let mut doc = DocumentBuf::new();
            for (key, scalar) in &fields {
                append(&mut doc, key, scalar);
            }
            let copy = DocumentBuf::from_bytes(doc.as_bytes().to_vec()).unwrap();
            prop_assert_eq!(copy, doc);
        }

        #[test]
        fn nested_framing_holds_under_frames(
            outer in arbitrary_fields(),
            inner in arbitrary_fields(),
        ) {
            let mut doc = DocumentBuf::new();
            for (key, scalar) in &outer {
                // prefix so no outer key can collide with "child"
                append(&mut doc, &format!("o_{key}"), scalar);
            }
            doc.begin_document(cstr!("child")).unwrap();
            for (key, scalar) in &inner {
                append(&mut doc, key, scalar);
                assert_framing(&doc);
                // the child's prefix must always match its window
                let view = Document::from_bytes(doc.as_bytes()).unwrap();
                view.get_document("child").unwrap();
            }
            doc.end_document().unwrap();

            prop_assert_eq!(doc.count_fields(), outer.len() + 1);
            prop_assert_eq!(
                doc.get_document("child").unwrap().count_fields(),
                inner.len(),
            );
            doc.validate(ValidateOptions::new()).unwrap();
        }
    }
}
