// ═══════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════
mod contents_tests {
    use smol_str::SmolStr;
    use std::sync::Arc;

    use crate::binder::HostModel;
    use crate::contents::HostRecord;
    use crate::error::ColumnError;
    use crate::events::RecordingObserver;
    use crate::field_value::FieldValue;
    use crate::schema::{
        ColumnSpec, FieldDefinition, FieldSet, ValidationTrigger, ValueKind,
    };
    use crate::types::FastMap;

    /// User with one delegated string field in `user_attributes` (limit 100).
    fn string_model(observer: Arc<RecordingObserver>) -> Arc<HostModel> {
        let mut fs = FieldSet::new("user_attributes");
        fs.define(FieldDefinition::new("wants_email", ValueKind::Str))
            .unwrap();
        HostModel::builder("User")
            .member("name")
            .column(ColumnSpec::new(fs).with_byte_limit(100))
            .observer(observer)
            .build()
            .unwrap()
    }

    /// Same shape, but the field is an integer — validation-relevant.
    fn integer_model(observer: Arc<RecordingObserver>) -> Arc<HostModel> {
        let mut fs = FieldSet::new("user_attributes");
        fs.define(FieldDefinition::new("wants_email", ValueKind::Integer))
            .unwrap();
        HostModel::builder("User")
            .member("name")
            .column(ColumnSpec::new(fs).with_byte_limit(100))
            .observer(observer)
            .build()
            .unwrap()
    }

    /// A persisted row with id 1 and the given packed payload.
    fn stored_user(model: &Arc<HostModel>, raw: &[u8]) -> HostRecord {
        let mut attrs = FastMap::default();
        attrs.insert(SmolStr::new("name"), FieldValue::from("User 1"));
        let mut raws = FastMap::default();
        raws.insert(SmolStr::new("user_attributes"), raw.to_vec());
        HostRecord::from_stored(Arc::clone(model), SmolStr::new("1"), attrs, raws)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Delegation toggle
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_non_delegated_field_unreachable_from_host() {
        let mut fs = FieldSet::new("user_attributes");
        fs.define(FieldDefinition::new("wants_email", ValueKind::Str).without_delegation())
            .unwrap();
        fs.define(FieldDefinition::new("something_else", ValueKind::Str))
            .unwrap();
        let model = HostModel::builder("User")
            .column(ColumnSpec::new(fs))
            .build()
            .unwrap();
        let mut user = HostRecord::new(model);

        // host-level access fails with a "no such member" error
        assert!(matches!(
            user.get("wants_email"),
            Err(ColumnError::UnknownMember { .. })
        ));
        assert!(matches!(
            user.set("wants_email", "foo"),
            Err(ColumnError::UnknownMember { .. })
        ));

        // the column-level accessor always works
        user.column("user_attributes")
            .unwrap()
            .set("wants_email", "foo")
            .unwrap();
        assert_eq!(
            user.column("user_attributes").unwrap().get("wants_email").unwrap(),
            FieldValue::from("foo")
        );

        // a delegated sibling is visible both ways
        user.set("something_else", "bar").unwrap();
        assert_eq!(user.get("something_else").unwrap(), FieldValue::from("bar"));
        assert_eq!(
            user.column("user_attributes").unwrap().get("something_else").unwrap(),
            FieldValue::from("bar")
        );
    }

    #[test]
    fn test_delegated_writes_visible_through_column_accessor() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(observer);
        let mut user = HostRecord::new(model);

        user.column("user_attributes")
            .unwrap()
            .set("wants_email", "yes")
            .unwrap();
        assert_eq!(user.get("wants_email").unwrap(), FieldValue::from("yes"));
    }

    #[test]
    fn test_intrinsic_members_still_route() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(observer);
        let mut user = HostRecord::new(model);

        user.set("name", "User 1").unwrap();
        assert_eq!(user.get("name").unwrap(), FieldValue::from("User 1"));
        assert!(matches!(
            user.get("no_such_member"),
            Err(ColumnError::UnknownMember { .. })
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Decode laziness
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_touching_the_column_does_not_decode() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(Arc::clone(&observer));
        let mut user = stored_user(&model, br#"{"wants_email":"foo"}"#);

        let store = user.column("user_attributes").unwrap();
        assert!(!store.is_loaded());
        assert_eq!(observer.deserialize_count(), 0);
    }

    #[test]
    fn test_first_field_read_decodes_exactly_once() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(Arc::clone(&observer));
        let mut user = stored_user(&model, br#"{"wants_email":"foo"}"#);

        assert_eq!(user.get("wants_email").unwrap(), FieldValue::from("foo"));
        assert_eq!(observer.deserialize_count(), 1);

        // cache hit: no further decode
        assert_eq!(user.get("wants_email").unwrap(), FieldValue::from("foo"));
        assert_eq!(observer.deserialize_count(), 1);

        let events = observer.deserializations();
        assert_eq!(events[0].host.type_name, "User");
        assert_eq!(events[0].host.id.as_deref(), Some("1"));
        assert_eq!(events[0].column_name, "user_attributes");
        assert_eq!(events[0].raw_data, br#"{"wants_email":"foo"}"#.to_vec());
    }

    #[test]
    fn test_write_forces_decode_of_the_rest_of_the_payload() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(Arc::clone(&observer));
        let mut user = stored_user(&model, br#"{"wants_email":"foo"}"#);

        // one-field write still needs the whole mapping intact
        user.set("wants_email", "bar").unwrap();
        assert_eq!(observer.deserialize_count(), 1);
        assert!(user.column("user_attributes").unwrap().is_dirty());
    }

    #[test]
    fn test_new_record_never_decodes() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(Arc::clone(&observer));
        let mut user = HostRecord::new(model);

        let store = user.column("user_attributes").unwrap();
        assert!(store.is_loaded());
        assert_eq!(store.get("wants_email").unwrap(), FieldValue::Null);
        assert_eq!(observer.deserialize_count(), 0);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Validation-triggered decode
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_validations_skip_decode_without_coercion_rules() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(Arc::clone(&observer));
        let mut user = stored_user(&model, br#"{"wants_email":"foo"}"#);

        user.validate().unwrap();
        assert_eq!(observer.deserialize_count(), 0);
    }

    #[test]
    fn test_validations_decode_once_with_coercion_rules() {
        let observer = Arc::new(RecordingObserver::new());
        let model = integer_model(Arc::clone(&observer));
        let mut user = stored_user(&model, br#"{"wants_email":12345}"#);

        user.validate().unwrap();
        assert_eq!(observer.deserialize_count(), 1);

        user.validate().unwrap();
        assert_eq!(observer.deserialize_count(), 1);
    }

    #[test]
    fn test_validations_surface_bad_stored_values() {
        let observer = Arc::new(RecordingObserver::new());
        let model = integer_model(Arc::clone(&observer));
        let mut user = stored_user(&model, br#"{"wants_email":"not a number"}"#);

        assert!(matches!(
            user.validate(),
            Err(ColumnError::IncompatibleValue { .. })
        ));
    }

    #[test]
    fn test_validation_trigger_overrides() {
        let observer = Arc::new(RecordingObserver::new());
        let mut fs = FieldSet::new("user_attributes");
        fs.define(FieldDefinition::new("wants_email", ValueKind::Str))
            .unwrap();
        let model = HostModel::builder("User")
            .member("name")
            .column(ColumnSpec::new(fs).with_validation(ValidationTrigger::Always))
            .observer(observer.clone())
            .build()
            .unwrap();
        let mut user = stored_user(&model, br#"{"wants_email":"foo"}"#);

        user.validate().unwrap();
        assert_eq!(observer.deserialize_count(), 1);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Round-trip
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_roundtrip_through_to_text() {
        let observer = Arc::new(RecordingObserver::new());
        let mut fs = FieldSet::new("attrs");
        fs.define(FieldDefinition::new("s", ValueKind::Str)).unwrap();
        fs.define(FieldDefinition::new("n", ValueKind::Integer)).unwrap();
        let model = HostModel::builder("Thing")
            .column(ColumnSpec::new(fs))
            .observer(observer)
            .build()
            .unwrap();
        let mut thing = HostRecord::new(Arc::clone(&model));

        thing.set("s", "hello").unwrap();
        thing.set("n", 42i64).unwrap();
        let text = thing.column("attrs").unwrap().to_text().unwrap();

        let mut reloaded = HostRecord::new(model);
        reloaded
            .column("attrs")
            .unwrap()
            .load_from(text.into_bytes());
        assert_eq!(reloaded.get("s").unwrap(), FieldValue::from("hello"));
        assert_eq!(reloaded.get("n").unwrap(), FieldValue::from(42i64));
    }

    #[test]
    fn test_roundtrip_empty_mapping() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(observer);
        let mut user = HostRecord::new(Arc::clone(&model));

        let text = user.column("user_attributes").unwrap().to_text().unwrap();
        assert_eq!(text, "{}");

        let mut reloaded = HostRecord::new(model);
        reloaded
            .column("user_attributes")
            .unwrap()
            .load_from(text.into_bytes());
        assert!(reloaded.column("user_attributes").unwrap().is_empty().unwrap());
    }

    #[test]
    fn test_unknown_payload_keys_survive_reencode() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(observer);
        let mut user = stored_user(&model, br#"{"legacy_key":7,"wants_email":"foo"}"#);

        user.set("wants_email", "bar").unwrap();
        let text = user.column("user_attributes").unwrap().to_text().unwrap();
        assert_eq!(text, r#"{"legacy_key":7,"wants_email":"bar"}"#);
    }

    #[test]
    fn test_blank_payload_decodes_to_empty() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(observer);
        let mut user = stored_user(&model, b"   ");

        assert_eq!(user.get("wants_email").unwrap(), FieldValue::Null);
        let store = user.column("user_attributes").unwrap();
        assert_eq!(store.keys().unwrap(), Vec::<SmolStr>::new());
        assert_eq!(store.len().unwrap(), 0);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Serialize events and the encode cache
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_one_serialize_event_per_encode() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(Arc::clone(&observer));
        let mut user = HostRecord::new(model);

        user.set("wants_email", "foo").unwrap();
        assert_eq!(observer.serialize_count(), 0);

        user.column("user_attributes").unwrap().to_text().unwrap();
        assert_eq!(observer.serialize_count(), 1);

        let events = observer.serializations();
        assert_eq!(events[0].host.type_name, "User");
        assert_eq!(events[0].column_name, "user_attributes");
    }

    #[test]
    fn test_clean_store_returns_cached_payload_without_event() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(Arc::clone(&observer));
        let raw = br#"{"wants_email":"foo"}"#;
        let mut user = stored_user(&model, raw);

        let text = user.column("user_attributes").unwrap().to_text().unwrap();
        assert_eq!(text.as_bytes(), raw);
        assert_eq!(observer.serialize_count(), 0);
        assert_eq!(observer.deserialize_count(), 0);
    }

    #[test]
    fn test_dirty_store_reencodes_then_caches() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(Arc::clone(&observer));
        let mut user = stored_user(&model, br#"{"wants_email":"foo"}"#);

        user.set("wants_email", "bar").unwrap();
        let store = user.column("user_attributes").unwrap();
        let text = store.to_text().unwrap();
        assert_eq!(text, r#"{"wants_email":"bar"}"#);
        assert!(!store.is_dirty());
        assert_eq!(observer.serialize_count(), 1);

        // second save with no further mutation is a cache hit
        let again = user.column("user_attributes").unwrap().to_text().unwrap();
        assert_eq!(again, text);
        assert_eq!(observer.serialize_count(), 1);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Oversize rejection
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_oversize_payload_rejected_before_persistence() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(observer);
        let mut user = HostRecord::new(model);

        user.set("wants_email", "aaa".repeat(10_000)).unwrap();
        let err = user.column("user_attributes").unwrap().to_text().unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("user_attributes"));
        assert!(msg.contains("100"));
        assert!(msg.contains("aaa"));
        assert!(msg.len() < 1000);

        match err {
            ColumnError::PayloadTooLong(diag) => {
                assert_eq!(diag.limit, 100);
                assert!(diag.actual > 30_000 && diag.actual < 31_000);
                assert!(msg.contains(&diag.actual.to_string()));
                assert!(diag.encoded.len() > 30_000);
            }
            other => panic!("expected PayloadTooLong, got {other:?}"),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Malformed-payload diagnostics
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_unparseable_payload_diagnostics() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(observer);
        let mut user = stored_user(&model, b"---unparseable json---");

        let err = user.get("wants_email").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("User"));
        assert!(msg.contains("id 1"));
        assert!(msg.contains("---unparseable json---"));

        match err {
            ColumnError::UnparseablePayload(diag) => {
                assert_eq!(diag.raw, "---unparseable json---");
                assert!(!diag.parser_error.is_empty());
                assert!(msg.contains(&diag.parser_error));
            }
            other => panic!("expected UnparseablePayload, got {other:?}"),
        }
    }

    #[test]
    fn test_incorrectly_encoded_payload_diagnostics() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(observer);
        let mut user = stored_user(&model, b"abc\xC3\x28def");

        let err = user.get("wants_email").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("User"));
        assert!(msg.contains("position 3"));
        assert!(msg.contains("c3"));

        match err {
            ColumnError::IncorrectlyEncodedPayload(diag) => {
                assert_eq!(diag.first_bad_position, 3);
                assert_eq!(diag.invalid_sequences_hex(), ["c3"]);
                assert_eq!(diag.raw, b"abc\xC3\x28def".to_vec());

                let valid: Vec<String> = diag
                    .runs
                    .iter()
                    .filter(|r| r.valid)
                    .map(|r| r.as_text())
                    .collect();
                assert_eq!(valid, ["abc", "(def"]);
                let invalid: Vec<Vec<u8>> = diag
                    .runs
                    .iter()
                    .filter(|r| !r.valid)
                    .map(|r| r.bytes.clone())
                    .collect();
                assert_eq!(invalid, [vec![0xC3]]);
            }
            other => panic!("expected IncorrectlyEncodedPayload, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_errors_are_reported_not_repaired() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(Arc::clone(&observer));
        let mut user = stored_user(&model, b"---unparseable json---");

        assert!(user.get("wants_email").is_err());
        // the store stays undecoded: the error repeats, nothing self-heals
        assert!(user.get("wants_email").is_err());
        assert_eq!(observer.deserialize_count(), 0);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Field access details
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_unknown_field_rejected_at_the_store() {
        let observer = Arc::new(RecordingObserver::new());
        let model = string_model(observer);
        let mut user = HostRecord::new(model);

        let store = user.column("user_attributes").unwrap();
        assert!(matches!(
            store.get("no_such_field"),
            Err(ColumnError::UnknownField { .. })
        ));
        assert!(matches!(
            store.set("no_such_field", 1i64),
            Err(ColumnError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_null_policy_default_value() {
        let observer = Arc::new(RecordingObserver::new());
        let mut fs = FieldSet::new("attrs");
        fs.define(
            FieldDefinition::new("retries", ValueKind::Integer).default_to(3i64),
        )
        .unwrap();
        let model = HostModel::builder("Job")
            .column(ColumnSpec::new(fs))
            .observer(observer)
            .build()
            .unwrap();
        let mut job = HostRecord::new(model);

        assert_eq!(job.get("retries").unwrap(), FieldValue::from(3i64));
        job.set("retries", 0i64).unwrap();
        assert_eq!(job.get("retries").unwrap(), FieldValue::from(0i64));
    }

    #[test]
    fn test_integer_field_coerces_numeric_strings() {
        let observer = Arc::new(RecordingObserver::new());
        let model = integer_model(observer);
        let mut user = HostRecord::new(model);

        user.set("wants_email", "12345").unwrap();
        assert_eq!(user.get("wants_email").unwrap(), FieldValue::from(12345i64));
        assert!(matches!(
            user.set("wants_email", "not a number"),
            Err(ColumnError::IncompatibleValue { .. })
        ));
    }

    #[test]
    fn test_custom_coercion_rule() {
        let observer = Arc::new(RecordingObserver::new());
        let mut fs = FieldSet::new("attrs");
        fs.define(FieldDefinition::new(
            "level",
            ValueKind::Custom(Arc::new(|value| {
                if matches!(value.as_str(), Some("low") | Some("high")) {
                    Ok(value)
                } else {
                    Err("must be \"low\" or \"high\"".to_string())
                }
            })),
        ))
        .unwrap();
        let model = HostModel::builder("Alert")
            .column(ColumnSpec::new(fs))
            .observer(observer)
            .build()
            .unwrap();
        let mut alert = HostRecord::new(model);

        alert.set("level", "high").unwrap();
        assert_eq!(alert.get("level").unwrap(), FieldValue::from("high"));

        let err = alert.set("level", "medium").unwrap_err();
        assert!(err.to_string().contains("must be \"low\" or \"high\""));
    }
}
