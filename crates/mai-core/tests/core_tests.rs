#[cfg(test)]
mod tests {
    use mai_core::*;

    // ── StreamId tests ─────────────────────────────────────────

    #[test]
    fn test_stream_id_display() {
        assert_eq!(StreamId::private(42).to_string(), "P-42");
        assert_eq!(StreamId::group(7).to_string(), "G-7");
    }

    #[test]
    fn test_stream_id_parse() {
        let id: StreamId = "P-42".parse().unwrap();
        assert_eq!(id, StreamId::Private(42));
        assert!(id.is_private());
        assert_eq!(id.target_id(), 42);

        let id: StreamId = "G-7".parse().unwrap();
        assert_eq!(id, StreamId::Group(7));
        assert!(!id.is_private());
    }

    #[test]
    fn test_stream_id_parse_rejects_garbage() {
        for raw in ["", "P", "P-", "X-1", "G-abc", "42"] {
            let err = raw.parse::<StreamId>().unwrap_err();
            assert!(
                matches!(err, MaiError::InvalidReference { .. }),
                "{raw} should be an invalid reference, got {err}"
            );
        }
    }

    #[test]
    fn test_stream_id_parse_rejects_non_canonical_spellings() {
        for raw in ["P-01", "P-+1", "G-007", "G- 7"] {
            let err = raw.parse::<StreamId>().unwrap_err();
            assert!(
                matches!(err, MaiError::InvalidReference { .. }),
                "{raw} should be rejected, got {err}"
            );
        }
        assert_eq!("P--3".parse::<StreamId>().unwrap(), StreamId::private(-3));
    }

    #[test]
    fn test_stream_id_serde_uses_text_form() {
        let json = serde_json::to_string(&StreamId::group(3)).unwrap();
        assert_eq!(json, "\"G-3\"");
        let restored: StreamId = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, StreamId::group(3));
        assert!(serde_json::from_str::<StreamId>("\"Q-3\"").is_err());
    }

    // ── FlowState tests ────────────────────────────────────────

    #[test]
    fn test_flow_state_ranks() {
        assert_eq!(FlowState::Dormant.rank(), 0);
        assert_eq!(FlowState::Engaged.rank(), 1);
        assert_eq!(FlowState::Focused.rank(), 2);
        assert_eq!(FlowState::from_rank(2), Some(FlowState::Focused));
        assert_eq!(FlowState::from_rank(3), None);
    }

    #[test]
    fn test_flow_state_is_at_least() {
        assert!(FlowState::Focused.is_at_least(FlowState::Engaged));
        assert!(FlowState::Engaged.is_at_least(FlowState::Engaged));
        assert!(!FlowState::Dormant.is_at_least(FlowState::Engaged));
        assert!(FlowState::Dormant.is_at_least(FlowState::Dormant));
    }

    #[test]
    fn test_flow_state_default_is_dormant() {
        assert_eq!(FlowState::default(), FlowState::Dormant);
    }

    #[test]
    fn test_flow_state_text_form() {
        for state in FlowState::ALL {
            let parsed: FlowState = state.as_str().parse().unwrap();
            assert_eq!(parsed, state);
        }
        assert!("asleep".parse::<FlowState>().is_err());
    }

    // ── StreamRecord tests ─────────────────────────────────────

    #[test]
    fn test_stream_record_defaults_to_dormant() {
        let record = StreamRecord {
            id: "P-1".into(),
            state: None,
            last_active_at: None,
        };
        assert_eq!(record.stream_id().unwrap(), StreamId::private(1));
        assert_eq!(record.flow_state().unwrap(), FlowState::Dormant);
        assert!(record.last_active().unwrap().is_none());
    }

    #[test]
    fn test_stream_record_rejects_bad_fields() {
        let record = StreamRecord {
            id: "G-2".into(),
            state: Some("sideways".into()),
            last_active_at: Some("yesterday".into()),
        };
        assert!(record.flow_state().is_err());
        assert!(record.last_active().is_err());
    }

    // ── Error tests ────────────────────────────────────────────

    #[test]
    fn test_error_display() {
        let err = MaiError::InvalidReference {
            stream: "P-9".into(),
            reason: "entity does not exist".into(),
        };
        let s = err.to_string();
        assert!(s.contains("P-9"));
        assert!(s.contains("entity does not exist"));
    }

    #[test]
    fn test_error_schema_version() {
        let err = MaiError::SchemaVersion {
            required: "0.1.0".into(),
            found: "0.2.0".into(),
        };
        assert!(err.to_string().contains("0.1.0"));
        assert!(err.to_string().contains("0.2.0"));
    }

    #[test]
    fn test_conversation_item_builder() {
        let item = ConversationItem::new(StreamId::private(1), 1, "hi").with_id(5);
        assert_eq!(item.id, 5);
        assert_eq!(item.content, "hi");
        assert_eq!(item.stream, StreamId::private(1));
    }
}
