use super::*;
use futures::stream;
use serde_json::json;

fn text_start(index: usize) -> ProviderEvent {
    ProviderEvent::BlockStart {
        index,
        kind: BlockKind::Text,
    }
}

fn tool_start(index: usize, id: &str, name: &str) -> ProviderEvent {
    ProviderEvent::BlockStart {
        index,
        kind: BlockKind::ToolCall {
            id: id.into(),
            name: name.into(),
            metadata: None,
        },
    }
}

fn text(index: usize, s: &str) -> ProviderEvent {
    ProviderEvent::TextDelta {
        index,
        text: s.into(),
    }
}

fn args(index: usize, fragment: &str) -> ProviderEvent {
    ProviderEvent::ArgsDelta {
        index: Some(index),
        fragment: fragment.into(),
    }
}

fn args_unindexed(fragment: &str) -> ProviderEvent {
    ProviderEvent::ArgsDelta {
        index: None,
        fragment: fragment.into(),
    }
}

fn stop(index: usize) -> ProviderEvent {
    ProviderEvent::BlockStop { index }
}

fn stop_reason(reason: StopReason) -> ProviderEvent {
    ProviderEvent::MessageDelta {
        stop_reason: Some(reason),
    }
}

/// Feeds every event through one decoder and collects the output.
fn run(events: Vec<ProviderEvent>) -> Result<Vec<StreamItem>, ProtocolViolation> {
    let mut decoder = Decoder::new();
    let mut out = Vec::new();
    for event in events {
        out.extend(decoder.push(event)?);
    }
    decoder.finish();
    Ok(out)
}

fn invocations(items: &[StreamItem]) -> Vec<&ToolInvocation> {
    items
        .iter()
        .filter_map(|item| match item {
            StreamItem::Invocation(inv) => Some(inv),
            StreamItem::Token(_) => None,
        })
        .collect()
}

#[test]
fn test_single_text_block() {
    let out = run(vec![text_start(0), text(0, "Hi"), stop(0)]).unwrap();
    assert_eq!(out, vec![StreamItem::Token("Hi".into())]);
}

#[test]
fn test_single_tool_call_assembled_from_fragments() {
    let out = run(vec![
        tool_start(0, "t1", "search"),
        args(0, r#"{"q":"#),
        args(0, r#""cats"}"#),
        stop(0),
    ])
    .unwrap();

    let calls = invocations(&out);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, "t1");
    assert_eq!(calls[0].name, "search");
    assert_eq!(json!(calls[0].args), json!({"q": "cats"}));
    assert!(!calls[0].is_resolved());
}

#[test]
fn test_args_equal_parse_of_concatenation_at_every_split() {
    let payload = r#"{"path":"src/main.rs","lines":[1,2,3],"nested":{"ok":true}}"#;
    let expected: Value = serde_json::from_str(payload).unwrap();
    for split in 0..=payload.len() {
        let (head, tail) = payload.split_at(split);
        let out = run(vec![
            tool_start(0, "t1", "read"),
            args(0, head),
            args(0, tail),
            stop(0),
        ])
        .unwrap();
        assert_eq!(json!(invocations(&out)[0].args), expected, "split at {}", split);
    }
}

#[test]
fn test_concurrent_calls_do_not_cross_contaminate() {
    let out = run(vec![
        text_start(0),
        text(0, "Checking both. "),
        stop(0),
        tool_start(1, "a", "search"),
        tool_start(2, "b", "fetch"),
        args(2, r#"{"url":"#),
        args(1, r#"{"q":"#),
        args(1, r#""dogs"}"#),
        args(2, r#""https://x.test"}"#),
        stop(2),
        stop(1),
    ])
    .unwrap();

    let calls = invocations(&out);
    assert_eq!(calls.len(), 2);
    // Emitted in closing order.
    assert_eq!(calls[0].id, "b");
    assert_eq!(json!(calls[0].args), json!({"url": "https://x.test"}));
    assert_eq!(calls[1].id, "a");
    assert_eq!(json!(calls[1].args), json!({"q": "dogs"}));
}

#[test]
fn test_text_and_calls_keep_emission_order() {
    let out = run(vec![
        text_start(0),
        text(0, "Let me "),
        text(0, "look."),
        stop(0),
        tool_start(1, "t1", "search"),
        args(1, "{}"),
        stop(1),
        text_start(2),
        text(2, "Done."),
        stop(2),
    ])
    .unwrap();

    assert_eq!(out.len(), 4);
    assert_eq!(out[0], StreamItem::Token("Let me ".into()));
    assert_eq!(out[1], StreamItem::Token("look.".into()));
    assert!(matches!(&out[2], StreamItem::Invocation(inv) if inv.id == "t1"));
    assert_eq!(out[3], StreamItem::Token("Done.".into()));
}

#[test]
fn test_fragments_never_leak_before_close() {
    let mut decoder = Decoder::new();
    assert!(decoder.push(tool_start(0, "t1", "search")).unwrap().is_empty());
    assert!(decoder.push(args(0, r#"{"q":"x"}"#)).unwrap().is_empty());
    assert_eq!(decoder.open_calls(), 1);
    let out = decoder.push(stop(0)).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(decoder.open_calls(), 0);
}

#[test]
fn test_malformed_json_yields_empty_args() {
    let out = run(vec![
        tool_start(0, "t1", "search"),
        args(0, r#"{"q": "cats""#),
        stop(0),
    ])
    .unwrap();
    assert!(invocations(&out)[0].args.is_empty());
}

#[test]
fn test_non_object_json_yields_empty_args() {
    let out = run(vec![tool_start(0, "t1", "search"), args(0, "[1, 2]"), stop(0)]).unwrap();
    assert!(invocations(&out)[0].args.is_empty());
}

#[test]
fn test_no_fragments_yields_empty_args() {
    let out = run(vec![tool_start(0, "t1", "list"), stop(0)]).unwrap();
    let calls = invocations(&out);
    assert_eq!(calls[0].name, "list");
    assert!(calls[0].args.is_empty());
}

#[test]
fn test_unindexed_delta_goes_to_sole_open_call() {
    let out = run(vec![
        tool_start(4, "t1", "search"),
        args_unindexed(r#"{"q":"#),
        args_unindexed(r#""owls"}"#),
        stop(4),
    ])
    .unwrap();
    assert_eq!(json!(invocations(&out)[0].args), json!({"q": "owls"}));
}

#[test]
fn test_unindexed_delta_goes_to_most_recent_call() {
    let out = run(vec![
        tool_start(1, "a", "first"),
        args(1, r#"{"n":1}"#),
        tool_start(2, "b", "second"),
        args_unindexed(r#"{"n":2}"#),
        stop(1),
        stop(2),
    ])
    .unwrap();
    let calls = invocations(&out);
    assert_eq!(json!(calls[0].args), json!({"n": 1}));
    assert_eq!(json!(calls[1].args), json!({"n": 2}));
}

#[test]
fn test_delta_with_nothing_open_is_violation() {
    let err = run(vec![text_start(0), args(0, "{}")]).unwrap_err();
    assert_eq!(err, ProtocolViolation::UnresolvableDelta { index: Some(0) });
}

#[test]
fn test_delta_to_closed_block_is_violation() {
    let err = run(vec![
        tool_start(0, "a", "first"),
        stop(0),
        tool_start(1, "b", "second"),
        args(0, "{}"),
    ])
    .unwrap_err();
    assert_eq!(err, ProtocolViolation::DeltaAfterClose { index: 0 });
}

#[test]
fn test_tool_block_without_identity_is_violation() {
    let err = run(vec![tool_start(0, "", "search")]).unwrap_err();
    assert_eq!(err, ProtocolViolation::MissingCallIdentity { index: 0 });
    let err = run(vec![tool_start(3, "t1", "")]).unwrap_err();
    assert_eq!(err, ProtocolViolation::MissingCallIdentity { index: 3 });
}

#[test]
fn test_duplicate_call_id_is_violation() {
    let err = run(vec![
        tool_start(0, "t1", "search"),
        stop(0),
        tool_start(1, "t1", "search"),
    ])
    .unwrap_err();
    assert_eq!(err, ProtocolViolation::DuplicateCallId { id: "t1".into() });
}

#[test]
fn test_start_on_open_index_is_violation() {
    let err = run(vec![
        tool_start(0, "a", "first"),
        args(0, r#"{"q":"#),
        tool_start(0, "b", "second"),
        args(0, r#""x"}"#),
        stop(0),
    ])
    .unwrap_err();
    assert_eq!(err, ProtocolViolation::IndexReused { index: 0 });

    let err = run(vec![text_start(2), tool_start(2, "a", "first")]).unwrap_err();
    assert_eq!(err, ProtocolViolation::IndexReused { index: 2 });
}

#[test]
fn test_index_reusable_after_stop() {
    let out = run(vec![
        tool_start(0, "a", "first"),
        args(0, "{}"),
        stop(0),
        tool_start(0, "b", "second"),
        args(0, r#"{"n":2}"#),
        stop(0),
    ])
    .unwrap();
    let calls = invocations(&out);
    assert_eq!(calls.len(), 2);
    assert_eq!(json!(calls[1].args), json!({"n": 2}));
}

#[test]
fn test_tool_use_stop_flushes_unterminated_calls() {
    let out = run(vec![
        tool_start(0, "a", "first"),
        tool_start(1, "b", "second"),
        args(0, r#"{"x":1}"#),
        args(1, r#"{"y":2}"#),
        stop_reason(StopReason::ToolUse),
        stop(0),
    ])
    .unwrap();
    let calls = invocations(&out);
    let ids: Vec<_> = calls.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(json!(calls[1].args), json!({"y": 2}));
}

#[test]
fn test_other_stop_reasons_do_not_flush() {
    let out = run(vec![
        tool_start(0, "a", "first"),
        args(0, r#"{"x":"#),
        stop_reason(StopReason::MaxTokens),
    ])
    .unwrap();
    assert!(out.is_empty());
}

#[test]
fn test_ignored_block_kinds_produce_nothing() {
    let out = run(vec![
        ProviderEvent::BlockStart {
            index: 0,
            kind: BlockKind::Other("thinking".into()),
        },
        stop(0),
        text_start(1),
        text(1, ""),
        text(1, "ok"),
        stop(1),
    ])
    .unwrap();
    assert_eq!(out, vec![StreamItem::Token("ok".into())]);
}

#[test]
fn test_metadata_carried_through() {
    let mut metadata = Metadata::new();
    metadata.insert("thought_signature".into(), json!("c2ln"));
    let out = run(vec![
        ProviderEvent::BlockStart {
            index: 0,
            kind: BlockKind::ToolCall {
                id: "t1".into(),
                name: "search".into(),
                metadata: Some(metadata.clone()),
            },
        },
        stop(0),
    ])
    .unwrap();
    assert_eq!(invocations(&out)[0].metadata, Some(metadata));
}

#[test]
fn test_stop_reason_parse() {
    assert_eq!(StopReason::parse("tool_use"), StopReason::ToolUse);
    assert_eq!(StopReason::parse("end_turn"), StopReason::EndTurn);
    assert_eq!(
        StopReason::parse("refusal"),
        StopReason::Other("refusal".into())
    );
}

#[tokio::test]
async fn test_decode_stream() {
    let events = stream::iter(
        vec![
            text_start(0),
            text(0, "Hi"),
            stop(0),
            tool_start(1, "t1", "search"),
            args(1, r#"{"q":"cats"}"#),
            stop(1),
        ]
        .into_iter()
        .map(Ok),
    );
    let items: Vec<_> = decode(events).collect().await;
    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0], Ok(StreamItem::Token(t)) if t == "Hi"));
    assert!(matches!(&items[1], Ok(StreamItem::Invocation(inv)) if inv.args["q"] == "cats"));
}

#[tokio::test]
async fn test_decode_stops_at_protocol_violation() {
    let events = stream::iter(
        vec![
            text_start(0),
            text(0, "a"),
            args_unindexed("{}"),
            text(0, "never seen"),
        ]
        .into_iter()
        .map(Ok),
    );
    let items: Vec<_> = decode(events).collect().await;
    assert_eq!(items.len(), 2);
    assert!(matches!(
        &items[1],
        Err(TurnError::Protocol(ProtocolViolation::UnresolvableDelta { index: None }))
    ));
}

#[tokio::test]
async fn test_decode_surfaces_transport_error() {
    let events = stream::iter(vec![
        Ok(text_start(0)),
        Err(ProviderError::stream("connection reset")),
    ]);
    let items: Vec<_> = decode(events).collect().await;
    assert!(matches!(&items[0], Err(TurnError::Provider(e)) if e.message == "connection reset"));
}
