use serde_json::json;

use super::*;

fn info_with_props(props: Value) -> NodeInfo {
    serde_json::from_value(json!({ "iden": "abc", "props": props })).expect("decode failed")
}

#[test]
fn reserved_props_are_exposed_through_accessors() {
    let info = info_with_props(json!({
        ".created": 1_577_836_800_000_i64,
        ".seen": [1_577_836_800_000_i64, "bogus", 1_577_923_200_000_i64],
        "name": "dropper",
        "type": "malware",
        "desc": "first stage",
        "leaker": "anon",
    }));

    assert_eq!(
        info.created().map(|t| t.to_string()).as_deref(),
        Some("2020-01-01T00:00:00+00:00")
    );
    assert_eq!(
        info.seen().iter().map(|t| t.as_millis()).collect::<Vec<_>>(),
        [1_577_836_800_000, 1_577_923_200_000]
    );
    assert_eq!(info.name(), Some("dropper"));
    assert_eq!(info.kind(), Some("malware"));
    assert_eq!(info.desc(), Some("first stage"));
    assert_eq!(info.leaker(), Some("anon"));
}

#[test]
fn absent_or_mistyped_reserved_props_read_as_none() {
    let info = info_with_props(json!({ ".created": "yesterday", "name": 7 }));

    assert_eq!(info.created(), None);
    assert!(info.seen().is_empty());
    assert_eq!(info.name(), None);
    assert_eq!(info.kind(), None);
}

#[test]
fn node_info_uses_wire_field_names() {
    let info = NodeInfo {
        iden: "abc".into(),
        tag_props: [("t:p".to_string(), json!("1"))].into_iter().collect(),
        node_data: [("d".to_string(), json!(true))].into_iter().collect(),
        ..NodeInfo::default()
    };

    let value = serde_json::to_value(&info).expect("encode failed");

    assert_eq!(value["tagprops"], json!({"t:p": "1"}));
    assert_eq!(value["nodedata"], json!({"d": true}));
}

#[test]
fn frames_encode_as_tagged_pairs() {
    let init = Frame::Init(InitFrame {
        tick: 3,
        ..InitFrame::default()
    });
    let fini = Frame::Fini(FiniFrame {
        count: 9,
        ..FiniFrame::default()
    });

    assert_eq!(init.to_wire()[0], json!("init"));
    assert_eq!(init.to_wire()[1]["tick"], json!(3));
    assert_eq!(fini.to_wire(), json!(["fini", {"tock": 0, "abstock": 0, "took": 0, "count": 9}]));
}

#[test]
fn node_wire_form_nests_pairs_and_info() {
    let node = NodeFrame {
        pairs: vec![("inet:fqdn".into(), "vertex.link".into())],
        info: NodeInfo {
            iden: "abc".into(),
            ..NodeInfo::default()
        },
    };

    let value = Frame::Node(node).to_wire();

    assert_eq!(value[0], json!("node"));
    assert_eq!(value[1][0], json!([["inet:fqdn", "vertex.link"]]));
    assert_eq!(value[1][1]["iden"], json!("abc"));
}

#[test]
fn partitioning_preserves_per_kind_order() {
    let frames = vec![
        Frame::Init(InitFrame {
            tick: 1,
            ..InitFrame::default()
        }),
        Frame::Node(NodeFrame::default()),
        Frame::Fini(FiniFrame {
            count: 5,
            ..FiniFrame::default()
        }),
        Frame::Init(InitFrame {
            tick: 2,
            ..InitFrame::default()
        }),
    ];

    let stream = DecodedStream::from_frames(frames);

    assert_eq!(stream.inits.iter().map(|i| i.tick).collect::<Vec<_>>(), [1, 2]);
    assert_eq!(stream.nodes.len(), 1);
    assert_eq!(stream.fini().map(|f| f.count), Some(5));
}

#[test]
fn result_count_falls_back_to_node_count() {
    let stream = DecodedStream::from_frames(vec![
        Frame::Node(NodeFrame::default()),
        Frame::Node(NodeFrame::default()),
    ]);

    assert_eq!(stream.result_count(), 2);
    assert!(stream.fini().is_none());
}
