use ahamai_core::{
    ImageSlot, Message, MessageRenderer, OpenBlockPolicy, RenderConfig, Segment, TagKind, Widget,
    WidgetId,
};
use pretty_assertions::assert_eq;

const DELIMITERS: [&str; 5] = [
    "[QUIZ_JSON]",
    "[/QUIZ_JSON]",
    "[FLASHCARDS_JSON]",
    "[/FLASHCARDS_JSON]",
    "[IMAGE:",
];

fn render(text: &str) -> Message {
    let mut message = Message::assistant();
    MessageRenderer::default().render(&mut message, text);
    message
}

fn assert_no_delimiters(message: &Message) {
    let shown = message.plain_text();
    for d in DELIMITERS {
        assert!(!shown.contains(d), "{d:?} leaked into {shown:?}");
    }
}

/// Every prefix of `text`, cut on char boundaries, in growing order
fn snapshots(text: &str) -> impl Iterator<Item = &str> {
    text.char_indices()
        .map(|(i, _)| &text[..i])
        .chain(std::iter::once(text))
}

#[test]
fn quiz_between_text_renders_three_segments() {
    let text = r#"intro [QUIZ_JSON]{"questions":[{"question":"2+2?","options":["3","4"],"answerIndex":1}]}[/QUIZ_JSON] outro"#;
    let message = render(text);

    assert_eq!(
        message.segments(),
        &[
            Segment::Text("intro ".to_string()),
            Segment::Widget {
                id: WidgetId(0),
                kind: TagKind::Quiz
            },
            Segment::Text(" outro".to_string()),
        ]
    );

    match message.widget(WidgetId(0)) {
        Some(Widget::Quiz(quiz)) => {
            assert_eq!(quiz.question_count(), 1);
            assert_eq!(quiz.payload.questions[0].options.len(), 2);
        }
        other => panic!("expected a quiz widget, got {other:?}"),
    }
}

#[test]
fn multiline_quiz_matches_payload_counts() {
    let text = r#"[QUIZ_JSON]
    {
      "questions": [
        { "question": "What is 2+2?", "options": ["3", "4", "5", "6"], "answerIndex": 1 },
        { "question": "Sky color?", "options": ["Blue", "Green"], "answerIndex": 0 }
      ]
    }
    [/QUIZ_JSON]"#;
    let message = render(text);

    let ids: Vec<_> = message.widget_ids().collect();
    assert_eq!(ids.len(), 1);
    match message.widget(ids[0]) {
        Some(Widget::Quiz(quiz)) => {
            let counts: Vec<_> = quiz.payload.questions.iter().map(|q| q.options.len()).collect();
            assert_eq!(counts, vec![4, 2]);
        }
        other => panic!("expected a quiz widget, got {other:?}"),
    }
    assert_no_delimiters(&message);
}

#[test]
fn malformed_quiz_falls_back_to_inner_text() {
    let inner = r#"{"questions":[{"question":"Q","options":["A"],"answerIndex":5}]}"#;
    let text = format!("Here is a quiz: [QUIZ_JSON]{inner}[/QUIZ_JSON]");
    let message = render(&text);

    assert_eq!(
        message.segments(),
        &[Segment::Text(format!("Here is a quiz: {inner}"))]
    );
    assert_eq!(message.widget_count(), 0);
}

#[test]
fn unknown_block_falls_back_to_inner_text() {
    let message = render("a [TABLE_JSON]{\"rows\":2}[/TABLE_JSON] b");
    assert_eq!(message.segments(), &[Segment::Text("a {\"rows\":2} b".to_string())]);
}

#[test]
fn fallback_text_strips_nested_delimiters() {
    let message = render("x [QUIZ_JSON]not json [IMAGE: a cat | n=2] [/QUIZ_JSON] y");
    assert_eq!(
        message.segments(),
        &[Segment::Text("x not json  a cat | n=2  y".to_string())]
    );
    assert_no_delimiters(&message);
    assert_eq!(message.widget_count(), 0);
}

#[test]
fn flushed_block_drops_foreign_closer() {
    let renderer = MessageRenderer::new(RenderConfig {
        open_block_policy: OpenBlockPolicy::FlushAsText,
        ..Default::default()
    });
    let mut message = Message::assistant();
    renderer.render(&mut message, "[QUIZ_JSON]{}[/FLASHCARDS_JSON] tail");
    assert!(message.segments().is_empty());

    renderer.finish(&mut message);
    assert_eq!(message.segments(), &[Segment::Text("{} tail".to_string())]);
    assert_no_delimiters(&message);
}

#[test]
fn image_directive_broken_by_newline_hides_opener() {
    let text = "pic [IMAGE: a cat\nthen more";
    let renderer = MessageRenderer::default();
    let mut message = Message::assistant();
    for snapshot in snapshots(text) {
        renderer.render(&mut message, snapshot);
        assert_no_delimiters(&message);
    }
    renderer.finish(&mut message);

    assert_eq!(
        message.segments(),
        &[Segment::Text("pic  a cat\nthen more".to_string())]
    );
}

#[test]
fn removed_block_drops_its_widget() {
    let quiz = r#"[QUIZ_JSON]{"questions":[{"question":"2+2?","options":["3","4"],"answerIndex":1}]}[/QUIZ_JSON]"#;
    let renderer = MessageRenderer::default();
    let mut message = Message::assistant();

    assert_eq!(renderer.render(&mut message, quiz), vec![WidgetId(0)]);
    assert_eq!(message.widget_count(), 1);

    renderer.render(&mut message, "rewritten without a quiz");
    assert_eq!(message.widget_count(), 0);
    assert!(message.widget(WidgetId(0)).is_none());

    // A block that comes back is a new widget; ids are not reused
    assert_eq!(renderer.render(&mut message, quiz), vec![WidgetId(1)]);
    assert_eq!(message.widget_count(), 1);
}

#[test]
fn open_block_never_leaks_while_streaming() {
    let text = concat!(
        "Try this [FLASHCARDS_JSON]{\"cards\":[{\"front\":\"F\",\"back\":\"B\"}]}",
        "[/FLASHCARDS_JSON] and [IMAGE: a red fox | n=3] done"
    );
    let renderer = MessageRenderer::default();
    let mut message = Message::assistant();

    for snapshot in snapshots(text) {
        renderer.render(&mut message, snapshot);
        assert_no_delimiters(&message);

        let has_deck_close = snapshot.contains("[/FLASHCARDS_JSON]");
        let widgets = message.widget_ids().count();
        if !has_deck_close {
            assert_eq!(widgets, 0, "widget before close in {snapshot:?}");
        }
    }

    assert_eq!(message.plain_text(), "Try this  and  done");
    let kinds: Vec<_> = message
        .segments()
        .iter()
        .filter_map(|s| match s {
            Segment::Widget { kind, .. } => Some(kind.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![TagKind::Flashcards, TagKind::Image]);
}

#[test]
fn interaction_state_survives_growing_snapshots() {
    let quiz = r#"[QUIZ_JSON]{"questions":[{"question":"2+2?","options":["3","4"],"answerIndex":1}]}[/QUIZ_JSON]"#;
    let deck = r#"[FLASHCARDS_JSON]{"cards":[{"front":"F1","back":"B1"},{"front":"F2","back":"B2"}]}[/FLASHCARDS_JSON]"#;
    let text = format!("{quiz}\nthen cards: {deck}\nthat is all");

    let renderer = MessageRenderer::default();
    let mut message = Message::assistant();

    let quiz_end = text.find("[/QUIZ_JSON]").unwrap() + "[/QUIZ_JSON]".len();
    renderer.render(&mut message, &text[..quiz_end]);
    let quiz_id = message.widget_ids().next().unwrap();
    assert_eq!(message.select_option(quiz_id, 0, 1), Some(true));

    let mut deck_id = None;
    for snapshot in snapshots(&text).filter(|s| s.len() > quiz_end) {
        let fresh = renderer.render(&mut message, snapshot);
        assert!(!fresh.contains(&quiz_id));

        if deck_id.is_none() && !fresh.is_empty() {
            deck_id = Some(fresh[0]);
            message.flip(fresh[0], 1);
        }
    }

    let deck_id = deck_id.expect("deck materialized");
    renderer.render(&mut message, &text);
    renderer.finish(&mut message);

    match message.widget(quiz_id) {
        Some(Widget::Quiz(q)) => assert_eq!(q.selection(0), Some(1)),
        other => panic!("expected quiz, got {other:?}"),
    }
    match message.widget(deck_id) {
        Some(Widget::Flashcards(d)) => {
            assert_eq!(d.visible_text(0), Some("F1"));
            assert_eq!(d.visible_text(1), Some("B2"));
        }
        other => panic!("expected deck, got {other:?}"),
    }
    assert_eq!(message.widget_count(), 2);
}

#[test]
fn image_directive_slots_settle_independently() {
    let renderer = MessageRenderer::default();
    let mut message = Message::assistant();
    let fresh = renderer.render(&mut message, "[IMAGE: a cat | n=2]");

    assert_eq!(fresh.len(), 1);
    let id = fresh[0];
    assert_eq!(message.segments().len(), 1);

    match message.widget(id) {
        Some(Widget::ImageGrid(grid)) => {
            assert_eq!(grid.directive.prompt, "a cat");
            assert_eq!(grid.slots(), &[ImageSlot::Pending, ImageSlot::Pending]);
        }
        other => panic!("expected image grid, got {other:?}"),
    }

    assert!(message.report_load_result(id, 0, false));
    assert!(message.report_load_result(id, 1, true));

    match message.widget(id) {
        Some(Widget::ImageGrid(grid)) => {
            assert_eq!(grid.slots(), &[ImageSlot::Failed, ImageSlot::Loaded]);
        }
        other => panic!("expected image grid, got {other:?}"),
    }
}

#[test]
fn bad_image_count_renders_directive_text() {
    let message = render("pic: [IMAGE: a cat | n=0]");
    assert_eq!(message.segments(), &[Segment::Text("pic:  a cat | n=0".to_string())]);
}

#[test]
fn interactions_do_not_touch_siblings() {
    let text = concat!(
        "[FLASHCARDS_JSON]{\"cards\":[{\"front\":\"a\",\"back\":\"b\"}]}[/FLASHCARDS_JSON]",
        "[FLASHCARDS_JSON]{\"cards\":[{\"front\":\"a\",\"back\":\"b\"}]}[/FLASHCARDS_JSON]"
    );
    let mut message = render(text);
    let ids: Vec<_> = message.widget_ids().collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);

    message.flip(ids[0], 0);
    let faces: Vec<_> = ids
        .iter()
        .map(|id| match message.widget(*id) {
            Some(Widget::Flashcards(d)) => d.visible_text(0).map(str::to_string),
            _ => None,
        })
        .collect();
    assert_eq!(faces, vec![Some("b".to_string()), Some("a".to_string())]);

    assert_eq!(message.select_option(ids[0], 0, 0), None);
}
