use ahamai_core::{CardFace, ChatRole, FlashcardDeck, ImageGrid, ImageSlot, Message, QuizWidget, Segment, Widget};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use crate::app::{App, FocusPane, InputMode, WidgetFocus};

const SIDEBAR_WIDTH: u16 = 30;
const QUEUE_PANEL_WIDTH: u16 = 34;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("**") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("**") else {
            break;
        };
        if close == 0 {
            // "****" is literal
            spans.push(Span::raw(rest[..open + 4].to_string()));
            rest = &after[2..];
            continue;
        }
        if open > 0 {
            spans.push(Span::raw(rest[..open].to_string()));
        }
        spans.push(Span::styled(
            after[..close].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after[close + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, input, footer
    let [header_area, body_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let sidebar_width = if app.show_history { SIDEBAR_WIDTH } else { 0 };
    let queue_width = if app.show_queue_panel { QUEUE_PANEL_WIDTH } else { 0 };
    let [history_area, chat_area, queue_area] = Layout::horizontal([
        Constraint::Length(sidebar_width),
        Constraint::Min(0),
        Constraint::Length(queue_width),
    ])
    .areas(body_area);

    if app.show_history {
        render_history(app, frame, history_area);
    }
    render_chat(app, frame, chat_area);
    if app.show_queue_panel {
        render_queue_panel(app, frame, queue_area);
    }

    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let chat_title = app
        .history
        .current()
        .map(|chat| chat.title.clone())
        .unwrap_or_default();

    let state = if app.is_generating() {
        Span::styled(" ● generating ", Style::default().fg(Color::Green))
    } else {
        Span::styled(" ○ idle ", Style::default().fg(Color::Gray))
    };

    let queued = app.queue.queued_len();
    let queue_indicator = if queued > 0 {
        format!("[{} queued] ", queued)
    } else {
        String::new()
    };

    let title = Line::from(vec![
        Span::styled(" AhamAI ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("· {} ", chat_title), Style::default().fg(Color::White)),
        state,
        Span::styled(queue_indicator, Style::default().fg(Color::Yellow)),
        Span::styled(
            if app.config.custom_instructions.is_some() { "[custom instructions] " } else { "" },
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let keys: &[(&str, &str)] = match (app.input_mode, app.show_history) {
        (InputMode::Editing, _) => &[(" Enter ", " send "), (" Esc ", " done ")],
        (InputMode::Renaming, _) => &[(" Enter ", " rename "), (" Esc ", " cancel ")],
        (InputMode::Normal, true) => &[
            (" j/k ", " nav "),
            (" Enter ", " open "),
            (" d ", " delete "),
            (" p ", " pin "),
            (" r ", " rename "),
            (" n ", " new "),
            (" Esc ", " close "),
        ],
        (InputMode::Normal, false) => match app.focused_widget() {
            Some(Widget::Quiz(_)) => &[
                (" 1-6 ", " answer "),
                (" h/l ", " question "),
                (" Tab ", " next widget "),
                (" Esc ", " unfocus "),
            ],
            Some(Widget::Flashcards(_)) => &[
                (" Space ", " flip "),
                (" h/l ", " card "),
                (" Tab ", " next widget "),
                (" Esc ", " unfocus "),
            ],
            Some(Widget::ImageGrid(_)) => &[(" Tab ", " next widget "), (" Esc ", " unfocus ")],
            None => &[
                (" i ", " type "),
                (" j/k ", " scroll "),
                (" Tab ", " widgets "),
                (" Q ", " queue "),
                (" x ", " unqueue "),
                (" H ", " history "),
                (" n ", " new "),
                (" q ", " quit "),
            ],
        },
    };

    let mode = match app.input_mode {
        InputMode::Normal => Span::styled(" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => Span::styled(" INPUT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        InputMode::Renaming => Span::styled(" RENAME ", Style::default().bg(Color::Magenta).fg(Color::White)),
    };

    let mut spans = vec![mode, Span::raw(" ")];
    for (key, label) in keys {
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::styled(*label, label_style));
    }
    if let Some(status) = &app.status {
        spans.push(Span::styled(format!("  {}", status), Style::default().fg(Color::Yellow)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_history(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::History;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let current = app.history.current_id();

    let items: Vec<ListItem> = app
        .history
        .list()
        .iter()
        .map(|chat| {
            let marker = if chat.pinned { "📌 " } else { "   " };
            let style = if Some(chat.id) == current {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::raw(marker),
                Span::styled(chat.title.clone(), style),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color))
                .title(" History "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.history_state);
}

fn render_queue_panel(app: &App, frame: &mut Frame, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    if let Some(current) = app.queue.current() {
        lines.push(Line::from(vec![
            Span::styled("▶ ", Style::default().fg(Color::Green)),
            Span::styled(current.query.clone(), Style::default().fg(Color::Green)),
        ]));
        lines.push(Line::default());
    }

    let items = &app.queue.panel().items;
    if items.is_empty() {
        lines.push(Line::from(Span::styled(
            "Nothing waiting",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    } else {
        for (position, (_, query)) in items.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled(format!("{}. ", position + 1), Style::default().fg(Color::Yellow)),
                Span::raw(query.clone()),
            ]));
        }
    }

    let panel = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta))
                .title(format!(" Queue ({}) ", items.len())),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(panel, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store area and inner size for mouse hit-testing and scroll calculations
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let border_color = if app.focus == FocusPane::Chat && !app.show_history {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");

    let messages = app.current_messages();
    let streaming = app.streaming_message();

    let lines: Vec<Line> = if messages.is_empty() && !app.is_generating() {
        vec![Line::from(Span::styled(
            "Ask for a quiz, some flashcards or an image...",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        let mut lines = Vec::new();
        for (index, message) in messages.iter().enumerate() {
            let focus = app.widget_focus.filter(|f| f.message == index);
            message_lines(message, focus, &mut lines);

            if streaming == Some(index) && message.raw_text().is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", app.thinking_dots()),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
            lines.push(Line::default());
        }
        lines
    };

    // Wrapped height, approximated by display width
    let wrap_width = app.chat_width.max(1) as usize;
    let total_lines: usize = lines
        .iter()
        .map(|line| line.width().div_ceil(wrap_width).max(1))
        .sum();
    let max_scroll = (total_lines as u16).saturating_sub(app.chat_height);
    app.chat_scroll = if app.follow_output {
        max_scroll
    } else {
        app.chat_scroll.min(max_scroll)
    };

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn message_lines(message: &Message, focus: Option<WidgetFocus>, lines: &mut Vec<Line<'static>>) {
    match message.role {
        ChatRole::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            for line in message.raw_text().lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        ChatRole::Assistant => {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            for segment in message.segments() {
                match segment {
                    Segment::Text(text) => {
                        let text = text.trim_matches('\n');
                        if !text.is_empty() {
                            lines.extend(text.lines().map(parse_markdown_line));
                        }
                    }
                    Segment::Widget { id, .. } => {
                        let item = focus.filter(|f| f.widget == *id).map(|f| f.item);
                        match message.widget(*id) {
                            Some(Widget::Quiz(quiz)) => quiz_lines(quiz, item, lines),
                            Some(Widget::Flashcards(deck)) => deck_lines(deck, item, lines),
                            Some(Widget::ImageGrid(grid)) => grid_lines(grid, item, lines),
                            None => {}
                        }
                    }
                }
            }
        }
    }
}

fn widget_header(title: String, focused: bool) -> Line<'static> {
    let style = if focused {
        Style::default().bg(Color::Magenta).fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
    };
    Line::from(Span::styled(format!("┌─ {} ", title), style))
}

fn widget_footer() -> Line<'static> {
    Line::from(Span::styled("└─", Style::default().fg(Color::Magenta)))
}

fn item_marker(item: Option<usize>, index: usize) -> Span<'static> {
    if item == Some(index) {
        Span::styled("│▸ ", Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD))
    } else {
        Span::styled("│  ", Style::default().fg(Color::Magenta))
    }
}

fn quiz_lines(quiz: &QuizWidget, item: Option<usize>, lines: &mut Vec<Line<'static>>) {
    let (correct, answered) = quiz.score();
    lines.push(widget_header(
        format!("Quiz · {}/{} correct", correct, answered),
        item.is_some(),
    ));

    for (q, question) in quiz.payload.questions.iter().enumerate() {
        lines.push(Line::from(vec![
            item_marker(item, q),
            Span::styled(
                format!("Q{}. {}", q + 1, question.question),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]));

        let selection = quiz.selection(q);
        for (o, option) in question.options.iter().enumerate() {
            let (mark, style) = match selection {
                None => ("  ", Style::default()),
                Some(_) if o == question.answer_index => ("✓ ", Style::default().fg(Color::Green)),
                Some(chosen) if chosen == o => ("✗ ", Style::default().fg(Color::Red)),
                Some(_) => ("  ", Style::default().fg(Color::DarkGray)),
            };
            lines.push(Line::from(vec![
                Span::styled("│    ", Style::default().fg(Color::Magenta)),
                Span::styled(format!("{}{}) {}", mark, o + 1, option), style),
            ]));
        }
    }
    lines.push(widget_footer());
}

fn deck_lines(deck: &FlashcardDeck, item: Option<usize>, lines: &mut Vec<Line<'static>>) {
    let count = deck.card_count();
    lines.push(widget_header(format!("Flashcards · {} cards", count), item.is_some()));

    for card in 0..count {
        let (label, style) = match deck.face(card) {
            Some(CardFace::Back) => ("back ", Style::default().fg(Color::Yellow)),
            _ => ("front", Style::default()),
        };
        lines.push(Line::from(vec![
            item_marker(item, card),
            Span::styled(
                format!("[{}/{} {}] ", card + 1, count, label),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(deck.visible_text(card).unwrap_or_default().to_string(), style),
        ]));
    }
    lines.push(widget_footer());
}

fn grid_lines(grid: &ImageGrid, item: Option<usize>, lines: &mut Vec<Line<'static>>) {
    lines.push(widget_header(
        format!("Images · {}", grid.directive.prompt),
        item.is_some(),
    ));

    let mut spans = vec![Span::styled("│  ", Style::default().fg(Color::Magenta))];
    for (i, slot) in grid.slots().iter().enumerate() {
        let (text, color) = match slot {
            ImageSlot::Pending => (format!("[{} loading…]", i + 1), Color::DarkGray),
            ImageSlot::Loaded => (format!("[{} ✓ image]", i + 1), Color::Green),
            ImageSlot::Failed => (format!("[{} ✗ failed]", i + 1), Color::Red),
        };
        let mut style = Style::default().fg(color);
        if item == Some(i) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        spans.push(Span::styled(text, style));
        spans.push(Span::raw(" "));
    }
    lines.push(Line::from(spans));
    lines.push(widget_footer());
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    // Highlight when focused or editing
    let typing = app.input_mode != InputMode::Normal;
    let border_color = if app.focus == FocusPane::Input || typing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let title = if app.input_mode == InputMode::Renaming {
        " Chat title (Enter to rename) "
    } else if app.is_generating() {
        " Message (Enter to queue) "
    } else {
        " Message (Enter to send) "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.query_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .query_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if typing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}
