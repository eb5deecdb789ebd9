use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use langsam_core::view::DetailView;
use langsam_core::{Level, ViewMode};

use crate::app::{App, AppState};

use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let in_detail = app.in_detail();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                                   // Title bar
            Constraint::Min(6),                                      // Main content
            Constraint::Length(if in_detail { 3 } else { 0 }),       // Audio bar
            Constraint::Length(2),                                   // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    match app.session.view().mode() {
        ViewMode::Loading => render_loading(frame, chunks[1]),
        ViewMode::Error(message) => render_error(frame, message, chunks[1]),
        ViewMode::List => render_list(frame, app, chunks[1]),
        ViewMode::Detail(_) => {
            if let Some(detail) = app.session.view().detail() {
                render_detail(frame, app, detail, chunks[1]);
                render_audio_bar(frame, app, detail, chunks[2]);
            }
        }
    }
    render_status_bar(frame, app, chunks[3]);

    if matches!(app.state, AppState::ShowingHelp) {
        render_help_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Langsame Nachrichten";
    let date = app
        .session
        .view()
        .list()
        .map(|list| format!("  {}", list.date))
        .unwrap_or_default();

    let current = app.session.level();
    let mut pills = Vec::new();
    for (i, level) in Level::ALL.iter().enumerate() {
        if i > 0 {
            pills.push(Span::styled(" | ", styles::muted_style()));
        }
        pills.push(Span::styled(
            format!("[{}] {}", level, level.cefr()),
            styles::level_style(*level == current),
        ));
    }
    let pills_width: usize = pills.iter().map(|s| s.content.chars().count()).sum();
    let used = title.chars().count() + date.chars().count() + pills_width + 2;

    let mut spans = vec![
        Span::styled(title, styles::title_style()),
        Span::styled(date, styles::muted_style()),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
    ];
    spans.extend(pills);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_loading(frame: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled("Lade Nachrichten…", styles::muted_style())),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

fn render_error(frame: &mut Frame, message: &str, area: Rect) {
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            "Die Nachrichten konnten nicht geladen werden.",
            styles::error_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(message.to_string(), styles::muted_style())),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_list(frame: &mut Frame, app: &App, area: Rect) {
    let Some(list) = app.session.view().list() else {
        return;
    };

    let width = area.width.saturating_sub(6) as usize;
    let items: Vec<ListItem> = list
        .items
        .iter()
        .map(|item| {
            let duration = item.duration.clone().unwrap_or_default();
            let padding = width
                .saturating_sub(item.headline.chars().count())
                .saturating_sub(duration.chars().count());
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(
                        item.headline.clone(),
                        styles::list_item_style().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(" ".repeat(padding)),
                    Span::styled(duration, styles::highlight_style()),
                ]),
                Line::from(Span::styled(item.summary.clone(), styles::muted_style())),
                Line::from(""),
            ])
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .title(format!(" {} Nachrichten ", list.items.len()));
    let widget = List::new(items)
        .block(block)
        .highlight_style(styles::selected_style())
        .highlight_symbol("▶ ");

    let mut state = ListState::default().with_selected(Some(app.list_selection));
    frame.render_stateful_widget(widget, area, &mut state);
}

fn render_detail(frame: &mut Frame, app: &App, detail: &DetailView, area: Rect) {
    let view = app.session.view();
    let mut lines = vec![
        Line::from(Span::styled(detail.headline.clone(), styles::title_style())),
        Line::from(""),
    ];

    if view.show_german() {
        lines.push(Line::from(Span::styled("Deutsch", styles::highlight_style())));
        lines.extend(detail.text_de.lines().map(|l| Line::from(l.to_string())));
        lines.push(Line::from(""));
    }
    if view.show_english() {
        lines.push(Line::from(Span::styled("English", styles::highlight_style())));
        lines.extend(
            detail
                .text_en
                .lines()
                .map(|l| Line::from(Span::styled(l.to_string(), styles::muted_style()))),
        );
        lines.push(Line::from(""));
    }
    if let Some(source) = &detail.source_url {
        lines.push(Line::from(Span::styled(
            format!("Quelle: {}", source),
            styles::muted_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .title(format!(" Niveau {} ({}) ", detail.level, detail.level.cefr()));
    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_audio_bar(frame: &mut Frame, app: &App, detail: &DetailView, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    if !detail.has_audio {
        let paragraph = Paragraph::new(Span::styled(
            " Kein Audio für dieses Niveau",
            styles::muted_style(),
        ))
        .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let icon = if detail.is_playing { "⏸" } else { "▶" };
    let label = format!(
        "{} {} / {}   {}x",
        icon,
        detail.current_time_label(),
        detail.total_time_label(),
        app.session.speed()
    );
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(styles::progress_style(detail.is_playing))
        .ratio(detail.progress())
        .label(label);
    frame.render_widget(gauge, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let hint = if app.in_detail() {
        "[space] Play/Pause  [←/→] ±10s  [g/e] Text  [Esc] Zurück"
    } else {
        "[↑/↓] Auswahl  [Enter] Öffnen  [1-3] Niveau"
    };
    let left_text = match &app.status_message {
        Some(msg) => format!(" {} ", msg),
        None => format!(" {} ", hint),
    };
    let right_text = " [?] Hilfe | [q] Beenden ";

    let padding = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(
        Paragraph::new(status_line).style(styles::status_bar_style()),
        area,
    );
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 22, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");
    let key = |k: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", k), styles::help_key_style()),
            Span::styled(desc, styles::help_desc_style()),
        ])
    };

    let help_text = vec![
        Line::from(Span::styled("  Langsame Nachrichten", styles::title_style())),
        Line::from(Span::styled(
            format!("  version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        key("↑/↓ j/k", "Move through stories / scroll text"),
        key("Enter", "Open story"),
        key("Esc", "Back to the list"),
        key("1/2/3", "Difficulty level (A1/B1/C1)"),
        Line::from(""),
        Line::from(Span::styled(" Audio", styles::highlight_style())),
        key("Space", "Play / pause"),
        key("←/→", "Back / forward 10 seconds"),
        key("0", "Restart narration"),
        key("[ / ]", "Slower / faster"),
        Line::from(""),
        Line::from(Span::styled(" Text", styles::highlight_style())),
        key("g / e", "Show or hide German / English"),
        key("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());
    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
