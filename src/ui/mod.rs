use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::api::RenderedPart;
use crate::app::{App, Popup, ResponsePanel, Section};
use crate::history;
use crate::images::format_size;
use crate::theme::Theme;

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn draw(f: &mut Frame, app: &App) {
    let th = Theme::for_mode(app.theme_mode);
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(1), // Info line
            Constraint::Length(3), // API key field
            Constraint::Length(3), // Prompt field
            Constraint::Min(8),    // Images | Response
            Constraint::Length(7), // History (5 entries + border)
            Constraint::Length(1), // Footer
        ])
        .split(area);

    draw_info_line(f, app, &th, chunks[0]);
    draw_credential_field(f, app, &th, chunks[1]);
    draw_prompt_field(f, app, &th, chunks[2]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(chunks[3]);
    draw_images_box(f, app, &th, middle[0]);
    draw_response_panel(f, app, &th, middle[1]);

    draw_history_box(f, app, &th, chunks[4]);
    draw_footer(f, app, &th, chunks[5]);

    match app.popup {
        Popup::None => {}
        Popup::FileBrowser => draw_file_browser(f, app, &th),
        Popup::Help => draw_help_popup(f, &th),
    }
}

fn section_styles(app: &App, th: &Theme, section: Section) -> (Style, Style) {
    if app.section == section && app.popup == Popup::None {
        (
            Style::default().fg(th.accent),
            Style::default().fg(th.accent).add_modifier(Modifier::BOLD),
        )
    } else {
        (
            Style::default().fg(th.inactive),
            Style::default().fg(th.inactive),
        )
    }
}

fn draw_info_line(f: &mut Frame, app: &App, th: &Theme, area: Rect) {
    // Priority: busy spinner > status message > readiness
    let line = if app.busy {
        let frame = SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()];
        Line::from(vec![
            Span::styled(format!("{} ", frame), Style::default().fg(th.accent)),
            Span::styled("Generating...", Style::default().fg(th.warning)),
        ])
    } else if let Some(ref status) = app.status_message {
        Line::from(Span::styled(status, Style::default().fg(th.warning)))
    } else if app.ready() {
        Line::from(Span::styled("Ready", Style::default().fg(th.success)))
    } else {
        Line::from(Span::styled(
            "Set an API key, attach an image, write a prompt",
            Style::default().fg(th.text_dim),
        ))
    };

    let info = Paragraph::new(line).alignment(Alignment::Center);
    f.render_widget(info, area);
}

fn draw_credential_field(f: &mut Frame, app: &App, th: &Theme, area: Rect) {
    let focused = app.section == Section::Credential && app.popup == Popup::None;
    let (border, title) = section_styles(app, th, Section::Credential);

    // Masked unless focused, so a key never lingers on screen
    let display = if focused {
        format!("{}_", app.credential)
    } else {
        "•".repeat(app.credential.chars().count())
    };

    let field = Paragraph::new(display)
        .style(Style::default().fg(th.text))
        .block(
            Block::default()
                .title(Span::styled(" OpenRouter API Key ", title))
                .borders(Borders::ALL)
                .border_style(border),
        );
    f.render_widget(field, area);
}

fn draw_prompt_field(f: &mut Frame, app: &App, th: &Theme, area: Rect) {
    let focused = app.section == Section::Prompt && app.popup == Popup::None;
    let (border, title) = section_styles(app, th, Section::Prompt);

    let cursor = if focused { "_" } else { "" };
    let field = Paragraph::new(format!("{}{}", app.prompt, cursor))
        .style(Style::default().fg(th.text))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(Span::styled(" Prompt ", title))
                .borders(Borders::ALL)
                .border_style(border),
        );
    f.render_widget(field, area);
}

fn draw_images_box(f: &mut Frame, app: &App, th: &Theme, area: Rect) {
    let is_active = app.section == Section::Images && app.popup == Popup::None;
    let (border, title) = section_styles(app, th, Section::Images);

    let block = Block::default()
        .title(Span::styled(" Images ", title))
        .borders(Borders::ALL)
        .border_style(border);

    let rows: Vec<Row> = if app.images.is_empty() {
        vec![
            Row::new(vec![Span::styled(
                "  No images attached",
                Style::default().fg(th.text_dim),
            )]),
            Row::new(vec![Span::styled(
                "  Press 'i' to browse",
                Style::default().fg(th.accent),
            )]),
        ]
    } else {
        app.images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                let (icon, icon_color) = if image.payload.is_some() {
                    ("✓", th.success)
                } else {
                    ("…", th.text_dim)
                };

                let detail = match &image.preview {
                    Some(info) => {
                        let label = info.format.map(|f| f.label()).unwrap_or("?");
                        format!("{} {}", label, format_size(info.size_bytes))
                    }
                    None => "loading".to_string(),
                };

                let row_style = if i == app.selected_image && is_active {
                    Style::default().bg(th.bg_selected).fg(th.text)
                } else {
                    Style::default()
                };

                Row::new(vec![
                    Span::styled(icon, Style::default().fg(icon_color)),
                    Span::styled(image.name.clone(), Style::default().fg(th.text)),
                    Span::styled(detail, Style::default().fg(th.text_dim)),
                ])
                .style(row_style)
            })
            .collect()
    };

    let widths = vec![
        Constraint::Length(2),
        Constraint::Percentage(55),
        Constraint::Percentage(40),
    ];

    let header = Row::new(vec![
        Span::styled("", Style::default().fg(th.header)),
        Span::styled("File", Style::default().fg(th.header)),
        Span::styled("Info", Style::default().fg(th.header)),
    ]);

    let table = Table::new(rows, widths).header(header).block(block);
    f.render_widget(table, area);
}

fn draw_response_panel(f: &mut Frame, app: &App, th: &Theme, area: Rect) {
    let is_active = app.section == Section::Response && app.popup == Popup::None;
    let (border, title) = section_styles(app, th, Section::Response);

    let block = Block::default()
        .title(Span::styled(" Response ", title))
        .borders(Borders::ALL)
        .border_style(border);

    let lines: Vec<Line> = match &app.response {
        ResponsePanel::Placeholder => vec![Line::from(Span::styled(
            "Your response will appear here...",
            Style::default().fg(th.text_dim),
        ))],
        ResponsePanel::Error(message) => vec![Line::from(Span::styled(
            message.clone(),
            Style::default().fg(th.danger),
        ))],
        ResponsePanel::Parts(parts) => {
            let mut lines = Vec::new();
            let mut image_index = 0usize;
            for part in parts {
                match part {
                    RenderedPart::Text(text) => {
                        // Rendered literally; no markup interpretation
                        for text_line in text.lines() {
                            lines.push(Line::from(Span::styled(
                                text_line.to_string(),
                                Style::default().fg(th.text),
                            )));
                        }
                        lines.push(Line::from(""));
                    }
                    RenderedPart::Image { url, filename } => {
                        let selected = is_active && image_index == app.selected_response_image;
                        let row_style = if selected {
                            Style::default().bg(th.bg_selected)
                        } else {
                            Style::default()
                        };
                        lines.push(
                            Line::from(vec![
                                Span::styled("🖼 ", Style::default().fg(th.accent)),
                                Span::styled(filename.clone(), Style::default().fg(th.text)),
                                Span::styled("  [Enter] download", Style::default().fg(th.text_dim)),
                            ])
                            .style(row_style),
                        );
                        lines.push(Line::from(Span::styled(
                            format!("   {}", truncate_url(url, area.width.saturating_sub(5) as usize)),
                            Style::default().fg(th.text_dim),
                        )));
                        image_index += 1;
                    }
                }
            }
            lines
        }
    };

    let panel = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
    f.render_widget(panel, area);
}

fn truncate_url(url: &str, max: usize) -> String {
    if url.len() <= max {
        url.to_string()
    } else {
        let cut = max.saturating_sub(1).max(1);
        let prefix: String = url.chars().take(cut).collect();
        format!("{}…", prefix)
    }
}

fn draw_history_box(f: &mut Frame, app: &App, th: &Theme, area: Rect) {
    let is_active = app.section == Section::History && app.popup == Popup::None;
    let (border, title) = section_styles(app, th, Section::History);

    let block = Block::default()
        .title(Span::styled(" Recent Prompts ", title))
        .borders(Borders::ALL)
        .border_style(border);

    let now_ms = chrono::Utc::now().timestamp_millis();

    let rows: Vec<Row> = if app.history.is_empty() {
        vec![Row::new(vec![Span::styled(
            "  No prompts yet",
            Style::default().fg(th.text_dim),
        )])]
    } else {
        app.history
            .entries()
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let row_style = if i == app.selected_history && is_active {
                    Style::default().bg(th.bg_selected).fg(th.text)
                } else {
                    Style::default()
                };
                Row::new(vec![
                    Span::styled(entry.text.clone(), Style::default().fg(th.text)),
                    Span::styled(
                        history::relative_label(entry.timestamp, now_ms),
                        Style::default().fg(th.text_dim),
                    ),
                ])
                .style(row_style)
            })
            .collect()
    };

    let widths = vec![Constraint::Percentage(80), Constraint::Percentage(20)];
    let table = Table::new(rows, widths).block(block);
    f.render_widget(table, area);
}

fn draw_footer(f: &mut Frame, app: &App, th: &Theme, area: Rect) {
    let mut hints: Vec<(&str, &str)> = match app.section {
        Section::Credential | Section::Prompt => vec![("Tab", "Next"), ("Enter", "Go")],
        Section::Images => vec![("i", "Browse"), ("d", "Remove"), ("↑↓", "Nav"), ("Tab", "Next")],
        Section::Response => vec![("↑↓", "Nav"), ("Enter", "Download"), ("Tab", "Next")],
        Section::History => vec![("Enter", "Use prompt"), ("↑↓", "Nav"), ("Tab", "Next")],
    };
    hints.push(("^G", "Generate"));
    hints.push(("^T", "Theme"));

    let mut spans: Vec<Span> = hints
        .iter()
        .flat_map(|(key, action)| {
            vec![
                Span::styled(*key, Style::default().fg(th.accent)),
                Span::styled(format!(" {} │ ", action), Style::default().fg(th.text_dim)),
            ]
        })
        .collect();
    spans.push(Span::styled(
        app.theme_mode.glyph(),
        Style::default().fg(th.accent),
    ));

    let footer = Paragraph::new(Line::from(spans)).alignment(Alignment::Center);
    f.render_widget(footer, area);
}

fn draw_file_browser(f: &mut Frame, app: &App, th: &Theme) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 90 } else { 70 },
        if area.height < 30 { 85 } else { 70 },
        area,
    );

    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(Span::styled(
            " Select Images ",
            Style::default().fg(th.accent),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(th.accent));

    f.render_widget(block, popup_area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(5),
            Constraint::Length(2),
        ])
        .split(popup_area);

    let path_str = app.browser_path.to_string_lossy();
    let path_display = Paragraph::new(Line::from(vec![
        Span::styled("▸ ", Style::default().fg(th.accent)),
        Span::styled(path_str.as_ref(), Style::default().fg(th.text)),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(th.inactive)),
    );
    f.render_widget(path_display, inner[0]);

    let rows: Vec<Row> = if app.browser_entries.is_empty() {
        vec![Row::new(vec![Span::styled(
            "  No image files in this directory",
            Style::default().fg(th.text_dim),
        )])]
    } else {
        app.browser_entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let mark = app
                    .browser_marked
                    .iter()
                    .position(|p| p == &entry.path)
                    .map(|pos| format!("{}", pos + 1));

                let (icon, icon_color) = if entry.is_dir {
                    ("▸".to_string(), th.accent)
                } else if let Some(ref m) = mark {
                    (format!("●{}", m), th.success)
                } else {
                    ("·".to_string(), th.text_dim)
                };

                let row_style = if i == app.browser_selected {
                    Style::default().bg(th.bg_selected).fg(th.text)
                } else {
                    Style::default()
                };

                Row::new(vec![
                    Span::styled(format!("  {} ", icon), Style::default().fg(icon_color)),
                    Span::styled(entry.name.clone(), Style::default().fg(th.text)),
                ])
                .style(row_style)
            })
            .collect()
    };

    let widths = [Constraint::Length(6), Constraint::Percentage(90)];
    let table = Table::new(rows, widths);
    f.render_widget(table, inner[1]);

    let hint = Paragraph::new(Line::from(vec![
        Span::styled("j/k", Style::default().fg(th.accent)),
        Span::raw(" nav │ "),
        Span::styled("Space", Style::default().fg(th.accent)),
        Span::raw(" mark │ "),
        Span::styled("Enter", Style::default().fg(th.accent)),
        Span::raw(" attach │ "),
        Span::styled("Esc", Style::default().fg(th.accent)),
        Span::raw(" cancel"),
    ]))
    .alignment(Alignment::Center)
    .style(Style::default().fg(th.text_dim));
    f.render_widget(hint, inner[2]);
}

fn draw_help_popup(f: &mut Frame, th: &Theme) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 95 } else { 60 },
        if area.height < 30 { 90 } else { 70 },
        area,
    );

    f.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(Span::styled(
            "═══ Navigation ═══",
            Style::default().fg(th.header).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("  Tab       ", Style::default().fg(th.accent)),
            Span::raw("Cycle sections (Key → Prompt → Images → Response → History)"),
        ]),
        Line::from(vec![
            Span::styled("  ↑/↓ j/k   ", Style::default().fg(th.accent)),
            Span::raw("Move in lists"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "═══ Generating ═══",
            Style::default().fg(th.header).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("  i         ", Style::default().fg(th.accent)),
            Span::raw("Browse for images (Space marks several)"),
        ]),
        Line::from(vec![
            Span::styled("  d         ", Style::default().fg(th.accent)),
            Span::raw("Remove selected image"),
        ]),
        Line::from(vec![
            Span::styled("  Ctrl+G    ", Style::default().fg(th.accent)),
            Span::raw("Generate (needs key + image + prompt)"),
        ]),
        Line::from(vec![
            Span::styled("  Enter     ", Style::default().fg(th.accent)),
            Span::raw("In the prompt field: generate; on a response image: download"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "═══ Misc ═══",
            Style::default().fg(th.header).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("  Ctrl+T    ", Style::default().fg(th.accent)),
            Span::raw("Toggle light/dark theme"),
        ]),
        Line::from(vec![
            Span::styled("  Ctrl+C    ", Style::default().fg(th.accent)),
            Span::raw("Quit"),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", Style::default().fg(th.text_dim)),
            Span::styled("?", Style::default().fg(th.accent)),
            Span::styled("/", Style::default().fg(th.text_dim)),
            Span::styled("Esc", Style::default().fg(th.accent)),
            Span::styled(" to close", Style::default().fg(th.text_dim)),
        ]),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" gazou Help ", Style::default().fg(th.accent)))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(th.accent)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
