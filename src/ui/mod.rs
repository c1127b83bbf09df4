use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use time::{macros::format_description, OffsetDateTime};
use unicode_width::UnicodeWidthStr;

use crate::app::state::{AppState, FocusPane, OverlayState};
use crate::app::Workspace;
use crate::journaling::SaveStatus;
use crate::outline::OutlineSession;

const INDENT_WIDTH: usize = 2;
const GUTTER: &str = "  ";

pub fn draw_app(frame: &mut Frame, state: &AppState, list_state: &mut ListState, workspace: &Workspace) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(frame.size());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(vertical[0]);

    let list_block_style = if matches!(state.focus, FocusPane::Files) {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let open_id = workspace.file_id();
    let unsaved = matches!(
        workspace.save_status(),
        Some(SaveStatus::Idle | SaveStatus::Failed)
    );
    let mut items = Vec::with_capacity(state.files.len());
    for file in &state.files {
        let mut title_spans = Vec::new();
        if open_id == Some(file.id) {
            let label = if unsaved { "✎* " } else { "✎ " };
            title_spans.push(Span::styled(
                label,
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        title_spans.push(Span::styled(
            file.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        let mut lines = vec![
            Line::from(title_spans),
            Line::from(Span::styled(
                format!("Updated {}", file.updated_at),
                Style::default().fg(Color::Gray),
            )),
        ];
        if !file.preview.is_empty() {
            lines.push(Line::from(Span::styled(
                file.preview.clone(),
                Style::default().fg(Color::DarkGray),
            )));
        }
        items.push(ListItem::new(lines));
    }
    if items.is_empty() {
        items.push(ListItem::new("No files yet. Press `a` to create one."));
    }

    let list = List::new(items)
        .block(
            Block::default()
                .title("Files")
                .borders(Borders::ALL)
                .border_style(list_block_style),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, columns[0], list_state);

    let outline_block_style = if matches!(state.focus, FocusPane::Outline) {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let outline_title = open_id
        .and_then(|id| state.files.iter().find(|file| file.id == id))
        .map(|file| file.name.clone())
        .unwrap_or_else(|| "Outline".to_string());

    let body = match workspace.session() {
        Some(session) => Text::from(outline_lines(session, state.focus == FocusPane::Outline)),
        None => Text::from("Select a file and press Enter to open it."),
    };
    let outline = Paragraph::new(body).block(
        Block::default()
            .title(outline_title)
            .borders(Borders::ALL)
            .border_style(outline_block_style),
    );
    frame.render_widget(Clear, columns[1]);
    frame.render_widget(outline, columns[1]);

    if state.focus == FocusPane::Outline && state.overlay().is_none() {
        if let Some((x, y)) = workspace
            .session()
            .and_then(|session| cursor_screen_position(session, columns[1]))
        {
            frame.set_cursor(x, y);
        }
    }

    let status = build_status_line(state, workspace);
    let status_paragraph = Paragraph::new(status).style(Style::default().fg(Color::Gray));
    frame.render_widget(status_paragraph, vertical[1]);

    render_overlay(frame, state);
}

/// One line per visible item: indentation, a chevron for items with
/// children (a plain bullet otherwise), then the text.
pub fn outline_lines(session: &OutlineSession, focused_pane: bool) -> Vec<Line<'static>> {
    let document = session.document();
    let mut lines = Vec::new();
    for index in session.visible_indices() {
        let Some(item) = document.get(index) else {
            continue;
        };
        let marker = if session.has_children(index) {
            if session.is_expanded(index) {
                "▾ "
            } else {
                "▸ "
            }
        } else {
            "• "
        };
        let is_focus = index == session.focus();
        let text_style = if is_focus && focused_pane {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let gutter = if is_focus { "› " } else { GUTTER };
        lines.push(Line::from(vec![
            Span::styled(gutter, Style::default().fg(Color::Cyan)),
            Span::raw(" ".repeat(item.level as usize * INDENT_WIDTH)),
            Span::styled(marker, Style::default().fg(Color::Yellow)),
            Span::styled(item.text.clone(), text_style),
        ]));
    }
    lines
}

fn cursor_screen_position(session: &OutlineSession, area: Rect) -> Option<(u16, u16)> {
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    if inner_width == 0 || inner_height == 0 {
        return None;
    }
    let row = session
        .visible_indices()
        .iter()
        .position(|&index| index == session.focus())?;
    if row >= inner_height as usize {
        return None;
    }
    let item = session.focused_item()?;
    let prefix = GUTTER.width() + item.level as usize * INDENT_WIDTH + 2;
    let text_before = item.text.get(..session.cursor()).unwrap_or(&item.text);
    let col = (prefix + text_before.width()).min(inner_width as usize - 1) as u16;
    Some((area.x + 1 + col, area.y + 1 + row as u16))
}

fn build_status_line(state: &AppState, workspace: &Workspace) -> Text<'static> {
    let focus = match state.focus {
        FocusPane::Files => "Files",
        FocusPane::Outline => "Outline",
    };

    let mut spans = vec![
        Span::raw(format!("Files: {} ", state.len())),
        Span::raw(" | Focus: "),
        Span::styled(focus, Style::default().add_modifier(Modifier::BOLD)),
    ];

    if let Some(status) = workspace.save_status() {
        spans.push(Span::raw(" | "));
        let (label, style) = match status {
            SaveStatus::Saving => (
                "Saving…".to_string(),
                Style::default().fg(Color::Yellow),
            ),
            SaveStatus::Saved => (
                workspace
                    .last_saved_at()
                    .map(|at| format!("Saved {}", format_time_short(at)))
                    .unwrap_or_else(|| "Saved".to_string()),
                Style::default().fg(Color::Green),
            ),
            SaveStatus::Idle => (
                "Unsaved changes".to_string(),
                Style::default().fg(Color::Magenta),
            ),
            SaveStatus::Failed => (
                "Save failed".to_string(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
        };
        spans.push(Span::styled(label, style));
        if workspace.can_save_manually() {
            spans.push(Span::styled(
                " (Ctrl-s to save)",
                Style::default().fg(Color::DarkGray),
            ));
        }
        if let Some(error) = workspace.last_save_error() {
            spans.push(Span::styled(
                format!(" {error}"),
                Style::default().fg(Color::Red),
            ));
        }
    }

    let mut lines = vec![Line::from(spans)];
    if let Some(message) = &state.status_message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::White),
        )));
    }
    lines.push(Line::from(Span::styled(
        "Keys: Enter open • a new • Tab focus • Esc files • Ctrl-s save • ? help • q quit",
        Style::default().fg(Color::DarkGray),
    )));
    Text::from(lines)
}

fn format_time_short(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

fn render_overlay(frame: &mut Frame, state: &AppState) {
    match state.overlay() {
        Some(OverlayState::NewFile(draft)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let mut name_display = draft.name.clone();
            name_display.push('▌');
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Create New Outline",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(name_display),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter to create • Esc to cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title("New File")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::Help) => {
            let area = centered_rect(70, 60, frame.size());
            frame.render_widget(Clear, area);
            let rows = [
                ("Enter", "new line after the focused one"),
                ("Backspace", "delete the line when it is empty"),
                ("Tab / Shift-Tab", "indent / outdent"),
                ("Up / Down", "previous / next visible line"),
                ("Ctrl-Right / Ctrl-Left", "expand / collapse"),
                ("Ctrl-z", "undo structural edit"),
                ("Ctrl-y / Ctrl-Shift-z", "redo structural edit"),
                ("Ctrl-s", "save now"),
                ("Esc", "back to the file list"),
            ];
            let mut lines = vec![
                Line::from(Span::styled(
                    "Outline keys",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
            ];
            for (keys, what) in rows {
                lines.push(Line::from(vec![
                    Span::styled(format!("{keys:<24}"), Style::default().fg(Color::Yellow)),
                    Span::raw(what),
                ]));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Press any key to close",
                Style::default().fg(Color::Gray),
            )));
            let paragraph = Paragraph::new(lines).block(
                Block::default()
                    .title("Help")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::DecodePolicy;

    fn rendered(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn chevrons_follow_expansion() {
        let mut session =
            OutlineSession::open(1, "• a\n  • b\n• c", DecodePolicy::DropUnmatched, 10);
        assert_eq!(rendered(&outline_lines(&session, true)), vec!["› ▸ a", "  • c"]);

        session.toggle_expanded(0);
        assert_eq!(
            rendered(&outline_lines(&session, true)),
            vec!["› ▾ a", "    • b", "  • c"]
        );
    }

    #[test]
    fn cursor_sits_after_marker() {
        let session = OutlineSession::open(1, "• abc", DecodePolicy::DropUnmatched, 10);
        let area = Rect::new(0, 0, 40, 10);
        assert_eq!(cursor_screen_position(&session, area), Some((5, 1)));
    }
}
