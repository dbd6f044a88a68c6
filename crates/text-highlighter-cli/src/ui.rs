use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::app::{App, Cell, locate};

fn cell_style(cell: &Cell, cursor: bool, selected: bool) -> Style {
    let mut style = Style::default();
    if let Some(color) = cell.color.as_deref().and_then(|c| c.parse::<Color>().ok()) {
        style = style.bg(color).fg(Color::Black);
    }
    if cell.heading {
        style = style.add_modifier(Modifier::BOLD);
    }
    if selected {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if cursor {
        style = style.add_modifier(Modifier::REVERSED);
    }
    style
}

/// Turn cells into spans, joining neighbours that share a style.
fn render_line(app: &App, cells: &[Cell]) -> Line<'static> {
    let selection = app.selection_range();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut run = String::new();
    let mut run_style: Option<Style> = None;

    for cell in cells {
        let cursor = cell.offset == Some(app.cursor);
        let selected = cell
            .offset
            .zip(selection.as_ref())
            .is_some_and(|(offset, range)| range.contains(&offset));
        let style = cell_style(cell, cursor, selected);
        if run_style.is_some_and(|s| s != style) {
            spans.push(Span::styled(std::mem::take(&mut run), run_style.unwrap_or_default()));
        }
        run.push(cell.ch);
        run_style = Some(style);
    }
    if !run.is_empty() {
        spans.push(Span::styled(run, run_style.unwrap_or_default()));
    }
    Line::from(spans)
}

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1), Constraint::Length(1)].as_ref())
        .split(f.area());

    // Borders take one column each side
    app.width = usize::from(chunks[0].width.saturating_sub(2)).max(1);
    let lines = app.lines();
    let visible_rows = usize::from(chunks[0].height.saturating_sub(2)).max(1);
    let cursor_row = locate(&lines, app.cursor).map_or(0, |(row, _)| row);
    let scroll = cursor_row.saturating_sub(visible_rows - 1);

    let content: Vec<Line> = lines.iter().map(|cells| render_line(app, cells)).collect();
    let name = app
        .document_path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = format!(
        "{name}{} [{}]",
        if app.is_dirty() { " *" } else { "" },
        app.color()
    );
    let document = Paragraph::new(content)
        .block(Block::default().borders(Borders::ALL).title(title))
        .scroll((u16::try_from(scroll).unwrap_or(u16::MAX), 0));
    f.render_widget(document, chunks[0]);

    let status = Paragraph::new(Line::from(Span::styled(
        app.status.clone(),
        Style::default().fg(Color::Yellow),
    )));
    f.render_widget(status, chunks[1]);

    let help_text = Line::from(vec![
        Span::raw("q: Quit | "),
        Span::raw("←↑↓→ Home End: Move | "),
        Span::raw("v: Select | h: Highlight | x: Remove | "),
        Span::raw("c: Color | s: Save"),
    ]);
    f.render_widget(Paragraph::new(help_text), chunks[2]);
}
