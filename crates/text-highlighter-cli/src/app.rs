use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use text_highlighter_config::Config;
use text_highlighter_engine::classify::{highlight_ancestor, highlight_color};
use text_highlighter_engine::{
    DocumentTree, HighlightQuery, Highlighter, HighlighterOptions, NodeId, char_range_of,
};

use crate::store;

const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "pre", "blockquote",
];

/// One character on screen. `offset` is its position in the document text;
/// decorations such as list bullets have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub offset: Option<usize>,
    pub ch: char,
    pub color: Option<String>,
    pub heading: bool,
}

impl Cell {
    fn decoration(ch: char) -> Self {
        Self {
            offset: None,
            ch,
            color: None,
            heading: false,
        }
    }
}

fn block_ancestor(tree: &DocumentTree, node: NodeId) -> Option<NodeId> {
    let mut current = tree.parent(node);
    while let Some(candidate) = current {
        if tree.tag(candidate).is_some_and(|t| BLOCK_TAGS.contains(&t)) {
            return Some(candidate);
        }
        current = tree.parent(candidate);
    }
    None
}

/// Lay the text beneath `anchor` out as screen lines at most `width` cells wide.
///
/// Blocks start on a new line, list items get a bullet, and highlighted
/// characters carry their marker color.
pub fn layout(tree: &DocumentTree, anchor: NodeId, width: usize) -> Vec<Vec<Cell>> {
    let mut lines: Vec<Vec<Cell>> = vec![Vec::new()];
    let mut current_block = None;
    let mut offset = 0;

    for node in tree.descendants(anchor) {
        if matches!(tree.tag(node), Some("br" | "hr")) {
            lines.push(Vec::new());
            continue;
        }
        let Some(text) = tree.text(node) else {
            continue;
        };

        let block = block_ancestor(tree, node);
        if block != current_block {
            if lines.last().is_some_and(|line| !line.is_empty()) {
                lines.push(Vec::new());
            }
            if let Some(b) = block
                && tree.tag(b) == Some("li")
                && let Some(line) = lines.last_mut()
            {
                line.extend("• ".chars().map(Cell::decoration));
            }
            current_block = block;
        }

        let color = highlight_ancestor(tree, node)
            .and_then(|m| highlight_color(tree, m))
            .map(str::to_string);
        let heading = block
            .and_then(|b| tree.tag(b))
            .is_some_and(|t| matches!(t, "h1" | "h2" | "h3" | "h4" | "h5" | "h6"));

        for ch in text.chars() {
            if let Some(line) = lines.last_mut() {
                line.push(Cell {
                    offset: Some(offset),
                    ch: if ch == '\n' { ' ' } else { ch },
                    color: color.clone(),
                    heading,
                });
            }
            if ch == '\n' {
                lines.push(Vec::new());
            }
            offset += 1;
        }
    }

    let width = width.max(1);
    let mut wrapped = Vec::new();
    for mut line in lines {
        while line.len() > width {
            let rest = line.split_off(width);
            wrapped.push(line);
            line = rest;
        }
        wrapped.push(line);
    }
    wrapped
}

/// Row and column of the cell showing `offset`.
pub fn locate(lines: &[Vec<Cell>], offset: usize) -> Option<(usize, usize)> {
    lines.iter().enumerate().find_map(|(row, line)| {
        line.iter()
            .position(|cell| cell.offset == Some(offset))
            .map(|col| (row, col))
    })
}

pub struct App {
    highlighter: Highlighter,
    config: Config,
    document_path: PathBuf,
    text_len: usize,
    pub cursor: usize,
    pub selection_start: Option<usize>,
    pub status: String,
    /// Width of the document pane at the last draw.
    pub width: usize,
    dirty: bool,
}

impl App {
    /// Load a Markdown document and restore its saved highlights.
    pub fn open(document_path: &Path, config: Config) -> Result<Self> {
        let source = std::fs::read_to_string(document_path)
            .with_context(|| format!("Failed to read document {}", document_path.display()))?;
        let mut app = Self::from_source(&source, document_path.to_path_buf(), config)?;
        app.restore()?;
        Ok(app)
    }

    pub fn from_source(source: &str, document_path: PathBuf, config: Config) -> Result<Self> {
        let tree = DocumentTree::from_markdown(source);
        let anchor = tree.root();
        let options = HighlighterOptions::default()
            .with_color(config.color.clone())
            .with_highlighted_class(config.highlighted_class.clone())
            .with_context_class(config.context_class.clone())
            .on_after_highlight(|_, _, markers, id| {
                log::info!("Highlight {id} produced {} marker(s)", markers.len());
            });
        let highlighter = Highlighter::new(tree, anchor, options)?;
        let text_len = highlighter.tree().text_content(anchor).chars().count();

        Ok(Self {
            highlighter,
            config,
            document_path,
            text_len,
            cursor: 0,
            selection_start: None,
            status: String::new(),
            width: 80,
            dirty: false,
        })
    }

    pub fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    pub fn sidecar_path(&self) -> PathBuf {
        store::sidecar_path(&self.document_path)
    }

    pub fn color(&self) -> &str {
        self.highlighter.color()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn lines(&self) -> Vec<Vec<Cell>> {
        layout(self.highlighter.tree(), self.highlighter.anchor(), self.width)
    }

    /// Re-apply highlights saved in the sidecar file, if there is one.
    pub fn restore(&mut self) -> Result<()> {
        let path = self.sidecar_path();
        let Some(records) = store::load(&path)? else {
            self.status = "No saved highlights".to_string();
            return Ok(());
        };
        let report = self.highlighter.deserialize_records(records);
        for failure in &report.failures {
            log::warn!("Highlight {} not restored: {}", failure.index, failure.error);
        }
        self.status = if report.failures.is_empty() {
            format!("Restored {} highlight(s)", report.restored)
        } else {
            format!(
                "Restored {} highlight(s), {} could not be restored",
                report.restored,
                report.failures.len()
            )
        };
        Ok(())
    }

    pub fn save(&mut self) -> Result<()> {
        let descriptors = self.highlighter.serialize_highlights();
        let path = self.sidecar_path();
        store::save(&path, &descriptors)?;
        self.dirty = false;
        self.status = format!("Saved {} highlight(s) to {}", descriptors.len(), path.display());
        Ok(())
    }

    pub fn move_by(&mut self, delta: isize) {
        let last = self.text_len.saturating_sub(1);
        self.cursor = self.cursor.saturating_add_signed(delta).min(last);
    }

    /// Move up (negative) or down (positive) keeping the column where possible.
    pub fn move_vertical(&mut self, rows: isize) {
        let lines = self.lines();
        let Some((row, col)) = locate(&lines, self.cursor) else {
            return;
        };
        let mut target = row;
        loop {
            let Some(next) = target.checked_add_signed(rows.signum()) else {
                return;
            };
            let Some(line) = lines.get(next) else {
                return;
            };
            target = next;
            let moved = (target as isize - row as isize).abs();
            if moved < rows.abs() || line.iter().all(|c| c.offset.is_none()) {
                continue;
            }
            let cell = line
                .iter()
                .take(col + 1)
                .filter_map(|c| c.offset)
                .next_back()
                .or_else(|| line.iter().find_map(|c| c.offset));
            if let Some(offset) = cell {
                self.cursor = offset;
            }
            return;
        }
    }

    pub fn line_start(&mut self) {
        self.jump_within_line(true);
    }

    pub fn line_end(&mut self) {
        self.jump_within_line(false);
    }

    fn jump_within_line(&mut self, to_start: bool) {
        let lines = self.lines();
        let Some((row, _)) = locate(&lines, self.cursor) else {
            return;
        };
        let mut offsets = lines[row].iter().filter_map(|c| c.offset);
        let target = if to_start {
            offsets.next()
        } else {
            offsets.next_back()
        };
        if let Some(offset) = target {
            self.cursor = offset;
        }
    }

    pub fn toggle_selection(&mut self) {
        self.selection_start = match self.selection_start {
            Some(_) => None,
            None => Some(self.cursor),
        };
    }

    /// Characters between the selection start and the cursor, both inclusive.
    pub fn selection_range(&self) -> Option<Range<usize>> {
        let start = self.selection_start?;
        Some(start.min(self.cursor)..start.max(self.cursor) + 1)
    }

    pub fn highlight_selection(&mut self) {
        let Some(range) = self.selection_range() else {
            self.status = "Press v to start a selection first".to_string();
            return;
        };
        match self.highlighter.highlight_offsets(range.start, range.end) {
            Ok(Some(outcome)) if outcome.markers.is_empty() => {
                self.status = "Nothing to highlight in the selection".to_string();
            }
            Ok(Some(outcome)) => {
                self.dirty = true;
                self.selection_start = None;
                self.status = format!("Highlighted {} characters", range.len());
                log::debug!("Operation {} done", outcome.operation_id);
            }
            Ok(None) => self.status = "Highlight cancelled".to_string(),
            Err(e) => self.status = format!("Cannot highlight: {e}"),
        }
    }

    /// Remove every marker covering the character under the cursor.
    pub fn remove_at_cursor(&mut self) {
        let tree = self.highlighter.tree();
        let anchor = self.highlighter.anchor();
        let covering: Vec<NodeId> = self
            .highlighter
            .highlights(HighlightQuery::default())
            .into_iter()
            .filter(|&m| char_range_of(tree, anchor, m).is_some_and(|r| r.contains(&self.cursor)))
            .collect();

        let removed: usize = covering
            .into_iter()
            .map(|m| self.highlighter.remove_highlights(Some(m)))
            .sum();
        if removed == 0 {
            self.status = "No highlight under the cursor".to_string();
        } else {
            self.dirty = true;
            self.status = format!("Removed {removed} highlight(s)");
        }
    }

    pub fn cycle_color(&mut self) {
        let next = self.config.next_color(self.highlighter.color()).to_string();
        self.status = format!("Color: {next}");
        self.highlighter.set_color(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn app(source: &str) -> App {
        App::from_source(source, PathBuf::from("/tmp/doc.md"), Config::default()).unwrap()
    }

    fn line_text(line: &[Cell]) -> String {
        line.iter().map(|c| c.ch).collect()
    }

    #[test]
    fn test_layout_breaks_blocks_and_marks_list_items() {
        let app = app("# Title\n\nSome text\n\n- one\n- two");

        let lines: Vec<String> = app.lines().iter().map(|l| line_text(l)).collect();

        assert_eq!(lines, vec!["Title", "Some text", "• one", "• two"]);
        assert!(app.lines()[0].iter().all(|c| c.heading));
    }

    #[test]
    fn test_layout_wraps_to_width() {
        let mut app = app("abcdefghij");
        app.width = 4;

        let lines: Vec<String> = app.lines().iter().map(|l| line_text(l)).collect();

        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_selection_highlight_colors_cells() {
        let mut app = app("The quick brown fox");
        app.move_by(4);
        app.toggle_selection();
        app.move_by(4);

        app.highlight_selection();

        assert!(app.is_dirty());
        assert_eq!(app.selection_start, None);
        let colored: String = app.lines()[0]
            .iter()
            .filter(|c| c.color.is_some())
            .map(|c| c.ch)
            .collect();
        assert_eq!(colored, "quick");
    }

    #[test]
    fn test_highlight_without_selection_only_sets_status() {
        let mut app = app("text");

        app.highlight_selection();

        assert!(!app.is_dirty());
        assert!(app.status.contains("selection"));
    }

    #[test]
    fn test_vertical_movement_keeps_column() {
        let mut app = app("first line\n\nsecond line");
        app.move_by(3);

        app.move_vertical(1);
        assert_eq!(app.cursor, 13);

        app.move_vertical(-1);
        assert_eq!(app.cursor, 3);

        app.line_end();
        assert_eq!(app.cursor, 9);
        app.line_start();
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn test_remove_at_cursor_and_color_cycle() {
        let mut app = app("alpha beta");
        app.cycle_color();
        assert_eq!(app.color(), Config::default().palette[1]);
        app.toggle_selection();
        app.move_by(4);
        app.highlight_selection();

        app.move_by(-2);
        app.remove_at_cursor();

        assert!(app.lines()[0].iter().all(|c| c.color.is_none()));
        assert!(app.status.starts_with("Removed 1"));
    }

    #[test]
    fn test_save_and_reopen_restores_highlights() {
        let temp_dir = TempDir::new().unwrap();
        let document = temp_dir.path().join("notes.md");
        std::fs::write(&document, "The quick brown fox\n\njumps over").unwrap();

        let mut first = App::open(&document, Config::default()).unwrap();
        assert_eq!(first.status, "No saved highlights");
        first.move_by(4);
        first.toggle_selection();
        first.move_by(4);
        first.highlight_selection();
        first.save().unwrap();
        assert!(!first.is_dirty());
        assert!(temp_dir.path().join("notes.md.highlights.json").exists());

        let reopened = App::open(&document, Config::default()).unwrap();

        assert_eq!(reopened.status, "Restored 1 highlight(s)");
        assert_eq!(
            reopened.highlighter().tree().inner_html(reopened.highlighter().anchor()),
            first.highlighter().tree().inner_html(first.highlighter().anchor())
        );
    }

    #[test]
    fn test_reopen_with_one_bad_sidecar_entry_restores_the_rest() {
        let temp_dir = TempDir::new().unwrap();
        let document = temp_dir.path().join("notes.md");
        std::fs::write(&document, "The quick brown fox").unwrap();
        std::fs::write(
            temp_dir.path().join("notes.md.highlights.json"),
            r#"[{"path":[0,0],"offset":4,"length":5,"color":"red","text":"quick"},{"path":[0,0]}]"#,
        )
        .unwrap();

        let app = App::open(&document, Config::default()).unwrap();

        assert_eq!(app.status, "Restored 1 highlight(s), 1 could not be restored");
        let colored: String = app.lines()[0]
            .iter()
            .filter(|c| c.color.as_deref() == Some("red"))
            .map(|c| c.ch)
            .collect();
        assert_eq!(colored, "quick");
    }
}
