use crate::errors::CerveauError;
use crate::hotkeys::{controls_legend, HotkeyBinding};
use crate::metrics::MetricsSnapshot;
use crate::workspace::{ScanResult, WorkspaceItem};
use ratatui::backend::TestBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table};
use ratatui::Terminal;
use std::path::Path;

const MIN_WIDTH: u16 = 60;
const MIN_HEIGHT: u16 = 20;

/// Everything one frame shows. The painter makes no decisions of its own.
#[derive(Debug, Clone)]
pub struct RenderModel<'a> {
    pub root: &'a Path,
    pub bindings: &'a [HotkeyBinding],
    pub metrics: MetricsSnapshot,
    pub scan: &'a ScanResult,
    pub selected_index: Option<usize>,
    pub max_display: usize,
}

impl RenderModel<'_> {
    pub fn selected(&self) -> Option<&WorkspaceItem> {
        self.selected_index.and_then(|index| self.scan.get(index))
    }
}

pub fn flag_icon(ok: bool) -> &'static str {
    if ok {
        "✔"
    } else {
        "·"
    }
}

/// Keeps the tail of long paths, which is the distinguishing part.
pub fn short_path(path: &Path, max_len: usize) -> String {
    let text = path.display().to_string();
    let len = text.chars().count();
    if len <= max_len {
        return text;
    }
    let tail = text
        .chars()
        .skip(len - (max_len - 1))
        .collect::<String>();
    format!("…{tail}")
}

fn titled(title: impl Into<String>) -> Block<'static> {
    Block::default().borders(Borders::ALL).title(title.into())
}

pub fn render_dashboard(
    model: &RenderModel<'_>,
    width: u16,
    height: u16,
) -> Result<String, CerveauError> {
    let width = width.max(MIN_WIDTH);
    let height = height.max(MIN_HEIGHT);
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).map_err(|e| CerveauError::Terminal(e.to_string()))?;
    let bold = Style::default().add_modifier(Modifier::BOLD);

    terminal
        .draw(|frame| {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Min(8),
                    Constraint::Length(3),
                ])
                .split(frame.area());
            let body = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)])
                .split(rows[1]);
            let right = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(10), Constraint::Min(5)])
                .split(body[1]);

            frame.render_widget(
                Paragraph::new(Line::from(Span::styled("CERVEAU DASHBOARD", bold)))
                    .centered()
                    .block(Block::default().borders(Borders::ALL)),
                rows[0],
            );

            let action_rows = model
                .bindings
                .iter()
                .map(|binding| Row::new(vec![binding.key.to_string(), binding.label.to_string()]))
                .collect::<Vec<_>>();
            frame.render_widget(
                Table::new(action_rows, [Constraint::Length(4), Constraint::Min(10)])
                    .header(Row::new(vec!["Key", "Action"]).style(bold))
                    .block(titled("Actions").title_bottom(controls_legend(model.bindings))),
                body[0],
            );

            let metrics = &model.metrics;
            let system_rows = [
                ("Host", metrics.host.clone()),
                ("Time", metrics.taken_at.clone()),
                ("Workspace", model.root.display().to_string()),
                ("CPU", format!("{:.0}%", metrics.cpu_percent)),
                ("RAM", metrics.memory_line()),
                ("Disk(Home)", format!("{:.0}%", metrics.disk_used_percent)),
                ("Venv", metrics.venv.clone()),
            ]
            .into_iter()
            .map(|(key, value)| Row::new(vec![Span::styled(key, bold), Span::raw(value)]))
            .collect::<Vec<_>>();
            frame.render_widget(
                Table::new(system_rows, [Constraint::Length(12), Constraint::Min(10)])
                    .block(titled("System")),
                right[0],
            );

            let counts = model.scan.counts();
            let item_rows = model
                .scan
                .visible(model.max_display)
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let is_selected = model.selected_index == Some(index);
                    let row = Row::new(vec![
                        if is_selected { "▶" } else { " " }.to_string(),
                        item.name.clone(),
                        flag_icon(item.is_version_controlled).to_string(),
                        flag_icon(item.is_script_project).to_string(),
                        flag_icon(item.is_package_project).to_string(),
                        flag_icon(item.is_notes_vault).to_string(),
                        item.branch.clone(),
                        item.last_commit_age.clone(),
                        short_path(&item.path, 40),
                    ]);
                    if is_selected {
                        row.style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                    } else {
                        row
                    }
                })
                .collect::<Vec<_>>();
            let workspace_title = format!(
                "Workspace (scan) dirs:{} git:{} py:{} node:{} obs:{}",
                counts.dirs, counts.git, counts.script, counts.package, counts.vault
            );
            frame.render_widget(
                Table::new(
                    item_rows,
                    [
                        Constraint::Length(1),
                        Constraint::Min(12),
                        Constraint::Length(3),
                        Constraint::Length(3),
                        Constraint::Length(4),
                        Constraint::Length(3),
                        Constraint::Length(10),
                        Constraint::Length(14),
                        Constraint::Min(12),
                    ],
                )
                .header(
                    Row::new(vec![
                        " ", "Name", "Git", "Py", "Node", "Obs", "Branch", "Last", "Path",
                    ])
                    .style(bold),
                )
                .block(titled(workspace_title).title_bottom(format!(
                    "j/k select  (shows {} max)",
                    model.max_display
                ))),
                right[1],
            );

            let footer = match model.selected() {
                Some(item) => Line::from(vec![
                    Span::styled("Selected: ", bold),
                    Span::styled(item.name.clone(), bold),
                    Span::raw("  |  "),
                    Span::styled("Path: ", bold),
                    Span::raw(item.path.display().to_string()),
                ]),
                None => Line::from(Span::styled(
                    format!("No items found in {}", model.root.display()),
                    bold,
                )),
            };
            frame.render_widget(
                Paragraph::new(footer).block(Block::default().borders(Borders::ALL)),
                rows[2],
            );
        })
        .map_err(|e| CerveauError::Terminal(e.to_string()))?;

    let buffer = terminal.backend().buffer();
    let mut out = String::new();
    for y in 0..height {
        if y > 0 {
            out.push('\n');
        }
        let mut line = String::new();
        for x in 0..width {
            line.push_str(buffer[(x, y)].symbol());
        }
        out.push_str(line.trim_end());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{render_dashboard, short_path, RenderModel};
    use crate::hotkeys::FULL_BINDINGS;
    use crate::metrics::FixedMetrics;
    use crate::workspace::{ScanResult, WorkspaceItem};
    use std::path::{Path, PathBuf};

    fn item(name: &str) -> WorkspaceItem {
        WorkspaceItem {
            name: name.to_string(),
            path: PathBuf::from("/ws").join(name),
            is_version_controlled: true,
            is_package_project: false,
            is_script_project: false,
            is_notes_vault: false,
            branch: "main".to_string(),
            last_commit_age: "3 hours ago".to_string(),
        }
    }

    #[test]
    fn short_path_keeps_tail() {
        assert_eq!(short_path(Path::new("/a/b"), 10), "/a/b");
        let long = short_path(Path::new("/home/someone/workspace/projects/thing"), 12);
        assert_eq!(long.chars().count(), 12);
        assert!(long.starts_with('…'));
        assert!(long.ends_with("/thing"));
    }

    #[test]
    fn frame_shows_panels_selection_and_footer() {
        let scan = ScanResult::new(vec![item("alpha"), item("beta")]);
        let model = RenderModel {
            root: Path::new("/ws"),
            bindings: &FULL_BINDINGS,
            metrics: FixedMetrics::default().snapshot,
            scan: &scan,
            selected_index: Some(1),
            max_display: 30,
        };
        let frame = render_dashboard(&model, 140, 36).expect("render");
        assert!(frame.contains("CERVEAU DASHBOARD"));
        assert!(frame.contains("Actions"));
        assert!(frame.contains("System"));
        assert!(frame.contains("dirs:2 git:2"));
        assert!(frame.contains("devbox"));
        assert!(frame.contains("Selected: beta"));
        let beta_line = frame
            .lines()
            .find(|line| line.contains("beta") && line.contains("main"))
            .expect("beta row");
        assert!(beta_line.contains('▶'));
        let alpha_line = frame
            .lines()
            .find(|line| line.contains("alpha") && line.contains("main"))
            .expect("alpha row");
        assert!(!alpha_line.contains('▶'));
    }

    #[test]
    fn empty_scan_says_nothing_found() {
        let scan = ScanResult::default();
        let model = RenderModel {
            root: Path::new("/nowhere"),
            bindings: &FULL_BINDINGS,
            metrics: FixedMetrics::default().snapshot,
            scan: &scan,
            selected_index: None,
            max_display: 30,
        };
        let frame = render_dashboard(&model, 120, 30).expect("render");
        assert!(frame.contains("No items found in /nowhere"));
        assert!(!frame.contains('▶'));
    }

    #[test]
    fn frame_fills_exactly_the_terminal_height_without_trailing_newline() {
        let scan = ScanResult::new(vec![item("alpha")]);
        let model = RenderModel {
            root: Path::new("/ws"),
            bindings: &FULL_BINDINGS,
            metrics: FixedMetrics::default().snapshot,
            scan: &scan,
            selected_index: Some(0),
            max_display: 30,
        };
        let frame = render_dashboard(&model, 100, 24).expect("render");
        assert!(!frame.ends_with('\n'));
        assert_eq!(frame.lines().count(), 24);
        assert!(frame.lines().next().expect("top row").contains('┌'));
    }
}
