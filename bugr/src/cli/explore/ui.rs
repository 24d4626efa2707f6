use bugtriage::prelude::*;
use bugtriage::severity::urgency_of;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
};

use super::app::{App, InputMode};

const HELP_TEXT: &[(&str, &str)] = &[
    ("j / Down", "Move down"),
    ("k / Up", "Move up"),
    ("g / G", "First / last row"),
    ("n / Right", "Next page"),
    ("p / Left", "Previous page"),
    ("1..5", "Sort by id, severity, component, status, summary"),
    ("/ or f", "Filter"),
    ("Enter", "Apply filter now"),
    ("Esc", "Clear filter / dismiss"),
    ("Ctrl-a/e/k", "In input: start/end/kill-to-eol"),
    ("r", "Refresh"),
    ("e", "Export matching records to CSV"),
    ("D", "Delete selected record"),
    ("?", "Toggle help"),
    ("q", "Quit"),
];

const COLUMNS: [(SortKey, &str); 5] = [
    (SortKey::Id, "Id"),
    (SortKey::Severity, "Severity"),
    (SortKey::Component, "Component"),
    (SortKey::Status, "Status"),
    (SortKey::Summary, "Summary"),
];

pub fn draw(frame: &mut Frame, app: &mut App) {
    let view = app.explorer.view();
    let banner = match &view.status {
        ExplorerStatus::Error(message) => Some(format!(" Refresh failed: {message} (showing last results; r to retry)")),
        ExplorerStatus::LoginRequired => Some(" Login required: run `bugr auth login`".to_string()),
        _ => None,
    };

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(u16::from(banner.is_some())),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_status_bar(frame, app, &view, outer[0]);
    if let Some(banner) = banner {
        let style = Style::default()
            .bg(Color::Red)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
        frame.render_widget(Paragraph::new(banner).style(style), outer[1]);
    }
    draw_records(frame, app, &view, outer[2]);
    draw_footer(frame, app, outer[3]);

    if app.show_help {
        draw_help_overlay(frame, frame.area());
    }
}

fn draw_status_bar(frame: &mut Frame, app: &App, view: &ExplorerView, area: Rect) {
    let filter = if view.filter.is_empty() {
        "no filter".to_string()
    } else {
        format!("filter=\"{}\"", view.filter)
    };
    let mut status = format!(
        " bugr | {} | {} records | page {}/{} | {} | sort {} {}",
        app.explorer.mode(),
        view.total,
        view.page,
        view.total_pages,
        filter,
        view.sort_key,
        view.sort_dir,
    );
    if view.pending > 0 {
        status.push_str(&format!(" | {} pending", view.pending));
    }
    let bar = Paragraph::new(status).style(
        Style::default()
            .bg(Color::DarkGray)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_widget(bar, area);
}

fn draw_records(frame: &mut Frame, app: &mut App, view: &ExplorerView, area: Rect) {
    let title = match view.status {
        ExplorerStatus::Loading => " Records (loading...) ".to_string(),
        _ => format!(" Records ({}) ", view.total),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));

    if view.rows.is_empty() {
        let message = match &view.status {
            ExplorerStatus::Loading => "Loading records...",
            ExplorerStatus::LoginRequired => "Not logged in.",
            ExplorerStatus::Error(_) => "No records loaded.",
            ExplorerStatus::Empty | ExplorerStatus::Rows => {
                if view.filter.is_empty() {
                    "No records yet."
                } else {
                    "No records match the filter."
                }
            }
        };
        let text = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    }

    let header = Row::new(COLUMNS.iter().map(|(key, name)| {
        let indicator = if *key == view.sort_key {
            match view.sort_dir {
                SortDirection::Asc => " ^",
                SortDirection::Desc => " v",
            }
        } else {
            ""
        };
        Cell::from(format!("{name}{indicator}"))
    }))
    .style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )
    .height(1);

    let rows: Vec<Row> = view
        .rows
        .iter()
        .map(|row| {
            Row::new([
                Cell::from(row.id.to_string()),
                Cell::from(Span::styled(row.severity.clone(), severity_style(&row.severity))),
                Cell::from(row.component.clone()),
                Cell::from(Span::styled(row.status.clone(), status_style(row))),
                Cell::from(row.display_summary().to_string()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(14),
        Constraint::Length(16),
        Constraint::Min(20),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut app.table_state);
}

fn severity_style(label: &str) -> Style {
    match urgency_of(label) {
        0 => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        1 => Style::default().fg(Color::LightRed),
        2 => Style::default().fg(Color::Yellow),
        3 => Style::default().fg(Color::Gray),
        _ => Style::default().fg(Color::DarkGray),
    }
}

fn status_style(row: &BugRow) -> Style {
    if row.is_fixed() {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    }
}

fn draw_footer(frame: &mut Frame, app: &App, area: Rect) {
    let (text, prefix_len) = match app.input_mode {
        InputMode::Filter => {
            let prefix = "Filter: ";
            (format!("{prefix}{}", app.input_buffer), prefix.len())
        }
        InputMode::ConfirmDelete => (app.status_message.clone().unwrap_or_default(), 0),
        InputMode::None => {
            let t = app.status_message.clone().unwrap_or_else(|| {
                " j/k:move  n/p:page  1-5:sort  /:filter  r:refresh  e:export  D:delete  ?:help  q:quit"
                    .to_string()
            });
            (t, 0)
        }
    };
    let style = if app.input_mode == InputMode::None {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Yellow)
    };
    frame.render_widget(Paragraph::new(text).style(style), area);

    if app.input_mode == InputMode::Filter {
        let chars_before_cursor = app.input_buffer[..app.input_cursor].chars().count();
        #[allow(clippy::cast_possible_truncation)]
        let cursor_x = area.x + (prefix_len + chars_before_cursor) as u16;
        if cursor_x < area.x + area.width {
            frame.set_cursor_position((cursor_x, area.y));
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn draw_help_overlay(frame: &mut Frame, area: Rect) {
    let width = 64u16.min(area.width.saturating_sub(4));
    let height = (HELP_TEXT.len() as u16 + 4).min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let popup_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, popup_area);

    let lines: Vec<Line> = HELP_TEXT
        .iter()
        .map(|(key, desc)| {
            Line::from(vec![
                Span::styled(
                    format!("  {key:<14}"),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(*desc),
            ])
        })
        .collect();

    let help = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Keybindings ")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(help, popup_area);
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ratatui::{Terminal, backend::TestBackend};

    use super::*;

    fn idle_app() -> App {
        let config = ClientConfig::default().mode(FetchMode::ClientSide);
        let client = TriageClient::with_config(config).unwrap();
        App::new(RecordExplorer::new(client), PathBuf::from(EXPORT_FILE_NAME))
    }

    fn buffer_to_lines(term: &Terminal<TestBackend>) -> Vec<String> {
        let buf = term.backend().buffer();
        let area = buf.area();
        (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buf[(x, y)].symbol())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn snapshot_before_first_load_shows_loading() {
        let backend = TestBackend::new(100, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut app = idle_app();

        terminal.draw(|frame| draw(frame, &mut app)).unwrap();
        let screen = buffer_to_lines(&terminal).join("\n");

        assert!(screen.contains("bugr | client | 0 records | page 1/1"));
        assert!(screen.contains("Loading records..."));
        assert!(screen.contains("q:quit"));
    }

    #[test]
    fn snapshot_filter_prompt_and_help_overlay_render() {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut app = idle_app();
        app.input_mode = InputMode::Filter;
        app.input_buffer = "crash".to_string();
        app.input_cursor = 5;
        app.show_help = true;

        terminal.draw(|frame| draw(frame, &mut app)).unwrap();
        let screen = buffer_to_lines(&terminal).join("\n");

        assert!(screen.contains("Filter: crash"));
        assert!(screen.contains("Keybindings"));
        assert!(screen.contains("Delete selected record"));
    }

    #[test]
    fn severity_colors_follow_urgency() {
        assert_eq!(severity_style("S1").fg, Some(Color::Red));
        assert_eq!(severity_style("critical").fg, Some(Color::Red));
        assert_eq!(severity_style("S4").fg, Some(Color::Gray));
        assert_eq!(severity_style("blocker").fg, Some(Color::DarkGray));
    }
}
