use crate::app::ConsoleApp;
use crate::hotkeys::console_controls_legend;
use crate::types::MachineStatus;
use ratatui::backend::TestBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Terminal;

pub fn status_color(status: MachineStatus) -> Color {
    match status {
        MachineStatus::Online => Color::Green,
        MachineStatus::Pending => Color::Yellow,
        MachineStatus::Offline => Color::Red,
    }
}

pub fn render_console(app: &ConsoleApp, width: u16, height: u16) -> String {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).expect("terminal");
    terminal
        .draw(|frame| {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(32), Constraint::Min(30)])
                .split(frame.size());

            let machine_items = app
                .machines()
                .iter()
                .enumerate()
                .map(|(index, machine)| {
                    let marker = if index == app.cursor() { "> " } else { "  " };
                    ListItem::new(Line::from(vec![
                        Span::raw(marker),
                        Span::styled(
                            machine.name.clone(),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                        Span::raw(format!(" {} ", machine.os)),
                        Span::styled(
                            machine.status.as_str(),
                            Style::default().fg(status_color(machine.status)),
                        ),
                    ]))
                })
                .collect::<Vec<_>>();
            frame.render_widget(
                List::new(machine_items)
                    .block(Block::default().borders(Borders::ALL).title("Machines")),
                columns[0],
            );

            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(5),
                    Constraint::Min(5),
                    Constraint::Length(1),
                ])
                .split(columns[1]);

            let header = match app.selected_machine() {
                Some(machine) => Paragraph::new(vec![
                    Line::from(Span::styled(
                        machine.name.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(Span::raw(machine.os.clone())),
                    Line::from(Span::styled(
                        machine.status.as_str(),
                        Style::default().fg(status_color(machine.status)),
                    )),
                ]),
                None => Paragraph::new("select a machine (n/p to move, enter to open)"),
            }
            .block(Block::default().borders(Borders::ALL).title("Machine"));
            frame.render_widget(header, rows[0]);

            let title = if app.fetch_in_flight() {
                "Logs (fetching)"
            } else {
                "Logs"
            };
            frame.render_widget(
                Paragraph::new(app.visible_lines().join("\n"))
                    .block(Block::default().borders(Borders::ALL).title(title)),
                rows[1],
            );

            let footer = match app.notice() {
                Some(notice) => Paragraph::new(Span::styled(
                    notice.to_string(),
                    Style::default().fg(Color::Red),
                )),
                None => Paragraph::new(console_controls_legend()),
            };
            frame.render_widget(footer, rows[2]);
        })
        .expect("draw");

    let mut out = String::new();
    let buffer = terminal.backend().buffer().clone();
    for y in 0..height {
        for x in 0..width {
            out.push_str(buffer.get(x, y).symbol());
        }
        out.push('\n');
    }
    out
}
