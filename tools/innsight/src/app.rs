use crate::config::AppConfig;
use crate::errors::ConsoleError;
use crate::hotkeys::{action_for_key, HotkeyAction};
use crate::logging::EventLog;
use crate::pager::{FetchTicket, PageOutcome, ReversePager};
use crate::runtime::{ConsoleRuntime, LogFetcher};
use crate::scroll::Viewport;
use crate::tui::render_console;
use crate::types::Machine;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

pub const FRAME_WIDTH: u16 = 120;
pub const FRAME_HEIGHT: u16 = 30;
/// Inner height of the log pane for the fixed frame layout in `tui.rs`:
/// total height minus header, legend row, and the pane borders.
pub const LOG_PANE_ROWS: usize = 22;

const KEY_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Fetch(FetchTicket),
    RefreshStatus,
    Logout,
    Quit,
}

/// How a fetch completion was absorbed, for event logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageDisposition {
    Applied,
    Retryable(String),
    Stale,
}

/// A completed page fetch crossing back from a fetch thread into the
/// single-threaded console loop.
#[derive(Debug)]
pub struct PageDelivery {
    pub ticket: FetchTicket,
    pub result: Result<Vec<String>, ConsoleError>,
}

/// Console state machine: the machine list, the selected machine's pager,
/// and the log-pane viewport. All mutation happens on the loop thread, in
/// response to a key or a delivered fetch completion.
pub struct ConsoleApp {
    machines: Vec<Machine>,
    cursor: usize,
    selected: Option<String>,
    generation: u64,
    pager: Option<ReversePager>,
    viewport: Viewport,
    sentinel_rows: usize,
    scroll_step: usize,
    notice: Option<String>,
}

impl ConsoleApp {
    pub fn new(
        machines: Vec<Machine>,
        viewport_height: usize,
        sentinel_rows: usize,
        scroll_step: usize,
    ) -> Self {
        Self {
            machines,
            cursor: 0,
            selected: None,
            generation: 0,
            pager: None,
            viewport: Viewport::new(viewport_height),
            sentinel_rows,
            scroll_step,
            notice: None,
        }
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected_machine(&self) -> Option<&Machine> {
        let id = self.selected.as_deref()?;
        self.machines.iter().find(|machine| machine.id == id)
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn fetch_in_flight(&self) -> bool {
        self.pager.as_ref().is_some_and(ReversePager::in_flight)
    }

    /// Log rows currently inside the viewport window, oldest at the top.
    pub fn visible_lines(&self) -> Vec<&str> {
        let Some(pager) = self.pager.as_ref() else {
            return Vec::new();
        };
        let (start, end) = self.viewport.visible_range();
        pager.merged_lines().skip(start).take(end - start).collect()
    }

    /// Replace the machine list after a status refresh. A selection whose
    /// machine disappeared is dropped, which also invalidates any in-flight
    /// fetch for it.
    pub fn set_machines(&mut self, machines: Vec<Machine>) {
        self.machines = machines;
        if !self.machines.is_empty() {
            self.cursor = self.cursor.min(self.machines.len() - 1);
        } else {
            self.cursor = 0;
        }
        if let Some(id) = self.selected.as_deref() {
            if !self.machines.iter().any(|machine| machine.id == id) {
                self.selected = None;
                self.pager = None;
                self.generation += 1;
                self.viewport.set_content_height(0);
            }
        }
    }

    /// Open the log viewer for the machine under the cursor: fresh pager,
    /// fresh generation, and an eager page-0 fetch so there is content to
    /// bottom-anchor against.
    pub fn select_cursor(&mut self) -> Option<Command> {
        let machine = self.machines.get(self.cursor)?.clone();
        self.generation += 1;
        self.selected = Some(machine.id);
        self.notice = None;
        self.viewport.set_content_height(0);
        let mut pager = ReversePager::new(self.generation, machine.name);
        let ticket = pager.request_more(0);
        self.pager = Some(pager);
        ticket.map(Command::Fetch)
    }

    pub fn select_by_name(&mut self, name: &str) -> Option<Command> {
        let index = self
            .machines
            .iter()
            .position(|machine| machine.name == name)?;
        self.cursor = index;
        self.select_cursor()
    }

    pub fn on_key(&mut self, key: char) -> Option<Command> {
        match action_for_key(key)? {
            HotkeyAction::Quit => Some(Command::Quit),
            HotkeyAction::ScrollDown => {
                self.viewport.scroll_down(self.scroll_step);
                None
            }
            HotkeyAction::ScrollUp => {
                self.viewport.scroll_up(self.scroll_step);
                self.maybe_request_more().map(Command::Fetch)
            }
            HotkeyAction::NextMachine => {
                if !self.machines.is_empty() {
                    self.cursor = (self.cursor + 1).min(self.machines.len() - 1);
                }
                None
            }
            HotkeyAction::PrevMachine => {
                self.cursor = self.cursor.saturating_sub(1);
                None
            }
            HotkeyAction::SelectMachine => self.select_cursor(),
            HotkeyAction::RefreshStatus => Some(Command::RefreshStatus),
            HotkeyAction::Logout => Some(Command::Logout),
        }
    }

    /// Apply a delivered fetch completion. Returns how it was absorbed plus
    /// an optional follow-up fetch for the case where the sentinel is still
    /// visible after the insertion (short content, or the user kept the
    /// viewport parked at the top).
    pub fn on_page(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<String>, ConsoleError>,
    ) -> (PageDisposition, Option<Command>) {
        let Some(pager) = self.pager.as_mut() else {
            return (PageDisposition::Stale, None);
        };
        match pager.complete(ticket, result) {
            PageOutcome::Stale => (PageDisposition::Stale, None),
            PageOutcome::Failed(message) => {
                self.notice = Some(format!("log fetch failed: {message} (scroll up to retry)"));
                (PageDisposition::Retryable(message), None)
            }
            PageOutcome::Appended {
                before_height,
                first_page,
            } => {
                let content_height = pager.line_count();
                self.viewport.set_content_height(content_height);
                if first_page {
                    self.viewport.anchor_to_bottom();
                } else {
                    self.viewport.preserve_anchor(before_height);
                }
                self.notice = None;
                let follow_up = self.maybe_request_more().map(Command::Fetch);
                (PageDisposition::Applied, follow_up)
            }
        }
    }

    /// The sentinel trigger: fetch the next older page when the top band of
    /// the content is visible. Redundant calls are absorbed by the pager's
    /// in-flight guard.
    pub fn maybe_request_more(&mut self) -> Option<FetchTicket> {
        if !self.viewport.near_top(self.sentinel_rows) {
            return None;
        }
        let content_height = self.viewport.content_height;
        self.pager.as_mut()?.request_more(content_height)
    }
}

fn dispatch_fetch(
    logs: Arc<dyn LogFetcher>,
    token: String,
    ticket: FetchTicket,
    tx: UnboundedSender<PageDelivery>,
) {
    std::thread::spawn(move || {
        let result = logs.fetch_page(&ticket.hostname, ticket.page_index, &token);
        let _ = tx.send(PageDelivery { ticket, result });
    });
}

/// Interactive console loop. Fetches run on background threads and come back
/// through the channel; keys and completions interleave here, never race.
pub fn run_console(
    runtime: &ConsoleRuntime,
    cfg: &AppConfig,
    token: &str,
    preselect: Option<&str>,
    event_log: &EventLog,
) -> Result<i32, ConsoleError> {
    let machines = runtime.status.machines(token)?;
    let mut app = ConsoleApp::new(
        machines,
        LOG_PANE_ROWS,
        cfg.viewer.sentinel_rows,
        cfg.viewer.scroll_step,
    );
    let (tx, mut rx) = unbounded_channel::<PageDelivery>();

    if let Some(name) = preselect {
        match app.select_by_name(name) {
            Some(Command::Fetch(ticket)) => {
                issue_fetch(runtime, token, ticket, &tx, event_log);
            }
            _ => {
                app.set_notice(format!("unknown machine: {name}"));
            }
        }
    }

    let mut dirty = true;
    loop {
        while let Ok(delivery) = rx.try_recv() {
            let (disposition, follow_up) = app.on_page(&delivery.ticket, delivery.result);
            match disposition {
                PageDisposition::Applied => {
                    let _ = event_log.info(
                        "page_loaded",
                        json!({
                            "hostname": delivery.ticket.hostname,
                            "page": delivery.ticket.page_index,
                        }),
                    );
                }
                PageDisposition::Retryable(message) => {
                    let _ = event_log.warn(
                        "fetch_failed",
                        json!({
                            "hostname": delivery.ticket.hostname,
                            "page": delivery.ticket.page_index,
                            "error": message,
                        }),
                    );
                }
                PageDisposition::Stale => {
                    let _ = event_log.info(
                        "stale_dropped",
                        json!({
                            "hostname": delivery.ticket.hostname,
                            "page": delivery.ticket.page_index,
                        }),
                    );
                }
            }
            if let Some(Command::Fetch(ticket)) = follow_up {
                issue_fetch(runtime, token, ticket, &tx, event_log);
            }
            dirty = true;
        }

        if dirty {
            let frame = render_console(&app, FRAME_WIDTH, FRAME_HEIGHT);
            runtime.terminal.draw(&frame)?;
            dirty = false;
        }

        let Some(key) = runtime.terminal.read_key(KEY_POLL)? else {
            continue;
        };
        if let Some(command) = app.on_key(key) {
            match command {
                Command::Quit => return Ok(0),
                Command::Logout => {
                    runtime.session.clear()?;
                    let _ = event_log.info("logout", json!({}));
                    runtime.terminal.write_line("signed out")?;
                    return Ok(0);
                }
                Command::RefreshStatus => match runtime.status.machines(token) {
                    Ok(machines) => app.set_machines(machines),
                    Err(error) => app.set_notice(format!("status refresh failed: {error}")),
                },
                Command::Fetch(ticket) => {
                    issue_fetch(runtime, token, ticket, &tx, event_log);
                }
            }
        }
        dirty = true;
    }
}

fn issue_fetch(
    runtime: &ConsoleRuntime,
    token: &str,
    ticket: FetchTicket,
    tx: &UnboundedSender<PageDelivery>,
    event_log: &EventLog,
) {
    let _ = event_log.info(
        "fetch_issued",
        json!({
            "hostname": ticket.hostname,
            "page": ticket.page_index,
        }),
    );
    dispatch_fetch(runtime.logs.clone(), token.to_string(), ticket, tx.clone());
}

#[cfg(test)]
mod tests {
    use super::{Command, ConsoleApp, PageDisposition};
    use crate::errors::ConsoleError;
    use crate::types::{Machine, MachineStatus};

    fn machine(id: &str, name: &str) -> Machine {
        Machine {
            id: id.to_string(),
            name: name.to_string(),
            status: MachineStatus::Online,
            os: "debian 11".to_string(),
        }
    }

    fn app_with(machines: Vec<Machine>) -> ConsoleApp {
        ConsoleApp::new(machines, 2, 1, 1)
    }

    fn expect_fetch(command: Option<Command>) -> crate::pager::FetchTicket {
        match command {
            Some(Command::Fetch(ticket)) => ticket,
            other => panic!("expected fetch command, got {other:?}"),
        }
    }

    #[test]
    fn selecting_a_machine_eagerly_fetches_page_zero() {
        let mut app = app_with(vec![machine("m1", "db-1")]);
        let ticket = expect_fetch(app.select_cursor());
        assert_eq!(ticket.hostname, "db-1");
        assert_eq!(ticket.page_index, 0);
        assert!(app.fetch_in_flight());
    }

    #[test]
    fn first_page_bottom_anchors_and_older_page_preserves_the_anchor() {
        let mut app = app_with(vec![machine("m1", "db-1")]);
        let page0 = expect_fetch(app.select_cursor());

        let (disposition, follow_up) = app.on_page(
            &page0,
            Ok(vec!["line A".to_string(), "line B".to_string()]),
        );
        assert_eq!(disposition, PageDisposition::Applied);
        assert_eq!(app.visible_lines(), vec!["line A", "line B"]);

        // The pane is exactly full, so the sentinel is still visible and
        // the next older page is requested right away.
        let page1 = expect_fetch(follow_up);
        assert_eq!(page1.page_index, 1);

        let (disposition, _) = app.on_page(&page1, Ok(vec!["line X".to_string()]));
        assert_eq!(disposition, PageDisposition::Applied);
        // "line A" stays at the top of the window after the prepend.
        assert_eq!(app.visible_lines(), vec!["line A", "line B"]);

        app.on_key('k');
        assert_eq!(app.visible_lines(), vec!["line X", "line A"]);
    }

    #[test]
    fn redundant_scroll_triggers_issue_a_single_fetch() {
        let mut app = app_with(vec![machine("m1", "db-1")]);
        let page0 = expect_fetch(app.select_cursor());
        let (_, follow_up) = app.on_page(&page0, Ok(vec!["a".to_string(), "b".to_string()]));

        let ticket = expect_fetch(follow_up);
        assert_eq!(ticket.page_index, 1);
        assert!(app.on_key('k').is_none());
        assert!(app.on_key('k').is_none());
    }

    #[test]
    fn failure_reports_a_notice_and_the_next_trigger_retries_the_index() {
        let mut app = app_with(vec![machine("m1", "db-1")]);
        let page0 = expect_fetch(app.select_cursor());
        let (_, follow_up) = app.on_page(&page0, Ok(vec!["a".to_string(), "b".to_string()]));

        let ticket = expect_fetch(follow_up);
        let (disposition, follow_up) = app.on_page(
            &ticket,
            Err(ConsoleError::Transport("timed out".to_string())),
        );
        assert!(matches!(disposition, PageDisposition::Retryable(_)));
        assert!(follow_up.is_none());
        assert!(app.notice().is_some_and(|n| n.contains("timed out")));

        let retry = expect_fetch(app.on_key('k'));
        assert_eq!(retry.page_index, ticket.page_index);
    }

    #[test]
    fn switching_machines_discards_the_stale_completion() {
        let mut app = app_with(vec![machine("m1", "db-1"), machine("m2", "web-1")]);
        let stale = expect_fetch(app.select_cursor());

        app.on_key('n');
        let live = expect_fetch(app.select_cursor());
        assert_eq!(live.hostname, "web-1");

        let (disposition, _) = app.on_page(&stale, Ok(vec!["old line".to_string()]));
        assert_eq!(disposition, PageDisposition::Stale);
        assert!(app.visible_lines().is_empty());

        app.on_page(&live, Ok(vec!["fresh line".to_string()]));
        assert_eq!(app.visible_lines(), vec!["fresh line"]);
    }

    #[test]
    fn short_first_page_follows_up_until_the_pane_fills() {
        let mut app = app_with(vec![machine("m1", "db-1")]);
        let page0 = expect_fetch(app.select_cursor());

        // One line in a two-row pane leaves the sentinel visible.
        let (_, follow_up) = app.on_page(&page0, Ok(vec!["only line".to_string()]));
        let page1 = expect_fetch(follow_up);
        assert_eq!(page1.page_index, 1);

        // The pane overflows and the sentinel scrolls out of the window.
        let (_, follow_up) = app.on_page(
            &page1,
            Ok(vec!["older 1".to_string(), "older 2".to_string()]),
        );
        assert!(follow_up.is_none());
        assert_eq!(app.visible_lines(), vec!["older 2", "only line"]);
    }

    #[test]
    fn empty_page_defers_the_next_trigger_instead_of_stopping() {
        let mut app = app_with(vec![machine("m1", "db-1")]);
        let page0 = expect_fetch(app.select_cursor());
        let (_, follow_up) = app.on_page(&page0, Ok(vec!["a".to_string(), "b".to_string()]));

        let page1 = expect_fetch(follow_up);
        // Empty page: the immediate re-trigger is absorbed instead of
        // issuing another fetch, but the session is not locked out.
        let (_, follow_up) = app.on_page(&page1, Ok(vec![]));
        assert!(follow_up.is_none());

        let retry = expect_fetch(app.on_key('k'));
        assert_eq!(retry.page_index, 2);
    }

    #[test]
    fn status_refresh_drops_a_selection_that_disappeared() {
        let mut app = app_with(vec![machine("m1", "db-1"), machine("m2", "web-1")]);
        let ticket = expect_fetch(app.select_cursor());

        app.set_machines(vec![machine("m2", "web-1")]);
        assert!(app.selected_machine().is_none());

        let (disposition, _) = app.on_page(&ticket, Ok(vec!["late".to_string()]));
        assert_eq!(disposition, PageDisposition::Stale);
    }

    #[test]
    fn cursor_moves_clamp_to_the_machine_list() {
        let mut app = app_with(vec![machine("m1", "db-1"), machine("m2", "web-1")]);
        assert!(app.on_key('p').is_none());
        assert_eq!(app.cursor(), 0);
        app.on_key('n');
        app.on_key('n');
        assert_eq!(app.cursor(), 1);
    }

    #[test]
    fn quit_refresh_and_logout_map_to_commands() {
        let mut app = app_with(vec![machine("m1", "db-1")]);
        assert_eq!(app.on_key('q'), Some(Command::Quit));
        assert_eq!(app.on_key('r'), Some(Command::RefreshStatus));
        assert_eq!(app.on_key('x'), Some(Command::Logout));
        assert!(app.on_key('?').is_none());
    }
}
