use crate::errors::ConsoleError;
use crate::types::Machine;
use serde::Deserialize;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, ConsoleError>;
    fn write_string(&self, path: &Path, contents: &str) -> Result<(), ConsoleError>;
    fn create_dir_all(&self, path: &Path) -> Result<(), ConsoleError>;
    fn remove_file(&self, path: &Path) -> Result<(), ConsoleError>;
    fn exists(&self, path: &Path) -> bool;
}

/// Holds the opaque session token between runs. Absent token means "do not
/// fetch", not an error.
pub trait SessionStore: Send + Sync {
    fn token(&self) -> Result<Option<String>, ConsoleError>;
    fn store(&self, token: &str) -> Result<(), ConsoleError>;
    fn clear(&self) -> Result<(), ConsoleError>;
}

pub trait StatusSource: Send + Sync {
    fn machines(&self, token: &str) -> Result<Vec<Machine>, ConsoleError>;
}

/// Retrieves one page of historical log lines. Page 0 is the newest chunk;
/// indexes grow toward older history.
pub trait LogFetcher: Send + Sync {
    fn fetch_page(
        &self,
        hostname: &str,
        page_index: usize,
        token: &str,
    ) -> Result<Vec<String>, ConsoleError>;
}

pub trait AuthClient: Send + Sync {
    fn login(&self, email: &str, password: &str) -> Result<String, ConsoleError>;
}

pub trait Terminal: Send + Sync {
    fn stdin_is_tty(&self) -> bool;
    fn write_line(&self, line: &str) -> Result<(), ConsoleError>;
    fn draw(&self, frame: &str) -> Result<(), ConsoleError>;
    fn read_key(&self, timeout: Duration) -> Result<Option<char>, ConsoleError>;
}

pub struct ConsoleRuntime {
    pub session: Arc<dyn SessionStore>,
    pub status: Arc<dyn StatusSource>,
    pub logs: Arc<dyn LogFetcher>,
    pub auth: Arc<dyn AuthClient>,
    pub terminal: Arc<dyn Terminal>,
}

impl ConsoleRuntime {
    pub fn new(base_url: &str, token_path: PathBuf) -> Self {
        let api = Arc::new(HttpApi::new(base_url));
        Self {
            session: Arc::new(FileSessionStore::new(
                Arc::new(ProductionFileSystem),
                token_path,
            )),
            status: api.clone(),
            logs: api.clone(),
            auth: api,
            terminal: Arc::new(ProductionTerminal),
        }
    }
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, ConsoleError> {
        std::fs::read_to_string(path).map_err(|e| ConsoleError::Io(e.to_string()))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), ConsoleError> {
        std::fs::write(path, contents).map_err(|e| ConsoleError::Io(e.to_string()))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), ConsoleError> {
        std::fs::create_dir_all(path).map_err(|e| ConsoleError::Io(e.to_string()))
    }

    fn remove_file(&self, path: &Path) -> Result<(), ConsoleError> {
        std::fs::remove_file(path).map_err(|e| ConsoleError::Io(e.to_string()))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Token persisted as a single line on disk, the terminal counterpart of the
/// browser's local-storage entry.
pub struct FileSessionStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: PathBuf) -> Self {
        Self { fs, path }
    }
}

impl SessionStore for FileSessionStore {
    fn token(&self) -> Result<Option<String>, ConsoleError> {
        if !self.fs.exists(&self.path) {
            return Ok(None);
        }
        let raw = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| ConsoleError::Session(e.to_string()))?;
        let token = raw.trim().to_string();
        Ok(if token.is_empty() { None } else { Some(token) })
    }

    fn store(&self, token: &str) -> Result<(), ConsoleError> {
        if let Some(parent) = self.path.parent() {
            self.fs
                .create_dir_all(parent)
                .map_err(|e| ConsoleError::Session(e.to_string()))?;
        }
        self.fs
            .write_string(&self.path, token)
            .map_err(|e| ConsoleError::Session(e.to_string()))
    }

    fn clear(&self) -> Result<(), ConsoleError> {
        if !self.fs.exists(&self.path) {
            return Ok(());
        }
        self.fs
            .remove_file(&self.path)
            .map_err(|e| ConsoleError::Session(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

pub struct HttpApi {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, ConsoleError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ConsoleError::Auth(format!("server rejected token ({status})")));
    }
    if !status.is_success() {
        return Err(ConsoleError::Transport(format!("http status {status}")));
    }
    Ok(response)
}

impl StatusSource for HttpApi {
    fn machines(&self, token: &str) -> Result<Vec<Machine>, ConsoleError> {
        let response = self
            .client
            .get(format!("{}/status", self.base_url))
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .map_err(|e| ConsoleError::Transport(e.to_string()))?;
        check_status(response)?
            .json::<Vec<Machine>>()
            .map_err(|e| ConsoleError::Transport(e.to_string()))
    }
}

impl LogFetcher for HttpApi {
    fn fetch_page(
        &self,
        hostname: &str,
        page_index: usize,
        token: &str,
    ) -> Result<Vec<String>, ConsoleError> {
        let response = self
            .client
            .get(format!("{}/logs", self.base_url))
            .query(&[("page", page_index.to_string().as_str()), ("hostname", hostname)])
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .map_err(|e| ConsoleError::Transport(e.to_string()))?;
        check_status(response)?
            .json::<Vec<String>>()
            .map_err(|e| ConsoleError::Transport(e.to_string()))
    }
}

impl AuthClient for HttpApi {
    fn login(&self, email: &str, password: &str) -> Result<String, ConsoleError> {
        let response = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .map_err(|e| ConsoleError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = match response.json::<ApiErrorBody>() {
                Ok(body) if body.error == "InvalidPassword" => "invalid password".to_string(),
                Ok(body) if body.error == "UserNotFound" => "invalid email".to_string(),
                Ok(body) => body.error,
                Err(_) => format!("http status {status}"),
            };
            return Err(ConsoleError::Auth(message));
        }
        response
            .json::<LoginResponse>()
            .map(|body| body.token)
            .map_err(|e| ConsoleError::Transport(e.to_string()))
    }
}

pub struct ProductionTerminal;

impl Terminal for ProductionTerminal {
    fn stdin_is_tty(&self) -> bool {
        std::io::IsTerminal::is_terminal(&std::io::stdin())
    }

    fn write_line(&self, line: &str) -> Result<(), ConsoleError> {
        use std::io::Write;
        let mut out = std::io::stdout();
        writeln!(out, "{line}").map_err(|e| ConsoleError::Io(e.to_string()))
    }

    fn draw(&self, frame: &str) -> Result<(), ConsoleError> {
        self.write_line(frame)
    }

    fn read_key(&self, timeout: Duration) -> Result<Option<char>, ConsoleError> {
        if !crossterm::event::poll(timeout).map_err(|e| ConsoleError::Io(e.to_string()))? {
            return Ok(None);
        }
        let event = crossterm::event::read().map_err(|e| ConsoleError::Io(e.to_string()))?;
        if let crossterm::event::Event::Key(key) = event {
            if key.kind == crossterm::event::KeyEventKind::Press {
                return Ok(match key.code {
                    crossterm::event::KeyCode::Char(c) => Some(c),
                    crossterm::event::KeyCode::Enter => Some('\n'),
                    _ => None,
                });
            }
        }
        Ok(None)
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    fail_next: Arc<Mutex<Option<ConsoleError>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let fs = Self::default();
        fs.files
            .lock()
            .expect("files lock")
            .insert(path.into(), contents.into());
        fs
    }

    pub fn set_fail_next(&self, error: ConsoleError) {
        *self.fail_next.lock().expect("fail lock") = Some(error);
    }

    fn maybe_fail(&self) -> Result<(), ConsoleError> {
        if let Some(error) = self.fail_next.lock().expect("fail lock").take() {
            return Err(error);
        }
        Ok(())
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, ConsoleError> {
        self.maybe_fail()?;
        self.files
            .lock()
            .expect("files lock")
            .get(path)
            .cloned()
            .ok_or_else(|| ConsoleError::Io(format!("missing file {}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), ConsoleError> {
        self.maybe_fail()?;
        self.files
            .lock()
            .expect("files lock")
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn create_dir_all(&self, _path: &Path) -> Result<(), ConsoleError> {
        self.maybe_fail()
    }

    fn remove_file(&self, path: &Path) -> Result<(), ConsoleError> {
        self.maybe_fail()?;
        self.files.lock().expect("files lock").remove(path);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("files lock").contains_key(path)
    }
}

#[derive(Default, Clone)]
pub struct FakeSessionStore {
    token: Arc<Mutex<Option<String>>>,
}

impl FakeSessionStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token.into()))),
        }
    }
}

impl SessionStore for FakeSessionStore {
    fn token(&self) -> Result<Option<String>, ConsoleError> {
        Ok(self.token.lock().expect("token lock").clone())
    }

    fn store(&self, token: &str) -> Result<(), ConsoleError> {
        *self.token.lock().expect("token lock") = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ConsoleError> {
        *self.token.lock().expect("token lock") = None;
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct FakeStatusSource {
    machines: Arc<Mutex<Vec<Machine>>>,
    fail_next: Arc<Mutex<Option<ConsoleError>>>,
}

impl FakeStatusSource {
    pub fn with_machines(machines: Vec<Machine>) -> Self {
        Self {
            machines: Arc::new(Mutex::new(machines)),
            fail_next: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_fail_next(&self, error: ConsoleError) {
        *self.fail_next.lock().expect("fail lock") = Some(error);
    }
}

impl StatusSource for FakeStatusSource {
    fn machines(&self, _token: &str) -> Result<Vec<Machine>, ConsoleError> {
        if let Some(error) = self.fail_next.lock().expect("fail lock").take() {
            return Err(error);
        }
        Ok(self.machines.lock().expect("machines lock").clone())
    }
}

#[derive(Default, Clone)]
pub struct FakeLogFetcher {
    responses: Arc<Mutex<Vec<Result<Vec<String>, ConsoleError>>>>,
    requests: Arc<Mutex<Vec<(String, usize)>>>,
}

impl FakeLogFetcher {
    pub fn push_response(&self, response: Result<Vec<String>, ConsoleError>) {
        self.responses.lock().expect("responses lock").push(response);
    }

    pub fn push_page(&self, lines: &[&str]) {
        self.push_response(Ok(lines.iter().map(|s| s.to_string()).collect()));
    }

    pub fn requests(&self) -> Vec<(String, usize)> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl LogFetcher for FakeLogFetcher {
    fn fetch_page(
        &self,
        hostname: &str,
        page_index: usize,
        _token: &str,
    ) -> Result<Vec<String>, ConsoleError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push((hostname.to_string(), page_index));
        let mut responses = self.responses.lock().expect("responses lock");
        if responses.is_empty() {
            return Err(ConsoleError::Transport("no fake page queued".to_string()));
        }
        responses.remove(0)
    }
}

#[derive(Default, Clone)]
pub struct FakeAuthClient {
    responses: Arc<Mutex<Vec<Result<String, ConsoleError>>>>,
    logins: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeAuthClient {
    pub fn push_response(&self, response: Result<String, ConsoleError>) {
        self.responses.lock().expect("responses lock").push(response);
    }

    pub fn logins(&self) -> Vec<(String, String)> {
        self.logins.lock().expect("logins lock").clone()
    }
}

impl AuthClient for FakeAuthClient {
    fn login(&self, email: &str, password: &str) -> Result<String, ConsoleError> {
        self.logins
            .lock()
            .expect("logins lock")
            .push((email.to_string(), password.to_string()));
        let mut responses = self.responses.lock().expect("responses lock");
        if responses.is_empty() {
            return Err(ConsoleError::Transport("no fake login queued".to_string()));
        }
        responses.remove(0)
    }
}

#[derive(Default, Clone)]
pub struct FakeTerminal {
    pub is_tty: bool,
    writes: Arc<Mutex<Vec<String>>>,
    draws: Arc<Mutex<Vec<String>>>,
    keys: Arc<Mutex<VecDeque<char>>>,
}

impl FakeTerminal {
    pub fn new(is_tty: bool) -> Self {
        Self {
            is_tty,
            ..Self::default()
        }
    }

    pub fn queue_key(&self, key: char) {
        self.keys.lock().expect("keys lock").push_back(key);
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.writes.lock().expect("writes lock").clone()
    }

    pub fn drawn_frames(&self) -> Vec<String> {
        self.draws.lock().expect("draws lock").clone()
    }
}

impl Terminal for FakeTerminal {
    fn stdin_is_tty(&self) -> bool {
        self.is_tty
    }

    fn write_line(&self, line: &str) -> Result<(), ConsoleError> {
        self.writes
            .lock()
            .expect("writes lock")
            .push(line.to_string());
        Ok(())
    }

    fn draw(&self, frame: &str) -> Result<(), ConsoleError> {
        self.draws
            .lock()
            .expect("draws lock")
            .push(frame.to_string());
        Ok(())
    }

    fn read_key(&self, _timeout: Duration) -> Result<Option<char>, ConsoleError> {
        Ok(self.keys.lock().expect("keys lock").pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FakeFileSystem, FakeLogFetcher, FileSessionStore, FileSystem, LogFetcher,
        ProductionFileSystem, SessionStore,
    };
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    #[test]
    fn file_session_store_round_trips_the_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSessionStore::new(
            Arc::new(ProductionFileSystem),
            dir.path().join("state").join("token"),
        );

        assert_eq!(store.token().expect("read"), None);
        store.store("tok-123").expect("store");
        assert_eq!(store.token().expect("read"), Some("tok-123".to_string()));
        store.clear().expect("clear");
        assert_eq!(store.token().expect("read"), None);
        // Clearing twice is fine.
        store.clear().expect("clear again");
    }

    #[test]
    fn file_session_store_treats_blank_files_as_absent() {
        let store = FileSessionStore::new(
            Arc::new(FakeFileSystem::with_file("/state/token", "  \n")),
            PathBuf::from("/state/token"),
        );
        assert_eq!(store.token().expect("read"), None);
    }

    #[test]
    fn fake_file_system_replays_contents_and_honors_fail_next() {
        let fs = FakeFileSystem::with_file("/etc/innsight.toml", "[server]\n");
        assert!(fs.exists(Path::new("/etc/innsight.toml")));
        assert_eq!(
            fs.read_to_string(Path::new("/etc/innsight.toml")).expect("read"),
            "[server]\n"
        );
        assert!(fs.read_to_string(Path::new("/missing")).is_err());

        fs.set_fail_next(crate::errors::ConsoleError::Io("disk gone".to_string()));
        assert!(fs.read_to_string(Path::new("/etc/innsight.toml")).is_err());
    }

    #[test]
    fn fake_fetcher_replays_queued_pages_and_records_requests() {
        let fetcher = FakeLogFetcher::default();
        fetcher.push_page(&["newest"]);

        let page = fetcher.fetch_page("db-1", 0, "tok").expect("page");
        assert_eq!(page, vec!["newest".to_string()]);
        assert!(fetcher.fetch_page("db-1", 1, "tok").is_err());
        assert_eq!(
            fetcher.requests(),
            vec![("db-1".to_string(), 0), ("db-1".to_string(), 1)]
        );
    }
}
