use crate::errors::CerveauError;
use crate::github::{HttpTransport, ReqwestTransport};
use crate::hotkeys::QUIT_KEY;
use crate::metrics::{MetricsProvider, SysinfoMetrics};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, SystemTime};

/// How a spawned child is wired to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// stdout/stderr are collected and returned in [`ProcessOutput`].
    Captured,
    /// The child inherits the controlling terminal; nothing is collected.
    Inherited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdio: StdioMode,
}

impl ProcessRequest {
    pub fn captured(program: &str, args: &[&str], cwd: &Path) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            cwd: Some(cwd.to_path_buf()),
            stdio: StdioMode::Captured,
        }
    }

    pub fn shell(script: &str, cwd: &Path) -> Self {
        Self {
            program: "sh".to_string(),
            args: vec!["-lc".to_string(), script.to_string()],
            cwd: Some(cwd.to_path_buf()),
            stdio: StdioMode::Inherited,
        }
    }

    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(stdout: &str) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

pub trait ProcessRunner: Send + Sync {
    fn spawn(&self, request: ProcessRequest) -> Result<u64, CerveauError>;
    /// Blocks until the child identified by `handle` exits.
    fn wait(&self, handle: u64) -> Result<ProcessOutput, CerveauError>;

    fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, CerveauError> {
        let handle = self.spawn(request)?;
        self.wait(handle)
    }
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, CerveauError>;
    fn write_string(&self, path: &Path, contents: &str) -> Result<(), CerveauError>;
    fn create_dir_all(&self, path: &Path) -> Result<(), CerveauError>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    /// Direct children of `path`, files and directories alike, in no particular order.
    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, CerveauError>;
}

/// Output sink and key source for the dashboard.
pub trait Terminal: Send + Sync {
    fn stdin_is_tty(&self) -> bool;
    fn write_line(&self, line: &str) -> Result<(), CerveauError>;
    fn draw(&self, frame: &str) -> Result<(), CerveauError>;
    fn size(&self) -> (u16, u16);
    /// Blocks for exactly one key. `None` means nothing actionable was typed.
    fn read_key(&self) -> Result<Option<char>, CerveauError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ProductionClock;

impl Clock for ProductionClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, CerveauError> {
        std::fs::read_to_string(path)
            .map_err(|e| CerveauError::Io(format!("{}: {e}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), CerveauError> {
        std::fs::write(path, contents)
            .map_err(|e| CerveauError::Io(format!("{}: {e}", path.display())))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), CerveauError> {
        std::fs::create_dir_all(path)
            .map_err(|e| CerveauError::Io(format!("{}: {e}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, CerveauError> {
        let entries = std::fs::read_dir(path)
            .map_err(|e| CerveauError::Io(format!("{}: {e}", path.display())))?;
        Ok(entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect())
    }
}

/// Set while cerveau should die on SIGINT/SIGQUIT the way an unhandled
/// process would. Cleared while an inherited child owns the terminal.
fn interrupt_terminates() -> Option<&'static Arc<AtomicBool>> {
    static FLAG: OnceLock<Option<Arc<AtomicBool>>> = OnceLock::new();
    FLAG.get_or_init(|| {
        use signal_hook::consts::{SIGINT, SIGQUIT};
        let flag = Arc::new(AtomicBool::new(true));
        for signal in [SIGINT, SIGQUIT] {
            signal_hook::flag::register_conditional_default(signal, Arc::clone(&flag)).ok()?;
        }
        Some(flag)
    })
    .as_ref()
}

/// Keeps terminal interrupts away from cerveau while an inherited child runs.
///
/// The handler is a real function rather than `SIG_IGN`, so exec resets it in
/// the child and Ctrl-C still stops the action.
struct TerminalHandoff {
    flag: Option<&'static Arc<AtomicBool>>,
}

impl TerminalHandoff {
    fn begin() -> Self {
        let flag = interrupt_terminates();
        if let Some(flag) = flag {
            flag.store(false, Ordering::SeqCst);
        }
        Self { flag }
    }
}

impl Drop for TerminalHandoff {
    fn drop(&mut self) {
        if let Some(flag) = self.flag {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

struct RunningChild {
    child: std::process::Child,
    stdio: StdioMode,
    _handoff: Option<TerminalHandoff>,
}

#[derive(Default)]
struct ProcessState {
    next_handle: u64,
    children: HashMap<u64, RunningChild>,
}

pub struct ProductionProcessRunner {
    state: Mutex<ProcessState>,
}

impl ProductionProcessRunner {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProcessState::default()),
        }
    }
}

impl Default for ProductionProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner for ProductionProcessRunner {
    fn spawn(&self, request: ProcessRequest) -> Result<u64, CerveauError> {
        let mut cmd = std::process::Command::new(&request.program);
        cmd.args(&request.args);
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        match request.stdio {
            StdioMode::Captured => {
                cmd.stdin(std::process::Stdio::null())
                    .stdout(std::process::Stdio::piped())
                    .stderr(std::process::Stdio::piped());
            }
            StdioMode::Inherited => {
                cmd.stdin(std::process::Stdio::inherit())
                    .stdout(std::process::Stdio::inherit())
                    .stderr(std::process::Stdio::inherit());
            }
        }

        let handoff = (request.stdio == StdioMode::Inherited).then(TerminalHandoff::begin);
        let child = cmd
            .spawn()
            .map_err(|e| CerveauError::Process(format!("{}: {e}", request.program)))?;
        let mut state = lock(&self.state);
        let handle = state.next_handle;
        state.next_handle += 1;
        state.children.insert(
            handle,
            RunningChild {
                child,
                stdio: request.stdio,
                _handoff: handoff,
            },
        );
        Ok(handle)
    }

    fn wait(&self, handle: u64) -> Result<ProcessOutput, CerveauError> {
        let entry = lock(&self.state).children.remove(&handle);
        let RunningChild {
            mut child,
            stdio,
            _handoff,
        } = entry.ok_or_else(|| CerveauError::Process(format!("unknown handle {handle}")))?;
        match stdio {
            StdioMode::Captured => {
                let output = child
                    .wait_with_output()
                    .map_err(|e| CerveauError::Process(e.to_string()))?;
                Ok(ProcessOutput {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                })
            }
            StdioMode::Inherited => {
                let status = child
                    .wait()
                    .map_err(|e| CerveauError::Process(e.to_string()))?;
                Ok(ProcessOutput {
                    exit_code: status.code().unwrap_or(-1),
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
        }
    }
}

const FALLBACK_SIZE: (u16, u16) = (120, 40);

pub struct ProductionTerminal;

impl ProductionTerminal {
    fn read_raw_key(&self) -> Result<Option<char>, CerveauError> {
        use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

        crossterm::terminal::enable_raw_mode()
            .map_err(|e| CerveauError::Terminal(e.to_string()))?;
        let result = loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    break Ok(match key.code {
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            Some(QUIT_KEY)
                        }
                        KeyCode::Char(c) => Some(c),
                        KeyCode::Esc => Some(QUIT_KEY),
                        KeyCode::Down => Some('j'),
                        KeyCode::Up => Some('k'),
                        _ => None,
                    });
                }
                Ok(_) => continue,
                Err(e) => break Err(CerveauError::Terminal(e.to_string())),
            }
        };
        // Children spawned after this point must see a cooked terminal.
        let _ = crossterm::terminal::disable_raw_mode();
        result
    }

    fn read_line_key(&self) -> Result<Option<char>, CerveauError> {
        let mut line = String::new();
        let read = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| CerveauError::Terminal(e.to_string()))?;
        if read == 0 {
            return Ok(Some(QUIT_KEY));
        }
        Ok(Some(line.trim().chars().next().unwrap_or(QUIT_KEY)))
    }
}

impl Terminal for ProductionTerminal {
    fn stdin_is_tty(&self) -> bool {
        std::io::IsTerminal::is_terminal(&std::io::stdin())
    }

    fn write_line(&self, line: &str) -> Result<(), CerveauError> {
        let mut out = std::io::stdout();
        writeln!(out, "{line}").map_err(|e| CerveauError::Io(e.to_string()))?;
        out.flush().map_err(|e| CerveauError::Io(e.to_string()))
    }

    fn draw(&self, frame: &str) -> Result<(), CerveauError> {
        use crossterm::cursor::MoveTo;
        use crossterm::terminal::{Clear, ClearType};

        let mut out = std::io::stdout();
        if self.stdin_is_tty() {
            crossterm::execute!(out, Clear(ClearType::All), MoveTo(0, 0))
                .map_err(|e| CerveauError::Terminal(e.to_string()))?;
        }
        out.write_all(frame.as_bytes())
            .map_err(|e| CerveauError::Io(e.to_string()))?;
        // Frames end on their last row; piped output still needs a separator.
        if !self.stdin_is_tty() {
            out.write_all(b"\n")
                .map_err(|e| CerveauError::Io(e.to_string()))?;
        }
        out.flush().map_err(|e| CerveauError::Io(e.to_string()))
    }

    fn size(&self) -> (u16, u16) {
        crossterm::terminal::size().unwrap_or(FALLBACK_SIZE)
    }

    fn read_key(&self) -> Result<Option<char>, CerveauError> {
        if self.stdin_is_tty() {
            self.read_raw_key()
        } else {
            self.read_line_key()
        }
    }
}

pub struct Runtime {
    pub clock: Arc<dyn Clock>,
    pub file_system: Arc<dyn FileSystem>,
    pub process_runner: Arc<dyn ProcessRunner>,
    pub terminal: Arc<dyn Terminal>,
    pub metrics: Arc<dyn MetricsProvider>,
    pub http: Arc<dyn HttpTransport>,
}

impl Runtime {
    pub fn production() -> Self {
        Self {
            clock: Arc::new(ProductionClock),
            file_system: Arc::new(ProductionFileSystem),
            process_runner: Arc::new(ProductionProcessRunner::new()),
            terminal: Arc::new(ProductionTerminal),
            metrics: Arc::new(SysinfoMetrics::new()),
            http: Arc::new(ReqwestTransport),
        }
    }
}

#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<SystemTime>>,
}

impl FakeClock {
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *lock(&self.now)
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    dirs: Arc<Mutex<HashSet<PathBuf>>>,
    fail_next: Arc<Mutex<Option<CerveauError>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let fs = Self::default();
        lock(&fs.files).insert(path.into(), contents.into());
        fs
    }

    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        lock(&self.dirs).insert(path.into());
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        lock(&self.files).insert(path.into(), contents.into());
    }

    pub fn file(&self, path: &Path) -> Option<String> {
        lock(&self.files).get(path).cloned()
    }

    pub fn set_fail_next(&self, error: CerveauError) {
        *lock(&self.fail_next) = Some(error);
    }

    fn maybe_fail(&self) -> Result<(), CerveauError> {
        if let Some(err) = lock(&self.fail_next).take() {
            return Err(err);
        }
        Ok(())
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, CerveauError> {
        self.maybe_fail()?;
        lock(&self.files)
            .get(path)
            .cloned()
            .ok_or_else(|| CerveauError::Io(format!("missing file {}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), CerveauError> {
        self.maybe_fail()?;
        lock(&self.files).insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), CerveauError> {
        self.maybe_fail()?;
        lock(&self.dirs).insert(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path) || lock(&self.dirs).contains(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        lock(&self.dirs).contains(path)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, CerveauError> {
        self.maybe_fail()?;
        if !self.is_dir(path) {
            return Err(CerveauError::Io(format!("missing dir {}", path.display())));
        }
        let mut children = lock(&self.dirs)
            .iter()
            .chain(lock(&self.files).keys())
            .filter(|child| child.parent() == Some(path))
            .cloned()
            .collect::<Vec<_>>();
        children.sort();
        children.dedup();
        Ok(children)
    }
}

#[derive(Default, Clone)]
pub struct FakeTerminal {
    pub is_tty: bool,
    keys: Arc<Mutex<VecDeque<Option<char>>>>,
    writes: Arc<Mutex<Vec<String>>>,
    draws: Arc<Mutex<Vec<String>>>,
}

impl FakeTerminal {
    pub fn new(is_tty: bool) -> Self {
        Self {
            is_tty,
            ..Self::default()
        }
    }

    /// Scripts the keys returned by `read_key`; once drained it behaves like EOF.
    pub fn with_keys(keys: &[char]) -> Self {
        let terminal = Self::new(true);
        lock(&terminal.keys).extend(keys.iter().copied().map(Some));
        terminal
    }

    pub fn push_key(&self, key: Option<char>) {
        lock(&self.keys).push_back(key);
    }

    pub fn written_lines(&self) -> Vec<String> {
        lock(&self.writes).clone()
    }

    pub fn drawn_frames(&self) -> Vec<String> {
        lock(&self.draws).clone()
    }
}

impl Terminal for FakeTerminal {
    fn stdin_is_tty(&self) -> bool {
        self.is_tty
    }

    fn write_line(&self, line: &str) -> Result<(), CerveauError> {
        lock(&self.writes).push(line.to_string());
        Ok(())
    }

    fn draw(&self, frame: &str) -> Result<(), CerveauError> {
        lock(&self.draws).push(frame.to_string());
        Ok(())
    }

    fn size(&self) -> (u16, u16) {
        FALLBACK_SIZE
    }

    fn read_key(&self) -> Result<Option<char>, CerveauError> {
        Ok(lock(&self.keys).pop_front().unwrap_or(Some(QUIT_KEY)))
    }
}

/// Records every spawn and wait; responses are consumed in FIFO order.
#[derive(Default, Clone)]
pub struct FakeProcessRunner {
    responses: Arc<Mutex<VecDeque<Result<ProcessOutput, CerveauError>>>>,
    spawned: Arc<Mutex<Vec<ProcessRequest>>>,
    waits: Arc<Mutex<Vec<u64>>>,
    next_handle: Arc<Mutex<u64>>,
}

impl FakeProcessRunner {
    pub fn push_response(&self, output: Result<ProcessOutput, CerveauError>) {
        lock(&self.responses).push_back(output);
    }

    pub fn spawned(&self) -> Vec<ProcessRequest> {
        lock(&self.spawned).clone()
    }

    pub fn waits(&self) -> Vec<u64> {
        lock(&self.waits).clone()
    }
}

impl ProcessRunner for FakeProcessRunner {
    fn spawn(&self, request: ProcessRequest) -> Result<u64, CerveauError> {
        lock(&self.spawned).push(request);
        let mut next = lock(&self.next_handle);
        let handle = *next;
        *next += 1;
        Ok(handle)
    }

    fn wait(&self, handle: u64) -> Result<ProcessOutput, CerveauError> {
        lock(&self.waits).push(handle);
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Err(CerveauError::Process("no fake response queued".to_string())))
    }
}
