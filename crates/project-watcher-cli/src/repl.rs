//! Interactive REPL for browsing a project's camera history.
//!
//! Launch with `project-watcher repl` to enter interactive mode.
//! Type `/help` for available commands, Tab for completion.

use std::path::PathBuf;

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use project_watcher::{MonitorConfig, Project};

use crate::inspect;

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/cameras", "List cameras in the project"),
    ("/history", "Show saved frames: /history <camera> [limit]"),
    ("/stable", "Show stable images: /stable <camera>"),
    ("/diff", "Compare two saved frames: /diff <camera> <a> <b>"),
    ("/project", "Switch to another project directory"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// Commands whose first argument is a camera name.
const CAMERA_COMMANDS: &[&str] = &["/history", "/stable", "/diff"];

/// REPL helper for tab completion.
struct WatcherHelper {
    root: PathBuf,
}

impl Completer for WatcherHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        // Camera name completion
        let parts: Vec<&str> = input.splitn(2, ' ').collect();
        let cmd = parts[0];
        let args = if parts.len() > 1 { parts[1] } else { "" };

        if CAMERA_COMMANDS.contains(&cmd) && !args.contains(' ') {
            let names: Vec<String> = Project::open(&self.root)
                .and_then(|p| p.discover())
                .map(|cameras| cameras.into_iter().map(|c| c.name).collect())
                .unwrap_or_default();
            let prefix_start = input.len() - args.len();
            let matches: Vec<Pair> = names
                .iter()
                .filter(|n| n.starts_with(args))
                .map(|n| Pair {
                    display: n.clone(),
                    replacement: format!("{n} "),
                })
                .collect();
            return Ok((prefix_start, matches));
        }

        Ok((pos, Vec::new()))
    }
}

impl Hinter for WatcherHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for WatcherHelper {}
impl Validator for WatcherHelper {}
impl Helper for WatcherHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Session state.
struct ReplState {
    project: Project,
    config: MonitorConfig,
}

/// Run the interactive REPL on `project`.
pub fn run(project: Project, config: MonitorConfig) -> anyhow::Result<()> {
    eprintln!(
        "project-watcher v{} on {}. Type /help for commands.",
        env!("CARGO_PKG_VERSION"),
        project.root().display()
    );

    let rl_config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<WatcherHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(rl_config)?;
    rl.set_helper(Some(WatcherHelper {
        root: project.root().to_path_buf(),
    }));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = PathBuf::from(&home).join(".project_watcher_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let mut state = ReplState { project, config };
    let prompt = " \x1b[36mwatcher>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let input = line.strip_prefix('/').unwrap_or(line);
                if input.is_empty() {
                    cmd_help();
                    continue;
                }

                let mut parts = input.splitn(2, ' ');
                let cmd = parts.next().unwrap_or("");
                let args = parts.next().unwrap_or("").trim();

                match cmd {
                    "exit" | "quit" => {
                        eprintln!("  Goodbye!");
                        break;
                    }
                    "help" | "h" | "?" => cmd_help(),
                    "cameras" => cmd_cameras(&state),
                    "history" => cmd_history(args, &state),
                    "stable" => cmd_stable(args, &state),
                    "diff" => cmd_diff(args, &state),
                    "project" => {
                        if let Some(root) = cmd_project(args, &mut state) {
                            if let Some(helper) = rl.helper_mut() {
                                helper.root = root;
                            }
                        }
                    }
                    _ => {
                        eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: Tab completion works for commands and camera names.");
    eprintln!();
}

fn cmd_cameras(state: &ReplState) {
    match inspect::list_cameras(&state.project) {
        Ok(cameras) if cameras.is_empty() => {
            eprintln!("  No cameras in {}", state.project.root().display());
        }
        Ok(cameras) => {
            eprintln!();
            for camera in &cameras {
                eprintln!(
                    "    {:<20} {:>6} saved {:>4} stable   {}",
                    camera.name, camera.entries, camera.stable, camera.moniker
                );
            }
            eprintln!();
        }
        Err(e) => eprintln!("  Cannot read project: {e}"),
    }
}

fn cmd_history(args: &str, state: &ReplState) {
    let mut words = args.split_whitespace();
    let Some(name) = words.next() else {
        eprintln!("  Usage: /history <camera> [limit]");
        return;
    };
    let limit = match words.next().map(str::parse::<usize>) {
        None => Some(20),
        Some(Ok(n)) => Some(n),
        Some(Err(_)) => {
            eprintln!("  Limit must be a number");
            return;
        }
    };

    match inspect::history(&state.project, name, limit) {
        Ok(lines) if lines.is_empty() => eprintln!("  No saved frames for '{name}'"),
        Ok(lines) => {
            eprintln!();
            for line in &lines {
                let mark = if line.stable { "  \x1b[32mstable\x1b[0m" } else { "" };
                eprintln!("    {}{mark}", line.filename);
            }
            eprintln!();
        }
        Err(e) => eprintln!("  {e}"),
    }
}

fn cmd_stable(args: &str, state: &ReplState) {
    if args.is_empty() {
        eprintln!("  Usage: /stable <camera>");
        return;
    }
    match inspect::stable_images(&state.project, args) {
        Ok(names) if names.is_empty() => eprintln!("  No stable images for '{args}'"),
        Ok(names) => {
            eprintln!();
            for name in &names {
                eprintln!("    {name}");
            }
            eprintln!();
        }
        Err(e) => eprintln!("  {e}"),
    }
}

fn cmd_diff(args: &str, state: &ReplState) {
    let words: Vec<&str> = args.split_whitespace().collect();
    let [camera, a, b] = words.as_slice() else {
        eprintln!("  Usage: /diff <camera> <a> <b>");
        return;
    };
    match inspect::diff(&state.project, camera, a, b, &state.config) {
        Ok(fraction) => eprintln!("  {a} vs {b}: {:.6}% changed", fraction * 100.0),
        Err(e) => eprintln!("  {e}"),
    }
}

fn cmd_project(args: &str, state: &mut ReplState) -> Option<PathBuf> {
    if args.is_empty() {
        eprintln!("  Project: {}", state.project.root().display());
        return None;
    }
    let root = PathBuf::from(args);
    if !root.is_dir() {
        eprintln!("  Not a directory: {args}");
        return None;
    }
    match Project::open(&root) {
        Ok(project) => {
            let count = project.discover().map(|c| c.len()).unwrap_or(0);
            eprintln!("  Loaded: {args} ({count} cameras)");
            state.project = project;
            Some(root)
        }
        Err(e) => {
            eprintln!("  Failed to load: {e}");
            None
        }
    }
}
