//! Command Router
//!
//! Parses an input line and resolves it against the global commands and the
//! two per-mode command tables.

use std::collections::HashMap;
use std::path::Path;

use folkadb_core::{Result, ShellError};
use folkadb_device_bridge::DeviceMode;

/// One input line: lower-cased name plus the untouched remainder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: String,
}

impl Command {
    /// Split a line at the first whitespace. `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (name, args) = match line.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (line, ""),
        };
        Some(Self {
            name: name.to_lowercase(),
            args: args.to_string(),
        })
    }
}

/// Whether the console keeps reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Operation behind a table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Devices,
    Select,
    Info,
    Reboot,
    // bridge
    Push,
    Pull,
    Ls,
    Rm,
    Mkdir,
    Shell,
    Sudo,
    Install,
    Uninstall,
    Dli,
    Shizuku,
    // bootloader
    Flash,
    Erase,
    Format,
    Unlock,
    Lock,
    Wipe,
    Oem,
    Getvar,
    Activate,
}

/// Table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub action: Action,
    /// A device must be selected in the table's mode
    pub needs_device: bool,
    /// Needs operator confirmation before running
    pub destructive: bool,
}

impl Descriptor {
    const fn plain(action: Action) -> Self {
        Self {
            action,
            needs_device: false,
            destructive: false,
        }
    }

    const fn device(action: Action) -> Self {
        Self {
            action,
            needs_device: true,
            destructive: false,
        }
    }

    const fn destructive(action: Action) -> Self {
        Self {
            action,
            needs_device: true,
            destructive: true,
        }
    }
}

/// Commands handled the same way in both modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Global {
    Help,
    Version,
    Exit,
    Reboot,
    Clear,
}

/// Where a command line ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Global(Global, String),
    Table {
        mode: DeviceMode,
        descriptor: Descriptor,
        args: String,
    },
}

/// Name to descriptor map for one mode
#[derive(Debug)]
pub struct CommandTable {
    mode: DeviceMode,
    entries: HashMap<&'static str, Descriptor>,
}

impl CommandTable {
    pub fn bridge() -> Self {
        use Action::*;
        let entries = [
            ("devices", Descriptor::plain(Devices)),
            ("dev", Descriptor::plain(Devices)),
            ("select", Descriptor::plain(Select)),
            ("info", Descriptor::device(Info)),
            ("reboot", Descriptor::device(Reboot)),
            ("push", Descriptor::device(Push)),
            ("pull", Descriptor::device(Pull)),
            ("ls", Descriptor::device(Ls)),
            ("rm", Descriptor::device(Rm)),
            ("mkdir", Descriptor::device(Mkdir)),
            ("shell", Descriptor::device(Shell)),
            ("sudo", Descriptor::device(Sudo)),
            ("install", Descriptor::device(Install)),
            ("uninstall", Descriptor::device(Uninstall)),
            ("dli", Descriptor::device(Dli)),
            ("shizuku", Descriptor::device(Shizuku)),
        ];
        Self {
            mode: DeviceMode::Bridge,
            entries: entries.into_iter().collect(),
        }
    }

    pub fn bootloader() -> Self {
        use Action::*;
        let entries = [
            ("devices", Descriptor::plain(Devices)),
            ("dev", Descriptor::plain(Devices)),
            ("select", Descriptor::plain(Select)),
            ("info", Descriptor::device(Info)),
            // picks the first device itself when none is selected
            ("reboot", Descriptor::plain(Reboot)),
            ("flash", Descriptor::destructive(Flash)),
            ("erase", Descriptor::destructive(Erase)),
            ("format", Descriptor::destructive(Format)),
            ("unlock", Descriptor::destructive(Unlock)),
            ("lock", Descriptor::destructive(Lock)),
            ("wipe", Descriptor::destructive(Wipe)),
            ("oem", Descriptor::device(Oem)),
            ("getvar", Descriptor::device(Getvar)),
            ("activate", Descriptor::device(Activate)),
        ];
        Self {
            mode: DeviceMode::Bootloader,
            entries: entries.into_iter().collect(),
        }
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn get(&self, name: &str) -> Option<Descriptor> {
        self.entries.get(name).copied()
    }

    /// Command names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn route(&self, name: &str, args: &str) -> Option<Route> {
        self.get(name).map(|descriptor| Route::Table {
            mode: self.mode,
            descriptor,
            args: args.to_string(),
        })
    }
}

/// Resolves command lines; holds no session state
#[derive(Debug)]
pub struct Router {
    bridge: CommandTable,
    bootloader: CommandTable,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            bridge: CommandTable::bridge(),
            bootloader: CommandTable::bootloader(),
        }
    }

    pub fn table(&self, mode: DeviceMode) -> &CommandTable {
        match mode {
            DeviceMode::Bridge => &self.bridge,
            DeviceMode::Bootloader => &self.bootloader,
        }
    }

    /// Resolve `command` given the currently active mode
    pub fn resolve(&self, command: &Command, active: DeviceMode) -> Result<Route> {
        let name = command.name.as_str();
        let args = command.args.as_str();

        match name {
            "help" | "?" => return Ok(Route::Global(Global::Help, args.to_string())),
            "version" => return Ok(Route::Global(Global::Version, args.to_string())),
            "exit" | "quit" => return Ok(Route::Global(Global::Exit, args.to_string())),
            "reboot" => return Ok(Route::Global(Global::Reboot, args.to_string())),
            "cls" | "clear" => return Ok(Route::Global(Global::Clear, args.to_string())),
            "adb" => return self.resolve_prefixed(DeviceMode::Bridge, args),
            "fastboot" => return self.resolve_prefixed(DeviceMode::Bootloader, args),
            _ => {}
        }

        if let Some(route) = self.table(active).route(name, args) {
            return Ok(route);
        }

        if let Some(sub) = name.strip_prefix("fb_") {
            if let Some(route) = self.bootloader.route(sub, args) {
                return Ok(route);
            }
        }

        self.bridge
            .route(name, args)
            .or_else(|| self.bootloader.route(name, args))
            .ok_or_else(|| ShellError::UnknownCommand(command.name.clone()))
    }

    fn resolve_prefixed(&self, mode: DeviceMode, args: &str) -> Result<Route> {
        let table = self.table(mode);
        let Some(sub) = Command::parse(args) else {
            return Err(ShellError::usage(format!(
                "{} <command> [args...]; commands: {}",
                mode,
                table.names().join(", ")
            )));
        };
        table
            .route(&sub.name, &sub.args)
            .ok_or_else(|| ShellError::UnknownCommand(format!("{} {}", mode, sub.name)))
    }
}

/// Split arguments on whitespace, keeping double-quoted runs together
pub fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in args.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    out.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        out.push(current);
    }
    out
}

/// Paths from a line of dropped files, or `None` for an ordinary command line.
///
/// A drop starts with a quote, a slash or a drive letter and mentions `.apk`.
pub fn dropped_paths(line: &str) -> Option<Vec<String>> {
    let line = line.trim_start();
    let mut chars = line.chars();
    let looks_like_path = match (chars.next(), chars.next(), chars.next()) {
        (Some('"' | '/' | '\\'), _, _) => true,
        (Some(drive), Some(':'), Some('/' | '\\')) => drive.is_ascii_alphabetic(),
        _ => false,
    };
    if !looks_like_path || !line.to_ascii_lowercase().contains(".apk") {
        return None;
    }
    Some(split_args(line))
}

pub fn is_apk(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("apk"))
}

/// Number of APKs in a line of dropped files
pub fn dropped_apk_count(line: &str) -> usize {
    dropped_paths(line)
        .map(|paths| paths.iter().filter(|p| is_apk(p)).count())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(router: &Router, line: &str, active: DeviceMode) -> Result<Route> {
        router.resolve(&Command::parse(line).unwrap(), active)
    }

    fn routed(route: Route) -> (DeviceMode, Action, String) {
        match route {
            Route::Table {
                mode,
                descriptor,
                args,
            } => (mode, descriptor.action, args),
            other => panic!("expected table route, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_command() {
        let cmd = Command::parse("  PUSH  my file.txt  /sdcard/ ").unwrap();
        assert_eq!(cmd.name, "push");
        assert_eq!(cmd.args, "my file.txt  /sdcard/");
        assert_eq!(Command::parse("   "), None);
        assert_eq!(Command::parse("ls").unwrap().args, "");
    }

    #[test]
    fn test_active_mode_wins_collisions() {
        let router = Router::new();
        let (mode, action, _) = routed(resolve(&router, "info", DeviceMode::Bootloader).unwrap());
        assert_eq!((mode, action), (DeviceMode::Bootloader, Action::Info));

        let (mode, _, _) = routed(resolve(&router, "devices", DeviceMode::Bridge).unwrap());
        assert_eq!(mode, DeviceMode::Bridge);
    }

    #[test]
    fn test_fallback_to_other_table() {
        let router = Router::new();
        let (mode, action, args) = routed(resolve(&router, "ls /data", DeviceMode::Bootloader).unwrap());
        assert_eq!((mode, action, args.as_str()), (DeviceMode::Bridge, Action::Ls, "/data"));

        let (mode, action, _) = routed(resolve(&router, "getvar all", DeviceMode::Bridge).unwrap());
        assert_eq!((mode, action), (DeviceMode::Bootloader, Action::Getvar));
    }

    #[test]
    fn test_explicit_prefix() {
        let router = Router::new();
        let (mode, action, args) =
            routed(resolve(&router, "fastboot Select 1", DeviceMode::Bridge).unwrap());
        assert_eq!((mode, action, args.as_str()), (DeviceMode::Bootloader, Action::Select, "1"));

        let (mode, action, _) = routed(resolve(&router, "adb reboot recovery", DeviceMode::Bootloader).unwrap());
        assert_eq!((mode, action), (DeviceMode::Bridge, Action::Reboot));

        let (mode, action, _) = routed(resolve(&router, "fb_info", DeviceMode::Bridge).unwrap());
        assert_eq!((mode, action), (DeviceMode::Bootloader, Action::Info));
    }

    #[test]
    fn test_prefix_errors() {
        let router = Router::new();
        assert!(matches!(
            resolve(&router, "adb", DeviceMode::Bridge),
            Err(ShellError::InvalidArguments { .. })
        ));
        assert!(matches!(
            resolve(&router, "adb flash boot x.img", DeviceMode::Bridge),
            Err(ShellError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_globals_bypass_tables() {
        let router = Router::new();
        assert_eq!(
            resolve(&router, "reboot bootloader", DeviceMode::Bootloader).unwrap(),
            Route::Global(Global::Reboot, "bootloader".into())
        );
        assert_eq!(
            resolve(&router, "QUIT", DeviceMode::Bridge).unwrap(),
            Route::Global(Global::Exit, String::new())
        );
        assert_eq!(
            resolve(&router, "?", DeviceMode::Bridge).unwrap(),
            Route::Global(Global::Help, String::new())
        );
    }

    #[test]
    fn test_unknown_command() {
        let router = Router::new();
        let err = resolve(&router, "frobnicate", DeviceMode::Bridge).unwrap_err();
        assert_eq!(err.kind(), "unknown-command");
    }

    #[test]
    fn test_destructive_flags() {
        let table = CommandTable::bootloader();
        for name in ["flash", "erase", "format", "unlock", "lock", "wipe"] {
            let d = table.get(name).unwrap();
            assert!(d.destructive && d.needs_device, "{name}");
        }
        assert!(!table.get("getvar").unwrap().destructive);
        assert!(CommandTable::bridge().names().iter().all(|n| !CommandTable::bridge().get(n).unwrap().destructive));
    }

    #[test]
    fn test_split_args() {
        assert_eq!(split_args("a  b"), ["a", "b"]);
        assert_eq!(split_args("\"my file.txt\" /sdcard/"), ["my file.txt", "/sdcard/"]);
        assert_eq!(split_args("\"\" x"), ["", "x"]);
        assert!(split_args("   ").is_empty());
    }

    #[test]
    fn test_dropped_paths() {
        assert_eq!(
            dropped_paths("\"/home/me/My Apps/a.apk\" /tmp/b.APK /tmp/notes.txt").unwrap(),
            ["/home/me/My Apps/a.apk", "/tmp/b.APK", "/tmp/notes.txt"]
        );
        assert_eq!(dropped_paths("C:\\Users\\me\\app.apk").unwrap(), ["C:\\Users\\me\\app.apk"]);
        assert_eq!(dropped_paths("install /tmp/a.apk"), None);
        assert_eq!(dropped_paths("/tmp/image.img"), None);
        assert_eq!(dropped_paths("ls"), None);
    }

    #[test]
    fn test_dropped_apk_count() {
        assert_eq!(dropped_apk_count("/a.apk \"/b c.apk\" /d.zip"), 2);
        assert_eq!(dropped_apk_count("/a.apkx"), 0);
        assert_eq!(dropped_apk_count("push /a.apk"), 0);
    }
}
