//! Scripted Process Runner
//!
//! Stands in for adb and fastboot in tests. Responses are keyed by program name and an
//! argument fragment; every call is recorded.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::runner::{ProcessOutput, ProcessRunner, RunnerError};

#[derive(Debug, Clone)]
enum Reply {
    Output(ProcessOutput),
    SpawnFailure,
}

#[derive(Debug, Clone)]
struct Rule {
    program: String,
    pattern: Vec<String>,
    reply: Reply,
}

impl Rule {
    fn matches(&self, program: &str, args: &[String]) -> bool {
        if self.program != program {
            return false;
        }
        if self.pattern.is_empty() {
            return true;
        }
        args.windows(self.pattern.len())
            .any(|window| window == self.pattern.as_slice())
    }
}

/// One recorded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// File name of the program, e.g. `adb`
    pub program: String,
    pub args: Vec<String>,
    pub attached: bool,
}

impl Invocation {
    /// Arguments joined by single spaces
    pub fn line(&self) -> String {
        self.args.join(" ")
    }
}

/// Runner that answers from a rule table instead of spawning processes.
///
/// Rules match on the program's file name and a contiguous run of arguments. The most
/// recently added matching rule wins, so tests can change a response between steps.
/// Calls that match nothing succeed with empty output.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    rules: Arc<Mutex<Vec<Rule>>>,
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer calls of `program` containing `pattern` with `output`
    pub fn on(&self, program: &str, pattern: &[&str], output: ProcessOutput) -> &Self {
        self.push_rule(program, pattern, Reply::Output(output));
        self
    }

    /// Shorthand for a successful reply with the given stdout
    pub fn set(&self, program: &str, pattern: &[&str], stdout: &str) -> &Self {
        self.on(program, pattern, ProcessOutput::ok(stdout))
    }

    /// Make calls of `program` containing `pattern` fail to spawn
    pub fn fail_spawn(&self, program: &str, pattern: &[&str]) -> &Self {
        self.push_rule(program, pattern, Reply::SpawnFailure);
        self
    }

    /// All recorded invocations in call order
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    /// Recorded invocations of one program
    pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.program == program)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn push_rule(&self, program: &str, pattern: &[&str], reply: Reply) {
        self.rules.lock().push(Rule {
            program: program.to_string(),
            pattern: pattern.iter().map(|s| s.to_string()).collect(),
            reply,
        });
    }

    fn answer(&self, program: &Path, args: &[String], attached: bool) -> Result<ProcessOutput, RunnerError> {
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.calls.lock().push(Invocation {
            program: name.clone(),
            args: args.to_vec(),
            attached,
        });

        let reply = self
            .rules
            .lock()
            .iter()
            .rev()
            .find(|rule| rule.matches(&name, args))
            .map(|rule| rule.reply.clone());

        match reply {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::SpawnFailure) => Err(RunnerError::Spawn {
                program: PathBuf::from(program),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted spawn failure"),
            }),
            None => Ok(ProcessOutput::ok("")),
        }
    }
}

impl ProcessRunner for FakeRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<ProcessOutput, RunnerError> {
        self.answer(program, args, false)
    }

    async fn run_attached(&self, program: &Path, args: &[String]) -> Result<i32, RunnerError> {
        self.answer(program, args, true).map(|output| output.exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_latest_rule_wins() {
        let fake = FakeRunner::new();
        fake.set("adb", &["devices"], "first");
        fake.set("adb", &["devices"], "second");

        let output = fake
            .run(Path::new("/opt/tools/adb"), &args(&["devices", "-l"]))
            .await
            .unwrap();
        assert_eq!(output.stdout_text(), "second");
    }

    #[tokio::test]
    async fn test_pattern_must_be_contiguous() {
        let fake = FakeRunner::new();
        fake.set("adb", &["shell", "ls"], "listing");

        let hit = fake.run(Path::new("adb"), &args(&["-s", "X", "shell", "ls"])).await.unwrap();
        let miss = fake.run(Path::new("adb"), &args(&["shell", "rm", "ls"])).await.unwrap();
        assert_eq!(hit.stdout_text(), "listing");
        assert_eq!(miss.stdout_text(), "");
        assert_eq!(fake.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_recorded() {
        let fake = FakeRunner::new();
        fake.fail_spawn("fastboot", &[]);

        let result = fake.run(Path::new("fastboot"), &args(&["devices"])).await;
        assert!(matches!(result, Err(RunnerError::Spawn { .. })));
        assert_eq!(fake.calls_to("fastboot").len(), 1);
        assert!(fake.calls_to("adb").is_empty());
    }
}
