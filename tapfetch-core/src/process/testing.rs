//! Scripted process runner for exercising callers without real tools

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ExecutionResult, Invocation, ProcessRunner};

type Hook = Box<dyn Fn(&Invocation) + Send + Sync>;

struct Rule {
    pattern: String,
    responses: VecDeque<ExecutionResult>,
    hook: Option<Hook>,
}

/// Answers invocations from a list of rules matched against the joined argv
///
/// Rules are checked in insertion order; the first whose pattern is a prefix
/// of the arguments wins. Queued responses are consumed one at a time, the
/// last one repeats. Unmatched invocations succeed.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Respond to invocations whose arguments start with `pattern`
    pub(crate) fn on(self, pattern: &str, result: ExecutionResult) -> Self {
        self.on_sequence(pattern, vec![result])
    }

    /// Respond with `results` in order, repeating the last
    pub(crate) fn on_sequence(self, pattern: &str, results: Vec<ExecutionResult>) -> Self {
        self.push(Rule {
            pattern: pattern.to_string(),
            responses: results.into(),
            hook: None,
        })
    }

    /// Run `hook` (e.g. to create files) and then succeed
    pub(crate) fn on_run(
        self,
        pattern: &str,
        hook: impl Fn(&Invocation) + Send + Sync + 'static,
    ) -> Self {
        self.push(Rule {
            pattern: pattern.to_string(),
            responses: VecDeque::from([ExecutionResult::exited(0)]),
            hook: Some(Box::new(hook)),
        })
    }

    fn push(self, rule: Rule) -> Self {
        self.rules
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(rule);
        self
    }

    /// Every invocation seen so far
    pub(crate) fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Joined argument lists of every invocation
    pub(crate) fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.argv().join(" ")).collect()
    }

    /// Whether any invocation's arguments started with `pattern`
    pub(crate) fn called(&self, pattern: &str) -> bool {
        self.command_lines().iter().any(|c| c.starts_with(pattern))
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> ExecutionResult {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(invocation.clone());

        let joined = invocation.argv().join(" ");
        let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        let Some(rule) = rules.iter_mut().find(|r| joined.starts_with(&r.pattern)) else {
            return ExecutionResult::exited(0);
        };

        if let Some(ref hook) = rule.hook {
            hook(invocation);
        }

        if rule.responses.len() > 1 {
            rule.responses.pop_front().unwrap_or_default()
        } else {
            rule.responses.front().cloned().unwrap_or_default()
        }
    }
}
