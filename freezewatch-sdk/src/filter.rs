//! Stack frame filters used to suppress reports for known benign blocking calls.

use std::collections::BTreeSet;
use std::fmt;

use freezewatch_types::{LongEventReport, StackFrame, ThreadStack};

use crate::error::ConfigError;

/// A `(class, method)` pair matched against the top frame of a stack.
///
/// Either part may contain `*`, which matches any run of characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilterRule {
    pub class_name: String,
    pub method_name: String,
}

impl FilterRule {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }

    /// Parse a `class.method` entry. The class part may itself contain dots;
    /// the method is everything after the last one.
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        let entry = entry.trim();
        match entry.rsplit_once('.') {
            Some((class, method)) if !class.is_empty() && !method.is_empty() => {
                Ok(Self::new(class, method))
            }
            _ => Err(ConfigError::InvalidFilter(entry.to_string())),
        }
    }

    fn is_wildcard(&self) -> bool {
        self.class_name.contains('*') || self.method_name.contains('*')
    }

    pub fn matches(&self, frame: &StackFrame) -> bool {
        wildcard_match(&self.class_name, &frame.class_name)
            && wildcard_match(&self.method_name, &frame.method_name)
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)
    }
}

/// Immutable set of filter rules, built once when a monitor starts.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    exact: BTreeSet<(String, String)>,
    wildcards: Vec<FilterRule>,
    /// Native dispatch frames that sit above the frame we actually want to match.
    shims: Vec<FilterRule>,
}

impl FilterSet {
    /// Parse a comma-separated list of `class.method` entries. Blank entries are ignored.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        let rules = split_entries(list)
            .map(FilterRule::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_rules(rules))
    }

    pub fn from_rules(rules: impl IntoIterator<Item = FilterRule>) -> Self {
        let mut set = Self::default();
        for rule in rules {
            if rule.is_wildcard() {
                set.wildcards.push(rule);
            } else {
                set.exact.insert((rule.class_name, rule.method_name));
            }
        }
        set
    }

    /// Treat the given frames as native dispatch shims: when one of them is on
    /// top of a stack, the frame beneath it is matched instead.
    pub fn with_dispatch_shims(mut self, list: &str) -> Result<Self, ConfigError> {
        for entry in split_entries(list) {
            self.shims.push(FilterRule::parse(entry)?);
        }
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wildcards.is_empty()
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcards.len()
    }

    pub fn matches_frame(&self, frame: &StackFrame) -> bool {
        self.exact
            .contains(&(frame.class_name.clone(), frame.method_name.clone()))
            || self.wildcards.iter().any(|rule| rule.matches(frame))
    }

    /// Does the top of this stack (skipping one dispatch shim) match a rule?
    pub fn matches_stack(&self, stack: &ThreadStack) -> bool {
        let mut frames = stack.frames.iter();
        let Some(top) = frames.next() else {
            return false;
        };

        if self.shims.iter().any(|shim| shim.matches(top)) {
            return frames.next().is_some_and(|frame| self.matches_frame(frame));
        }
        self.matches_frame(top)
    }

    /// Returns `false` when any sample shows the GUI thread inside a filtered call.
    pub fn should_log(&self, report: &LongEventReport) -> bool {
        if self.is_empty() {
            return true;
        }
        !report.gui_stacks().any(|stack| self.matches_stack(stack))
    }
}

fn split_entries(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|entry| !entry.is_empty())
}

/// Glob match where `*` matches any (possibly empty) run of characters.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
