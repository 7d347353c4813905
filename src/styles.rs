use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StyleId {
    #[default]
    Formal,
    Concise,
    Commit,
}

impl StyleId {
    pub fn all() -> &'static [StyleId] {
        &[StyleId::Formal, StyleId::Concise, StyleId::Commit]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StyleId::Formal => "formal",
            StyleId::Concise => "concise",
            StyleId::Commit => "commit",
        }
    }

    pub fn config(&self) -> &'static StyleConfig {
        match self {
            StyleId::Formal => &FORMAL,
            StyleId::Concise => &CONCISE,
            StyleId::Commit => &COMMIT,
        }
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        StyleId::all()
            .iter()
            .copied()
            .find(|id| id.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown style '{}' (expected one of: formal, concise, commit)",
                    wanted
                )
            })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StyleConfig {
    pub id: StyleId,
    pub label: &'static str,
    pub system_prompt: &'static str,
}

static FORMAL: StyleConfig = StyleConfig {
    id: StyleId::Formal,
    label: "Formal",
    system_prompt: "You are a professional copy editor. Rewrite the user's text so it reads formal, \
polite and logically clear, suitable for business or academic use. Return only the rewritten \
text without explanations.",
};

static CONCISE: StyleConfig = StyleConfig {
    id: StyleId::Concise,
    label: "Concise",
    system_prompt: "You are an editor who tightens prose. Rewrite the user's text to be shorter and \
more direct, removing redundancy while keeping the core meaning. Return only the rewritten text \
without explanations.",
};

static COMMIT: StyleConfig = StyleConfig {
    id: StyleId::Commit,
    label: "Commit message",
    system_prompt: "You are an expert at writing git commit messages. Rewrite the user's text as a \
clear, concise single-line commit message. Return only the commit message.",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_three_distinct_styles() {
        let prompts: std::collections::HashSet<_> = StyleId::all()
            .iter()
            .map(|id| id.config().system_prompt)
            .collect();
        assert_eq!(prompts.len(), 3);
        for id in StyleId::all() {
            assert_eq!(id.config().id, *id);
        }
    }

    #[test]
    fn parses_ids_case_insensitively() {
        assert_eq!("Concise".parse::<StyleId>().unwrap(), StyleId::Concise);
        assert_eq!(" commit ".parse::<StyleId>().unwrap(), StyleId::Commit);
        assert!("casual".parse::<StyleId>().is_err());
    }
}
