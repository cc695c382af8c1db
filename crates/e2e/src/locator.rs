//! Semantic element references
//!
//! An [`ElementRef`] describes a UI target by meaning (role, label, text)
//! rather than by structure. It is resolved against the live page every time
//! it is used; nothing here holds a handle to a DOM node.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One way of finding an element on the page.
///
/// Variants are listed in resolution priority: accessible role/label first,
/// positional last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Strategy {
    /// ARIA role (explicit or implicit) plus optional accessible name
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Associated `<label>`, `aria-labelledby` or `aria-label`
    Label { text: String },

    /// `placeholder` attribute
    Placeholder { text: String },

    /// `title` attribute
    Title { text: String },

    /// Innermost element whose text content matches
    Text { text: String },

    /// N-th element (zero based) with the given role inside the scope.
    ///
    /// Deprecated: breaks as soon as the UI reorders its controls. Only used
    /// when the configuration explicitly allows positional fallback.
    Positional { role: String, index: usize },
}

impl Strategy {
    /// Lower value wins when several strategies are available.
    pub fn priority(&self) -> u8 {
        match self {
            Strategy::Role { .. } => 0,
            Strategy::Label { .. } => 1,
            Strategy::Placeholder { .. } => 2,
            Strategy::Title { .. } => 3,
            Strategy::Text { .. } => 4,
            Strategy::Positional { .. } => 5,
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, Strategy::Positional { .. })
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Role { role, name: Some(name) } => write!(f, "role={}[name~'{}']", role, name),
            Strategy::Role { role, name: None } => write!(f, "role={}", role),
            Strategy::Label { text } => write!(f, "label~'{}'", text),
            Strategy::Placeholder { text } => write!(f, "placeholder~'{}'", text),
            Strategy::Title { text } => write!(f, "title~'{}'", text),
            Strategy::Text { text } => write!(f, "text~'{}'", text),
            Strategy::Positional { role, index } => write!(f, "{}[{}]", role, index),
        }
    }
}

/// A semantic reference to a UI element, with one or more strategies and an
/// optional row scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    /// Human-readable name used in logs and errors ("the Save button")
    pub description: String,

    /// Candidate strategies; the resolver orders them by priority
    pub strategies: Vec<Strategy>,

    /// Require whole-string matches instead of substring matches
    #[serde(default)]
    pub exact: bool,

    /// Restrict the lookup to the listing row containing this text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within_row: Option<String>,
}

impl ElementRef {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            strategies: Vec::new(),
            exact: false,
            within_row: None,
        }
    }

    pub fn role(mut self, role: impl Into<String>, name: impl Into<String>) -> Self {
        self.strategies.push(Strategy::Role {
            role: role.into(),
            name: Some(name.into()),
        });
        self
    }

    pub fn any_role(mut self, role: impl Into<String>) -> Self {
        self.strategies.push(Strategy::Role {
            role: role.into(),
            name: None,
        });
        self
    }

    pub fn label(mut self, text: impl Into<String>) -> Self {
        self.strategies.push(Strategy::Label { text: text.into() });
        self
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.strategies.push(Strategy::Placeholder { text: text.into() });
        self
    }

    pub fn title(mut self, text: impl Into<String>) -> Self {
        self.strategies.push(Strategy::Title { text: text.into() });
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.strategies.push(Strategy::Text { text: text.into() });
        self
    }

    pub fn positional(mut self, role: impl Into<String>, index: usize) -> Self {
        self.strategies.push(Strategy::Positional {
            role: role.into(),
            index,
        });
        self
    }

    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }

    /// Scope this reference to the unique listing row containing `fragment`.
    pub fn in_row(&self, fragment: impl Into<String>) -> Self {
        let mut scoped = self.clone();
        scoped.within_row = Some(fragment.into());
        scoped
    }

    /// Strategies in resolution order. Stable for equal priorities.
    pub fn ordered(&self) -> Vec<&Strategy> {
        let mut ordered: Vec<&Strategy> = self.strategies.iter().collect();
        ordered.sort_by_key(|s| s.priority());
        ordered
    }

    /// Reference to the listing row containing `fragment`.
    pub fn row(fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        Self::new(format!("row containing '{}'", fragment)).role("row", fragment)
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.within_row {
            Some(row) => write!(f, "{} (in row '{}')", self.description, row),
            None => write!(f, "{}", self.description),
        }
    }
}

/// A single concrete lookup handed to the page driver: one strategy, with
/// its match mode and row scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub strategy: Strategy,
    pub exact: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Query {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            exact: false,
            scope: None,
        }
    }

    pub fn for_ref(target: &ElementRef, strategy: &Strategy) -> Self {
        Self {
            strategy: strategy.clone(),
            exact: target.exact,
            scope: target.within_row.clone(),
        }
    }

    /// Query for listing rows whose text contains `fragment`.
    pub fn rows(fragment: &str) -> Self {
        Self::new(Strategy::Role {
            role: "row".to_string(),
            name: Some(fragment.to_string()),
        })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.strategy)?;
        if self.exact {
            write!(f, " (exact)")?;
        }
        if let Some(scope) = &self.scope {
            write!(f, " in row~'{}'", scope)?;
        }
        Ok(())
    }
}

/// An entry of a selection control: the machine value and what the user
/// sees. Native `<select>` controls match either; composite dropdowns match
/// the option's accessible name against the label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.value)
    }
}
