use std::fmt;
use std::str::FromStr;

use crate::foundation::error::{SchedulerError, SchedulerResult};
use crate::stage::assignment::{StageAssignment, StageContext};

/// Descriptor naming the context for each stage of a target.
///
/// String form: `"[window:]cull/draw"`.
///
/// - `""` puts every stage on the driving context.
/// - `"A"` (no slash) puts cull and draw on worker `A`.
/// - `"A/B"` culls on `A` and draws on `B`; `"/B"` culls on the driving context.
/// - The window stage follows the draw context unless a `window:` prefix names it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThreadingModel {
    window: Option<String>,
    cull: String,
    draw: String,
}

impl ThreadingModel {
    /// Parse a descriptor string.
    pub fn parse(model: &str) -> SchedulerResult<Self> {
        let model = model.trim();
        let (window, rest) = match model.split_once(':') {
            Some((w, rest)) => (Some(w.trim()), rest),
            None => (None, model),
        };
        let (cull, draw) = match rest.split_once('/') {
            Some((c, d)) => (c.trim(), d.trim()),
            None => (rest.trim(), rest.trim()),
        };

        for name in [window.unwrap_or(""), cull, draw] {
            validate_name(name, model)?;
        }

        Ok(Self {
            window: window.map(str::to_string),
            cull: cull.to_string(),
            draw: draw.to_string(),
        })
    }

    /// Build a model from explicit context names (empty = driving context).
    pub fn new(cull: impl Into<String>, draw: impl Into<String>) -> Self {
        Self {
            window: None,
            cull: cull.into(),
            draw: draw.into(),
        }
    }

    /// Override the window-stage context.
    pub fn with_window(mut self, window: impl Into<String>) -> Self {
        self.window = Some(window.into());
        self
    }

    pub fn cull_name(&self) -> &str {
        &self.cull
    }

    pub fn draw_name(&self) -> &str {
        &self.draw
    }

    /// Window context name; defaults to the draw context.
    pub fn window_name(&self) -> &str {
        self.window.as_deref().unwrap_or(&self.draw)
    }

    /// `true` when every stage runs on the driving context.
    pub fn is_single_threaded(&self) -> bool {
        self.cull.is_empty() && self.draw.is_empty() && self.window_name().is_empty()
    }

    pub fn assignment(&self) -> StageAssignment {
        StageAssignment::new(
            StageContext::named(self.window_name()),
            StageContext::named(self.cull.as_str()),
            StageContext::named(self.draw.as_str()),
        )
    }
}

fn validate_name(name: &str, model: &str) -> SchedulerResult<()> {
    if name.contains([':', '/']) {
        return Err(SchedulerError::validation(format!(
            "threading model '{model}' has too many separators"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(SchedulerError::validation(format!(
            "threading model '{model}' has invalid character {bad:?} in context name"
        )));
    }
    Ok(())
}

impl From<&ThreadingModel> for StageAssignment {
    fn from(model: &ThreadingModel) -> Self {
        model.assignment()
    }
}

impl FromStr for ThreadingModel {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ThreadingModel {
    type Error = SchedulerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ThreadingModel> for String {
    fn from(model: ThreadingModel) -> Self {
        model.to_string()
    }
}

impl fmt::Display for ThreadingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(window) = &self.window {
            write!(f, "{window}:")?;
        }
        if self.cull == self.draw && self.window.is_none() {
            f.write_str(&self.cull)
        } else {
            write!(f, "{}/{}", self.cull, self.draw)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/threading.rs"]
mod tests;
