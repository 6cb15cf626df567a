//! Presentation of the reasoning and answer channels.

use thiserror::Error;

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    #[error("display text has no {0} delimiter")]
    MissingDelimiter(&'static str),

    #[error("display text contains {count} </think> delimiters, cannot split unambiguously")]
    AmbiguousDelimiter { count: usize },
}

/// What to show for the current state of a turn. Both channels stay separate;
/// [`DisplayPayload::render`] joins them for text-only consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayPayload {
    pub answer: String,
    pub reasoning: String,
    /// Whether the reasoning channel is shown
    pub thinking: bool,
}

impl DisplayPayload {
    pub fn new(answer: impl Into<String>, reasoning: impl Into<String>, thinking: bool) -> Self {
        Self {
            answer: answer.into(),
            reasoning: reasoning.into(),
            thinking,
        }
    }

    /// `<think>{reasoning}</think>{answer}` in thinking mode, else the bare
    /// answer.
    pub fn render(&self) -> String {
        if self.thinking {
            let mut out = String::with_capacity(
                THINK_OPEN.len() + self.reasoning.len() + THINK_CLOSE.len() + self.answer.len(),
            );
            out.push_str(THINK_OPEN);
            out.push_str(&self.reasoning);
            out.push_str(THINK_CLOSE);
            out.push_str(&self.answer);
            out
        } else {
            self.answer.clone()
        }
    }
}

impl std::fmt::Display for DisplayPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Split a rendered thinking-mode string into `(reasoning, answer)`.
///
/// Fails rather than guessing when the closing delimiter is missing or occurs
/// more than once, since either channel may legitimately contain it.
pub fn split_thinking(display: &str) -> Result<(&str, &str), DisplayError> {
    let body = display
        .strip_prefix(THINK_OPEN)
        .ok_or(DisplayError::MissingDelimiter(THINK_OPEN))?;
    let count = body.matches(THINK_CLOSE).count();
    match count {
        0 => Err(DisplayError::MissingDelimiter(THINK_CLOSE)),
        1 => body
            .split_once(THINK_CLOSE)
            .ok_or(DisplayError::MissingDelimiter(THINK_CLOSE)),
        _ => Err(DisplayError::AmbiguousDelimiter { count }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_both_modes() {
        assert_eq!(DisplayPayload::new("Hello", "hmm", true).render(), "<think>hmm</think>Hello");
        assert_eq!(DisplayPayload::new("Hello", "hmm", false).render(), "Hello");
        assert_eq!(DisplayPayload::new("", "", true).render(), "<think></think>");
    }

    #[test]
    fn split_round_trips_rendered_text() {
        let rendered = DisplayPayload::new("answer", "reasoning", true).render();
        assert_eq!(split_thinking(&rendered).unwrap(), ("reasoning", "answer"));
    }

    #[test]
    fn split_rejects_missing_delimiters() {
        assert_eq!(
            split_thinking("plain answer"),
            Err(DisplayError::MissingDelimiter(THINK_OPEN))
        );
        assert_eq!(
            split_thinking("<think>still thinking"),
            Err(DisplayError::MissingDelimiter(THINK_CLOSE))
        );
    }

    #[test]
    fn split_rejects_delimiter_inside_a_channel() {
        let rendered = DisplayPayload::new("use </think> to close", "r", true).render();
        assert_eq!(
            split_thinking(&rendered),
            Err(DisplayError::AmbiguousDelimiter { count: 2 })
        );
    }
}
