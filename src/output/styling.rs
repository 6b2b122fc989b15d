use std::fmt::Display;

use console::{style, StyledObject};

/// Roles text plays in terminal output.
#[derive(Debug, Clone, Copy)]
pub enum Tone {
    Heading,
    Running,
    Success,
    Failure,
    Muted,
    Brand,
}

pub fn paint(text: impl Display, tone: Tone) -> StyledObject<String> {
    let styled = style(text.to_string());
    match tone {
        Tone::Heading => styled.bright().underlined(),
        Tone::Running => styled.bright().yellow(),
        Tone::Success => styled.bright().green(),
        Tone::Failure => styled.bright().red(),
        Tone::Muted => styled.dim(),
        Tone::Brand => styled.magenta().bold(),
    }
}
