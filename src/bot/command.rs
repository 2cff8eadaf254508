//! Text commands understood by the bot.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SignIn,
    Unknown,
}

impl Command {
    /// Whitespace and case are ignored, so "Sign In", "signin" and
    /// " SIGN in " all parse to [`Command::SignIn`].
    pub fn parse(text: &str) -> Self {
        let normalized: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "signin" => Command::SignIn,
            _ => Command::Unknown,
        }
    }
}
