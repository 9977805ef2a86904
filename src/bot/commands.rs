use crate::constants::{COMMAND_PREFIX, RANKING_CHAT_MAX, RANKING_DEFAULT_LIMIT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// `!perfil [user]`; `None` means the sender.
    Profile(Option<String>),
    /// `!ranking [n]`, already clamped.
    Ranking(i64),
    /// `!reto`
    Challenge,
    /// `!adivina` starts a game, `!adivina <word>` guesses.
    Guess(Option<String>),
}

impl BotCommand {
    /// Returns `None` for anything that isn't a known command, so it can be scored instead.
    pub fn parse(text: &str) -> Option<Self> {
        let body = text.trim().strip_prefix(COMMAND_PREFIX)?;
        let mut parts = body.split_whitespace();
        let name = parts.next()?.to_lowercase();
        let arg = parts.next();

        let cmd = match name.as_str() {
            "perfil" => Self::Profile(arg.map(|a| a.trim_start_matches('@').to_string())),
            "ranking" => Self::Ranking(ranking_limit(arg)),
            "reto" => Self::Challenge,
            "adivina" => Self::Guess(arg.map(str::to_string)),
            _ => return None,
        };

        Some(cmd)
    }
}

fn ranking_limit(arg: Option<&str>) -> i64 {
    arg.and_then(|a| a.parse::<i64>().ok())
        .unwrap_or(RANKING_DEFAULT_LIMIT)
        .clamp(1, RANKING_CHAT_MAX)
}
