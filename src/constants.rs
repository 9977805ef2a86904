use std::time::Duration;

// SPAM GUARD
//
// A (user, tag) pair may be counted this many times inside the window before further uses are
// suppressed.
pub const SPAM_WINDOW: Duration = Duration::from_secs(300);
pub const SPAM_MAX_USES: u32 = 3;

// CONTENT VALIDATION
//
// Word minimums for the long-form tags, applied whenever the table leaves `min_words` unset.
pub const CRITICA_MIN_WORDS: usize = 25;
pub const RESENA_MIN_WORDS: usize = 15;
pub const BONUS_CHAR_THRESHOLD: usize = 150;
pub const BONUS_POINTS: i64 = 2;

pub const LEVEL_COUNT: usize = 5;

// MINI-GAMES
pub const GAME_TIMEOUT: Duration = Duration::from_secs(120);
pub const GAME_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
pub const GAME_REWARD_POINTS: i64 = 5;

pub const ACHIEVEMENT_MILESTONES: [i64; 6] = [100, 250, 500, 1000, 2500, 5000];

// RANKING
pub const RANKING_DEFAULT_LIMIT: i64 = 10;
pub const RANKING_CHAT_MAX: i64 = 25;
pub const RANKING_API_MAX: i64 = 100;

// TRANSPORT
pub const SERVER_PORT: u16 = 3000;
pub const DEFAULT_IRC_SERVER: &str = "irc.chat.twitch.tv";
pub const DEFAULT_IRC_PORT: u16 = 6697;
pub const DEFAULT_SERVICE_NAME: &str = "hashtag-ledger";

pub const COMMAND_PREFIX: char = '!';
