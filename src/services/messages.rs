//! Texts sent to players.

use std::fmt::Write as _;

use crate::state::{
    leaderboard::{RankedEntry, ScoringMode},
    session::{Player, SessionSnapshot},
};

const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

/// Greeting sent before the first question.
pub fn welcome(player: &Player, question_count: usize) -> String {
    format!(
        "Welcome to the quiz, {}! {question_count} questions are coming up, good luck.",
        player.display_name
    )
}

/// Feedback replacing a correctly answered question.
pub fn correct_answer(player: &Player) -> String {
    match player.username.as_deref().filter(|u| !u.is_empty()) {
        Some(username) => format!("✅ Yes, {} @{username}!", player.display_name),
        None => format!("✅ Yes, {}!", player.display_name),
    }
}

/// Feedback replacing a wrongly answered question.
pub fn wrong_answer(correct_option: &str) -> String {
    format!("❌ The correct answer is *{correct_option}*.")
}

/// Feedback replacing an unanswered question.
pub fn timed_out(correct_option: &str) -> String {
    format!("⌛ Time's up! The correct answer is *{correct_option}*.")
}

/// Final message of a completed quiz.
///
/// `rank` is `None` when the score could not be saved.
pub fn summary(
    player: &Player,
    score: u32,
    correct_answers: usize,
    question_count: usize,
    rank: Option<usize>,
) -> String {
    let mut text = format!(
        "🎉 Congratulations {}! You scored {score} points ({correct_answers}/{question_count} correct).",
        player.display_name
    );
    match rank {
        Some(rank) => {
            let _ = write!(text, "\nYou are #{rank} on the leaderboard.");
        }
        None => text.push_str("\nYour score could not be saved to the leaderboard this time."),
    }
    text
}

/// Rendering of the top of the leaderboard.
pub fn leaderboard(entries: &[RankedEntry], mode: ScoringMode) -> String {
    if entries.is_empty() {
        return "No high scores yet!".to_string();
    }

    let mut text = String::from("🎉 Global ranking\n");
    for ranked in entries {
        let medal = MEDALS.get(ranked.rank - 1).copied().unwrap_or("");
        let score = ranked.entry.ranking_score(mode);
        let _ = writeln!(
            text,
            "{medal} {}. {}   {score} points (games: {})",
            ranked.rank, ranked.entry.display_name, ranked.entry.games_played
        );
    }
    text
}

/// Progress of the running quiz.
pub fn progress(snapshot: &SessionSnapshot) -> String {
    format!(
        "📊 {} points so far, question {} of {}.",
        snapshot.score,
        snapshot.current_index + 1,
        snapshot.question_count
    )
}

/// Command overview.
pub fn help() -> String {
    [
        "Welcome to the Quiz Bot! Here are the available commands:",
        "",
        "/start - Start the quiz",
        "/score - Show your score in the running quiz",
        "/leaderboard - Show the top scores",
        "/cancel - Stop the running quiz",
        "/help - Show this help message",
    ]
    .join("\n")
}

/// Notice for commands that need a running quiz.
pub fn no_active_session() -> String {
    "There is no quiz running right now. Send /start to begin one.".to_string()
}

/// Notice sent when the bank cannot fill a quiz.
pub fn quiz_unavailable() -> String {
    "Sorry, the quiz is unavailable right now. Please try again later.".to_string()
}

/// Acknowledgment of a cancelled quiz.
pub fn cancelled() -> String {
    "Quiz cancelled.".to_string()
}
