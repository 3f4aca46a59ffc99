//! Line-oriented console front end.
//!
//! Turns typed lines into session intents and snapshot changes into text.
//! Everything here is synchronous and side-effect free; `main` owns stdin
//! and stdout.

use trivia_core::{ConnectionState, SessionPhase};
use trivia_session::{AnswerState, RankingState, SessionSnapshot, SubmissionState};

/// What a typed line asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    /// Host starts the game.
    Start,
    /// Choose this option text.
    Select(String),
    /// Leave the game.
    Leave,
    /// Submit the score again after a failure.
    Retry,
    /// Show the command list.
    Help,
}

/// Help text printed on `help`.
pub const HELP: &str = "\
commands:
  1-4 | <option text>   answer the current question
  start                 start the game (host only)
  retry                 resubmit the score after a failure
  leave                 leave the game
  help                  show this list";

/// Parse one input line against the current snapshot.
///
/// Options can be chosen by their 1-based position or by their text,
/// ignoring case.
pub fn parse_intent(line: &str, snapshot: &SessionSnapshot) -> Result<Intent, String> {
    let input = line.trim();
    match input.to_ascii_lowercase().as_str() {
        "" => return Err("type `help` for commands".into()),
        "start" => return Ok(Intent::Start),
        "retry" => return Ok(Intent::Retry),
        "leave" | "quit" | "q" => return Ok(Intent::Leave),
        "help" | "?" => return Ok(Intent::Help),
        _ => {}
    }

    let Some(round) = &snapshot.question else {
        return Err("no question yet".into());
    };
    if let Ok(position) = input.parse::<usize>() {
        return round
            .option_at(position)
            .map(|option| Intent::Select(option.to_string()))
            .ok_or_else(|| format!("pick 1-{}", round.options.len()));
    }
    round
        .options
        .iter()
        .find(|option| option.eq_ignore_ascii_case(input))
        .map(|option| Intent::Select(option.clone()))
        .ok_or_else(|| format!("`{input}` is not one of the options"))
}

/// Lines describing what changed between `prev` and `next`.
pub fn render(prev: &SessionSnapshot, next: &SessionSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    let code = &next.identity.game_code;

    if prev.connection != next.connection {
        match next.connection {
            ConnectionState::Connected if next.phase.is_active() && prev.phase.is_active() => {
                lines.push("reconnected".into());
            }
            ConnectionState::Disconnected if next.phase.is_active() => {
                lines.push("connection lost, reconnecting...".into());
            }
            _ => {}
        }
    }
    if next.connection_lost && !prev.connection_lost {
        lines.push("Connection lost, the game cannot continue.".into());
    }

    if prev.phase != next.phase && next.phase == SessionPhase::AwaitingPeers {
        if next.identity.is_host {
            lines.push(format!("Game {code} created. Share the code, then type `start`."));
        } else {
            lines.push(format!("Joined {code}. Waiting for the host to start."));
        }
    }

    if next.question_number != prev.question_number {
        if let Some(round) = &next.question {
            lines.push(format!("Question {}", next.question_number));
            if let Some(url) = &round.image_url {
                lines.push(format!("  image: {url}"));
            }
            for (i, option) in round.options.iter().enumerate() {
                lines.push(format!("  {}) {option}", i + 1));
            }
        }
    }

    if prev.answer != next.answer {
        if let AnswerState::Answered { is_correct, .. } = &next.answer {
            if *is_correct {
                lines.push(format!("Correct! Score: {}", next.score));
            } else {
                let answer = next
                    .question
                    .as_ref()
                    .map_or("", |q| q.correct_answer.as_str());
                lines.push(format!("Wrong, the answer was {answer}. Score: {}", next.score));
            }
        }
    }

    if prev.countdown != next.countdown && next.question_number == prev.question_number {
        if next.countdown == 0 {
            if next.answer == AnswerState::Unanswered {
                lines.push("Time's up!".into());
            }
        } else if next.answer == AnswerState::Unanswered {
            lines.push(format!("  {}s", next.countdown));
        }
    }

    if prev.final_result.is_none() {
        if let Some(result) = &next.final_result {
            lines.push(format!("Game over. Final score: {}", result.player_score));
        }
    }

    if prev.submission != next.submission {
        match &next.submission {
            SubmissionState::Submitted => lines.push("Score submitted.".into()),
            SubmissionState::Failed(message) => {
                lines.push(format!(
                    "Could not submit score: {message} (type `retry` or `leave`)"
                ));
            }
            SubmissionState::NotStarted | SubmissionState::Pending => {}
        }
    }

    if prev.ranking != next.ranking {
        match &next.ranking {
            RankingState::Polling => lines.push("Waiting for the ranking...".into()),
            RankingState::Ready(entries) => {
                lines.push("Ranking:".into());
                for (i, entry) in entries.iter().enumerate() {
                    lines.push(format!(
                        "  {}. {} {}",
                        i + 1,
                        entry.player_name,
                        entry.player_score
                    ));
                }
            }
            RankingState::Unavailable { attempts } => {
                lines.push(format!("Ranking unavailable after {attempts} attempts."));
            }
            RankingState::Idle => {}
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use trivia_core::{FinalResult, QuestionRound, RankingEntry, SessionIdentity};

    fn snapshot(identity: SessionIdentity) -> SessionSnapshot {
        SessionSnapshot {
            identity,
            phase: SessionPhase::Idle,
            connection: ConnectionState::Disconnected,
            connection_lost: false,
            question: None,
            question_number: 0,
            answer: AnswerState::Unanswered,
            countdown: 0,
            score: 0,
            final_result: None,
            submission: SubmissionState::NotStarted,
            ranking: RankingState::Idle,
        }
    }

    fn guest() -> SessionSnapshot {
        snapshot(SessionIdentity::guest("HTESXE".into(), "Ada"))
    }

    fn with_question(mut s: SessionSnapshot) -> SessionSnapshot {
        s.phase = SessionPhase::InQuestion;
        s.connection = ConnectionState::Connected;
        s.question = Some(QuestionRound {
            id: 1,
            image_url: None,
            options: ["Lagos".into(), "Abuja".into(), "Kano".into(), "Ibadan".into()],
            correct_answer: "Abuja".into(),
            topic_id: "1".into(),
        });
        s.question_number = 1;
        s.countdown = 5;
        s
    }

    #[test]
    fn parses_commands() {
        let s = guest();
        assert_eq!(parse_intent(" START ", &s), Ok(Intent::Start));
        assert_eq!(parse_intent("q", &s), Ok(Intent::Leave));
        assert_eq!(parse_intent("Retry", &s), Ok(Intent::Retry));
        assert_eq!(parse_intent("?", &s), Ok(Intent::Help));
        assert!(parse_intent("", &s).is_err());
    }

    #[test]
    fn selection_needs_a_question() {
        assert_eq!(parse_intent("1", &guest()), Err("no question yet".into()));
    }

    #[test]
    fn selects_by_position_or_text() {
        let s = with_question(guest());
        assert_eq!(parse_intent("2", &s), Ok(Intent::Select("Abuja".into())));
        assert_eq!(parse_intent("kano", &s), Ok(Intent::Select("Kano".into())));
        assert_eq!(parse_intent("5", &s), Err("pick 1-4".into()));
        assert!(parse_intent("Paris", &s).is_err());
    }

    #[test]
    fn renders_join_and_question() {
        let prev = guest();
        let mut next = prev.clone();
        next.phase = SessionPhase::AwaitingPeers;
        next.connection = ConnectionState::Connected;
        assert_eq!(
            render(&prev, &next),
            vec!["Joined HTESXE. Waiting for the host to start."]
        );

        let asked = with_question(next.clone());
        let lines = render(&next, &asked);
        assert_eq!(lines[0], "Question 1");
        assert_eq!(lines[2], "  2) Abuja");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn renders_host_prompt() {
        let prev = snapshot(SessionIdentity::host("HTESXE".into(), "Olajide", "1", "2"));
        let mut next = prev.clone();
        next.phase = SessionPhase::AwaitingPeers;
        assert_eq!(
            render(&prev, &next),
            vec!["Game HTESXE created. Share the code, then type `start`."]
        );
    }

    #[test]
    fn renders_answers_and_countdown() {
        let prev = with_question(guest());
        let mut wrong = prev.clone();
        wrong.phase = SessionPhase::AwaitingNextQuestion;
        wrong.answer = AnswerState::Answered {
            selected: "Lagos".into(),
            is_correct: false,
        };
        assert_eq!(
            render(&prev, &wrong),
            vec!["Wrong, the answer was Abuja. Score: 0"]
        );

        let mut tick = prev.clone();
        tick.countdown = 4;
        assert_eq!(render(&prev, &tick), vec!["  4s"]);

        let mut expired = prev.clone();
        expired.countdown = 0;
        expired.phase = SessionPhase::AwaitingNextQuestion;
        assert_eq!(render(&prev, &expired), vec!["Time's up!"]);
    }

    #[test]
    fn renders_connection_loss_mid_game() {
        let prev = with_question(guest());
        let mut lost = prev.clone();
        lost.connection = ConnectionState::Disconnected;
        assert_eq!(render(&prev, &lost), vec!["connection lost, reconnecting..."]);
        assert_eq!(render(&lost, &prev), vec!["reconnected"]);

        let mut gone = lost.clone();
        gone.phase = SessionPhase::Finished;
        gone.connection_lost = true;
        assert_eq!(
            render(&lost, &gone),
            vec!["Connection lost, the game cannot continue."]
        );
        assert_eq!(
            render(&prev, &gone),
            vec!["Connection lost, the game cannot continue."]
        );
    }

    #[test]
    fn renders_end_of_game() {
        let prev = with_question(guest());
        let mut ended = prev.clone();
        ended.phase = SessionPhase::Ending;
        ended.final_result = Some(FinalResult {
            topic_id: "1".into(),
            game_code: "HTESXE".into(),
            player_score: 20,
            player_name: "Ada".into(),
        });
        ended.submission = SubmissionState::Pending;
        assert_eq!(render(&prev, &ended), vec!["Game over. Final score: 20"]);

        let mut failed = ended.clone();
        failed.phase = SessionPhase::Finished;
        failed.submission = SubmissionState::Failed("Unknown error".into());
        assert_eq!(
            render(&ended, &failed),
            vec!["Could not submit score: Unknown error (type `retry` or `leave`)"]
        );

        let mut ranked = ended.clone();
        ranked.submission = SubmissionState::Submitted;
        ranked.ranking = RankingState::Ready(vec![
            RankingEntry {
                player_name: "Ada".into(),
                player_score: 20,
            },
            RankingEntry {
                player_name: "Olajide".into(),
                player_score: 10,
            },
        ]);
        assert_eq!(
            render(&ended, &ranked),
            vec![
                "Score submitted.",
                "Ranking:",
                "  1. Ada 20",
                "  2. Olajide 10"
            ]
        );
    }
}
