mod ask;
mod config;
mod history;
mod manage;

use crate::advisor::MappedTurn;
use crate::error::AdvisorError;
use crate::state::Context;
use crate::transcript::types::{Role, Session, TurnHint};

/// Business advisor: a step-by-step consultation per channel
#[poise::command(
    slash_command,
    subcommands(
        "ask::ask",
        "ask::pick",
        "history::history",
        "history::reports",
        "manage::step",
        "manage::back",
        "manage::end",
        "manage::cancel",
        "config::config"
    )
)]
pub async fn advisor(_ctx: Context<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

/// The session of the invoking channel. Says so and returns `None` when
/// the channel has none yet.
async fn channel_session(ctx: &Context<'_>) -> Result<Option<Session>, anyhow::Error> {
    match ctx
        .data()
        .advisor
        .session_for_channel(ctx.channel_id().get())
        .await
    {
        Ok(session) => Ok(Some(session)),
        Err(AdvisorError::NotFound(_)) => {
            ctx.say("No consultation in this channel yet. Start one with `/advisor ask`.")
                .await?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Show validation and state errors to the user; anything else propagates.
async fn say_rejection(ctx: &Context<'_>, err: AdvisorError) -> Result<(), anyhow::Error> {
    match err {
        AdvisorError::Validation(reason) | AdvisorError::StateConflict(reason) => {
            ctx.say(format!("Can't do that: {}", reason)).await?;
            Ok(())
        }
        AdvisorError::NotFound(_) => Err(err.into()),
    }
}

fn render_turn(turn: &MappedTurn) -> String {
    let speaker = match turn.kind {
        Role::User => "You",
        Role::Advisor => "Advisor",
    };
    let mut out = format!("**{}** (step {}): {}", speaker, turn.round_index, turn.content);
    match &turn.hint {
        Some(TurnHint::CategoryChoices { categories }) => {
            out.push_str("\n\nPick a category with `/advisor pick`: ");
            out.push_str(&categories.join(" | "));
        }
        Some(TurnHint::SubtopicChoices { subtopics, .. }) if !subtopics.is_empty() => {
            out.push_str("\n\nFor example: ");
            out.push_str(&subtopics.join(" | "));
        }
        _ => {}
    }
    out
}

/// Send a message in Discord-safe chunks (max 1990 chars).
/// Uses ctx.say() for all chunks: poise routes follow-ups through the
/// interaction webhook, which doesn't require Send Messages channel permission.
async fn send_chunked(ctx: &Context<'_>, text: &str) -> Result<(), anyhow::Error> {
    let mut remaining = text;
    while !remaining.is_empty() {
        let mut chunk_len = remaining.len().min(1990);
        while !remaining.is_char_boundary(chunk_len) {
            chunk_len -= 1;
        }
        let split_at = if chunk_len < remaining.len() {
            remaining[..chunk_len]
                .rfind('\n')
                .or_else(|| remaining[..chunk_len].rfind(' '))
                .map(|i| i + 1)
                .unwrap_or(chunk_len)
        } else {
            chunk_len
        };
        let chunk = &remaining[..split_at];
        remaining = &remaining[split_at..];

        ctx.say(chunk).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn mapped(kind: Role, hint: Option<TurnHint>) -> MappedTurn {
        MappedTurn {
            order_index: 0,
            kind,
            content: "Hello".to_string(),
            created_at: Utc::now(),
            round_index: 1,
            topic_tag: None,
            hint,
        }
    }

    #[test]
    fn test_render_turn_lists_choices() {
        let greeting = mapped(
            Role::Advisor,
            Some(TurnHint::CategoryChoices {
                categories: vec!["Stagnant sales".to_string(), "Other".to_string()],
            }),
        );
        assert_eq!(
            render_turn(&greeting),
            "**Advisor** (step 1): Hello\n\nPick a category with `/advisor pick`: Stagnant sales | Other"
        );
        assert_eq!(render_turn(&mapped(Role::User, None)), "**You** (step 1): Hello");
        assert_eq!(
            render_turn(&mapped(Role::Advisor, Some(TurnHint::FreeInput))),
            "**Advisor** (step 1): Hello"
        );
    }
}
