use super::{channel_session, say_rejection, send_chunked};
use crate::state::Context;
use crate::transcript::types::SessionStatus;

/// Complete the current step and file its consensus report
#[poise::command(slash_command, guild_only)]
pub async fn step(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let Some(session) = channel_session(&ctx).await? else {
        return Ok(());
    };
    let closed = match ctx.data().advisor.close_step(&session.id).await {
        Ok(closed) => closed,
        Err(e) => return say_rejection(&ctx, e).await,
    };

    let next = if closed.session.current_round >= closed.session.round_cap {
        "All steps are complete. Use `/advisor end` to finish the consultation.".to_string()
    } else {
        let (title, goal) = ctx
            .data()
            .advisor
            .rules()
            .round_brief(closed.session.current_round + 1);
        format!("Next: **{}**. {}", title, goal)
    };
    send_chunked(
        &ctx,
        &format!(
            "Step {} completed.\n\n**{}** (`{}`)\n{}\n\n{}",
            closed.closed_round, closed.report.title, closed.report.id, closed.report.body, next
        ),
    )
    .await
}

/// Go back to an earlier step
#[poise::command(slash_command, guild_only)]
pub async fn back(
    ctx: Context<'_>,
    #[description = "Completed steps to keep (0 = start over)"] round: u32,
) -> Result<(), anyhow::Error> {
    let Some(session) = channel_session(&ctx).await? else {
        return Ok(());
    };
    match ctx.data().advisor.rewind(&session.id, round).await {
        Ok(session) => {
            ctx.say(format!(
                "Back to step {} of {} (furthest reached: {}).",
                (session.current_round + 1).min(session.round_cap),
                session.round_cap,
                session.max_reached_round
            ))
            .await?;
            Ok(())
        }
        Err(e) => say_rejection(&ctx, e).await,
    }
}

/// Finish the consultation in this channel
#[poise::command(slash_command, guild_only)]
pub async fn end(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    finish(ctx, SessionStatus::Completed, "Consultation completed. Thank you!").await
}

/// Abandon the consultation in this channel
#[poise::command(slash_command, guild_only)]
pub async fn cancel(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    finish(ctx, SessionStatus::Cancelled, "Consultation cancelled.").await
}

async fn finish(
    ctx: Context<'_>,
    status: SessionStatus,
    done: &str,
) -> Result<(), anyhow::Error> {
    let Some(session) = channel_session(&ctx).await? else {
        return Ok(());
    };
    match ctx.data().advisor.finish(&session.id, status).await {
        Ok(_) => {
            ctx.say(done).await?;
            Ok(())
        }
        Err(e) => say_rejection(&ctx, e).await,
    }
}
