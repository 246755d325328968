use super::{channel_session, render_turn, send_chunked};
use crate::state::Context;

/// Show the conversation transcript
#[poise::command(slash_command, guild_only)]
pub async fn history(
    ctx: Context<'_>,
    #[description = "Turns to skip (0 = from the start)"] offset: Option<u32>,
    #[description = "Turns to show (max 100)"] limit: Option<u32>,
) -> Result<(), anyhow::Error> {
    let Some(session) = channel_session(&ctx).await? else {
        return Ok(());
    };
    let offset = offset.unwrap_or(0) as usize;
    let page = ctx
        .data()
        .advisor
        .page(&session.id, offset, limit.map(|l| l as usize))
        .await?;

    if page.turns.is_empty() {
        ctx.say(format!(
            "Nothing past turn {} ({} in total).",
            offset, page.total
        ))
        .await?;
        return Ok(());
    }

    let mut output = format!(
        "**Transcript** (turns {}-{} of {})\n\n",
        offset + 1,
        offset + page.turns.len(),
        page.total
    );
    for turn in &page.turns {
        output.push_str(&render_turn(turn));
        output.push_str("\n\n");
    }
    if page.has_more {
        output.push_str(&format!(
            "More with `/advisor history offset:{}`",
            offset + page.turns.len()
        ));
    }

    send_chunked(&ctx, &output).await
}

/// List reports produced in this channel's consultation
#[poise::command(slash_command, guild_only)]
pub async fn reports(
    ctx: Context<'_>,
    #[description = "Report ID to show in full"] id: Option<String>,
) -> Result<(), anyhow::Error> {
    let Some(session) = channel_session(&ctx).await? else {
        return Ok(());
    };
    let reports = ctx.data().advisor.reports(&session.id).await?;

    if let Some(id) = id {
        match reports.iter().find(|r| r.id == id) {
            Some(report) => {
                send_chunked(&ctx, &format!("**{}**\n\n{}", report.title, report.body)).await?
            }
            None => {
                ctx.say(format!("No report `{}` in this consultation.", id))
                    .await?;
            }
        }
        return Ok(());
    }

    if reports.is_empty() {
        ctx.say("No reports yet. Ask the advisor to turn an answer into a report.")
            .await?;
        return Ok(());
    }

    let mut output = format!("**Reports** ({} total)\n\n", reports.len());
    for (i, report) in reports.iter().enumerate() {
        output.push_str(&format!(
            "{}. **{}** `{}` step {} ({})\n",
            i + 1,
            report.title,
            report.id,
            report.round_index,
            report.created_at.format("%Y-%m-%d %H:%M")
        ));
    }

    send_chunked(&ctx, &output).await
}
