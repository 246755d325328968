use tracing::info;

use super::{render_turn, say_rejection, send_chunked};
use crate::advisor::{SubmitOutcome, SubmitTurn, TopicMetadata};
use crate::state::Context;

/// Ask the advisor a question, request a report, or confirm one
#[poise::command(slash_command, guild_only)]
pub async fn ask(
    ctx: Context<'_>,
    #[description = "Your message"] message: String,
) -> Result<(), anyhow::Error> {
    // The reasoning service can take a while; keep the interaction alive
    ctx.defer().await?;

    let advisor = &ctx.data().advisor;
    let session = advisor.open_session(ctx.channel_id().get()).await;
    info!(
        user = ctx.author().name,
        session = %session.id,
        message_len = message.len(),
        "advisor message received"
    );

    let request = SubmitTurn {
        session_id: session.id,
        message,
        ..Default::default()
    };
    match advisor.submit(request).await {
        Ok(outcome) => send_outcome(&ctx, &outcome).await,
        Err(e) => say_rejection(&ctx, e).await,
    }
}

/// Choose a consultation category
#[poise::command(slash_command, guild_only)]
pub async fn pick(
    ctx: Context<'_>,
    #[description = "Category"]
    #[autocomplete = "autocomplete_category"]
    category: String,
) -> Result<(), anyhow::Error> {
    let advisor = &ctx.data().advisor;
    let Some(reply) = advisor.category_reply(&category) else {
        ctx.say(format!(
            "Unknown category `{}`. Choose one of: {}",
            category,
            advisor.rules().category_labels().join(", ")
        ))
        .await?;
        return Ok(());
    };

    let session = advisor.open_session(ctx.channel_id().get()).await;
    let request = SubmitTurn {
        session_id: session.id,
        message: category.clone(),
        bypass_reasoning: true,
        precomputed_reply: Some(reply),
        topic: Some(TopicMetadata {
            selected_topic: Some(category),
        }),
    };
    match advisor.submit(request).await {
        Ok(outcome) => send_outcome(&ctx, &outcome).await,
        Err(e) => say_rejection(&ctx, e).await,
    }
}

async fn send_outcome(ctx: &Context<'_>, outcome: &SubmitOutcome) -> Result<(), anyhow::Error> {
    let mut full = outcome
        .turns
        .iter()
        .map(render_turn)
        .collect::<Vec<_>>()
        .join("\n\n");

    if let Some(report) = &outcome.report {
        full.push_str(&format!(
            "\n\n---\n**Report:** {} (`{}`)\n{}",
            report.title, report.id, report.body
        ));
    }
    full.push_str(&format!(
        "\n\n*Step {} of {}{}*",
        (outcome.current_round + 1).min(outcome.round_cap),
        outcome.round_cap,
        if outcome.limit_reached {
            ", all steps completed"
        } else {
            ""
        }
    ));

    send_chunked(ctx, &full).await
}

/// Autocomplete for consultation categories.
async fn autocomplete_category(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let partial = partial.to_lowercase();
    ctx.data()
        .advisor
        .rules()
        .category_labels()
        .into_iter()
        .filter(|l| l.to_lowercase().contains(&partial))
        .take(25)
        .collect()
}
