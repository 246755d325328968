use crate::state::Context;

/// Configure advisor parameters (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn config(
    ctx: Context<'_>,
    #[description = "round_cap | reply_timeout_secs | page_limit"] param: Option<String>,
    #[description = "New value"] value: Option<u32>,
) -> Result<(), anyhow::Error> {
    let user_id = ctx.author().id.get();
    if !ctx.data().is_admin(user_id) {
        ctx.say("This command is admin-only.").await?;
        return Ok(());
    }

    match (param.as_deref(), value) {
        // Show current config
        (None, _) => {
            let config = ctx.data().config.read().await;
            ctx.say(format!(
                "**Advisor Configuration:**\n\
                 `round_cap`: {}\n\
                 `reply_timeout_secs`: {}\n\
                 `page_limit`: {}",
                config.round_cap, config.reply_timeout_secs, config.page_limit
            ))
            .await?;
        }
        (Some(_), Some(0)) => {
            ctx.say("Values must be at least 1.").await?;
        }
        // Set a parameter
        (Some(key), Some(val)) => {
            let mut config = ctx.data().config.write().await;
            match key {
                "round_cap" => {
                    config.round_cap = val;
                    ctx.say(format!("`round_cap` set to {} (applies to new consultations)", val))
                        .await?;
                }
                "reply_timeout_secs" => {
                    config.reply_timeout_secs = val as u64;
                    ctx.say(format!("`reply_timeout_secs` set to {}", val))
                        .await?;
                }
                "page_limit" => {
                    config.page_limit = (val as usize).min(crate::transcript::MAX_PAGE_LIMIT);
                    ctx.say(format!("`page_limit` set to {}", config.page_limit))
                        .await?;
                }
                _ => {
                    ctx.say(format!(
                        "Unknown param `{}`. Valid: `round_cap`, `reply_timeout_secs`, `page_limit`",
                        key
                    ))
                    .await?;
                }
            }
        }
        (Some(_), None) => {
            ctx.say("Provide both `param` and `value`. Example: `/advisor config round_cap 6`")
                .await?;
        }
    }

    Ok(())
}
