//! Generates and delivers the persona's reply to an admitted event.

use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, instrument, warn};

use crate::{
    base::types::{DispatchContext, Res, ResponseOutcome},
    runtime::Runtime,
};

/// Spawn a response task for an admitted event and return immediately.
///
/// The webhook drops the returned handle, detaching the task: its outcome and any
/// failure inside it are only visible in the logs.  Tests await the handle instead.
#[instrument(skip_all, fields(thread_ts = %context.thread_ts))]
pub fn dispatch(context: DispatchContext, runtime: Runtime) -> JoinHandle<ResponseOutcome> {
    tokio::spawn(
        async move {
            // Process the event.
            let result = handle_response_internal(&context, &runtime).await;

            // Log any errors.
            match result {
                Ok(outcome) => {
                    info!("Response task finished: {:?}", outcome);
                    outcome
                }
                Err(err) => {
                    error!("Error while handling: {}", err);
                    ResponseOutcome::Failed
                }
            }
        }
        .in_current_span(),
    )
}

#[instrument(skip_all)]
async fn handle_response_internal(context: &DispatchContext, runtime: &Runtime) -> Res<ResponseOutcome> {
    let persona = &runtime.persona;
    let state = &runtime.state;

    if state.is_in_cooldown(&persona.name, persona.cooldown).await? {
        warn!("Cooldown active, skipping response.");
        return Ok(ResponseOutcome::CooldownActive);
    }

    if state.turn_count_exceeded(&persona.name, &context.thread_ts, persona.max_turns).await? {
        warn!("Max turns reached, skipping response.");
        return Ok(ResponseOutcome::MaxTurns);
    }

    // This check and the post below are not atomic; two close events can both pass it.
    let latest = state.latest_message_id(&context.thread_ts).await?;
    if latest.as_deref().is_some_and(|latest| latest != context.message_ts) {
        warn!("Newer message in thread, canceling response.");
        return Ok(ResponseOutcome::Superseded);
    }

    info!("Processing message from {}.", context.user_id);

    tokio::time::sleep(persona.stagger_delay()).await;

    // Call the LLM with the persona prompt and the message text.

    let conversation = persona.conversation(&context.user_id, &context.user_input);
    let completion = runtime.llm.get_completion(&conversation).await?;
    let reply = completion.trim();

    if reply.is_empty() {
        return Err(anyhow::anyhow!("LLM returned an empty reply."));
    }

    // Deliver, then record the turn.

    runtime.chat.send_message(&context.channel_id, &context.thread_ts, reply).await?;
    state.record_response(&persona.name, &context.thread_ts).await?;

    Ok(ResponseOutcome::Responded)
}
