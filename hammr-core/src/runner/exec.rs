use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

use crate::http::{HttpClient, HttpRequest};

use super::scenario::ScenarioKind;
use super::setup::IterationContext;
use super::stats::{MetricSample, Outcome, RunMetrics};

pub(crate) async fn run_scenario(
    kind: ScenarioKind,
    client: &HttpClient,
    target: &IterationContext,
    metrics: &RunMetrics,
    vu_id: u64,
    iteration: u64,
) {
    match kind {
        ScenarioKind::SendMessage => send_message(client, target, metrics, vu_id, iteration).await,
        ScenarioKind::ListMessages => list_messages(client, target, metrics).await,
        ScenarioKind::ListConversations => list_conversations(client, target, metrics).await,
        ScenarioKind::GetConversation => get_conversation(client, target, metrics).await,
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    content: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

async fn send_message(
    client: &HttpClient,
    target: &IterationContext,
    metrics: &RunMetrics,
    vu_id: u64,
    iteration: u64,
) {
    let unix_ms = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let content = message_content(vu_id, iteration, unix_ms);
    let payload = SendMessageRequest {
        content: &content,
        kind: "TEXT",
    };

    let body = match serde_json::to_vec(&payload) {
        Ok(body) => body,
        Err(err) => {
            tracing::debug!(error = %err, "message payload failed to encode");
            metrics.record(&failure_sample(ScenarioKind::SendMessage));
            return;
        }
    };

    let url = format!(
        "{}/api/v1/conversations/{}/messages",
        target.base_url(),
        target.conversation_id()
    );
    let request = HttpRequest::post_owned(url, body.into())
        .bearer(target.token())
        .json_content()
        .with_timeout(target.request_timeout());

    execute(client, metrics, ScenarioKind::SendMessage, request, classify_send).await;
}

async fn list_messages(client: &HttpClient, target: &IterationContext, metrics: &RunMetrics) {
    let url = format!(
        "{}/api/v1/conversations/{}/messages?limit=20",
        target.base_url(),
        target.conversation_id()
    );
    let request = authorized_get(url, target);
    execute(
        client,
        metrics,
        ScenarioKind::ListMessages,
        request,
        classify_list_messages,
    )
    .await;
}

async fn list_conversations(client: &HttpClient, target: &IterationContext, metrics: &RunMetrics) {
    let url = format!("{}/api/v1/conversations?limit=20", target.base_url());
    let request = authorized_get(url, target);
    execute(
        client,
        metrics,
        ScenarioKind::ListConversations,
        request,
        classify_ok,
    )
    .await;
}

async fn get_conversation(client: &HttpClient, target: &IterationContext, metrics: &RunMetrics) {
    let url = format!(
        "{}/api/v1/conversations/{}",
        target.base_url(),
        target.conversation_id()
    );
    let request = authorized_get(url, target);
    execute(
        client,
        metrics,
        ScenarioKind::GetConversation,
        request,
        classify_ok,
    )
    .await;
}

fn authorized_get(url: String, target: &IterationContext) -> HttpRequest {
    HttpRequest::get_owned(url)
        .bearer(target.token())
        .with_timeout(target.request_timeout())
}

/// Issues one request and records exactly one sample, whatever happens on
/// the wire. Transport errors become failed samples, never panics.
async fn execute(
    client: &HttpClient,
    metrics: &RunMetrics,
    scenario: ScenarioKind,
    request: HttpRequest,
    classify: fn(u16, &[u8]) -> Outcome,
) {
    let _in_flight = metrics.connection_guard();
    let started = Instant::now();

    let sample = match client.request(request).await {
        Ok(response) => {
            let outcome = classify(response.status, &response.body);
            if outcome == Outcome::Failure {
                tracing::debug!(
                    scenario = %scenario,
                    status = response.status,
                    "scenario response rejected"
                );
            }
            MetricSample {
                scenario,
                duration: started.elapsed(),
                outcome,
                bytes_sent: response.bytes_sent,
                bytes_received: response.bytes_received,
                at: SystemTime::now(),
            }
        }
        Err(err) => {
            tracing::debug!(
                scenario = %scenario,
                kind = %err.transport_error_kind(),
                error = %err,
                "scenario request failed"
            );
            MetricSample {
                scenario,
                duration: started.elapsed(),
                outcome: Outcome::Failure,
                bytes_sent: 0,
                bytes_received: 0,
                at: SystemTime::now(),
            }
        }
    };

    metrics.record(&sample);
}

fn failure_sample(scenario: ScenarioKind) -> MetricSample {
    MetricSample {
        scenario,
        duration: Duration::ZERO,
        outcome: Outcome::Failure,
        bytes_sent: 0,
        bytes_received: 0,
        at: SystemTime::now(),
    }
}

fn message_content(vu_id: u64, iteration: u64, unix_ms: u128) -> String {
    format!("Performance test - VU:{vu_id} Iter:{iteration} Time:{unix_ms}")
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

fn classify_send(status: u16, body: &[u8]) -> Outcome {
    if status != 201 {
        return Outcome::Failure;
    }
    match serde_json::from_slice::<SendMessageResponse>(body) {
        Ok(decoded) => {
            let has_id = decoded
                .data
                .as_ref()
                .and_then(|d| d.id.as_ref())
                .is_some_and(non_null_id);
            if decoded.success && has_id {
                Outcome::Success
            } else {
                Outcome::Failure
            }
        }
        Err(_) => Outcome::Failure,
    }
}

fn non_null_id(id: &serde_json::Value) -> bool {
    match id {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[derive(Debug, Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<MessagePage>,
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    items: Option<Vec<serde_json::Value>>,
}

fn classify_list_messages(status: u16, body: &[u8]) -> Outcome {
    if status != 200 {
        return Outcome::Failure;
    }
    match serde_json::from_slice::<ListMessagesResponse>(body) {
        Ok(decoded) => {
            let has_items = decoded.data.as_ref().is_some_and(|d| d.items.is_some());
            if decoded.success && has_items {
                Outcome::Success
            } else {
                Outcome::Failure
            }
        }
        Err(_) => Outcome::Failure,
    }
}

fn classify_ok(status: u16, _body: &[u8]) -> Outcome {
    if status == 200 {
        Outcome::Success
    } else {
        Outcome::Failure
    }
}
