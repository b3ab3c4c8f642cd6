//! LLM-backed decision source.
//!
//! Renders market + portfolio + trading rules into a prompt, calls an
//! OpenAI-compatible chat-completions endpoint, and parses the fenced JSON
//! decision map the model is instructed to return. Invalid or unparseable
//! responses degrade to an empty decision set (all Hold) rather than
//! failing the cycle.

use super::{Action, Decision, DecisionContext, DecisionError, DecisionSet, DecisionSource, Transcript};
use crate::domain::{Decimal, Symbol};
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

const SYSTEM_PROMPT: &str =
    "You are a professional Chinese A-share trader. Reply with the JSON trading decision only.";

#[derive(Debug, Clone)]
pub struct LlmDecisions {
    client: Client,
    api_url: String,
    api_key: String,
    model_name: String,
}

impl LlmDecisions {
    pub fn new(api_url: String, api_key: String, model_name: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
            model_name,
        }
    }

    /// Normalize the base URL to the OpenAI-compatible `/v1` root.
    fn chat_url(&self) -> String {
        let base = self.api_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    async fn call_chat(&self, prompt: &str) -> Result<String, DecisionError> {
        let request = ChatRequest {
            model: &self.model_name,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.7,
            max_tokens: 2000,
        };

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..Default::default()
        };

        let response: ChatResponse = retry(backoff, || async {
            let resp = self
                .client
                .post(self.chat_url())
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(DecisionError::Provider(e.to_string()))
                })?;

            let status = resp.status();
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(backoff::Error::transient(DecisionError::Provider(format!(
                    "status {}",
                    status
                ))));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DecisionError::Provider(format!(
                    "status {}",
                    status
                ))));
            }

            resp.json::<ChatResponse>().await.map_err(|e| {
                backoff::Error::permanent(DecisionError::Provider(e.to_string()))
            })
        })
        .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| DecisionError::Provider("empty choices".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatText,
}

#[derive(Debug, Deserialize)]
struct ChatText {
    content: String,
}

/// Render the decision context into the provider prompt.
pub fn build_prompt(ctx: &DecisionContext) -> String {
    let mut prompt = String::from("Market data:\n");
    for snap in &ctx.snapshots {
        match snap.price {
            Some(price) => {
                prompt.push_str(&format!(
                    "{} ({}): CNY {}",
                    snap.symbol, snap.name, price
                ));
                if let Some(change) = snap.change_pct {
                    prompt.push_str(&format!(" ({}%)", change));
                }
                prompt.push('\n');
            }
            None => {
                prompt.push_str(&format!("{} ({}): no quote\n", snap.symbol, snap.name));
                continue;
            }
        }
        if let (Some(ma5), Some(ma10), Some(ma20)) = (snap.ma5, snap.ma10, snap.ma20) {
            prompt.push_str(&format!("  MA5: {}, MA10: {}, MA20: {}\n", ma5, ma10, ma20));
        }
        if let (Some(rsi), Some(macd)) = (snap.rsi14, snap.macd) {
            prompt.push_str(&format!("  RSI14: {}, MACD: {}\n", rsi, macd));
        }
    }

    prompt.push_str(&format!(
        "\nAccount:\n- initial capital: CNY {}\n- total value: CNY {}\n- available cash: CNY {}\n",
        ctx.starting_capital, ctx.valuation.total_value, ctx.valuation.cash
    ));

    prompt.push_str("\nPositions:\n");
    if ctx.positions.is_empty() {
        prompt.push_str("none\n");
    } else {
        for pos in &ctx.positions {
            prompt.push_str(&format!(
                "- {}: {} shares @ CNY {}\n",
                pos.symbol, pos.quantity, pos.avg_cost
            ));
        }
    }

    prompt.push_str(
        "\nA-share rules:\n\
         1. T+1: shares bought today cannot be sold until the next trading day.\n\
         2. Price limits: ordinary stocks +/-10%, restricted (ST) stocks +/-5%.\n\
         3. Buys must be multiples of 100 shares (one lot).\n\
         4. Fees: commission ~0.03% (minimum CNY 5) both ways, plus 0.1% transfer levy on sells.\n\
         5. No leverage.\n\
         \n\
         Output JSON only, one entry per symbol:\n\
         ```json\n\
         {\n  \"600519\": {\n    \"signal\": \"buy|sell|hold\",\n    \"quantity\": 100,\n    \
         \"profit_target\": 15.5,\n    \"stop_loss\": 13.2,\n    \"confidence\": 0.75,\n    \
         \"justification\": \"short reason\"\n  }\n}\n\
         ```\n\
         quantity must be a multiple of 100; only held symbols may be sold.\n",
    );
    prompt
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.split_once("```json").map(|(_, r)| r) {
        if let Some((inner, _)) = rest.split_once("```") {
            return inner.trim();
        }
        return rest.trim();
    }
    if let Some(rest) = trimmed.split_once("```").map(|(_, r)| r) {
        if let Some((inner, _)) = rest.split_once("```") {
            return inner.trim();
        }
        return rest.trim();
    }
    trimmed
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    signal: String,
    #[serde(default)]
    quantity: Option<serde_json::Number>,
    #[serde(default, alias = "profit_target")]
    take_profit: Option<serde_json::Number>,
    #[serde(default)]
    stop_loss: Option<serde_json::Number>,
    #[serde(default)]
    confidence: Option<serde_json::Number>,
    #[serde(default, alias = "justification")]
    rationale: Option<String>,
}

fn number_to_decimal(n: &serde_json::Number) -> Option<Decimal> {
    Decimal::from_str_canonical(&n.to_string()).ok()
}

/// Parse a provider response into decisions.
///
/// # Errors
/// Returns Err when the payload is not a JSON decision map; the caller
/// degrades that to an empty set.
pub fn parse_decision_text(text: &str) -> Result<Vec<Decision>, serde_json::Error> {
    let body = strip_code_fence(text);
    let raw: BTreeMap<String, RawDecision> = serde_json::from_str(body)?;

    let decisions = raw
        .into_iter()
        .map(|(code, raw)| {
            let symbol = Symbol::new(code);
            let action = Action::parse(&raw.signal);
            let quantity = raw
                .quantity
                .as_ref()
                .and_then(number_to_decimal)
                .and_then(|d| d.floor().to_i64())
                .unwrap_or(0);
            match action {
                Some(action) => Decision {
                    symbol,
                    action,
                    quantity,
                    take_profit: raw.take_profit.as_ref().and_then(number_to_decimal),
                    stop_loss: raw.stop_loss.as_ref().and_then(number_to_decimal),
                    confidence: raw.confidence.as_ref().and_then(number_to_decimal),
                    rationale: raw.rationale.unwrap_or_default(),
                },
                None => Decision::hold(symbol, format!("unrecognized signal: {}", raw.signal)),
            }
        })
        .collect();
    Ok(decisions)
}

#[async_trait::async_trait]
impl DecisionSource for LlmDecisions {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn decide(&self, ctx: &DecisionContext) -> Result<DecisionSet, DecisionError> {
        let prompt = build_prompt(ctx);
        let response = self.call_chat(&prompt).await?;

        let decisions = match parse_decision_text(&response) {
            Ok(decisions) => decisions,
            Err(e) => {
                warn!(error = %e, "unparseable decision response, holding everything");
                Vec::new()
            }
        };

        Ok(DecisionSet {
            decisions,
            transcript: Some(Transcript { prompt, response }),
        })
    }
}
