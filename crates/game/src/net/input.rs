use std::time::Duration;

use super::protocol::ClientMessage;
use crate::bot::BotInput;
use crate::timing::{PREDICTION_MARGIN_MS, TIME_FREQ};

pub const INPUT_RING_SIZE: usize = 200;

#[derive(Debug, Clone, Copy)]
struct SentInput {
    pred_tick: i32,
    predicted_time: i64,
    sent_at: i64,
}

/// Sends input when it changed or the refresh interval ran out, and keeps a
/// ring of recent sends so server timing hints can be matched to them.
#[derive(Debug)]
pub struct InputDispatcher {
    refresh: i64,
    last_sent: Option<BotInput>,
    last_send_time: Option<i64>,
    ring: Vec<Option<SentInput>>,
    cursor: usize,
    sent_count: u64,
}

impl InputDispatcher {
    pub fn new(refresh: Duration) -> Self {
        Self {
            refresh: refresh.as_micros() as i64,
            last_sent: None,
            last_send_time: None,
            ring: vec![None; INPUT_RING_SIZE],
            cursor: 0,
            sent_count: 0,
        }
    }

    pub fn should_send(&self, input: &BotInput, now: i64) -> bool {
        match (self.last_sent, self.last_send_time) {
            (Some(last), Some(time)) => last != *input || now - time >= self.refresh,
            _ => true,
        }
    }

    pub fn dispatch(
        &mut self,
        input: BotInput,
        ack_tick: i32,
        pred_tick: i32,
        predicted_time: i64,
        now: i64,
        force: bool,
    ) -> Option<ClientMessage> {
        if !force && !self.should_send(&input, now) {
            return None;
        }

        self.ring[self.cursor] = Some(SentInput {
            pred_tick,
            predicted_time,
            sent_at: now,
        });
        self.cursor = (self.cursor + 1) % INPUT_RING_SIZE;
        self.last_sent = Some(input);
        self.last_send_time = Some(now);
        self.sent_count += 1;

        Some(ClientMessage::Input {
            ack_tick,
            pred_tick,
            input,
        })
    }

    /// Target for the predicted clock derived from a timing hint about the
    /// input sent for `pred_tick`.
    pub fn timing_target(&self, pred_tick: i32, time_left_ms: i32, now: i64) -> Option<i64> {
        let sent = self
            .ring
            .iter()
            .flatten()
            .find(|entry| entry.pred_tick == pred_tick)?;

        let margin = (time_left_ms as i64 - PREDICTION_MARGIN_MS) * TIME_FREQ / 1000;
        Some(sent.predicted_time + (now - sent.sent_at) - margin)
    }

    pub fn last_sent(&self) -> Option<&BotInput> {
        self.last_sent.as_ref()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent_count
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
        self.last_send_time = None;
        self.ring.fill(None);
        self.cursor = 0;
    }
}
