//! Prompt composition.
//!
//! Builds the message sequence for the completion service: one fixed system
//! instruction, the recent conversation replayed as user/assistant turns, and
//! the new question with the schema hint appended. The hint rides on the final
//! user turn so the service sees the schema no matter how long the history is.

use sqlchat_core::error::SqlchatError;
use sqlchat_core::types::Message;
use sqlchat_storage::ConversationStore;

use crate::types::{PromptMessage, Role};

/// Task instruction sent as the first message of every request.
pub const SYSTEM_INSTRUCTION: &str = "You convert plain English questions about an e-commerce \
SQLite database into a single valid SQLite SELECT query only. Respond with only the SQL query.";

/// Table and column names of the nine dataset tables.
pub const SCHEMA_HINT: &str = "
customers(customer_id, customer_unique_id, customer_zip_code_prefix, customer_city, customer_state),
orders(order_id, customer_id, order_status, order_purchase_timestamp, order_approved_at,
       order_delivered_carrier_date, order_delivered_customer_date, order_estimated_delivery_date, freight_value),
order_items(order_id, order_item_id, product_id, seller_id, shipping_limit_date, price),
payments(order_id, payment_sequential, payment_type, payment_installments, payment_value),
products(product_id, product_category_name, product_name_length, product_description_length,
         product_photos_qty, product_weight_g, product_length_cm, product_height_cm, product_width_cm),
sellers(seller_id, seller_zip_code_prefix, seller_city, seller_state),
order_reviews(review_id, order_id, review_score, review_comment_title, review_comment_message,
              review_creation_date, review_answer_timestamp),
geolocation(geolocation_zip_code_prefix, geolocation_lat, geolocation_lng, geolocation_city, geolocation_state),
product_category_name_translation(product_id, product_category_name, product_category_name_english)
";

/// Builds completion requests from a question and its conversation.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    /// Maximum number of prior messages replayed.
    history_turns: usize,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(8)
    }
}

impl PromptComposer {
    pub fn new(history_turns: usize) -> Self {
        Self { history_turns }
    }

    pub fn history_turns(&self) -> usize {
        self.history_turns
    }

    /// Compose the message sequence for `prompt` given prior `history`
    /// (oldest first). History beyond `history_turns` is dropped from the
    /// front.
    pub fn compose(&self, prompt: &str, history: &[Message]) -> Vec<PromptMessage> {
        let skip = history.len().saturating_sub(self.history_turns);

        let mut messages = Vec::with_capacity(history.len() - skip + 2);
        messages.push(PromptMessage::system(SYSTEM_INSTRUCTION));
        for msg in &history[skip..] {
            messages.push(PromptMessage::new(Role::from(msg.sender), msg.content.clone()));
        }
        messages.push(PromptMessage::user(format!(
            "{}\n\n-- Table hints: {}",
            prompt, SCHEMA_HINT
        )));
        messages
    }

    /// Prior turns of a conversation, oldest first.
    ///
    /// `current` is the id of the message being answered, if it has already
    /// been logged; it is left out so the question is not replayed as its
    /// own history.
    pub fn prior_turns(
        &self,
        store: &ConversationStore,
        conversation_id: &str,
        current: Option<i64>,
    ) -> Result<Vec<Message>, SqlchatError> {
        if self.history_turns == 0 {
            return Ok(Vec::new());
        }

        let fetch = self.history_turns + usize::from(current.is_some());
        let mut turns = store.recent(conversation_id, fetch)?;
        if let Some(id) = current {
            turns.retain(|m| m.id != id);
        }
        let excess = turns.len().saturating_sub(self.history_turns);
        turns.drain(..excess);
        Ok(turns)
    }

    /// Compose for a question, pulling history from the store when a
    /// conversation id is given.
    pub fn compose_for(
        &self,
        store: &ConversationStore,
        prompt: &str,
        conversation_id: Option<&str>,
        current: Option<i64>,
    ) -> Result<Vec<PromptMessage>, SqlchatError> {
        let history = match conversation_id {
            Some(id) => self.prior_turns(store, id, current)?,
            None => Vec::new(),
        };
        Ok(self.compose(prompt, &history))
    }
}
