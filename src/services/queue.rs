//! Same-day queue read side

use std::sync::Arc;

use crate::{error::AppResult, models::QueueEntry, repository::TicketStore};

use super::{clock::Clock, parse_date};

#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
}

impl QueueService {
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Queue entries for `date`, or for today when no date is given
    pub async fn for_day(&self, date: Option<&str>) -> AppResult<Vec<QueueEntry>> {
        let day = match date {
            Some(date) => parse_date(date)?,
            None => self.clock.today(),
        };
        self.store.queue_for_day(day).await
    }
}
