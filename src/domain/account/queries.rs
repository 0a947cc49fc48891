use std::sync::Arc;

use super::read_model::{AccountReadModel, AccountView};
use super::value_objects::AccountId;

/// Read side: answers from the projected read model only, never the log.
pub struct AccountQueryService {
    read_model: Arc<dyn AccountReadModel>,
}

impl AccountQueryService {
    pub fn new(read_model: Arc<dyn AccountReadModel>) -> Self {
        Self { read_model }
    }

    pub async fn get_account(&self, account_id: &AccountId) -> anyhow::Result<Option<AccountView>> {
        let view = self.read_model.find_by_id(account_id).await?;
        tracing::debug!(account_id = %account_id, found = view.is_some(), "Account query");
        Ok(view)
    }
}
