// src/state.rs
use std::sync::Arc;

use crate::{auth::Authenticator, items::ItemStore, store::PollStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PollStore>,
    pub auth: Arc<dyn Authenticator>,
    pub items: Arc<ItemStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn PollStore>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            store,
            auth,
            items: Arc::new(ItemStore::new()),
        }
    }
}
