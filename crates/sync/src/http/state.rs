//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Shared application state for the HTTP layer.

use std::sync::Arc;

use crate::config::Config;
use crate::service::SyncService;
use crate::store::SyncStore;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SyncService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn SyncStore>, config: Config) -> Self {
        Self {
            service: Arc::new(SyncService::new(store, config.clone())),
            config: Arc::new(config),
        }
    }
}
