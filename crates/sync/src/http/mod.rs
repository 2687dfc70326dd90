//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! HTTP layer: router, handlers, auth middleware, shared state.

pub mod auth;
pub mod handlers;
pub mod router;
pub mod state;

pub use auth::{DeviceIdentity, APIKEY_HEADER, DEVICE_HEADER};
pub use router::create_router;
pub use state::AppState;
