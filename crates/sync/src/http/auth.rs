//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Device-header authentication middleware.
//!
//! Every sync route requires `X-OESP-DEVICE`; when key auth is enabled the
//! global `X-OESP-APIKEY` must match as well. The claimed device DID is
//! injected into request extensions for handlers to cross-check.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::http::state::AppState;

/// Required on every sync request.
pub const DEVICE_HEADER: &str = "X-OESP-DEVICE";
/// Required when `API_KEY_REQUIRED` is set.
pub const APIKEY_HEADER: &str = "X-OESP-APIKEY";

/// The device DID a request claims to act for.
#[derive(Debug, Clone)]
pub struct DeviceIdentity(pub String);

pub async fn device_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let device_did = request
        .headers()
        .get(DEVICE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized(format!("{DEVICE_HEADER} header missing")))?;

    if state.config.api_key_required {
        let presented = request
            .headers()
            .get(APIKEY_HEADER)
            .and_then(|value| value.to_str().ok());
        let expected = state.config.global_api_key.as_deref();
        if presented.is_none() || presented != expected {
            return Err(ApiError::unauthorized(format!(
                "Invalid or missing {APIKEY_HEADER}"
            )));
        }
    }

    request.extensions_mut().insert(DeviceIdentity(device_did));
    Ok(next.run(request).await)
}
