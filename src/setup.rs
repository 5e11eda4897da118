//! Account setup validation
//!
//! Used once when the user enters credentials: performs a real login and
//! contract listing so bad credentials or an empty account are reported
//! before the coordinator is ever started.

use crate::api::{AccountApi, ApiClient};
use crate::auth::AuthSession;
use crate::classify::ErrorKind;
use crate::error::SyncError;
use crate::logging::get_logger;
use crate::model::{ContractKind, Credentials};
use crate::normalize;
use serde::Serialize;
use std::sync::Arc;

/// A contract the user may pick during setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractOption {
    pub code: String,
    pub cups: String,
    pub kind: ContractKind,
    /// e.g. `ELECTRICITY - ES0031000000000001AA`
    pub label: String,
}

/// Validate credentials and list the contracts they give access to
pub async fn validate_account(
    api: Arc<dyn AccountApi>,
    credentials: Credentials,
) -> Result<Vec<ContractOption>, ErrorKind> {
    let logger = get_logger("setup");
    let auth = Arc::new(AuthSession::new(Arc::clone(&api), credentials));

    let outcome = async {
        auth.login().await?;
        let houses = ApiClient::new(Arc::clone(&api), Arc::clone(&auth))
            .list_contracts()
            .await?;
        let contracts = normalize::contracts(&houses)?;
        if contracts.is_empty() {
            return Err(SyncError::NoContracts);
        }
        Ok::<_, SyncError>(contracts)
    }
    .await;

    match outcome {
        Ok(contracts) => {
            logger.info(&format!("Account validated with {} contract(s)", contracts.len()));
            Ok(contracts
                .into_iter()
                .map(|c| ContractOption {
                    label: format!("{} - {}", c.kind.as_str(), c.cups),
                    code: c.code,
                    cups: c.cups,
                    kind: c.kind,
                })
                .collect())
        }
        Err(e) => {
            let kind = e.kind();
            logger.warn(&format!("Account validation failed ({}): {}", kind, e));
            Err(kind)
        }
    }
}
