//! Postgres subscriber store.
//!
//! Backs [`SubscriberStore`] with the `telegram_notify_chat` table:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS telegram_notify_chat (
//!     chat_id  bigint,
//!     user_id  bigint,
//!     disabled int2,
//!     PRIMARY KEY (chat_id, user_id)
//! );
//! ```
//!
//! `connect` creates the table when absent, so a fresh deployment needs
//! no manual migration.

use async_trait::async_trait;
use relay_core::error::RelayError;
use relay_core::store::{SubscriberStore, Subscription};
use tokio_postgres::{Client, NoTls};
use tracing::{error, info};

use crate::error::ConnectorError;

const INIT_SQL: &str = "CREATE TABLE IF NOT EXISTS telegram_notify_chat (
    chat_id bigint,
    user_id bigint,
    disabled int2,
    PRIMARY KEY (chat_id, user_id)
)";

/// Subscriber store over a Postgres connection.
pub struct PgSubscriberStore {
    client: Client,
}

impl PgSubscriberStore {
    /// Connects and ensures the link table exists.
    ///
    /// The connection task is spawned onto the current runtime; a
    /// broken connection surfaces as errors on subsequent queries.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::ConnectionFailed`] if the server is
    /// unreachable or the init statement fails.
    pub async fn connect(dsn: &str) -> Result<Self, ConnectorError> {
        let (client, connection) = tokio_postgres::connect(dsn, NoTls)
            .await
            .map_err(|e| ConnectorError::ConnectionFailed(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "postgres connection terminated");
            }
        });

        client
            .execute(INIT_SQL, &[])
            .await
            .map_err(|e| ConnectorError::ConnectionFailed(e.to_string()))?;

        info!("postgres subscriber store connected");
        Ok(Self { client })
    }
}

fn owner_from_row(user_id: i64) -> u64 {
    u64::try_from(user_id).unwrap_or(0)
}

#[async_trait]
impl SubscriberStore for PgSubscriberStore {
    async fn list_active(&self) -> Result<Vec<(u64, i64)>, RelayError> {
        let rows = self
            .client
            .query(
                "SELECT user_id, chat_id FROM telegram_notify_chat WHERE disabled = 0",
                &[],
            )
            .await
            .map_err(|e| RelayError::Store(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| (owner_from_row(row.get(0)), row.get(1)))
            .collect())
    }

    async fn get_subscription(&self, chat_id: i64) -> Result<Option<Subscription>, RelayError> {
        let row = self
            .client
            .query_opt(
                "SELECT chat_id, user_id, disabled FROM telegram_notify_chat WHERE chat_id = $1",
                &[&chat_id],
            )
            .await
            .map_err(|e| RelayError::Store(e.to_string()))?;

        Ok(row.map(|row| {
            let disabled: i16 = row.get(2);
            Subscription {
                owner_id: owner_from_row(row.get(1)),
                chat_id: row.get(0),
                active: disabled == 0,
            }
        }))
    }

    async fn upsert(&self, chat_id: i64, owner_id: u64) -> Result<(), RelayError> {
        let owner = i64::try_from(owner_id)
            .map_err(|_| RelayError::Store(format!("owner id {owner_id} out of range")))?;
        self.client
            .execute(
                "INSERT INTO telegram_notify_chat (chat_id, user_id, disabled) VALUES ($1, $2, 0)
                 ON CONFLICT (chat_id, user_id) DO UPDATE SET disabled = 0",
                &[&chat_id, &owner],
            )
            .await
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(())
    }

    async fn deactivate(&self, chat_id: i64) -> Result<(), RelayError> {
        self.client
            .execute(
                "UPDATE telegram_notify_chat SET disabled = 1 WHERE chat_id = $1 AND disabled = 0",
                &[&chat_id],
            )
            .await
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(())
    }
}
