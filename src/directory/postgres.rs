//! Postgres-backed principal directory.

use async_trait::async_trait;
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::error;

use super::{DirectoryError, Principal, PrincipalDirectory};

/// Principal directory backed by the relational user store.
pub struct PostgresDirectory {
    client: tokio_postgres::Client,
    query_timeout: Duration,
}

impl PostgresDirectory {
    /// Connect to the directory database at `uri`.
    ///
    /// The connection is driven by a background task for the lifetime of
    /// the process; if it fails, subsequent queries surface the error.
    pub async fn connect(uri: &str, query_timeout: Duration) -> Result<Self, DirectoryError> {
        let (client, connection) = tokio_postgres::connect(uri, NoTls)
            .await
            .map_err(|e| DirectoryError::Backend(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "principal directory connection failed");
            }
        });

        Ok(Self {
            client,
            query_timeout,
        })
    }
}

#[async_trait]
impl PrincipalDirectory for PostgresDirectory {
    async fn find_by_credential(
        &self,
        credential: &str,
    ) -> Result<Option<Principal>, DirectoryError> {
        let params: [&(dyn tokio_postgres::types::ToSql + Sync); 1] = [&credential];
        let query = self.client.query_opt(
            "select api_key, ratelimit_300 from users_api where api_key = $1",
            &params,
        );

        let row = match tokio::time::timeout(self.query_timeout, query).await {
            Ok(result) => result.map_err(|e| DirectoryError::Backend(e.to_string()))?,
            Err(_) => return Err(DirectoryError::Timeout(self.query_timeout)),
        };

        Ok(row.map(|row| Principal {
            identifier: row.get::<_, String>(0),
            quota_per_window: i64::from(row.get::<_, i32>(1)),
        }))
    }
}
