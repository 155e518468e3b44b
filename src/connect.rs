//! SQL Server session establishment.

use tiberius::{AuthMethod, Client, Config as TdsConfig, EncryptionLevel};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{PipelineError, Result};

/// Fixed server port; named-instance resolution is not supported.
const SQL_PORT: u16 = 1433;

/// The concrete client type every phase of the pipeline works against.
pub type SqlClient = Client<Compat<TcpStream>>;

/// Open an encrypted session to the configured server, validating the
/// server certificate, with SQL authentication.
///
/// An Azure SQL gateway may answer the login with a routing token naming
/// the node that owns the database; that redirect is followed once, with a
/// fresh TCP stream to the returned address. The whole sequence, redirect
/// included, must finish within `config.connect_timeout` or the attempt is
/// abandoned.
pub async fn connect(config: &Config) -> Result<SqlClient> {
    let session = async {
        match establish(config, &config.server, SQL_PORT).await {
            Ok(client) => Ok(client),
            Err(error) => match routing_target(&error) {
                Some((host, port)) => {
                    debug!(%host, port, "server redirected the session, reconnecting");
                    establish(config, &host, port).await
                }
                None => Err(error),
            },
        }
    };

    match timeout(config.connect_timeout, session).await {
        Ok(client) => {
            let client = client?;
            info!(server = %config.server, database = %config.database, "session established");
            Ok(client)
        }
        Err(_) => Err(PipelineError::ConnectTimeout {
            host: config.server.clone(),
            timeout: config.connect_timeout,
        }),
    }
}

/// One TCP + TLS + login attempt against `host:port`.
async fn establish(config: &Config, host: &str, port: u16) -> Result<SqlClient> {
    let mut tds = TdsConfig::new();
    tds.host(host);
    tds.port(port);
    tds.database(&config.database);
    tds.authentication(AuthMethod::sql_server(&config.user, &config.password));
    // Encrypt=yes; certificate validation stays on, so no trust_cert().
    tds.encryption(EncryptionLevel::Required);

    let addr = tds.get_addr();
    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|source| PipelineError::Tcp {
            addr: addr.clone(),
            source,
        })?;
    tcp.set_nodelay(true).map_err(|source| PipelineError::Tcp {
        addr: addr.clone(),
        source,
    })?;
    Client::connect(tds, tcp.compat_write())
        .await
        .map_err(|source| PipelineError::Connection {
            host: host.to_string(),
            source,
        })
}

/// The address a server-side routing response points at, when the failed
/// login carries one. Anything else is a plain failure to be surfaced.
fn routing_target(error: &PipelineError) -> Option<(String, u16)> {
    match error {
        PipelineError::Connection {
            source: tiberius::error::Error::Routing { host, port },
            ..
        } => Some((host.clone(), *port)),
        _ => None,
    }
}

/// Best-effort rollback of whatever transaction the session still holds.
/// Used on error paths right before the run aborts.
pub(crate) async fn rollback_quietly(client: &mut SqlClient) {
    if let Ok(stream) = client.simple_query("IF @@TRANCOUNT > 0 ROLLBACK TRAN").await {
        let _ = stream.into_results().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn login_routing_response_yields_the_redirect_address() {
        let error = PipelineError::Connection {
            host: "gateway.database.windows.net".to_string(),
            source: tiberius::error::Error::Routing {
                host: "worker.database.windows.net".to_string(),
                port: 11002,
            },
        };
        assert_eq!(
            routing_target(&error),
            Some(("worker.database.windows.net".to_string(), 11002))
        );
    }

    #[test]
    fn plain_failures_are_not_followed() {
        let login = PipelineError::Connection {
            host: "gateway.database.windows.net".to_string(),
            source: tiberius::error::Error::Utf8,
        };
        assert_eq!(routing_target(&login), None);

        let timeout = PipelineError::ConnectTimeout {
            host: "gateway.database.windows.net".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(routing_target(&timeout), None);
    }
}
