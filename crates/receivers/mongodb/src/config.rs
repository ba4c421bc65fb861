use mgo_statsd_component::config::{Credentials, ServerConfig};
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use std::time::Duration;

/// Bound on connection establishment and server selection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub const APP_NAME: &str = "mgo-statsd";

fn credential(credentials: &Credentials) -> Credential {
    let mut credential = Credential::default();
    credential.username = Some(credentials.username.clone());
    credential.password = Some(credentials.password.clone());
    credential.source = Some(credentials.auth_db.clone());
    credential
}

/// Options for a direct connection to exactly one server.
pub fn client_options(server: &ServerConfig) -> mongodb::error::Result<ClientOptions> {
    let mut options = ClientOptions::default();
    options.hosts = vec![ServerAddress::parse(&server.address)?];
    options.direct_connection = Some(true);
    options.connect_timeout = Some(CONNECT_TIMEOUT);
    options.server_selection_timeout = Some(CONNECT_TIMEOUT);
    options.max_pool_size = Some(1);
    options.app_name = Some(APP_NAME.to_string());
    options.credential = server.credentials.as_ref().map(credential);
    Ok(options)
}
