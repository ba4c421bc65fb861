use crate::decode::decode_server_status;
use crate::doc::omit_values;
use mgo_statsd_component::config::ServerConfig;
use mgo_statsd_component::{FetchError, StatusDocument, StatusSource};
use mongodb::error::ErrorKind;
use mongodb::{bson, Client};
use std::time::Instant;
use tracing::{debug, trace};

/// Nesting shown when tracing raw responses.
const TRACE_DEPTH: usize = 2;

async fn get_server_status(client: &Client) -> mongodb::error::Result<bson::Document> {
    client
        .database("admin")
        .run_command(bson::doc! {"serverStatus": 1})
        .await
}

fn fetch_error(address: &str, err: mongodb::error::Error) -> FetchError {
    let address = address.to_string();
    if matches!(err.kind.as_ref(), ErrorKind::Command(_)) {
        FetchError::Command {
            address,
            source: err.into(),
        }
    } else {
        FetchError::Connect {
            address,
            source: err.into(),
        }
    }
}

/// Fetches `serverStatus` from a single server.
///
/// The client is created once per server and connects lazily, so an
/// unreachable server only fails its own fetches.
#[derive(Debug)]
pub struct MongoStatusSource {
    address: String,
    client: Client,
}

impl MongoStatusSource {
    pub fn new(server: &ServerConfig) -> Result<Self, FetchError> {
        let options = crate::config::client_options(server)
            .map_err(|err| fetch_error(&server.address, err))?;
        let client =
            Client::with_options(options).map_err(|err| fetch_error(&server.address, err))?;
        debug!(
            index = server.index,
            address = %server.address,
            authenticated = server.credentials.is_some(),
            "created mongodb client"
        );
        Ok(Self {
            address: server.address.clone(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl StatusSource for MongoStatusSource {
    fn address(&self) -> &str {
        &self.address
    }

    async fn fetch(&self) -> Result<StatusDocument, FetchError> {
        let start = Instant::now();
        let server_status = get_server_status(&self.client)
            .await
            .map_err(|err| fetch_error(&self.address, err))?;

        if tracing::enabled!(tracing::Level::TRACE) {
            trace!(
                address = %self.address,
                "serverStatus = {:#}",
                omit_values(bson::Bson::Document(server_status.clone()), TRACE_DEPTH)
            );
        }

        let document = decode_server_status(&server_status);
        if document.storage_engine_info.is_some() {
            trace!(address = %self.address, "WiredTiger data present");
        }
        debug!(
            address = %self.address,
            version = %document.version,
            "fetched serverStatus in {:?}",
            start.elapsed()
        );
        Ok(document)
    }
}
