use cadence::prelude::*;
use cadence::{MetricResult, StatsdClient, UdpMetricSink};
use std::net::{Ipv4Addr, UdpSocket};

/// Destination of gauge samples.
#[async_trait::async_trait]
pub trait GaugeSink: Send {
    async fn gauge(&mut self, metric: &str, value: i64) -> MetricResult<()>;
}

/// Opens a [`GaugeSink`] that prepends `prefix` to every metric name.
#[async_trait::async_trait]
pub trait Connect: std::fmt::Debug + Send + Sync + 'static {
    type Sink: GaugeSink;

    fn endpoint(&self) -> &str;

    async fn connect(&self, prefix: &str) -> MetricResult<Self::Sink>;
}

#[async_trait::async_trait]
impl GaugeSink for StatsdClient {
    async fn gauge(&mut self, metric: &str, value: i64) -> MetricResult<()> {
        // cadence gauges are unsigned or floating point
        match u64::try_from(value) {
            Ok(value) => Gauged::<u64>::gauge(self, metric, value)?,
            Err(_) => Gauged::<f64>::gauge(self, metric, value as f64)?,
        };
        Ok(())
    }
}

/// Builds an unbuffered [`StatsdClient`] per emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsdConnector {
    endpoint: String,
}

impl StatsdConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait::async_trait]
impl Connect for StatsdConnector {
    type Sink = StatsdClient;

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn connect(&self, prefix: &str) -> MetricResult<Self::Sink> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_nonblocking(true)?;
        let sink = UdpMetricSink::from(self.endpoint.as_str(), socket)?;
        Ok(StatsdClient::from_sink(prefix, sink))
    }
}
