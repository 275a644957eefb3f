// HTTP API for relaycast

pub mod http;
