use log::debug;
use rester_engine::{Request, Response, Transport, TransportError};
use reqwest::{blocking::Client, Method};
use std::time::Duration;

/// Blocking HTTP transport. Redirects follow reqwest's default policy.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Transport for HttpTransport {
    fn invoke(&self, request: &Request) -> Result<Response, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|err| TransportError(format!("{}: {}", request.method, err)))?;

        let mut builder = self.client.request(method, &request.uri);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .map_err(|err| TransportError(err.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_str().unwrap_or("").to_string()))
            .collect();
        let body = response
            .bytes()
            .map_err(|err| TransportError(err.to_string()))?
            .to_vec();

        debug!("{} {} -> {}", request.method, request.uri, status);

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
