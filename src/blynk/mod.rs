pub mod models;
#[cfg(test)]
pub(crate) mod stub;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use tracing::debug;

use crate::config::{Config, VirtualPin, VirtualPins};

use self::models::{encode_switch, PinValue};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the Blynk cloud HTTP API.
///
/// Every call is a plain `GET` keyed by the device token. The token travels in
/// the query string, so request URLs are stripped from errors before they are
/// reported anywhere.
#[derive(Debug, Clone)]
pub struct BlynkClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    token: String,
    pins: VirtualPins,
}

impl BlynkClient {
    pub fn new(base_url: &str, token: &str, pins: VirtualPins) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build Blynk HTTP client")?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.trim_end_matches('/').to_owned(),
                token: token.to_owned(),
                pins,
            }),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.blynk_base_url, &config.blynk_token, config.blynk_pins)
    }

    pub fn pins(&self) -> VirtualPins {
        self.inner.pins
    }

    /// Read the current value of a virtual pin.
    pub async fn get_pin(&self, pin: VirtualPin) -> Result<PinValue> {
        let pin = pin.to_string();
        let url = self.url("get", &[("pin", &pin)])?;
        debug!(pin = %pin, "Fetching Blynk pin value");

        let bytes = self
            .inner
            .http
            .get(url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Blynk get request failed")?
            .error_for_status()
            .map_err(reqwest::Error::without_url)
            .context("Blynk get endpoint returned error status")?
            .bytes()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to read Blynk get response body")?;

        PinValue::parse(&bytes).with_context(|| format!("Unusable value for Blynk pin {pin}"))
    }

    /// Write a value to a virtual pin.
    pub async fn set_pin(&self, pin: VirtualPin, value: &str) -> Result<()> {
        let pin = pin.to_string();
        let url = self.url("update", &[("pin", &pin), ("value", value)])?;
        debug!(pin = %pin, value = %value, "Updating Blynk pin value");

        self.inner
            .http
            .get(url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Blynk update request failed")?
            .error_for_status()
            .map_err(reqwest::Error::without_url)
            .context("Blynk update endpoint returned error status")?;

        Ok(())
    }

    /// Temperature in degrees Celsius.
    pub async fn temperature(&self) -> Result<f64> {
        let pin = self.inner.pins.temperature;
        numeric(pin, self.get_pin(pin).await?)
    }

    /// Soil moisture in percent.
    pub async fn soil_moisture(&self) -> Result<f64> {
        let pin = self.inner.pins.soil_moisture;
        numeric(pin, self.get_pin(pin).await?)
    }

    /// Whether the pump relay is currently on.
    pub async fn pump_on(&self) -> Result<bool> {
        let pin = self.inner.pins.pump;
        self.get_pin(pin)
            .await?
            .as_switch()
            .with_context(|| format!("Blynk pin {pin} does not hold a switch state"))
    }

    /// Switch the pump relay on or off.
    pub async fn set_pump(&self, on: bool) -> Result<()> {
        self.set_pin(self.inner.pins.pump, &encode_switch(on).to_string())
            .await
    }

    fn url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url> {
        let base = format!("{}/{}", self.inner.base_url, endpoint);
        let token = [("token", self.inner.token.as_str())];
        Url::parse_with_params(&base, token.iter().chain(params.iter()))
            .with_context(|| format!("invalid Blynk base URL: {}", self.inner.base_url))
    }
}

fn numeric(pin: VirtualPin, value: PinValue) -> Result<f64> {
    value
        .as_f64()
        .with_context(|| format!("Blynk pin {pin} does not hold a number: {value:?}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
