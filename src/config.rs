use std::{fmt, str::FromStr};

use anyhow::{Context, Result};

/// Upper bound for token lifetimes: one year.
const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// VirtualPin
// ---------------------------------------------------------------------------

/// A Blynk virtual pin identifier, e.g. `V0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualPin(u8);

impl VirtualPin {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }
}

impl FromStr for VirtualPin {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .trim()
            .strip_prefix(['V', 'v'])
            .with_context(|| format!("virtual pin must look like 'V<n>', got: {s:?}"))?;
        let index = digits
            .parse::<u8>()
            .with_context(|| format!("virtual pin index must be 0-255, got: {s:?}"))?;
        Ok(Self(index))
    }
}

impl fmt::Display for VirtualPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// Which virtual pin carries each relayed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualPins {
    pub temperature: VirtualPin,
    pub soil_moisture: VirtualPin,
    pub pump: VirtualPin,
}

impl Default for VirtualPins {
    fn default() -> Self {
        Self {
            temperature: VirtualPin::new(0),
            soil_moisture: VirtualPin::new(1),
            pump: VirtualPin::new(2),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// HS256 signing secret for access and refresh tokens.
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub jwt_access_ttl_secs: u64,
    /// Refresh token lifetime in seconds.
    pub jwt_refresh_ttl_secs: u64,
    pub blynk_base_url: String,
    /// Shared secret identifying the Blynk device.
    pub blynk_token: String,
    pub blynk_pins: VirtualPins,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            jwt_secret: non_empty(required("JWT_SECRET")?, "JWT_SECRET")?,
            jwt_access_ttl_secs: token_ttl(
                &optional("JWT_ACCESS_TTL_SECS", "300"),
                "JWT_ACCESS_TTL_SECS",
            )?,
            jwt_refresh_ttl_secs: token_ttl(
                &optional("JWT_REFRESH_TTL_SECS", "86400"),
                "JWT_REFRESH_TTL_SECS",
            )?,
            blynk_base_url: optional("BLYNK_BASE_URL", "https://blynk.cloud/external/api")
                .trim_end_matches('/')
                .to_owned(),
            blynk_token: non_empty(required("BLYNK_TOKEN")?, "BLYNK_TOKEN")?,
            blynk_pins: VirtualPins {
                temperature: optional("BLYNK_TEMPERATURE_PIN", "V0")
                    .parse()
                    .context("invalid BLYNK_TEMPERATURE_PIN")?,
                soil_moisture: optional("BLYNK_SOIL_MOISTURE_PIN", "V1")
                    .parse()
                    .context("invalid BLYNK_SOIL_MOISTURE_PIN")?,
                pump: optional("BLYNK_PUMP_PIN", "V2")
                    .parse()
                    .context("invalid BLYNK_PUMP_PIN")?,
            },
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn non_empty(value: String, key: &str) -> Result<String> {
    if value.trim().is_empty() {
        anyhow::bail!("env var {key} must not be empty");
    }
    Ok(value)
}

fn token_ttl(value: &str, key: &str) -> Result<u64> {
    let secs: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a positive integer, got: {value:?}"))?;
    if secs == 0 || secs > MAX_TOKEN_TTL_SECS {
        anyhow::bail!("{key} must be between 1 and {MAX_TOKEN_TTL_SECS} seconds, got: {secs}");
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_pin_parses_upper_and_lower_case() {
        assert_eq!("V0".parse::<VirtualPin>().unwrap(), VirtualPin::new(0));
        assert_eq!("v12".parse::<VirtualPin>().unwrap(), VirtualPin::new(12));
        assert_eq!(" V2 ".parse::<VirtualPin>().unwrap(), VirtualPin::new(2));
    }

    #[test]
    fn virtual_pin_missing_prefix_errors() {
        let err = "12".parse::<VirtualPin>().unwrap_err();
        assert!(err.to_string().contains("V<n>"));
    }

    #[test]
    fn virtual_pin_out_of_range_errors() {
        let err = "V256".parse::<VirtualPin>().unwrap_err();
        assert!(err.to_string().contains("0-255"));
    }

    #[test]
    fn virtual_pin_displays_with_prefix() {
        assert_eq!(VirtualPin::new(7).to_string(), "V7");
    }

    #[test]
    fn default_pins_match_relay_layout() {
        let pins = VirtualPins::default();
        assert_eq!(pins.temperature.to_string(), "V0");
        assert_eq!(pins.soil_moisture.to_string(), "V1");
        assert_eq!(pins.pump.to_string(), "V2");
    }

    #[test]
    fn non_empty_rejects_blank() {
        let err = non_empty("   ".to_owned(), "JWT_SECRET").unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
        assert_eq!(non_empty("s3cret".to_owned(), "JWT_SECRET").unwrap(), "s3cret");
    }

    #[test]
    fn token_ttl_accepts_sane_lifetimes() {
        assert_eq!(token_ttl("300", "JWT_ACCESS_TTL_SECS").unwrap(), 300);
        assert_eq!(
            token_ttl("31536000", "JWT_REFRESH_TTL_SECS").unwrap(),
            MAX_TOKEN_TTL_SECS
        );
    }

    #[test]
    fn token_ttl_rejects_zero_and_oversized() {
        for raw in ["0", "31536001", "10000000000000", "18446744073709551615"] {
            let err = token_ttl(raw, "JWT_ACCESS_TTL_SECS").unwrap_err();
            assert!(err.to_string().contains("JWT_ACCESS_TTL_SECS"), "{raw}");
        }
        assert!(token_ttl("-5", "JWT_ACCESS_TTL_SECS").is_err());
        assert!(token_ttl("soon", "JWT_ACCESS_TTL_SECS").is_err());
    }
}
