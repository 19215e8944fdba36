use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::{config::NetworkConfig, models::Booking, traits::BookingSource};

/// API client for the booking service.
#[derive(Clone, Debug)]
pub struct BookingApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl BookingApiClient {
    /// Create a new API client with configurable timeouts.
    pub fn new(base_url: String, network_config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn bookings_url(&self) -> String {
        format!("{}/bookings", self.base_url)
    }

    /// Fetch every booking with at least one event on `date`.
    pub async fn fetch_bookings(&self, date: NaiveDate) -> Result<Vec<Booking>> {
        let url = format!("{}?date={}", self.bookings_url(), date.format("%Y-%m-%d"));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request to booking API")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("API returned error status: {}", status);
        }

        let bookings = response
            .json::<Vec<Booking>>()
            .await
            .context("Failed to parse booking API response")?;

        tracing::debug!("Fetched {} bookings for {}", bookings.len(), date);
        Ok(bookings)
    }
}

impl BookingSource for BookingApiClient {
    async fn fetch_bookings_for_date(&self, date: NaiveDate) -> Result<Vec<Booking>> {
        self.fetch_bookings(date).await
    }
}
