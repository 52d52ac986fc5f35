use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    InProgress,
    Completed,
}

/// Tells the scheduling backend where an appointment's call stands.
/// Failures are logged by the caller and never end the call.
#[async_trait]
pub trait AppointmentReporter: Send + Sync + 'static {
    async fn report(&self, appointment_id: &str, status: AppointmentStatus) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

#[async_trait]
impl AppointmentReporter for NoopReporter {
    async fn report(&self, _appointment_id: &str, _status: AppointmentStatus) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusUpdate {
    status: AppointmentStatus,
}

/// `PUT {api_base}/appointments/{id}` with `{"status": ...}`.
#[derive(Debug, Clone)]
pub struct HttpAppointmentReporter {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl HttpAppointmentReporter {
    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            token,
        }
    }

    pub fn url_for(&self, appointment_id: &str) -> String {
        format!(
            "{}/appointments/{}",
            self.api_base.trim_end_matches('/'),
            appointment_id
        )
    }
}

#[async_trait]
impl AppointmentReporter for HttpAppointmentReporter {
    async fn report(&self, appointment_id: &str, status: AppointmentStatus) -> Result<()> {
        let url = self.url_for(appointment_id);
        let mut request = self.client.put(&url).json(&StatusUpdate { status });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .with_context(|| format!("PUT {} failed", url))?
            .error_for_status()
            .with_context(|| format!("PUT {} rejected", url))?;

        info!("Appointment {} marked {:?}", appointment_id, status);
        Ok(())
    }
}

/// Keeps every report in memory, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    reports: Arc<Mutex<Vec<(String, AppointmentStatus)>>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<(String, AppointmentStatus)> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AppointmentReporter for RecordingReporter {
    async fn report(&self, appointment_id: &str, status: AppointmentStatus) -> Result<()> {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push((appointment_id.to_owned(), status));
        }
        Ok(())
    }
}
