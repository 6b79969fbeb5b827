//! Scripted in-memory transport for unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::transport::{
    PushRequest, PushResponse, RegisterDeviceRequest, SyncTransport, TransportError,
    TransportResult,
};
use crate::models::{Conflict, ConflictId, DataType, DeviceId, Resolution, SyncMetadata};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Calls {
    pub(crate) generate_device_id: usize,
    pub(crate) register_device: usize,
    pub(crate) push: usize,
    pub(crate) fetch_status: usize,
    pub(crate) fetch_conflicts: usize,
    pub(crate) resolve_conflict: usize,
}

#[derive(Debug, Default)]
struct Script {
    device_ids: VecDeque<Option<String>>,
    push_responses: VecDeque<Option<PushResponse>>,
    resolve_results: VecDeque<bool>,
    conflicts: Vec<Conflict>,
    fail_fetch_conflicts: bool,
    fail_register: bool,
    status: Vec<SyncMetadata>,
    status_requests: Vec<(String, DeviceId)>,
    pushes: Vec<PushRequest>,
    registrations: Vec<RegisterDeviceRequest>,
    resolutions: Vec<(ConflictId, Resolution)>,
    calls: Calls,
    in_flight: usize,
    max_in_flight: usize,
}

#[derive(Debug, Default)]
struct PushPause {
    started: Notify,
    release: Notify,
}

/// Transport whose responses are queued up front by the test
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    pause: Option<Arc<PushPause>>,
}

fn scripted_failure() -> TransportError {
    TransportError::Unreachable("scripted failure".to_string())
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Hold every push until [`Self::release_push`] is called
    pub(crate) fn pausing(mut self) -> Self {
        self.pause = Some(Arc::new(PushPause::default()));
        self
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub(crate) fn set_next_device_id(&self, device_id: &str) {
        self.script()
            .device_ids
            .push_back(Some(device_id.to_string()));
    }

    pub(crate) fn fail_next_device_id(&self) {
        self.script().device_ids.push_back(None);
    }

    pub(crate) fn queue_push(&self, response: PushResponse) {
        self.script().push_responses.push_back(Some(response));
    }

    pub(crate) fn fail_next_push(&self) {
        self.script().push_responses.push_back(None);
    }

    pub(crate) fn set_conflicts(&self, conflicts: Vec<Conflict>) {
        self.script().conflicts = conflicts;
    }

    pub(crate) fn fail_fetch_conflicts(&self) {
        self.script().fail_fetch_conflicts = true;
    }

    pub(crate) fn fail_register(&self) {
        self.script().fail_register = true;
    }

    pub(crate) fn fail_next_resolve(&self) {
        self.script().resolve_results.push_back(false);
    }

    pub(crate) fn set_status(&self, status: Vec<SyncMetadata>) {
        self.script().status = status;
    }

    pub(crate) fn calls(&self) -> Calls {
        self.script().calls
    }

    pub(crate) fn pushes(&self) -> Vec<PushRequest> {
        self.script().pushes.clone()
    }

    pub(crate) fn registrations(&self) -> Vec<RegisterDeviceRequest> {
        self.script().registrations.clone()
    }

    pub(crate) fn status_requests(&self) -> Vec<(String, DeviceId)> {
        self.script().status_requests.clone()
    }

    pub(crate) fn resolutions(&self) -> Vec<(ConflictId, Resolution)> {
        self.script().resolutions.clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.script().max_in_flight
    }

    pub(crate) async fn push_started(&self) {
        if let Some(pause) = &self.pause {
            pause.started.notified().await;
        }
    }

    pub(crate) fn release_push(&self) {
        if let Some(pause) = &self.pause {
            pause.release.notify_one();
        }
    }
}

impl SyncTransport for ScriptedTransport {
    async fn generate_device_id(&self) -> TransportResult<DeviceId> {
        let mut script = self.script();
        script.calls.generate_device_id += 1;
        match script.device_ids.pop_front() {
            Some(Some(device_id)) => Ok(DeviceId::new(device_id)),
            Some(None) => Err(scripted_failure()),
            None => Ok(DeviceId::new("device-test")),
        }
    }

    async fn register_device(&self, request: &RegisterDeviceRequest) -> TransportResult<()> {
        let mut script = self.script();
        script.calls.register_device += 1;
        if script.fail_register {
            return Err(TransportError::Api {
                status: 400,
                message: "userId, deviceId, and dataType are required (400)".to_string(),
            });
        }
        script.registrations.push(request.clone());
        Ok(())
    }

    async fn push(&self, request: &PushRequest) -> TransportResult<PushResponse> {
        {
            let mut script = self.script();
            script.calls.push += 1;
            script.pushes.push(request.clone());
            script.in_flight += 1;
            script.max_in_flight = script.max_in_flight.max(script.in_flight);
        }

        if let Some(pause) = &self.pause {
            pause.started.notify_one();
            pause.release.notified().await;
        }

        let mut script = self.script();
        script.in_flight -= 1;
        match script.push_responses.pop_front() {
            Some(Some(response)) => Ok(response),
            Some(None) => Err(scripted_failure()),
            None => Ok(PushResponse {
                processed_changes: Some(request.changes.len().into()),
                ..PushResponse::default()
            }),
        }
    }

    async fn fetch_status(
        &self,
        user_id: &str,
        device_id: &DeviceId,
    ) -> TransportResult<Vec<SyncMetadata>> {
        let mut script = self.script();
        script.calls.fetch_status += 1;
        script
            .status_requests
            .push((user_id.to_string(), device_id.clone()));
        Ok(script
            .status
            .iter()
            .filter(|metadata| &metadata.device_id == device_id)
            .cloned()
            .collect())
    }

    async fn fetch_conflicts(&self, _user_id: &str) -> TransportResult<Vec<Conflict>> {
        let mut script = self.script();
        script.calls.fetch_conflicts += 1;
        if script.fail_fetch_conflicts {
            return Err(scripted_failure());
        }
        Ok(script.conflicts.clone())
    }

    async fn resolve_conflict(
        &self,
        conflict_id: &ConflictId,
        resolution: &Resolution,
    ) -> TransportResult<()> {
        let mut script = self.script();
        script.calls.resolve_conflict += 1;
        if !script.resolve_results.pop_front().unwrap_or(true) {
            return Err(TransportError::Api {
                status: 503,
                message: "Internal server error (503)".to_string(),
            });
        }
        script
            .resolutions
            .push((conflict_id.clone(), resolution.clone()));
        script
            .conflicts
            .retain(|conflict| &conflict.id != conflict_id);
        Ok(())
    }
}

/// Minimal server-side conflict record
pub(crate) fn conflict_record(id: &str, data_type: DataType, data_id: &str) -> Conflict {
    serde_json::from_value(serde_json::json!({
        "_id": id,
        "dataType": data_type,
        "dataId": data_id,
        "localVersion": {"data": {"side": "local"}, "deviceId": "laptop"},
        "remoteVersion": {"data": {"side": "remote"}, "deviceId": "phone"},
    }))
    .unwrap()
}
