//! The shared state container: the controller owns one
//! `Context` for the process's lifetime and hands channels a narrow
//! [`ChannelHandle`] rather than the whole aggregate, so channel
//! workers can't reach back into controller-only state.

use crate::activity::{ActivityQueue, RollingWindow};
use crate::control::Control;
use crate::data_item::DataItem;
use crate::endpoint::Endpoint;
use crate::pipe::StreamPipe;
use crate::schema::RecordDescriptor;
use crate::status::{Status, StatusCell};
use crate::token::GenerationToken;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Placeholder layout for the ingress pipe before the controller has
/// learned a real one from an `Incoming` message's `layout` field.
fn unconfigured_ingress_pipe() -> StreamPipe {
    StreamPipe::new(
        "",
        RecordDescriptor::parse("uint8").expect("literal schema always parses"),
    )
}

/// Latitude/longitude of the sensor this subsystem instance serves,
/// published on `Chains/<c>/Setup` and read by user processing code.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorOrigin {
    pub latitude: f64,
    pub longitude: f64,
}

/// The narrow view a channel worker is given of the process-wide
/// context: enough to run, nothing that lets it mutate controller-owned
/// state directly.
#[derive(Clone)]
pub struct ChannelHandle {
    pub module_uid: Arc<str>,
    pub generation: GenerationToken,
    pub endpoint: Arc<ArcSwap<Endpoint>>,
    pub activity: Arc<ActivityQueue>,
    pub status: Arc<StatusCell>,
    pub sensor_origin: Arc<ArcSwap<SensorOrigin>>,
}

impl ChannelHandle {
    fn new(module_uid: Arc<str>, sensor_origin: Arc<ArcSwap<SensorOrigin>>) -> Self {
        ChannelHandle {
            module_uid,
            generation: GenerationToken::new(),
            endpoint: Arc::new(ArcSwap::from_pointee(Endpoint::unknown())),
            activity: Arc::new(ActivityQueue::new()),
            // A freshly created component starts Operational, not Unknown —
            // matches the original's `Component.__init__` default, so a
            // subsystem that never joins a chain still reports Operational.
            status: Arc::new(StatusCell::new(Status::Operational)),
            sensor_origin,
        }
    }

    pub fn endpoint(&self) -> Arc<Endpoint> {
        self.endpoint.load_full()
    }

    pub fn set_endpoint(&self, endpoint: Endpoint) {
        self.endpoint.store(Arc::new(endpoint));
    }
}

/// Aggregate process state for the subsystem's entire lifetime.
pub struct Context {
    pub module_uid: String,
    pub module_name: String,
    pub broker: Endpoint,

    chain_uid: ArcSwap<String>,
    is_chain_running: AtomicBool,
    is_subsystem_chained: AtomicBool,
    sensor_origin: Arc<ArcSwap<SensorOrigin>>,

    pub controls: Vec<Arc<dyn Control>>,
    pub data_items: Vec<Arc<DataItem>>,
    pub output_pipes: Vec<StreamPipe>,
    ingress_pipe: ArcSwap<StreamPipe>,

    pub ingress: ChannelHandle,
    pub egress: ChannelHandle,

    status: StatusCell,
    is_terminated: AtomicBool,

    pub rates: RollingWindow,
    error_samples: AtomicU32,
}

impl Context {
    pub fn new(
        module_uid: impl Into<String>,
        module_name: impl Into<String>,
        broker: Endpoint,
        controls: Vec<Arc<dyn Control>>,
        data_items: Vec<Arc<DataItem>>,
        output_pipes: Vec<StreamPipe>,
    ) -> Self {
        let module_uid: Arc<str> = Arc::from(module_uid.into().into_boxed_str());
        let sensor_origin = Arc::new(ArcSwap::from_pointee(SensorOrigin::default()));
        Context {
            module_uid: module_uid.to_string(),
            module_name: module_name.into(),
            broker,
            chain_uid: ArcSwap::from_pointee(String::new()),
            is_chain_running: AtomicBool::new(false),
            is_subsystem_chained: AtomicBool::new(false),
            sensor_origin: sensor_origin.clone(),
            controls,
            data_items,
            output_pipes,
            ingress_pipe: ArcSwap::from_pointee(unconfigured_ingress_pipe()),
            ingress: ChannelHandle::new(module_uid.clone(), sensor_origin.clone()),
            egress: ChannelHandle::new(module_uid, sensor_origin),
            status: StatusCell::default(),
            is_terminated: AtomicBool::new(false),
            rates: RollingWindow::new(),
            error_samples: AtomicU32::new(0),
        }
    }

    pub fn chain_uid(&self) -> String {
        (**self.chain_uid.load()).clone()
    }

    pub fn set_chain_uid(&self, uid: impl Into<String>) {
        self.chain_uid.store(Arc::new(uid.into()));
    }

    pub fn is_chain_running(&self) -> bool {
        self.is_chain_running.load(Ordering::Acquire)
    }

    pub fn set_is_chain_running(&self, value: bool) {
        self.is_chain_running.store(value, Ordering::Release);
    }

    pub fn is_subsystem_chained(&self) -> bool {
        self.is_subsystem_chained.load(Ordering::Acquire)
    }

    pub fn set_is_subsystem_chained(&self, value: bool) {
        self.is_subsystem_chained.store(value, Ordering::Release);
    }

    /// `is_running = is_chain_running ∧ is_subsystem_chained`.
    pub fn is_running(&self) -> bool {
        self.is_chain_running() && self.is_subsystem_chained()
    }

    /// The ingress channel's current pipe: its stream key and record
    /// layout, learned from the most recent `Incoming` message.
    pub fn ingress_pipe(&self) -> StreamPipe {
        (**self.ingress_pipe.load()).clone()
    }

    pub fn set_ingress_pipe(&self, pipe: StreamPipe) {
        self.ingress_pipe.store(Arc::new(pipe));
    }

    pub fn sensor_origin(&self) -> SensorOrigin {
        **self.sensor_origin.load()
    }

    pub fn set_sensor_origin(&self, origin: SensorOrigin) {
        self.sensor_origin.store(Arc::new(origin));
    }

    pub fn is_terminated(&self) -> bool {
        self.is_terminated.load(Ordering::Acquire)
    }

    pub fn terminate(&self) {
        self.is_terminated.store(true, Ordering::Release);
    }

    /// Aggregated status: the maximum severity across the context
    /// itself and both channels.
    pub fn aggregated_status(&self) -> Status {
        crate::status::aggregate([
            self.status.get(),
            self.ingress.status.get(),
            self.egress.status.get(),
        ])
    }

    pub fn set_status(&self, status: Status) {
        self.status.set(status);
    }

    /// Hook for user processing loops to report faults they detect in
    /// their own business logic; folded into the next tick's `errors`
    /// indicator alongside channel activity. Nothing in the runtime
    /// itself calls this — the original's own error-count aggregation
    /// was never wired up either (`determine_error_count` returns a
    /// literal `"000000"`), so without a caller the indicator reads as
    /// all zeros, matching that behavior exactly.
    pub fn record_error(&self, count: u32) {
        self.error_samples.fetch_add(count, Ordering::AcqRel);
    }

    /// Folds this tick's ingress/egress activity and error samples into
    /// the rolling window and returns the fresh `(throughput, errors)`
    /// indicator pair for the `Rates` topic.
    pub fn advance_rates_tick(&self) -> (String, String) {
        let throughput = (self.ingress.activity.drain_total() + self.egress.activity.drain_total()) as u32;
        let errors = self.error_samples.swap(0, Ordering::AcqRel);
        self.rates.advance(throughput, errors);
        (self.rates.throughput_indicator(), self.rates.error_indicator())
    }

    pub fn find_control(&self, uid: &str) -> Option<&Arc<dyn Control>> {
        self.controls.iter().find(|c| c.uid() == uid)
    }

    pub fn find_data_item(&self, key: &str) -> Option<&Arc<DataItem>> {
        self.data_items.iter().find(|d| d.key() == key)
    }

    pub fn find_pipe(&self, key: &str) -> Option<&StreamPipe> {
        self.output_pipes.iter().find(|p| p.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Protocol;

    fn sample_context() -> Context {
        Context::new(
            "m1",
            "radar-front",
            Endpoint::new(Protocol::Mqtt, "127.0.0.1", 1883, vec![]),
            vec![],
            vec![],
            vec![],
        )
    }

    #[test]
    fn is_running_requires_both_flags() {
        let ctx = sample_context();
        assert!(!ctx.is_running());
        ctx.set_is_chain_running(true);
        assert!(!ctx.is_running());
        ctx.set_is_subsystem_chained(true);
        assert!(ctx.is_running());
    }

    #[test]
    fn aggregated_status_is_max_severity() {
        let ctx = sample_context();
        ctx.ingress.status.set(Status::Caution);
        ctx.egress.status.set(Status::Failure);
        assert_eq!(ctx.aggregated_status(), Status::Failure);
    }
}
