// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared machinery of every virtual sensor
//!
//! [`VirtualSensorCore`] owns the parts that do not depend on what a sensor
//! computes: upstream resolution, start reference counting, interval
//! aggregation and activation in the dispatcher. [`VirtualSensor`] wraps a
//! core and a [`Synthesis`] strategy into a full [`Sensor`].

use crate::core::{HubError, Result};
use crate::events::ActiveVirtualSensors;
use crate::fusion::FusionSource;
use crate::sensors::{
    check_data_type, IntervalTracker, Sensor, SensorHandle, SensorRegistry, StartCounter,
    Synthesizable,
};
use parking_lot::{Mutex, RwLock};
use sensord_protocol::{
    EventType, SensorData, SensorDescriptor, SensorEvent, SensorId, SensorPrivilege, SensorType,
    POLL_MAX_HZ_MS,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Descriptor for a virtual sensor
pub fn virtual_descriptor(
    sensor_type: SensorType,
    name: &str,
    privilege: SensorPrivilege,
    range: f32,
    supported_event_types: Vec<EventType>,
) -> SensorDescriptor {
    SensorDescriptor {
        sensor_type,
        id: SensorId::new(sensor_type, 0),
        privilege,
        name: name.to_string(),
        vendor: "sensord".to_string(),
        min_range: -range,
        max_range: range,
        resolution: 0.01,
        min_interval_ms: POLL_MAX_HZ_MS as i32,
        fifo_count: 0,
        max_batch_count: 0,
        supported_event_types,
    }
}

pub struct VirtualSensorCore {
    descriptor: SensorDescriptor,
    required: Vec<SensorType>,
    optional: Vec<SensorType>,
    upstreams: RwLock<Vec<SensorHandle>>,
    starts: StartCounter,
    intervals: Mutex<IntervalTracker>,
    active: Arc<ActiveVirtualSensors>,
}

impl VirtualSensorCore {
    pub fn new(
        descriptor: SensorDescriptor,
        required: Vec<SensorType>,
        optional: Vec<SensorType>,
        active: Arc<ActiveVirtualSensors>,
        default_interval_ms: u32,
    ) -> Self {
        Self {
            descriptor,
            required,
            optional,
            upstreams: RwLock::new(Vec::new()),
            starts: StartCounter::new(),
            intervals: Mutex::new(IntervalTracker::new(default_interval_ms)),
            active,
        }
    }

    pub fn descriptor(&self) -> &SensorDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> SensorId {
        self.descriptor.id
    }

    /// Resolve upstream sensors; a missing required type fails the module
    pub fn init(&self, registry: &SensorRegistry) -> Result<()> {
        let mut upstreams = Vec::new();
        for sensor_type in &self.required {
            let sensor = registry.resolve_sensor(*sensor_type).map_err(|e| {
                HubError::NotFound(format!(
                    "{} requires {}: {}",
                    self.descriptor.name, sensor_type, e
                ))
            })?;
            upstreams.push(sensor);
        }
        for sensor_type in &self.optional {
            match registry.resolve_sensor(*sensor_type) {
                Ok(sensor) => upstreams.push(sensor),
                Err(_) => debug!(
                    "🦀 [VIRTUAL] {} runs without optional {}",
                    self.descriptor.name, sensor_type
                ),
            }
        }
        *self.upstreams.write() = upstreams;
        Ok(())
    }

    pub fn upstream(&self, sensor_type: SensorType) -> Option<SensorHandle> {
        self.upstreams
            .read()
            .iter()
            .find(|s| s.sensor_type() == sensor_type)
            .cloned()
    }

    pub fn has_upstream(&self, sensor_type: SensorType) -> bool {
        self.upstream(sensor_type).is_some()
    }

    pub fn upstream_ids(&self) -> Vec<SensorId> {
        self.upstreams.read().iter().map(|s| s.id()).collect()
    }

    /// Start upstreams and activate synthesis; true on the first start
    pub fn start(&self) -> Result<bool> {
        let first = self.starts.start_with(|| {
            let interval = self.interval_ms();
            let upstreams = self.upstreams.read().clone();
            for (started, upstream) in upstreams.iter().enumerate() {
                let result = upstream
                    .add_interval(self.id().raw(), interval, true)
                    .and_then(|_| upstream.start());
                if let Err(e) = result {
                    for prior in &upstreams[..started] {
                        let _ = prior.stop();
                        let _ = prior.delete_interval(self.id().raw(), true);
                    }
                    let _ = upstream.delete_interval(self.id().raw(), true);
                    return Err(e);
                }
            }
            self.active.add(self.id());
            Ok(())
        })?;
        if first {
            info!("🦀 [VIRTUAL] {} started", self.descriptor.name);
        }
        Ok(first)
    }

    /// Deactivate synthesis and release upstreams; true on the last stop
    pub fn stop(&self) -> Result<bool> {
        let last = self.starts.stop_with(|| {
            self.active.delete(self.id());
            for upstream in self.upstreams.read().iter() {
                if let Err(e) = upstream.stop() {
                    warn!(
                        "🦀 [VIRTUAL] {} failed to stop upstream {}: {}",
                        self.descriptor.name,
                        upstream.id(),
                        e
                    );
                }
                let _ = upstream.delete_interval(self.id().raw(), true);
            }
            Ok(())
        })?;
        if last {
            info!("🦀 [VIRTUAL] {} stopped", self.descriptor.name);
        }
        Ok(last)
    }

    pub fn is_started(&self) -> bool {
        self.starts.count() > 0
    }

    pub fn add_interval(&self, listener: i64, interval_ms: u32, is_processor: bool) -> Result<()> {
        if interval_ms == 0 {
            return Err(HubError::InvalidArgument("interval must be positive".to_string()));
        }
        let (previous, changed) = {
            let mut intervals = self.intervals.lock();
            let previous = intervals.get(listener, is_processor);
            (previous, intervals.add(listener, is_processor, interval_ms))
        };
        if changed {
            if let Err(e) = self.propagate_interval() {
                self.intervals.lock().restore(listener, is_processor, previous);
                // Upstreams that accepted the new rate go back to the old one
                let _ = self.propagate_interval();
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn delete_interval(&self, listener: i64, is_processor: bool) -> Result<()> {
        let changed = self.intervals.lock().delete(listener, is_processor);
        if changed {
            self.propagate_interval()?;
        }
        Ok(())
    }

    pub fn interval_ms(&self) -> u32 {
        self.intervals.lock().min_interval()
    }

    /// Upstreams sample at least as fast as this sensor's fastest listener
    fn propagate_interval(&self) -> Result<()> {
        if !self.is_started() {
            return Ok(());
        }
        let interval = self.interval_ms();
        for upstream in self.upstreams.read().iter() {
            upstream.add_interval(self.id().raw(), interval, true)?;
        }
        Ok(())
    }
}

/// What a virtual sensor computes from upstream events
pub trait Synthesis: Send + Sync + 'static {
    fn synthesize(&self, core: &VirtualSensorCore, event: &SensorEvent) -> Vec<SensorEvent>;

    /// Drop cached inputs once the last listener stopped
    fn reset(&self) {}

    fn as_fusion(&self) -> Option<&dyn FusionSource> {
        None
    }
}

/// A [`VirtualSensorCore`] plus its synthesis strategy
pub struct VirtualSensor<S: Synthesis> {
    core: VirtualSensorCore,
    synthesis: S,
    last_output: Mutex<Option<SensorData>>,
}

impl<S: Synthesis> VirtualSensor<S> {
    pub fn with_synthesis(core: VirtualSensorCore, synthesis: S) -> Self {
        Self {
            core,
            synthesis,
            last_output: Mutex::new(None),
        }
    }

    pub fn core(&self) -> &VirtualSensorCore {
        &self.core
    }

    pub fn synthesis(&self) -> &S {
        &self.synthesis
    }
}

impl<S: Synthesis> Sensor for VirtualSensor<S> {
    fn init(&self, registry: &SensorRegistry) -> Result<()> {
        self.core.init(registry)
    }

    fn descriptor(&self) -> &SensorDescriptor {
        self.core.descriptor()
    }

    fn is_virtual(&self) -> bool {
        true
    }

    fn start(&self) -> Result<()> {
        self.core.start().map(|_| ())
    }

    fn stop(&self) -> Result<()> {
        if self.core.stop()? {
            self.synthesis.reset();
        }
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.core.is_started()
    }

    fn add_interval(&self, listener: i64, interval_ms: u32, is_processor: bool) -> Result<()> {
        self.core.add_interval(listener, interval_ms, is_processor)
    }

    fn delete_interval(&self, listener: i64, is_processor: bool) -> Result<()> {
        self.core.delete_interval(listener, is_processor)
    }

    fn interval_ms(&self) -> u32 {
        self.core.interval_ms()
    }

    fn get_data(&self, data_type: u32) -> Result<SensorData> {
        check_data_type(self.core.descriptor(), data_type)?;
        self.last_output
            .lock()
            .ok_or_else(|| HubError::NoData(format!("{} has no output yet", self.core.id())))
    }

    fn as_synthesizable(&self) -> Option<&dyn Synthesizable> {
        Some(self)
    }

    fn as_fusion(&self) -> Option<&dyn FusionSource> {
        self.synthesis.as_fusion()
    }
}

impl<S: Synthesis> Synthesizable for VirtualSensor<S> {
    fn upstream_ids(&self) -> Vec<SensorId> {
        self.core.upstream_ids()
    }

    fn synthesize(&self, event: &SensorEvent) -> Vec<SensorEvent> {
        let derived = self.synthesis.synthesize(&self.core, event);
        if let Some(last) = derived.last() {
            *self.last_output.lock() = Some(last.data);
        }
        derived
    }
}

/// Build an output event of `core`'s sensor carrying `values`
pub(crate) fn output_event(
    core: &VirtualSensorCore,
    event_type: EventType,
    source: &SensorEvent,
    values: &[f32],
) -> Option<SensorEvent> {
    match SensorData::new(source.data.timestamp, source.data.accuracy, values) {
        Ok(data) => Some(SensorEvent::new(event_type, core.id(), data)),
        Err(e) => {
            warn!("🦀 [VIRTUAL] {} produced an invalid sample: {}", core.id(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Upstream double that records starts and processor intervals
    struct StubSensor {
        descriptor: SensorDescriptor,
        starts: AtomicUsize,
        fail_start: AtomicBool,
        reject_below_ms: u32,
        intervals: Mutex<IntervalTracker>,
    }

    impl StubSensor {
        fn new(sensor_type: SensorType, reject_below_ms: u32) -> Arc<Self> {
            Arc::new(Self {
                descriptor: virtual_descriptor(
                    sensor_type,
                    "stub",
                    SensorPrivilege::Public,
                    1.0,
                    vec![EventType::raw_data(sensor_type)],
                ),
                starts: AtomicUsize::new(0),
                fail_start: AtomicBool::new(false),
                reject_below_ms,
                intervals: Mutex::new(IntervalTracker::new(1000)),
            })
        }

        fn starts(&self) -> usize {
            self.starts.load(Ordering::SeqCst)
        }

        fn interval_for(&self, listener: SensorId) -> Option<u32> {
            self.intervals.lock().get(listener.raw(), true)
        }
    }

    impl Sensor for StubSensor {
        fn init(&self, _registry: &SensorRegistry) -> Result<()> {
            Ok(())
        }

        fn descriptor(&self) -> &SensorDescriptor {
            &self.descriptor
        }

        fn start(&self) -> Result<()> {
            if self.fail_start.load(Ordering::SeqCst) {
                return Err(HubError::Unsupported("stub refuses to start".to_string()));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<()> {
            self.starts.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_started(&self) -> bool {
            self.starts() > 0
        }

        fn add_interval(&self, listener: i64, interval_ms: u32, is_processor: bool) -> Result<()> {
            if interval_ms < self.reject_below_ms {
                return Err(HubError::InvalidArgument(format!("{} ms", interval_ms)));
            }
            self.intervals.lock().add(listener, is_processor, interval_ms);
            Ok(())
        }

        fn delete_interval(&self, listener: i64, is_processor: bool) -> Result<()> {
            self.intervals.lock().delete(listener, is_processor);
            Ok(())
        }

        fn interval_ms(&self) -> u32 {
            self.intervals.lock().min_interval()
        }

        fn get_data(&self, _data_type: u32) -> Result<SensorData> {
            Err(HubError::NoData("stub".to_string()))
        }
    }

    struct Fixture {
        accel: Arc<StubSensor>,
        gyro: Arc<StubSensor>,
        active: Arc<ActiveVirtualSensors>,
        core: VirtualSensorCore,
    }

    /// Gravity-like core: accelerometer required, gyroscope optional
    fn fixture(reject_below_ms: u32) -> Fixture {
        let registry = SensorRegistry::new();
        let accel = StubSensor::new(SensorType::Accelerometer, reject_below_ms);
        let gyro = StubSensor::new(SensorType::Gyroscope, 0);
        registry.register_sensor(accel.clone()).unwrap();
        registry.register_sensor(gyro.clone()).unwrap();

        let active = Arc::new(ActiveVirtualSensors::new());
        let core = VirtualSensorCore::new(
            virtual_descriptor(
                SensorType::Gravity,
                "gravity",
                SensorPrivilege::Public,
                20.0,
                vec![EventType::raw_data(SensorType::Gravity)],
            ),
            vec![SensorType::Accelerometer],
            vec![SensorType::Gyroscope],
            Arc::clone(&active),
            1000,
        );
        core.init(&registry).unwrap();
        Fixture {
            accel,
            gyro,
            active,
            core,
        }
    }

    #[test]
    fn test_required_upstream_must_exist() {
        let registry = SensorRegistry::new();
        let core = VirtualSensorCore::new(
            virtual_descriptor(SensorType::Gravity, "gravity", SensorPrivilege::Public, 20.0, vec![]),
            vec![SensorType::Accelerometer],
            vec![SensorType::Gyroscope],
            Arc::new(ActiveVirtualSensors::new()),
            1000,
        );
        assert!(matches!(core.init(&registry), Err(HubError::NotFound(_))));

        registry
            .register_sensor(StubSensor::new(SensorType::Accelerometer, 0))
            .unwrap();
        core.init(&registry).unwrap();
        assert_eq!(
            core.upstream_ids(),
            vec![SensorId::new(SensorType::Accelerometer, 0)]
        );
        assert!(!core.has_upstream(SensorType::Gyroscope));
    }

    #[test]
    fn test_upstreams_follow_start_references() {
        let f = fixture(0);
        assert!(f.core.start().unwrap());
        assert!(!f.core.start().unwrap());
        assert_eq!(f.accel.starts(), 1);
        assert_eq!(f.gyro.starts(), 1);
        assert!(f.active.contains(f.core.id()));

        assert!(!f.core.stop().unwrap());
        assert_eq!(f.accel.starts(), 1);
        assert!(f.active.contains(f.core.id()));

        assert!(f.core.stop().unwrap());
        assert_eq!(f.accel.starts(), 0);
        assert_eq!(f.gyro.starts(), 0);
        assert!(!f.active.contains(f.core.id()));
        assert!(f.core.stop().is_err());
    }

    #[test]
    fn test_failed_upstream_start_rolls_back() {
        let f = fixture(0);
        f.gyro.fail_start.store(true, Ordering::SeqCst);

        assert!(f.core.start().is_err());
        assert!(!f.core.is_started());
        assert_eq!(f.accel.starts(), 0);
        assert_eq!(f.accel.interval_for(f.core.id()), None);
        assert_eq!(f.gyro.interval_for(f.core.id()), None);
        assert!(!f.active.contains(f.core.id()));

        f.gyro.fail_start.store(false, Ordering::SeqCst);
        assert!(f.core.start().unwrap());
        assert_eq!(f.accel.starts(), 1);
        assert!(f.active.contains(f.core.id()));
    }

    #[test]
    fn test_interval_reaches_upstreams_only_while_started() {
        let f = fixture(0);
        f.core.add_interval(1, 200, false).unwrap();
        assert_eq!(f.core.interval_ms(), 200);
        assert_eq!(f.accel.interval_for(f.core.id()), None);

        f.core.start().unwrap();
        assert_eq!(f.accel.interval_for(f.core.id()), Some(200));
        assert_eq!(f.gyro.interval_for(f.core.id()), Some(200));

        f.core.add_interval(2, 50, false).unwrap();
        assert_eq!(f.accel.interval_for(f.core.id()), Some(50));
        f.core.delete_interval(2, false).unwrap();
        assert_eq!(f.accel.interval_for(f.core.id()), Some(200));

        f.core.stop().unwrap();
        assert_eq!(f.accel.interval_for(f.core.id()), None);
        assert_eq!(f.accel.interval_ms(), 1000);
    }

    #[test]
    fn test_rejected_interval_keeps_previous_rate() {
        let f = fixture(50);
        f.core.add_interval(1, 100, false).unwrap();
        f.core.start().unwrap();

        assert!(f.core.add_interval(2, 20, false).is_err());
        assert_eq!(f.core.interval_ms(), 100);
        assert_eq!(f.accel.interval_for(f.core.id()), Some(100));
        assert_eq!(f.gyro.interval_for(f.core.id()), Some(100));
    }
}
