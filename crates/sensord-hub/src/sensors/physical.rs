// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! HAL-backed sensor module with its own poller thread

use crate::core::{HubError, Result};
use crate::events::{EventQueue, HubEvent};
use crate::sensors::algorithm::SensorAlgorithm;
use crate::sensors::hal::{HalHandle, HalProperties, RawSample};
use crate::sensors::interval::IntervalTracker;
use crate::sensors::poller::SensorPoller;
use crate::sensors::registry::SensorRegistry;
use crate::sensors::{check_data_type, Sensor, StartCounter};
use parking_lot::Mutex;
use sensord_protocol::{
    EventType, SensorData, SensorDescriptor, SensorEvent, SensorId, SensorPrivilege, SensorType,
    SensorhubData, SensorhubEvent,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PhysicalSensor {
    descriptor: SensorDescriptor,
    hal: HalHandle,
    algorithm: Arc<dyn SensorAlgorithm>,
    queue: Arc<EventQueue>,
    starts: StartCounter,
    intervals: Mutex<IntervalTracker>,
    current_interval: AtomicU32,
    last_data: Arc<Mutex<Option<SensorData>>>,
    last_state: Arc<Mutex<Option<f32>>>,
    poller: Mutex<Option<SensorPoller>>,
}

impl PhysicalSensor {
    pub fn new(
        id: SensorId,
        hal: HalHandle,
        algorithm: Arc<dyn SensorAlgorithm>,
        queue: Arc<EventQueue>,
        default_interval_ms: u32,
    ) -> Self {
        let descriptor = Self::describe(id, &hal.get_properties());
        Self {
            descriptor,
            hal,
            algorithm,
            queue,
            starts: StartCounter::new(),
            intervals: Mutex::new(IntervalTracker::new(default_interval_ms)),
            current_interval: AtomicU32::new(0),
            last_data: Arc::new(Mutex::new(None)),
            last_state: Arc::new(Mutex::new(None)),
            poller: Mutex::new(None),
        }
    }

    /// Descriptor advertised for a HAL
    pub fn describe(id: SensorId, properties: &HalProperties) -> SensorDescriptor {
        let sensor_type = properties.sensor_type;
        let mut supported_event_types = Vec::new();
        if has_change_state(sensor_type) {
            supported_event_types.push(EventType::change_state(sensor_type));
        }
        supported_event_types.push(EventType::raw_data(sensor_type));

        SensorDescriptor {
            sensor_type,
            id,
            privilege: SensorPrivilege::Public,
            name: properties.name.clone(),
            vendor: properties.vendor.clone(),
            min_range: properties.min_range,
            max_range: properties.max_range,
            resolution: properties.resolution,
            min_interval_ms: properties.min_interval_ms as i32,
            fifo_count: properties.fifo_count as i32,
            max_batch_count: properties.max_batch_count as i32,
            supported_event_types,
        }
    }

    pub fn hal(&self) -> &HalHandle {
        &self.hal
    }

    fn apply_interval(&self, requested_ms: u32) -> Result<()> {
        let floor = self.descriptor.min_interval_ms.max(1) as u32;
        let effective = requested_ms.max(floor);
        if self.current_interval.load(Ordering::Acquire) == effective {
            return Ok(());
        }
        self.hal.set_interval(effective)?;
        self.current_interval.store(effective, Ordering::Release);
        info!(
            "🦀 [SENSOR] {} poll interval -> {} ms",
            self.descriptor.id, effective
        );
        Ok(())
    }

    /// Sample handler run on the poller thread
    fn emitter(&self) -> impl Fn(RawSample) + Send + 'static {
        let id = self.descriptor.id;
        let sensor_type = self.descriptor.sensor_type;
        let raw_event = EventType::raw_data(sensor_type);
        let change_event = has_change_state(sensor_type).then(|| EventType::change_state(sensor_type));
        let algorithm = Arc::clone(&self.algorithm);
        let queue = Arc::clone(&self.queue);
        let last_data = Arc::clone(&self.last_data);
        let last_state = Arc::clone(&self.last_state);

        move |raw: RawSample| {
            let Some(sample) = algorithm.process(raw) else {
                return;
            };

            if sensor_type.is_sensorhub_controlled() {
                match SensorhubData::new(sample.timestamp, sample.accuracy, sample.hub_data) {
                    Ok(data) => queue.push(HubEvent::Sensorhub(SensorhubEvent {
                        event_type: raw_event,
                        sensor_id: id,
                        data,
                    })),
                    Err(e) => warn!("🦀 [SENSOR] {} dropped sensorhub sample: {}", id, e),
                }
                return;
            }

            let data = match SensorData::new(sample.timestamp, sample.accuracy, &sample.values) {
                Ok(data) => data,
                Err(e) => {
                    warn!("🦀 [SENSOR] {} dropped sample: {}", id, e);
                    return;
                }
            };
            *last_data.lock() = Some(data);

            if let Some(change_event) = change_event {
                let state = data.value(0);
                let mut last = last_state.lock();
                if *last != Some(state) {
                    *last = Some(state);
                    queue.push(HubEvent::Sensor(SensorEvent::new(change_event, id, data)));
                }
            }
            queue.push(HubEvent::Sensor(SensorEvent::new(raw_event, id, data)));
        }
    }
}

/// State sensors that also report transitions
fn has_change_state(sensor_type: SensorType) -> bool {
    matches!(sensor_type, SensorType::Proximity)
}

impl Sensor for PhysicalSensor {
    fn init(&self, _registry: &SensorRegistry) -> Result<()> {
        let mut poller = self.poller.lock();
        if poller.is_some() {
            return Ok(());
        }
        let default_ms = self.intervals.lock().min_interval();
        self.apply_interval(default_ms)?;
        *poller = Some(SensorPoller::spawn(
            self.descriptor.id.to_string(),
            Arc::clone(&self.hal),
            self.emitter(),
        )?);
        debug!("🦀 [SENSOR] {} ({}) initialized", self.descriptor.id, self.descriptor.name);
        Ok(())
    }

    fn descriptor(&self) -> &SensorDescriptor {
        &self.descriptor
    }

    fn start(&self) -> Result<()> {
        let enabled = self.starts.start_with(|| {
            self.hal.enable()?;
            if let Some(poller) = self.poller.lock().as_ref() {
                poller.resume();
            }
            Ok(())
        })?;
        if enabled {
            info!(
                "🦀 [SENSOR] {} started ({} ms)",
                self.descriptor.id,
                self.interval_ms()
            );
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let disabled = self.starts.stop_with(|| {
            if let Some(poller) = self.poller.lock().as_ref() {
                poller.pause();
            }
            *self.last_state.lock() = None;
            self.hal.disable()
        })?;
        if disabled {
            info!("🦀 [SENSOR] {} stopped", self.descriptor.id);
        }
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.starts.count() > 0
    }

    fn add_interval(&self, listener: i64, interval_ms: u32, is_processor: bool) -> Result<()> {
        if interval_ms == 0 {
            return Err(HubError::InvalidArgument("interval must be positive".to_string()));
        }
        let mut intervals = self.intervals.lock();
        let previous = intervals.get(listener, is_processor);
        if intervals.add(listener, is_processor, interval_ms) {
            if let Err(e) = self.apply_interval(intervals.min_interval()) {
                intervals.restore(listener, is_processor, previous);
                return Err(e);
            }
        }
        Ok(())
    }

    fn delete_interval(&self, listener: i64, is_processor: bool) -> Result<()> {
        let mut intervals = self.intervals.lock();
        if intervals.delete(listener, is_processor) {
            self.apply_interval(intervals.min_interval())?;
        }
        Ok(())
    }

    fn interval_ms(&self) -> u32 {
        self.current_interval.load(Ordering::Acquire)
    }

    fn get_data(&self, data_type: u32) -> Result<SensorData> {
        check_data_type(&self.descriptor, data_type)?;
        self.last_data
            .lock()
            .ok_or_else(|| HubError::NoData(format!("{} has not reported yet", self.descriptor.id)))
    }

    fn set_command(&self, cmd: u32, value: i64) -> Result<()> {
        self.hal.set_command(cmd, value)
    }

    fn send_sensorhub_data(&self, data: &[u8]) -> Result<()> {
        if !self.descriptor.sensor_type.is_sensorhub_controlled() {
            return Err(HubError::Unsupported(format!(
                "{} is not sensorhub controlled",
                self.descriptor.id
            )));
        }
        self.hal.send_sensorhub_data(data)
    }
}
