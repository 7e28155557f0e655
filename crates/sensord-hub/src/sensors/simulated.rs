// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Simulated HAL
//!
//! Produces samples from a configured waveform at the requested interval and
//! accepts injected samples through a crossbeam channel. The daemon uses it to
//! run without hardware, and the tests drive the whole pipeline through it.

use crate::core::{now_micros, HubError, Result};
use crate::sensors::hal::{HalProperties, RawSample, SensorHal};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use sensord_config::{HalConfig, WaveformConfig, WaveformKind};
use sensord_protocol::event::ACCURACY_GOOD;
use sensord_protocol::{SensorType, MAX_HUB_DATA_SIZE, MAX_VALUE_COUNT, SENSOR_INTERVAL_NORMAL_MS};
use std::f32::consts::TAU;
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Input pushed into a simulated device
#[derive(Debug, Clone, PartialEq)]
pub enum Injection {
    Sample(Vec<f32>),
    Hub(Vec<u8>),
    /// Makes the next `is_data_ready` fail with an I/O error
    Fault(String),
}

struct SimState {
    initialized: bool,
    enabled: bool,
    interval_ms: u32,
    enabled_at: Instant,
    next_due: Instant,
    pending: Option<RawSample>,
    last_command: Option<(u32, i64)>,
}

pub struct SimulatedHal {
    properties: HalProperties,
    waveform: WaveformConfig,
    state: Mutex<SimState>,
    tx: Sender<Injection>,
    rx: Receiver<Injection>,
}

impl SimulatedHal {
    pub fn from_config(config: &HalConfig) -> Result<Self> {
        let sensor_type = SensorType::from_name(&config.sensor_type)
            .filter(|t| *t != SensorType::All)
            .ok_or_else(|| {
                HubError::Config(format!("unknown sensor type '{}'", config.sensor_type))
            })?;
        if config.value_count > MAX_VALUE_COUNT {
            return Err(HubError::Config(format!(
                "HAL '{}' reports {} values (max {})",
                config.name, config.value_count, MAX_VALUE_COUNT
            )));
        }

        let properties = HalProperties {
            sensor_type,
            name: config.name.clone(),
            vendor: config.vendor.clone(),
            min_range: config.min_range,
            max_range: config.max_range,
            resolution: config.resolution,
            min_interval_ms: config.min_interval_ms,
            fifo_count: config.fifo_count,
            max_batch_count: config.max_batch_count,
            raw_scale: config.raw_scale,
            value_count: config.value_count,
        };
        let (tx, rx) = channel::unbounded();
        let now = Instant::now();

        Ok(Self {
            properties,
            waveform: config.waveform.clone(),
            state: Mutex::new(SimState {
                initialized: false,
                enabled: false,
                interval_ms: SENSOR_INTERVAL_NORMAL_MS,
                enabled_at: now,
                next_due: now,
                pending: None,
                last_command: None,
            }),
            tx,
            rx,
        })
    }

    /// Device that only emits injected samples
    pub fn injected(sensor_type: SensorType, name: &str) -> Result<Self> {
        let config = HalConfig {
            sensor_type: sensor_type.name().to_string(),
            name: name.to_string(),
            value_count: 3,
            waveform: WaveformConfig {
                kind: WaveformKind::Injected,
                ..WaveformConfig::default()
            },
            ..HalConfig::default()
        };
        Self::from_config(&config)
    }

    /// Sender half for pushing samples from another thread
    pub fn injector(&self) -> Sender<Injection> {
        self.tx.clone()
    }

    pub fn inject(&self, values: &[f32]) {
        // Cannot fail: `self` owns the receiver
        let _ = self.tx.send(Injection::Sample(values.to_vec()));
    }

    pub fn interval_ms(&self) -> u32 {
        self.state.lock().interval_ms
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn last_command(&self) -> Option<(u32, i64)> {
        self.state.lock().last_command
    }

    fn accept(&self, injection: Injection) -> Result<bool> {
        let sample = match injection {
            Injection::Sample(values) => RawSample {
                timestamp: now_micros(),
                accuracy: ACCURACY_GOOD,
                values,
                hub_data: Vec::new(),
            },
            Injection::Hub(hub_data) => RawSample {
                timestamp: now_micros(),
                accuracy: ACCURACY_GOOD,
                values: Vec::new(),
                hub_data,
            },
            Injection::Fault(message) => {
                return Err(HubError::Io(io::Error::new(io::ErrorKind::Other, message)))
            }
        };
        self.state.lock().pending = Some(sample);
        Ok(true)
    }

    fn waveform_sample(&self, elapsed: Duration) -> RawSample {
        let mut values = vec![0.0f32; self.properties.value_count];
        for (slot, base) in values.iter_mut().zip(self.waveform.values.iter()) {
            *slot = *base;
        }
        if self.waveform.kind == WaveformKind::Sine && self.waveform.period_ms > 0 {
            let phase = TAU * elapsed.as_millis() as f32 / self.waveform.period_ms as f32;
            let offset = self.waveform.amplitude * phase.sin();
            for value in values.iter_mut() {
                *value += offset;
            }
        }
        RawSample {
            timestamp: now_micros(),
            accuracy: ACCURACY_GOOD,
            values,
            hub_data: Vec::new(),
        }
    }
}

impl SensorHal for SimulatedHal {
    fn init(&self) -> Result<()> {
        self.state.lock().initialized = true;
        debug!(
            "🦀 [SIM-HAL] {} ({}) ready, waveform {:?}",
            self.properties.name, self.properties.sensor_type, self.waveform.kind
        );
        Ok(())
    }

    fn get_properties(&self) -> HalProperties {
        self.properties.clone()
    }

    fn enable(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(HubError::InvalidArgument(format!(
                "HAL '{}' used before init",
                self.properties.name
            )));
        }
        let now = Instant::now();
        state.enabled = true;
        state.enabled_at = now;
        state.next_due = now;
        Ok(())
    }

    fn disable(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.enabled = false;
        state.pending = None;
        Ok(())
    }

    fn set_interval(&self, interval_ms: u32) -> Result<()> {
        let mut state = self.state.lock();
        state.interval_ms = interval_ms.max(1);
        if state.enabled {
            state.next_due = Instant::now() + Duration::from_millis(state.interval_ms as u64);
        }
        Ok(())
    }

    fn is_data_ready(&self, timeout: Duration) -> Result<bool> {
        let (enabled, next_due, enabled_at, interval_ms) = {
            let state = self.state.lock();
            (state.enabled, state.next_due, state.enabled_at, state.interval_ms)
        };
        if !enabled {
            thread::sleep(timeout.min(Duration::from_millis(50)));
            return Ok(false);
        }

        if self.waveform.kind == WaveformKind::Injected {
            return match self.rx.recv_timeout(timeout) {
                Ok(injection) => self.accept(injection),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(false),
            };
        }

        let now = Instant::now();
        let wait = next_due.saturating_duration_since(now).min(timeout);
        match self.rx.recv_timeout(wait) {
            Ok(injection) => self.accept(injection),
            Err(_) => {
                let now = Instant::now();
                if now < next_due {
                    return Ok(false);
                }
                let sample = self.waveform_sample(now.duration_since(enabled_at));
                let mut state = self.state.lock();
                let step = Duration::from_millis(interval_ms as u64);
                // Skip missed slots instead of bursting to catch up
                state.next_due = if next_due + step > now {
                    next_due + step
                } else {
                    now + step
                };
                state.pending = Some(sample);
                Ok(true)
            }
        }
    }

    fn get_sensor_data(&self) -> Result<RawSample> {
        self.state
            .lock()
            .pending
            .take()
            .ok_or_else(|| HubError::NoData(format!("HAL '{}' has no sample", self.properties.name)))
    }

    fn set_command(&self, cmd: u32, value: i64) -> Result<()> {
        debug!(
            "🦀 [SIM-HAL] {} command {:#x} = {}",
            self.properties.name, cmd, value
        );
        self.state.lock().last_command = Some((cmd, value));
        Ok(())
    }

    fn send_sensorhub_data(&self, data: &[u8]) -> Result<()> {
        if !self.properties.sensor_type.is_sensorhub_controlled() {
            return Err(HubError::Unsupported(format!(
                "HAL '{}' is not a sensorhub",
                self.properties.name
            )));
        }
        if data.len() > MAX_HUB_DATA_SIZE {
            return Err(HubError::InvalidArgument(format!(
                "sensorhub payload of {} bytes",
                data.len()
            )));
        }
        // Loopback: the hub answers with the same payload on the event channel
        let _ = self.tx.send(Injection::Hub(data.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_light() -> SimulatedHal {
        SimulatedHal::from_config(&HalConfig {
            sensor_type: "light".to_string(),
            name: "sim-light".to_string(),
            value_count: 1,
            waveform: WaveformConfig {
                kind: WaveformKind::Constant,
                values: vec![250.0],
                ..WaveformConfig::default()
            },
            ..HalConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_unknown_type_rejected() {
        let config = HalConfig {
            sensor_type: "flux_capacitor".to_string(),
            ..HalConfig::default()
        };
        assert!(matches!(
            SimulatedHal::from_config(&config),
            Err(HubError::Config(_))
        ));
    }

    #[test]
    fn test_disabled_hal_produces_nothing() {
        let hal = constant_light();
        hal.init().unwrap();
        hal.inject(&[1.0]);
        assert!(!hal.is_data_ready(Duration::from_millis(5)).unwrap());
    }

    #[test]
    fn test_constant_waveform_paced_by_interval() {
        let hal = constant_light();
        hal.init().unwrap();
        hal.enable().unwrap();
        hal.set_interval(20).unwrap();
        assert_eq!(hal.interval_ms(), 20);

        let mut produced = 0;
        let start = Instant::now();
        while produced < 3 && start.elapsed() < Duration::from_secs(2) {
            if hal.is_data_ready(Duration::from_millis(100)).unwrap() {
                let sample = hal.get_sensor_data().unwrap();
                assert_eq!(sample.values, vec![250.0]);
                produced += 1;
            }
        }
        assert_eq!(produced, 3);
        assert!(hal.get_sensor_data().is_err());
    }

    #[test]
    fn test_injection_and_fault() {
        let hal = SimulatedHal::injected(SensorType::Accelerometer, "sim-accel").unwrap();
        hal.init().unwrap();
        hal.enable().unwrap();

        assert!(!hal.is_data_ready(Duration::from_millis(5)).unwrap());
        hal.inject(&[0.0, 1.0, 0.0]);
        assert!(hal.is_data_ready(Duration::from_millis(100)).unwrap());
        assert_eq!(hal.get_sensor_data().unwrap().values, vec![0.0, 1.0, 0.0]);

        hal.injector()
            .send(Injection::Fault("bus error".to_string()))
            .unwrap();
        assert!(matches!(
            hal.is_data_ready(Duration::from_millis(100)),
            Err(HubError::Io(_))
        ));
    }

    #[test]
    fn test_sensorhub_loopback() {
        let hal = SimulatedHal::injected(SensorType::Context, "sim-hub").unwrap();
        hal.init().unwrap();
        hal.enable().unwrap();
        hal.send_sensorhub_data(&[1, 2, 3]).unwrap();
        assert!(hal.is_data_ready(Duration::from_millis(100)).unwrap());
        assert_eq!(hal.get_sensor_data().unwrap().hub_data, vec![1, 2, 3]);

        let accel = SimulatedHal::injected(SensorType::Accelerometer, "a").unwrap();
        assert!(matches!(
            accel.send_sensorhub_data(&[1]),
            Err(HubError::Unsupported(_))
        ));
    }
}
