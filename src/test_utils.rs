/*
 * Test utilities and fake hardware for argonfan
 *
 * Fake I2C buses and adapters, scripted temperature sources, a recording
 * reporter, and throwaway sysfs trees shared by the unit tests.
 */

#[cfg(test)]
pub mod test_utils {
    use crate::i2c::{I2cAdapter, I2cBus};
    use crate::reporter::{ReportEvent, Reporter};
    use crate::temperature::{TemperatureSample, TemperatureSource, TemperatureUnit};
    use af_error::{ArgonfanError, Result};
    use std::collections::{BTreeMap, VecDeque};
    use std::fs;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Every write attempt as `(address, bytes)`
    pub type WriteLog = Arc<Mutex<Vec<(u16, Vec<u8>)>>>;

    /// In-memory I2C bus
    ///
    /// Addresses in `responders` acknowledge probes and writes. Flipping the
    /// failure switch makes every write fail until it is flipped back.
    pub struct FakeBus {
        bus: u8,
        responders: Vec<u16>,
        log: WriteLog,
        failing: Arc<AtomicBool>,
        probes: Arc<AtomicUsize>,
    }

    impl FakeBus {
        pub fn new(bus: u8, responders: Vec<u16>) -> Self {
            Self {
                bus,
                responders,
                log: Arc::default(),
                failing: Arc::default(),
                probes: Arc::default(),
            }
        }

        pub fn write_log(&self) -> WriteLog {
            self.log.clone()
        }

        pub fn failure_switch(&self) -> Arc<AtomicBool> {
            self.failing.clone()
        }
    }

    impl I2cBus for FakeBus {
        fn bus_number(&self) -> u8 {
            self.bus
        }

        fn probe(&mut self, address: u16) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.responders.contains(&address)
        }

        fn write(&mut self, address: u16, bytes: &[u8]) -> Result<()> {
            self.log.lock().unwrap().push((address, bytes.to_vec()));
            if self.failing.load(Ordering::SeqCst) || !self.responders.contains(&address) {
                return Err(ArgonfanError::write(
                    format!("i2c-{}@{:#04x}", self.bus, address),
                    "Remote I/O error",
                ));
            }
            Ok(())
        }
    }

    /// In-memory adapter handing out [`FakeBus`] instances
    #[derive(Default)]
    pub struct FakeAdapter {
        /// `None` marks a bus that is listed but cannot be opened
        buses: BTreeMap<u8, Option<Vec<u16>>>,
        opened: Mutex<Vec<u8>>,
        probes: Arc<AtomicUsize>,
    }

    impl FakeAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_bus(mut self, bus: u8, responders: Vec<u16>) -> Self {
            self.buses.insert(bus, Some(responders));
            self
        }

        pub fn with_unopenable_bus(mut self, bus: u8) -> Self {
            self.buses.insert(bus, None);
            self
        }

        /// Buses successfully opened, in order
        pub fn opened(&self) -> Vec<u8> {
            self.opened.lock().unwrap().clone()
        }

        /// Probes issued across every bus handed out
        pub fn probe_count(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }
    }

    impl I2cAdapter for FakeAdapter {
        fn available_buses(&self) -> Vec<u8> {
            self.buses.keys().copied().collect()
        }

        fn open(&self, bus: u8) -> Result<Box<dyn I2cBus>> {
            match self.buses.get(&bus) {
                Some(Some(responders)) => {
                    self.opened.lock().unwrap().push(bus);
                    let mut fake = FakeBus::new(bus, responders.clone());
                    fake.probes = self.probes.clone();
                    Ok(Box::new(fake))
                }
                Some(None) => Err(ArgonfanError::ProbeFailed {
                    bus,
                    reason: "Permission denied".into(),
                }),
                None => Err(ArgonfanError::ProbeFailed {
                    bus,
                    reason: "No such file or directory".into(),
                }),
            }
        }
    }

    /// Temperature source replaying Celsius readings
    ///
    /// `None` entries fail the read. The last entry repeats forever.
    pub struct ScriptedSource {
        unit: TemperatureUnit,
        script: VecDeque<Option<f64>>,
    }

    impl ScriptedSource {
        pub fn new(unit: TemperatureUnit, script: &[Option<f64>]) -> Self {
            Self {
                unit,
                script: script.iter().copied().collect(),
            }
        }
    }

    impl TemperatureSource for ScriptedSource {
        fn read(&mut self) -> Result<TemperatureSample> {
            let next = if self.script.len() > 1 {
                self.script.pop_front().flatten()
            } else {
                self.script.front().copied().flatten()
            };
            next.map(|c| TemperatureSample::from_celsius(c, self.unit))
                .ok_or_else(|| ArgonfanError::sensor("/fake/thermal_zone0/temp", "scripted failure"))
        }
    }

    /// Reporter that keeps every event it is handed
    #[derive(Clone, Default)]
    pub struct RecordingReporter {
        events: Arc<Mutex<Vec<ReportEvent>>>,
    }

    impl RecordingReporter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<ReportEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Reporter for RecordingReporter {
        fn report(&self, event: ReportEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    /// Creates a sysfs-like root with `hwmonN/pwm1` and `pwm1_enable` for each index
    pub fn create_mock_pwm_root(indices: &[u32]) -> TempDir {
        let root = TempDir::new().unwrap();
        for idx in indices {
            let dir = root.path().join(format!("hwmon{}", idx));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("pwm1"), "0").unwrap();
            fs::write(dir.join("pwm1_enable"), "2").unwrap();
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use crate::i2c::{I2cAdapter, I2cBus};
    use crate::temperature::{TemperatureSource, TemperatureUnit};

    #[test]
    fn fake_bus_logs_every_attempt() {
        let mut bus = FakeBus::new(1, vec![0x1A]);
        let log = bus.write_log();
        assert!(bus.write(0x1A, &[0x80, 10]).is_ok());
        assert!(bus.write(0x1B, &[0x80, 10]).is_err());
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn fake_adapter_tracks_opens_and_probes() {
        let adapter = FakeAdapter::new().with_bus(3, vec![0x1A]).with_unopenable_bus(1);
        assert_eq!(adapter.available_buses(), vec![1, 3]);
        assert!(adapter.open(1).is_err());
        let mut bus = adapter.open(3).unwrap();
        assert!(bus.probe(0x1A));
        assert!(!bus.probe(0x1B));
        assert_eq!(adapter.opened(), vec![3]);
        assert_eq!(adapter.probe_count(), 2);
    }

    #[test]
    fn scripted_source_repeats_last_entry() {
        let mut src = ScriptedSource::new(TemperatureUnit::Celsius, &[None, Some(40.0)]);
        assert!(src.read().is_err());
        assert_eq!(src.read().unwrap().value, 40.0);
        assert_eq!(src.read().unwrap().value, 40.0);
    }

    #[test]
    fn mock_pwm_root_layout() {
        let root = create_mock_pwm_root(&[0, 4]);
        assert!(root.path().join("hwmon0/pwm1").exists());
        assert!(root.path().join("hwmon4/pwm1_enable").exists());
        assert!(!root.path().join("hwmon1").exists());
    }
}
