//! Sample sources.

use rand::Rng;
use sysinfo::System;

/// Produces named readings for the sampler.
pub trait SampleSource: Send {
    fn sample(&mut self) -> Vec<(String, f64)>;
}

/// Gauge under which the random reading is reported.
pub const RANDOM_VALUE: &str = "RandomValue";

/// Host memory, swap, CPU and load readings plus a random value.
pub struct RuntimeSource {
    system: System,
}

impl RuntimeSource {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta between two refreshes.
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for RuntimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for RuntimeSource {
    fn sample(&mut self) -> Vec<(String, f64)> {
        self.system.refresh_memory();
        self.system.refresh_cpu_all();
        let load = System::load_average();

        let mut readings: Vec<(String, f64)> = [
            ("TotalMemory", self.system.total_memory() as f64),
            ("UsedMemory", self.system.used_memory() as f64),
            ("FreeMemory", self.system.free_memory() as f64),
            ("AvailableMemory", self.system.available_memory() as f64),
            ("TotalSwap", self.system.total_swap() as f64),
            ("UsedSwap", self.system.used_swap() as f64),
            ("CPUutilization", self.system.global_cpu_usage() as f64),
            ("LoadAverage1", load.one),
            ("LoadAverage5", load.five),
            ("LoadAverage15", load.fifteen),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();

        readings.extend(
            self.system
                .cpus()
                .iter()
                .enumerate()
                .map(|(i, cpu)| (format!("CPUutilization{}", i + 1), cpu.cpu_usage() as f64)),
        );
        readings.push((RANDOM_VALUE.to_string(), rand::rng().random_range(0.0..1000.0)));
        readings
    }
}
