// One decoded `nvidia-smi -q -x` sample. Every reading is kept as the raw
// string nvidia-smi printed ("1005 MiB", "61 %", "N/A"); normalization happens
// at emission time. Missing elements decode to the empty string.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub driver_version: String, // e.g. "440.95.01"
    pub cuda_version: String,   // e.g. "11.0"
    pub attached_gpus: String,  // decimal count
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Device {
    pub id: String, // PCI bus id from the `id` attribute, e.g. "00000000:01:00.0"
    pub uuid: String,
    pub product_name: String,
    pub pci: PciInfo,
    pub fan_speed: String,         // "30 %" or "N/A"
    pub performance_state: String, // "P0".."P12"
    pub fb_memory: MemoryUsage,
    pub bar1_memory: MemoryUsage,
    pub utilization: Utilization,
    pub encoder_stats: SessionStats,
    pub fbc_stats: SessionStats,
    pub temperature: Temperature,
    pub power: PowerReadings,
    pub clocks: Clocks,
    pub max_clocks: Clocks,
    pub clock_policy: ClockPolicy,
    pub processes: Vec<Process>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PciInfo {
    pub pcie_gen_max: String,
    pub pcie_gen_current: String,
    pub link_width_max: String,     // "16x"
    pub link_width_current: String, // "8x"
    pub replay_counter: String,
    pub replay_rollover_counter: String,
    pub tx_util: String, // "12345 KB/s"
    pub rx_util: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryUsage {
    pub total: String, // "8119 MiB"
    pub used: String,
    pub free: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Utilization {
    pub gpu: String, // "61 %"
    pub memory: String,
    pub encoder: String,
    pub decoder: String,
}

/// Encoder and frame buffer capture session statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub session_count: String,
    pub average_fps: String,
    pub average_latency: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Temperature {
    pub gpu_temp: String, // "45 C"
    pub gpu_temp_max_threshold: String,
    pub gpu_temp_slow_threshold: String,
    pub gpu_temp_max_gpu_threshold: String,
    pub memory_temp: String,
    pub gpu_temp_max_mem_threshold: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PowerReadings {
    pub power_state: String, // "P0"
    pub power_draw: String,  // "36.47 W"
    pub power_limit: String,
    pub default_power_limit: String,
    pub enforced_power_limit: String,
    pub min_power_limit: String,
    pub max_power_limit: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clocks {
    pub graphics: String, // "961 MHz"
    pub sm: String,
    pub mem: String,
    pub video: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClockPolicy {
    pub auto_boost: String, // "On", "Off" or "N/A"
    pub auto_boost_default: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Process {
    pub pid: String,
    pub process_type: String, // "C" compute, "G" graphics, "C+G"
    pub process_name: String,
    pub used_memory: String, // "1005 MiB"
}
