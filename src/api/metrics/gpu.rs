use super::{MetricBuilder, MetricExporter};
use crate::device::{Clocks, Decoded, Device, MemoryUsage, SessionStats, Snapshot};
use crate::parsing::{filter_number, filter_unit, filter_version};

/// Lines emitted for every device, excluding per-process lines.
pub const LINES_PER_DEVICE: usize = 52;

type Labels<'a> = [(&'a str, &'a str)];

pub struct NvidiaSmiExporter<'a> {
    pub snapshot: &'a Snapshot,
}

impl<'a> NvidiaSmiExporter<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self { snapshot }
    }

    /// Driver, CUDA and device count. These belong to the log, not to a GPU,
    /// yet are written once per device under that device's labels, so
    /// multi-GPU hosts see the same values repeated. Kept as-is for
    /// compatibility with existing scrapes.
    fn export_top_level(&self, builder: &mut MetricBuilder, labels: &Labels) {
        let snapshot = self.snapshot;
        builder
            .metric(
                "nvidia_smi_driver_version",
                labels,
                &filter_version(&snapshot.driver_version),
            )
            .metric(
                "nvidia_smi_cuda_version",
                labels,
                &filter_version(&snapshot.cuda_version),
            )
            .metric(
                "nvidia_smi_attached_gpus",
                labels,
                &filter_number(&snapshot.attached_gpus),
            );
    }

    fn export_pci(&self, builder: &mut MetricBuilder, device: &Device, labels: &Labels) {
        let pci = &device.pci;
        builder
            .metric(
                "nvidia_smi_pci_pcie_gen_max",
                labels,
                &filter_number(&pci.pcie_gen_max),
            )
            .metric(
                "nvidia_smi_pci_pcie_gen_current",
                labels,
                &filter_number(&pci.pcie_gen_current),
            )
            .metric(
                "nvidia_smi_pci_link_width_max_multiplicator",
                labels,
                &filter_number(&pci.link_width_max),
            )
            .metric(
                "nvidia_smi_pci_link_width_current_multiplicator",
                labels,
                &filter_number(&pci.link_width_current),
            )
            .metric(
                "nvidia_smi_pci_replay_counter",
                labels,
                &filter_number(&pci.replay_counter),
            )
            .metric(
                "nvidia_smi_pci_replay_rollover_counter",
                labels,
                &filter_number(&pci.replay_rollover_counter),
            )
            .metric(
                "nvidia_smi_pci_tx_util_bytes_per_second",
                labels,
                &filter_unit(&pci.tx_util),
            )
            .metric(
                "nvidia_smi_pci_rx_util_bytes_per_second",
                labels,
                &filter_unit(&pci.rx_util),
            );
    }

    fn export_state(&self, builder: &mut MetricBuilder, device: &Device, labels: &Labels) {
        builder
            .metric(
                "nvidia_smi_fan_speed_percent",
                labels,
                &filter_unit(&device.fan_speed),
            )
            .metric(
                "nvidia_smi_performance_state_int",
                labels,
                &filter_number(&device.performance_state),
            );
    }

    fn export_memory(
        &self,
        builder: &mut MetricBuilder,
        region: &str,
        memory: &MemoryUsage,
        labels: &Labels,
    ) {
        for (field, value) in [
            ("total", &memory.total),
            ("used", &memory.used),
            ("free", &memory.free),
        ] {
            builder.metric(
                &format!("nvidia_smi_{region}_memory_usage_{field}_bytes"),
                labels,
                &filter_unit(value),
            );
        }
    }

    fn export_utilization(&self, builder: &mut MetricBuilder, device: &Device, labels: &Labels) {
        let util = &device.utilization;
        for (engine, value) in [
            ("gpu", &util.gpu),
            ("memory", &util.memory),
            ("encoder", &util.encoder),
            ("decoder", &util.decoder),
        ] {
            builder.metric(
                &format!("nvidia_smi_utilization_{engine}_percent"),
                labels,
                &filter_unit(value),
            );
        }
    }

    // Encoder and FBC statistics are plain numbers without units.
    fn export_session_stats(
        &self,
        builder: &mut MetricBuilder,
        kind: &str,
        stats: &SessionStats,
        labels: &Labels,
    ) {
        for (field, value) in [
            ("session_count", &stats.session_count),
            ("average_fps", &stats.average_fps),
            ("average_latency", &stats.average_latency),
        ] {
            builder.metric(
                &format!("nvidia_smi_{kind}_{field}"),
                labels,
                &filter_number(value),
            );
        }
    }

    fn export_temperature(&self, builder: &mut MetricBuilder, device: &Device, labels: &Labels) {
        let temp = &device.temperature;
        for (name, value) in [
            ("nvidia_smi_gpu_temp_celsius", &temp.gpu_temp),
            (
                "nvidia_smi_gpu_temp_max_threshold_celsius",
                &temp.gpu_temp_max_threshold,
            ),
            (
                "nvidia_smi_gpu_temp_slow_threshold_celsius",
                &temp.gpu_temp_slow_threshold,
            ),
            (
                "nvidia_smi_gpu_temp_max_gpu_threshold_celsius",
                &temp.gpu_temp_max_gpu_threshold,
            ),
            ("nvidia_smi_memory_temp_celsius", &temp.memory_temp),
            (
                "nvidia_smi_gpu_temp_max_mem_threshold_celsius",
                &temp.gpu_temp_max_mem_threshold,
            ),
        ] {
            builder.metric(name, labels, &filter_unit(value));
        }
    }

    fn export_power(&self, builder: &mut MetricBuilder, device: &Device, labels: &Labels) {
        let power = &device.power;
        builder.metric(
            "nvidia_smi_power_state_int",
            labels,
            &filter_number(&power.power_state),
        );
        for (name, value) in [
            ("nvidia_smi_power_draw_watts", &power.power_draw),
            ("nvidia_smi_power_limit_watts", &power.power_limit),
            (
                "nvidia_smi_default_power_limit_watts",
                &power.default_power_limit,
            ),
            (
                "nvidia_smi_enforced_power_limit_watts",
                &power.enforced_power_limit,
            ),
            ("nvidia_smi_min_power_limit_watts", &power.min_power_limit),
            ("nvidia_smi_max_power_limit_watts", &power.max_power_limit),
        ] {
            builder.metric(name, labels, &filter_unit(value));
        }
    }

    /// Current clock immediately followed by its maximum, per clock domain.
    fn export_clocks(&self, builder: &mut MetricBuilder, device: &Device, labels: &Labels) {
        for ((domain, current), (_, max)) in clock_domains(&device.clocks)
            .into_iter()
            .zip(clock_domains(&device.max_clocks))
        {
            builder
                .metric(
                    &format!("nvidia_smi_clock_{domain}_hertz"),
                    labels,
                    &filter_unit(current),
                )
                .metric(
                    &format!("nvidia_smi_clock_{domain}_max_hertz"),
                    labels,
                    &filter_unit(max),
                );
        }

        // "On"/"Off" carry no numeral and therefore export as 0.
        let policy = &device.clock_policy;
        builder
            .metric(
                "nvidia_smi_clock_policy_auto_boost",
                labels,
                &filter_unit(&policy.auto_boost),
            )
            .metric(
                "nvidia_smi_clock_policy_auto_boost_default",
                labels,
                &filter_unit(&policy.auto_boost_default),
            );
    }

    fn export_processes(&self, builder: &mut MetricBuilder, device: &Device, labels: &Labels) {
        for process in &device.processes {
            let mut process_labels = labels.to_vec();
            process_labels.push(("process_pid", process.pid.as_str()));
            process_labels.push(("process_type", process.process_type.as_str()));
            builder.metric(
                "nvidia_smi_process_used_memory_bytes",
                &process_labels,
                &filter_unit(&process.used_memory),
            );
        }
    }

    fn export_device(&self, builder: &mut MetricBuilder, device: &Device) {
        let labels = [
            ("id", device.id.as_str()),
            ("uuid", device.uuid.as_str()),
            ("name", device.product_name.as_str()),
        ];

        self.export_top_level(builder, &labels);
        self.export_pci(builder, device, &labels);
        self.export_state(builder, device, &labels);
        self.export_memory(builder, "fb", &device.fb_memory, &labels);
        self.export_memory(builder, "bar1", &device.bar1_memory, &labels);
        self.export_utilization(builder, device, &labels);
        self.export_session_stats(builder, "encoder", &device.encoder_stats, &labels);
        self.export_session_stats(builder, "fbc", &device.fbc_stats, &labels);
        self.export_temperature(builder, device, &labels);
        self.export_power(builder, device, &labels);
        self.export_clocks(builder, device, &labels);
        self.export_processes(builder, device, &labels);
    }
}

fn clock_domains(clocks: &Clocks) -> [(&'static str, &String); 4] {
    [
        ("graphics", &clocks.graphics),
        ("sm", &clocks.sm),
        ("mem", &clocks.mem),
        ("video", &clocks.video),
    ]
}

impl<'a> MetricExporter for NvidiaSmiExporter<'a> {
    fn export_metrics(&self) -> String {
        let mut builder = MetricBuilder::new();

        if self.snapshot.devices.is_empty() {
            // No device label set to hang them on.
            self.export_top_level(&mut builder, &[]);
        }
        for device in &self.snapshot.devices {
            self.export_device(&mut builder, device);
        }

        builder.build()
    }
}

/// Render a decoded sample, degrading instead of failing.
///
/// A partial document renders whatever devices were read; an unparseable one
/// renders the empty snapshot. Both are logged.
pub fn render_metrics(decoded: &Decoded) -> String {
    let empty = Snapshot::default();
    let snapshot = match decoded {
        Decoded::Complete(snapshot) => snapshot,
        Decoded::Partial { snapshot, error } => {
            tracing::warn!(
                devices = snapshot.devices.len(),
                "nvidia-smi output only partially decoded: {error}"
            );
            snapshot
        }
        Decoded::Unparseable(error) => {
            tracing::warn!("nvidia-smi output could not be decoded: {error}");
            &empty
        }
    };
    NvidiaSmiExporter::new(snapshot).export_metrics()
}
