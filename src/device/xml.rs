// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Decoding of `nvidia-smi -q -x` output into a [`Snapshot`].
//!
//! Decoding runs in two passes. A pull reader builds a small element tree and
//! stops at the first syntax error, keeping whatever it has read so far. The
//! tree is then mapped onto the typed snapshot by element path, so unknown
//! elements are skipped and missing ones become empty strings.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::device::types::{
    ClockPolicy, Clocks, Device, MemoryUsage, PciInfo, PowerReadings, Process, SessionStats,
    Snapshot, Temperature, Utilization,
};
use crate::error::Error;

/// Outcome of decoding one sample.
#[derive(Debug)]
pub enum Decoded {
    /// The whole document was read.
    Complete(Snapshot),
    /// The document broke off after the root element was opened; `snapshot`
    /// holds everything read before `error`.
    Partial { snapshot: Snapshot, error: Error },
    /// Not even a root element could be read.
    Unparseable(Error),
}

impl Decoded {
    pub fn is_complete(&self) -> bool {
        matches!(self, Decoded::Complete(_))
    }

    /// The recovered snapshot, if any element was read.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Decoded::Complete(snapshot) | Decoded::Partial { snapshot, .. } => Some(snapshot),
            Decoded::Unparseable(_) => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Decoded::Complete(_) => None,
            Decoded::Partial { error, .. } | Decoded::Unparseable(error) => Some(error),
        }
    }

    /// Snapshot to render; an unparseable document becomes the empty snapshot.
    pub fn into_snapshot(self) -> Snapshot {
        match self {
            Decoded::Complete(snapshot) | Decoded::Partial { snapshot, .. } => snapshot,
            Decoded::Unparseable(_) => Snapshot::default(),
        }
    }
}

/// Decode raw `nvidia-smi -q -x` bytes.
pub fn decode_snapshot(bytes: &[u8]) -> Decoded {
    let (root, error) = read_tree(bytes);
    match (root, error) {
        (Some(root), None) => Decoded::Complete(snapshot_from(&root)),
        (Some(root), Some(error)) => Decoded::Partial {
            snapshot: snapshot_from(&root),
            error,
        },
        (None, error) => Decoded::Unparseable(error.unwrap_or(Error::NoRootElement)),
    }
}

static EMPTY: Element = Element {
    name: String::new(),
    attributes: Vec::new(),
    text: String::new(),
    children: Vec::new(),
};

#[derive(Debug, Clone, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart) -> Result<Self, Error> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            attributes,
            ..Default::default()
        })
    }

    /// First child called `name`, or an empty element.
    fn child(&self, name: &str) -> &Element {
        self.children
            .iter()
            .find(|c| c.name == name)
            .unwrap_or(&EMPTY)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn text(&self, name: &str) -> String {
        self.child(name).text.clone()
    }

    fn attribute(&self, key: &str) -> String {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }
}

/// Tree under construction; `stack` holds the currently open elements.
#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Element>,
    root: Option<Element>,
}

impl TreeBuilder {
    fn attach(&mut self, element: Element) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => {
                if self.root.is_none() {
                    self.root = Some(element);
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(element) = self.stack.pop() {
            self.attach(element);
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(open) = self.stack.last_mut() {
            open.text.push_str(text);
        }
    }

    /// Close everything still open and hand back the root.
    fn finish(mut self) -> Option<Element> {
        while !self.stack.is_empty() {
            self.close();
        }
        self.root
    }
}

fn read_tree(bytes: &[u8]) -> (Option<Element>, Option<Error>) {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut tree = TreeBuilder::default();
    let mut buf = Vec::new();
    let mut error = None;

    loop {
        let step: Result<bool, Error> = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => Element::from_start(&start).map(|element| {
                tree.stack.push(element);
                true
            }),
            Ok(Event::Empty(start)) => Element::from_start(&start).map(|element| {
                tree.attach(element);
                true
            }),
            Ok(Event::Text(text)) => text.unescape().map_err(Error::from).map(|text| {
                tree.push_text(&text);
                true
            }),
            Ok(Event::CData(data)) => {
                tree.push_text(&String::from_utf8_lossy(&data));
                Ok(true)
            }
            Ok(Event::End(_)) => {
                tree.close();
                Ok(true)
            }
            Ok(Event::Eof) => Ok(false),
            // Declarations, DOCTYPE, comments and processing instructions.
            Ok(_) => Ok(true),
            Err(e) => Err(e.into()),
        };
        buf.clear();

        match step {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }

    if error.is_none() {
        if let Some(open) = tree.stack.last() {
            error = Some(Error::TruncatedDocument {
                open: open.name.clone(),
            });
        }
    }
    (tree.finish(), error)
}

fn snapshot_from(root: &Element) -> Snapshot {
    Snapshot {
        driver_version: root.text("driver_version"),
        cuda_version: root.text("cuda_version"),
        attached_gpus: root.text("attached_gpus"),
        devices: root.children_named("gpu").map(device_from).collect(),
    }
}

fn device_from(gpu: &Element) -> Device {
    Device {
        id: gpu.attribute("id"),
        uuid: gpu.text("uuid"),
        product_name: gpu.text("product_name"),
        pci: pci_from(gpu.child("pci")),
        fan_speed: gpu.text("fan_speed"),
        performance_state: gpu.text("performance_state"),
        fb_memory: memory_from(gpu.child("fb_memory_usage")),
        bar1_memory: memory_from(gpu.child("bar1_memory_usage")),
        utilization: utilization_from(gpu.child("utilization")),
        encoder_stats: session_stats_from(gpu.child("encoder_stats")),
        fbc_stats: session_stats_from(gpu.child("fbc_stats")),
        temperature: temperature_from(gpu.child("temperature")),
        power: power_from(gpu.child("power_readings")),
        clocks: clocks_from(gpu.child("clocks")),
        max_clocks: clocks_from(gpu.child("max_clocks")),
        clock_policy: ClockPolicy {
            auto_boost: gpu.child("clock_policy").text("auto_boost"),
            auto_boost_default: gpu.child("clock_policy").text("auto_boost_default"),
        },
        processes: gpu
            .child("processes")
            .children_named("process_info")
            .map(process_from)
            .collect(),
    }
}

fn pci_from(pci: &Element) -> PciInfo {
    let link = pci.child("pci_gpu_link_info");
    let gen = link.child("pcie_gen");
    let widths = link.child("link_widths");
    PciInfo {
        pcie_gen_max: gen.text("max_link_gen"),
        pcie_gen_current: gen.text("current_link_gen"),
        link_width_max: widths.text("max_link_width"),
        link_width_current: widths.text("current_link_width"),
        replay_counter: pci.text("replay_counter"),
        replay_rollover_counter: pci.text("replay_rollover_counter"),
        tx_util: pci.text("tx_util"),
        rx_util: pci.text("rx_util"),
    }
}

fn memory_from(memory: &Element) -> MemoryUsage {
    MemoryUsage {
        total: memory.text("total"),
        used: memory.text("used"),
        free: memory.text("free"),
    }
}

fn utilization_from(util: &Element) -> Utilization {
    Utilization {
        gpu: util.text("gpu_util"),
        memory: util.text("memory_util"),
        encoder: util.text("encoder_util"),
        decoder: util.text("decoder_util"),
    }
}

fn session_stats_from(stats: &Element) -> SessionStats {
    SessionStats {
        session_count: stats.text("session_count"),
        average_fps: stats.text("average_fps"),
        average_latency: stats.text("average_latency"),
    }
}

fn temperature_from(temp: &Element) -> Temperature {
    Temperature {
        gpu_temp: temp.text("gpu_temp"),
        gpu_temp_max_threshold: temp.text("gpu_temp_max_threshold"),
        gpu_temp_slow_threshold: temp.text("gpu_temp_slow_threshold"),
        gpu_temp_max_gpu_threshold: temp.text("gpu_temp_max_gpu_threshold"),
        memory_temp: temp.text("memory_temp"),
        gpu_temp_max_mem_threshold: temp.text("gpu_temp_max_mem_threshold"),
    }
}

fn power_from(power: &Element) -> PowerReadings {
    PowerReadings {
        power_state: power.text("power_state"),
        power_draw: power.text("power_draw"),
        power_limit: power.text("power_limit"),
        default_power_limit: power.text("default_power_limit"),
        enforced_power_limit: power.text("enforced_power_limit"),
        min_power_limit: power.text("min_power_limit"),
        max_power_limit: power.text("max_power_limit"),
    }
}

fn clocks_from(clocks: &Element) -> Clocks {
    Clocks {
        graphics: clocks.text("graphics_clock"),
        sm: clocks.text("sm_clock"),
        mem: clocks.text("mem_clock"),
        video: clocks.text("video_clock"),
    }
}

fn process_from(process: &Element) -> Process {
    Process {
        pid: process.text("pid"),
        process_type: process.text("type"),
        process_name: process.text("process_name"),
        used_memory: process.text("used_memory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_GPUS: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE nvidia_smi_log SYSTEM "nvsmi_device_v11.dtd">
<nvidia_smi_log>
    <timestamp>Mon Aug 10 12:00:00 2020</timestamp>
    <driver_version>440.95.01</driver_version>
    <cuda_version>10.2</cuda_version>
    <attached_gpus>2</attached_gpus>
    <gpu id="00000000:01:00.0">
        <product_name>GeForce GTX 1080</product_name>
        <uuid>GPU-aaaa</uuid>
        <pci>
            <pci_gpu_link_info>
                <pcie_gen>
                    <max_link_gen>3</max_link_gen>
                    <current_link_gen>1</current_link_gen>
                </pcie_gen>
                <link_widths>
                    <max_link_width>16x</max_link_width>
                    <current_link_width>16x</current_link_width>
                </link_widths>
            </pci_gpu_link_info>
            <replay_counter>4</replay_counter>
            <replay_rollover_counter>0</replay_rollover_counter>
            <tx_util>12345 KB/s</tx_util>
        </pci>
        <fan_speed>N/A</fan_speed>
        <fb_memory_usage>
            <total>8119 MiB</total>
            <used>1005 MiB</used>
            <free>7114 MiB</free>
        </fb_memory_usage>
        <processes>
            <process_info>
                <pid>1234</pid>
                <type>G</type>
                <process_name>/usr/lib/xorg/Xorg</process_name>
                <used_memory>250 MiB</used_memory>
            </process_info>
            <process_info>
                <pid>5678</pid>
                <type>C</type>
                <process_name>python &amp; friends</process_name>
                <used_memory>750 MiB</used_memory>
            </process_info>
        </processes>
    </gpu>
    <gpu id="00000000:02:00.0">
        <product_name>Tesla T4</product_name>
        <uuid>GPU-bbbb</uuid>
        <processes>
        </processes>
    </gpu>
</nvidia_smi_log>
"#;

    #[test]
    fn test_complete_document() {
        let decoded = decode_snapshot(TWO_GPUS.as_bytes());
        assert!(decoded.is_complete());
        assert!(decoded.error().is_none());

        let snapshot = decoded.into_snapshot();
        assert_eq!(snapshot.driver_version, "440.95.01");
        assert_eq!(snapshot.cuda_version, "10.2");
        assert_eq!(snapshot.attached_gpus, "2");
        assert_eq!(snapshot.devices.len(), 2);

        let first = &snapshot.devices[0];
        assert_eq!(first.id, "00000000:01:00.0");
        assert_eq!(first.uuid, "GPU-aaaa");
        assert_eq!(first.product_name, "GeForce GTX 1080");
        assert_eq!(first.pci.pcie_gen_max, "3");
        assert_eq!(first.pci.link_width_current, "16x");
        assert_eq!(first.pci.replay_counter, "4");
        assert_eq!(first.pci.tx_util, "12345 KB/s");
        assert_eq!(first.fan_speed, "N/A");
        assert_eq!(first.fb_memory.used, "1005 MiB");
        assert_eq!(first.processes.len(), 2);
        assert_eq!(first.processes[1].pid, "5678");
        assert_eq!(first.processes[1].process_type, "C");
        assert_eq!(first.processes[1].process_name, "python & friends");

        let second = &snapshot.devices[1];
        assert_eq!(second.id, "00000000:02:00.0");
        assert!(second.processes.is_empty());
    }

    #[test]
    fn test_missing_elements_decode_to_empty_strings() {
        let snapshot = decode_snapshot(TWO_GPUS.as_bytes()).into_snapshot();
        let first = &snapshot.devices[0];
        assert_eq!(first.pci.rx_util, "");
        assert_eq!(first.performance_state, "");
        assert_eq!(first.bar1_memory, MemoryUsage::default());
        assert_eq!(first.clocks, Clocks::default());
    }

    #[test]
    fn test_truncated_document_is_partial() {
        let cut = TWO_GPUS.find("<uuid>GPU-bbbb").unwrap();
        let decoded = decode_snapshot(&TWO_GPUS.as_bytes()[..cut]);

        match &decoded {
            Decoded::Partial { snapshot, error } => {
                assert_eq!(snapshot.driver_version, "440.95.01");
                assert_eq!(snapshot.devices.len(), 2);
                assert_eq!(snapshot.devices[0].processes.len(), 2);
                assert_eq!(snapshot.devices[1].product_name, "Tesla T4");
                assert_eq!(snapshot.devices[1].uuid, "");
                assert!(matches!(error, Error::TruncatedDocument { open } if open == "gpu"));
            }
            other => panic!("expected partial decode, got {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_end_tag_is_partial() {
        let xml = "<nvidia_smi_log><driver_version>450.80.02</driver_version><gpu id=\"1\"></oops></nvidia_smi_log>";
        let decoded = decode_snapshot(xml.as_bytes());
        assert!(matches!(decoded, Decoded::Partial { .. }));
        assert!(matches!(decoded.error(), Some(Error::Xml(_))));
        let snapshot = decoded.snapshot().unwrap();
        assert_eq!(snapshot.driver_version, "450.80.02");
        assert_eq!(snapshot.devices.len(), 1);
        assert_eq!(snapshot.devices[0].id, "1");
    }

    #[test]
    fn test_non_xml_is_unparseable() {
        let decoded = decode_snapshot(b"NVIDIA-SMI has failed because it couldn't communicate with the NVIDIA driver.");
        assert!(matches!(decoded, Decoded::Unparseable(Error::NoRootElement)));
        assert!(decoded.snapshot().is_none());
        assert_eq!(decoded.into_snapshot(), Snapshot::default());
    }

    #[test]
    fn test_empty_input_is_unparseable() {
        let decoded = decode_snapshot(b"");
        assert!(matches!(decoded, Decoded::Unparseable(_)));
    }

    #[test]
    fn test_root_without_gpus() {
        let xml = "<nvidia_smi_log><driver_version>535.104.05</driver_version><attached_gpus>0</attached_gpus></nvidia_smi_log>";
        let decoded = decode_snapshot(xml.as_bytes());
        assert!(decoded.is_complete());
        let snapshot = decoded.into_snapshot();
        assert_eq!(snapshot.attached_gpus, "0");
        assert!(snapshot.devices.is_empty());
    }
}
