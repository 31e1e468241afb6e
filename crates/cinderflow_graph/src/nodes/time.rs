// SPDX-License-Identifier: MIT OR Apache-2.0
//! Time driven nodes: delayed forwarding and screen fades.

use crate::cell::ValueCell;
use crate::config::{NodeCategory, NodeConfig};
use crate::evaluation::ActivationInfo;
use crate::node::{CreateInfo, FlowEvent, FlowNode, NodeClass, NodeLifetime};
use crate::port::{InputPortConfig, OutputPortConfig, PortId};
use crate::serialize::Serializer;
use crate::value::Vec3;

#[derive(Debug, Clone, Default)]
struct Pending {
    due: f64,
    value: ValueCell,
}

/// Forwards every value it receives after a delay
#[derive(Debug, Clone, Default)]
pub struct DelayNode {
    queue: Vec<Pending>,
}

impl DelayNode {
    const IN: PortId = PortId(0);
    const DELAY: PortId = PortId(1);
    const RESET: PortId = PortId(2);
    const OUT: PortId = PortId(0);

    /// Number of values waiting to be sent
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl FlowNode for DelayNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new()
            .with_description("Sends In to Out after Delay seconds")
            .with_category(NodeCategory::Approved)
            .with_inputs([
                InputPortConfig::any_type("In"),
                InputPortConfig::with_default("Delay", 1.0f32).description("Seconds to wait"),
                InputPortConfig::void("Reset").description("Drop every pending value"),
            ])
            .with_outputs([OutputPortConfig::any_type("Out")])
    }

    fn process_event(&mut self, event: FlowEvent, info: &mut ActivationInfo<'_>) {
        match event {
            FlowEvent::Initialize | FlowEvent::Uninitialize => {
                self.queue.clear();
                info.set_regularly_updated(false);
            }
            FlowEvent::Activate => {
                if info.is_port_active(Self::RESET) {
                    self.queue.clear();
                    info.set_regularly_updated(false);
                }
                if info.is_port_active(Self::IN) {
                    let delay = f64::from(info.port_float(Self::DELAY).max(0.0));
                    self.queue.push(Pending {
                        due: info.current_time() + delay,
                        value: ValueCell::new(info.port_any(Self::IN)),
                    });
                    info.set_regularly_updated(true);
                }
            }
            FlowEvent::Update => {
                let now = info.current_time();
                let (ready, waiting): (Vec<Pending>, Vec<Pending>) =
                    std::mem::take(&mut self.queue).into_iter().partition(|entry| entry.due <= now);
                self.queue = waiting;
                for entry in &ready {
                    info.activate_output_any(Self::OUT, &entry.value);
                }
                if self.queue.is_empty() {
                    info.set_regularly_updated(false);
                }
            }
            _ => {}
        }
    }

    fn serialize(&mut self, info: &mut ActivationInfo<'_>, ser: &mut dyn Serializer) {
        let mut count = i32::try_from(self.queue.len()).unwrap_or(i32::MAX);
        ser.value_i32("count", &mut count);
        if !ser.is_reading() {
            for (index, entry) in self.queue.iter_mut().enumerate() {
                serialize_pending(ser, index, entry);
            }
            return;
        }

        // Entries present in the archive win over the stored count.
        self.queue.clear();
        while ser.contains(&format!("e{}", self.queue.len())) {
            let mut entry = Pending::default();
            serialize_pending(ser, self.queue.len(), &mut entry);
            self.queue.push(entry);
        }
        if usize::try_from(count).ok() != Some(self.queue.len()) {
            tracing::warn!(node = info.node_id().0, count, found = self.queue.len(), "delay queue count mismatch");
        }
    }

    fn clone_node(&self, _info: &CreateInfo) -> Option<Box<dyn FlowNode>> {
        Some(Box::new(DelayNode::default()))
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.queue.iter().map(|entry| entry.value.memory_usage()).sum::<usize>()
    }
}

fn serialize_pending(ser: &mut dyn Serializer, index: usize, entry: &mut Pending) {
    ser.begin_group(&format!("e{index}"));
    ser.value_f64("due", &mut entry.due);
    ser.begin_group("value");
    entry.value.serialize(ser);
    ser.end_group();
    ser.end_group();
}

impl NodeClass for DelayNode {
    const TYPE_NAME: &'static str = "Time:Delay";
    const LIFETIME: NodeLifetime = NodeLifetime::Cloned;

    fn create(_info: &CreateInfo) -> Self {
        Self::default()
    }
}

/// Fade timer handing out a ticket per started fade.
///
/// Starting a new fade invalidates every older ticket.
#[derive(Debug, Clone, Default)]
pub struct Fader {
    ticket: u32,
    started: f64,
    duration: f64,
    color: Vec3,
}

impl Fader {
    /// Create an idle fader
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fade at `now` and return its ticket
    pub fn start(&mut self, duration: f32, color: Vec3, now: f64) -> u32 {
        self.ticket = self.ticket.wrapping_add(1);
        self.started = now;
        self.duration = f64::from(duration.max(0.0));
        self.color = color;
        self.ticket
    }

    /// Whether the fade with `ticket` is still running at `now`
    pub fn is_playing(&self, ticket: u32, now: f64) -> bool {
        ticket == self.ticket && now < self.started + self.duration
    }

    /// Fraction of the current fade elapsed at `now`
    pub fn progress(&self, now: f64) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.started) / self.duration).clamp(0.0, 1.0) as f32
    }

    /// Ticket of the latest fade
    pub fn ticket(&self) -> u32 {
        self.ticket
    }

    /// Color of the latest fade
    pub fn color(&self) -> Vec3 {
        self.color
    }
}

/// Fades the screen in or out and reports when it is done
#[derive(Debug, Default)]
pub struct FadeNode {
    fader: Fader,
    ticket: Option<u32>,
    fading_in: bool,
}

impl FadeNode {
    const FADE_IN: PortId = PortId(0);
    const FADE_OUT: PortId = PortId(1);
    const DURATION: PortId = PortId(2);
    const COLOR: PortId = PortId(3);
    const COMPLETED: PortId = PortId(0);
    const PROGRESS: PortId = PortId(1);

    fn stop(&mut self, info: &mut ActivationInfo<'_>) {
        self.ticket = None;
        info.set_regularly_updated(false);
    }
}

impl FlowNode for FadeNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new()
            .with_description("Fades the screen from or to Color")
            .with_category(NodeCategory::Advanced)
            .with_ui_class("FadeNode")
            .with_inputs([
                InputPortConfig::void("FadeIn"),
                InputPortConfig::void("FadeOut"),
                InputPortConfig::with_default("Duration", 2.0f32),
                InputPortConfig::new::<Vec3>("Color"),
            ])
            .with_outputs([
                OutputPortConfig::void("Completed"),
                OutputPortConfig::new::<f32>("Progress").description("0 at the start of a fade, 1 at its end"),
            ])
    }

    fn process_event(&mut self, event: FlowEvent, info: &mut ActivationInfo<'_>) {
        match event {
            FlowEvent::Initialize | FlowEvent::Uninitialize => self.stop(info),
            FlowEvent::Activate => {
                let fade_in = info.is_port_active(Self::FADE_IN);
                if !fade_in && !info.is_port_active(Self::FADE_OUT) {
                    return;
                }
                self.fading_in = fade_in;
                let duration = info.port_float(Self::DURATION);
                let color = info.port_vec3(Self::COLOR);
                self.ticket = Some(self.fader.start(duration, color, info.current_time()));
                info.set_regularly_updated(true);
                tracing::debug!(node = info.node_id().0, fade_in, duration, "fade started");
            }
            FlowEvent::Update => {
                let Some(ticket) = self.ticket else {
                    info.set_regularly_updated(false);
                    return;
                };
                let now = info.current_time();
                info.activate_output(Self::PROGRESS, self.fader.progress(now));
                if !self.fader.is_playing(ticket, now) {
                    self.stop(info);
                    info.activate_output(Self::COMPLETED, true);
                }
            }
            _ => {}
        }
    }

    fn serialize(&mut self, _info: &mut ActivationInfo<'_>, ser: &mut dyn Serializer) {
        let mut running = self.ticket.is_some();
        ser.value_bool("running", &mut running);
        ser.value_bool("fadingIn", &mut self.fading_in);
        let mut ticket = u64::from(self.fader.ticket);
        ser.value_u64("ticket", &mut ticket);
        ser.value_f64("started", &mut self.fader.started);
        ser.value_f64("duration", &mut self.fader.duration);
        ser.value_vec3("color", &mut self.fader.color);
        if ser.is_reading() {
            self.fader.ticket = u32::try_from(ticket).unwrap_or(u32::MAX);
            self.ticket = running.then_some(self.fader.ticket);
        }
    }
}

impl NodeClass for FadeNode {
    const TYPE_NAME: &'static str = "Time:Fade";

    fn create(_info: &CreateInfo) -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::FlowAddress;
    use crate::serialize::{ArchiveReader, ArchiveValue, ArchiveWriter};
    use crate::test_util::{standard_graph, FlowRecorder};
    use crate::value::FlowValue;
    use std::sync::Arc;

    #[test]
    fn test_fader_tickets() {
        let mut fader = Fader::new();
        let first = fader.start(2.0, Vec3::ZERO, 0.0);
        assert!(fader.is_playing(first, 1.0));
        assert_eq!(fader.progress(1.0), 0.5);

        let second = fader.start(1.0, Vec3::splat(1.0), 1.0);
        assert_eq!(second, first + 1);
        assert!(!fader.is_playing(first, 1.5));
        assert!(fader.is_playing(second, 1.5));
        assert!(!fader.is_playing(second, 2.0));
        assert_eq!(fader.progress(5.0), 1.0);
    }

    #[test]
    fn test_fade_completes_once() {
        let mut graph = standard_graph();
        let fade = graph.create_node("Time:Fade", "fade");
        let done = graph.create_node("Math:Counter", "done");
        assert!(graph.link_nodes(FlowAddress::output(fade, PortId(0)), FlowAddress::input(done, PortId(0))));
        let recorder = Arc::new(FlowRecorder::default());
        graph.add_inspector(recorder.clone());

        graph.initialize_values();
        graph.activate_input(FlowAddress::input(fade, PortId(0)), &FlowValue::Void);

        // Fade starts at 0.25 and ends at 2.25.
        for _ in 0..8 {
            graph.update(0.25);
        }
        assert_eq!(recorder.flows_from(FlowAddress::output(fade, PortId(0))), 0);
        assert!(graph.is_regularly_updated(fade));

        for _ in 0..4 {
            graph.update(0.25);
        }
        assert_eq!(recorder.flows_from(FlowAddress::output(fade, PortId(0))), 1);
        assert!(!graph.is_regularly_updated(fade));
    }

    #[test]
    fn test_delay_forwards_value() {
        let mut graph = standard_graph();
        let delay = graph.create_node("Time:Delay", "delay");
        let not = graph.create_node("Logic:NOT", "not");
        assert!(graph.link_nodes(FlowAddress::output(delay, PortId(0)), FlowAddress::input(not, PortId(0))));
        let recorder = Arc::new(FlowRecorder::default());
        graph.add_inspector(recorder.clone());

        graph.initialize_values();
        graph.set_input_value(FlowAddress::input(delay, PortId(1)), &FlowValue::Float(0.5));
        graph.activate_input(FlowAddress::input(delay, PortId(0)), &FlowValue::Bool(true));

        graph.update(0.25);
        graph.update(0.25);
        assert!(recorder.values_into(FlowAddress::input(not, PortId(0))).is_empty());

        graph.update(0.25);
        assert_eq!(recorder.values_into(FlowAddress::input(not, PortId(0))), vec![FlowValue::Bool(true)]);
        assert!(!graph.is_regularly_updated(delay));
    }

    #[test]
    fn test_delay_is_cloned_per_placement() {
        let mut graph = standard_graph();
        let a = graph.create_node("Time:Delay", "a");
        let b = graph.create_node("Time:Delay", "b");
        graph.initialize_values();
        graph.activate_input(FlowAddress::input(a, PortId(0)), &FlowValue::Int(1));
        graph.update(0.1);

        assert!(graph.is_regularly_updated(a));
        assert!(!graph.is_regularly_updated(b));
    }

    #[test]
    fn test_delay_ignores_inflated_archive_counts() {
        let mut graph = standard_graph();
        let delay = graph.create_node("Time:Delay", "delay");
        graph.initialize_values();
        graph.activate_input(FlowAddress::input(delay, PortId(0)), &FlowValue::Int(5));
        graph.update(0.1);

        let mut writer = ArchiveWriter::new();
        graph.serialize(&mut writer);
        let mut archive = writer.finish();
        archive.insert("nodeCount", ArchiveValue::I32(i32::MAX));
        if let Some(list) = archive.group_mut("activatedNodes") {
            list.insert("count", ArchiveValue::I32(i32::MAX));
        }
        let state = archive
            .group_mut("Node0")
            .and_then(|node| node.group_mut("state"))
            .expect("delay state archived");
        assert!(state.group("e0").is_some());
        state.insert("count", ArchiveValue::I32(i32::MAX));

        let mut restored = standard_graph();
        let delay = restored.create_node("Time:Delay", "delay");
        let not = restored.create_node("Logic:NOT", "not");
        assert!(restored.link_nodes(FlowAddress::output(delay, PortId(0)), FlowAddress::input(not, PortId(0))));
        let recorder = Arc::new(FlowRecorder::default());
        restored.add_inspector(recorder.clone());
        let mut reader = ArchiveReader::new(&archive);
        restored.serialize(&mut reader);
        reader.finish().expect("entries behind the counts are intact");

        restored.update(2.0);
        assert_eq!(recorder.values_into(FlowAddress::input(not, PortId(0))), vec![FlowValue::Int(5)]);
        assert!(!restored.is_regularly_updated(delay));

        archive.insert("nodeCount", ArchiveValue::I32(-3));
        let mut reader = ArchiveReader::new(&archive);
        restored.serialize(&mut reader);
        assert!(reader.finish().is_ok());
    }
}
