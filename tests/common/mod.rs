#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use zigbee_bridge::device::{BasicIdentity, EndpointPreset};
use zigbee_bridge::events::AttrSource;
use zigbee_bridge::host::{AttrArgs, AttrCall};
use zigbee_bridge::network::Role;
use zigbee_bridge::stack::CommandTarget;
use zigbee_bridge::{BridgeOptions, LoopbackStack, ZigbeeBridge};

pub const LOCAL_EP: u8 = 1;

/// Bridge over a loopback stack that only advances on `step()`.
pub fn manual_bridge() -> (Arc<LoopbackStack>, ZigbeeBridge) {
    let stack = Arc::new(LoopbackStack::manual());
    let bridge = ZigbeeBridge::new(stack.clone(), BridgeOptions::default());
    (stack, bridge)
}

pub fn identity(manufacturer: &str, model: &str) -> BasicIdentity {
    BasicIdentity::parse(Some(manufacturer), Some(model), None, None, Some(1)).unwrap()
}

/// Initialised, registered and started with `preset` on [`LOCAL_EP`]. The
/// startup signal and the commissioning that follows are already processed.
pub fn started_bridge(role: Role, preset: EndpointPreset) -> (Arc<LoopbackStack>, ZigbeeBridge) {
    let (stack, bridge) = manual_bridge();
    bridge.init(role).unwrap();
    bridge.define_preset_endpoint(LOCAL_EP, preset).unwrap();
    bridge
        .set_basic_identity(LOCAL_EP, identity("Acme", "Lamp-1"))
        .unwrap();
    assert_eq!(bridge.register_device().unwrap(), Some(LOCAL_EP));
    bridge.start(true).unwrap();
    stack.step();
    (stack, bridge)
}

pub fn target(dst_short_addr: u16) -> CommandTarget {
    CommandTarget {
        src_endpoint: LOCAL_EP,
        dst_short_addr,
        dst_endpoint: 1,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivered {
    Signal(u16, i32),
    Attr(Option<u16>, AttrArgs),
}

/// Install recording callbacks in both slots.
pub fn record_callbacks(bridge: &ZigbeeBridge) -> Arc<Mutex<Vec<Delivered>>> {
    let log = Arc::new(Mutex::new(Vec::new()));

    let signals = log.clone();
    bridge
        .callbacks()
        .set_signal_callback(Some(Arc::new(move |signal: u16, status: i32| {
            signals.lock().push(Delivered::Signal(signal, status));
            Ok(())
        })));

    let attrs = log.clone();
    bridge
        .callbacks()
        .set_attribute_callback(Some(Arc::new(move |call: AttrCall<'_>| {
            attrs.lock().push(Delivered::Attr(call.source(), *call.args()));
            Ok(())
        })));

    log
}

pub fn source(short_addr: u16, endpoint: u8) -> Option<AttrSource> {
    Some(AttrSource {
        short_addr,
        endpoint,
    })
}
